use std::{
  alloc::{self, Layout},
  ptr::NonNull,
};

use crate::{config::HeapConfig, error::OutOfMemory};

/// Default ceiling for a grown arena: 20 MiB.
pub const DEFAULT_MAX_HEAP: usize = 20 << 20;

/// A primitive that extends one contiguous byte range, `sbrk`-style.
///
/// `grow` returns the start of the newly added bytes, which is the previous
/// end of the range. The range never shrinks.
pub trait Grower {
  fn grow(
    &mut self,
    bytes: usize,
  ) -> Result<NonNull<u8>, OutOfMemory>;

  /// Forgets everything grown so far, if the grower can. Called on
  /// re-initialization of a heap.
  fn reset(&mut self) {}
}

/// A grower over a fixed-capacity buffer taken once from the system
/// allocator. Growing past the capacity fails.
///
/// ```text
///   start                 brk                              start + capacity
///   ┌─────────────────────┬─────────────────────────────────┐
///   │   grown (heap)      │         not yet grown           │
///   └─────────────────────┴─────────────────────────────────┘
/// ```
pub struct MemGrower {
  start: NonNull<u8>,
  capacity: usize,
  brk: usize,
}

impl MemGrower {
  const ALIGN: usize = 16;

  pub fn new() -> Self {
    Self::with_capacity(DEFAULT_MAX_HEAP)
  }

  pub fn with_capacity(capacity: usize) -> Self {
    let capacity = capacity.max(Self::ALIGN);
    let layout = Self::layout(capacity);

    let start = unsafe { alloc::alloc(layout) };
    let Some(start) = NonNull::new(start) else {
      alloc::handle_alloc_error(layout);
    };

    Self {
      start,
      capacity,
      brk: 0,
    }
  }

  /// A buffer sized to the configured arena ceiling.
  pub fn from_config(config: &HeapConfig) -> Self {
    Self::with_capacity(config.max_heap)
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Bytes grown so far.
  pub fn used(&self) -> usize {
    self.brk
  }

  fn layout(capacity: usize) -> Layout {
    match Layout::from_size_align(capacity, Self::ALIGN) {
      Ok(layout) => layout,
      Err(_) => panic!("arena capacity {} is too large", capacity),
    }
  }
}

impl Default for MemGrower {
  fn default() -> Self {
    Self::new()
  }
}

impl Grower for MemGrower {
  fn grow(
    &mut self,
    bytes: usize,
  ) -> Result<NonNull<u8>, OutOfMemory> {
    match self.brk.checked_add(bytes) {
      Some(new_brk) if new_brk <= self.capacity => {
        let old = unsafe { self.start.add(self.brk) };
        self.brk = new_brk;
        Ok(old)
      }
      _ => Err(OutOfMemory { requested: bytes }),
    }
  }

  fn reset(&mut self) {
    self.brk = 0;
  }
}

impl Drop for MemGrower {
  fn drop(&mut self) {
    unsafe { alloc::dealloc(self.start.as_ptr(), Self::layout(self.capacity)) };
  }
}

/// A grower that moves the process's program break with `sbrk(2)`.
///
/// Anything else in the process that moves the break makes the range
/// discontiguous; the heap detects that and stops growing.
#[cfg(unix)]
pub struct SbrkGrower {
  limit: usize,
  grown: usize,
}

#[cfg(unix)]
impl SbrkGrower {
  /// A grower with no ceiling besides what the kernel allows.
  pub fn new() -> Self {
    Self::with_limit(usize::MAX)
  }

  pub fn with_limit(limit: usize) -> Self {
    Self { limit, grown: 0 }
  }

  pub fn from_config(config: &HeapConfig) -> Self {
    Self::with_limit(config.max_heap)
  }

  /// Bytes this grower has moved the break by.
  pub fn grown(&self) -> usize {
    self.grown
  }
}

#[cfg(unix)]
impl Default for SbrkGrower {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(unix)]
impl Grower for SbrkGrower {
  fn grow(
    &mut self,
    bytes: usize,
  ) -> Result<NonNull<u8>, OutOfMemory> {
    let refused = OutOfMemory { requested: bytes };

    let total = self.grown.checked_add(bytes).ok_or(refused)?;
    if total > self.limit {
      return Err(refused);
    }
    let increment = libc::intptr_t::try_from(bytes).map_err(|_| refused)?;

    let address = unsafe { libc::sbrk(increment) };
    if address == usize::MAX as *mut libc::c_void {
      return Err(refused);
    }

    self.grown = total;
    NonNull::new(address.cast::<u8>()).ok_or(refused)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_grow_is_contiguous() {
    let mut grower = MemGrower::with_capacity(4096);

    let first = grower.grow(8).unwrap();
    let second = grower.grow(4088).unwrap();

    assert_eq!(first.as_ptr() as usize % 16, 0);
    assert_eq!(second.as_ptr() as usize, first.as_ptr() as usize + 8);
    assert_eq!(grower.used(), 4096);
  }

  #[test]
  fn test_grow_past_capacity_fails() {
    let mut grower = MemGrower::with_capacity(4096);

    grower.grow(4000).unwrap();

    assert_eq!(grower.grow(100), Err(OutOfMemory { requested: 100 }));
    assert_eq!(grower.grow(usize::MAX), Err(OutOfMemory { requested: usize::MAX }));
    assert_eq!(grower.used(), 4000);
    assert!(grower.grow(96).is_ok());
  }

  #[test]
  fn test_reset_rewinds_break() {
    let mut grower = MemGrower::with_capacity(4096);

    let first = grower.grow(64).unwrap();
    grower.reset();
    let again = grower.grow(64).unwrap();

    assert_eq!(first, again);
  }

  #[cfg(unix)]
  #[test]
  fn test_sbrk_limit_is_enforced_before_syscall() {
    let mut grower = SbrkGrower::with_limit(0);

    assert_eq!(grower.grow(8), Err(OutOfMemory { requested: 8 }));
    assert_eq!(grower.grown(), 0);
  }
}
