use std::ptr::{self, NonNull};

use crate::{
  align::{self, ALIGNMENT},
  arena::{Arena, Offset},
  block::{HEADER_SIZE, Header, MAX_BLOCK, MIN_BLOCK},
  check::{self, HeapReport},
  config::HeapConfig,
  error::{CheckError, Error, OutOfMemory},
  free_list::FreeLists,
  grower::{Grower, MemGrower},
};

/// Prologue and epilogue headers together.
pub(crate) const SENTINELS: usize = 2 * HEADER_SIZE;

/// The first real block starts right after the prologue.
pub(crate) const FIRST_BLOCK: Offset = Offset::new(HEADER_SIZE);

/// A segregated-fit heap over a range that `G` grows on demand.
///
/// ```text
///   offset 0   4                                             len-4   len
///   ┌────────┬──────────┬────────┬──────────────┬─────────┬────────┐
///   │prologue│ block    │ block  │    block     │   ...   │epilogue│
///   │ 0 | A  │          │        │              │         │ 0 | A  │
///   └────────┴──────────┴────────┴──────────────┴─────────┴────────┘
/// ```
///
/// Every call runs to completion on the caller's thread; the heap is not
/// `Sync` and does no locking.
pub struct Heap<G: Grower = MemGrower> {
  grower: G,
  config: HeapConfig,
  pub(crate) arena: Arena,
  pub(crate) lists: FreeLists,
}

impl<G: Grower> Heap<G> {
  /// Builds a heap with the default configuration and initializes it.
  pub fn new(grower: G) -> Result<Self, Error> {
    Self::with_config(grower, HeapConfig::default())
  }

  pub fn with_config(
    grower: G,
    config: HeapConfig,
  ) -> Result<Self, Error> {
    let mut heap = Self {
      grower,
      config: config.normalized(),
      arena: Arena::new(NonNull::dangling(), 0),
      lists: FreeLists::new(),
    };

    heap.init()?;
    Ok(heap)
  }

  /// Installs the sentinels and grows the first chunk.
  ///
  /// Calling it again resets the grower and drops every outstanding
  /// allocation.
  pub fn init(&mut self) -> Result<(), Error> {
    self.grower.reset();
    self.arena = Arena::new(NonNull::dangling(), 0);
    self.lists = FreeLists::new();

    let base = self.grower.grow(SENTINELS)?;
    if base.as_ptr() as usize % ALIGNMENT != 0 {
      return Err(Error::MisalignedArena {
        base: base.as_ptr() as usize,
      });
    }

    self.arena = Arena::new(base, SENTINELS);
    unsafe {
      self.arena.set_header(Offset::new(0), Header::new(0, false, true));
      self.arena.set_header(FIRST_BLOCK, Header::new(0, true, true));
    }

    self.extend(self.config.chunk_size)?;

    log::debug!("heap initialized at {:p} with {} bytes", base, self.arena.len());
    Ok(())
  }

  /// Returns at least `size` usable bytes, 8-byte aligned, or `None` when
  /// `size` is zero or the arena cannot grow enough.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    if size == 0 {
      return None;
    }

    let Some(needed) = block_size_for(size) else {
      log::warn!("allocate({}) exceeds the largest block", size);
      return None;
    };

    let found = unsafe { self.lists.first_fit(&self.arena, needed) };
    let block = match found {
      Some(block) => block,
      None => match self.extend(needed) {
        Ok(block) => block,
        Err(err) => {
          log::warn!("allocate({}) failed: {}", size, err);
          return None;
        }
      },
    };

    let ptr = unsafe { self.place(block, needed) };
    log::trace!("allocate({}) -> {:p}", size, ptr);
    Some(ptr)
  }

  /// Allocates zeroed room for `count` elements of `size` bytes.
  pub fn allocate_zeroed(
    &mut self,
    count: usize,
    size: usize,
  ) -> Option<NonNull<u8>> {
    let total = count.checked_mul(size)?;
    let ptr = self.allocate(total)?;

    unsafe { ptr::write_bytes(ptr.as_ptr(), 0, total) };
    Some(ptr)
  }

  /// Frees an allocation. A null `ptr` is ignored.
  ///
  /// # Safety
  ///
  /// `ptr` is null or was returned by this heap and not released since.
  ///
  /// # Panics
  ///
  /// Panics if `ptr` lies outside the arena.
  pub unsafe fn release(
    &mut self,
    ptr: *mut u8,
  ) {
    let Some(ptr) = NonNull::new(ptr) else {
      return;
    };

    unsafe {
      let block = self.live_block(ptr);
      let merged = self.coalesce(block);
      self.lists.insert(&mut self.arena, merged);
    }

    log::trace!("release({:p})", ptr);
  }

  /// Resizes an allocation, keeping its contents up to the smaller size.
  ///
  /// A null `ptr` allocates; a zero `size` releases and returns `None`. On
  /// failure the original allocation is left untouched.
  ///
  /// # Safety
  ///
  /// Same contract as [`release`](Self::release).
  ///
  /// # Panics
  ///
  /// Panics if `ptr` lies outside the arena.
  pub unsafe fn reallocate(
    &mut self,
    ptr: *mut u8,
    size: usize,
  ) -> Option<NonNull<u8>> {
    let Some(old) = NonNull::new(ptr) else {
      return self.allocate(size);
    };

    if size == 0 {
      unsafe { self.release(ptr) };
      return None;
    }

    let needed = block_size_for(size)?;

    unsafe {
      let block = self.live_block(old);
      let current = self.arena.header(block).size();

      if current >= needed {
        self.commit(block, needed);
        log::trace!("reallocate({:p}, {}) -> shrunk in place", old, size);
        return Some(old);
      }

      if self.config.grow_in_place && self.absorb_next(block, needed) {
        log::trace!("reallocate({:p}, {}) -> grew in place", old, size);
        return Some(old);
      }

      let new = self.allocate(size)?;
      ptr::copy_nonoverlapping(old.as_ptr(), new.as_ptr(), (current - HEADER_SIZE).min(size));
      self.release(old.as_ptr());

      log::trace!("reallocate({:p}, {}) -> moved to {:p}", old, size, new);
      Some(new)
    }
  }

  /// Usable bytes behind an allocation.
  ///
  /// # Safety
  ///
  /// `ptr` is a live allocation of this heap.
  ///
  /// # Panics
  ///
  /// Panics if `ptr` lies outside the arena.
  pub unsafe fn usable_size(
    &self,
    ptr: NonNull<u8>,
  ) -> usize {
    unsafe { self.arena.header(self.live_block(ptr)).size() - HEADER_SIZE }
  }

  /// Walks the whole heap and every free list, verifying the block and list
  /// invariants.
  pub fn check(&self) -> Result<HeapReport, CheckError> {
    check::check(&self.arena, &self.lists)
  }

  /// Bytes grown so far, sentinels included.
  pub fn arena_len(&self) -> usize {
    self.arena.len()
  }

  pub fn config(&self) -> &HeapConfig {
    &self.config
  }

  pub fn grower(&self) -> &G {
    &self.grower
  }

  /// Grows the arena by at least `min_bytes` and returns the new free
  /// block, already merged with a free tail and linked.
  fn extend(
    &mut self,
    min_bytes: usize,
  ) -> Result<Offset, Error> {
    if self.arena.len() < SENTINELS {
      return Err(Error::Uninitialized);
    }

    let bytes = align::checked_align(min_bytes.max(self.config.chunk_size))
      .filter(|&bytes| {
        self
          .arena
          .len()
          .checked_add(bytes)
          .is_some_and(|len| len <= MAX_BLOCK)
      })
      .ok_or(OutOfMemory {
        requested: min_bytes,
      })?;

    let start = self.grower.grow(bytes)?;
    let expected = self.arena.end();
    if start.as_ptr() as usize != expected {
      log::warn!("arena grower returned {:p}, expected {:#x}", start, expected);
      return Err(Error::Discontiguous {
        expected,
        actual: start.as_ptr() as usize,
      });
    }

    // The old epilogue becomes the header of the new block.
    let block = Offset::new(self.arena.len() - HEADER_SIZE);
    self.arena.grow(bytes);

    unsafe {
      let prev_allocated = self.arena.header(block).prev_is_allocated();
      self.arena.set_tags(block, Header::new(bytes, prev_allocated, false));
      self.arena.set_header(block.add(bytes), Header::new(0, false, true));

      let merged = self.coalesce(block);
      self.lists.insert(&mut self.arena, merged);

      log::debug!("arena grew by {} bytes to {}", bytes, self.arena.len());
      Ok(merged)
    }
  }

  /// Merges the block at `block` with its free physical neighbors and
  /// writes the tags of the result as free. The result is not linked.
  unsafe fn coalesce(
    &mut self,
    block: Offset,
  ) -> Offset {
    unsafe {
      let header = self.arena.header(block);
      let mut start = block;
      let mut size = header.size();

      let next = block.add(size);
      let next_header = self.arena.header(next);
      if !next_header.is_allocated() {
        self.lists.remove(&mut self.arena, next);
        size += next_header.size();
      }

      if !header.prev_is_allocated() {
        let prev_size = self.arena.footer_before(block).size();
        start = block.sub(prev_size);
        self.lists.remove(&mut self.arena, start);
        size += prev_size;
      }

      let prev_allocated = self.arena.header(start).prev_is_allocated();
      self.arena.set_tags(start, Header::new(size, prev_allocated, false));
      self.set_prev_allocated(start.add(size), false);

      start
    }
  }

  /// Takes a linked free block for an allocation of `needed` bytes.
  unsafe fn place(
    &mut self,
    block: Offset,
    needed: usize,
  ) -> NonNull<u8> {
    unsafe {
      self.lists.remove(&mut self.arena, block);

      let header = self.arena.header(block);
      self.arena.set_header(block, header.with_allocated(true));
      self.commit(block, needed);

      self.arena.payload(block)
    }
  }

  /// Settles an allocated block that holds at least `needed` bytes: the
  /// excess becomes a free block when it can stand alone, otherwise the
  /// whole block stays allocated.
  unsafe fn commit(
    &mut self,
    block: Offset,
    needed: usize,
  ) {
    unsafe {
      let size = self.arena.header(block).size();

      if size - needed >= MIN_BLOCK {
        self.split(block, needed);
        return;
      }

      // A free successor already records this block as allocated.
      let next = block.add(size);
      let next_header = self.arena.header(next);
      if next_header.is_allocated() {
        self.set_prev_allocated(next, true);
      } else {
        debug_assert!(next_header.prev_is_allocated(), "free block at {} has a stale prev bit", next);
      }
    }
  }

  /// Shrinks the allocated block at `block` to `size` and frees the rest.
  unsafe fn split(
    &mut self,
    block: Offset,
    size: usize,
  ) {
    unsafe {
      let header = self.arena.header(block);
      let rest = header.size() - size;

      self.arena.set_header(block, Header::new(size, header.prev_is_allocated(), true));

      let remainder = block.add(size);
      self.arena.set_tags(remainder, Header::new(rest, true, false));

      let merged = self.coalesce(remainder);
      self.lists.insert(&mut self.arena, merged);
    }
  }

  /// Grows an allocated block into a free successor, if that gives it
  /// `needed` bytes.
  unsafe fn absorb_next(
    &mut self,
    block: Offset,
    needed: usize,
  ) -> bool {
    unsafe {
      let header = self.arena.header(block);
      let next = block.add(header.size());
      let next_header = self.arena.header(next);

      let total = header.size() + next_header.size();
      if next_header.is_allocated() || total < needed {
        return false;
      }

      self.lists.remove(&mut self.arena, next);
      self.arena.set_header(block, Header::new(total, header.prev_is_allocated(), true));
      self.commit(block, needed);
      true
    }
  }

  unsafe fn set_prev_allocated(
    &mut self,
    block: Offset,
    prev_allocated: bool,
  ) {
    unsafe {
      let header = self.arena.header(block);
      debug_assert!(header.is_allocated(), "free block at {} follows a free block", block);
      self.arena.set_header(block, header.with_prev_allocated(prev_allocated));
    }
  }

  /// Header offset of a caller's pointer.
  unsafe fn live_block(
    &self,
    ptr: NonNull<u8>,
  ) -> Offset {
    let Some(block) = self.arena.block_of(ptr.as_ptr()) else {
      panic!("{:p} does not belong to this heap", ptr);
    };

    debug_assert_eq!((block.get() + HEADER_SIZE) % ALIGNMENT, 0, "{:p} is not a block payload", ptr);
    debug_assert!(
      unsafe { self.arena.header(block).is_allocated() },
      "{:p} is not allocated (double free?)",
      ptr
    );

    block
  }
}

/// Block size serving a request of `size` payload bytes: header included,
/// rounded to the alignment, never below a free block.
fn block_size_for(size: usize) -> Option<usize> {
  size
    .checked_add(HEADER_SIZE)
    .and_then(align::checked_align)
    .map(|needed| needed.max(MIN_BLOCK))
    .filter(|&needed| needed <= MAX_BLOCK)
}
