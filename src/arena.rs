use std::{fmt, ptr::NonNull};

use crate::block::{HEADER_SIZE, Header, LINK_SIZE};

/// Link value stored in a free block when there is no neighbor in its list.
const NIL: u64 = u64::MAX;

/// Byte position of a block header, relative to the start of the arena.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Offset(usize);

impl Offset {
  pub const fn new(value: usize) -> Self {
    Self(value)
  }

  pub const fn get(self) -> usize {
    self.0
  }

  pub const fn add(
    self,
    bytes: usize,
  ) -> Self {
    Self(self.0 + bytes)
  }

  pub const fn sub(
    self,
    bytes: usize,
  ) -> Self {
    Self(self.0 - bytes)
  }
}

impl fmt::Display for Offset {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "+{}", self.0)
  }
}

/// Raw view over the grown range.
///
/// Every accessor takes a block offset and reads or writes the boundary tags
/// and links stored in arena bytes:
///
/// ```text
///   free block at `at`:
///   ┌────────┬──────────┬──────────┬─────────────────┬────────┐
///   │ header │   pred   │   succ   │       ...       │ footer │
///   │  u32   │   u64    │   u64    │                 │  u32   │
///   └────────┴──────────┴──────────┴─────────────────┴────────┘
///   at       at+4       at+12                        at+size-4
///
///   allocated block at `at`:
///   ┌────────┬──────────────────────────────────────────────────┐
///   │ header │                    payload                       │
///   └────────┴──────────────────────────────────────────────────┘
///            ▲
///            └── 8-byte aligned pointer handed to the caller
/// ```
///
/// The accessors are `unsafe`: the caller guarantees that `at` names a block
/// inside the arena whose tags were written by the heap.
pub(crate) struct Arena {
  base: NonNull<u8>,
  len: usize,
}

impl Arena {
  pub fn new(
    base: NonNull<u8>,
    len: usize,
  ) -> Self {
    Self { base, len }
  }

  pub fn len(&self) -> usize {
    self.len
  }

  /// Address one past the last grown byte.
  pub fn end(&self) -> usize {
    self.base.as_ptr() as usize + self.len
  }

  pub fn grow(
    &mut self,
    bytes: usize,
  ) {
    self.len += bytes;
  }

  /// Header offset of the block whose payload starts at `ptr`, if `ptr` lies
  /// inside the arena.
  pub fn block_of(
    &self,
    ptr: *const u8,
  ) -> Option<Offset> {
    let addr = (ptr as usize).checked_sub(self.base.as_ptr() as usize)?;

    if addr < HEADER_SIZE || addr >= self.len {
      return None;
    }

    Some(Offset(addr - HEADER_SIZE))
  }

  /// Payload pointer of the block at `at`.
  pub fn payload(
    &self,
    at: Offset,
  ) -> NonNull<u8> {
    debug_assert!(at.0 + HEADER_SIZE <= self.len);
    unsafe { self.base.add(at.0 + HEADER_SIZE) }
  }

  pub unsafe fn header(
    &self,
    at: Offset,
  ) -> Header {
    unsafe { Header::from_bits(self.read_u32(at.0)) }
  }

  pub unsafe fn set_header(
    &mut self,
    at: Offset,
    header: Header,
  ) {
    unsafe { self.write_u32(at.0, header.bits()) }
  }

  /// Footer of the block at `at`, located through its header's size.
  pub unsafe fn footer(
    &self,
    at: Offset,
  ) -> Header {
    unsafe {
      let size = self.header(at).size();
      Header::from_bits(self.read_u32(at.0 + size - HEADER_SIZE))
    }
  }

  /// Footer of the block that ends right before `at`.
  pub unsafe fn footer_before(
    &self,
    at: Offset,
  ) -> Header {
    unsafe { Header::from_bits(self.read_u32(at.0 - HEADER_SIZE)) }
  }

  /// Writes both boundary tags of a free block.
  pub unsafe fn set_tags(
    &mut self,
    at: Offset,
    header: Header,
  ) {
    unsafe {
      self.write_u32(at.0, header.bits());
      self.write_u32(at.0 + header.size() - HEADER_SIZE, header.bits());
    }
  }

  pub unsafe fn pred(
    &self,
    at: Offset,
  ) -> Option<Offset> {
    unsafe { decode_link(self.read_u64(at.0 + HEADER_SIZE)) }
  }

  pub unsafe fn succ(
    &self,
    at: Offset,
  ) -> Option<Offset> {
    unsafe { decode_link(self.read_u64(at.0 + HEADER_SIZE + LINK_SIZE)) }
  }

  pub unsafe fn set_pred(
    &mut self,
    at: Offset,
    pred: Option<Offset>,
  ) {
    unsafe { self.write_u64(at.0 + HEADER_SIZE, encode_link(pred)) }
  }

  pub unsafe fn set_succ(
    &mut self,
    at: Offset,
    succ: Option<Offset>,
  ) {
    unsafe { self.write_u64(at.0 + HEADER_SIZE + LINK_SIZE, encode_link(succ)) }
  }

  unsafe fn read_u32(
    &self,
    at: usize,
  ) -> u32 {
    debug_assert!(at + 4 <= self.len, "read of {} past arena end {}", at, self.len);
    unsafe { self.base.as_ptr().add(at).cast::<u32>().read() }
  }

  unsafe fn write_u32(
    &mut self,
    at: usize,
    value: u32,
  ) {
    debug_assert!(at + 4 <= self.len, "write of {} past arena end {}", at, self.len);
    unsafe { self.base.as_ptr().add(at).cast::<u32>().write(value) }
  }

  unsafe fn read_u64(
    &self,
    at: usize,
  ) -> u64 {
    debug_assert!(at + 8 <= self.len, "read of {} past arena end {}", at, self.len);
    unsafe { self.base.as_ptr().add(at).cast::<u64>().read() }
  }

  unsafe fn write_u64(
    &mut self,
    at: usize,
    value: u64,
  ) {
    debug_assert!(at + 8 <= self.len, "write of {} past arena end {}", at, self.len);
    unsafe { self.base.as_ptr().add(at).cast::<u64>().write(value) }
  }
}

fn encode_link(link: Option<Offset>) -> u64 {
  match link {
    Some(Offset(at)) => at as u64,
    None => NIL,
  }
}

fn decode_link(raw: u64) -> Option<Offset> {
  (raw != NIL).then_some(Offset(raw as usize))
}
