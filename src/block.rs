use std::fmt;

/// Width of a block header, and of the footer a free block carries.
pub const HEADER_SIZE: usize = 4;

/// Width of one free-list link stored in a free block's payload.
pub const LINK_SIZE: usize = 8;

/// Smallest block that can be free: header, two links and a footer.
pub const MIN_BLOCK: usize = crate::align!(HEADER_SIZE + 2 * LINK_SIZE + HEADER_SIZE);

/// Largest size a header can encode.
pub const MAX_BLOCK: usize = (u32::MAX & SIZE_MASK) as usize;

const ALLOCATED: u32 = 0b01;
const PREV_ALLOCATED: u32 = 0b10;
const SIZE_MASK: u32 = !0b111;

/// Boundary tag of a block: its size and two allocation flags packed in one
/// 32-bit word.
///
/// ```text
///   31                                 3   2   1   0
///   ┌──────────────────────────────────┬───┬───┬───┐
///   │   size (low 3 bits read as zero) │ 0 │ P │ A │
///   └──────────────────────────────────┴───┴───┴───┘
///                                            │   └── this block is allocated
///                                            └────── previous block is allocated
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Header(u32);

impl Header {
  /// Packs a header.
  ///
  /// # Panics
  ///
  /// Panics if `size` is not a multiple of 8 or does not fit in a header.
  pub const fn new(
    size: usize,
    prev_allocated: bool,
    allocated: bool,
  ) -> Self {
    match Self::try_new(size, prev_allocated, allocated) {
      Some(header) => header,
      None => panic!("block size must be a multiple of 8 below 4 GiB"),
    }
  }

  /// Packs a header, or returns `None` for a size the codec rejects.
  pub const fn try_new(
    size: usize,
    prev_allocated: bool,
    allocated: bool,
  ) -> Option<Self> {
    if size % 8 != 0 || size > MAX_BLOCK {
      return None;
    }

    let mut bits = size as u32;
    if prev_allocated {
      bits |= PREV_ALLOCATED;
    }
    if allocated {
      bits |= ALLOCATED;
    }

    Some(Self(bits))
  }

  /// Reinterprets a raw word read from the arena.
  pub const fn from_bits(bits: u32) -> Self {
    Self(bits)
  }

  pub const fn bits(self) -> u32 {
    self.0
  }

  pub const fn size(self) -> usize {
    (self.0 & SIZE_MASK) as usize
  }

  pub const fn is_allocated(self) -> bool {
    self.0 & ALLOCATED != 0
  }

  pub const fn prev_is_allocated(self) -> bool {
    self.0 & PREV_ALLOCATED != 0
  }

  /// Same header with the allocation bit replaced.
  pub const fn with_allocated(
    self,
    allocated: bool,
  ) -> Self {
    if allocated {
      Self(self.0 | ALLOCATED)
    } else {
      Self(self.0 & !ALLOCATED)
    }
  }

  /// Same header with the previous-block bit replaced.
  pub const fn with_prev_allocated(
    self,
    prev_allocated: bool,
  ) -> Self {
    if prev_allocated {
      Self(self.0 | PREV_ALLOCATED)
    } else {
      Self(self.0 & !PREV_ALLOCATED)
    }
  }
}

impl fmt::Debug for Header {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("Header")
      .field("size", &self.size())
      .field("prev_allocated", &self.prev_is_allocated())
      .field("allocated", &self.is_allocated())
      .finish()
  }
}
