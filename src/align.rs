/// Alignment of every block boundary and block size in the heap.
pub const ALIGNMENT: usize = 8;

/// Rounds the given size up to the heap's 8-byte block alignment.
///
/// # Examples
///
/// ```rust
/// use segheap::align;
///
/// assert_eq!(align!(13), 16);
/// assert_eq!(align!(16), 16);
/// assert_eq!(align!(0), 0);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + $crate::align::ALIGNMENT - 1) & !($crate::align::ALIGNMENT - 1)
  };
}

/// Like [`align!`], but returns `None` instead of overflowing.
pub const fn checked_align(value: usize) -> Option<usize> {
  match value.checked_add(ALIGNMENT - 1) {
    Some(v) => Some(v & !(ALIGNMENT - 1)),
    None => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_align_rounds_up_to_block_boundary() {
    let cases = [(1, 8), (4, 8), (8, 8), (9, 16), (20, 24), (28, 32), (2044, 2048), (4076, 4080)];

    for (size, aligned) in cases {
      assert_eq!(align!(size), aligned, "align!({})", size);
      assert_eq!(checked_align(size), Some(aligned));
    }
  }

  #[test]
  fn test_checked_align() {
    assert_eq!(checked_align(4093), Some(4096));
    assert_eq!(checked_align(24), Some(24));
    assert_eq!(checked_align(usize::MAX), None);
    assert_eq!(checked_align(usize::MAX - 7), Some(usize::MAX - 7));
  }
}
