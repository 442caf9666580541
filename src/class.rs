/// Number of segregated size classes. Class `k` holds free blocks with sizes in
/// `[2^k, 2^(k+1))`; the last class also takes everything above 16 MiB.
pub const CLASS_COUNT: usize = 25;

/// Returns the size class of a block size: the position of its highest set
/// bit, clamped to `[0, CLASS_COUNT - 1]`.
#[inline]
pub const fn class_of(size: usize) -> usize {
  if size == 0 {
    return 0;
  }

  let log2 = (usize::BITS - 1 - size.leading_zeros()) as usize;

  if log2 >= CLASS_COUNT {
    CLASS_COUNT - 1
  } else {
    log2
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_powers_of_two_start_a_class() {
    for k in 0..CLASS_COUNT {
      assert_eq!(class_of(1 << k), k);
      assert_eq!(class_of((1 << (k + 1)) - 1), k);
    }
  }

  #[test]
  fn test_block_sizes() {
    assert_eq!(class_of(24), 4);
    assert_eq!(class_of(32), 5);
    assert_eq!(class_of(2048), 11);
    assert_eq!(class_of(4096), 12);
    assert_eq!(class_of(4104), 12);
  }

  #[test]
  fn test_clamped_to_last_class() {
    assert_eq!(class_of(16 << 20), CLASS_COUNT - 1);
    assert_eq!(class_of(1 << 30), CLASS_COUNT - 1);
    assert_eq!(class_of(usize::MAX), CLASS_COUNT - 1);
  }

  #[test]
  fn test_zero_maps_to_first_class() {
    assert_eq!(class_of(0), 0);
  }
}
