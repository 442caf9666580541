use crate::{
  arena::{Arena, Offset},
  class::{CLASS_COUNT, class_of},
};

/// Heads of the segregated free lists, one per size class.
///
/// Each list is intrusive and doubly linked through the `pred`/`succ` fields
/// of the free blocks themselves. Insertion is LIFO.
///
/// ```text
///   heads[k] ──► ┌──────┐ succ ┌──────┐ succ ┌──────┐
///                │ newest│ ───► │      │ ───► │oldest│ ───► None
///   None ◄────── └──────┘ ◄─── └──────┘ ◄─── └──────┘
///                  pred          pred          pred
/// ```
pub(crate) struct FreeLists {
  heads: [Option<Offset>; CLASS_COUNT],
}

impl FreeLists {
  pub const fn new() -> Self {
    Self {
      heads: [None; CLASS_COUNT],
    }
  }

  pub fn head(
    &self,
    class: usize,
  ) -> Option<Offset> {
    self.heads[class]
  }

  /// Pushes a free block to the front of its class.
  ///
  /// # Safety
  ///
  /// `block` is a free block of `arena` with valid tags that is not already
  /// linked.
  pub unsafe fn insert(
    &mut self,
    arena: &mut Arena,
    block: Offset,
  ) {
    unsafe {
      let class = class_of(arena.header(block).size());
      let old_head = self.heads[class];

      arena.set_pred(block, None);
      arena.set_succ(block, old_head);
      if let Some(old_head) = old_head {
        arena.set_pred(old_head, Some(block));
      }

      self.heads[class] = Some(block);
    }
  }

  /// Splices a block out of its class without searching.
  ///
  /// # Safety
  ///
  /// `block` is linked in the class of its current size.
  pub unsafe fn remove(
    &mut self,
    arena: &mut Arena,
    block: Offset,
  ) {
    unsafe {
      let class = class_of(arena.header(block).size());
      let pred = arena.pred(block);
      let succ = arena.succ(block);

      match pred {
        Some(pred) => arena.set_succ(pred, succ),
        None => {
          debug_assert_eq!(self.heads[class], Some(block), "unlinking a block that heads no list");
          self.heads[class] = succ;
        }
      }

      if let Some(succ) = succ {
        arena.set_pred(succ, pred);
      }
    }
  }

  /// First block, in list order, of class `class` or above whose size is at
  /// least `size`.
  ///
  /// # Safety
  ///
  /// Every linked block of `arena` has valid tags and links.
  pub unsafe fn first_fit(
    &self,
    arena: &Arena,
    size: usize,
  ) -> Option<Offset> {
    for class in class_of(size)..CLASS_COUNT {
      for block in unsafe { self.iter(arena, class) } {
        if unsafe { arena.header(block).size() } >= size {
          return Some(block);
        }
      }
    }

    None
  }

  /// Walks one class from head to tail.
  ///
  /// # Safety
  ///
  /// Every linked block of `arena` has valid links for as long as the
  /// iterator is used.
  pub unsafe fn iter<'a>(
    &self,
    arena: &'a Arena,
    class: usize,
  ) -> Iter<'a> {
    Iter {
      arena,
      next: self.heads[class],
    }
  }
}

pub(crate) struct Iter<'a> {
  arena: &'a Arena,
  next: Option<Offset>,
}

impl Iterator for Iter<'_> {
  type Item = Offset;

  fn next(&mut self) -> Option<Offset> {
    let current = self.next?;
    self.next = unsafe { self.arena.succ(current) };
    Some(current)
  }
}

#[cfg(test)]
mod tests {
  use std::ptr::NonNull;

  use super::*;
  use crate::block::Header;

  struct Fixture {
    _words: Vec<u64>,
    arena: Arena,
    lists: FreeLists,
  }

  impl Fixture {
    fn new() -> Self {
      let mut words = vec![0u64; 512];
      let base = NonNull::new(words.as_mut_ptr().cast::<u8>()).unwrap();
      let arena = Arena::new(base, words.len() * 8);

      Self {
        _words: words,
        arena,
        lists: FreeLists::new(),
      }
    }

    fn free_block(
      &mut self,
      at: usize,
      size: usize,
    ) -> Offset {
      let at = Offset::new(at);
      unsafe {
        self.arena.set_tags(at, Header::new(size, true, false));
        self.lists.insert(&mut self.arena, at);
      }
      at
    }

    fn class(
      &self,
      class: usize,
    ) -> Vec<Offset> {
      unsafe { self.lists.iter(&self.arena, class).collect() }
    }
  }

  #[test]
  fn test_insert_is_lifo() {
    let mut fx = Fixture::new();

    let a = fx.free_block(4, 32);
    let b = fx.free_block(100, 40);
    let c = fx.free_block(204, 48);

    assert_eq!(fx.class(5), vec![c, b, a]);
    unsafe {
      assert_eq!(fx.arena.pred(c), None);
      assert_eq!(fx.arena.pred(b), Some(c));
      assert_eq!(fx.arena.pred(a), Some(b));
    }
  }

  #[test]
  fn test_blocks_land_in_their_class() {
    let mut fx = Fixture::new();

    let small = fx.free_block(4, 24);
    let large = fx.free_block(100, 1024);

    assert_eq!(fx.lists.head(4), Some(small));
    assert_eq!(fx.lists.head(10), Some(large));
    assert_eq!(fx.lists.head(5), None);
  }

  #[test]
  fn test_remove_head_middle_and_tail() {
    let mut fx = Fixture::new();

    let a = fx.free_block(4, 32);
    let b = fx.free_block(100, 32);
    let c = fx.free_block(204, 32);
    let d = fx.free_block(300, 32);

    unsafe { fx.lists.remove(&mut fx.arena, b) };
    assert_eq!(fx.class(5), vec![d, c, a]);

    unsafe { fx.lists.remove(&mut fx.arena, d) };
    assert_eq!(fx.class(5), vec![c, a]);
    unsafe { assert_eq!(fx.arena.pred(c), None) };

    unsafe { fx.lists.remove(&mut fx.arena, a) };
    assert_eq!(fx.class(5), vec![c]);

    unsafe { fx.lists.remove(&mut fx.arena, c) };
    assert_eq!(fx.lists.head(5), None);
  }

  #[test]
  fn test_first_fit_escalates_classes() {
    let mut fx = Fixture::new();

    let small = fx.free_block(4, 40);
    let big = fx.free_block(100, 512);

    unsafe {
      assert_eq!(fx.lists.first_fit(&fx.arena, 32), Some(small));
      assert_eq!(fx.lists.first_fit(&fx.arena, 48), Some(big));
      assert_eq!(fx.lists.first_fit(&fx.arena, 1024), None);
    }
  }

  #[test]
  fn test_first_fit_is_first_not_best() {
    let mut fx = Fixture::new();

    let exact = fx.free_block(4, 40);
    let roomy = fx.free_block(100, 56);

    assert_eq!(fx.class(5), vec![roomy, exact]);
    unsafe { assert_eq!(fx.lists.first_fit(&fx.arena, 40), Some(roomy)) };
  }
}
