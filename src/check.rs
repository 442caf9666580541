use std::collections::BTreeSet;

use crate::{
  align::ALIGNMENT,
  arena::{Arena, Offset},
  block::{HEADER_SIZE, Header, MIN_BLOCK},
  class::{CLASS_COUNT, class_of},
  error::CheckError,
  free_list::FreeLists,
  heap::{FIRST_BLOCK, SENTINELS},
};

/// Totals gathered by a successful heap check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapReport {
  /// Bytes grown so far, sentinels included.
  pub arena_bytes: usize,
  pub allocated_blocks: usize,
  pub allocated_bytes: usize,
  pub free_blocks: usize,
  pub free_bytes: usize,
  pub largest_free: usize,
}

/// Walks the arena block by block, then every free list, and compares the
/// two views. Every header is bounds-checked before the walk steps past it,
/// so a corrupt heap is reported rather than read out of bounds.
pub(crate) fn check(
  arena: &Arena,
  lists: &FreeLists,
) -> Result<HeapReport, CheckError> {
  let (report, free) = walk_blocks(arena)?;
  walk_lists(arena, lists, &free)?;
  Ok(report)
}

fn walk_blocks(arena: &Arena) -> Result<(HeapReport, BTreeSet<Offset>), CheckError> {
  let len = arena.len();
  if len < SENTINELS {
    return Err(CheckError::BadPrologue { bits: 0 });
  }

  let prologue = unsafe { arena.header(Offset::new(0)) };
  if prologue != Header::new(0, false, true) {
    return Err(CheckError::BadPrologue {
      bits: prologue.bits(),
    });
  }

  let epilogue = Offset::new(len - HEADER_SIZE);
  let mut report = HeapReport {
    arena_bytes: len,
    ..HeapReport::default()
  };
  let mut free = BTreeSet::new();
  let mut prev: Option<(Offset, bool)> = None;
  let mut at = FIRST_BLOCK;

  loop {
    if at > epilogue {
      return Err(CheckError::BadEpilogue {
        expected: epilogue,
        found: at,
      });
    }

    let header = unsafe { arena.header(at) };
    let prev_allocated = prev.is_none_or(|(_, allocated)| allocated);
    if header.prev_is_allocated() != prev_allocated {
      return Err(CheckError::StalePrevBit {
        at,
        recorded: header.prev_is_allocated(),
        actual: prev_allocated,
      });
    }

    let size = header.size();
    if size == 0 {
      if at != epilogue || !header.is_allocated() {
        return Err(CheckError::BadEpilogue {
          expected: epilogue,
          found: at,
        });
      }
      return Ok((report, free));
    }

    if (at.get() + HEADER_SIZE) % ALIGNMENT != 0 {
      return Err(CheckError::Misaligned { at });
    }
    if size < MIN_BLOCK {
      return Err(CheckError::Undersized { at, size });
    }
    if at.get() + size > epilogue.get() {
      return Err(CheckError::Overrun {
        at,
        size,
        arena_len: len,
      });
    }

    if header.is_allocated() {
      report.allocated_blocks += 1;
      report.allocated_bytes += size;
    } else {
      if let Some((first, false)) = prev {
        return Err(CheckError::Uncoalesced { first, second: at });
      }

      let footer = unsafe { arena.footer(at) };
      if footer != header {
        return Err(CheckError::FooterMismatch {
          at,
          header: header.bits(),
          footer: footer.bits(),
        });
      }

      free.insert(at);
      report.free_blocks += 1;
      report.free_bytes += size;
      report.largest_free = report.largest_free.max(size);
    }

    prev = Some((at, header.is_allocated()));
    at = at.add(size);
  }
}

fn walk_lists(
  arena: &Arena,
  lists: &FreeLists,
  free: &BTreeSet<Offset>,
) -> Result<(), CheckError> {
  let mut listed = BTreeSet::new();

  for class in 0..CLASS_COUNT {
    let mut pred = None;
    let mut cursor = lists.head(class);

    while let Some(at) = cursor {
      // Only blocks the walk proved free are safe to follow.
      if !free.contains(&at) {
        return Err(CheckError::NotFree { class, at });
      }
      if !listed.insert(at) {
        return Err(CheckError::Cycle { class, at });
      }

      let size = unsafe { arena.header(at).size() };
      let expected = class_of(size);
      if expected != class {
        return Err(CheckError::WrongClass {
          at,
          size,
          found: class,
          expected,
        });
      }

      if unsafe { arena.pred(at) } != pred {
        return Err(CheckError::BrokenLink { at });
      }

      pred = Some(at);
      cursor = unsafe { arena.succ(at) };
    }
  }

  match free.difference(&listed).next() {
    Some(&at) => Err(CheckError::Unlisted { at }),
    None => Ok(()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{Heap, MemGrower};

  fn heap() -> Heap {
    Heap::new(MemGrower::with_capacity(1 << 16)).unwrap()
  }

  /// Heap with a free block wedged between two allocations.
  fn holey() -> (Heap, Offset) {
    let mut heap = heap();

    let a = heap.allocate(40).unwrap();
    let b = heap.allocate(40).unwrap();
    let _c = heap.allocate(40).unwrap();
    unsafe { heap.release(b.as_ptr()) };

    let hole = heap.arena.block_of(b.as_ptr()).unwrap();
    assert_eq!(heap.arena.block_of(a.as_ptr()), Some(FIRST_BLOCK));
    (heap, hole)
  }

  #[test]
  fn test_report_totals() {
    let (heap, _) = holey();
    let report = heap.check().unwrap();

    assert_eq!(report.allocated_blocks, 2);
    assert_eq!(report.allocated_bytes, 96);
    assert_eq!(report.free_blocks, 2);
    assert_eq!(report.free_bytes, 4096 - 96);
    assert_eq!(report.largest_free, 4096 - 144);
    assert_eq!(report.allocated_bytes + report.free_bytes + SENTINELS, report.arena_bytes);
  }

  #[test]
  fn test_detects_stale_prev_bit() {
    let (mut heap, hole) = holey();

    unsafe {
      let after = hole.add(48);
      let header = heap.arena.header(after);
      heap.arena.set_header(after, header.with_prev_allocated(true));
    }

    assert!(matches!(heap.check(), Err(CheckError::StalePrevBit { .. })));
  }

  #[test]
  fn test_detects_footer_mismatch() {
    let (mut heap, hole) = holey();

    unsafe {
      let footer_at = hole.add(48 - HEADER_SIZE);
      heap.arena.set_header(footer_at, Header::new(40, true, false));
    }

    assert_eq!(
      heap.check(),
      Err(CheckError::FooterMismatch {
        at: hole,
        header: Header::new(48, true, false).bits(),
        footer: Header::new(40, true, false).bits(),
      })
    );
  }

  #[test]
  fn test_detects_uncoalesced_neighbors() {
    let mut heap = heap();

    let a = heap.allocate(40).unwrap();
    let _b = heap.allocate(40).unwrap();
    let at = heap.arena.block_of(a.as_ptr()).unwrap();

    // Free `a` by hand without merging, then mark its neighbor free too.
    unsafe {
      heap.arena.set_tags(at, Header::new(48, true, false));
      let next = at.add(48);
      let next_header = heap.arena.header(next);
      heap.arena.set_tags(next, next_header.with_allocated(false).with_prev_allocated(false));
    }

    assert_eq!(
      heap.check(),
      Err(CheckError::Uncoalesced {
        first: at,
        second: at.add(48),
      })
    );
  }

  #[test]
  fn test_detects_unlisted_free_block() {
    let (mut heap, hole) = holey();

    unsafe { heap.lists.remove(&mut heap.arena, hole) };

    assert_eq!(heap.check(), Err(CheckError::Unlisted { at: hole }));
  }

  #[test]
  fn test_detects_listed_allocated_block() {
    let (mut heap, _) = holey();

    unsafe {
      let header = heap.arena.header(FIRST_BLOCK);
      heap.arena.set_tags(FIRST_BLOCK, header.with_allocated(false));
      heap.lists.insert(&mut heap.arena, FIRST_BLOCK);
      heap.arena.set_header(FIRST_BLOCK, header);
    }

    assert_eq!(
      heap.check(),
      Err(CheckError::NotFree {
        class: class_of(48),
        at: FIRST_BLOCK,
      })
    );
  }

  #[test]
  fn test_detects_broken_back_link() {
    let (mut heap, hole) = holey();

    unsafe { heap.arena.set_pred(hole, Some(FIRST_BLOCK)) };

    assert_eq!(heap.check(), Err(CheckError::BrokenLink { at: hole }));
  }

  #[test]
  fn test_detects_cycle() {
    let (mut heap, hole) = holey();

    unsafe { heap.arena.set_succ(hole, Some(hole)) };

    assert_eq!(
      heap.check(),
      Err(CheckError::Cycle {
        class: class_of(48),
        at: hole,
      })
    );
  }

  #[test]
  fn test_detects_corrupt_prologue() {
    let (mut heap, _) = holey();

    unsafe { heap.arena.set_header(Offset::new(0), Header::new(8, false, true)) };

    assert!(matches!(heap.check(), Err(CheckError::BadPrologue { .. })));
  }

  #[test]
  fn test_detects_overrun() {
    let (mut heap, _) = holey();

    unsafe { heap.arena.set_header(FIRST_BLOCK, Header::new(1 << 20, true, true)) };

    assert!(matches!(heap.check(), Err(CheckError::Overrun { .. })));
  }
}
