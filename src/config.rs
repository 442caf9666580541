//! Heap configuration.
//!
//! Settings can be built in code or read from the environment:
//!
//! | Variable                | Description                                   | Default  |
//! |-------------------------|-----------------------------------------------|----------|
//! | `SEGHEAP_CHUNK_SIZE`    | Minimum bytes requested per arena growth      | 4096     |
//! | `SEGHEAP_MAX_HEAP`      | Ceiling for growers built from the config     | 20971520 |
//! | `SEGHEAP_GROW_IN_PLACE` | Let `reallocate` absorb a free next block     | true     |
//!
//! ```rust
//! use segheap::HeapConfig;
//!
//! let config = HeapConfig::default().chunk_size(8192).grow_in_place(false);
//! assert_eq!(config.chunk_size, 8192);
//! ```

use std::env;

use crate::{align, block::MIN_BLOCK, grower::DEFAULT_MAX_HEAP};

/// Default minimum arena growth: 4 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 1 << 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapConfig {
  /// Minimum number of bytes the arena grows by. Always a multiple of 8 and
  /// at least one free block.
  pub chunk_size: usize,

  /// Arena ceiling used by [`MemGrower::from_config`](crate::MemGrower::from_config)
  /// and [`SbrkGrower::from_config`](crate::SbrkGrower::from_config).
  pub max_heap: usize,

  /// Whether `reallocate` may grow a block into a free physical successor
  /// instead of moving it.
  pub grow_in_place: bool,
}

impl Default for HeapConfig {
  fn default() -> Self {
    Self {
      chunk_size: DEFAULT_CHUNK_SIZE,
      max_heap: DEFAULT_MAX_HEAP,
      grow_in_place: true,
    }
  }
}

impl HeapConfig {
  /// Reads the `SEGHEAP_*` environment variables, falling back to defaults.
  pub fn from_env() -> Self {
    Self::from_lookup(|key| env::var(key).ok())
  }

  /// Like [`from_env`](Self::from_env), with a custom variable source.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
    let defaults = Self::default();

    Self {
      chunk_size: parse(&lookup, "SEGHEAP_CHUNK_SIZE", defaults.chunk_size),
      max_heap: parse(&lookup, "SEGHEAP_MAX_HEAP", defaults.max_heap),
      grow_in_place: parse(&lookup, "SEGHEAP_GROW_IN_PLACE", defaults.grow_in_place),
    }
    .normalized()
  }

  pub fn chunk_size(
    mut self,
    chunk_size: usize,
  ) -> Self {
    self.chunk_size = chunk_size;
    self.normalized()
  }

  pub fn max_heap(
    mut self,
    max_heap: usize,
  ) -> Self {
    self.max_heap = max_heap;
    self
  }

  pub fn grow_in_place(
    mut self,
    grow_in_place: bool,
  ) -> Self {
    self.grow_in_place = grow_in_place;
    self
  }

  pub(crate) fn normalized(mut self) -> Self {
    let floor = self.chunk_size.max(MIN_BLOCK);
    self.chunk_size = align::checked_align(floor).unwrap_or(DEFAULT_CHUNK_SIZE);
    self
  }
}

fn parse<T: std::str::FromStr>(
  lookup: &impl Fn(&str) -> Option<String>,
  key: &str,
  default: T,
) -> T {
  let Some(raw) = lookup(key) else {
    return default;
  };

  match raw.trim().parse() {
    Ok(value) => value,
    Err(_) => {
      log::warn!("ignoring {}={:?}: not a valid value", key, raw);
      default
    }
  }
}
