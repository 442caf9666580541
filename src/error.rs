use thiserror::Error;

use crate::arena::Offset;

/// The arena grower could not extend the range any further.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("arena grower refused to extend by {requested} bytes")]
pub struct OutOfMemory {
  pub requested: usize,
}

/// Failures of [`Heap::init`](crate::Heap::init).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
  #[error(transparent)]
  OutOfMemory(#[from] OutOfMemory),

  #[error("heap is not initialized")]
  Uninitialized,

  #[error("arena base {base:#x} is not 8-byte aligned")]
  MisalignedArena { base: usize },

  #[error("arena grew discontiguously: expected {expected:#x}, got {actual:#x}")]
  Discontiguous { expected: usize, actual: usize },
}

/// A heap invariant found broken by [`Heap::check`](crate::Heap::check).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CheckError {
  #[error("prologue sentinel is corrupt: {bits:#x}")]
  BadPrologue { bits: u32 },

  #[error("epilogue sentinel expected at {expected}, walk ended at {found}")]
  BadEpilogue { expected: Offset, found: Offset },

  #[error("block at {at} is not 8-byte aligned")]
  Misaligned { at: Offset },

  #[error("block at {at} has size {size}, below the minimum block")]
  Undersized { at: Offset, size: usize },

  #[error("block at {at} with size {size} runs past the arena end {arena_len}")]
  Overrun { at: Offset, size: usize, arena_len: usize },

  #[error("block at {at} says previous allocated = {recorded}, but it is {actual}")]
  StalePrevBit { at: Offset, recorded: bool, actual: bool },

  #[error("free blocks at {first} and {second} are adjacent")]
  Uncoalesced { first: Offset, second: Offset },

  #[error("free block at {at} has header {header:#x} but footer {footer:#x}")]
  FooterMismatch { at: Offset, header: u32, footer: u32 },

  #[error("free block at {at} of size {size} is in class {found}, expected {expected}")]
  WrongClass { at: Offset, size: usize, found: usize, expected: usize },

  #[error("free block at {at} has a broken back link")]
  BrokenLink { at: Offset },

  #[error("free list {class} revisits block at {at}")]
  Cycle { class: usize, at: Offset },

  #[error("free list {class} links block at {at}, which is not a free block")]
  NotFree { class: usize, at: Offset },

  #[error("free block at {at} is missing from the free lists")]
  Unlisted { at: Offset },
}
