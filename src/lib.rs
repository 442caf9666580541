//! # segheap - A Segregated Free-List Heap
//!
//! This crate provides a general-purpose `malloc`/`free`/`realloc` style heap
//! that manages one contiguous byte range grown on demand, `sbrk`-style.
//!
//! ## Overview
//!
//! Free blocks are kept in 25 size classes, one per power of two. A request
//! starts its search in the class its size belongs to and takes the first
//! block that fits, walking up through larger classes:
//!
//! ```text
//!   Free List Table:
//!
//!   class  0 [   1 ..    1]  ─► ∅
//!   ...
//!   class  4 [  16 ..   31]  ─► 24 ─► 24 ─► ∅
//!   class  5 [  32 ..   63]  ─► 48 ─► 56 ─► 32 ─► ∅
//!   class  6 [  64 ..  127]  ─► ∅
//!   ...
//!   class 11 [2048 .. 4095]  ─► 3952 ─► ∅
//!   ...
//!   class 24 [2^24 ..     ]  ─► ∅
//! ```
//!
//! Lists are LIFO: a released block goes to the front of its class.
//!
//! ## Crate Structure
//!
//! ```text
//!   segheap
//!   ├── align      - Alignment macro (align!)
//!   ├── block      - Packed header/footer tags and block constants
//!   ├── class      - Size-class index
//!   ├── arena      - Offsets and raw access into the grown range (internal)
//!   ├── grower     - Grower trait, MemGrower, SbrkGrower
//!   ├── free_list  - Intrusive per-class free lists (internal)
//!   ├── heap       - Heap: allocate, release, reallocate
//!   ├── check      - Heap consistency checker and HeapReport
//!   ├── config     - HeapConfig
//!   └── error      - Error, OutOfMemory, CheckError
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use segheap::{Heap, MemGrower};
//!
//! let mut heap = Heap::new(MemGrower::with_capacity(1 << 20)).unwrap();
//!
//! let ptr = heap.allocate(64).unwrap();
//! unsafe {
//!   ptr.as_ptr().cast::<u64>().write(42);
//!   assert_eq!(ptr.as_ptr().cast::<u64>().read(), 42);
//!
//!   let ptr = heap.reallocate(ptr.as_ptr(), 256).unwrap();
//!   assert_eq!(ptr.as_ptr().cast::<u64>().read(), 42);
//!   heap.release(ptr.as_ptr());
//! }
//!
//! assert_eq!(heap.check().unwrap().allocated_blocks, 0);
//! ```
//!
//! ## How It Works
//!
//! Every block carries a 4-byte header; free blocks also carry a matching
//! footer and two free-list links in what would be the payload:
//!
//! ```text
//!   Allocated Block:
//!   ┌────────────┬──────────────────────────────────────────┐
//!   │ size|P|A=1 │              payload                     │
//!   └────────────┴──────────────────────────────────────────┘
//!       4 bytes  ▲
//!                └── Pointer returned to user (8-byte aligned)
//!
//!   Free Block:
//!   ┌────────────┬──────────┬──────────┬─────────┬────────────┐
//!   │ size|P|A=0 │   pred   │   succ   │  ....   │ size|P|A=0 │
//!   └────────────┴──────────┴──────────┴─────────┴────────────┘
//!       4 bytes     8 bytes    8 bytes               4 bytes
//!
//!   A = this block is allocated
//!   P = the block physically before this one is allocated
//! ```
//!
//! Releasing a block merges it with free neighbors right away, using the
//! `P` bit and the neighbor's footer to find the block before it. When no
//! class can serve a request the arena grows by at least one chunk, and the
//! old epilogue becomes the header of the new free block.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: No synchronization primitives
//! - **Never shrinks**: Grown bytes are not returned to the grower
//! - **Fixed alignment**: Payloads are aligned to 8 bytes, no more
//!
//! ## Safety
//!
//! `release`, `reallocate` and `usable_size` take raw pointers and trust the
//! caller that they came from the same heap. Debug builds catch the common
//! misuse (double free, foreign pointer); release builds do not.

pub mod align;
mod arena;
mod block;
mod check;
mod class;
mod config;
mod error;
mod free_list;
mod grower;
mod heap;

pub use arena::Offset;
pub use block::{HEADER_SIZE, Header, MIN_BLOCK};
pub use check::HeapReport;
pub use class::{CLASS_COUNT, class_of};
pub use config::{DEFAULT_CHUNK_SIZE, HeapConfig};
pub use error::{CheckError, Error, OutOfMemory};
#[cfg(unix)]
pub use grower::SbrkGrower;
pub use grower::{DEFAULT_MAX_HEAP, Grower, MemGrower};
pub use heap::Heap;
