use std::{io::Read, ptr::NonNull};

use libc::sbrk;
use segheap::{Heap, HeapConfig, SbrkGrower};

/// Waits until the user presses ENTER, when run with `--step`.
/// Useful when you want to inspect memory state with tools like `pmap` or
/// `gdb` while the trace runs.
fn block_until_enter_pressed(step: bool) {
  if step {
    println!("\n>>> Press ENTER to continue...");
    let _ = std::io::stdin().bytes().next();
  }
}

/// Prints the current program break using `sbrk(0)`.
fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

fn print_heap(heap: &Heap<SbrkGrower>) {
  match heap.check() {
    Ok(report) => println!(
      "    arena = {} bytes | {} allocated ({} bytes) | {} free ({} bytes, largest {})",
      report.arena_bytes,
      report.allocated_blocks,
      report.allocated_bytes,
      report.free_blocks,
      report.free_bytes,
      report.largest_free,
    ),
    Err(err) => println!("    heap is corrupt: {}", err),
  }
}

fn allocate(
  heap: &mut Heap<SbrkGrower>,
  label: &str,
  size: usize,
) -> NonNull<u8> {
  let Some(ptr) = heap.allocate(size) else {
    panic!("allocate({}) failed", size);
  };

  println!(
    "\n[{}] allocate({}) -> {:p} (usable {} bytes)",
    label,
    size,
    ptr,
    unsafe { heap.usable_size(ptr) }
  );
  print_heap(heap);
  ptr
}

fn release(
  heap: &mut Heap<SbrkGrower>,
  label: &str,
  ptr: NonNull<u8>,
) {
  unsafe { heap.release(ptr.as_ptr()) };
  println!("\n[{}] release({:p})", label, ptr);
  print_heap(heap);
}

fn main() {
  env_logger::init();
  let step = std::env::args().any(|arg| arg == "--step");

  print_program_break("start");

  let config = HeapConfig::from_env();
  let mut heap = match Heap::with_config(SbrkGrower::from_config(&config), config) {
    Ok(heap) => heap,
    Err(err) => {
      eprintln!("cannot set up the heap: {}", err);
      std::process::exit(1);
    }
  };

  print_program_break("init");
  print_heap(&heap);
  block_until_enter_pressed(step);

  // Two blocks that fill the first chunk.
  let a = allocate(&mut heap, "a", 2040);
  let b = allocate(&mut heap, "b", 2040);
  block_until_enter_pressed(step);

  release(&mut heap, "b", b);
  block_until_enter_pressed(step);

  // Should land in b's hole without moving the break.
  let small = allocate(&mut heap, "small", 48);
  println!(
    "    small == b? {}",
    if small == b {
      "Yes, it reused the freed block"
    } else {
      "No, it allocated somewhere else"
    }
  );
  block_until_enter_pressed(step);

  // Too big for what is left: the break moves.
  let c = allocate(&mut heap, "c", 4072);
  print_program_break("grown");
  block_until_enter_pressed(step);

  release(&mut heap, "c", c);
  block_until_enter_pressed(step);

  let grown = match unsafe { heap.reallocate(a.as_ptr(), 6000) } {
    Some(ptr) => ptr,
    None => panic!("reallocate(a, 6000) failed"),
  };
  println!("\n[a] reallocate(a, 6000) -> {:p} (moved: {})", grown, grown != a);
  print_heap(&heap);

  release(&mut heap, "a", grown);
  release(&mut heap, "small", small);

  print_program_break("end");
}
