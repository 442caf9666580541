use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use segheap::{Heap, MemGrower};
use std::hint::black_box;

const OPS: u64 = 100_000;
const LIVE: usize = 64;

fn heap() -> Heap {
  Heap::new(MemGrower::with_capacity(16 << 20)).unwrap()
}

/// segheap alloc/free throughput.
fn segheap_allocate_release(
  heap: &mut Heap,
  size: usize,
) {
  for _ in 0..OPS {
    let ptr = heap.allocate(size).unwrap();
    black_box(ptr);
    unsafe { heap.release(ptr.as_ptr()) };
  }
}

/// libc alloc/free throughput.
fn libc_malloc_free(size: usize) {
  for _ in 0..OPS {
    unsafe {
      let ptr = libc::malloc(size);
      black_box(ptr);
      libc::free(ptr);
    }
  }
}

/// Keeps `LIVE` allocations of mixed sizes around and replaces them in a
/// rotating order, so frees land between live blocks and coalescing runs.
fn segheap_churn(heap: &mut Heap) {
  let mut slots = [std::ptr::null_mut::<u8>(); LIVE];

  for i in 0..OPS as usize {
    let slot = (i * 7) % LIVE;
    let size = 16 + (i * 37) % 2000;

    unsafe {
      heap.release(slots[slot]);
      slots[slot] = heap.allocate(size).unwrap().as_ptr();
    }
  }

  for ptr in slots {
    unsafe { heap.release(ptr) };
  }
}

fn libc_churn() {
  let mut slots = [std::ptr::null_mut::<libc::c_void>(); LIVE];

  for i in 0..OPS as usize {
    let slot = (i * 7) % LIVE;
    let size = 16 + (i * 37) % 2000;

    unsafe {
      libc::free(slots[slot]);
      slots[slot] = libc::malloc(size);
    }
  }

  for ptr in slots {
    unsafe { libc::free(ptr) };
  }
}

fn benchmark_allocate_release(c: &mut Criterion) {
  let mut group = c.benchmark_group("allocate_release");

  for size in [16, 64, 256, 1024, 4096] {
    group.throughput(Throughput::Elements(OPS));

    group.bench_with_input(BenchmarkId::new("segheap", size), &size, |b, &size| {
      let mut heap = heap();
      b.iter(|| segheap_allocate_release(&mut heap, size))
    });

    group.bench_with_input(BenchmarkId::new("libc", size), &size, |b, &size| {
      b.iter(|| libc_malloc_free(size))
    });
  }

  group.finish();
}

fn benchmark_churn(c: &mut Criterion) {
  let mut group = c.benchmark_group("churn");
  group.throughput(Throughput::Elements(OPS));

  group.bench_function("segheap", |b| {
    let mut heap = heap();
    b.iter(|| segheap_churn(&mut heap))
  });

  group.bench_function("libc", |b| b.iter(libc_churn));

  group.finish();
}

criterion_group!(benches, benchmark_allocate_release, benchmark_churn);
criterion_main!(benches);
