use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use markup_dataset::{BatchPlanner, Bucket, DimensionIndex, DimensionKey, Sample};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Benchmarks for `BatchPlanner::plan`.
///
/// Plans are rebuilt on every pass start and every reconfiguration, so this measures:
/// 1. Ordered planning: chunking alone
/// 2. Shuffled planning: per-bucket and global permutations on top
///
/// ```bash
/// cargo bench --bench planner_bench
/// ```

/// Sample counts swept from 1K to 1M.
const SIZES: [usize; 4] = [1_000, 10_000, 100_000, 1_000_000];

/// Formula renders land in a few hundred distinct sizes.
const NUM_BUCKETS: usize = 256;

/// Spreads `size` samples round-robin over `NUM_BUCKETS` buckets. No files are touched.
fn make_index(size: usize) -> DimensionIndex {
    let mut buckets: Vec<Vec<Sample>> = vec![Vec::new(); NUM_BUCKETS];
    for id in 0..size {
        buckets[id % NUM_BUCKETS].push(Sample::new(id, "x^2", format!("{id}.png")));
    }
    DimensionIndex::from_buckets(buckets.into_iter().enumerate().map(|(i, samples)| {
        let key = DimensionKey::new(32 + 16 * (i as u32 % 32), 32 + 16 * (i as u32 / 32));
        Bucket::new(key, samples)
    }))
}

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("Plan");
    let ordered = BatchPlanner::new(16, false, false).unwrap();
    let shuffled = BatchPlanner::new(16, true, true).unwrap();

    for &size in &SIZES {
        let index = make_index(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("ordered", size), &index, |b, index| {
            let mut rng = StdRng::seed_from_u64(0);
            b.iter(|| black_box(ordered.plan(index, &mut rng).len()))
        });

        group.bench_with_input(BenchmarkId::new("shuffled", size), &index, |b, index| {
            let mut rng = StdRng::seed_from_u64(0);
            b.iter(|| black_box(shuffled.plan(index, &mut rng).len()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_plan);
criterion_main!(benches);
