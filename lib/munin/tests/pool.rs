use munin::{Min, Pool, PoolConfig, ReduceOp, Sum};
use rand::Rng;

fn fixed_pool(pool_size: usize) -> Pool {
    Pool::new(PoolConfig::fixed(pool_size))
}

#[test]
fn sum_matches_worked_example() {
    let data: Vec<u64> = vec![3, 1, 4, 1, 5, 9, 2, 6];
    let outcome = fixed_pool(3).run(Sum, &data).unwrap();
    assert_eq!(outcome.value, 31);
    assert_eq!(outcome.stats.chunk_size, 3);
    assert_eq!(outcome.stats.workers, 3);
    assert_eq!(outcome.stats.dispatch.slices_shipped, 2);
    let mut ranks: Vec<usize> = outcome.stats.local_reduces.iter().map(|r| r.rank).collect();
    ranks.sort_unstable();
    assert_eq!(ranks, vec![0, 1, 2]);
}

#[test]
fn min_is_partition_invariant() {
    let data: Vec<u8> = vec![7, 2, 9, 2, 5];
    for pool_size in 1..=10 {
        assert_eq!(fixed_pool(pool_size).run(Min, &data).unwrap().value, 2);
    }
}

#[test]
fn solo_pool_sends_no_messages() {
    let data: Vec<u64> = (0..1000).collect();
    let outcome = fixed_pool(1).run(Sum, &data).unwrap();
    assert_eq!(outcome.value, 499_500);
    assert_eq!(outcome.stats.workers, 1);
    assert_eq!(outcome.stats.dispatch.slices_shipped, 0);
    assert_eq!(outcome.stats.dispatch.bytes_shipped, 0);
}

#[test]
fn empty_dataset_reduces_to_identity() {
    let outcome = fixed_pool(4).run(Sum, &[]).unwrap();
    assert_eq!(outcome.value, 0);
    assert_eq!(outcome.stats.workers, 0);
    let outcome = fixed_pool(4).run(Min, &[]).unwrap();
    assert_eq!(outcome.value, u8::MAX);
}

#[test]
fn oversized_pool_leaves_extra_ranks_idle() {
    let data: Vec<u64> = vec![10, 20, 30, 40, 50];
    let outcome = fixed_pool(10).run(Sum, &data).unwrap();
    assert_eq!(outcome.value, 150);
    assert_eq!(outcome.stats.chunk_size, 2);
    assert_eq!(outcome.stats.workers, 3);
    assert_eq!(outcome.stats.dispatch.idle_workers, 7);
}

#[test]
fn pool_reduction_matches_direct_fold() {
    let mut rng = rand::thread_rng();
    for _ in 0..10 {
        let len = rng.gen_range(1usize..2_000);
        let bytes: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
        let wide: Vec<u64> = bytes.iter().map(|&b| b as u64).collect();
        let direct_sum: u64 = wide.iter().sum();
        let direct_min: u8 = bytes.iter().copied().min().unwrap();
        for pool_size in 1..=12 {
            assert_eq!(fixed_pool(pool_size).run(Sum, &wide).unwrap().value, direct_sum);
            assert_eq!(fixed_pool(pool_size).run(Min, &bytes).unwrap().value, direct_min);
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct BitOr;

impl ReduceOp for BitOr {
    type Value = u32;

    fn identity(&self) -> u32 {
        0
    }

    fn combine(&self, a: u32, b: u32) -> u32 {
        a | b
    }
}

#[test]
fn caller_supplied_operator_runs() {
    let data: Vec<u32> = vec![0b0001, 0b0100, 0b0010, 0b1000, 0b0001];
    for pool_size in 1..=6 {
        assert_eq!(fixed_pool(pool_size).run(BitOr, &data).unwrap().value, 0b1111);
    }
}
