use crate::error::{Error, Result};

/// Chunk size used when the pool has at least as many members as the dataset
/// has elements. Kept at 2 for compatibility with the historical policy; a
/// tunable, not a correctness requirement.
pub const OVERSIZED_POOL_CHUNK: usize = 2;

/// Slice length a worker receives, given the pool and dataset sizes.
///
/// The policy favors a small number of large, evenly sized slices over many
/// tiny ones: per-worker dispatch overhead dwarfs the imbalance of one short
/// tail slice.
pub fn chunk_size(pool_size: usize, dataset_len: usize) -> usize {
    if dataset_len < 2 {
        return dataset_len;
    }
    if pool_size < 2 {
        return dataset_len;
    }
    if pool_size >= dataset_len {
        return OVERSIZED_POOL_CHUNK;
    }
    if dataset_len % pool_size == 0 {
        dataset_len / pool_size
    } else {
        dataset_len / pool_size + 1
    }
}

/// Number of workers that actually receive a slice: `ceil(len / chunk)`,
/// with an empty dataset mapping to zero workers rather than dividing by
/// zero.
pub fn effective_workers(dataset_len: usize, chunk_size: usize) -> usize {
    if chunk_size == 0 {
        return 0;
    }
    if dataset_len % chunk_size == 0 {
        dataset_len / chunk_size
    } else {
        dataset_len / chunk_size + 1
    }
}

/// A contiguous sub-range of the dataset owned by one rank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slice {
    pub rank: usize,
    pub offset: usize,
    pub len: usize,
}

impl Slice {
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// How a run splits the dataset: every slice but the last has length
/// `chunk_size`, the last absorbs the remainder, and together the `workers`
/// slices cover `[0, dataset_len)` exactly once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartitionPlan {
    pub pool_size: usize,
    pub dataset_len: usize,
    pub chunk_size: usize,
    pub workers: usize,
}

impl PartitionPlan {
    /// Derives and validates the plan. Pure: identical inputs yield the
    /// identical plan.
    pub fn compute(pool_size: usize, dataset_len: usize) -> Result<Self> {
        let chunk_size = chunk_size(pool_size, dataset_len);
        let workers = effective_workers(dataset_len, chunk_size);
        let plan = Self { pool_size, dataset_len, chunk_size, workers };
        plan.validate()?;
        Ok(plan)
    }

    fn validate(&self) -> Result<()> {
        if self.workers > self.pool_size {
            return Err(Error::PlanningDefect(format!(
                "{} workers planned for a pool of {}",
                self.workers, self.pool_size
            )));
        }
        if self.dataset_len > 0 && self.chunk_size == 0 {
            return Err(Error::PlanningDefect(format!(
                "zero chunk size for {} elements",
                self.dataset_len
            )));
        }
        if self.workers > 0 {
            let tail = self.dataset_len - (self.workers - 1) * self.chunk_size;
            if tail == 0 || tail > self.chunk_size {
                return Err(Error::PlanningDefect(format!(
                    "tail slice of {} elements against chunk size {}",
                    tail, self.chunk_size
                )));
            }
        }
        Ok(())
    }

    /// The slices in rank order. Slice 0 is the coordinator's own; the rest
    /// are shipped out.
    pub fn slices(&self) -> impl Iterator<Item = Slice> + '_ {
        (0..self.workers).map(move |rank| {
            let offset = rank * self.chunk_size;
            let len = if rank < self.workers - 1 {
                self.chunk_size
            } else {
                self.dataset_len - offset
            };
            Slice { rank, offset, len }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiny_dataset_takes_its_own_length() {
        assert_eq!(chunk_size(8, 0), 0);
        assert_eq!(chunk_size(8, 1), 1);
    }

    #[test]
    fn solo_pool_takes_everything() {
        assert_eq!(chunk_size(1, 100), 100);
        let plan = PartitionPlan::compute(1, 100).unwrap();
        assert_eq!(plan.workers, 1);
        assert_eq!(plan.slices().next().unwrap(), Slice { rank: 0, offset: 0, len: 100 });
    }

    #[test]
    fn oversized_pool_caps_chunk_at_two() {
        assert_eq!(chunk_size(10, 5), 2);
        let plan = PartitionPlan::compute(10, 5).unwrap();
        assert_eq!(plan.chunk_size, 2);
        assert_eq!(plan.workers, 3);
        let slices: Vec<Slice> = plan.slices().collect();
        assert_eq!(
            slices,
            vec![
                Slice { rank: 0, offset: 0, len: 2 },
                Slice { rank: 1, offset: 2, len: 2 },
                Slice { rank: 2, offset: 4, len: 1 },
            ]
        );
    }

    #[test]
    fn even_division_yields_exact_quotient() {
        assert_eq!(chunk_size(4, 100), 25);
        assert_eq!(effective_workers(100, 25), 4);
    }

    #[test]
    fn uneven_division_rounds_chunk_up() {
        // 8 elements over 3 workers: chunk 3, slices 3+3+2
        let plan = PartitionPlan::compute(3, 8).unwrap();
        assert_eq!(plan.chunk_size, 3);
        assert_eq!(plan.workers, 3);
        let lens: Vec<usize> = plan.slices().map(|s| s.len).collect();
        assert_eq!(lens, vec![3, 3, 2]);
    }

    #[test]
    fn empty_dataset_plans_zero_workers() {
        let plan = PartitionPlan::compute(8, 0).unwrap();
        assert_eq!(plan.workers, 0);
        assert_eq!(plan.slices().count(), 0);
    }

    #[test]
    fn planner_is_deterministic() {
        for _ in 0..3 {
            assert_eq!(PartitionPlan::compute(7, 1000).unwrap(), PartitionPlan::compute(7, 1000).unwrap());
        }
    }

    #[test]
    fn slices_tile_the_dataset_exactly() {
        for pool_size in 1..=32 {
            for dataset_len in 0..=257 {
                let plan = PartitionPlan::compute(pool_size, dataset_len)
                    .unwrap_or_else(|e| panic!("pool {} len {}: {}", pool_size, dataset_len, e));
                assert!(plan.workers <= pool_size, "pool {} len {}", pool_size, dataset_len);
                let mut next = 0;
                for slice in plan.slices() {
                    assert_eq!(slice.offset, next, "gap/overlap at pool {} len {}", pool_size, dataset_len);
                    assert!(slice.len > 0);
                    assert!(slice.len <= plan.chunk_size);
                    next += slice.len;
                }
                assert_eq!(next, dataset_len, "coverage at pool {} len {}", pool_size, dataset_len);
            }
        }
    }

    #[test]
    fn inconsistent_plan_is_rejected() {
        let plan = PartitionPlan { pool_size: 2, dataset_len: 100, chunk_size: 10, workers: 10 };
        assert!(matches!(plan.validate(), Err(Error::PlanningDefect(_))));
        let plan = PartitionPlan { pool_size: 4, dataset_len: 100, chunk_size: 0, workers: 0 };
        assert!(matches!(plan.validate(), Err(Error::PlanningDefect(_))));
    }
}
