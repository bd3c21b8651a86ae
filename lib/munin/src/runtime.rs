use crate::constants::{
    DEFAULT_PARTIAL_TIMEOUT_MS, DEFAULT_PAR_REDUCE_MIN, DEFAULT_QUEUE_CAP, ENV_PARTIAL_TIMEOUT_MS,
    ENV_PAR_REDUCE_MIN, ENV_POOL_SIZE, ENV_QUEUE_CAP,
};
use crate::error::{Error, Result};
use crate::op::ReduceOp;
use crate::plan::PartitionPlan;
use crate::reduce::{combine_partials, fold_slice};
use crate::stats::{CombineStats, DispatchStats, LocalReduceStats, RunStats};
use crate::transport::{Switchboard, WorkerLink};
use serde::Serialize;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// States a run walks through, in order, none skipped.
/// `AwaitingPartials` is the only suspension point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Init,
    Planning,
    Dispatching,
    AwaitingPartials,
    Combining,
    Done,
}

fn advance(phase: &mut Phase, next: Phase) {
    debug!(from = ?*phase, to = ?next, "run phase transition");
    *phase = next;
}

#[derive(Clone, Debug)]
pub struct PoolConfig {
    pub pool_size: usize,
    pub queue_cap: usize,
    pub partial_timeout: Duration,
    pub par_reduce_min: usize,
}

impl PoolConfig {
    pub fn from_env() -> Self {
        let pool_size = env_usize(ENV_POOL_SIZE).unwrap_or_else(num_cpus::get).max(1);
        let queue_cap = env_usize(ENV_QUEUE_CAP).unwrap_or(DEFAULT_QUEUE_CAP).max(1);
        let partial_timeout = Duration::from_millis(
            env_u64(ENV_PARTIAL_TIMEOUT_MS).unwrap_or(DEFAULT_PARTIAL_TIMEOUT_MS),
        );
        let par_reduce_min = env_usize(ENV_PAR_REDUCE_MIN).unwrap_or(DEFAULT_PAR_REDUCE_MIN);
        Self { pool_size, queue_cap, partial_timeout, par_reduce_min }
    }

    /// Fixed pool size with default tuning, for embedders and tests that do
    /// not want env coupling.
    pub fn fixed(pool_size: usize) -> Self {
        Self {
            pool_size: pool_size.max(1),
            queue_cap: DEFAULT_QUEUE_CAP,
            partial_timeout: Duration::from_millis(DEFAULT_PARTIAL_TIMEOUT_MS),
            par_reduce_min: DEFAULT_PAR_REDUCE_MIN,
        }
    }
}

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name).ok().and_then(|v| v.parse::<usize>().ok())
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse::<u64>().ok())
}

/// What a run hands the reporting boundary.
#[derive(Clone, Debug)]
pub struct RunOutcome<T> {
    pub value: T,
    pub elapsed: Duration,
    pub stats: RunStats,
}

/// A fixed pool of workers plus the coordinating caller (rank 0).
///
/// `run` partitions the dataset, ships every slice but its own to a worker
/// thread, folds slice 0 itself, collects the partials, and combines them
/// into the final scalar. The dataset never leaves the caller's ownership;
/// workers operate on transmitted copies.
pub struct Pool {
    config: PoolConfig,
}

impl Pool {
    pub fn new(config: PoolConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(PoolConfig::from_env())
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn run<O: ReduceOp>(&self, op: O, data: &[O::Value]) -> Result<RunOutcome<O::Value>> {
        let run_start = Instant::now();
        let mut phase = Phase::Init;

        advance(&mut phase, Phase::Planning);
        let plan = PartitionPlan::compute(self.config.pool_size, data.len())?;
        info!(
            phase = "plan",
            pool_size = plan.pool_size,
            dataset_len = plan.dataset_len,
            chunk_size = plan.chunk_size,
            workers = plan.workers,
            "Partition plan ready"
        );

        let (switchboard, links) = Switchboard::new(self.config.pool_size, self.config.queue_cap);
        let op = Arc::new(op);
        let par_min = self.config.par_reduce_min;
        let mut handles = Vec::with_capacity(links.len());
        for link in links {
            let op = Arc::clone(&op);
            handles.push(thread::spawn(move || Worker::new(link).serve(op.as_ref(), par_min)));
        }

        let coordinator = Coordinator { config: &self.config, plan, switchboard };
        let result = coordinator.drive(&mut phase, op.as_ref(), data);

        // the coordinator (and with it the switchboard) is gone by now, so
        // any worker still blocked on its downlink sees a disconnect instead
        // of hanging the join
        for handle in handles {
            let _ = handle.join();
        }

        let (value, stats) = result?;
        advance(&mut phase, Phase::Done);
        Ok(RunOutcome { value, elapsed: run_start.elapsed(), stats })
    }
}

// ========== Coordinator role ==========

struct Coordinator<'a> {
    config: &'a PoolConfig,
    plan: PartitionPlan,
    switchboard: Switchboard,
}

impl<'a> Coordinator<'a> {
    fn drive<O: ReduceOp>(
        self,
        phase: &mut Phase,
        op: &O,
        data: &[O::Value],
    ) -> Result<(O::Value, RunStats)> {
        let mut stats = RunStats {
            pool_size: self.plan.pool_size,
            workers: self.plan.workers,
            chunk_size: self.plan.chunk_size,
            dataset_len: self.plan.dataset_len,
            ..Default::default()
        };

        advance(phase, Phase::Dispatching);
        stats.dispatch = self.dispatch(data)?;
        info!(
            phase = "dispatch",
            slices = stats.dispatch.slices_shipped,
            bytes = stats.dispatch.bytes_shipped,
            idle_workers = stats.dispatch.idle_workers,
            wall_ms = stats.dispatch.wall_ms,
            "Slices dispatched"
        );

        // rank 0 doubles as a worker on its retained slice
        let mut partials: Vec<(usize, O::Value)> = Vec::with_capacity(self.plan.workers);
        if let Some(slice) = self.plan.slices().next() {
            let fold_start = Instant::now();
            let value = fold_slice(op, &data[slice.range()], self.config.par_reduce_min);
            let wall_ms = fold_start.elapsed().as_millis() as u64;
            debug!(rank = 0usize, elements = slice.len, wall_ms, "local reduce complete");
            stats.local_reduces.push(LocalReduceStats { rank: 0, elements: slice.len, wall_ms });
            partials.push((0, value));
        }

        advance(phase, Phase::AwaitingPartials);
        let collect_start = Instant::now();
        self.collect::<O>(&mut partials, &mut stats)?;
        let wait_ms = collect_start.elapsed().as_millis() as u64;
        info!(phase = "collect", partials = partials.len(), wait_ms, "All partials received");

        advance(phase, Phase::Combining);
        let combine_start = Instant::now();
        let value = combine_partials(op, self.plan.workers, &partials)?;
        stats.combine = CombineStats {
            partials: partials.len(),
            wait_ms,
            wall_ms: combine_start.elapsed().as_millis() as u64,
        };
        info!(
            phase = "combine",
            partials = stats.combine.partials,
            wall_ms = stats.combine.wall_ms,
            "Reduction complete"
        );
        Ok((value, stats))
    }

    fn dispatch<T: Serialize>(&self, data: &[T]) -> Result<DispatchStats> {
        let start = Instant::now();
        let mut slices_shipped = 0usize;
        let mut bytes_shipped = 0u64;
        for slice in self.plan.slices().skip(1) {
            bytes_shipped +=
                self.switchboard.ship_slice(slice.rank, slice.offset, &data[slice.range()])? as u64;
            slices_shipped += 1;
        }
        // ranks past the participating set sit this run out and are excluded
        // from the combiner's expected partials
        let first_idle = self.plan.workers.max(1);
        for rank in first_idle..self.plan.pool_size {
            self.switchboard.shutdown(rank);
        }
        Ok(DispatchStats {
            slices_shipped,
            bytes_shipped,
            idle_workers: self.plan.pool_size - first_idle,
            wall_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn collect<O: ReduceOp>(
        &self,
        partials: &mut Vec<(usize, O::Value)>,
        stats: &mut RunStats,
    ) -> Result<()> {
        let expected = self.plan.workers.saturating_sub(1);
        let mut seen = vec![false; self.plan.workers];
        let mut received = 0usize;
        while received < expected {
            let partial = match self.switchboard.recv_partial::<O::Value>(self.config.partial_timeout) {
                Ok(partial) => partial,
                Err(Error::TransportFailure(reason)) => {
                    let missing: Vec<usize> =
                        (1..self.plan.workers).filter(|&rank| !seen[rank]).collect();
                    return Err(Error::TransportFailure(format!(
                        "{}; still owed partials by ranks {:?}",
                        reason, missing
                    )));
                }
                Err(e) => return Err(e),
            };
            if partial.rank == 0 || partial.rank >= self.plan.workers {
                return Err(Error::ProtocolViolation(format!(
                    "partial from rank {} outside participating set 1..{}",
                    partial.rank, self.plan.workers
                )));
            }
            if seen[partial.rank] {
                return Err(Error::ProtocolViolation(format!(
                    "duplicate partial from rank {}",
                    partial.rank
                )));
            }
            seen[partial.rank] = true;
            debug!(
                rank = partial.rank,
                elements = partial.elements,
                wall_ms = partial.wall_ms,
                "partial received"
            );
            stats.local_reduces.push(LocalReduceStats {
                rank: partial.rank,
                elements: partial.elements,
                wall_ms: partial.wall_ms,
            });
            partials.push((partial.rank, partial.value));
            received += 1;
        }
        Ok(())
    }
}

// ========== Worker role ==========

struct Worker {
    link: WorkerLink,
}

impl Worker {
    fn new(link: WorkerLink) -> Self {
        Self { link }
    }

    /// One assignment per run: receive the slice, fold it, reply, exit.
    /// A shutdown frame means this rank sits the run out.
    fn serve<O: ReduceOp>(self, op: &O, par_min: usize) {
        let rank = self.link.rank;
        match self.link.recv_assignment::<O::Value>() {
            Ok(Some(assignment)) => {
                let fold_start = Instant::now();
                let value = fold_slice(op, &assignment.items, par_min);
                let wall_ms = fold_start.elapsed().as_millis() as u64;
                debug!(
                    rank,
                    offset = assignment.offset,
                    elements = assignment.items.len(),
                    wall_ms,
                    "local reduce complete"
                );
                if let Err(e) = self.link.send_partial(&value, assignment.items.len(), wall_ms) {
                    error!(rank, "partial lost: {}", e);
                }
            }
            Ok(None) => debug!(rank, "no slice this run"),
            Err(e) => error!(rank, "assignment never arrived: {}", e),
        }
    }
}
