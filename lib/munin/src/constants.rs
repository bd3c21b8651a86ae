//! Centralized environment variable names and default values for munin
//! runtime tuning.

// Environment variable names
pub const ENV_POOL_SIZE: &str = "MUNIN_POOL_SIZE";
pub const ENV_QUEUE_CAP: &str = "MUNIN_QUEUE_CAP";
pub const ENV_PARTIAL_TIMEOUT_MS: &str = "MUNIN_PARTIAL_TIMEOUT_MS";
pub const ENV_PAR_REDUCE_MIN: &str = "MUNIN_PAR_REDUCE_MIN";

// Defaults
// Frames per channel before senders block; a run ships at most one slice and
// one partial per worker, so this never backpressures in practice
pub const DEFAULT_QUEUE_CAP: usize = 1024;
// Bounded wait on the partial-collection phase before the run is declared lost
pub const DEFAULT_PARTIAL_TIMEOUT_MS: u64 = 60_000;
// Slice length at which a worker folds its slice with rayon chunk-parallelism
// instead of a plain sequential fold
pub const DEFAULT_PAR_REDUCE_MIN: usize = 64 * 1024;
