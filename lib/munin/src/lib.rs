pub mod constants;
pub mod error;
pub mod op;
pub mod plan;
pub mod reduce;
pub mod runtime;
pub mod stats;
pub mod transport;

pub use error::{Error, Result};
pub use op::{Min, ReduceOp, Sum};
pub use plan::{PartitionPlan, Slice};
pub use runtime::{Phase, Pool, PoolConfig, RunOutcome};
pub use stats::RunStats;
