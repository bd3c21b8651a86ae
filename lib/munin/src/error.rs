use thiserror::Error;

/// Failures a run can surface. Every variant is fatal to the run that
/// raised it; an incomplete reduction is never returned.
#[derive(Debug, Error)]
pub enum Error {
    /// The planner produced an inconsistent plan (worker count exceeding the
    /// pool, or an empty slice for a non-empty dataset). Detected before any
    /// slice is dispatched.
    #[error("planning defect: {0}")]
    PlanningDefect(String),

    /// A slice or partial could not be delivered: a worker link went down,
    /// a payload failed to decode, or the bounded wait on partials expired.
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// A partial arrived twice for the same rank, or from a rank outside the
    /// participating set. Indicates a dispatcher/combiner bug.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
