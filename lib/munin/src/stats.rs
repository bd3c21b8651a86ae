use serde::Serialize;

#[derive(Default, Clone, Debug, Serialize)]
pub struct DispatchStats {
    pub slices_shipped: usize,
    pub bytes_shipped: u64,
    pub idle_workers: usize,
    pub wall_ms: u64,
}

/// One participating rank's local reduce, coordinator's slice 0 included.
#[derive(Clone, Debug, Serialize)]
pub struct LocalReduceStats {
    pub rank: usize,
    pub elements: usize,
    pub wall_ms: u64,
}

#[derive(Default, Clone, Debug, Serialize)]
pub struct CombineStats {
    pub partials: usize,
    pub wait_ms: u64,
    pub wall_ms: u64,
}

/// Everything the reporting boundary gets besides the value itself.
#[derive(Default, Clone, Debug, Serialize)]
pub struct RunStats {
    pub pool_size: usize,
    pub workers: usize,
    pub chunk_size: usize,
    pub dataset_len: usize,
    pub dispatch: DispatchStats,
    pub local_reduces: Vec<LocalReduceStats>,
    pub combine: CombineStats,
}
