use crate::error::{Error, Result};
use crate::op::ReduceOp;
use rayon::prelude::*;

// ========== Local reducer ==========

/// Folds one slice into a scalar, seeded with the operator's identity.
///
/// Slices at or above `par_min` elements are folded chunk-parallel with
/// rayon; the operator's associativity/commutativity makes the regrouping
/// invisible. Below the threshold a plain sequential fold wins.
pub fn fold_slice<O: ReduceOp>(op: &O, items: &[O::Value], par_min: usize) -> O::Value {
    if par_min > 0 && items.len() >= par_min {
        items
            .par_chunks(par_min)
            .map(|chunk| chunk.iter().fold(op.identity(), |acc, &v| op.combine(acc, v)))
            .reduce(|| op.identity(), |a, b| op.combine(a, b))
    } else {
        items.iter().fold(op.identity(), |acc, &v| op.combine(acc, v))
    }
}

// ========== Global combiner ==========

/// Folds every participating rank's partial into the final scalar.
///
/// Validates the protocol while folding: each rank in `[0, workers)` must
/// appear exactly once. Arrival order is free; the operator's laws make the
/// result order-independent.
pub fn combine_partials<O: ReduceOp>(
    op: &O,
    workers: usize,
    partials: &[(usize, O::Value)],
) -> Result<O::Value> {
    let mut seen = vec![false; workers];
    let mut acc = op.identity();
    for &(rank, value) in partials {
        let slot = seen.get_mut(rank).ok_or_else(|| {
            Error::ProtocolViolation(format!(
                "partial from rank {} outside participating set 0..{}",
                rank, workers
            ))
        })?;
        if *slot {
            return Err(Error::ProtocolViolation(format!("duplicate partial from rank {}", rank)));
        }
        *slot = true;
        acc = op.combine(acc, value);
    }
    if let Some(rank) = seen.iter().position(|s| !s) {
        return Err(Error::ProtocolViolation(format!("no partial from rank {}", rank)));
    }
    Ok(acc)
}
