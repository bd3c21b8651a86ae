use serde::{de::DeserializeOwned, Serialize};

// ========== Reduction operator capability ==========

/// An associative, commutative combining function with an identity element.
///
/// Both laws are load-bearing: slices are folded concurrently and partials
/// arrive in whatever order the pool schedules, so `combine` must tolerate
/// arbitrary grouping and ordering of its inputs. Values cross the transport
/// as bincode payloads, hence the serde bounds.
pub trait ReduceOp: Send + Sync + 'static {
    type Value: Copy + Send + Sync + Serialize + DeserializeOwned + 'static;

    fn identity(&self) -> Self::Value;
    fn combine(&self, a: Self::Value, b: Self::Value) -> Self::Value;
}

/// Sum over `u64` elements. Channel bytes are widened to `u64` at load time
/// so the total stays exact for any image smaller than 2^56 pixels.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sum;

impl ReduceOp for Sum {
    type Value = u64;

    fn identity(&self) -> u64 {
        0
    }

    fn combine(&self, a: u64, b: u64) -> u64 {
        a + b
    }
}

/// Minimum over `u8` elements, seeded with `u8::MAX`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Min;

impl ReduceOp for Min {
    type Value = u8;

    fn identity(&self) -> u8 {
        u8::MAX
    }

    fn combine(&self, a: u8, b: u8) -> u8 {
        a.min(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_identity_is_neutral() {
        assert_eq!(Sum.combine(41, Sum.identity()), 41);
        assert_eq!(Sum.combine(Sum.identity(), 41), 41);
    }

    #[test]
    fn min_identity_is_neutral() {
        assert_eq!(Min.combine(7, Min.identity()), 7);
        assert_eq!(Min.combine(Min.identity(), 7), 7);
    }
}
