use crate::error::{Error, Result};
use crossbeam_channel as channel;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

// ========== Point-to-point frames ==========

/// Wire frames between the coordinator and one worker. Payloads travel as
/// bincode bytes: a slice is transmitted as a copy, never as a view into the
/// coordinator's dataset.
#[derive(Debug)]
pub enum Frame {
    /// A contiguous run of dataset elements for the receiving rank.
    Slice { offset: usize, bytes: Vec<u8> },
    /// A worker's locally reduced scalar, plus its reduce timing.
    Partial { rank: usize, elements: usize, wall_ms: u64, bytes: Vec<u8> },
    /// No work for this rank; exit without replying.
    Shutdown,
}

impl Frame {
    fn kind(&self) -> &'static str {
        match self {
            Frame::Slice { .. } => "slice",
            Frame::Partial { .. } => "partial",
            Frame::Shutdown => "shutdown",
        }
    }
}

/// A slice as decoded on the worker side.
pub struct Assignment<T> {
    pub offset: usize,
    pub items: Vec<T>,
}

/// A partial as decoded on the coordinator side.
pub struct Partial<T> {
    pub rank: usize,
    pub value: T,
    pub elements: usize,
    pub wall_ms: u64,
}

/// The coordinator's side of the fabric: one bounded downlink per worker,
/// one shared inbox the workers reply into. Per-worker delivery is FIFO;
/// across workers the inbox observes arbitrary arrival order.
pub struct Switchboard {
    downlinks: Vec<channel::Sender<Frame>>,
    inbox: channel::Receiver<Frame>,
}

/// One worker's side of the fabric.
pub struct WorkerLink {
    pub rank: usize,
    downlink: channel::Receiver<Frame>,
    uplink: channel::Sender<Frame>,
}

impl Switchboard {
    /// Wires links for ranks `1..pool_size`; rank 0 is the coordinator and
    /// needs none.
    pub fn new(pool_size: usize, queue_cap: usize) -> (Self, Vec<WorkerLink>) {
        let (uplink_tx, inbox) = channel::bounded::<Frame>(queue_cap);
        let mut downlinks = Vec::with_capacity(pool_size.saturating_sub(1));
        let mut links = Vec::with_capacity(pool_size.saturating_sub(1));
        for rank in 1..pool_size {
            let (tx, rx) = channel::bounded::<Frame>(queue_cap);
            downlinks.push(tx);
            links.push(WorkerLink { rank, downlink: rx, uplink: uplink_tx.clone() });
        }
        // uplink_tx is not retained: once every worker is gone the inbox
        // disconnects instead of idling out the full timeout
        (Self { downlinks, inbox }, links)
    }

    /// Ships one slice to its worker. Returns the payload size in bytes.
    pub fn ship_slice<T: Serialize>(&self, rank: usize, offset: usize, items: &[T]) -> Result<usize> {
        let bytes = bincode::serialize(items)
            .map_err(|e| Error::TransportFailure(format!("slice for rank {} failed to encode: {}", rank, e)))?;
        let payload = bytes.len();
        let sender = self.downlinks.get(rank.wrapping_sub(1)).ok_or_else(|| {
            Error::ProtocolViolation(format!("no downlink for rank {}", rank))
        })?;
        sender
            .send(Frame::Slice { offset, bytes })
            .map_err(|_| Error::TransportFailure(format!("rank {} unreachable, slice not delivered", rank)))?;
        Ok(payload)
    }

    /// Tells an idle rank it has no slice this run. Best-effort: a worker
    /// that already went away was not going to contribute anyway.
    pub fn shutdown(&self, rank: usize) {
        if let Some(sender) = self.downlinks.get(rank.wrapping_sub(1)) {
            let _ = sender.send(Frame::Shutdown);
        }
    }

    /// Blocks for the next partial, up to `timeout`.
    pub fn recv_partial<T: DeserializeOwned>(&self, timeout: Duration) -> Result<Partial<T>> {
        let frame = self.inbox.recv_timeout(timeout).map_err(|e| match e {
            channel::RecvTimeoutError::Timeout => {
                Error::TransportFailure(format!("timed out after {:?} waiting for a partial", timeout))
            }
            channel::RecvTimeoutError::Disconnected => {
                Error::TransportFailure("every worker link closed before all partials arrived".to_string())
            }
        })?;
        match frame {
            Frame::Partial { rank, elements, wall_ms, bytes } => {
                let value = bincode::deserialize(&bytes).map_err(|e| {
                    Error::TransportFailure(format!("partial from rank {} failed to decode: {}", rank, e))
                })?;
                Ok(Partial { rank, value, elements, wall_ms })
            }
            other => Err(Error::ProtocolViolation(format!(
                "unexpected {} frame on the partial channel",
                other.kind()
            ))),
        }
    }
}

impl WorkerLink {
    /// Blocks for this rank's assignment. `None` means the rank sits this
    /// run out.
    pub fn recv_assignment<T: DeserializeOwned>(&self) -> Result<Option<Assignment<T>>> {
        let frame = self.downlink.recv().map_err(|_| {
            Error::TransportFailure(format!("rank {}: coordinator link closed before an assignment arrived", self.rank))
        })?;
        match frame {
            Frame::Slice { offset, bytes } => {
                let items = bincode::deserialize(&bytes).map_err(|e| {
                    Error::TransportFailure(format!("rank {}: slice payload failed to decode: {}", self.rank, e))
                })?;
                Ok(Some(Assignment { offset, items }))
            }
            Frame::Shutdown => Ok(None),
            other => Err(Error::ProtocolViolation(format!(
                "rank {}: unexpected {} frame on the slice channel",
                self.rank,
                other.kind()
            ))),
        }
    }

    /// Returns this rank's locally reduced scalar to the coordinator.
    pub fn send_partial<T: Serialize>(&self, value: &T, elements: usize, wall_ms: u64) -> Result<()> {
        let bytes = bincode::serialize(value)
            .map_err(|e| Error::TransportFailure(format!("rank {}: partial failed to encode: {}", self.rank, e)))?;
        self.uplink
            .send(Frame::Partial { rank: self.rank, elements, wall_ms, bytes })
            .map_err(|_| {
                Error::TransportFailure(format!("rank {}: coordinator unreachable, partial not delivered", self.rank))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_round_trips_to_its_rank() {
        let (board, links) = Switchboard::new(3, 16);
        board.ship_slice(1, 4, &[1u64, 2, 3]).unwrap();
        let assignment = links[0].recv_assignment::<u64>().unwrap().unwrap();
        assert_eq!(assignment.offset, 4);
        assert_eq!(assignment.items, vec![1, 2, 3]);
    }

    #[test]
    fn shutdown_means_no_work() {
        let (board, links) = Switchboard::new(2, 16);
        board.shutdown(1);
        assert!(links[0].recv_assignment::<u64>().unwrap().is_none());
    }

    #[test]
    fn partial_round_trips_with_its_rank() {
        let (board, links) = Switchboard::new(3, 16);
        links[1].send_partial(&42u64, 3, 1).unwrap();
        let partial = board.recv_partial::<u64>(Duration::from_secs(1)).unwrap();
        assert_eq!(partial.rank, 2);
        assert_eq!(partial.value, 42);
        assert_eq!(partial.elements, 3);
    }

    #[test]
    fn dead_worker_fails_the_ship() {
        let (board, links) = Switchboard::new(3, 16);
        drop(links);
        assert!(matches!(
            board.ship_slice(1, 0, &[1u64, 2]),
            Err(Error::TransportFailure(_))
        ));
    }

    #[test]
    fn silent_pool_times_out() {
        let (board, _links) = Switchboard::new(2, 16);
        assert!(matches!(
            board.recv_partial::<u64>(Duration::from_millis(10)),
            Err(Error::TransportFailure(_))
        ));
    }

    #[test]
    fn malformed_slice_payload_is_a_transport_failure() {
        let (board, links) = Switchboard::new(2, 16);
        board.ship_slice(1, 0, &[1u8, 2, 3]).unwrap();
        // a u8 payload runs out of bytes when decoded as u64 elements
        assert!(matches!(
            links[0].recv_assignment::<u64>(),
            Err(Error::TransportFailure(_))
        ));
    }
}
