//! Bounded, shutdown-aware trade queue.
//!
//! Models the original's single ring buffer guarded by one mutex and two
//! condition variables as a `tokio::sync::mpsc` bounded channel: `push` blocks
//! (suspends) the caller while the channel is full instead of silently
//! overwriting the oldest entry, and `pop` prefers an available trade over a
//! fired [`CancellationToken`], draining anything already buffered before
//! reporting shutdown, rather than re-checking a shutdown flag on a 1-second
//! timer. Both preserve FIFO ordering and the queue's documented bounded
//! shape.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::model::Trade;

/// Outcome of a [`TradeQueue::pop`] call.
#[derive(Debug, PartialEq)]
pub enum PopOutcome {
    Trade(Trade),
    Shutdown,
}

pub struct TradeQueue {
    tx: mpsc::Sender<Trade>,
    rx: Mutex<mpsc::Receiver<Trade>>,
}

// tokio's mpsc::Receiver carries no Sync-friendly interior mutability of its
// own; wrap it in a tokio Mutex so a single TradeQueue can be shared behind
// an Arc while still exposing a `&self` pop, mirroring the single-consumer
// shape the original pipeline uses.
use tokio::sync::Mutex;

impl TradeQueue {
    /// Create a queue with the given bounded capacity (default 4096 per §3).
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Push a trade, suspending the caller while the queue is full.
    ///
    /// Returns `Err` only if every receiver has been dropped, which does not
    /// happen in the real pipeline (the logger holds the sole receiver for
    /// the lifetime of the process).
    pub async fn push(&self, trade: Trade) -> Result<(), Trade> {
        self.tx.send(trade).await.map_err(|e| e.0)
    }

    /// Pop the next trade, or `Shutdown` once `cancel` is triggered and the
    /// queue has nothing left buffered.
    ///
    /// Equivalent to the original's `pthread_cond_timedwait` loop with a
    /// 1-second re-check, but reacts to shutdown immediately instead of
    /// within a second of it. `recv` is listed first so an already-buffered
    /// trade always wins over a fired cancellation; only once `recv` truly
    /// has nothing ready do we consult `cancel`, and even then a final
    /// `try_recv` drains anything that arrived in between before the call
    /// reports shutdown. This is what §9's "signal workers, drain the
    /// queue, then destroy the transport context" ordering requires: a
    /// trade already sitting in the channel at shutdown time must still be
    /// delivered, not discarded.
    pub async fn pop(&self, cancel: &CancellationToken) -> PopOutcome {
        let mut rx = self.rx.lock().await;
        tokio::select! {
            biased;
            trade = rx.recv() => {
                return match trade {
                    Some(trade) => PopOutcome::Trade(trade),
                    None => PopOutcome::Shutdown,
                };
            }
            _ = cancel.cancelled() => {}
        }

        match rx.try_recv() {
            Ok(trade) => PopOutcome::Trade(trade),
            Err(_) => PopOutcome::Shutdown,
        }
    }
}
