//! Per-symbol trade history and moving-average ring, one instance per tracked
//! symbol. Mirrors the original's single `SymbolHistory` struct guarded by one
//! `pthread_mutex_t`: a growable trade vector plus an 8-slot ring of moving
//! average samples.

use std::sync::Mutex;

use crate::model::{MA_RING_SIZE, MOVING_AVERAGE_WINDOW_SECS, Trade};

/// Snapshot returned by [`SymbolHistory::current_moving_average`]: the mean
/// price and summed volume over the trailing window, after pruning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovingAverageSnapshot {
    pub ma: f64,
    pub sum_volume: f64,
    pub count: usize,
}

struct Inner {
    trades: Vec<Trade>,
    ma_history: [f64; MA_RING_SIZE],
    ma_index: usize,
    ma_count: usize,
}

impl Inner {
    fn new() -> Self {
        Self {
            trades: Vec::with_capacity(128),
            ma_history: [0.0; MA_RING_SIZE],
            ma_index: 0,
            ma_count: 0,
        }
    }

    /// Compact forward, dropping any trade older than `cutoff`. Preserves
    /// arrival order of the surviving trades (no sorting).
    fn prune(&mut self, cutoff: u64) {
        self.trades.retain(|t| t.timestamp >= cutoff);
    }
}

pub struct SymbolHistory {
    inner: Mutex<Inner>,
}

impl SymbolHistory {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::new()),
        }
    }

    /// Prune trades older than `trade.timestamp - 900`, then append `trade`.
    /// `Vec::push` handles the doubling growth the original implements by
    /// hand via `realloc`.
    pub fn append(&self, trade: Trade) {
        let mut inner = self.inner.lock().unwrap();
        let cutoff = trade.timestamp.saturating_sub(MOVING_AVERAGE_WINDOW_SECS);
        inner.prune(cutoff);
        inner.trades.push(trade);
    }

    /// Prune by `now - 900`, then return the mean price and summed volume
    /// over what remains. `ma` is 0.0 when the history is empty.
    pub fn current_moving_average(&self, now: u64) -> MovingAverageSnapshot {
        let mut inner = self.inner.lock().unwrap();
        let cutoff = now.saturating_sub(MOVING_AVERAGE_WINDOW_SECS);
        inner.prune(cutoff);

        let count = inner.trades.len();
        let sum_price: f64 = inner.trades.iter().map(|t| t.price).sum();
        let sum_volume: f64 = inner.trades.iter().map(|t| t.volume).sum();
        let ma = if count > 0 { sum_price / count as f64 } else { 0.0 };

        MovingAverageSnapshot { ma, sum_volume, count }
    }

    /// Record a new moving-average sample into the ring, advancing
    /// `ma_index` modulo 8 and saturating `ma_count` at 8.
    pub fn record_ma(&self, value: f64) {
        let mut inner = self.inner.lock().unwrap();
        let index = inner.ma_index;
        inner.ma_history[index] = value;
        inner.ma_index = (index + 1) % MA_RING_SIZE;
        inner.ma_count = (inner.ma_count + 1).min(MA_RING_SIZE);
    }

    /// The last eight moving-average samples, oldest first, or `None` if
    /// fewer than eight have been recorded yet. Once the ring is full,
    /// `ma_index` is the position of the oldest sample (the next slot due to
    /// be overwritten), so the chronological order is a plain rotation.
    pub fn last_eight_ma(&self) -> Option<[f64; MA_RING_SIZE]> {
        let inner = self.inner.lock().unwrap();
        if inner.ma_count < MA_RING_SIZE {
            return None;
        }
        let mut out = [0.0; MA_RING_SIZE];
        for (k, slot) in out.iter_mut().enumerate() {
            *slot = inner.ma_history[(inner.ma_index + k) % MA_RING_SIZE];
        }
        Some(out)
    }

    #[cfg(test)]
    pub fn trade_count(&self) -> usize {
        self.inner.lock().unwrap().trades.len()
    }
}

impl Default for SymbolHistory {
    fn default() -> Self {
        Self::new()
    }
}
