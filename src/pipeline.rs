//! The single object owning all shared pipeline state: the trade queue and
//! the eight per-symbol histories. Replaces the original's global statics
//! (`trade_queue`, `symbol_histories[8]`) with one value injected into every
//! task.

use std::sync::Arc;

use crate::history::SymbolHistory;
use crate::model::SYMBOL_COUNT;
use crate::queue::TradeQueue;

pub struct Pipeline {
    pub queue: Arc<TradeQueue>,
    pub histories: Arc<[SymbolHistory; SYMBOL_COUNT]>,
}

impl Pipeline {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            queue: Arc::new(TradeQueue::new(queue_capacity)),
            histories: Arc::new(std::array::from_fn(|_| SymbolHistory::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_pipeline_starts_with_empty_histories() {
        let pipeline = Pipeline::new(4096);
        for history in pipeline.histories.iter() {
            assert!(history.last_eight_ma().is_none());
        }
    }
}
