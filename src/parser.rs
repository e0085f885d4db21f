//! Transaction parser: turns one raw text frame from the exchange into zero
//! or more normalized [`Trade`]s, pushed to the shared queue and appended to
//! per-symbol histories.

use crate::history::SymbolHistory;
use crate::model::{SYMBOL_COUNT, Trade, symbol_index};
use crate::queue::TradeQueue;

/// Parse `frame` and dispatch every well-formed trade it contains.
///
/// Malformed frames (non-JSON, missing/non-array `data`) are dropped
/// silently, matching the original's error policy: there is nothing
/// meaningful to report back to the feed, and a single bad frame must not
/// abort frames that follow it.
pub async fn parse_and_dispatch(
    frame: &str,
    queue: &TradeQueue,
    histories: &[SymbolHistory; SYMBOL_COUNT],
) {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(frame) else {
        return;
    };

    let Some(data) = value.get("data").and_then(|d| d.as_array()) else {
        return;
    };

    for item in data {
        let Some(trade) = parse_one(item) else {
            continue;
        };

        let index = symbol_index(&trade.symbol);

        // The queue push happens regardless of whether the symbol is one of
        // the eight tracked ones, matching the original: the history append
        // is skipped for unknown symbols but the trade is still queued.
        if queue.push(trade.clone()).await.is_err() {
            return;
        }

        if let Some(i) = index {
            histories[i].append(trade);
        }
    }
}

fn parse_one(item: &serde_json::Value) -> Option<Trade> {
    let inst_id = item.get("instId")?.as_str()?;
    let px = item.get("px")?.as_str()?;
    let sz = item.get("sz")?.as_str()?;
    let ts = item.get("ts")?.as_str()?;

    let price = parse_double(px);
    let volume = parse_double(sz);
    let timestamp = parse_u64(ts) / 1000;

    Some(Trade::new(inst_id, price, volume, timestamp))
}

/// Best-effort float parse matching `atof`'s behavior of returning 0.0 for
/// unparseable input rather than aborting the frame.
fn parse_double(s: &str) -> f64 {
    s.trim().parse().unwrap_or(0.0)
}

/// Best-effort integer parse matching `strtoull`'s behavior of returning 0
/// for unparseable input.
fn parse_u64(s: &str) -> u64 {
    s.trim().parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SYMBOLS;
    use crate::queue::{PopOutcome, TradeQueue};
    use tokio_util::sync::CancellationToken;

    fn new_histories() -> [SymbolHistory; SYMBOL_COUNT] {
        std::array::from_fn(|_| SymbolHistory::new())
    }

    #[tokio::test]
    async fn parses_single_trade_into_queue_and_history() {
        let queue = TradeQueue::new(8);
        let histories = new_histories();
        let frame = r#"{"arg":{"channel":"trades","instId":"BTC-USDT"},"data":[{"instId":"BTC-USDT","px":"30000.5","sz":"0.125","ts":"1700000000000"}]}"#;

        parse_and_dispatch(frame, &queue, &histories).await;

        assert_eq!(histories[0].trade_count(), 1);

        let cancel = CancellationToken::new();
        match queue.pop(&cancel).await {
            PopOutcome::Trade(trade) => {
                assert_eq!(trade.symbol, "BTC-USDT");
                assert_eq!(trade.price, 30000.5);
                assert_eq!(trade.volume, 0.125);
                assert_eq!(trade.timestamp, 1700000000);
            }
            PopOutcome::Shutdown => panic!("unexpected shutdown"),
        }
    }

    #[tokio::test]
    async fn missing_data_array_is_a_no_op() {
        let queue = TradeQueue::new(8);
        let histories = new_histories();

        parse_and_dispatch(r#"{"arg":{"channel":"trades"}}"#, &queue, &histories).await;
        parse_and_dispatch("not json at all", &queue, &histories).await;

        for history in &histories {
            assert_eq!(history.trade_count(), 0);
        }
    }

    #[tokio::test]
    async fn unknown_symbol_is_queued_but_not_recorded_in_history() {
        let queue = TradeQueue::new(8);
        let histories = new_histories();
        let frame = r#"{"data":[{"instId":"FOO-BAR","px":"1.0","sz":"1.0","ts":"1000"}]}"#;

        parse_and_dispatch(frame, &queue, &histories).await;

        for history in &histories {
            assert_eq!(history.trade_count(), 0);
        }

        let cancel = CancellationToken::new();
        assert!(matches!(queue.pop(&cancel).await, PopOutcome::Trade(_)));
    }

    #[tokio::test]
    async fn element_missing_required_field_is_skipped_without_aborting_frame() {
        let queue = TradeQueue::new(8);
        let histories = new_histories();
        let frame = format!(
            r#"{{"data":[{{"instId":"ADA-USDT"}},{{"instId":"{}","px":"1.5","sz":"2.0","ts":"5000"}}]}}"#,
            SYMBOLS[2]
        );

        parse_and_dispatch(&frame, &queue, &histories).await;

        assert_eq!(histories[2].trade_count(), 1);
    }
}
