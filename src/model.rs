//! Fixed symbol table and the trade record shape shared across the pipeline.

/// Canonical, compile-time fixed set of tracked spot symbols.
///
/// The index of a symbol in this array is its stable key everywhere else in the
/// pipeline (histories, correlation rows, log file names). Order matters: it is
/// baked into every `data/corr/<SYMBOL>.log` row.
pub const SYMBOLS: [&str; 8] = [
    "BTC-USDT",
    "ADA-USDT",
    "ETH-USDT",
    "DOGE-USDT",
    "XRP-USDT",
    "SOL-USDT",
    "LTC-USDT",
    "BNB-USDT",
];

/// Number of tracked symbols. Kept as a named constant so ring-buffer and
/// correlation-row code reads as "8 of what" rather than a bare literal.
pub const SYMBOL_COUNT: usize = SYMBOLS.len();

/// Trailing window, in seconds, over which a symbol's moving average is computed.
pub const MOVING_AVERAGE_WINDOW_SECS: u64 = 15 * 60;

/// Number of moving-average samples kept per symbol for correlation.
pub const MA_RING_SIZE: usize = 8;

/// Maximum symbol identifier length accepted from the wire, matching the
/// original `char symbol[16]` (15 chars + null terminator) record shape.
pub const MAX_SYMBOL_LEN: usize = 15;

/// Look up the canonical index of `symbol`, if it is one of the eight tracked
/// symbols. A plain linear scan over eight entries; the design notes call this
/// acceptable and a perfect hash would be overkill at this size.
pub fn symbol_index(symbol: &str) -> Option<usize> {
    SYMBOLS.iter().position(|&s| s == symbol)
}

/// A single executed trade, normalized from the exchange's wire format.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub symbol: String,
    pub price: f64,
    pub volume: f64,
    /// Seconds since the Unix epoch (truncated from the feed's milliseconds).
    pub timestamp: u64,
}

impl Trade {
    /// Truncate `symbol` to the wire-format length cap, matching the original's
    /// fixed-size, null-terminated symbol buffer.
    pub fn new(symbol: &str, price: f64, volume: f64, timestamp: u64) -> Self {
        let symbol = if symbol.len() > MAX_SYMBOL_LEN {
            symbol
                .char_indices()
                .take_while(|(i, _)| *i < MAX_SYMBOL_LEN)
                .map(|(_, c)| c)
                .collect()
        } else {
            symbol.to_owned()
        };
        Self {
            symbol,
            price,
            volume,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_index_finds_each_canonical_symbol() {
        for (i, &s) in SYMBOLS.iter().enumerate() {
            assert_eq!(symbol_index(s), Some(i));
        }
    }

    #[test]
    fn symbol_index_unknown_returns_none() {
        assert_eq!(symbol_index("DOGE-EUR"), None);
    }

    #[test]
    fn trade_new_truncates_overlong_symbol() {
        let trade = Trade::new("ABCDEFGHIJKLMNOPQRSTUVWXYZ", 1.0, 1.0, 0);
        assert_eq!(trade.symbol.len(), MAX_SYMBOL_LEN);
        assert_eq!(trade.symbol, "ABCDEFGHIJKLMNO");
    }
}
