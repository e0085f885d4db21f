//! Transaction logger: the sole consumer of the trade queue, appending one
//! line per trade to its symbol's transactions log.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use error_stack::{Report, ResultExt};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::IoError;
use crate::model::{SYMBOL_COUNT, SYMBOLS, symbol_index};
use crate::queue::{PopOutcome, TradeQueue};

/// Open all eight `logs/transactions/<SYMBOL>.log` files in append mode.
///
/// A file that fails to open is logged and left `None`; trades for that
/// symbol are then silently skipped for the life of the process (diagnostic
/// and continue, rather than aborting the whole logger).
fn open_all(logs_dir: &Path) -> Result<[Option<File>; SYMBOL_COUNT], Report<IoError>> {
    let transactions_dir = logs_dir.join("transactions");
    std::fs::create_dir_all(&transactions_dir).change_context(IoError::CreateDir {
        path: transactions_dir.display().to_string(),
    })?;

    Ok(std::array::from_fn(|i| {
        let path = transactions_dir.join(format!("{}.log", SYMBOLS[i]));
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => Some(file),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "failed to open transactions log");
                None
            }
        }
    }))
}

fn write_line(file: &mut File, timestamp: u64, price: f64, volume: f64) -> std::io::Result<()> {
    writeln!(file, "[{timestamp}], Price: {price:.8}, Volume: {volume:.8}")?;
    file.flush()
}

/// Run the logger loop until `cancel` fires or the queue is drained and
/// closed. Returns once every worker in the pipeline should be considered
/// stopped for this symbol set.
pub async fn run(queue: Arc<TradeQueue>, cancel: CancellationToken, logs_dir: &Path) {
    let mut files = match open_all(logs_dir) {
        Ok(files) => files,
        Err(e) => {
            warn!(error = ?e, "logger failed to open any transactions log, exiting");
            return;
        }
    };

    loop {
        match queue.pop(&cancel).await {
            PopOutcome::Shutdown => break,
            PopOutcome::Trade(trade) => {
                let Some(index) = symbol_index(&trade.symbol) else {
                    continue;
                };
                if let Some(file) = files[index].as_mut() {
                    if let Err(e) = write_line(file, trade.timestamp, trade.price, trade.volume) {
                        warn!(error = %e, symbol = %trade.symbol, "failed to write transactions log");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Trade;

    #[tokio::test]
    async fn logger_writes_one_line_per_trade_then_exits_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Arc::new(TradeQueue::new(8));
        let cancel = CancellationToken::new();

        queue
            .push(Trade::new("BTC-USDT", 30000.5, 0.125, 1700000000))
            .await
            .unwrap();

        let logs_dir = dir.path().to_path_buf();
        let queue_clone = Arc::clone(&queue);
        let cancel_clone = cancel.clone();
        let handle = tokio::spawn(async move {
            run(queue_clone, cancel_clone, &logs_dir).await;
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        cancel.cancel();
        handle.await.unwrap();

        let contents =
            std::fs::read_to_string(dir.path().join("transactions/BTC-USDT.log")).unwrap();
        assert_eq!(contents, "[1700000000], Price: 30000.50000000, Volume: 0.12500000\n");
    }
}
