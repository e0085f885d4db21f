//! Periodic analytics: the minute-aligned worker that computes moving
//! averages (Pass A), cross-symbol Pearson correlations (Pass B), and a
//! supplementary per-tick CPU idle sample.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use sysinfo::System;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::history::SymbolHistory;
use crate::model::{MA_RING_SIZE, SYMBOLS, SYMBOL_COUNT};

/// Output roots for the analytics worker's three log families.
#[derive(Debug, Clone)]
pub struct AnalyticsPaths {
    pub data_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl AnalyticsPaths {
    pub fn new(data_dir: impl Into<PathBuf>, logs_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            logs_dir: logs_dir.into(),
        }
    }

    fn mavg_dir(&self) -> PathBuf {
        self.data_dir.join("mavg")
    }

    fn corr_dir(&self) -> PathBuf {
        self.data_dir.join("corr")
    }

    fn cpu_idle_log(&self) -> PathBuf {
        self.logs_dir.join("cpu_idle.log")
    }
}

/// Seconds to sleep before the first tick so it lands on the next whole
/// minute of wall-clock time, matching the original's `timerfd` alignment.
pub fn secs_until_next_minute(now_unix: i64) -> u64 {
    (60 - now_unix.rem_euclid(60)).rem_euclid(60).max(1) as u64
}

/// Run the analytics loop until `cancel` fires. Shutdown latency is
/// sub-second: the tick timer and the cancellation token are raced together
/// rather than only re-checked between ticks.
pub async fn run(
    histories: Arc<[SymbolHistory; SYMBOL_COUNT]>,
    paths: AnalyticsPaths,
    cancel: CancellationToken,
) {
    let mut system = System::new_all();
    system.refresh_all();

    let initial_delay = Duration::from_secs(secs_until_next_minute(chrono::Utc::now().timestamp()));
    let mut ticker = tokio::time::interval_at(
        tokio::time::Instant::now() + initial_delay,
        Duration::from_secs(60),
    );
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let now = chrono::Utc::now().timestamp() as u64;
                let tick_start = Instant::now();
                run_moving_averages(&histories, now, &paths);
                run_correlations(&histories, now, &paths);
                record_cpu_idle(&mut system, now, tick_start, &paths);
            }
        }
    }
}

/// Pass A: prune each history, compute its moving average, record it in the
/// ring, and append a line to `data/mavg/<SYMBOL>.log`.
fn run_moving_averages(histories: &[SymbolHistory; SYMBOL_COUNT], now: u64, paths: &AnalyticsPaths) {
    let mavg_dir = paths.mavg_dir();
    if let Err(e) = std::fs::create_dir_all(&mavg_dir) {
        warn!(error = %e, dir = %mavg_dir.display(), "failed to create mavg directory, skipping tick");
        return;
    }

    for (i, history) in histories.iter().enumerate() {
        let snapshot = history.current_moving_average(now);
        history.record_ma(snapshot.ma);

        let path = mavg_dir.join(format!("{}.log", SYMBOLS[i]));
        if let Err(e) = append_line(
            &path,
            format!("{now},{:.8},{:.8}\n", snapshot.ma, snapshot.sum_volume),
        ) {
            warn!(error = %e, path = %path.display(), "failed to write mavg log");
        }
    }
}

/// Pass B: for each symbol with a full 8-sample ring, compute Pearson
/// correlation against every other symbol and append one row to
/// `data/corr/<SYMBOL>.log`. Snapshots each history's last-eight samples
/// under its own lock, so at most one history lock is ever held at a time
/// (the design notes' preferred alternative to ascending lock ordering).
fn run_correlations(histories: &[SymbolHistory; SYMBOL_COUNT], now: u64, paths: &AnalyticsPaths) {
    let corr_dir = paths.corr_dir();
    if let Err(e) = std::fs::create_dir_all(&corr_dir) {
        warn!(error = %e, dir = %corr_dir.display(), "failed to create corr directory, skipping tick");
        return;
    }

    let samples: Vec<Option<[f64; MA_RING_SIZE]>> =
        histories.iter().map(|h| h.last_eight_ma()).collect();

    for i in 0..SYMBOL_COUNT {
        let Some(x) = samples[i] else {
            continue;
        };

        let mut correlations = [0.0f64; SYMBOL_COUNT];
        let mut best_symbol = "N/A";
        let mut best_r = -2.0f64;

        for j in 0..SYMBOL_COUNT {
            if j == i {
                correlations[j] = 1.0;
                continue;
            }
            let Some(y) = samples[j] else {
                correlations[j] = 0.0;
                continue;
            };
            let r = pearson_correlation(&x, &y);
            correlations[j] = r;
            if r > best_r {
                best_r = r;
                best_symbol = SYMBOLS[j];
            }
        }

        let path = corr_dir.join(format!("{}.log", SYMBOLS[i]));
        let mut line = format!("{now},{best_symbol},{best_r:.4}");
        for r in &correlations {
            line.push_str(&format!(",{r:.4}"));
        }
        line.push('\n');

        if let Err(e) = append_line(&path, line) {
            warn!(error = %e, path = %path.display(), "failed to write corr log");
        }
    }
}

/// Pearson's r over two equal-length series, using the sum-of-products form.
/// Returns 0.0 when the denominator collapses (e.g. a constant series).
pub fn pearson_correlation(x: &[f64; MA_RING_SIZE], y: &[f64; MA_RING_SIZE]) -> f64 {
    let n = MA_RING_SIZE as f64;
    let sum_x: f64 = x.iter().sum();
    let sum_y: f64 = y.iter().sum();
    let sum_xx: f64 = x.iter().map(|v| v * v).sum();
    let sum_yy: f64 = y.iter().map(|v| v * v).sum();
    let sum_xy: f64 = x.iter().zip(y.iter()).map(|(a, b)| a * b).sum();

    let num = sum_xy - (sum_x * sum_y) / n;
    let den = ((sum_xx - sum_x * sum_x / n) * (sum_yy - sum_y * sum_y / n)).sqrt();

    if den.abs() > 1e-9 { num / den } else { 0.0 }
}

/// Sample CPU idle percentage and the tick's own wall-clock duration,
/// appending one line to `logs/cpu_idle.log`. A write failure here is logged
/// and does not affect the tick's other outputs.
fn record_cpu_idle(system: &mut System, now: u64, tick_start: Instant, paths: &AnalyticsPaths) {
    system.refresh_cpu_usage();
    let cpu_count = system.cpus().len().max(1) as f32;
    let usage: f32 = system.cpus().iter().map(|c| c.cpu_usage()).sum::<f32>() / cpu_count;
    let idle_pct = (100.0 - usage).clamp(0.0, 100.0);

    debug!(elapsed = ?tick_start.elapsed(), idle_pct, "analytics tick finished");

    let path = paths.cpu_idle_log();
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!(error = %e, dir = %parent.display(), "failed to create logs directory for cpu_idle.log");
            return;
        }
    }

    if let Err(e) = append_line(&path, format!("[{now}], {idle_pct:.2}\n")) {
        warn!(error = %e, path = %path.display(), "failed to write cpu_idle log");
    }
}

fn append_line(path: &Path, line: String) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_array(values: [f64; MA_RING_SIZE]) -> [f64; MA_RING_SIZE] {
        values
    }

    #[test]
    fn pearson_identity_is_one() {
        let x = sample_array([1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        let r = pearson_correlation(&x, &x);
        assert!((r - 1.0).abs() < 1e-9);
    }

    #[test]
    fn pearson_constant_series_is_zero() {
        let x = sample_array([5.0; MA_RING_SIZE]);
        let y = sample_array([1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        assert_eq!(pearson_correlation(&x, &y), 0.0);
    }

    #[test]
    fn secs_until_next_minute_never_returns_zero() {
        assert_eq!(secs_until_next_minute(0), 60);
        assert_eq!(secs_until_next_minute(59), 1);
        assert_eq!(secs_until_next_minute(1), 59);
    }

    #[test]
    fn best_peer_selection_prefers_higher_correlation() {
        let histories: [SymbolHistory; SYMBOL_COUNT] = std::array::from_fn(|_| SymbolHistory::new());

        // Pivot (index 0) and its "A" partner (index 1) move together;
        // "B" (index 2) is weakly correlated; the rest stay empty (ma_count < 8).
        let pivot_series = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 9.0];
        let a_series = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 9.0];
        let b_series = [5.0, 4.0, 6.0, 3.0, 7.0, 2.0, 8.0, 1.0];

        for v in pivot_series {
            histories[0].record_ma(v);
        }
        for v in a_series {
            histories[1].record_ma(v);
        }
        for v in b_series {
            histories[2].record_ma(v);
        }

        let samples: Vec<Option<[f64; MA_RING_SIZE]>> =
            histories.iter().map(|h| h.last_eight_ma()).collect();

        let x = samples[0].unwrap();
        let r_a = pearson_correlation(&x, &samples[1].unwrap());
        let r_b = pearson_correlation(&x, &samples[2].unwrap());

        assert!((r_a - 1.0).abs() < 1e-9);
        assert!(r_a > r_b);
        assert!(samples[3].is_none());
    }
}
