//! Stats Aggregator (spec §4.8): live in-process counters, reset on
//! process start, plus a passthrough to `MetadataStore::aggregate()` for
//! durable totals. Read-only from the caller's perspective — recording a
//! completion or failure must never block the hot path, so every counter
//! here is a plain atomic or a short-lived mutex around a small buffer,
//! generalizing the `Metrics` atomics pattern used elsewhere in this
//! codebase (spec §9 — no module-level mutable state beyond this single
//! process-scoped value).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Sliding window for `rolling_throughput_per_minute` (spec §4.8).
const THROUGHPUT_WINDOW: Duration = Duration::from_secs(60);

/// Smoothing factor for the processing-time EMA (spec §4.8).
const EMA_ALPHA: f64 = 0.1;

pub struct StatsAggregator {
    processed_total: AtomicU64,
    failed_total: AtomicU64,
    completions: Mutex<VecDeque<Instant>>,
    avg_processing_seconds_bits: AtomicU64,
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self {
            processed_total: AtomicU64::new(0),
            failed_total: AtomicU64::new(0),
            completions: Mutex::new(VecDeque::new()),
            avg_processing_seconds_bits: AtomicU64::new(0),
        }
    }

    /// Records one successfully completed job (spec §4.6 step 7, after
    /// the row transitions to `completed`).
    pub fn record_processed(&self, duration_seconds: f64) {
        self.processed_total.fetch_add(1, Ordering::Relaxed);

        let now = Instant::now();
        let mut completions = self.completions.lock().unwrap();
        completions.push_back(now);
        while let Some(&front) = completions.front() {
            if now.duration_since(front) > THROUGHPUT_WINDOW {
                completions.pop_front();
            } else {
                break;
            }
        }
        drop(completions);

        self.update_ema(duration_seconds);
    }

    /// Records one terminally failed job (spec §4.6 `MarkFailed`).
    pub fn record_failed(&self) {
        self.failed_total.fetch_add(1, Ordering::Relaxed);
    }

    fn update_ema(&self, sample: f64) {
        loop {
            let current_bits = self.avg_processing_seconds_bits.load(Ordering::Relaxed);
            let current = f64::from_bits(current_bits);
            let next = if current_bits == 0 {
                sample
            } else {
                EMA_ALPHA * sample + (1.0 - EMA_ALPHA) * current
            };

            if self
                .avg_processing_seconds_bits
                .compare_exchange(
                    current_bits,
                    next.to_bits(),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                break;
            }
        }
    }

    pub fn snapshot(&self) -> LiveStats {
        let now = Instant::now();
        let throughput_per_minute = {
            let mut completions = self.completions.lock().unwrap();
            while let Some(&front) = completions.front() {
                if now.duration_since(front) > THROUGHPUT_WINDOW {
                    completions.pop_front();
                } else {
                    break;
                }
            }
            completions.len() as u64
        };

        LiveStats {
            processed_total: self.processed_total.load(Ordering::Relaxed),
            failed_total: self.failed_total.load(Ordering::Relaxed),
            rolling_throughput_per_minute: throughput_per_minute,
            rolling_avg_processing_seconds: f64::from_bits(
                self.avg_processing_seconds_bits.load(Ordering::Relaxed),
            ),
        }
    }
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct LiveStats {
    pub processed_total: u64,
    pub failed_total: u64,
    pub rolling_throughput_per_minute: u64,
    pub rolling_avg_processing_seconds: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processed_and_failed_totals() {
        let stats = StatsAggregator::new();
        stats.record_processed(1.0);
        stats.record_processed(2.0);
        stats.record_failed();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.processed_total, 2);
        assert_eq!(snapshot.failed_total, 1);
    }

    #[test]
    fn test_throughput_counts_recent_completions() {
        let stats = StatsAggregator::new();
        for _ in 0..5 {
            stats.record_processed(1.0);
        }
        assert_eq!(stats.snapshot().rolling_throughput_per_minute, 5);
    }

    #[test]
    fn test_ema_seeds_from_first_sample() {
        let stats = StatsAggregator::new();
        stats.record_processed(4.0);
        assert_eq!(stats.snapshot().rolling_avg_processing_seconds, 4.0);
    }

    #[test]
    fn test_ema_smooths_toward_new_samples() {
        let stats = StatsAggregator::new();
        stats.record_processed(10.0);
        stats.record_processed(0.0);

        let avg = stats.snapshot().rolling_avg_processing_seconds;
        // EMA(alpha=0.1): 0.1*0 + 0.9*10 = 9.0
        assert!((avg - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_completions_yields_zero_throughput() {
        let stats = StatsAggregator::new();
        assert_eq!(stats.snapshot().rolling_throughput_per_minute, 0);
        assert_eq!(stats.snapshot().rolling_avg_processing_seconds, 0.0);
    }
}
