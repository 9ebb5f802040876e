// ============================================================
// Layer 6 — Timing Instrumentation
// ============================================================
// Running averages used for the [TRAIN] status line:
//
//   reader_cost  — time spent waiting on the data loader
//   batch_cost   — full iteration latency (loading + step)
//   ips          — samples processed per second
//
// Both averagers are reset at every logging point, so each
// status line reports the window since the previous one.

use std::time::Duration;

/// Accumulates durations and sample counts until `reset()`.
#[derive(Debug, Clone, Default)]
pub struct TimeAverager {
    total_time:    f64,
    count:         usize,
    total_samples: usize,
}

impl TimeAverager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one observation covering `num_samples` samples.
    pub fn record(&mut self, elapsed: Duration, num_samples: usize) {
        self.total_time    += elapsed.as_secs_f64();
        self.count         += 1;
        self.total_samples += num_samples;
    }

    /// Mean seconds per record, `0.0` when nothing was recorded.
    pub fn get_average(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.total_time / self.count as f64
    }

    /// Samples per second, `0.0` when no time was recorded.
    pub fn get_ips_average(&self) -> f64 {
        if self.total_samples == 0 || self.total_time <= 0.0 {
            return 0.0;
        }
        self.total_samples as f64 / self.total_time
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Remaining wall-clock time as `HH:MM:SS`.
///
/// `avg_batch_cost` is the mean seconds per iteration; hours are
/// not wrapped, so very long runs print e.g. `123:04:05`.
pub fn calculate_eta(remain_iters: usize, avg_batch_cost: f64) -> String {
    let cost = if avg_batch_cost.is_finite() { avg_batch_cost.max(0.0) } else { 0.0 };
    let mut remaining = (remain_iters as f64 * cost) as u64;

    let hours = remaining / 3600;
    remaining %= 3600;
    let minutes = remaining / 60;
    let seconds = remaining % 60;

    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_is_arithmetic_mean() {
        let mut avg = TimeAverager::new();
        avg.record(Duration::from_millis(100), 1);
        avg.record(Duration::from_millis(300), 1);
        avg.record(Duration::from_millis(200), 1);
        assert!((avg.get_average() - 0.2).abs() < 1e-9);
        assert_eq!(avg.count(), 3);
    }

    #[test]
    fn test_empty_average_is_zero() {
        let avg = TimeAverager::new();
        assert_eq!(avg.get_average(), 0.0);
        assert_eq!(avg.get_ips_average(), 0.0);
    }

    #[test]
    fn test_reset_forgets_history() {
        let mut avg = TimeAverager::new();
        avg.record(Duration::from_secs(10), 4);
        avg.reset();
        avg.record(Duration::from_millis(500), 2);
        assert!((avg.get_average() - 0.5).abs() < 1e-9);
        assert!((avg.get_ips_average() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_ips_weighted_by_samples() {
        let mut avg = TimeAverager::new();
        avg.record(Duration::from_secs(1), 30);
        avg.record(Duration::from_secs(1), 30);
        assert!((avg.get_ips_average() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_eta_zero_remaining() {
        assert_eq!(calculate_eta(0, 1.5), "00:00:00");
    }

    #[test]
    fn test_eta_formatting() {
        // 3725 iterations at 1s each = 1h 2m 5s
        assert_eq!(calculate_eta(3725, 1.0), "01:02:05");
        assert_eq!(calculate_eta(10, 0.25), "00:00:02");
    }

    #[test]
    fn test_eta_ignores_bad_cost() {
        assert_eq!(calculate_eta(100, f64::NAN), "00:00:00");
        assert_eq!(calculate_eta(100, -3.0), "00:00:00");
    }
}
