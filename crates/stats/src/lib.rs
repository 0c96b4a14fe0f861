//! Fault statistics and diagnostic-coverage (DC) calculation.
//!
//! Every update takes a non-blocking spinlock (`g_stats_locked` in the
//! original design); this is sound only because writers hold it for a
//! fixed, small number of integer operations and never call out to
//! anything that can block.

#![no_std]

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use fault_sources::SourceId;

fn source_index(source: SourceId) -> usize {
    match source {
        SourceId::Vdd => 0,
        SourceId::Clk => 1,
        SourceId::Mem => 2,
    }
}

/// Per-source detected/undetected counts plus the cross-source recovery
/// and uptime tallies.
pub struct Statistics {
    detected: [AtomicU32; 3],
    undetected: [AtomicU32; 3],
    recovery_successes: AtomicU32,
    recovery_failures: AtomicU32,
    uptime_ms: AtomicU64,
    last_update_ms: AtomicU32,
    locked: AtomicBool,
}

/// A consistent snapshot returned by [`Statistics::snapshot`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StatisticsSnapshot {
    pub detected: [u32; 3],
    pub undetected: [u32; 3],
    pub recovery_successes: u32,
    pub recovery_failures: u32,
    pub uptime_ms: u64,
    pub last_update_ms: u32,
}

impl Statistics {
    pub const fn new() -> Self {
        Self {
            detected: [AtomicU32::new(0), AtomicU32::new(0), AtomicU32::new(0)],
            undetected: [AtomicU32::new(0), AtomicU32::new(0), AtomicU32::new(0)],
            recovery_successes: AtomicU32::new(0),
            recovery_failures: AtomicU32::new(0),
            uptime_ms: AtomicU64::new(0),
            last_update_ms: AtomicU32::new(0),
            locked: AtomicBool::new(false),
        }
    }

    fn with_lock<R>(&self, now_ms: u32, f: impl FnOnce() -> R) -> R {
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            core::hint::spin_loop();
        }
        let r = f();
        self.last_update_ms.store(now_ms, Ordering::Relaxed);
        self.locked.store(false, Ordering::Release);
        r
    }

    pub fn record_detected(&self, source: SourceId, now_ms: u32) {
        let idx = source_index(source);
        self.with_lock(now_ms, || {
            self.detected[idx]
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
                    Some(c.saturating_add(1))
                })
                .ok();
        });
    }

    /// Only meaningful in fault-injection test harnesses; the production
    /// tick path never calls this.
    #[cfg(feature = "fault-injection")]
    pub fn record_undetected(&self, source: SourceId, now_ms: u32) {
        let idx = source_index(source);
        self.with_lock(now_ms, || {
            self.undetected[idx]
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
                    Some(c.saturating_add(1))
                })
                .ok();
        });
    }

    pub fn record_recovery_success(&self, now_ms: u32) {
        self.with_lock(now_ms, || {
            self.recovery_successes.fetch_add(1, Ordering::Relaxed);
        });
    }

    pub fn record_recovery_failure(&self, now_ms: u32) {
        self.with_lock(now_ms, || {
            self.recovery_failures.fetch_add(1, Ordering::Relaxed);
        });
    }

    pub fn advance_uptime(&self, delta_ms: u32, now_ms: u32) {
        self.with_lock(now_ms, || {
            self.uptime_ms.fetch_add(delta_ms as u64, Ordering::Relaxed);
        });
    }

    /// Per-source diagnostic coverage as an integer percentage in
    /// `[0, 100]`. Zero-safe: an untested source reports `0`, not a
    /// division error.
    pub fn diagnostic_coverage(&self, source: SourceId) -> u32 {
        let idx = source_index(source);
        let detected = self.detected[idx].load(Ordering::Relaxed) as u64;
        let undetected = self.undetected[idx].load(Ordering::Relaxed) as u64;
        let total = detected + undetected;
        if total == 0 {
            return 0;
        }
        ((detected * 100) / total).min(100) as u32
    }

    /// Arithmetic mean of the three per-source coverage values.
    pub fn overall_diagnostic_coverage(&self) -> u32 {
        let sum: u32 = [SourceId::Vdd, SourceId::Clk, SourceId::Mem]
            .iter()
            .map(|s| self.diagnostic_coverage(*s))
            .sum();
        sum / 3
    }

    pub fn recovery_success_rate(&self) -> u32 {
        let successes = self.recovery_successes.load(Ordering::Relaxed) as u64;
        let failures = self.recovery_failures.load(Ordering::Relaxed) as u64;
        let total = successes + failures;
        if total == 0 {
            return 0;
        }
        ((successes * 100) / total).min(100) as u32
    }

    pub fn total_faults(&self) -> u32 {
        self.detected
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .fold(0u32, |acc, c| acc.saturating_add(c))
    }

    /// Faults per hour of uptime: `total_detected * 3,600,000 / uptime_ms`,
    /// zero-safe when uptime hasn't advanced yet.
    pub fn fault_rate_per_hour(&self) -> u64 {
        let uptime = self.uptime_ms.load(Ordering::Relaxed);
        if uptime == 0 {
            return 0;
        }
        (self.total_faults() as u64 * 3_600_000) / uptime
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            detected: core::array::from_fn(|i| self.detected[i].load(Ordering::Relaxed)),
            undetected: core::array::from_fn(|i| self.undetected[i].load(Ordering::Relaxed)),
            recovery_successes: self.recovery_successes.load(Ordering::Relaxed),
            recovery_failures: self.recovery_failures.load(Ordering::Relaxed),
            uptime_ms: self.uptime_ms.load(Ordering::Relaxed),
            last_update_ms: self.last_update_ms.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for c in &self.detected {
            c.store(0, Ordering::Relaxed);
        }
        for c in &self.undetected {
            c.store(0, Ordering::Relaxed);
        }
        self.recovery_successes.store(0, Ordering::Relaxed);
        self.recovery_failures.store(0, Ordering::Relaxed);
        self.uptime_ms.store(0, Ordering::Relaxed);
        self.last_update_ms.store(0, Ordering::Relaxed);
    }
}

impl Default for Statistics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dc_is_zero_with_no_samples() {
        let stats = Statistics::new();
        assert_eq!(stats.diagnostic_coverage(SourceId::Vdd), 0);
    }

    #[test]
    fn dc_is_integer_percentage() {
        let stats = Statistics::new();
        stats.record_detected(SourceId::Vdd, 0);
        stats.record_detected(SourceId::Vdd, 0);
        stats.record_detected(SourceId::Vdd, 0);
        assert_eq!(stats.diagnostic_coverage(SourceId::Vdd), 100);
    }

    #[test]
    fn recovery_success_rate_is_zero_safe() {
        let stats = Statistics::new();
        assert_eq!(stats.recovery_success_rate(), 0);
        stats.record_recovery_success(0);
        stats.record_recovery_failure(0);
        assert_eq!(stats.recovery_success_rate(), 50);
    }

    #[test]
    fn fault_rate_per_hour_uses_documented_factor() {
        let stats = Statistics::new();
        stats.record_detected(SourceId::Vdd, 0);
        stats.advance_uptime(1_000, 0); // 1 second of uptime
        assert_eq!(stats.fault_rate_per_hour(), 3_600);
    }

    #[test]
    fn overall_dc_is_mean_of_three_sources() {
        let stats = Statistics::new();
        stats.record_detected(SourceId::Vdd, 0);
        // clk and mem stay at 0/0 -> 0% each
        assert_eq!(stats.overall_diagnostic_coverage(), 100 / 3);
    }

    #[test]
    fn reset_clears_everything() {
        let stats = Statistics::new();
        stats.record_detected(SourceId::Vdd, 0);
        stats.record_recovery_success(0);
        stats.reset();
        let snap = stats.snapshot();
        assert_eq!(snap.detected, [0, 0, 0]);
        assert_eq!(snap.recovery_successes, 0);
    }
}
