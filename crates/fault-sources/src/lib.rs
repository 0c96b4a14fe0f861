//! Per-source fault records written from interrupt context.
//!
//! Each of the three hardware fault sources (supply voltage, clock, memory
//! ECC) owns one [`FaultRecord`]. ISR entry is the only writer of its flag,
//! event count, nesting level, and last-seen timestamp; everything else
//! (the aggregator, the FSM, statistics) only ever reads through
//! [`FaultRecord::fault_flag`].

#![cfg_attr(not(test), no_std)]

use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use dcls::{Corruption, Drb};

/// Bound on ISR reentrancy depth per source. Exceeding it latches the flag
/// DRB into corruption rather than letting nesting grow unbounded.
pub const NEST_MAX: u8 = 8;

/// Which of the three hardware fault sources a record belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SourceId {
    Vdd,
    Clk,
    Mem,
}

/// Fault bookkeeping for one hardware source, written only by that
/// source's interrupt handler.
#[derive(Debug)]
pub struct FaultRecord {
    source: SourceId,
    flag: Drb,
    event_count: AtomicU32,
    nesting_level: AtomicU8,
    last_timestamp_ms: AtomicU32,
    priority: AtomicU8,
}

impl FaultRecord {
    /// Builds a record with its flag clear and the given default priority
    /// tier (1..=3, diagnostic/configuration only -- aggregation priority
    /// is fixed, see the aggregator crate).
    pub const fn new(source: SourceId, default_priority: u8) -> Self {
        Self {
            source,
            flag: Drb::cleared(),
            event_count: AtomicU32::new(0),
            nesting_level: AtomicU8::new(0),
            last_timestamp_ms: AtomicU32::new(0),
            priority: AtomicU8::new(default_priority),
        }
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    /// Runs the ISR-entry algorithm: bounded nesting, flag assertion,
    /// saturating event count, timestamp capture.
    ///
    /// `now_ms` comes from the platform timer, never from `event_count`.
    pub fn isr_enter(&self, now_ms: u32) {
        let pre = self.nesting_level.fetch_add(1, Ordering::Relaxed);
        if pre >= NEST_MAX {
            self.flag.corrupt_with(0x00);
            self.nesting_level.store(NEST_MAX, Ordering::Relaxed);
            return;
        }
        self.flag.store_atomic(0x01);
        self.event_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
                Some(c.saturating_add(1))
            })
            .ok();
        self.last_timestamp_ms.store(now_ms, Ordering::Relaxed);
        self.nesting_level.fetch_sub(1, Ordering::Relaxed);
    }

    /// Reads the fault flag through the DCLS check.
    pub fn fault_flag(&self) -> Result<bool, Corruption> {
        self.flag.load().map(|v| v != 0x00)
    }

    /// Clears the flag. Called only from task context, after the
    /// aggregator and FSM have observed the fault.
    pub fn clear_fault(&self) {
        self.flag.store_atomic(0x00);
    }

    /// `(event_count, nesting_level, last_timestamp_ms)`, for statistics
    /// and diagnostics.
    pub fn statistics(&self) -> (u32, u8, u32) {
        (
            self.event_count.load(Ordering::Relaxed),
            self.nesting_level.load(Ordering::Relaxed),
            self.last_timestamp_ms.load(Ordering::Relaxed),
        )
    }

    /// True iff the source is not mid-ISR and its flag DRB is intact.
    pub fn check_health(&self) -> bool {
        self.nesting_level.load(Ordering::Relaxed) == 0 && self.flag.load().is_ok()
    }

    /// Forces the flag DRB into a corrupted pair, mirroring what
    /// `isr_enter` does on a nesting-depth overflow. Exposed for
    /// fault-injection harnesses that cannot otherwise reproduce a
    /// hardware double-bit-flip from outside this crate.
    pub fn inject_dcls_corruption(&self) {
        self.flag.corrupt_with(0x00);
    }

    pub fn priority(&self) -> u8 {
        self.priority.load(Ordering::Relaxed)
    }

    /// Overwrites the diagnostic priority tier. Range validation is the
    /// caller's responsibility (the aggregator enforces `1..=3`).
    pub fn set_priority(&self, priority: u8) {
        self.priority.store(priority, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isr_entry_sets_flag_and_counts() {
        let rec = FaultRecord::new(SourceId::Vdd, 1);
        rec.isr_enter(10);
        assert_eq!(rec.fault_flag(), Ok(true));
        let (count, nesting, ts) = rec.statistics();
        assert_eq!(count, 1);
        assert_eq!(nesting, 0);
        assert_eq!(ts, 10);
    }

    #[test]
    fn n_entries_increment_event_count_by_n() {
        let rec = FaultRecord::new(SourceId::Clk, 2);
        for t in 0..5 {
            rec.isr_enter(t);
        }
        assert_eq!(rec.statistics().0, 5);
    }

    #[test]
    fn event_count_saturates() {
        let rec = FaultRecord::new(SourceId::Mem, 3);
        rec.event_count.store(u32::MAX, Ordering::Relaxed);
        rec.isr_enter(1);
        assert_eq!(rec.statistics().0, u32::MAX);
    }

    #[test]
    fn nesting_returns_to_zero_within_bound() {
        let rec = FaultRecord::new(SourceId::Vdd, 1);
        // Simulate depth below NEST_MAX by direct field manipulation is not
        // possible from outside; isr_enter is reentrant-safe by design
        // since each call fully unwinds its own increment/decrement pair.
        rec.isr_enter(0);
        rec.isr_enter(1);
        assert_eq!(rec.statistics().1, 0);
    }

    #[test]
    fn exceeding_nest_max_corrupts_flag() {
        let rec = FaultRecord::new(SourceId::Vdd, 1);
        rec.nesting_level.store(NEST_MAX, Ordering::Relaxed);
        rec.isr_enter(0);
        assert_eq!(rec.fault_flag(), Err(Corruption));
        assert_eq!(rec.statistics().1, NEST_MAX);
    }

    #[test]
    fn clear_fault_resets_flag() {
        let rec = FaultRecord::new(SourceId::Vdd, 1);
        rec.isr_enter(0);
        rec.clear_fault();
        assert_eq!(rec.fault_flag(), Ok(false));
    }

    #[test]
    fn health_check_fails_after_corruption() {
        let rec = FaultRecord::new(SourceId::Vdd, 1);
        rec.nesting_level.store(NEST_MAX, Ordering::Relaxed);
        rec.isr_enter(0);
        assert!(!rec.check_health());
    }
}
