//! Fault aggregation: reads the three per-source flags, verifies DCLS,
//! produces a prioritized fault set.
//!
//! Aggregation itself always prioritizes `VDD > CLK > MEM`, a fixed and
//! statically reasoned-about order. [`Aggregator::set_priorities`] exists
//! and is validated, but only updates the diagnostic priority tier exposed
//! by each [`FaultRecord`] -- it does not change aggregation order. See
//! `DESIGN.md` for why the two are kept deliberately decoupled.

#![cfg_attr(not(test), no_std)]

use core::sync::atomic::{AtomicBool, Ordering};

use dcls::{Drb, FaultType};
use fault_sources::{FaultRecord, SourceId};
use safety_error::SafetyError;

pub const VDD_BIT: u8 = 0x01;
pub const CLK_BIT: u8 = 0x02;
pub const MEM_BIT: u8 = 0x04;

/// Owns the three per-source [`FaultRecord`]s and the combined
/// active-fault bitmask, gated by a non-reentrant busy flag.
///
/// Ownership lives here (rather than the aggregator merely borrowing
/// records owned elsewhere) so a single `Aggregator` value can be handed
/// to ISR entry points, the FSM, and diagnostics without fighting
/// self-referential lifetimes.
pub struct Aggregator {
    vdd: FaultRecord,
    clk: FaultRecord,
    mem: FaultRecord,
    active_faults: Drb,
    busy: AtomicBool,
}

impl Aggregator {
    pub const fn new(vdd_priority: u8, clk_priority: u8, mem_priority: u8) -> Self {
        Self {
            vdd: FaultRecord::new(SourceId::Vdd, vdd_priority),
            clk: FaultRecord::new(SourceId::Clk, clk_priority),
            mem: FaultRecord::new(SourceId::Mem, mem_priority),
            active_faults: Drb::cleared(),
            busy: AtomicBool::new(false),
        }
    }

    /// The per-source fault record for `source`, for ISR entry points and
    /// per-source diagnostics.
    pub fn record(&self, source: SourceId) -> &FaultRecord {
        match source {
            SourceId::Vdd => &self.vdd,
            SourceId::Clk => &self.clk,
            SourceId::Mem => &self.mem,
        }
    }

    fn acquire(&self) -> Result<(), SafetyError> {
        if self.busy.compare_exchange(
            false,
            true,
            Ordering::Acquire,
            Ordering::Relaxed,
        ) != Ok(false)
        {
            return Err(SafetyError::Busy);
        }
        Ok(())
    }

    fn release(&self) {
        self.busy.store(false, Ordering::Release);
    }

    /// Recomputes `active_faults` from the three flags and returns the new
    /// bitmask. Aborts without mutating state on DCLS failure or
    /// contention.
    pub fn aggregate(&self) -> Result<u8, SafetyError> {
        self.acquire()?;
        let result = (|| {
            let mut mask = 0u8;
            if self.vdd.fault_flag()? {
                mask |= VDD_BIT;
            }
            if self.clk.fault_flag()? {
                mask |= CLK_BIT;
            }
            if self.mem.fault_flag()? {
                mask |= MEM_BIT;
            }
            self.active_faults.store_atomic(mask);
            Ok(mask)
        })();
        self.release();
        result
    }

    /// The last-aggregated bitmask, re-verified through DCLS on read.
    pub fn active_faults(&self) -> Result<u8, SafetyError> {
        Ok(self.active_faults.load()?)
    }

    /// Highest-priority fault in the fixed `VDD > CLK > MEM` order, or
    /// `FaultType::None` if nothing is active.
    pub fn highest_priority(&self) -> Result<FaultType, SafetyError> {
        let mask = self.active_faults()?;
        Ok(if mask & VDD_BIT != 0 {
            FaultType::Vdd
        } else if mask & CLK_BIT != 0 {
            FaultType::Clk
        } else if mask & MEM_BIT != 0 {
            FaultType::MemEcc
        } else {
            FaultType::None
        })
    }

    pub fn is_active(&self, source: SourceId) -> Result<bool, SafetyError> {
        let mask = self.active_faults()?;
        Ok(mask & bit_for(source) != 0)
    }

    pub fn has_multiple_active(&self) -> Result<bool, SafetyError> {
        let mask = self.active_faults()?;
        Ok(mask.count_ones() > 1)
    }

    /// Clears the per-source flag DRB for each bit set in `mask`, then
    /// re-runs aggregation and returns the resulting bitmask.
    pub fn clear_faults(&self, mask: u8) -> Result<u8, SafetyError> {
        if mask & VDD_BIT != 0 {
            self.vdd.clear_fault();
        }
        if mask & CLK_BIT != 0 {
            self.clk.clear_fault();
        }
        if mask & MEM_BIT != 0 {
            self.mem.clear_fault();
        }
        self.aggregate()
    }

    /// Validates and writes the diagnostic priority tier for each source.
    /// Rejects values outside `1..=3` or a concurrent aggregation without
    /// mutating anything.
    pub fn set_priorities(&self, vdd: u8, clk: u8, mem: u8) -> Result<(), SafetyError> {
        if ![vdd, clk, mem].iter().all(|p| (1..=3).contains(p)) {
            return Err(SafetyError::Argument("priority out of range"));
        }
        self.acquire()?;
        self.vdd.set_priority(vdd);
        self.clk.set_priority(clk);
        self.mem.set_priority(mem);
        self.release();
        Ok(())
    }
}

fn bit_for(source: SourceId) -> u8 {
    match source {
        SourceId::Vdd => VDD_BIT,
        SourceId::Clk => CLK_BIT,
        SourceId::Mem => MEM_BIT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agg() -> Aggregator {
        Aggregator::new(1, 2, 3)
    }

    #[test]
    fn aggregate_ors_asserted_flags() {
        let agg = agg();
        agg.record(SourceId::Clk).isr_enter(0);
        agg.record(SourceId::Mem).isr_enter(0);
        assert_eq!(agg.aggregate(), Ok(CLK_BIT | MEM_BIT));
    }

    #[test]
    fn s1_single_vdd_fault() {
        let agg = agg();
        agg.record(SourceId::Vdd).isr_enter(0);
        agg.aggregate().unwrap();
        assert_eq!(agg.highest_priority(), Ok(FaultType::Vdd));
        assert_eq!(agg.has_multiple_active(), Ok(false));
    }

    #[test]
    fn s2_simultaneous_clk_and_mem() {
        let agg = agg();
        agg.record(SourceId::Clk).isr_enter(0);
        agg.record(SourceId::Mem).isr_enter(0);
        agg.aggregate().unwrap();
        assert!(agg.has_multiple_active().unwrap());
        assert_eq!(agg.highest_priority(), Ok(FaultType::Clk));
    }

    #[test]
    fn highest_priority_ignores_configured_table() {
        let agg = agg();
        agg.record(SourceId::Vdd).isr_enter(0);
        agg.record(SourceId::Clk).isr_enter(0);
        // Reconfigure so MEM would be "highest" by the diagnostic table --
        // aggregation must still prefer VDD.
        agg.set_priorities(3, 2, 1).unwrap();
        agg.aggregate().unwrap();
        assert_eq!(agg.highest_priority(), Ok(FaultType::Vdd));
    }

    #[test]
    fn set_priorities_rejects_out_of_range() {
        let agg = agg();
        assert_eq!(
            agg.set_priorities(0, 2, 3),
            Err(SafetyError::Argument("priority out of range"))
        );
        assert_eq!(agg.record(SourceId::Vdd).priority(), 1);
    }

    #[test]
    fn s6_dcls_corruption_aborts_without_mutating() {
        let agg = agg();
        agg.record(SourceId::Clk).isr_enter(0);
        agg.record(SourceId::Clk).inject_dcls_corruption();
        assert_eq!(agg.aggregate(), Err(SafetyError::Dcls));
        assert_eq!(agg.active_faults(), Ok(0));
    }

    #[test]
    fn clear_faults_clears_selected_bits_and_reaggregates() {
        let agg = agg();
        agg.record(SourceId::Clk).isr_enter(0);
        agg.record(SourceId::Mem).isr_enter(0);
        agg.aggregate().unwrap();
        assert_eq!(agg.clear_faults(CLK_BIT), Ok(MEM_BIT));
        assert_eq!(agg.active_faults(), Ok(MEM_BIT));
        assert_eq!(agg.record(SourceId::Clk).fault_flag(), Ok(false));
    }
}
