//! Orchestration: the one periodic tick that wires the DCLS primitives,
//! the fault aggregator, the safety FSM, the per-source recovery services,
//! statistics, and tracing into the control flow described for the
//! power-management subsystem.
//!
//! This crate owns no register access of its own -- every hardware
//! interaction goes through the [`PlatformHal`] handed to [`SafetyCore`].

#![cfg_attr(not(test), no_std)]

use dcls::{RecoveryResult, SafetyState};
use fault_sources::SourceId;
use hal::PlatformHal;
use recovery::RecoveryService;
use safety_config::SafetyConfig;
use safety_error::SafetyError;
use stats::Statistics;

pub use aggregator::Aggregator;
pub use diagnostics::{Trace, TraceEvent};
pub use fsm::{SafetyFsm, SafetyStatus};

const SOURCES: [SourceId; 3] = [SourceId::Vdd, SourceId::Clk, SourceId::Mem];

fn recovery_index(source: SourceId) -> usize {
    match source {
        SourceId::Vdd => 0,
        SourceId::Clk => 1,
        SourceId::Mem => 2,
    }
}

/// The full safety core for one device: fault records, aggregator, FSM,
/// per-source recovery services, statistics, and trace, driven by a
/// caller-supplied [`PlatformHal`].
pub struct SafetyCore<'h, H: PlatformHal> {
    hal: &'h H,
    aggregator: Aggregator,
    fsm: SafetyFsm,
    recovery: [RecoveryService; 3],
    stats: Statistics,
    trace: Trace,
    tick_ms: u32,
}

impl<'h, H: PlatformHal> SafetyCore<'h, H> {
    pub fn new(hal: &'h H, config: SafetyConfig, tick_ms: u32) -> Self {
        Self {
            hal,
            aggregator: Aggregator::new(
                config.priorities.vdd,
                config.priorities.clk,
                config.priorities.mem,
            ),
            fsm: SafetyFsm::new(),
            recovery: [
                RecoveryService::new(config),
                RecoveryService::new(config),
                RecoveryService::new(config),
            ],
            stats: Statistics::new(),
            trace: Trace::new(),
            tick_ms,
        }
    }

    /// Initializes the FSM. Must be called exactly once before the first
    /// [`SafetyCore::tick`].
    pub fn init(&mut self, now_ms: u32) -> Result<(), SafetyError> {
        self.fsm.init(&self.aggregator, now_ms)?;
        self.transition_traced(SafetyState::Normal, now_ms)
    }

    /// The fault record for `source`, so an interrupt handler registered
    /// with the platform's interrupt controller can call
    /// `isr_enter(now_ms)` on it directly.
    pub fn fault_record(&self, source: SourceId) -> &fault_sources::FaultRecord {
        self.aggregator.record(source)
    }

    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    fn hardware_fault_asserted(&self, source: SourceId) -> bool {
        match source {
            SourceId::Vdd => self
                .hal
                .power_get_status()
                .map(|(mode, _)| mode != hal::PowerMode::Normal)
                .unwrap_or(true),
            SourceId::Clk => self.hal.clock_fault_asserted(),
            SourceId::Mem => self.hal.ecc_fault_asserted(),
        }
    }

    fn escalate(&mut self, now_ms: u32, error: SafetyError) -> SafetyError {
        self.trace.record(TraceEvent::Escalation { error });
        if matches!(error, SafetyError::Dcls) {
            self.trace.record(TraceEvent::DclsCorruption {
                site: "safety-core tick",
            });
        }
        let _ = self.transition_traced(SafetyState::SafeState, now_ms);
        let _ = self.hal.power_enter_safe_state();
        error
    }

    /// Wraps [`SafetyFsm::transition`] with a trace record of the attempt:
    /// `from` is the state observed before the call, `to` is the state
    /// actually reached afterwards -- `next` itself on an admitted edge, or
    /// `Invalid` if the edge was rejected and the FSM latched. Recording the
    /// real outcome rather than the requested target means a rejected
    /// transition shows up in the trace as clearly as an admitted one.
    fn transition_traced(&mut self, next: SafetyState, now_ms: u32) -> Result<(), SafetyError> {
        let from = self.fsm.current_state();
        let result = self.fsm.transition(next, now_ms);
        let to = self.fsm.current_state();
        self.trace.record(TraceEvent::FsmTransition { from, to });
        result
    }

    /// Runs one tick in the documented order: drain recovery services,
    /// aggregate faults, transition the FSM if warranted, update
    /// statistics, flush trace events. Returns the resulting status.
    pub fn tick(&mut self, now_ms: u32) -> Result<SafetyStatus, SafetyError> {
        self.stats.advance_uptime(self.tick_ms, now_ms);

        for &source in &SOURCES {
            let asserted = self.hardware_fault_asserted(source);
            let idx = recovery_index(source);
            let before = self.recovery[idx].state();
            if let Some(outcome) = self.recovery[idx].task(asserted) {
                self.stats.record_recovery_failure(now_ms);
                self.trace.record(TraceEvent::RecoveryOutcome {
                    source,
                    result: outcome,
                });
            }
            let after = self.recovery[idx].state();
            if after != before {
                self.trace.record(TraceEvent::RecoveryTransition {
                    source,
                    from: before,
                    to: after,
                });
            }
        }

        let previous_mask = match self.aggregator.active_faults() {
            Ok(m) => m,
            Err(e) => return Err(self.escalate(now_ms, e)),
        };

        let state_before_aggregate = self.fsm.current_state();
        let mask = match self.fsm.aggregate_faults(&self.aggregator, now_ms) {
            Ok(m) => m,
            Err(e) => return Err(self.escalate(now_ms, e)),
        };
        let state_after_aggregate = self.fsm.current_state();
        if state_after_aggregate != state_before_aggregate {
            self.trace.record(TraceEvent::FsmTransition {
                from: state_before_aggregate,
                to: state_after_aggregate,
            });
        }

        let newly_asserted = mask & !previous_mask;
        for &source in &SOURCES {
            if newly_asserted & aggregator_bit(source) != 0 {
                self.stats.record_detected(source, now_ms);
                self.recovery[recovery_index(source)].handle_fault();
                self.trace.record(TraceEvent::FaultDetected { source });
            }
        }

        // Drive straight through to SAFE_STATE within the same tick a fault
        // is aggregated, rather than waiting for a later tick to notice
        // FAULT is still asserted: the fault-to-safe-state latency budget is
        // one tick period, and FAULT -> SAFE_STATE is always admissible, so
        // there is nothing to gain by splitting the two transitions across
        // ticks. `aggregate_faults` already recorded NORMAL -> FAULT above
        // when this is a first detection; this is the second, immediately
        // following transition in that same tick.
        if mask != 0 {
            if let Err(e) = self.transition_traced(SafetyState::SafeState, now_ms) {
                if self.fsm.current_state() != SafetyState::SafeState {
                    return Err(self.escalate(now_ms, e));
                }
            }
            let _ = self.hal.power_enter_safe_state();
        }

        critical_section::with(|_| self.fsm.status(&self.aggregator))
            .map_err(|e| self.escalate(now_ms, e))
    }

    /// Consumes a confirmed recovery for `source` and, if successful,
    /// clears its flag and asks the FSM to transition back out of
    /// `SAFE_STATE`/`FAULT` through `RECOVERY`.
    ///
    /// The recovery service itself returns `Success` for two different
    /// reasons: a source that was never in trouble and is simply `Idle`,
    /// and a source whose confirmed recovery this call just consumed. Only
    /// the latter has anything for the FSM to do -- driving
    /// `NORMAL -> RECOVERY` when the FSM is already `NORMAL` is not an
    /// admissible edge and would permanently latch `Invalid`. The FSM's own
    /// current state is what distinguishes the two cases: there is nothing
    /// to recover from unless the FSM is already off the `NORMAL` path.
    pub fn request_recovery(
        &mut self,
        source: SourceId,
        now_ms: u32,
    ) -> Result<RecoveryResult, SafetyError> {
        let result = self.recovery[recovery_index(source)].request_recovery();
        self.fsm.set_recovery_status(result);
        let recovering = matches!(
            self.fsm.current_state(),
            SafetyState::Fault | SafetyState::SafeState | SafetyState::Recovery
        );
        if result == RecoveryResult::Success && recovering {
            self.stats.record_recovery_success(now_ms);
            let _ = self.hal.power_request_recovery();
            let bit = aggregator_bit(source);
            let remaining = self.fsm.clear_faults(&self.aggregator, bit)?;
            self.trace.record(TraceEvent::FaultCleared { mask: bit });
            if remaining == 0 {
                self.transition_traced(SafetyState::Recovery, now_ms)?;
                self.transition_traced(SafetyState::Normal, now_ms)?;
            }
        }
        Ok(result)
    }
}

fn aggregator_bit(source: SourceId) -> u8 {
    match source {
        SourceId::Vdd => aggregator::VDD_BIT,
        SourceId::Clk => aggregator::CLK_BIT,
        SourceId::Mem => aggregator::MEM_BIT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hal::sim::SimHal;

    fn core(hal: &SimHal) -> SafetyCore<'_, SimHal> {
        let mut core = SafetyCore::new(hal, SafetyConfig::default(), 10);
        core.init(0).unwrap();
        core
    }

    #[test]
    fn starts_normal_with_no_faults() {
        let hal = SimHal::new();
        let mut core = core(&hal);
        let status = core.tick(10).unwrap();
        assert_eq!(status.state, SafetyState::Normal);
        assert_eq!(status.active_faults, 0);
    }

    #[test]
    fn s1_single_vdd_fault_enters_safe_state() {
        let hal = SimHal::new();
        let mut core = core(&hal);
        core.fault_record(SourceId::Vdd).isr_enter(0);
        let status = core.tick(10).unwrap();
        assert_eq!(status.active_faults, aggregator::VDD_BIT);
        assert_eq!(status.state, SafetyState::SafeState);
        assert_eq!(status.fault_count, 1);
        assert_eq!(hal.safe_state_entry_count(), 1);
        assert_eq!(core.statistics().diagnostic_coverage(SourceId::Vdd), 100);
    }

    #[test]
    fn s4_recovery_timeout_increments_failure_count() {
        let hal = SimHal::new();
        let mut core = core(&hal);
        hal.set_clock_fault(true);
        core.fault_record(SourceId::Clk).isr_enter(0);
        core.tick(10).unwrap();
        for t in 1..=10u32 {
            core.tick(10 + t * 10).unwrap();
        }
        assert_eq!(core.statistics().snapshot().recovery_failures, 1);
    }

    #[test]
    fn s3_recovery_confirms_and_returns_to_normal() {
        let hal = SimHal::new();
        let mut core = core(&hal);
        hal.set_clock_fault(true);
        core.fault_record(SourceId::Clk).isr_enter(0);
        core.tick(10).unwrap();
        hal.set_clock_fault(false);
        for t in 1..=6u32 {
            core.tick(10 + t * 10).unwrap();
        }
        let result = core.request_recovery(SourceId::Clk, 100).unwrap();
        assert_eq!(result, RecoveryResult::Success);
        let status = core.tick(110).unwrap();
        assert_eq!(status.state, SafetyState::Normal);
    }

    #[test]
    fn tick_and_recovery_emit_fsm_transition_and_fault_cleared_trace_events() {
        let hal = SimHal::new();
        let mut core = core(&hal);
        hal.set_clock_fault(true);
        core.fault_record(SourceId::Clk).isr_enter(0);
        core.tick(10).unwrap();
        assert!(core.trace().iter().any(|e| matches!(
            e,
            TraceEvent::FsmTransition {
                from: SafetyState::Normal,
                to: SafetyState::Fault
            }
        )));
        hal.set_clock_fault(false);
        for t in 1..=6u32 {
            core.tick(10 + t * 10).unwrap();
        }
        core.request_recovery(SourceId::Clk, 100).unwrap();
        assert!(core
            .trace()
            .iter()
            .any(|e| matches!(e, TraceEvent::FaultCleared { .. })));
        assert!(core.trace().iter().any(|e| matches!(
            e,
            TraceEvent::FsmTransition {
                from: SafetyState::Recovery,
                to: SafetyState::Normal
            }
        )));
    }

    #[test]
    fn request_recovery_on_idle_source_does_not_touch_fsm() {
        let hal = SimHal::new();
        let mut core = core(&hal);
        let result = core.request_recovery(SourceId::Mem, 10).unwrap();
        assert_eq!(result, RecoveryResult::Success);
        assert_eq!(core.fsm.current_state(), SafetyState::Normal);
        assert_eq!(hal.recovery_request_count(), 0);
    }

    #[test]
    fn s6_dcls_corruption_escalates_to_safe_state() {
        let hal = SimHal::new();
        let mut core = core(&hal);
        core.fault_record(SourceId::Clk).inject_dcls_corruption();
        let err = core.tick(10).unwrap_err();
        assert_eq!(err, SafetyError::Dcls);
        assert_eq!(core.fsm.current_state(), SafetyState::SafeState);
        assert_eq!(hal.safe_state_entry_count(), 1);
    }
}
