//! Per-source recovery service: a secondary state machine, driven once per
//! 10 ms tick, that applies hysteresis before declaring a fault recovered.
//!
//! Unlike the fault records and the safety FSM, this state is task-private
//! and single-writer by construction, so it needs no DCLS encoding --
//! there is exactly one caller (the periodic task) and no interrupt-context
//! access at all.

#![no_std]

use dcls::RecoveryResult;
use safety_config::SafetyConfig;

/// The four states of one source's recovery service.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ServiceState {
    Idle,
    FaultActive,
    RecoveryPending,
    RecoveryConfirmed,
}

/// Hysteresis state for one fault source's recovery.
pub struct RecoveryService {
    state: ServiceState,
    timeout_counter: u32,
    stability_counter: u32,
    attempt_count: u32,
    recovery_timeout_ticks: u32,
    stability_ticks: u32,
}

impl RecoveryService {
    pub fn new(config: SafetyConfig) -> Self {
        Self {
            state: ServiceState::Idle,
            timeout_counter: 0,
            stability_counter: 0,
            attempt_count: 0,
            recovery_timeout_ticks: config.recovery_timeout_ticks,
            stability_ticks: config.stability_ticks,
        }
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    fn enter_fault_active(&mut self) {
        self.state = ServiceState::FaultActive;
        self.timeout_counter = 0;
        self.stability_counter = 0;
        self.attempt_count += 1;
    }

    /// Called by the FSM (or defensively, whenever a fault is observed
    /// while `Idle`) to start a recovery cycle.
    pub fn handle_fault(&mut self) {
        if self.state != ServiceState::FaultActive {
            self.enter_fault_active();
        }
    }

    /// Advances the service by one tick given the current hardware signal.
    /// Returns `Some(RecoveryResult::Timeout)` exactly on the tick the
    /// attempt is abandoned; `None` otherwise (confirmation is observed
    /// via [`RecoveryService::request_recovery`], not here).
    pub fn task(&mut self, fault_asserted: bool) -> Option<RecoveryResult> {
        match self.state {
            ServiceState::Idle => {
                if fault_asserted {
                    self.enter_fault_active();
                }
                None
            }
            ServiceState::FaultActive => {
                self.timeout_counter += 1;
                if self.timeout_counter >= self.recovery_timeout_ticks {
                    self.state = ServiceState::Idle;
                    Some(RecoveryResult::Timeout)
                } else if !fault_asserted {
                    self.state = ServiceState::RecoveryPending;
                    self.stability_counter = 0;
                    None
                } else {
                    None
                }
            }
            ServiceState::RecoveryPending => {
                if fault_asserted {
                    // Re-fault restarts the timeout budget, not the
                    // stability budget: both counters reset together here
                    // because the attempt genuinely starts over.
                    self.state = ServiceState::FaultActive;
                    self.timeout_counter = 0;
                    self.stability_counter = 0;
                } else {
                    self.stability_counter += 1;
                    if self.stability_counter >= self.stability_ticks {
                        self.state = ServiceState::RecoveryConfirmed;
                    }
                }
                None
            }
            ServiceState::RecoveryConfirmed => {
                if fault_asserted {
                    self.state = ServiceState::FaultActive;
                    self.timeout_counter = 0;
                    self.stability_counter = 0;
                }
                None
            }
        }
    }

    /// Consumes a confirmed recovery, or reports that one is still in
    /// progress.
    pub fn request_recovery(&mut self) -> RecoveryResult {
        match self.state {
            ServiceState::Idle => RecoveryResult::Success,
            ServiceState::FaultActive | ServiceState::RecoveryPending => RecoveryResult::Pending,
            ServiceState::RecoveryConfirmed => {
                self.state = ServiceState::Idle;
                RecoveryResult::Success
            }
        }
    }
}
