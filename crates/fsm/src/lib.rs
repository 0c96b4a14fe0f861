//! The safety finite-state machine: five operating states plus an
//! `Invalid` corruption-latch sink, gated by a statically enforced
//! transition matrix.
//!
//! Every state change happens in task context, so the sequence of
//! transitions observed by every reader is totally ordered. Once `Invalid`
//! is latched there is no programmatic way out of it -- only a full
//! re-initialization, which this crate does not perform on its own
//! (the outer boot layer owns that).
//!
//! `SafetyFsm` takes the [`Aggregator`] it drives as a parameter on each
//! call rather than storing a reference to it, so the two can be owned
//! side by side (e.g. in `safety-core`) without a self-referential struct.

#![cfg_attr(not(test), no_std)]

use core::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};

use aggregator::Aggregator;
use dcls::{DualRail, RecoveryResult, SafetyState};
use safety_error::SafetyError;

const fn state_index(s: SafetyState) -> Option<usize> {
    match s {
        SafetyState::Init => Some(0),
        SafetyState::Normal => Some(1),
        SafetyState::Fault => Some(2),
        SafetyState::SafeState => Some(3),
        SafetyState::Recovery => Some(4),
        SafetyState::Invalid => None,
    }
}

/// `MATRIX[from][to]` is true iff the edge is admissible. Indexed via
/// [`state_index`]; `Invalid` has no row or column -- it is reached only by
/// falling out of this table, never looked up in it.
#[rustfmt::skip]
const MATRIX: [[bool; 5]; 5] = [
    //            INIT   NORMAL FAULT  SAFE   RECOVERY
    /* INIT     */ [false, true,  false, false, false],
    /* NORMAL   */ [false, true,  true,  true,  false],
    /* FAULT    */ [false, false, true,  true,  true],
    /* SAFE     */ [false, false, false, true,  true],
    /* RECOVERY */ [false, true,  true,  true,  true],
];

fn admissible(from: SafetyState, to: SafetyState) -> bool {
    match (state_index(from), state_index(to)) {
        (Some(f), Some(t)) => MATRIX[f][t],
        _ => false,
    }
}

/// The safety state and the bookkeeping fields the periodic task updates
/// on every transition. The aggregated fault mask itself lives in the
/// [`Aggregator`] passed to each method.
pub struct SafetyFsm {
    state: DualRail<SafetyState>,
    recovery_status: DualRail<RecoveryResult>,
    fault_count: AtomicU16,
    timestamp_ms: AtomicU32,
    initialized: AtomicBool,
}

/// A snapshot returned by [`SafetyFsm::status`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SafetyStatus {
    pub state: SafetyState,
    pub active_faults: u8,
    pub recovery_status: RecoveryResult,
    pub fault_count: u16,
    pub timestamp_ms: u32,
}

impl SafetyFsm {
    pub fn new() -> Self {
        Self {
            state: DualRail::new(SafetyState::Invalid),
            recovery_status: DualRail::new(RecoveryResult::Pending),
            fault_count: AtomicU16::new(0),
            timestamp_ms: AtomicU32::new(0),
            initialized: AtomicBool::new(false),
        }
    }

    /// Sets state to `INIT` and clears all fault flags. A second call
    /// returns `SafetyError::Argument` and changes nothing.
    pub fn init(&self, aggregator: &Aggregator, now_ms: u32) -> Result<(), SafetyError> {
        if self
            .initialized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return Err(SafetyError::Argument("already initialized"));
        }
        self.state.store(SafetyState::Init);
        aggregator.clear_faults(0x07)?;
        self.fault_count.store(0, Ordering::Relaxed);
        self.timestamp_ms.store(now_ms, Ordering::Relaxed);
        Ok(())
    }

    fn latch_invalid(&self) {
        self.state.store(SafetyState::Invalid);
    }

    /// Attempts `current -> next`. On an inadmissible edge the state
    /// latches to `Invalid` and `SafetyError::InadmissibleTransition` is
    /// returned; the FSM never performs the requested transition in that
    /// case.
    pub fn transition(&self, next: SafetyState, now_ms: u32) -> Result<(), SafetyError> {
        let current = self.state.load()?;
        if current == SafetyState::Invalid || !admissible(current, next) {
            self.latch_invalid();
            return Err(SafetyError::InadmissibleTransition);
        }
        self.state.store(next);
        self.timestamp_ms.store(now_ms, Ordering::Relaxed);
        Ok(())
    }

    /// Reads the state through its DCLS check, reporting corruption as
    /// `Invalid` rather than a separate error channel -- `Invalid` *is*
    /// the corruption sink for this one accessor. Callers that need to
    /// distinguish "latched by policy" from "torn read" should use
    /// [`SafetyFsm::transition`]'s `Result` instead.
    pub fn current_state(&self) -> SafetyState {
        self.state.load().unwrap_or(SafetyState::Invalid)
    }

    /// Atomically verifies and copies the full status record.
    pub fn status(&self, aggregator: &Aggregator) -> Result<SafetyStatus, SafetyError> {
        let state = self.state.load()?;
        let active_faults = aggregator.active_faults()?;
        let recovery_status = self.recovery_status.load()?;
        Ok(SafetyStatus {
            state,
            active_faults,
            recovery_status,
            fault_count: self.fault_count.load(Ordering::Relaxed),
            timestamp_ms: self.timestamp_ms.load(Ordering::Relaxed),
        })
    }

    pub fn set_recovery_status(&self, status: RecoveryResult) {
        self.recovery_status.store(status);
    }

    /// Re-runs aggregation; if new faults appeared while `NORMAL`, drives
    /// `NORMAL -> FAULT` and bumps `fault_count`.
    pub fn aggregate_faults(
        &self,
        aggregator: &Aggregator,
        now_ms: u32,
    ) -> Result<u8, SafetyError> {
        let mask = aggregator.aggregate()?;
        if mask != 0 && self.state.load()? == SafetyState::Normal {
            self.fault_count.fetch_add(1, Ordering::Relaxed);
            self.transition(SafetyState::Fault, now_ms)?;
        }
        Ok(mask)
    }

    /// Clears the given per-source flags and re-aggregates.
    pub fn clear_faults(&self, aggregator: &Aggregator, mask: u8) -> Result<u8, SafetyError> {
        aggregator.clear_faults(mask)
    }
}

impl Default for SafetyFsm {
    fn default() -> Self {
        Self::new()
    }
}
