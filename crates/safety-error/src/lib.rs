//! The error taxonomy shared by every module in the safety core.
//!
//! Every public, fallible function in this workspace returns
//! `Result<T, SafetyError>` rather than a boolean plus an out-parameter.
//! `Argument` and `Busy` never mutate state; the other three variants are
//! always escalating -- by the time a caller observes one, the affected
//! record has already latched (FSM state to `INVALID`, or a recovery
//! service back to `IDLE` with a recorded failure).

#![no_std]

use dcls::Corruption;

/// The shared error type for the safety core.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SafetyError {
    /// Bad input, out-of-range priority, double-initialization.
    Argument(&'static str),
    /// A non-reentrant gate (aggregator, statistics lock) was contended.
    /// Retry on the next tick.
    Busy,
    /// A DRB failed its invariant.
    Dcls,
    /// `fsm_transition` was asked for an edge the matrix does not admit.
    /// The FSM has already latched `INVALID`.
    InadmissibleTransition,
    /// A recovery service abandoned an attempt without confirmation.
    RecoveryTimeout,
    /// A HAL call returned failure.
    HalFailure,
}

impl From<Corruption> for SafetyError {
    fn from(_: Corruption) -> Self {
        SafetyError::Dcls
    }
}

impl SafetyError {
    /// True for the two variants that never mutate state.
    pub fn is_non_escalating(self) -> bool {
        matches!(self, SafetyError::Argument(_) | SafetyError::Busy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corruption_converts_to_dcls_error() {
        let e: SafetyError = Corruption.into();
        assert_eq!(e, SafetyError::Dcls);
    }

    #[test]
    fn classification_matches_propagation_policy() {
        assert!(SafetyError::Busy.is_non_escalating());
        assert!(SafetyError::Argument("bad").is_non_escalating());
        assert!(!SafetyError::Dcls.is_non_escalating());
        assert!(!SafetyError::RecoveryTimeout.is_non_escalating());
        assert!(!SafetyError::HalFailure.is_non_escalating());
    }
}
