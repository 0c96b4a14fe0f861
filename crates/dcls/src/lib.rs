//! Dual-channel logic signature (DCLS) primitives.
//!
//! Everything safety-relevant that this system stores -- FSM state, fault
//! flags, recovery outcomes -- is stored in a [`raw::Drb`] (dual-rail byte)
//! or a [`dual_rail::DualRail`] wrapper rather than a plain field, so that a
//! single-bit memory corruption is caught at read time instead of silently
//! propagating into a safety decision.

#![cfg_attr(not(test), no_std)]

pub mod codes;
pub mod dual_rail;
pub mod raw;

pub use codes::{FaultType, RecoveryResult, SafetyState};
pub use dual_rail::DualRail;
pub use raw::{Corruption, Drb};
