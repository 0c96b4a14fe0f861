//! Byte-level codes for the safety domain types.
//!
//! Discriminants are fixed: they are Hamming-distance-separated on purpose
//! (no two valid codes within a type differ by a single bit) so that a
//! single-bit flip can never turn one valid code into another. `0xFF` (or
//! `0xCC`/`0x55` where already taken) is reserved as the explicit "invalid"
//! sentinel for each type and is what `TryFrom` falls back to describe a
//! code that round-tripped through a DRB but isn't one of the defined
//! values.

use num_derive::{FromPrimitive, ToPrimitive};

/// The five operating states of the safety finite state machine, plus the
/// `Invalid` corruption-latch sink.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum SafetyState {
    Init = 0x55,
    Normal = 0xAA,
    Fault = 0xCC,
    SafeState = 0x33,
    Recovery = 0x99,
    Invalid = 0xFF,
}

/// A single fault source, or a combination bitmask value.
///
/// `Multiple` is a distinct code rather than a bitmask composition so that
/// it, too, carries Hamming separation from the individual sources; the
/// aggregator is responsible for deciding when more than one source is
/// asserted and substituting this code.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum FaultType {
    None = 0x00,
    Vdd = 0x01,
    Clk = 0x02,
    MemEcc = 0x04,
    Multiple = 0x07,
    Invalid = 0xFF,
}

/// Outcome of a recovery attempt for a single fault source.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u8)]
pub enum RecoveryResult {
    Pending = 0x00,
    Success = 0xAA,
    Failed = 0x55,
    Timeout = 0xCC,
    Invalid = 0xFF,
}

macro_rules! impl_byte_code {
    ($ty:ty, $invalid:expr) => {
        impl $ty {
            /// Converts a raw byte to this code, mapping anything
            /// undefined to the type's `Invalid` variant rather than
            /// failing -- undefined codes are corruption, not program
            /// error, and corruption must fail safe.
            pub fn from_byte(b: u8) -> Self {
                <Self as num_traits::FromPrimitive>::from_u8(b).unwrap_or($invalid)
            }

            /// The raw byte for this code.
            pub fn to_byte(self) -> u8 {
                <Self as num_traits::ToPrimitive>::to_u8(&self).unwrap_or(0xFF)
            }

            /// True for every variant except `Invalid`.
            pub fn is_valid(self) -> bool {
                self != $invalid
            }
        }

        impl From<$ty> for u8 {
            fn from(v: $ty) -> u8 {
                v.to_byte()
            }
        }

        impl From<u8> for $ty {
            fn from(b: u8) -> Self {
                Self::from_byte(b)
            }
        }
    };
}

impl_byte_code!(SafetyState, SafetyState::Invalid);
impl_byte_code!(FaultType, FaultType::Invalid);
impl_byte_code!(RecoveryResult, RecoveryResult::Invalid);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safety_state_roundtrips() {
        for s in [
            SafetyState::Init,
            SafetyState::Normal,
            SafetyState::Fault,
            SafetyState::SafeState,
            SafetyState::Recovery,
        ] {
            assert_eq!(SafetyState::from_byte(s.to_byte()), s);
        }
    }

    #[test]
    fn undefined_byte_maps_to_invalid() {
        assert_eq!(SafetyState::from_byte(0x00), SafetyState::Invalid);
        assert_eq!(FaultType::from_byte(0x03), FaultType::Invalid);
        assert_eq!(RecoveryResult::from_byte(0x01), RecoveryResult::Invalid);
    }

    #[test]
    fn invalid_is_not_valid() {
        assert!(!SafetyState::Invalid.is_valid());
        assert!(SafetyState::Normal.is_valid());
    }
}
