//! Typed dual-rail storage for the byte codes in [`crate::codes`].

use crate::raw::{Corruption, Drb};

/// A [`Drb`] that stores one of the fixed byte-code enums instead of a raw
/// byte.
///
/// `DualRail` never exposes the raw byte to callers: a corrupted pair
/// surfaces as [`Corruption`], and a structurally intact pair that doesn't
/// decode to a defined value for `T` surfaces as `T`'s own `Invalid`
/// variant, not as an error -- the two failure modes are different (torn or
/// flipped storage vs. a value that was never written) and callers of the
/// safety FSM care about the distinction.
#[derive(Debug)]
pub struct DualRail<T> {
    drb: Drb,
    _marker: core::marker::PhantomData<T>,
}

impl<T> DualRail<T>
where
    T: Copy + From<u8> + Into<u8>,
{
    /// Builds a `DualRail` already holding `v`.
    pub fn new(v: T) -> Self {
        Self {
            drb: Drb::new(v.into()),
            _marker: core::marker::PhantomData,
        }
    }

    /// Stores `v`, replacing both halves atomically.
    pub fn store(&self, v: T) {
        self.drb.store_atomic(v.into());
    }

    /// Reads the current value, or [`Corruption`] if the DRB invariant was
    /// violated.
    pub fn load(&self) -> Result<T, Corruption> {
        self.drb.load().map(T::from)
    }

    /// Deliberately corrupts the stored pair. Used by fault injection paths
    /// in tests and by ISR nesting-overflow handling.
    pub fn corrupt(&self) {
        self.drb.corrupt_with(0x00);
    }
}

impl<T> Clone for DualRail<T> {
    fn clone(&self) -> Self {
        Self {
            drb: self.drb.clone(),
            _marker: core::marker::PhantomData,
        }
    }
}

impl<T> Default for DualRail<T>
where
    T: Copy + From<u8> + Into<u8> + Default,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::SafetyState;

    impl Default for SafetyState {
        fn default() -> Self {
            SafetyState::Init
        }
    }

    #[test]
    fn stores_and_loads_typed_value() {
        let dr: DualRail<SafetyState> = DualRail::new(SafetyState::Normal);
        assert_eq!(dr.load(), Ok(SafetyState::Normal));
    }

    #[test]
    fn corruption_is_reported_distinctly_from_invalid() {
        let dr: DualRail<SafetyState> = DualRail::new(SafetyState::Normal);
        dr.corrupt();
        assert_eq!(dr.load(), Err(Corruption));
    }

    #[test]
    fn default_uses_type_default() {
        let dr: DualRail<SafetyState> = DualRail::default();
        assert_eq!(dr.load(), Ok(SafetyState::Init));
    }
}
