//! Dual-rail byte (DRB) primitive.
//!
//! A DRB stores a value alongside its bitwise complement. The invariant
//! `value ^ complement == 0xFF` is checked on every read; any violation is a
//! corruption event and is never repaired silently. Writers store the two
//! halves through independent atomics with a fence between them so that a
//! concurrent reader observes either the old pair or the new pair, never a
//! torn mix of the two -- a torn read still shows up as a corrupted XOR and
//! is handled the same way as genuine bit-flip damage.

use core::sync::atomic::{AtomicU8, Ordering};

/// A DRB failed its `value ^ complement == 0xFF` invariant.
///
/// Per the fail-safe bias, callers must treat the logical value carried by a
/// corrupted DRB as fault-asserted and escalate; there is no local repair.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Corruption;

/// Returns the `(value, complement)` pair for `v`.
pub const fn encode(v: u8) -> (u8, u8) {
    (v, !v)
}

/// Returns `Ok(v)` iff `v ^ c == 0xFF`.
pub const fn decode(v: u8, c: u8) -> Result<u8, Corruption> {
    if v ^ c == 0xFF {
        Ok(v)
    } else {
        Err(Corruption)
    }
}

/// An 8-bit value stored alongside its complement, with atomic halves.
///
/// `Drb` is the building block for every safety-critical flag, enum, and
/// bitmask in this crate. It never exposes a way to write one half without
/// the other.
#[derive(Debug)]
pub struct Drb {
    value: AtomicU8,
    complement: AtomicU8,
}

impl Drb {
    /// Builds a DRB already holding `v`.
    pub const fn new(v: u8) -> Self {
        let (value, complement) = encode(v);
        Self {
            value: AtomicU8::new(value),
            complement: AtomicU8::new(complement),
        }
    }

    /// A DRB in the logical "clear" state (`0x00` / `0xFF`).
    pub const fn cleared() -> Self {
        Self::new(0x00)
    }

    /// Writes both halves of the pair so that no concurrent reader can ever
    /// observe a torn combination of old and new halves.
    ///
    /// This is the only way to mutate a `Drb`: there is deliberately no
    /// accessor that writes a single half.
    pub fn store_atomic(&self, v: u8) {
        let (value, complement) = encode(v);
        self.value.store(value, Ordering::Relaxed);
        core::sync::atomic::fence(Ordering::Release);
        self.complement.store(complement, Ordering::Relaxed);
    }

    /// Forces both halves to the same byte, deliberately creating a DRB
    /// violation. Used by ISR entry when reentrancy has gone pathological
    /// and downstream readers must latch corruption rather than trust the
    /// flag.
    pub fn corrupt_with(&self, v: u8) {
        self.value.store(v, Ordering::Relaxed);
        core::sync::atomic::fence(Ordering::Release);
        self.complement.store(v, Ordering::Relaxed);
    }

    /// Reads both halves and verifies the DCLS invariant.
    pub fn load(&self) -> Result<u8, Corruption> {
        let value = self.value.load(Ordering::Relaxed);
        core::sync::atomic::fence(Ordering::Acquire);
        let complement = self.complement.load(Ordering::Relaxed);
        decode(value, complement)
    }

    /// Raw halves, for diagnostics only -- never used to derive a logical
    /// value without going through [`Drb::load`].
    pub fn raw_halves(&self) -> (u8, u8) {
        (
            self.value.load(Ordering::Relaxed),
            self.complement.load(Ordering::Relaxed),
        )
    }
}

impl Clone for Drb {
    fn clone(&self) -> Self {
        let (v, c) = self.raw_halves();
        Self {
            value: AtomicU8::new(v),
            complement: AtomicU8::new(c),
        }
    }
}

impl Default for Drb {
    fn default() -> Self {
        Self::cleared()
    }
}
