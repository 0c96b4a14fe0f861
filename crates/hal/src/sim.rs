//! A software `PlatformHal` for host-side tests and for the scenario tests
//! in `safety-core`. Lets a test script poke `clock_fault`/`ecc_fault` and
//! advance `timer_now_ms()` without any real hardware.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::{PlatformHal, PowerMode};

/// A fully software-driven HAL. Every field is independently settable so
/// tests can construct exact fault scenarios.
#[derive(Debug, Default)]
pub struct SimHal {
    safe_state_entries: AtomicU32,
    recovery_requests: AtomicU32,
    power_mode: AtomicU32,
    voltage_mv: AtomicU32,
    clock_fault: AtomicBool,
    ecc_fault: AtomicBool,
    time_ms: AtomicU32,
    fail_hal_calls: AtomicBool,
}

impl SimHal {
    pub fn new() -> Self {
        Self {
            power_mode: AtomicU32::new(mode_to_u32(PowerMode::Normal)),
            voltage_mv: AtomicU32::new(3300),
            ..Default::default()
        }
    }

    pub fn set_clock_fault(&self, asserted: bool) {
        self.clock_fault.store(asserted, Ordering::Relaxed);
    }

    pub fn set_ecc_fault(&self, asserted: bool) {
        self.ecc_fault.store(asserted, Ordering::Relaxed);
    }

    pub fn advance_ms(&self, by: u32) {
        self.time_ms.fetch_add(by, Ordering::Relaxed);
    }

    /// Causes every HAL call to fail, for `SafetyError::HalFailure` tests.
    pub fn fail_all_calls(&self, fail: bool) {
        self.fail_hal_calls.store(fail, Ordering::Relaxed);
    }

    pub fn safe_state_entry_count(&self) -> u32 {
        self.safe_state_entries.load(Ordering::Relaxed)
    }

    pub fn recovery_request_count(&self) -> u32 {
        self.recovery_requests.load(Ordering::Relaxed)
    }

    fn failing(&self) -> bool {
        self.fail_hal_calls.load(Ordering::Relaxed)
    }
}

fn mode_to_u32(m: PowerMode) -> u32 {
    match m {
        PowerMode::Normal => 0,
        PowerMode::SafeState => 1,
        PowerMode::Recovering => 2,
    }
}

fn u32_to_mode(v: u32) -> PowerMode {
    match v {
        1 => PowerMode::SafeState,
        2 => PowerMode::Recovering,
        _ => PowerMode::Normal,
    }
}

impl PlatformHal for SimHal {
    fn power_enter_safe_state(&self) -> bool {
        if self.failing() {
            return false;
        }
        self.safe_state_entries.fetch_add(1, Ordering::Relaxed);
        self.power_mode
            .store(mode_to_u32(PowerMode::SafeState), Ordering::Relaxed);
        true
    }

    fn power_request_recovery(&self) -> bool {
        if self.failing() {
            return false;
        }
        self.recovery_requests.fetch_add(1, Ordering::Relaxed);
        self.power_mode
            .store(mode_to_u32(PowerMode::Recovering), Ordering::Relaxed);
        true
    }

    fn power_get_status(&self) -> Option<(PowerMode, u32)> {
        if self.failing() {
            return None;
        }
        Some((
            u32_to_mode(self.power_mode.load(Ordering::Relaxed)),
            self.voltage_mv.load(Ordering::Relaxed),
        ))
    }

    fn interrupt_disable_all(&self) -> bool {
        !self.failing()
    }

    fn interrupt_enable_all(&self) -> bool {
        !self.failing()
    }

    fn clock_fault_asserted(&self) -> bool {
        self.clock_fault.load(Ordering::Relaxed)
    }

    fn ecc_fault_asserted(&self) -> bool {
        self.ecc_fault.load(Ordering::Relaxed)
    }

    fn timer_now_ms(&self) -> u32 {
        self.time_ms.load(Ordering::Relaxed)
    }
}
