//! Runtime-tunable configuration for the recovery services and the fault
//! aggregator's diagnostic priority table.
//!
//! There is no on-target file format: the core has no filesystem and no
//! dynamic allocation, so configuration is a plain typed struct constructed
//! once at boot and treated as read-mostly afterward.

#![no_std]

/// Per-source diagnostic priority tier. Aggregation itself always selects
/// by the fixed VDD > CLK > MEM order regardless of this table; see the
/// aggregator crate for why the table is kept anyway.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PriorityTable {
    pub vdd: u8,
    pub clk: u8,
    pub mem: u8,
}

impl Default for PriorityTable {
    fn default() -> Self {
        Self {
            vdd: 1,
            clk: 2,
            mem: 3,
        }
    }
}

impl PriorityTable {
    /// True iff every tier is in the valid `1..=3` range.
    pub fn is_valid(&self) -> bool {
        [self.vdd, self.clk, self.mem]
            .iter()
            .all(|p| (1..=3).contains(p))
    }
}

/// Recovery service and aggregator tunables.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SafetyConfig {
    pub recovery_timeout_ticks: u32,
    pub stability_ticks: u32,
    pub priorities: PriorityTable,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            recovery_timeout_ticks: 10,
            stability_ticks: 5,
            priorities: PriorityTable::default(),
        }
    }
}
