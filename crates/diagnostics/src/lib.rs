//! A fixed-capacity ring buffer of safety-relevant events, adapted from
//! the simpler `ringbuf!`/`ringbuf_entry!` style: a single static buffer
//! that evicts its oldest entry once full instead of growing without
//! bound, and counts how many entries have been evicted unread.
//!
//! Nothing in the safety core ever branches on trace contents -- this
//! exists purely so an offline dump can reconstruct the causal chain from
//! a DCLS or timeout error back through the transitions that led to it.

#![cfg_attr(not(test), no_std)]

use dcls::{RecoveryResult, SafetyState};
use fault_sources::SourceId;
use heapless::Deque;
use recovery::ServiceState;
use safety_error::SafetyError;

/// One safety-relevant occurrence, as recorded in the trace.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    FsmTransition {
        from: SafetyState,
        to: SafetyState,
    },
    FaultDetected {
        source: SourceId,
    },
    FaultCleared {
        mask: u8,
    },
    RecoveryTransition {
        source: SourceId,
        from: ServiceState,
        to: ServiceState,
    },
    RecoveryOutcome {
        source: SourceId,
        result: RecoveryResult,
    },
    DclsCorruption {
        site: &'static str,
    },
    Escalation {
        error: SafetyError,
    },
}

/// Ring capacity. Sized generously relative to one tick's worth of events
/// (at most a handful) so a burst of simultaneous faults never wraps
/// before the next drain.
pub const CAPACITY: usize = 64;

/// A bounded trace of recent [`TraceEvent`]s. Pushing past capacity drops
/// the oldest entry; the push itself never fails or blocks.
pub struct Trace {
    buf: Deque<TraceEvent, CAPACITY>,
    dropped: u32,
}

impl Trace {
    pub const fn new() -> Self {
        Self {
            buf: Deque::new(),
            dropped: 0,
        }
    }

    /// Appends `event`, evicting the oldest entry first if the buffer is
    /// full.
    pub fn record(&mut self, event: TraceEvent) {
        if self.buf.is_full() {
            self.buf.pop_front();
            self.dropped = self.dropped.saturating_add(1);
        }
        // Capacity was just ensured above; this cannot fail.
        let _ = self.buf.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Count of entries evicted before being read, for diagnosing an
    /// under-sized buffer.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Iterates oldest-first.
    pub fn iter(&self) -> impl Iterator<Item = &TraceEvent> {
        self.buf.iter()
    }
}

impl Default for Trace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_events_in_order() {
        let mut trace = Trace::new();
        trace.record(TraceEvent::FaultDetected {
            source: SourceId::Vdd,
        });
        trace.record(TraceEvent::FsmTransition {
            from: SafetyState::Normal,
            to: SafetyState::Fault,
        });
        assert_eq!(trace.len(), 2);
        assert_eq!(
            trace.iter().next(),
            Some(&TraceEvent::FaultDetected {
                source: SourceId::Vdd
            })
        );
    }

    #[test]
    fn wraps_without_failing_and_counts_drops() {
        let mut trace = Trace::new();
        for _ in 0..CAPACITY + 5 {
            trace.record(TraceEvent::FaultCleared { mask: 0 });
        }
        assert_eq!(trace.len(), CAPACITY);
        assert_eq!(trace.dropped(), 5);
    }

    #[test]
    fn empty_trace_reports_empty() {
        let trace = Trace::new();
        assert!(trace.is_empty());
    }
}
