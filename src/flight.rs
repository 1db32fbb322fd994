//! Single-flight bookkeeping for cooperative async controllers.
//!
//! Every controller owns its own [`InFlight`] token per operation instead of sharing ad hoc
//! busy flags. A caller that cannot acquire the token drops its request; the token is released
//! when the [`FlightGuard`] goes out of scope, including on the error path.
//!
//! [`Generation`] complements it for operations that may be superseded while a request is
//! outstanding (a reset, a newer search, a graph rebuild): the completion compares the
//! generation it started with against the current one and discards itself on mismatch.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct InFlight {
    busy: AtomicBool,
    label: &'static str,
}

impl InFlight {
    pub const fn new(label: &'static str) -> Self {
        InFlight {
            busy: AtomicBool::new(false),
            label,
        }
    }

    /// Acquire the token, or `None` when an operation is already outstanding.
    pub fn try_begin(&self) -> Option<FlightGuard<'_>> {
        match self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Some(FlightGuard { flight: self }),
            Err(_) => {
                tracing::debug!("Dropping {} request, one is already in flight", self.label);
                None
            }
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct FlightGuard<'a> {
    flight: &'a InFlight,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flight.busy.store(false, Ordering::Release);
    }
}

/// Monotonic request generation.
#[derive(Debug, Default)]
pub struct Generation(AtomicU64);

impl Generation {
    /// Start a new generation, invalidating every completion that belongs to an older one.
    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.current() == generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_single_flight() {
        let flight = InFlight::new("test");
        let guard = flight.try_begin();
        assert!(guard.is_some());
        assert!(flight.is_busy());
        assert!(flight.try_begin().is_none());
        drop(guard);
        assert!(!flight.is_busy());
        assert!(flight.try_begin().is_some());
    }

    #[test]
    fn test_generation_supersedes() {
        let generation = Generation::default();
        let first = generation.advance();
        assert!(generation.is_current(first));
        let second = generation.advance();
        assert!(!generation.is_current(first));
        assert!(generation.is_current(second));
    }
}
