//! Handoff between the wake timer interrupt and the main loop.

use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, signal::Signal};

/// Single-slot wake flag set from interrupt context.
///
/// Notifying an already pending signal overwrites it, so timeouts that
/// arrive while the main loop is busy flickering coalesce into one.
pub struct WakeSignal {
    signal: Signal<CriticalSectionRawMutex, ()>,
}

impl WakeSignal {
    pub const fn new() -> Self {
        Self {
            signal: Signal::new(),
        }
    }

    /// Marks a wake as pending. Safe to call from an interrupt handler.
    pub fn notify(&self) {
        self.signal.signal(());
    }

    /// Consumes a pending wake, returning whether there was one.
    pub fn take(&self) -> bool {
        self.signal.try_take().is_some()
    }

    /// Checks for a pending wake without consuming it.
    pub fn is_pending(&self) -> bool {
        self.signal.signaled()
    }
}

impl Default for WakeSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Processor low-power state.
pub trait LowPower {
    /// Blocks until `wake` is pending.
    ///
    /// Returns immediately if a wake is already pending. Does not consume it.
    fn sleep(&mut self, wake: &WakeSignal);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        let wake = WakeSignal::new();
        assert!(!wake.is_pending());
        assert!(!wake.take());
    }

    #[test]
    fn take_consumes_exactly_once() {
        let wake = WakeSignal::new();
        wake.notify();
        assert!(wake.is_pending());
        assert!(wake.take());
        assert!(!wake.is_pending());
        assert!(!wake.take());
    }

    #[test]
    fn repeated_notifications_coalesce() {
        let wake = WakeSignal::new();
        for _ in 0..5 {
            wake.notify();
        }
        assert!(wake.take());
        assert!(!wake.take());
    }

    #[test]
    fn is_pending_does_not_consume() {
        let wake = WakeSignal::new();
        wake.notify();
        assert!(wake.is_pending());
        assert!(wake.is_pending());
        assert!(wake.take());
    }
}
