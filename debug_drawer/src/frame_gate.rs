use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

/// What a consumer tick should do.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TickDecision {
    /// The stream is not allocated yet.
    Unallocated,
    /// A transition window is open; nothing may be rotated or drained.
    Suppressed,
    /// This frame was already drained.
    AlreadyProcessed,
    /// Nothing was queued since the last drain.
    Idle,
    /// Rotate and drain. `resynchronized` is set when the frame counter went
    /// backwards and the gate's bookkeeping was reset to the new value.
    Rotate { resynchronized: bool },
}

impl TickDecision {
    pub fn rotates(self) -> bool {
        matches!(self, TickDecision::Rotate { .. })
    }
}

/// Frame bookkeeping shared by producers and the consumer.
///
/// The consumer publishes the host's frame number on every tick; producers
/// stamp each successful write by raising the last-queued frame to it. A
/// tick rotates only when a new frame has started and something was queued
/// since the previous drain.
///
/// The transition flag suppresses both writes and drains while the host is
/// reloading or switching modes.
pub struct FrameGate {
    current_frame: AtomicU64,
    last_queued_frame: AtomicU64,
    transitioning: AtomicBool,
    last_processed_frame: Mutex<Option<u64>>,
}

impl FrameGate {
    pub fn new() -> Self {
        Self {
            current_frame: AtomicU64::new(0),
            last_queued_frame: AtomicU64::new(0),
            transitioning: AtomicBool::new(false),
            last_processed_frame: Mutex::new(None),
        }
    }

    pub fn begin_transition(&self) {
        if !self.transitioning.swap(true, Ordering::AcqRel) {
            log::debug!("Debug stream transition started");
        }
    }

    pub fn end_transition(&self) {
        if self.transitioning.swap(false, Ordering::AcqRel) {
            log::debug!("Debug stream transition finished");
        }
    }

    pub fn is_transitioning(&self) -> bool {
        self.transitioning.load(Ordering::Acquire)
    }

    /// Frame number published by the most recent consumer tick.
    pub fn current_frame(&self) -> u64 {
        self.current_frame.load(Ordering::Acquire)
    }

    pub fn last_queued_frame(&self) -> u64 {
        self.last_queued_frame.load(Ordering::Acquire)
    }

    pub fn last_processed_frame(&self) -> Option<u64> {
        *self.last_processed_frame.lock()
    }

    /// Producer side: record that something was queued during the current
    /// frame. Never lowers the last-queued frame.
    pub fn note_queued(&self) {
        let frame = self.current_frame.load(Ordering::Acquire);
        self.last_queued_frame.fetch_max(frame, Ordering::AcqRel);
    }

    /// Consumer side: observe the host's frame number and decide whether
    /// this tick rotates.
    ///
    /// A frame number lower than the last one observed, queued or processed
    /// (the host restarted its counter) resets the bookkeeping to `frame`
    /// and rotates, so records queued before the reset are still delivered
    /// once.
    pub fn observe_frame_boundary(&self, frame: u64) -> TickDecision {
        if self.is_transitioning() {
            return TickDecision::Suppressed;
        }

        let mut last_processed = self.last_processed_frame.lock();
        let observed = self.current_frame.load(Ordering::Acquire);
        let last_queued = self.last_queued_frame.load(Ordering::Acquire);

        let regressed = observed > frame
            || last_queued > frame
            || last_processed.is_some_and(|p| p > frame);
        if regressed {
            log::info!(
                "Frame counter regressed to {} (observed {}, queued {}, processed {:?}); resyncing",
                frame,
                observed,
                last_queued,
                *last_processed
            );
            *last_processed = None;
            self.last_queued_frame.store(frame, Ordering::Release);
        }

        self.current_frame.store(frame, Ordering::Release);

        if regressed {
            return TickDecision::Rotate {
                resynchronized: true,
            };
        }
        match *last_processed {
            Some(processed) if processed == frame => TickDecision::AlreadyProcessed,
            Some(processed) if last_queued < processed => TickDecision::Idle,
            _ => TickDecision::Rotate {
                resynchronized: false,
            },
        }
    }

    /// Consumer side: the tick for `frame` has rotated and drained.
    pub fn mark_processed(&self, frame: u64) {
        *self.last_processed_frame.lock() = Some(frame);
    }
}

impl Default for FrameGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(gate: &FrameGate, frame: u64) -> TickDecision {
        let decision = gate.observe_frame_boundary(frame);
        if decision.rotates() {
            gate.mark_processed(frame);
        }
        decision
    }

    #[test]
    fn test_first_tick_rotates() {
        let gate = FrameGate::new();
        assert!(tick(&gate, 1).rotates());
        assert_eq!(gate.current_frame(), 1);
        assert_eq!(gate.last_processed_frame(), Some(1));
    }

    #[test]
    fn test_repeat_tick_in_same_frame() {
        let gate = FrameGate::new();
        tick(&gate, 3);
        gate.note_queued();
        assert_eq!(tick(&gate, 3), TickDecision::AlreadyProcessed);
    }

    #[test]
    fn test_idle_without_new_writes() {
        let gate = FrameGate::new();
        tick(&gate, 1);
        gate.note_queued(); // queued during frame 1
        assert!(tick(&gate, 2).rotates());
        // nothing queued during frame 2
        assert_eq!(tick(&gate, 3), TickDecision::Idle);
        gate.note_queued();
        assert!(tick(&gate, 4).rotates());
    }

    #[test]
    fn test_last_queued_is_monotonic() {
        let gate = FrameGate::new();
        tick(&gate, 10);
        gate.note_queued();
        assert_eq!(gate.last_queued_frame(), 10);
        gate.current_frame.store(4, Ordering::Release);
        gate.note_queued();
        assert_eq!(gate.last_queued_frame(), 10);
    }

    #[test]
    fn test_regression_resynchronizes() {
        let gate = FrameGate::new();
        tick(&gate, 41);
        tick(&gate, 42);
        gate.note_queued();
        assert_eq!(
            tick(&gate, 3),
            TickDecision::Rotate {
                resynchronized: true
            }
        );
        assert_eq!(gate.last_queued_frame(), 3);
        assert_eq!(gate.last_processed_frame(), Some(3));
        // normal operation continues from the new counter
        gate.note_queued();
        assert_eq!(
            tick(&gate, 4),
            TickDecision::Rotate {
                resynchronized: false
            }
        );
    }

    #[test]
    fn test_regression_below_observed_frame() {
        let gate = FrameGate::new();
        tick(&gate, 10);
        for frame in 11..=50 {
            assert_eq!(tick(&gate, frame), TickDecision::Idle);
        }
        // above the last processed frame but below the last observed one
        assert_eq!(
            tick(&gate, 20),
            TickDecision::Rotate {
                resynchronized: true
            }
        );
        assert_eq!(gate.current_frame(), 20);
        assert_eq!(gate.last_processed_frame(), Some(20));
    }

    #[test]
    fn test_regression_to_last_processed_frame() {
        let gate = FrameGate::new();
        tick(&gate, 10);
        for frame in 11..=50 {
            tick(&gate, frame);
        }
        // equal to the last processed frame, but the counter went backwards
        assert_eq!(
            tick(&gate, 10),
            TickDecision::Rotate {
                resynchronized: true
            }
        );
        gate.note_queued();
        assert_eq!(gate.last_queued_frame(), 10);
        assert_eq!(tick(&gate, 10), TickDecision::AlreadyProcessed);
    }

    #[test]
    fn test_transition_suppresses_ticks() {
        let gate = FrameGate::new();
        tick(&gate, 1);
        gate.begin_transition();
        assert!(gate.is_transitioning());
        assert_eq!(tick(&gate, 2), TickDecision::Suppressed);
        assert_eq!(gate.current_frame(), 1);
        gate.end_transition();
        assert!(!gate.is_transitioning());
        gate.note_queued();
        assert!(tick(&gate, 2).rotates());
    }
}
