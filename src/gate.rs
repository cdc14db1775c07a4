//! Input gate
//!
//! One gate per session keeps a second selection from starting while a turn
//! is still being animated. Notifications fire only on real lock/unlock
//! edges.

use crate::events::{EventBus, GameEvent};
use std::cell::Cell;
use std::rc::Rc;
use tracing::debug;

#[derive(Debug)]
pub struct InputGate {
    locked: Cell<bool>,
    events: Rc<EventBus>,
}

impl InputGate {
    pub fn new(events: Rc<EventBus>) -> Rc<Self> {
        Rc::new(Self {
            locked: Cell::new(false),
            events,
        })
    }

    pub fn lock(&self) {
        if !self.locked.replace(true) {
            debug!("input locked");
            self.events.publish(GameEvent::InputLocked);
        }
    }

    pub fn unlock(&self) {
        if self.locked.replace(false) {
            debug!("input unlocked");
            self.events.publish(GameEvent::InputUnlocked);
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked.get()
    }

    /// Lock the gate for the lifetime of the returned guard
    ///
    /// Returns `None` if the gate is already held.
    pub fn try_acquire(self: &Rc<Self>) -> Option<GateGuard> {
        if self.is_locked() {
            return None;
        }
        self.lock();
        Some(GateGuard {
            gate: Rc::clone(self),
        })
    }
}

/// Unlocks its gate when dropped
#[derive(Debug)]
#[must_use = "the gate unlocks as soon as the guard is dropped"]
pub struct GateGuard {
    gate: Rc<InputGate>,
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        self.gate.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventKind, EventRecorder};

    fn gate() -> (Rc<InputGate>, EventRecorder) {
        let bus = Rc::new(EventBus::new());
        let recorder = EventRecorder::attach(&bus);
        (InputGate::new(bus), recorder)
    }

    #[test]
    fn test_lock_is_idempotent() {
        let (gate, recorder) = gate();
        gate.lock();
        gate.lock();
        assert!(gate.is_locked());
        assert_eq!(recorder.count(EventKind::InputLocked), 1);

        gate.unlock();
        gate.unlock();
        assert!(!gate.is_locked());
        assert_eq!(recorder.count(EventKind::InputUnlocked), 1);
    }

    #[test]
    fn test_unlock_without_lock_is_silent() {
        let (gate, recorder) = gate();
        gate.unlock();
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn test_each_cycle_notifies() {
        let (gate, recorder) = gate();
        for _ in 0..3 {
            gate.lock();
            gate.unlock();
        }
        assert_eq!(
            recorder.kinds(),
            [EventKind::InputLocked, EventKind::InputUnlocked].repeat(3)
        );
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let (gate, _) = gate();
        {
            let _guard = gate.try_acquire().expect("gate free");
            assert!(gate.is_locked());
            assert!(gate.try_acquire().is_none());
        }
        assert!(!gate.is_locked());
    }

    #[test]
    fn test_guard_releases_on_unwind() {
        let (gate, _) = gate();
        let held = Rc::clone(&gate);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = held.try_acquire().expect("gate free");
            panic!("renderer crashed");
        }));
        assert!(result.is_err());
        assert!(!gate.is_locked());
    }
}
