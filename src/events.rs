//! In-process event channel
//!
//! Board, session and gate publish typed [`GameEvent`]s; presentation and UI
//! code subscribes per [`EventKind`]. Delivery is synchronous and follows
//! subscription order. A handler that fails or panics is logged and the
//! remaining handlers still run.

use crate::board::Position;
use crate::game::SessionState;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use tracing::{error, trace};

/// Animation stage named in board animation events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationPhase {
    Burn,
    Drop,
    Refill,
}

/// Everything the core announces
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    GameStarted,
    GameEnded { won: bool },
    GameWon,
    GameLost,
    GameRestarted,
    TileClicked { position: Position },
    /// `score` is the points gained by this match, not the running total
    TilesMatched { positions: Vec<Position>, score: u64 },
    BoardUpdated { removed_positions: Vec<Position> },
    BoardAnimationStarted { phase: AnimationPhase, positions: Vec<Position> },
    BoardAnimationCompleted { phase: AnimationPhase },
    ScoreUpdated { score: u64 },
    MovesUpdated { moves_left: u32 },
    UiUpdated { state: SessionState },
    InputLocked,
    InputUnlocked,
}

/// Payload-free discriminant of [`GameEvent`], used as the subscription key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    GameStarted,
    GameEnded,
    GameWon,
    GameLost,
    GameRestarted,
    TileClicked,
    TilesMatched,
    BoardUpdated,
    BoardAnimationStarted,
    BoardAnimationCompleted,
    ScoreUpdated,
    MovesUpdated,
    UiUpdated,
    InputLocked,
    InputUnlocked,
}

impl EventKind {
    pub const ALL: [EventKind; 15] = [
        EventKind::GameStarted,
        EventKind::GameEnded,
        EventKind::GameWon,
        EventKind::GameLost,
        EventKind::GameRestarted,
        EventKind::TileClicked,
        EventKind::TilesMatched,
        EventKind::BoardUpdated,
        EventKind::BoardAnimationStarted,
        EventKind::BoardAnimationCompleted,
        EventKind::ScoreUpdated,
        EventKind::MovesUpdated,
        EventKind::UiUpdated,
        EventKind::InputLocked,
        EventKind::InputUnlocked,
    ];

    /// Stable wire name, grouped by area
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::GameStarted => "game:started",
            EventKind::GameEnded => "game:ended",
            EventKind::GameWon => "game:won",
            EventKind::GameLost => "game:lost",
            EventKind::GameRestarted => "game:restarted",
            EventKind::TileClicked => "board:tile_clicked",
            EventKind::TilesMatched => "board:tiles_matched",
            EventKind::BoardUpdated => "board:updated",
            EventKind::BoardAnimationStarted => "board:animation_started",
            EventKind::BoardAnimationCompleted => "board:animation_completed",
            EventKind::ScoreUpdated => "ui:score_updated",
            EventKind::MovesUpdated => "ui:moves_updated",
            EventKind::UiUpdated => "ui:updated",
            EventKind::InputLocked => "input:locked",
            EventKind::InputUnlocked => "input:unlocked",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl GameEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            GameEvent::GameStarted => EventKind::GameStarted,
            GameEvent::GameEnded { .. } => EventKind::GameEnded,
            GameEvent::GameWon => EventKind::GameWon,
            GameEvent::GameLost => EventKind::GameLost,
            GameEvent::GameRestarted => EventKind::GameRestarted,
            GameEvent::TileClicked { .. } => EventKind::TileClicked,
            GameEvent::TilesMatched { .. } => EventKind::TilesMatched,
            GameEvent::BoardUpdated { .. } => EventKind::BoardUpdated,
            GameEvent::BoardAnimationStarted { .. } => EventKind::BoardAnimationStarted,
            GameEvent::BoardAnimationCompleted { .. } => EventKind::BoardAnimationCompleted,
            GameEvent::ScoreUpdated { .. } => EventKind::ScoreUpdated,
            GameEvent::MovesUpdated { .. } => EventKind::MovesUpdated,
            GameEvent::UiUpdated { .. } => EventKind::UiUpdated,
            GameEvent::InputLocked => EventKind::InputLocked,
            GameEvent::InputUnlocked => EventKind::InputUnlocked,
        }
    }

    /// One JSON object per event, for journals
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Handle returned by [`EventBus::subscribe`], needed to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Rc<dyn Fn(&GameEvent) -> anyhow::Result<()>>;

/// Synchronous publish/subscribe hub
#[derive(Default)]
pub struct EventBus {
    listeners: RefCell<HashMap<EventKind, Vec<(SubscriptionId, Handler)>>>,
    next_id: Cell<u64>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.borrow();
        let counts: HashMap<_, _> = listeners.iter().map(|(k, v)| (k.name(), v.len())).collect();
        f.debug_struct("EventBus").field("listeners", &counts).finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one kind of event
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&GameEvent) -> anyhow::Result<()> + 'static,
    {
        self.insert(kind, Rc::new(handler))
    }

    /// Register one handler for every kind of event
    pub fn subscribe_all<F>(&self, handler: F) -> Vec<(EventKind, SubscriptionId)>
    where
        F: Fn(&GameEvent) -> anyhow::Result<()> + 'static,
    {
        let handler: Handler = Rc::new(handler);
        EventKind::ALL
            .iter()
            .map(|&kind| (kind, self.insert(kind, Rc::clone(&handler))))
            .collect()
    }

    fn insert(&self, kind: EventKind, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners
            .borrow_mut()
            .entry(kind)
            .or_default()
            .push((id, handler));
        id
    }

    /// Remove a handler; returns false if it was not registered for `kind`
    pub fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let Some(handlers) = listeners.get_mut(&kind) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(sub, _)| *sub != id);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            listeners.remove(&kind);
        }
        removed
    }

    /// Deliver an event to every current subscriber of its kind
    pub fn publish(&self, event: GameEvent) {
        let kind = event.kind();
        // Snapshot the handler list so handlers may subscribe or publish
        let handlers: Vec<Handler> = match self.listeners.borrow().get(&kind) {
            Some(handlers) => handlers.iter().map(|(_, h)| Rc::clone(h)).collect(),
            None => return,
        };
        trace!(event = %kind, handlers = handlers.len(), "publish");

        for handler in handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => error!("Error in event listener for {}: {:#}", kind, err),
                Err(payload) => {
                    let message = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!("Event listener for {} panicked: {}", kind, message);
                }
            }
        }
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.listeners.borrow().get(&kind).map_or(0, Vec::len)
    }

    /// Drop every subscription
    pub fn clear(&self) {
        self.listeners.borrow_mut().clear();
    }
}

/// Collects published events for assertions
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub(crate) struct EventRecorder {
    events: Rc<RefCell<Vec<GameEvent>>>,
}

#[cfg(test)]
impl EventRecorder {
    /// Subscribe a recorder to every kind on `bus`
    pub fn attach(bus: &EventBus) -> Self {
        let recorder = Self::default();
        let sink = Rc::clone(&recorder.events);
        bus.subscribe_all(move |event| {
            sink.borrow_mut().push(event.clone());
            Ok(())
        });
        recorder
    }

    pub fn events(&self) -> Vec<GameEvent> {
        self.events.borrow().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.borrow().iter().map(GameEvent::kind).collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.borrow().iter().filter(|e| e.kind() == kind).count()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}
