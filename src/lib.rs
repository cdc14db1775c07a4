//! TILEFALL - a tile-matching puzzle core
//!
//! Click a group of two or more same-colored tiles to clear it. Tiles above
//! fall into the gap and new ones drop in from the top. Reach the target
//! score before the moves run out.
//!
//! The crate holds the rules and the turn pipeline; drawing is left to a
//! [`Renderer`] implementation and UI updates to [`EventBus`] subscribers.

pub mod animation;
pub mod board;
pub mod bot;
pub mod error;
pub mod events;
pub mod game;
pub mod gate;
pub mod presenter;
pub mod score;
pub mod settings;
pub mod tile;

pub use animation::{AnimationController, BurnStep, DropStep, RefillStep, Renderer, TransitionPlan};
pub use board::{Board, BoardConfig, Position, Snapshot};
pub use bot::MovePicker;
pub use error::{GameError, RenderError, Result};
pub use events::{AnimationPhase, EventBus, EventKind, GameEvent, SubscriptionId};
pub use game::{Session, SessionPhase, SessionState};
pub use gate::{GateGuard, InputGate};
pub use presenter::{AnimationOutcome, IgnoreReason, Presenter, TurnOutcome};
pub use score::{ScoringConfig, ScoringKind, ScoringStrategy};
pub use settings::{AnimationConfig, GameConfig, UiConfig};
pub use tile::{ColorGenerator, RandomTileGenerator, ScriptedGenerator, Tile, TileFactory};
