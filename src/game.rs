//! Session state and turn logic

use crate::board::{Board, Position, Snapshot};
use crate::error::{GameError, Result};
use crate::events::{EventBus, GameEvent};
use crate::score::ScoringStrategy;
use crate::settings::GameConfig;
use crate::tile::TileFactory;
use serde::Serialize;
use std::rc::Rc;
use tracing::{debug, info};

/// Session lifecycle. `Over` is terminal until a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Active,
    Over { won: bool },
}

/// Score and progress as shown to the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub score: u64,
    pub moves_left: u32,
    pub is_game_over: bool,
    pub is_won: bool,
}

/// One game: owns the board and the running score
pub struct Session {
    board: Board,
    strategy: Box<dyn ScoringStrategy>,
    events: Rc<EventBus>,
    score: u64,
    moves_left: u32,
    phase: SessionPhase,
    /// Moves granted at start and on restart
    moves: u32,
    target_score: u64,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("score", &self.score)
            .field("moves_left", &self.moves_left)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Start a session over an already filled board
    pub fn new(
        board: Board,
        strategy: Box<dyn ScoringStrategy>,
        events: Rc<EventBus>,
        config: &GameConfig,
    ) -> Result<Self> {
        if !board.is_initialized() {
            return Err(GameError::NotInitialized(
                "board must be initialized before a session starts",
            ));
        }
        if config.ui.moves == 0 {
            return Err(GameError::invalid("a session needs at least one move"));
        }
        Ok(Self {
            board,
            strategy,
            events,
            score: 0,
            moves_left: config.ui.moves,
            phase: SessionPhase::Active,
            moves: config.ui.moves,
            target_score: config.scoring.target_score,
        })
    }

    /// Build board, tile factory and scoring policy from a config
    ///
    /// `seed` fixes the tile sequence; `None` draws one from entropy.
    pub fn from_config(config: &GameConfig, seed: Option<u64>, events: Rc<EventBus>) -> Result<Self> {
        config.validate()?;
        let factory = TileFactory::random(&config.board, seed)?;
        let mut board = Board::new(config.board.clone(), factory, Rc::clone(&events))?;
        board.initialize();
        Self::new(board, config.scoring.strategy(), events, config)
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn snapshot(&self) -> Snapshot {
        self.board.snapshot()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn state(&self) -> SessionState {
        SessionState {
            score: self.score,
            moves_left: self.moves_left,
            is_game_over: self.is_game_over(),
            is_won: self.is_won(),
        }
    }

    pub fn is_game_over(&self) -> bool {
        matches!(self.phase, SessionPhase::Over { .. })
    }

    pub fn is_won(&self) -> bool {
        matches!(self.phase, SessionPhase::Over { won: true })
    }

    /// Whether another turn may be played
    pub fn can_move(&self) -> bool {
        !self.is_game_over() && self.moves_left > 0
    }

    pub fn find_matching_group(&self, position: Position) -> Vec<Position> {
        self.board.find_matching_group(position)
    }

    /// Announce the opening state
    pub fn start(&self) {
        info!(moves = self.moves, target = self.target_score, "session started");
        self.events.publish(GameEvent::GameStarted);
        self.publish_state();
    }

    /// Play the group at `position`
    ///
    /// Returns false without touching anything when the game is over, no
    /// moves remain, or the group has fewer than two tiles.
    pub fn process_turn(&mut self, position: Position) -> bool {
        if !self.can_move() {
            return false;
        }

        let group = self.board.find_matching_group(position);
        if group.len() < 2 {
            return false;
        }

        let gained = self.strategy.total_score(group.len());
        self.score = self.score.saturating_add(gained);
        self.moves_left -= 1;
        debug!(
            at = %position,
            size = group.len(),
            gained,
            score = self.score,
            moves_left = self.moves_left,
            "turn played"
        );

        self.board.remove_tiles(&group);
        self.events.publish(GameEvent::TilesMatched {
            positions: group,
            score: gained,
        });
        self.check_game_conditions();
        self.publish_state();
        true
    }

    /// Reset score and moves and deal a fresh board; legal at any time
    pub fn restart(&mut self) {
        self.score = 0;
        self.moves_left = self.moves;
        self.phase = SessionPhase::Active;
        self.board.initialize();
        info!("session restarted");
        self.events.publish(GameEvent::GameRestarted);
        self.publish_state();
    }

    fn check_game_conditions(&mut self) {
        if self.is_game_over() {
            return;
        }
        if self.score >= self.target_score {
            self.finish(true);
        } else if self.moves_left == 0 || !self.board.has_valid_moves() {
            self.finish(false);
        }
    }

    fn finish(&mut self, won: bool) {
        self.phase = SessionPhase::Over { won };
        info!(won, score = self.score, moves_left = self.moves_left, "session over");
        self.events.publish(if won {
            GameEvent::GameWon
        } else {
            GameEvent::GameLost
        });
        self.events.publish(GameEvent::GameEnded { won });
    }

    fn publish_state(&self) {
        self.events.publish(GameEvent::ScoreUpdated { score: self.score });
        self.events.publish(GameEvent::MovesUpdated {
            moves_left: self.moves_left,
        });
        self.events.publish(GameEvent::UiUpdated {
            state: self.state(),
        });
    }
}
