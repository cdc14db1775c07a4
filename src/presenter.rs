//! Presenter: turns cell selections into committed turns and animations
//!
//! A selection is refused while a previous turn is still animating. An
//! accepted turn is committed to the session before anything is drawn, so a
//! failing or stalled renderer can delay input but never corrupt the game.

use crate::animation::{AnimationController, Renderer, TransitionPlan};
use crate::board::Position;
use crate::error::Result;
use crate::events::{AnimationPhase, EventBus, GameEvent};
use crate::game::{Session, SessionState};
use crate::gate::InputGate;
use crate::settings::{AnimationConfig, GameConfig};
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, warn};

/// Why a selection did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// A previous turn still holds the input gate
    Busy,
    /// Empty cell, out of range, or a lone tile
    NoMatch,
    /// The game is over or out of moves
    SessionClosed,
}

/// How the renderer handled a committed turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationOutcome {
    Completed,
    Failed,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Ignored(IgnoreReason),
    Played {
        group_size: usize,
        gained: u64,
        animation: AnimationOutcome,
    },
}

impl TurnOutcome {
    pub fn is_played(&self) -> bool {
        matches!(self, TurnOutcome::Played { .. })
    }
}

pub struct Presenter<R> {
    session: Session,
    animator: AnimationController<R>,
    events: Rc<EventBus>,
    gate: Rc<InputGate>,
    animation: AnimationConfig,
}

impl<R> std::fmt::Debug for Presenter<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Presenter")
            .field("session", &self.session)
            .field("gate_locked", &self.gate.is_locked())
            .finish_non_exhaustive()
    }
}

impl<R: Renderer> Presenter<R> {
    pub fn new(
        session: Session,
        renderer: Arc<R>,
        events: Rc<EventBus>,
        gate: Rc<InputGate>,
        animation: AnimationConfig,
    ) -> Self {
        Self {
            session,
            animator: AnimationController::new(renderer),
            events,
            gate,
            animation,
        }
    }

    /// Wire a session, gate and presenter around one event bus
    pub fn from_config(
        config: &GameConfig,
        seed: Option<u64>,
        renderer: Arc<R>,
        events: Rc<EventBus>,
    ) -> Result<Self> {
        let session = Session::from_config(config, seed, Rc::clone(&events))?;
        let gate = InputGate::new(Rc::clone(&events));
        Ok(Self::new(
            session,
            renderer,
            events,
            gate,
            config.animation.clone(),
        ))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn events(&self) -> &Rc<EventBus> {
        &self.events
    }

    pub fn gate(&self) -> &Rc<InputGate> {
        &self.gate
    }

    pub fn renderer(&self) -> &Arc<R> {
        self.animator.renderer()
    }

    /// Draw the current board and announce the opening state
    pub fn start(&self) {
        self.show_board();
        self.session.start();
    }

    /// Push the committed board to the renderer without animation
    pub fn show_board(&self) {
        self.animator.renderer().show_snapshot(&self.session.snapshot());
    }

    /// Handle a click on `position`
    pub async fn select_cell(&mut self, position: Position) -> TurnOutcome {
        self.events.publish(GameEvent::TileClicked { position });

        if self.gate.is_locked() {
            debug!(at = %position, "selection ignored while animating");
            return TurnOutcome::Ignored(IgnoreReason::Busy);
        }
        let group = self.session.find_matching_group(position);
        if group.len() < 2 {
            return TurnOutcome::Ignored(IgnoreReason::NoMatch);
        }
        if !self.session.can_move() {
            return TurnOutcome::Ignored(IgnoreReason::SessionClosed);
        }
        let Some(_guard) = self.gate.try_acquire() else {
            return TurnOutcome::Ignored(IgnoreReason::Busy);
        };

        let before = self.session.snapshot();
        let score_before = self.session.state().score;
        if !self.session.process_turn(position) {
            return TurnOutcome::Ignored(IgnoreReason::SessionClosed);
        }
        let gained = self.session.state().score - score_before;
        let after = self.session.snapshot();
        let plan = TransitionPlan::compute(&before, &group, &after, &self.animation);

        // Started and Completed always come as a pair around a committed turn
        self.events.publish(GameEvent::BoardAnimationStarted {
            phase: AnimationPhase::Burn,
            positions: group.clone(),
        });

        let timeout = self.animation.render_timeout();
        let animation = match tokio::time::timeout(timeout, self.animator.play(&plan)).await {
            Ok(Ok(())) => AnimationOutcome::Completed,
            Ok(Err(err)) => {
                warn!("Renderer failed, resyncing board: {}", err);
                self.show_board();
                AnimationOutcome::Failed
            }
            Err(_) => {
                warn!(?timeout, "Renderer timed out, releasing input");
                self.show_board();
                AnimationOutcome::TimedOut
            }
        };

        self.events.publish(GameEvent::BoardAnimationCompleted {
            phase: AnimationPhase::Refill,
        });

        TurnOutcome::Played {
            group_size: group.len(),
            gained,
            animation,
        }
    }

    /// Restart the game and redraw; refused while a turn is animating
    pub fn restart(&mut self) -> bool {
        if self.gate.is_locked() {
            return false;
        }
        self.session.restart();
        self.show_board();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::tests::RecordingRenderer;
    use crate::board::{Board, BoardConfig};
    use crate::events::{EventKind, EventRecorder};
    use crate::score::ScoringConfig;
    use crate::settings::UiConfig;
    use crate::tile::{ScriptedGenerator, TileFactory};
    use std::time::Duration;

    fn presenter_with(
        layout: &[Vec<u32>],
        refill: Vec<u32>,
        moves: u32,
        target: u64,
        renderer: RecordingRenderer,
        animation: AnimationConfig,
    ) -> (Presenter<RecordingRenderer>, EventRecorder) {
        let config = GameConfig {
            board: BoardConfig {
                rows: layout.len(),
                columns: layout[0].len(),
                cell_size: 10.0,
                color_count: 4,
            },
            scoring: ScoringConfig {
                target_score: target,
                ..ScoringConfig::default()
            },
            ui: UiConfig { moves },
            animation,
        };
        let bus = Rc::new(EventBus::new());
        let recorder = EventRecorder::attach(&bus);
        let factory = TileFactory::new(ScriptedGenerator::new(refill).unwrap());
        let board =
            Board::from_colors(config.board.clone(), layout, factory, Rc::clone(&bus)).unwrap();
        let session = Session::new(board, config.scoring.strategy(), Rc::clone(&bus), &config)
            .unwrap();
        let gate = InputGate::new(Rc::clone(&bus));
        let presenter = Presenter::new(session, Arc::new(renderer), bus, gate, config.animation);
        (presenter, recorder)
    }

    fn presenter(
        layout: &[Vec<u32>],
        refill: Vec<u32>,
        moves: u32,
        target: u64,
    ) -> (Presenter<RecordingRenderer>, EventRecorder) {
        presenter_with(
            layout,
            refill,
            moves,
            target,
            RecordingRenderer::default(),
            AnimationConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_busy_gate_ignores_selection() {
        let (mut presenter, recorder) =
            presenter(&[vec![0, 0], vec![1, 1]], vec![2], 5, 1000);
        presenter.gate().lock();
        recorder.clear();

        let outcome = presenter.select_cell(Position::new(0, 0)).await;
        assert_eq!(outcome, TurnOutcome::Ignored(IgnoreReason::Busy));
        assert_eq!(recorder.kinds(), vec![EventKind::TileClicked]);
        assert_eq!(presenter.state().moves_left, 5);
    }

    #[tokio::test]
    async fn test_lone_tile_is_ignored() {
        let (mut presenter, recorder) =
            presenter(&[vec![0, 1], vec![1, 0]], vec![2], 5, 1000);

        let outcome = presenter.select_cell(Position::new(0, 0)).await;
        assert_eq!(outcome, TurnOutcome::Ignored(IgnoreReason::NoMatch));
        let outcome = presenter.select_cell(Position::new(9, 9)).await;
        assert_eq!(outcome, TurnOutcome::Ignored(IgnoreReason::NoMatch));
        assert_eq!(recorder.count(EventKind::InputLocked), 0);
        assert!(presenter.renderer().entries().is_empty());
    }

    #[tokio::test]
    async fn test_finished_session_is_closed() {
        // One move, and the big group is worth enough to win
        let (mut presenter, _) = presenter(
            &[vec![0, 0, 0], vec![1, 1, 2]],
            vec![3, 2],
            1,
            10,
        );
        assert!(presenter.select_cell(Position::new(0, 0)).await.is_played());
        assert!(presenter.session().is_game_over());

        let outcome = presenter.select_cell(Position::new(1, 0)).await;
        assert_eq!(outcome, TurnOutcome::Ignored(IgnoreReason::SessionClosed));
    }

    #[tokio::test]
    async fn test_turn_event_order() {
        let (mut presenter, recorder) = presenter(
            &[vec![0, 0, 1], vec![1, 2, 3], vec![2, 3, 1]],
            vec![3],
            5,
            1000,
        );

        let outcome = presenter.select_cell(Position::new(0, 1)).await;
        assert_eq!(
            outcome,
            TurnOutcome::Played {
                group_size: 2,
                gained: 10,
                animation: AnimationOutcome::Completed,
            }
        );
        assert_eq!(
            recorder.kinds(),
            vec![
                EventKind::TileClicked,
                EventKind::InputLocked,
                EventKind::BoardUpdated,
                EventKind::TilesMatched,
                EventKind::ScoreUpdated,
                EventKind::MovesUpdated,
                EventKind::UiUpdated,
                EventKind::BoardAnimationStarted,
                EventKind::BoardAnimationCompleted,
                EventKind::InputUnlocked,
            ]
        );
        assert!(!presenter.gate().is_locked());

        let entries = presenter.renderer().entries();
        assert_eq!(entries.iter().filter(|e| e.starts_with("burn end")).count(), 2);
        assert_eq!(entries.iter().filter(|e| e.starts_with("refill end")).count(), 2);
    }

    #[tokio::test]
    async fn test_renderer_failure_releases_gate() {
        let (mut presenter, recorder) = presenter_with(
            &[vec![1, 0], vec![0, 1], vec![0, 1]],
            vec![2],
            5,
            1000,
            RecordingRenderer {
                fail_drops: true,
                ..Default::default()
            },
            AnimationConfig::default(),
        );

        // The 1 on top of column 0 has to fall two rows
        let outcome = presenter.select_cell(Position::new(1, 0)).await;
        assert!(matches!(
            outcome,
            TurnOutcome::Played {
                animation: AnimationOutcome::Failed,
                ..
            }
        ));
        assert!(!presenter.gate().is_locked());
        assert_eq!(recorder.count(EventKind::InputUnlocked), 1);
        assert_eq!(presenter.state().moves_left, 4);

        // Resynced to the committed board
        let snapshots = presenter.renderer().snapshots.lock().unwrap().clone();
        assert_eq!(snapshots.last(), Some(&presenter.session().snapshot()));
    }

    #[tokio::test]
    async fn test_stalled_renderer_times_out() {
        let (mut presenter, _) = presenter_with(
            &[vec![0, 0], vec![1, 2]],
            vec![3],
            5,
            1000,
            RecordingRenderer {
                stall: Some(Duration::from_secs(30)),
                ..Default::default()
            },
            AnimationConfig {
                render_timeout: 0.05,
                ..AnimationConfig::default()
            },
        );

        let outcome = presenter.select_cell(Position::new(0, 0)).await;
        assert!(matches!(
            outcome,
            TurnOutcome::Played {
                animation: AnimationOutcome::TimedOut,
                ..
            }
        ));
        assert!(!presenter.gate().is_locked());
        assert_eq!(
            presenter.select_cell(Position::new(1, 0)).await,
            TurnOutcome::Ignored(IgnoreReason::NoMatch)
        );
    }

    #[tokio::test]
    async fn test_restart_refused_while_animating() {
        let (mut presenter, recorder) =
            presenter(&[vec![0, 0], vec![1, 1]], vec![2, 3], 5, 1000);
        presenter.gate().lock();
        assert!(!presenter.restart());
        assert_eq!(recorder.count(EventKind::GameRestarted), 0);

        presenter.gate().unlock();
        assert!(presenter.restart());
        assert_eq!(recorder.count(EventKind::GameRestarted), 1);
        assert_eq!(presenter.renderer().snapshots.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_single_color_board_plays_to_a_win() {
        let layout = vec![vec![0; 4]; 4];
        let (mut presenter, recorder) = presenter(&layout, vec![0], 3, 100);
        presenter.start();

        let outcome = presenter.select_cell(Position::new(2, 2)).await;
        // Default scoring for 16 tiles: 10 * 15 + 10 * 7 * 2
        assert_eq!(
            outcome,
            TurnOutcome::Played {
                group_size: 16,
                gained: 290,
                animation: AnimationOutcome::Completed,
            }
        );
        assert!(presenter.session().is_won());
        assert_eq!(recorder.count(EventKind::GameWon), 1);
        assert_eq!(recorder.count(EventKind::GameEnded), 1);
        assert!(presenter.session().snapshot().is_full());
        assert!(!presenter.gate().is_locked());
        assert_eq!(
            presenter.select_cell(Position::new(0, 0)).await,
            TurnOutcome::Ignored(IgnoreReason::SessionClosed)
        );
    }
}
