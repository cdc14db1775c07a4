//! Turn transitions for the renderer
//!
//! A committed turn is replayed in three phases: matched tiles burn, the
//! survivors drop to their compacted rows, then new tiles fall in from above
//! the grid. Every tile in a phase animates at once and the next phase only
//! starts after all of them finish.

use crate::board::{Position, Snapshot};
use crate::error::RenderError;
use crate::events::AnimationPhase;
use crate::settings::AnimationConfig;
use crate::tile::Tile;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{trace, warn};

/// A matched tile fading out in place
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurnStep {
    pub tile: Tile,
    pub position: Position,
}

/// A surviving tile sliding down its column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropStep {
    pub tile: Tile,
    pub from: Position,
    pub to: Position,
}

/// A new tile entering from above the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefillStep {
    pub tile: Tile,
    /// Start cell, stacked above row 0 (negative rows)
    pub from: Position,
    pub to: Position,
    /// Stagger before the fall starts, grows with the target row
    pub delay: Duration,
}

/// Renderer-space coordinates of a cell's origin; y grows upward
pub fn world_position(position: Position, cell_size: f32) -> (f32, f32) {
    (
        position.column as f32 * cell_size,
        -(position.row as f32) * cell_size,
    )
}

/// Everything that moves during one turn
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionPlan {
    pub burns: Vec<BurnStep>,
    pub drops: Vec<DropStep>,
    pub refills: Vec<RefillStep>,
}

impl TransitionPlan {
    /// Work out the transition from `before` to `after`
    ///
    /// Replays the board's own compaction over `before` with `removed`
    /// cleared, so drop targets line up with the committed grid; cells still
    /// empty after the drop are filled from `after`.
    pub fn compute(
        before: &Snapshot,
        removed: &[Position],
        after: &Snapshot,
        animation: &AnimationConfig,
    ) -> Self {
        let mut plan = Self::default();
        let mut working = before.clone();

        for &position in removed {
            if let Some(tile) = working.get(position) {
                plan.burns.push(BurnStep { tile, position });
                working.clear(position);
            }
        }

        let rows = working.rows();
        // Per column: surviving tiles bottom-up, then the rows they land on
        for c in 0..working.columns() as i32 {
            let mut write = rows as i32;
            let mut landed = Vec::new();
            for read in (0..rows as i32).rev() {
                let from = Position::new(read, c);
                if let Some(tile) = working.get(from) {
                    write -= 1;
                    let to = Position::new(write, c);
                    if to != from {
                        plan.drops.push(DropStep { tile, from, to });
                    }
                    landed.push(to);
                }
            }

            for row in (0..write).rev() {
                let to = Position::new(row, c);
                let Some(tile) = after.get(to) else {
                    continue;
                };
                plan.refills.push(RefillStep {
                    tile,
                    from: Position::new(-1 - (rows as i32 - 1 - row), c),
                    to,
                    delay: animation.refill_delay_for(row),
                });
            }

            let mismatched = plan
                .drops
                .iter()
                .filter(|d| d.to.column == c && after.get(d.to) != Some(d.tile))
                .count();
            if mismatched > 0 || landed.iter().any(|&p| after.get(p).is_none()) {
                warn!(column = c, mismatched, "transition does not match committed board");
            }
        }

        plan
    }

    pub fn is_empty(&self) -> bool {
        self.burns.is_empty() && self.drops.is_empty() && self.refills.is_empty()
    }
}

/// Presentation layer driven by the core
///
/// Per-tile calls return futures that resolve when that tile's animation
/// ends. Implementations are shared with one task per tile, so they must be
/// thread-safe and return `Send` futures.
pub trait Renderer: Send + Sync + 'static {
    /// Redraw the whole board without animation (start, restart, resync)
    fn show_snapshot(&self, snapshot: &Snapshot);

    fn burn_tile(&self, step: BurnStep) -> impl Future<Output = Result<(), RenderError>> + Send;

    fn drop_tile(&self, step: DropStep) -> impl Future<Output = Result<(), RenderError>> + Send;

    fn refill_tile(&self, step: RefillStep)
    -> impl Future<Output = Result<(), RenderError>> + Send;
}

/// Plays transition plans phase by phase
#[derive(Debug)]
pub struct AnimationController<R> {
    renderer: Arc<R>,
}

impl<R> Clone for AnimationController<R> {
    fn clone(&self) -> Self {
        Self {
            renderer: Arc::clone(&self.renderer),
        }
    }
}

impl<R: Renderer> AnimationController<R> {
    pub fn new(renderer: Arc<R>) -> Self {
        Self { renderer }
    }

    pub fn renderer(&self) -> &Arc<R> {
        &self.renderer
    }

    /// Burn, drop, then refill; stops at the first phase that fails
    pub async fn play(&self, plan: &TransitionPlan) -> Result<(), RenderError> {
        self.play_burn(&plan.burns).await?;
        self.play_drop(&plan.drops).await?;
        self.play_refill(&plan.refills).await
    }

    pub async fn play_burn(&self, steps: &[BurnStep]) -> Result<(), RenderError> {
        let mut set = JoinSet::new();
        for &step in steps {
            let renderer = Arc::clone(&self.renderer);
            set.spawn(async move { renderer.burn_tile(step).await });
        }
        join_phase(AnimationPhase::Burn, set).await
    }

    pub async fn play_drop(&self, steps: &[DropStep]) -> Result<(), RenderError> {
        let mut set = JoinSet::new();
        for &step in steps {
            let renderer = Arc::clone(&self.renderer);
            set.spawn(async move { renderer.drop_tile(step).await });
        }
        join_phase(AnimationPhase::Drop, set).await
    }

    pub async fn play_refill(&self, steps: &[RefillStep]) -> Result<(), RenderError> {
        let mut set = JoinSet::new();
        for &step in steps {
            let renderer = Arc::clone(&self.renderer);
            set.spawn(async move { renderer.refill_tile(step).await });
        }
        join_phase(AnimationPhase::Refill, set).await
    }
}

/// Wait for every tile in a phase; report the first failure after all end
async fn join_phase(
    phase: AnimationPhase,
    mut set: JoinSet<Result<(), RenderError>>,
) -> Result<(), RenderError> {
    let tiles = set.len();
    let mut first_error = None;
    while let Some(joined) = set.join_next().await {
        let outcome = joined
            .map_err(|e| RenderError::Task(e.to_string()))
            .and_then(|result| result);
        if let Err(err) = outcome {
            first_error.get_or_insert(err);
        }
    }
    trace!(?phase, tiles, failed = first_error.is_some(), "phase joined");
    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::board::{Board, BoardConfig};
    use crate::events::EventBus;
    use crate::tile::{ScriptedGenerator, TileFactory};
    use std::rc::Rc;
    use std::sync::Mutex;

    /// Logs every call and optionally fails or stalls
    #[derive(Debug, Default)]
    pub(crate) struct RecordingRenderer {
        pub log: Mutex<Vec<String>>,
        pub snapshots: Mutex<Vec<Snapshot>>,
        pub fail_drops: bool,
        pub stall: Option<Duration>,
    }

    impl RecordingRenderer {
        pub fn entries(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }

        fn push(&self, entry: String) {
            self.log.lock().unwrap().push(entry);
        }
    }

    impl Renderer for RecordingRenderer {
        fn show_snapshot(&self, snapshot: &Snapshot) {
            self.snapshots.lock().unwrap().push(snapshot.clone());
        }

        async fn burn_tile(&self, step: BurnStep) -> Result<(), RenderError> {
            self.push(format!("burn start {}", step.tile.id));
            let wait = self.stall.unwrap_or(Duration::from_millis(2 + step.tile.id % 3));
            tokio::time::sleep(wait).await;
            self.push(format!("burn end {}", step.tile.id));
            Ok(())
        }

        async fn drop_tile(&self, step: DropStep) -> Result<(), RenderError> {
            self.push(format!("drop start {}", step.tile.id));
            tokio::time::sleep(Duration::from_millis(1 + step.tile.id % 2)).await;
            self.push(format!("drop end {}", step.tile.id));
            if self.fail_drops {
                return Err(RenderError::Failed(format!("tile {} lost", step.tile.id)));
            }
            Ok(())
        }

        async fn refill_tile(&self, step: RefillStep) -> Result<(), RenderError> {
            self.push(format!("refill start {}", step.tile.id));
            tokio::time::sleep(Duration::from_millis(1)).await;
            self.push(format!("refill end {}", step.tile.id));
            Ok(())
        }
    }

    fn board(layout: &[Vec<u32>], refill: Vec<u32>) -> Board {
        let config = BoardConfig {
            rows: layout.len(),
            columns: layout[0].len(),
            cell_size: 10.0,
            color_count: 4,
        };
        let factory = TileFactory::new(ScriptedGenerator::new(refill).unwrap());
        Board::from_colors(config, layout, factory, Rc::new(EventBus::new())).unwrap()
    }

    fn plan_for(board: &mut Board, start: Position) -> (Snapshot, Snapshot, TransitionPlan) {
        let before = board.snapshot();
        let group = board.find_matching_group(start);
        board.remove_tiles(&group);
        let after = board.snapshot();
        let plan = TransitionPlan::compute(&before, &group, &after, &AnimationConfig::default());
        (before, after, plan)
    }

    fn phase_of(entry: &str) -> &str {
        entry.split_whitespace().next().unwrap_or_default()
    }

    #[test]
    fn test_plan_matches_committed_board() {
        let mut board = board(
            &[
                vec![1, 2, 3],
                vec![0, 0, 3],
                vec![0, 1, 2],
            ],
            vec![3],
        );
        let (before, after, plan) = plan_for(&mut board, Position::new(1, 0));

        assert_eq!(plan.burns.len(), 3);
        for burn in &plan.burns {
            assert_eq!(before.get(burn.position), Some(burn.tile));
        }

        // Column 0: the 1 falls two rows; column 1: the 2 falls one row
        assert_eq!(plan.drops.len(), 2);
        for step in &plan.drops {
            assert_eq!(before.get(step.from), Some(step.tile));
            assert_eq!(after.get(step.to), Some(step.tile));
            assert_eq!(step.from.column, step.to.column);
            assert!(step.to.row > step.from.row);
        }

        assert_eq!(plan.refills.len(), 3);
        for step in &plan.refills {
            assert_eq!(after.get(step.to), Some(step.tile));
            assert!(step.from.row < 0);
        }
    }

    #[test]
    fn test_refill_spawns_above_grid_with_stagger() {
        let mut board = board(&[vec![0], vec![0], vec![1]], vec![2]);
        let (_, _, plan) = plan_for(&mut board, Position::new(0, 0));

        let spawns: Vec<_> = plan.refills.iter().map(|s| (s.to.row, s.from.row)).collect();
        // Bottom-most empty cell first; each starts as far above as it lands below the top
        assert_eq!(spawns, vec![(1, -2), (0, -3)]);
        assert_eq!(plan.refills[0].delay, AnimationConfig::default().refill_delay_for(1));
        assert_eq!(plan.refills[1].delay, Duration::ZERO);
        assert!(plan.drops.is_empty());
    }

    #[test]
    fn test_empty_removal_plans_nothing() {
        let board = board(&[vec![0, 1]], vec![0]);
        let snapshot = board.snapshot();
        let plan = TransitionPlan::compute(&snapshot, &[], &snapshot, &AnimationConfig::default());
        assert!(plan.is_empty());
    }

    #[test]
    fn test_world_position() {
        assert_eq!(world_position(Position::new(2, 3), 10.0), (30.0, -20.0));
        assert_eq!(world_position(Position::new(-1, 0), 72.0), (0.0, 72.0));
    }

    #[tokio::test]
    async fn test_phases_are_barriers() {
        let mut board = board(
            &[
                vec![1, 2, 3],
                vec![0, 0, 3],
                vec![0, 1, 2],
            ],
            vec![3],
        );
        let (_, _, plan) = plan_for(&mut board, Position::new(1, 0));
        let renderer = Arc::new(RecordingRenderer::default());
        let controller = AnimationController::new(Arc::clone(&renderer));

        controller.play(&plan).await.unwrap();

        let entries = renderer.entries();
        assert_eq!(entries.len(), 2 * (3 + 2 + 3));
        let phases: Vec<_> = entries.iter().map(|e| phase_of(e)).collect();
        let last_burn = phases.iter().rposition(|p| *p == "burn").unwrap();
        let first_drop = phases.iter().position(|p| *p == "drop").unwrap();
        let last_drop = phases.iter().rposition(|p| *p == "drop").unwrap();
        let first_refill = phases.iter().position(|p| *p == "refill").unwrap();
        assert!(last_burn < first_drop);
        assert!(last_drop < first_refill);
    }

    #[tokio::test]
    async fn test_failed_phase_stops_pipeline_after_join() {
        let mut board = board(
            &[
                vec![1, 2, 3],
                vec![0, 0, 3],
                vec![0, 1, 2],
            ],
            vec![3],
        );
        let (_, _, plan) = plan_for(&mut board, Position::new(1, 0));
        let renderer = Arc::new(RecordingRenderer {
            fail_drops: true,
            ..Default::default()
        });
        let controller = AnimationController::new(Arc::clone(&renderer));

        let result = controller.play(&plan).await;
        assert!(matches!(result, Err(RenderError::Failed(_))));

        let entries = renderer.entries();
        // Every drop still ran to the end, no refill started
        assert_eq!(entries.iter().filter(|e| e.starts_with("drop end")).count(), 2);
        assert!(entries.iter().all(|e| phase_of(e) != "refill"));
    }
}
