//! Move pickers for unattended play

use crate::board::{Board, Position};
use crate::error::GameError;
use std::str::FromStr;

/// Which group an automatic player clicks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MovePicker {
    /// Largest group on the board
    #[default]
    Largest,
    /// Smallest group, saving big groups for later
    Smallest,
    /// First group in reading order
    First,
}

impl MovePicker {
    pub fn name(&self) -> &'static str {
        match self {
            MovePicker::Largest => "largest",
            MovePicker::Smallest => "smallest",
            MovePicker::First => "first",
        }
    }

    /// A cell inside the chosen group, or `None` when no move exists
    pub fn pick(&self, board: &Board) -> Option<Position> {
        let groups = board.groups();
        let group = match self {
            MovePicker::Largest => groups.iter().max_by_key(|g| g.len()),
            MovePicker::Smallest => groups.iter().min_by_key(|g| g.len()),
            MovePicker::First => groups.first(),
        }?;
        group.first().copied()
    }
}

impl FromStr for MovePicker {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "largest" => Ok(MovePicker::Largest),
            "smallest" => Ok(MovePicker::Smallest),
            "first" => Ok(MovePicker::First),
            other => Err(GameError::invalid(format!("unknown move picker: {other}"))),
        }
    }
}
