//! Game board representation, matching and gravity
//!
//! Row 0 is the top row, rows grow downward. Tiles fall toward higher row
//! indices and new tiles enter from row 0.

use crate::error::{GameError, Result};
use crate::events::{EventBus, GameEvent};
use crate::tile::{Tile, TileFactory};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;
use tracing::{debug, trace};

/// A cell coordinate. Signed so out-of-range queries stay representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub row: i32,
    pub column: i32,
}

impl Position {
    pub const fn new(row: i32, column: i32) -> Self {
        Self { row, column }
    }

    /// Orthogonal neighbours (up, down, left, right), unchecked
    fn neighbors(self) -> [Position; 4] {
        [
            Position::new(self.row - 1, self.column),
            Position::new(self.row + 1, self.column),
            Position::new(self.row, self.column - 1),
            Position::new(self.row, self.column + 1),
        ]
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.column)
    }
}

/// Board dimensions and palette, fixed for a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub rows: usize,
    pub columns: usize,
    /// Cell edge in renderer units
    pub cell_size: f32,
    pub color_count: u32,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            rows: 8,
            columns: 8,
            cell_size: 72.0,
            color_count: 5,
        }
    }
}

impl BoardConfig {
    pub fn validate(&self) -> Result<()> {
        if self.rows == 0 || self.columns == 0 {
            return Err(GameError::invalid(format!(
                "board must have at least one row and column, got {}x{}",
                self.rows, self.columns
            )));
        }
        if self.color_count == 0 {
            return Err(GameError::invalid("color count must be greater than 0"));
        }
        if !(self.cell_size > 0.0) {
            return Err(GameError::invalid("cell size must be positive"));
        }
        Ok(())
    }

    pub fn contains(&self, position: Position) -> bool {
        position.row >= 0
            && position.column >= 0
            && (position.row as usize) < self.rows
            && (position.column as usize) < self.columns
    }

    pub fn cell_count(&self) -> usize {
        self.rows * self.columns
    }
}

/// Independent copy of the grid at one point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    rows: usize,
    columns: usize,
    /// Stored as [row][column]
    cells: Vec<Vec<Option<Tile>>>,
}

impl Snapshot {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Tile at a position, `None` when empty or out of range
    pub fn get(&self, position: Position) -> Option<Tile> {
        if position.row < 0 || position.column < 0 {
            return None;
        }
        self.cells
            .get(position.row as usize)?
            .get(position.column as usize)
            .copied()
            .flatten()
    }

    /// Clear a cell; out-of-range positions are ignored
    pub fn clear(&mut self, position: Position) {
        if position.row < 0 || position.column < 0 {
            return;
        }
        if let Some(cell) = self
            .cells
            .get_mut(position.row as usize)
            .and_then(|row| row.get_mut(position.column as usize))
        {
            *cell = None;
        }
    }

    /// Every occupied cell with its tile, row-major
    pub fn tiles(&self) -> impl Iterator<Item = (Position, Tile)> + '_ {
        self.cells.iter().enumerate().flat_map(|(r, row)| {
            row.iter().enumerate().filter_map(move |(c, cell)| {
                cell.map(|tile| (Position::new(r as i32, c as i32), tile))
            })
        })
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|row| row.iter().all(Option::is_some))
    }

    /// True when no column has an empty cell below an occupied one
    pub fn satisfies_gravity(&self) -> bool {
        (0..self.columns).all(|c| {
            let mut seen_tile = false;
            for row in &self.cells {
                match row[c] {
                    Some(_) => seen_tile = true,
                    None if seen_tile => return false,
                    None => {}
                }
            }
            true
        })
    }
}

impl fmt::Display for Snapshot {
    /// One line per row, colors as letters, `.` for empty cells
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (r, row) in self.cells.iter().enumerate() {
            if r > 0 {
                writeln!(f)?;
            }
            for cell in row {
                let ch = match cell {
                    Some(tile) => char::from_digit(10 + tile.color_index % 26, 36)
                        .map(|c| c.to_ascii_uppercase())
                        .unwrap_or('?'),
                    None => '.',
                };
                write!(f, "{}", ch)?;
            }
        }
        Ok(())
    }
}

/// The game board
#[derive(Debug)]
pub struct Board {
    config: BoardConfig,
    /// Grid stored as [row][column], row 0 is top
    cells: Vec<Vec<Option<Tile>>>,
    factory: TileFactory,
    events: Rc<EventBus>,
    initialized: bool,
}

impl Board {
    /// Create an empty, uninitialized board
    pub fn new(config: BoardConfig, factory: TileFactory, events: Rc<EventBus>) -> Result<Self> {
        config.validate()?;
        let cells = vec![vec![None; config.columns]; config.rows];
        Ok(Self {
            config,
            cells,
            factory,
            events,
            initialized: false,
        })
    }

    /// Create an initialized board with an exact color layout
    ///
    /// `layout[row][column]` is the color index of each cell. Ids still come
    /// from `factory` so later refills never repeat one.
    pub fn from_colors(
        config: BoardConfig,
        layout: &[Vec<u32>],
        factory: TileFactory,
        events: Rc<EventBus>,
    ) -> Result<Self> {
        let mut board = Self::new(config, factory, events)?;
        if layout.len() != board.config.rows
            || layout.iter().any(|row| row.len() != board.config.columns)
        {
            return Err(GameError::invalid(format!(
                "layout does not match a {}x{} board",
                board.config.rows, board.config.columns
            )));
        }
        for (r, row) in layout.iter().enumerate() {
            for (c, &color_index) in row.iter().enumerate() {
                if color_index >= board.config.color_count {
                    return Err(GameError::invalid(format!(
                        "color {} out of range at ({}, {})",
                        color_index, r, c
                    )));
                }
                let id = board.factory.next().id;
                board.cells[r][c] = Some(Tile { id, color_index });
            }
        }
        board.initialized = true;
        Ok(board)
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn rows(&self) -> usize {
        self.config.rows
    }

    pub fn columns(&self) -> usize {
        self.config.columns
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Fill every cell with a fresh tile, row by row
    pub fn initialize(&mut self) {
        for row in self.cells.iter_mut() {
            for cell in row.iter_mut() {
                *cell = Some(self.factory.next());
            }
        }
        self.initialized = true;
        debug!(
            rows = self.config.rows,
            columns = self.config.columns,
            "board filled"
        );
    }

    /// Get the tile at a position; `None` when empty or out of bounds
    pub fn tile_at(&self, position: Position) -> Option<Tile> {
        if !self.config.contains(position) {
            return None;
        }
        self.cells[position.row as usize][position.column as usize]
    }

    fn index(&self, position: Position) -> usize {
        position.row as usize * self.config.columns + position.column as usize
    }

    /// Flood fill from `start` over same-colored orthogonal neighbours
    ///
    /// Marks every member in `visited` and never enters a marked cell, so a
    /// shared `visited` lets callers sweep the whole grid once.
    fn flood(&self, start: Position, visited: &mut [bool]) -> Vec<Position> {
        let Some(start_tile) = self.tile_at(start) else {
            return Vec::new();
        };
        let color = start_tile.color_index;

        let mut group = Vec::new();
        let mut stack = vec![start];
        visited[self.index(start)] = true;

        while let Some(position) = stack.pop() {
            group.push(position);
            for next in position.neighbors() {
                if !self.config.contains(next) || visited[self.index(next)] {
                    continue;
                }
                if self.tile_at(next).is_some_and(|t| t.color_index == color) {
                    visited[self.index(next)] = true;
                    stack.push(next);
                }
            }
        }
        group
    }

    /// All positions connected to `start` with its color, `start` included
    ///
    /// Returns an empty list for an empty or out-of-range start. Size is not
    /// checked; callers treat fewer than two positions as no match.
    pub fn find_matching_group(&self, start: Position) -> Vec<Position> {
        if self.tile_at(start).is_none() {
            return Vec::new();
        }
        let mut visited = vec![false; self.config.cell_count()];
        let group = self.flood(start, &mut visited);
        trace!(start = %start, size = group.len(), "flood fill");
        group
    }

    /// Every group of two or more tiles, each reported once
    pub fn groups(&self) -> Vec<Vec<Position>> {
        let mut visited = vec![false; self.config.cell_count()];
        let mut groups = Vec::new();
        for position in self.positions() {
            if visited[self.index(position)] || self.tile_at(position).is_none() {
                continue;
            }
            let group = self.flood(position, &mut visited);
            if group.len() >= 2 {
                groups.push(group);
            }
        }
        groups
    }

    /// Whether any group of two or more same-colored tiles exists
    pub fn has_valid_moves(&self) -> bool {
        let mut visited = vec![false; self.config.cell_count()];
        for position in self.positions() {
            if visited[self.index(position)] || self.tile_at(position).is_none() {
                continue;
            }
            if self.flood(position, &mut visited).len() >= 2 {
                return true;
            }
        }
        false
    }

    fn positions(&self) -> impl Iterator<Item = Position> {
        let columns = self.config.columns;
        (0..self.config.rows).flat_map(move |r| {
            (0..columns).map(move |c| Position::new(r as i32, c as i32))
        })
    }

    /// Remove tiles, let columns fall and refill from the top
    ///
    /// No group-size check is made. Out-of-range positions are skipped.
    /// Query [`Board::snapshot`] afterwards for the committed grid.
    pub fn remove_tiles(&mut self, positions: &[Position]) {
        if positions.is_empty() {
            return;
        }

        let mut cleared = 0;
        for &position in positions {
            if !self.config.contains(position) {
                continue;
            }
            let cell = &mut self.cells[position.row as usize][position.column as usize];
            if cell.take().is_some() {
                cleared += 1;
            }
        }

        let moved = self.collapse();
        let refilled = self.refill();
        debug!(cleared, moved, refilled, "board re-packed");

        self.events.publish(GameEvent::BoardUpdated {
            removed_positions: positions.to_vec(),
        });
    }

    /// Compact every column toward the bottom, keeping vertical order.
    /// Returns how many tiles changed rows.
    fn collapse(&mut self) -> usize {
        let mut moved = 0;
        for c in 0..self.config.columns {
            let mut write = self.config.rows;
            for read in (0..self.config.rows).rev() {
                if let Some(tile) = self.cells[read][c].take() {
                    write -= 1;
                    if write != read {
                        moved += 1;
                    }
                    self.cells[write][c] = Some(tile);
                }
            }
        }
        moved
    }

    /// Fill empty cells column by column, top to bottom
    fn refill(&mut self) -> usize {
        let mut refilled = 0;
        for c in 0..self.config.columns {
            for r in 0..self.config.rows {
                if self.cells[r][c].is_none() {
                    self.cells[r][c] = Some(self.factory.next());
                    refilled += 1;
                }
            }
        }
        refilled
    }

    /// Deep copy of the grid
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            rows: self.config.rows,
            columns: self.config.columns,
            cells: self.cells.clone(),
        }
    }
}
