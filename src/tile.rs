//! Tile generation
//!
//! A generator picks color indices, the factory stamps each one with a
//! fresh id. Ids start at 1 and are never handed out twice by one factory.

use crate::board::BoardConfig;
use crate::error::{GameError, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// A single colored tile with a stable identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tile {
    pub id: u64,
    pub color_index: u32,
}

/// Source of color indices for new tiles
pub trait ColorGenerator {
    /// Next color index, always in `[0, color_count)`
    fn generate_color_index(&mut self) -> u32;
}

/// Uniform random colors
#[derive(Debug, Clone)]
pub struct RandomTileGenerator {
    color_count: u32,
    rng: ChaCha8Rng,
}

impl RandomTileGenerator {
    /// Create a generator seeded from system entropy
    pub fn new(color_count: u32) -> Result<Self> {
        Self::with_seed(color_count, rand::random())
    }

    /// Create a generator with a fixed seed (replays produce the same board)
    pub fn with_seed(color_count: u32, seed: u64) -> Result<Self> {
        if color_count == 0 {
            return Err(GameError::invalid("color count must be greater than 0"));
        }
        Ok(Self {
            color_count,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    pub fn color_count(&self) -> u32 {
        self.color_count
    }
}

impl ColorGenerator for RandomTileGenerator {
    fn generate_color_index(&mut self) -> u32 {
        self.rng.gen_range(0..self.color_count)
    }
}

/// Replays a fixed list of colors, wrapping around at the end
#[derive(Debug, Clone)]
pub struct ScriptedGenerator {
    colors: Vec<u32>,
    cursor: usize,
}

impl ScriptedGenerator {
    pub fn new(colors: Vec<u32>) -> Result<Self> {
        if colors.is_empty() {
            return Err(GameError::invalid("scripted generator needs at least one color"));
        }
        Ok(Self { colors, cursor: 0 })
    }
}

impl ColorGenerator for ScriptedGenerator {
    fn generate_color_index(&mut self) -> u32 {
        let color = self.colors[self.cursor];
        self.cursor = (self.cursor + 1) % self.colors.len();
        color
    }
}

/// Produces uniquely numbered tiles
pub struct TileFactory {
    generator: Box<dyn ColorGenerator>,
    next_id: u64,
}

impl std::fmt::Debug for TileFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileFactory")
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

impl TileFactory {
    pub fn new(generator: impl ColorGenerator + 'static) -> Self {
        Self {
            generator: Box::new(generator),
            next_id: 1,
        }
    }

    /// Random factory for a board; `None` seeds from entropy
    pub fn random(config: &BoardConfig, seed: Option<u64>) -> Result<Self> {
        let generator = match seed {
            Some(seed) => RandomTileGenerator::with_seed(config.color_count, seed)?,
            None => RandomTileGenerator::new(config.color_count)?,
        };
        Ok(Self::new(generator))
    }

    /// Produce the next tile
    pub fn next(&mut self) -> Tile {
        let color_index = self.generator.generate_color_index();
        let id = self.next_id;
        self.next_id += 1;
        Tile { id, color_index }
    }

    /// Produce `count` tiles in id order
    pub fn create_tiles(&mut self, count: usize) -> Result<Vec<Tile>> {
        if count == 0 {
            return Err(GameError::invalid("tile count must be greater than 0"));
        }
        Ok((0..count).map(|_| self.next()).collect())
    }

    /// Id the next tile will receive
    pub fn peek_next_id(&self) -> u64 {
        self.next_id
    }
}
