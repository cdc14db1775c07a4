//! Scoring policies for matched groups
//!
//! Groups smaller than two never score under any policy.

use serde::{Deserialize, Serialize};

/// Which scoring policy a session uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringKind {
    #[default]
    Default,
    Linear,
    Exponential,
}

impl ScoringKind {
    pub fn name(&self) -> &'static str {
        match self {
            ScoringKind::Default => "default",
            ScoringKind::Linear => "linear",
            ScoringKind::Exponential => "exponential",
        }
    }

    pub fn all() -> &'static [ScoringKind] {
        &[
            ScoringKind::Default,
            ScoringKind::Linear,
            ScoringKind::Exponential,
        ]
    }

    /// Build the policy this kind names
    pub fn build(self, config: &ScoringConfig) -> Box<dyn ScoringStrategy> {
        match self {
            ScoringKind::Default => Box::new(DefaultScoring::new(config)),
            ScoringKind::Linear => Box::new(LinearScoring::new(config)),
            ScoringKind::Exponential => Box::new(ExponentialScoring::new(config)),
        }
    }
}

impl std::str::FromStr for ScoringKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScoringKind::all()
            .iter()
            .copied()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown scoring policy: {}", s))
    }
}

/// Scoring parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub base_score: u64,
    pub multiplier: u32,
    /// Score that wins the game
    pub target_score: u64,
    pub strategy: ScoringKind,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_score: 10,
            multiplier: 2,
            target_score: 500,
            strategy: ScoringKind::Default,
        }
    }
}

impl ScoringConfig {
    /// The configured policy
    pub fn strategy(&self) -> Box<dyn ScoringStrategy> {
        self.strategy.build(self)
    }
}

/// Maps a matched group's size to points
pub trait ScoringStrategy {
    fn calculate_score(&self, group_size: usize) -> u64;

    fn calculate_bonus_score(&self, group_size: usize) -> u64;

    /// Points actually awarded for a group
    fn total_score(&self, group_size: usize) -> u64 {
        self.calculate_score(group_size)
            .saturating_add(self.calculate_bonus_score(group_size))
    }
}

/// One base per tile beyond the first, plus a bonus every two tiles past two
#[derive(Debug, Clone)]
pub struct DefaultScoring {
    base_score: u64,
    multiplier: u64,
}

impl DefaultScoring {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            base_score: config.base_score,
            multiplier: config.multiplier as u64,
        }
    }
}

impl ScoringStrategy for DefaultScoring {
    fn calculate_score(&self, group_size: usize) -> u64 {
        if group_size < 2 {
            return 0;
        }
        self.base_score.saturating_mul(group_size as u64 - 1)
    }

    fn calculate_bonus_score(&self, group_size: usize) -> u64 {
        if group_size < 3 {
            return 0;
        }
        let steps = (group_size as u64 - 2) / 2;
        self.base_score
            .saturating_mul(steps)
            .saturating_mul(self.multiplier)
    }
}

/// One base per tile
#[derive(Debug, Clone)]
pub struct LinearScoring {
    base_score: u64,
}

impl LinearScoring {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            base_score: config.base_score,
        }
    }
}

impl ScoringStrategy for LinearScoring {
    fn calculate_score(&self, group_size: usize) -> u64 {
        if group_size < 2 {
            return 0;
        }
        self.base_score.saturating_mul(group_size as u64)
    }

    fn calculate_bonus_score(&self, _group_size: usize) -> u64 {
        0
    }
}

/// Base times group size raised to the multiplier
#[derive(Debug, Clone)]
pub struct ExponentialScoring {
    base_score: u64,
    exponent: u32,
}

impl ExponentialScoring {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            base_score: config.base_score,
            exponent: config.multiplier,
        }
    }
}

impl ScoringStrategy for ExponentialScoring {
    fn calculate_score(&self, group_size: usize) -> u64 {
        if group_size < 2 {
            return 0;
        }
        let power = (group_size as u64).saturating_pow(self.exponent);
        self.base_score.saturating_mul(power)
    }

    // The curve already rewards big groups
    fn calculate_bonus_score(&self, _group_size: usize) -> u64 {
        0
    }
}
