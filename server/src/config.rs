//! Runtime configuration for one simulation instance.
//!
//! Defaults come straight from the shared tuning table so a server built
//! with `SimConfig::default()` agrees with every predicting peer.

use crate::error::{SimError, SimResult};
use shared::TUNING;

#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// Fixed step length in milliseconds
    pub tick_interval_ms: u64,
    pub world_width: f32,
    pub world_height: f32,
    /// How far back the history buffer keeps snapshots
    pub history_retention_ms: u64,
    /// Extra snapshots allowed on top of the retention-derived cap
    pub history_margin: usize,
    pub max_actors: usize,
    /// Seed for spawn placement and bot skill rolls
    pub seed: u64,
    /// Global multiplier on thrust, applied to every actor
    pub speed_multiplier: f32,
    /// Free-list capacity of each reuse pool
    pub pool_capacity: usize,
    /// Whether the arena shrinks during the round
    pub shrink_enabled: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: TUNING.tick.interval_ms,
            world_width: TUNING.world.width,
            world_height: TUNING.world.height,
            history_retention_ms: 200,
            history_margin: 5,
            max_actors: 32,
            seed: 0x7a11,
            speed_multiplier: 1.0,
            pool_capacity: 64,
            shrink_enabled: true,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> SimResult<()> {
        if self.tick_interval_ms == 0 {
            return Err(SimError::InvalidConfig("tick interval must be positive"));
        }
        if !(self.world_width > 0.0 && self.world_height > 0.0)
            || !self.world_width.is_finite()
            || !self.world_height.is_finite()
        {
            return Err(SimError::InvalidConfig("world size must be positive and finite"));
        }
        if self.history_retention_ms < self.tick_interval_ms {
            return Err(SimError::InvalidConfig(
                "history retention must cover at least one tick",
            ));
        }
        if self.max_actors == 0 {
            return Err(SimError::InvalidConfig("max actors must be at least one"));
        }
        if !(self.speed_multiplier > 0.0) || !self.speed_multiplier.is_finite() {
            return Err(SimError::InvalidConfig("speed multiplier must be positive"));
        }
        Ok(())
    }

    pub fn tick_secs(&self) -> f32 {
        self.tick_interval_ms as f32 / 1000.0
    }
}
