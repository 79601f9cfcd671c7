//! Canonical tuning table shared by the authoritative server and any peer
//! that predicts movement locally.
//!
//! Every constant that influences movement, trails, collisions or timing
//! lives in [`TUNING`]. Peers exchange [`Tuning::version`] on connect and a
//! mismatch means the two sides will visibly desync, so bump
//! [`TUNING_VERSION`] whenever any value below changes.

use serde::{Deserialize, Serialize};

/// Version of the tuning table. Bump on any value change.
pub const TUNING_VERSION: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldTuning {
    pub width: f32,
    pub height: f32,
    /// Seconds into the round before the arena starts shrinking
    pub shrink_start_secs: f32,
    /// Seconds the shrink takes to reach `final_scale`
    pub shrink_duration_secs: f32,
    pub final_scale: f32,
    pub min_width: f32,
    pub min_height: f32,
    /// How far outside the arena an input target may point before clamping
    pub target_overshoot: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicsTuning {
    /// Forward thrust, units/s²
    pub acceleration: f32,
    /// Per-tick multiplier on forward velocity
    pub longitudinal_drag: f32,
    /// Per-tick multiplier on sideways velocity
    pub lateral_drag: f32,
    pub drift_longitudinal_drag: f32,
    pub drift_lateral_drag: f32,
    pub turn_speed: f32,
    pub max_speed: f32,
    pub speed_turn_scale: f32,
    pub max_turn_rate: f32,
    pub low_speed_turn_bonus: f32,
    /// Fraction of the normal velocity kept after bouncing off a wall
    pub wall_restitution: f32,
    /// One-shot velocity multiplier when a boost ends
    pub post_boost_damp: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailTuning {
    pub base_lifetime_ms: u64,
    /// Lifetime once the arena has fully shrunk
    pub final_lifetime_ms: u64,
    pub emit_interval_ms: f32,
    pub fade_out_ms: u64,
    /// No trail is emitted this soon after spawning
    pub spawn_emit_delay_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollisionTuning {
    pub cell_size: f32,
    pub actor_radius: f32,
    pub trail_radius: f32,
    /// Most recent own trail points that can never kill their owner
    pub self_grace_points: u64,
    pub spawn_self_grace_ms: u64,
    pub post_bounce_grace_ms: u64,
    /// Body contact radius is `actor_radius * body_radius_scale`
    pub body_radius_scale: f32,
    pub body_restitution: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostTuning {
    pub multiplier: f32,
    pub duration_ms: u64,
    pub cooldown_ms: u64,
    pub trail_lifetime_bonus_ms: u64,
    pub energy_max: f32,
    pub energy_regen_per_sec: f32,
    pub energy_consume_per_sec: f32,
    pub min_start_energy: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BurstTuning {
    pub multiplier: f32,
    pub duration_ms: u64,
    /// Angle error (radians) above which the actor counts as turning
    pub turn_threshold: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickTuning {
    pub rate_hz: u32,
    pub interval_ms: u64,
}

impl TickTuning {
    pub fn interval_secs(&self) -> f32 {
        self.interval_ms as f32 / 1000.0
    }
}

/// The full fairness contract.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tuning {
    pub version: u32,
    pub world: WorldTuning,
    pub physics: PhysicsTuning,
    pub trail: TrailTuning,
    pub collision: CollisionTuning,
    pub boost: BoostTuning,
    pub burst: BurstTuning,
    pub tick: TickTuning,
}

impl Tuning {
    /// Squared distance under which an actor touches a trail point.
    pub fn trail_contact_distance_sq(&self) -> f32 {
        let reach = self.collision.actor_radius + self.collision.trail_radius;
        reach * reach
    }
}

pub const TUNING: Tuning = Tuning {
    version: TUNING_VERSION,
    world: WorldTuning {
        width: 3500.0,
        height: 2500.0,
        shrink_start_secs: 10.0,
        shrink_duration_secs: 32.0,
        final_scale: 0.5,
        min_width: 800.0,
        min_height: 600.0,
        target_overshoot: 500.0,
    },
    physics: PhysicsTuning {
        acceleration: 220.0,
        longitudinal_drag: 0.988,
        lateral_drag: 0.975,
        drift_longitudinal_drag: 0.96,
        drift_lateral_drag: 0.99,
        turn_speed: 4.4,
        max_speed: 480.0,
        speed_turn_scale: 0.18,
        max_turn_rate: 4.8,
        low_speed_turn_bonus: 0.35,
        wall_restitution: 0.65,
        post_boost_damp: 0.9,
    },
    trail: TrailTuning {
        base_lifetime_ms: 8000,
        final_lifetime_ms: 5000,
        emit_interval_ms: 40.0,
        fade_out_ms: 2000,
        spawn_emit_delay_ms: 800,
    },
    collision: CollisionTuning {
        cell_size: 100.0,
        actor_radius: 8.0,
        trail_radius: 7.0,
        self_grace_points: 20,
        spawn_self_grace_ms: 2200,
        post_bounce_grace_ms: 700,
        body_radius_scale: 2.5,
        body_restitution: 0.8,
    },
    boost: BoostTuning {
        multiplier: 1.8,
        duration_ms: 1400,
        cooldown_ms: 2500,
        trail_lifetime_bonus_ms: 1500,
        energy_max: 100.0,
        energy_regen_per_sec: 28.0,
        energy_consume_per_sec: 55.0,
        min_start_energy: 20.0,
    },
    burst: BurstTuning {
        multiplier: 1.3,
        duration_ms: 600,
        turn_threshold: 0.05,
    },
    tick: TickTuning {
        rate_hz: 66,
        interval_ms: 1000 / 66,
    },
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_interval_matches_rate() {
        assert_eq!(TUNING.tick.interval_ms, 15);
        assert_eq!(TUNING.tick.interval_secs(), 0.015);
    }

    #[test]
    fn test_table_carries_version() {
        assert_eq!(TUNING.version, TUNING_VERSION);
    }

    #[test]
    fn test_contact_distance() {
        assert_eq!(TUNING.trail_contact_distance_sq(), 225.0);
    }

    #[test]
    fn test_grace_window_outlasts_emission() {
        // A tight turn must not run into points that were just laid down
        let grace_ms = TUNING.collision.self_grace_points as f32 * TUNING.trail.emit_interval_ms;
        assert!(grace_ms > 300.0);
    }

    #[test]
    fn test_boost_is_stronger_than_burst() {
        assert!(TUNING.boost.multiplier > TUNING.burst.multiplier);
        assert!(TUNING.burst.multiplier > 1.0);
    }
}
