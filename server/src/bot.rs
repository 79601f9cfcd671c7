//! Bot opponents.
//!
//! A [`BotController`] drives one actor through the same [`PlayerInput`]
//! contract a remote player uses. Decisions come from a three-state machine:
//!
//! - `Search` heads for the nearest collectible, or the arena centre.
//! - `Hunt` leads the nearest living opponent when one is in range.
//! - `Panic` fires when the point ahead of the bot touches a wall margin or an
//!   opponent's trail, and steers back to the centre while drifting.
//!
//! The output heading is eased toward the desired one at a bounded rate on
//! top of the actor's own turn limit, so bots never snap their aim.

use crate::actor::Actor;
use crate::collision::HazardField;
use rand::Rng;
use shared::{wrap_angle, ActorId, Bounds, PlayerInput, Vec2};
use std::f32::consts::PI;

pub const LOOK_AHEAD: f32 = 120.0;
pub const WALL_MARGIN: f32 = 50.0;
pub const DANGER_RADIUS: f32 = 35.0;
pub const PANIC_DWELL_MS: u64 = 800;
pub const HUNT_RANGE: f32 = 350.0;
/// Longest lead time used when predicting a target, in seconds
pub const LEAD_CAP_SECS: f32 = 1.2;
pub const LEAD_SPEED: f32 = 500.0;
pub const HUNT_BOOST_ENERGY: f32 = 40.0;
pub const AIM_TURN_RATE: f32 = PI * 1.8;
pub const AIM_DISTANCE: f32 = 900.0;
pub const SKILL_MIN: f32 = 0.7;
pub const SKILL_MAX: f32 = 1.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotState {
    Search,
    Hunt,
    Panic,
}

/// What a bot can see of another actor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Opponent {
    pub id: ActorId,
    pub position: Vec2,
    pub velocity: Vec2,
}

/// Everything a bot senses in one update.
pub struct Sense<'a> {
    pub bounds: Bounds,
    /// Living actors other than the bot itself
    pub opponents: &'a [Opponent],
    pub collectibles: &'a [Vec2],
    pub hazards: &'a dyn HazardField,
}

#[derive(Debug, Clone)]
pub struct BotController {
    state: BotState,
    panic_until: u64,
    aim_heading: Option<f32>,
    skill: f32,
}

impl BotController {
    /// Rolls a skill level from `rng`.
    pub fn new<R: Rng>(rng: &mut R) -> Self {
        Self::with_skill(rng.gen_range(SKILL_MIN..=SKILL_MAX))
    }

    pub fn with_skill(skill: f32) -> Self {
        Self {
            state: BotState::Search,
            panic_until: 0,
            aim_heading: None,
            skill: skill.clamp(SKILL_MIN, SKILL_MAX),
        }
    }

    pub fn state(&self) -> BotState {
        self.state
    }

    pub fn aim_heading(&self) -> Option<f32> {
        self.aim_heading
    }

    pub fn skill(&self) -> f32 {
        self.skill
    }

    /// Picks the input the bot's actor should use for the next tick.
    pub fn update(&mut self, actor: &Actor, sense: &Sense<'_>, dt: f32, now_ms: u64) -> PlayerInput {
        let position = actor.position();
        let nearest = nearest_opponent(position, sense.opponents);

        self.state = self.next_state(actor, sense, nearest.map(|(_, d)| d), now_ms);

        let center = sense.bounds.center();
        let mut input = match (self.state, nearest) {
            (BotState::Panic, _) => PlayerInput {
                target: center,
                accelerate: true,
                boost: false,
                drift: true,
            },
            (BotState::Hunt, Some((target, distance))) => {
                let lead = self.lead_secs(distance);
                PlayerInput {
                    target: target.position + target.velocity * lead,
                    accelerate: true,
                    boost: actor.can_boost(now_ms) && actor.boost_energy() > HUNT_BOOST_ENERGY,
                    drift: false,
                }
            }
            _ => PlayerInput::toward(nearest_point(position, sense.collectibles).unwrap_or(center)),
        };

        input.target = position + Vec2::from_angle(self.ease_aim(actor, input.target, dt)) * AIM_DISTANCE;
        input
    }

    fn next_state(&mut self, actor: &Actor, sense: &Sense<'_>, enemy_distance: Option<f32>, now_ms: u64) -> BotState {
        let ahead = actor.position() + Vec2::from_angle(actor.heading()) * LOOK_AHEAD;
        let near_wall = sense.bounds.edge_distance(ahead) < WALL_MARGIN;
        let near_trail = sense.hazards.hazard_near(ahead, DANGER_RADIUS, Some(actor.id()));

        if near_wall || near_trail {
            self.panic_until = now_ms + PANIC_DWELL_MS;
            return BotState::Panic;
        }
        if now_ms < self.panic_until {
            return BotState::Panic;
        }
        match enemy_distance {
            Some(distance) if distance < HUNT_RANGE * self.skill => BotState::Hunt,
            _ => BotState::Search,
        }
    }

    /// How far ahead to aim at a target this far away, skill included.
    fn lead_secs(&self, distance: f32) -> f32 {
        (distance / LEAD_SPEED * self.skill).min(LEAD_CAP_SECS)
    }

    /// Moves the aim heading toward `target` by at most the aim turn budget.
    fn ease_aim(&mut self, actor: &Actor, target: Vec2, dt: f32) -> f32 {
        let aim = self.aim_heading.unwrap_or_else(|| actor.heading());
        let to_target = target - actor.position();
        let desired = if to_target.magnitude_squared() > 1e-6 {
            to_target.angle()
        } else {
            aim
        };
        let budget = AIM_TURN_RATE * self.skill * dt;
        let eased = wrap_angle(aim + wrap_angle(desired - aim).clamp(-budget, budget));
        self.aim_heading = Some(eased);
        eased
    }
}

fn nearest_opponent(from: Vec2, opponents: &[Opponent]) -> Option<(Opponent, f32)> {
    opponents
        .iter()
        .map(|o| (*o, from.distance(o.position)))
        .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.id.cmp(&b.0.id)))
}

fn nearest_point(from: Vec2, points: &[Vec2]) -> Option<Vec2> {
    points
        .iter()
        .copied()
        .filter(|p| p.is_finite())
        .min_by(|a, b| from.distance_squared(*a).total_cmp(&from.distance_squared(*b)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct NoHazards;

    impl HazardField for NoHazards {
        fn hazard_near(&self, _point: Vec2, _radius: f32, _ignore_owner: Option<ActorId>) -> bool {
            false
        }
    }

    struct Hazards(Vec<(ActorId, Vec2)>);

    impl HazardField for Hazards {
        fn hazard_near(&self, point: Vec2, radius: f32, ignore_owner: Option<ActorId>) -> bool {
            self.0
                .iter()
                .any(|(owner, p)| Some(*owner) != ignore_owner && p.distance(point) < radius)
        }
    }

    fn arena() -> Bounds {
        Bounds::from_size(3500.0, 2500.0)
    }

    fn sense<'a>(opponents: &'a [Opponent], collectibles: &'a [Vec2], hazards: &'a dyn HazardField) -> Sense<'a> {
        Sense {
            bounds: arena(),
            opponents,
            collectibles,
            hazards,
        }
    }

    fn requested_heading(actor: &Actor, input: &PlayerInput) -> f32 {
        (input.target - actor.position()).angle()
    }

    #[test]
    fn test_skill_roll_is_seeded_and_bounded() {
        let a = BotController::new(&mut StdRng::seed_from_u64(7));
        let b = BotController::new(&mut StdRng::seed_from_u64(7));
        assert_eq!(a.skill(), b.skill());
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..100 {
            let skill = BotController::new(&mut rng).skill();
            assert!((SKILL_MIN..=SKILL_MAX).contains(&skill));
        }
    }

    #[test]
    fn test_empty_sensing_seeks_center() {
        let mut bot = BotController::with_skill(1.0);
        let actor = Actor::new(1, Vec2::new(1000.0, 1250.0), 0.0, 0);
        let input = bot.update(&actor, &sense(&[], &[], &NoHazards), 0.015, 0);
        assert_eq!(bot.state(), BotState::Search);
        assert!(input.accelerate);
        assert!(input.target.is_finite());
        // Center is straight ahead, so the aim does not move
        assert!(requested_heading(&actor, &input).abs() < 1e-4);
    }

    #[test]
    fn test_search_prefers_nearest_collectible() {
        let mut bot = BotController::with_skill(1.0);
        let actor = Actor::new(1, Vec2::new(1000.0, 1000.0), 0.0, 0);
        let items = [Vec2::new(1000.0, 3000.0), Vec2::new(1000.0, 1200.0)];
        let mut input = bot.update(&actor, &sense(&[], &items, &NoHazards), 0.015, 0);
        for _ in 0..30 {
            input = bot.update(&actor, &sense(&[], &items, &NoHazards), 0.015, 0);
        }
        assert_eq!(bot.state(), BotState::Search);
        assert!((requested_heading(&actor, &input) - PI / 2.0).abs() < 0.05);
    }

    #[test]
    fn test_hunts_opponent_in_range() {
        let mut bot = BotController::with_skill(1.0);
        let actor = Actor::new(1, Vec2::new(1000.0, 1000.0), 0.0, 0);
        let close = [Opponent {
            id: 2,
            position: Vec2::new(1200.0, 1000.0),
            velocity: Vec2::new(0.0, 100.0),
        }];
        let input = bot.update(&actor, &sense(&close, &[], &NoHazards), 0.015, 0);
        assert_eq!(bot.state(), BotState::Hunt);
        assert!(input.boost);
        // Leading a target moving down means aiming below it
        assert!(requested_heading(&actor, &input) > 0.0);

        let far = [Opponent {
            id: 2,
            position: Vec2::new(2000.0, 1000.0),
            velocity: Vec2::ZERO,
        }];
        let mut bot = BotController::with_skill(1.0);
        bot.update(&actor, &sense(&far, &[], &NoHazards), 0.015, 0);
        assert_eq!(bot.state(), BotState::Search);
    }

    #[test]
    fn test_panics_near_wall_and_turns_away() {
        let mut bot = BotController::new(&mut StdRng::seed_from_u64(1));
        // Heading straight at the right wall
        let actor = Actor::new(1, Vec2::new(3400.0, 1250.0), 0.0, 0);
        let before = actor.heading();

        let mut input = bot.update(&actor, &sense(&[], &[], &NoHazards), 0.015, 0);
        assert_eq!(bot.state(), BotState::Panic);
        assert!(input.drift);
        for tick in 1..10 {
            input = bot.update(&actor, &sense(&[], &[], &NoHazards), 0.015, tick * 15);
        }
        let change = wrap_angle(requested_heading(&actor, &input) - before).abs();
        assert!(change > 0.1, "heading only changed by {}", change);
    }

    #[test]
    fn test_panics_on_opponent_trail_but_not_own() {
        let actor = Actor::new(1, Vec2::new(1000.0, 1000.0), 0.0, 0);
        let ahead = Vec2::new(1000.0 + LOOK_AHEAD, 1000.0);

        let mut bot = BotController::with_skill(1.0);
        bot.update(&actor, &sense(&[], &[], &Hazards(vec![(1, ahead)])), 0.015, 0);
        assert_eq!(bot.state(), BotState::Search);

        bot.update(&actor, &sense(&[], &[], &Hazards(vec![(2, ahead)])), 0.015, 15);
        assert_eq!(bot.state(), BotState::Panic);
    }

    #[test]
    fn test_panic_dwells_before_releasing() {
        let actor = Actor::new(1, Vec2::new(1000.0, 1000.0), 0.0, 0);
        let ahead = Vec2::new(1000.0 + LOOK_AHEAD, 1000.0);
        let mut bot = BotController::with_skill(1.0);

        bot.update(&actor, &sense(&[], &[], &Hazards(vec![(2, ahead)])), 0.015, 1000);
        assert_eq!(bot.state(), BotState::Panic);

        bot.update(&actor, &sense(&[], &[], &NoHazards), 0.015, 1000 + PANIC_DWELL_MS - 1);
        assert_eq!(bot.state(), BotState::Panic);

        bot.update(&actor, &sense(&[], &[], &NoHazards), 0.015, 1000 + PANIC_DWELL_MS);
        assert_eq!(bot.state(), BotState::Search);
    }

    #[test]
    fn test_aim_turns_at_bounded_rate() {
        let mut bot = BotController::with_skill(1.0);
        let actor = Actor::new(1, Vec2::new(1000.0, 1000.0), 0.0, 0);
        // Collectible directly behind
        let items = [Vec2::new(500.0, 1000.0)];
        bot.update(&actor, &sense(&[], &items, &NoHazards), 0.015, 0);
        let turned = bot.aim_heading().unwrap().abs();
        assert!(turned <= AIM_TURN_RATE * 0.015 + 1e-5);
        assert!(turned > 0.0);
    }

    #[test]
    fn test_lead_never_exceeds_cap() {
        let sharp = BotController::with_skill(SKILL_MAX);
        assert!((sharp.lead_secs(200.0) - 200.0 / LEAD_SPEED * SKILL_MAX).abs() < 1e-6);
        assert_eq!(sharp.lead_secs(2000.0), LEAD_CAP_SECS);

        let dull = BotController::with_skill(SKILL_MIN);
        assert!(dull.lead_secs(2000.0) <= LEAD_CAP_SECS);
    }
}
