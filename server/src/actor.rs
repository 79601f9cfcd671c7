//! Per-participant kinematics.
//!
//! An [`Actor`] steers toward its latest input target, integrates thrust and
//! anisotropic drag, bounces off the arena walls and lays down a trail of
//! hazard points at a fixed cadence. Every constant comes from
//! [`shared::TUNING`] so a predicting client integrates the same way.

use shared::{
    wrap_angle, ActorId, ActorState, Bounds, PlayerInput, TrailPointState, Vec2, TUNING,
};
use std::collections::VecDeque;

/// A hazard left behind a moving actor. Expiry is evaluated lazily.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailPoint {
    pub ordinal: u64,
    pub position: Vec2,
    pub created_ms: u64,
    pub expires_ms: u64,
}

impl TrailPoint {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_ms
    }

    pub fn to_state(&self) -> TrailPointState {
        TrailPointState {
            ordinal: self.ordinal,
            position: self.position,
            created_ms: self.created_ms,
            expires_ms: self.expires_ms,
        }
    }
}

/// World facts an actor needs for one integration step.
#[derive(Debug, Clone, Copy)]
pub struct StepContext {
    pub now_ms: u64,
    pub bounds: Bounds,
    /// 1.0 at full size, down to the final arena scale
    pub shrink_factor: f32,
    /// Step length the per-tick drag factors are tuned for, in seconds
    pub reference_dt: f32,
}

#[derive(Debug, Clone)]
pub struct Actor {
    id: ActorId,
    position: Vec2,
    velocity: Vec2,
    heading: f32,
    alive: bool,
    spawn_ms: u64,
    eliminated_ms: Option<u64>,
    trail: VecDeque<TrailPoint>,
    next_ordinal: u64,
    emit_elapsed_ms: f32,
    boost_energy: f32,
    boost_until: Option<u64>,
    next_boost_ms: u64,
    burst_until: Option<u64>,
    was_turning: bool,
    was_boosting: bool,
    input: PlayerInput,
    last_bounce_ms: Option<u64>,
}

impl Actor {
    pub fn new(id: ActorId, position: Vec2, heading: f32, now_ms: u64) -> Self {
        let heading = wrap_angle(heading);
        Self {
            id,
            position,
            velocity: Vec2::ZERO,
            heading,
            alive: true,
            spawn_ms: now_ms,
            eliminated_ms: None,
            trail: VecDeque::with_capacity(256),
            next_ordinal: 0,
            emit_elapsed_ms: 0.0,
            boost_energy: TUNING.boost.energy_max,
            boost_until: None,
            next_boost_ms: 0,
            burst_until: None,
            was_turning: false,
            was_boosting: false,
            input: PlayerInput::toward(position + Vec2::from_angle(heading) * 100.0),
            last_bounce_ms: None,
        }
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn heading(&self) -> f32 {
        self.heading
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn spawn_ms(&self) -> u64 {
        self.spawn_ms
    }

    pub fn eliminated_ms(&self) -> Option<u64> {
        self.eliminated_ms
    }

    pub fn last_bounce_ms(&self) -> Option<u64> {
        self.last_bounce_ms
    }

    pub fn input(&self) -> &PlayerInput {
        &self.input
    }

    pub fn trail(&self) -> &VecDeque<TrailPoint> {
        &self.trail
    }

    /// Ordinal the next emitted trail point will get.
    pub fn next_ordinal(&self) -> u64 {
        self.next_ordinal
    }

    pub fn boost_energy(&self) -> f32 {
        self.boost_energy
    }

    pub fn burst_until(&self) -> Option<u64> {
        self.burst_until
    }

    pub fn was_turning(&self) -> bool {
        self.was_turning
    }

    pub fn is_boosting(&self, now_ms: u64) -> bool {
        matches!(self.boost_until, Some(until) if now_ms < until) && self.boost_energy > 0.0
    }

    pub fn is_bursting(&self, now_ms: u64) -> bool {
        matches!(self.burst_until, Some(until) if now_ms < until)
    }

    pub fn can_boost(&self, now_ms: u64) -> bool {
        self.alive
            && !self.is_boosting(now_ms)
            && now_ms >= self.next_boost_ms
            && self.boost_energy >= TUNING.boost.min_start_energy
    }

    /// Teleports the actor. Used for spawning and by tests.
    pub fn place(&mut self, position: Vec2, velocity: Vec2, heading: f32) {
        if position.is_finite() {
            self.position = position;
        }
        self.velocity = if velocity.is_finite() { velocity } else { Vec2::ZERO };
        self.heading = wrap_angle(heading);
    }

    /// Stores the latest input after sanitizing its target.
    ///
    /// A non-finite target is replaced with a point straight ahead and any
    /// target is clamped to the arena grown by the overshoot margin.
    pub fn set_input(&mut self, mut input: PlayerInput, bounds: &Bounds) {
        if !input.target.is_finite() {
            input.target = self.position + Vec2::from_angle(self.heading) * 100.0;
        }
        input.target = bounds.clamp(input.target, TUNING.world.target_overshoot);
        self.input = input;
    }

    /// Starts a boost if cooldown and energy allow it.
    pub fn try_activate_boost(&mut self, now_ms: u64) -> bool {
        if !self.can_boost(now_ms) {
            return false;
        }
        let affordable_ms =
            (self.boost_energy / TUNING.boost.energy_consume_per_sec * 1000.0).floor() as u64;
        let duration_ms = TUNING.boost.duration_ms.min(affordable_ms);
        if duration_ms == 0 {
            return false;
        }
        self.boost_until = Some(now_ms + duration_ms);
        self.next_boost_ms = now_ms + TUNING.boost.cooldown_ms;
        true
    }

    pub fn update(&mut self, dt: f32, speed_multiplier: f32, ctx: &StepContext) {
        let now = ctx.now_ms;
        if !self.alive {
            self.fade_trail(now);
            return;
        }

        let error = self.steer(dt);

        // Releasing a sharp turn grants a short burst
        let turning = error.abs() > TUNING.burst.turn_threshold;
        if self.was_turning && !turning && !self.is_bursting(now) {
            self.burst_until = Some(now + TUNING.burst.duration_ms);
        }
        self.was_turning = turning;

        if self.input.boost {
            self.try_activate_boost(now);
        }
        let boosting = self.is_boosting(now);

        let mut multiplier = speed_multiplier;
        if boosting {
            multiplier *= TUNING.boost.multiplier;
        }
        if self.is_bursting(now) {
            multiplier *= TUNING.burst.multiplier;
        }

        let forward = Vec2::from_angle(self.heading);
        if self.input.accelerate {
            self.velocity += forward * (TUNING.physics.acceleration * multiplier * dt);
        }
        self.apply_drag(forward, dt, ctx.reference_dt);

        let speed_cap = TUNING.physics.max_speed * multiplier;
        let speed = self.velocity.magnitude();
        if speed > speed_cap {
            self.velocity = self.velocity * (speed_cap / speed);
        }

        self.position += self.velocity * dt;
        self.reflect_walls(&ctx.bounds, now);

        if boosting {
            self.boost_energy =
                (self.boost_energy - TUNING.boost.energy_consume_per_sec * dt).max(0.0);
            if self.boost_energy <= 0.0 {
                self.boost_until = None;
            }
        } else {
            self.boost_energy = (self.boost_energy + TUNING.boost.energy_regen_per_sec * dt)
                .min(TUNING.boost.energy_max);
        }
        if self.was_boosting && !boosting {
            self.velocity = self.velocity * TUNING.physics.post_boost_damp;
        }
        self.was_boosting = boosting;

        if !self.position.is_finite() || !self.velocity.is_finite() {
            self.position = ctx.bounds.center();
            self.velocity = Vec2::ZERO;
        }

        self.prune_trail(now);
        self.emit_trail(dt, ctx, boosting);
    }

    /// Marks the actor dead. Its trail lingers for the fade-out window.
    pub fn eliminate(&mut self, now_ms: u64) {
        if !self.alive {
            return;
        }
        self.alive = false;
        self.eliminated_ms = Some(now_ms);
        self.velocity = Vec2::ZERO;
        self.boost_until = None;
    }

    /// Public view of the actor at `now_ms`, with this tick's trail delta.
    pub fn state(&self, now_ms: u64) -> ActorState {
        ActorState {
            id: self.id,
            position: self.position,
            velocity: self.velocity,
            heading: self.heading,
            alive: self.alive,
            boosting: self.is_boosting(now_ms),
            boost_energy: self.boost_energy,
            trail_added: self
                .trail
                .iter()
                .rev()
                .take_while(|p| p.created_ms == now_ms)
                .map(TrailPoint::to_state)
                .collect(),
            trail_head: self.trail.front().map(|p| p.ordinal),
        }
    }

    /// Turns toward the input target and returns the angle error before turning.
    fn steer(&mut self, dt: f32) -> f32 {
        let to_target = self.input.target - self.position;
        if to_target.magnitude_squared() < 1e-6 {
            return 0.0;
        }
        let error = wrap_angle(to_target.angle() - self.heading);

        let physics = &TUNING.physics;
        let speed = self.velocity.magnitude();
        let speed_ratio = speed / physics.max_speed;
        let turn_scale = 1.0 / (1.0 + speed_ratio * physics.speed_turn_scale);
        let low_speed_factor = 1.0 + physics.low_speed_turn_bonus * (1.0 - speed_ratio.min(1.0));

        let limit = physics.max_turn_rate * turn_scale * low_speed_factor * dt;
        let change =
            (error * physics.turn_speed * turn_scale * low_speed_factor * dt).clamp(-limit, limit);
        self.heading = wrap_angle(self.heading + change);
        error
    }

    fn apply_drag(&mut self, forward: Vec2, dt: f32, reference_dt: f32) {
        let physics = &TUNING.physics;
        let (forward_drag, lateral_drag) = if self.input.drift {
            (physics.drift_longitudinal_drag, physics.drift_lateral_drag)
        } else {
            (physics.longitudinal_drag, physics.lateral_drag)
        };
        let steps = if reference_dt > 0.0 { dt / reference_dt } else { 1.0 };

        let side = Vec2::new(-forward.y, forward.x);
        let along = self.velocity.dot(forward) * forward_drag.powf(steps);
        let across = self.velocity.dot(side) * lateral_drag.powf(steps);
        self.velocity = forward * along + side * across;
    }

    fn reflect_walls(&mut self, bounds: &Bounds, now_ms: u64) {
        let restitution = TUNING.physics.wall_restitution;
        let mut bounced = false;

        if self.position.x < bounds.min.x {
            self.position.x = bounds.min.x;
            self.velocity.x = self.velocity.x.abs() * restitution;
            bounced = true;
        } else if self.position.x > bounds.max.x {
            self.position.x = bounds.max.x;
            self.velocity.x = -self.velocity.x.abs() * restitution;
            bounced = true;
        }
        if self.position.y < bounds.min.y {
            self.position.y = bounds.min.y;
            self.velocity.y = self.velocity.y.abs() * restitution;
            bounced = true;
        } else if self.position.y > bounds.max.y {
            self.position.y = bounds.max.y;
            self.velocity.y = -self.velocity.y.abs() * restitution;
            bounced = true;
        }

        if bounced {
            self.last_bounce_ms = Some(now_ms);
        }
    }

    fn prune_trail(&mut self, now_ms: u64) {
        while matches!(self.trail.front(), Some(point) if point.is_expired(now_ms)) {
            self.trail.pop_front();
        }
    }

    fn fade_trail(&mut self, now_ms: u64) {
        match self.eliminated_ms {
            Some(at) if now_ms >= at + TUNING.trail.fade_out_ms => self.trail.clear(),
            _ => self.prune_trail(now_ms),
        }
    }

    fn emit_trail(&mut self, dt: f32, ctx: &StepContext, boosting: bool) {
        self.emit_elapsed_ms += dt * 1000.0;
        if ctx.now_ms < self.spawn_ms + TUNING.trail.spawn_emit_delay_ms {
            return;
        }
        if self.emit_elapsed_ms < TUNING.trail.emit_interval_ms {
            return;
        }
        self.emit_elapsed_ms = 0.0;

        let mut lifetime = trail_lifetime_ms(ctx.shrink_factor);
        if boosting {
            lifetime += TUNING.boost.trail_lifetime_bonus_ms;
        }
        self.trail.push_back(TrailPoint {
            ordinal: self.next_ordinal,
            position: self.position,
            created_ms: ctx.now_ms,
            expires_ms: ctx.now_ms + lifetime,
        });
        self.next_ordinal += 1;
    }
}

/// Trail lifetime for the given arena shrink factor. Shorter as the arena closes in.
pub fn trail_lifetime_ms(shrink_factor: f32) -> u64 {
    let span = 1.0 - TUNING.world.final_scale;
    let progress = if span > 0.0 {
        ((1.0 - shrink_factor) / span).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let base = TUNING.trail.base_lifetime_ms as f32;
    let last = TUNING.trail.final_lifetime_ms as f32;
    (base + (last - base) * progress).floor() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    const DT: f32 = 0.015;

    fn arena() -> Bounds {
        Bounds::from_size(TUNING.world.width, TUNING.world.height)
    }

    fn ctx(now_ms: u64) -> StepContext {
        StepContext {
            now_ms,
            bounds: arena(),
            shrink_factor: 1.0,
            reference_dt: DT,
        }
    }

    fn run(actor: &mut Actor, from_ms: u64, ticks: u64) -> u64 {
        let mut now = from_ms;
        for _ in 0..ticks {
            now += 15;
            actor.update(DT, 1.0, &ctx(now));
        }
        now
    }

    #[test]
    fn test_new_actor_starts_alive_and_still() {
        let actor = Actor::new(1, Vec2::new(500.0, 500.0), 0.0, 0);
        assert!(actor.is_alive());
        assert_eq!(actor.velocity(), Vec2::ZERO);
        assert_eq!(actor.boost_energy(), TUNING.boost.energy_max);
        assert!(actor.trail().is_empty());
    }

    #[test]
    fn test_accelerates_along_heading() {
        let mut actor = Actor::new(1, Vec2::new(500.0, 500.0), 0.0, 0);
        run(&mut actor, 0, 20);
        assert!(actor.position().x > 500.0);
        assert_approx_eq!(actor.position().y, 500.0, 1e-3);
    }

    #[test]
    fn test_turn_rate_is_bounded() {
        let mut actor = Actor::new(1, Vec2::new(500.0, 500.0), 0.0, 0);
        actor.set_input(PlayerInput::toward(Vec2::new(500.0, 1500.0)), &arena());
        actor.update(DT, 1.0, &ctx(15));
        let max_step = TUNING.physics.max_turn_rate * (1.0 + TUNING.physics.low_speed_turn_bonus) * DT;
        assert!(actor.heading() > 0.0);
        assert!(actor.heading() <= max_step + 1e-6);
    }

    #[test]
    fn test_steers_toward_target() {
        let mut actor = Actor::new(1, Vec2::new(1000.0, 1000.0), 0.0, 0);
        actor.set_input(PlayerInput::toward(Vec2::new(1000.0, 2000.0)), &arena());
        run(&mut actor, 0, 60);
        let desired = (Vec2::new(1000.0, 2000.0) - actor.position()).angle();
        assert!(wrap_angle(desired - actor.heading()).abs() < 0.2);
    }

    #[test]
    fn test_burst_on_turn_release() {
        let mut actor = Actor::new(1, Vec2::new(1000.0, 1000.0), 0.0, 0);
        actor.set_input(PlayerInput::toward(Vec2::new(1000.0, 2000.0)), &arena());
        actor.update(DT, 1.0, &ctx(15));
        assert!(actor.was_turning());
        assert!(!actor.is_bursting(15));

        let ahead = actor.position() + Vec2::from_angle(actor.heading()) * 400.0;
        actor.set_input(PlayerInput::toward(ahead), &arena());
        actor.update(DT, 1.0, &ctx(30));
        assert!(!actor.was_turning());
        assert_eq!(actor.burst_until(), Some(30 + TUNING.burst.duration_ms));
        assert!(actor.is_bursting(31));
        assert!(!actor.is_bursting(30 + TUNING.burst.duration_ms));
    }

    #[test]
    fn test_boost_drains_energy_and_starts_cooldown() {
        let mut actor = Actor::new(1, Vec2::new(1000.0, 1000.0), 0.0, 0);
        assert!(actor.try_activate_boost(0));
        assert!(actor.is_boosting(1));
        assert!(!actor.can_boost(1));
        assert!(!actor.try_activate_boost(15));

        run(&mut actor, 0, 10);
        assert!(actor.boost_energy() < TUNING.boost.energy_max);

        let after = run(&mut actor, 150, 200);
        assert!(!actor.is_boosting(after));
        assert!(actor.can_boost(after));
    }

    #[test]
    fn test_boost_refused_when_energy_low() {
        let mut actor = Actor::new(1, Vec2::new(1000.0, 1000.0), 0.0, 0);
        actor.boost_energy = TUNING.boost.min_start_energy - 1.0;
        assert!(!actor.try_activate_boost(0));
    }

    #[test]
    fn test_boosted_trail_lives_longer() {
        let mut actor = Actor::new(1, Vec2::new(1000.0, 1000.0), 0.0, 0);
        let now = run(&mut actor, 0, 60);
        let plain = *actor.trail().back().unwrap();
        assert_eq!(plain.expires_ms - plain.created_ms, TUNING.trail.base_lifetime_ms);

        actor.set_input(
            PlayerInput {
                boost: true,
                ..PlayerInput::toward(actor.position() + Vec2::new(500.0, 0.0))
            },
            &arena(),
        );
        run(&mut actor, now, 4);
        let boosted = *actor.trail().back().unwrap();
        assert_eq!(
            boosted.expires_ms - boosted.created_ms,
            TUNING.trail.base_lifetime_ms + TUNING.boost.trail_lifetime_bonus_ms
        );
    }

    #[test]
    fn test_wall_reflects_and_clamps() {
        let mut actor = Actor::new(1, Vec2::new(5.0, 1000.0), 0.0, 0);
        actor.place(Vec2::new(5.0, 1000.0), Vec2::new(-400.0, 0.0), std::f32::consts::PI);
        actor.update(DT, 1.0, &ctx(15));
        assert_eq!(actor.position().x, 0.0);
        assert!(actor.velocity().x > 0.0);
        assert_eq!(actor.last_bounce_ms(), Some(15));
        assert!(arena().contains(actor.position()));
    }

    #[test]
    fn test_trail_waits_for_spawn_delay_then_emits_on_cadence() {
        let mut actor = Actor::new(1, Vec2::new(1000.0, 1000.0), 0.0, 0);
        let now = run(&mut actor, 0, 50);
        assert!(now < TUNING.trail.spawn_emit_delay_ms);
        assert!(actor.trail().is_empty());

        run(&mut actor, now, 60);
        let trail = actor.trail();
        assert!(trail.len() >= 15);
        for pair in trail.iter().zip(trail.iter().skip(1)) {
            assert!(pair.0.created_ms < pair.1.created_ms);
            assert_eq!(pair.0.ordinal + 1, pair.1.ordinal);
        }
    }

    #[test]
    fn test_non_finite_target_is_sanitized() {
        let mut actor = Actor::new(1, Vec2::new(1000.0, 1000.0), 0.0, 0);
        actor.set_input(PlayerInput::toward(Vec2::new(f32::NAN, f32::INFINITY)), &arena());
        assert!(actor.input().target.is_finite());
        actor.set_input(PlayerInput::toward(Vec2::new(1.0e9, -1.0e9)), &arena());
        let target = actor.input().target;
        assert_eq!(target.x, TUNING.world.width + TUNING.world.target_overshoot);
        assert_eq!(target.y, -TUNING.world.target_overshoot);

        run(&mut actor, 0, 10);
        assert!(actor.position().is_finite());
        assert!(actor.heading().is_finite());
    }

    #[test]
    fn test_trail_fades_after_elimination() {
        let mut actor = Actor::new(1, Vec2::new(1000.0, 1000.0), 0.0, 0);
        let now = run(&mut actor, 0, 100);
        assert!(!actor.trail().is_empty());

        actor.eliminate(now);
        assert!(!actor.is_alive());
        let later = run(&mut actor, now, 10);
        assert!(!actor.trail().is_empty());

        run(&mut actor, later, TUNING.trail.fade_out_ms / 15 + 1);
        assert!(actor.trail().is_empty());
    }

    #[test]
    fn test_drag_is_step_size_independent() {
        let mut coarse = Actor::new(1, Vec2::new(1000.0, 1000.0), 0.0, 0);
        let mut fine = coarse.clone();
        let coasting = PlayerInput {
            accelerate: false,
            ..PlayerInput::toward(Vec2::new(3000.0, 1000.0))
        };
        coarse.set_input(coasting, &arena());
        fine.set_input(coasting, &arena());
        coarse.place(Vec2::new(1000.0, 1000.0), Vec2::new(300.0, 0.0), 0.0);
        fine.place(Vec2::new(1000.0, 1000.0), Vec2::new(300.0, 0.0), 0.0);

        coarse.update(DT * 2.0, 1.0, &ctx(30));
        fine.update(DT, 1.0, &ctx(15));
        fine.update(DT, 1.0, &ctx(30));
        assert_approx_eq!(coarse.velocity().x, fine.velocity().x, 1e-2);
    }

    #[test]
    fn test_lifetime_shrinks_with_arena() {
        assert_eq!(trail_lifetime_ms(1.0), TUNING.trail.base_lifetime_ms);
        assert_eq!(trail_lifetime_ms(TUNING.world.final_scale), TUNING.trail.final_lifetime_ms);
        let mid = trail_lifetime_ms(0.75);
        assert!(mid < TUNING.trail.base_lifetime_ms && mid > TUNING.trail.final_lifetime_ms);
    }

    #[test]
    fn test_state_reports_trail_delta() {
        let mut actor = Actor::new(3, Vec2::new(1000.0, 1000.0), 0.0, 0);
        let mut now = 0;
        let mut emitted = 0;
        for _ in 0..120 {
            now += 15;
            actor.update(DT, 1.0, &ctx(now));
            let state = actor.state(now);
            assert!(state.trail_added.len() <= 1);
            emitted += state.trail_added.len() as u64;
        }
        assert_eq!(emitted, actor.next_ordinal());
        assert_eq!(actor.state(now).trail_head, Some(0));
    }
}
