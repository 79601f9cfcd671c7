use crate::actor::{Actor, StepContext};
use crate::bot::{BotController, Opponent, Sense};
use crate::clock::FixedTimestep;
use crate::collision::{CollisionIndex, TrailHit};
use crate::config::SimConfig;
use crate::error::{SimError, SimResult};
use crate::history::HistoryBuffer;
use crate::latency::{HitVerdict, LatencyCompensator};
use crate::pool::Pool;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{
    ActorId, Bounds, EliminationCause, EliminationEvent, Packet, PlayerInput, RoundOutcome,
    TickResult, Vec2, TUNING,
};
use std::collections::BTreeMap;
use std::time::Duration;

/// Distance kept between a random spawn and the arena walls.
const SPAWN_WALL_MARGIN: f32 = 200.0;
/// Preferred spacing between a random spawn and any living actor.
const SPAWN_SPACING: f32 = 300.0;
const SPAWN_ATTEMPTS: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// Roster is being assembled, nothing integrates
    Lobby,
    Running,
    /// A winner or a draw was decided, nothing integrates
    Finished,
}

/// The authoritative simulation.
///
/// Owns the roster and every per-tick component. Callers feed it inputs and
/// elapsed time and get value copies of each tick back.
#[derive(Debug)]
pub struct Simulation {
    config: SimConfig,
    world: Bounds,
    arena: Bounds,
    phase: RoundPhase,
    tick: u64,
    now_ms: u64,
    round_started_ms: u64,
    clock: FixedTimestep,
    actors: BTreeMap<ActorId, Actor>,
    pending_inputs: BTreeMap<ActorId, PlayerInput>,
    bots: BTreeMap<ActorId, BotController>,
    collectibles: Vec<Vec2>,
    collisions: CollisionIndex,
    history: HistoryBuffer,
    latency: LatencyCompensator,
    opponent_buffers: Pool<Vec<Opponent>>,
    rng: StdRng,
    outcome: Option<RoundOutcome>,
}

impl Simulation {
    pub fn new(config: SimConfig) -> SimResult<Self> {
        config.validate()?;
        let world = Bounds::from_size(config.world_width, config.world_height);
        Ok(Self {
            world,
            arena: world,
            phase: RoundPhase::Lobby,
            tick: 0,
            now_ms: 0,
            round_started_ms: 0,
            clock: FixedTimestep::from_millis(config.tick_interval_ms),
            actors: BTreeMap::new(),
            pending_inputs: BTreeMap::new(),
            bots: BTreeMap::new(),
            collectibles: Vec::new(),
            collisions: CollisionIndex::new(&world),
            history: HistoryBuffer::new(
                config.history_retention_ms,
                config.tick_interval_ms,
                config.history_margin,
                config.pool_capacity,
            ),
            latency: LatencyCompensator::new(config.history_retention_ms),
            opponent_buffers: Pool::of_vecs(config.pool_capacity.min(4).max(1)),
            rng: StdRng::seed_from_u64(config.seed),
            outcome: None,
            config,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Current playable area, shrinking as the round goes on.
    pub fn arena(&self) -> Bounds {
        self.arena
    }

    pub fn outcome(&self) -> Option<RoundOutcome> {
        self.outcome
    }

    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.actors.get(&id)
    }

    /// Direct access to an actor, for tooling and scripted scenarios.
    pub fn actor_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        self.actors.get_mut(&id)
    }

    pub fn actors(&self) -> impl Iterator<Item = &Actor> {
        self.actors.values()
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    pub fn alive_count(&self) -> usize {
        self.actors.values().filter(|a| a.is_alive()).count()
    }

    pub fn bot(&self, id: ActorId) -> Option<&BotController> {
        self.bots.get(&id)
    }

    pub fn is_bot(&self, id: ActorId) -> bool {
        self.bots.contains_key(&id)
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    pub fn latency(&self) -> &LatencyCompensator {
        &self.latency
    }

    pub fn latency_mut(&mut self) -> &mut LatencyCompensator {
        &mut self.latency
    }

    pub fn collisions(&self) -> &CollisionIndex {
        &self.collisions
    }

    pub fn add_actor(&mut self, id: ActorId, spawn: Vec2) -> SimResult<()> {
        if self.actors.contains_key(&id) {
            return Err(SimError::DuplicateActor(id));
        }
        if self.actors.len() >= self.config.max_actors {
            return Err(SimError::RosterFull(self.config.max_actors));
        }

        let spawn = if spawn.is_finite() {
            self.arena.clamp(spawn, 0.0)
        } else {
            self.arena.center()
        };
        let to_center = self.arena.center() - spawn;
        let heading = if to_center.magnitude_squared() > 1e-6 {
            to_center.angle()
        } else {
            0.0
        };

        self.actors.insert(id, Actor::new(id, spawn, heading, self.now_ms));
        self.latency.add_actor(id);
        info!("Added actor {} at ({:.1}, {:.1})", id, spawn.x, spawn.y);
        Ok(())
    }

    /// Adds an actor driven by a bot controller with a seeded skill roll.
    pub fn add_bot(&mut self, id: ActorId, spawn: Vec2) -> SimResult<()> {
        self.add_actor(id, spawn)?;
        let bot = BotController::new(&mut self.rng);
        info!("Actor {} is a bot with skill {:.2}", id, bot.skill());
        self.bots.insert(id, bot);
        Ok(())
    }

    /// A spawn point away from the walls and, when possible, from other actors.
    pub fn random_spawn(&mut self) -> Vec2 {
        let margin = SPAWN_WALL_MARGIN
            .min(self.arena.width() / 4.0)
            .min(self.arena.height() / 4.0);
        let mut candidate = self.arena.center();
        for _ in 0..SPAWN_ATTEMPTS {
            candidate = Vec2::new(
                self.rng
                    .gen_range(self.arena.min.x + margin..=self.arena.max.x - margin),
                self.rng
                    .gen_range(self.arena.min.y + margin..=self.arena.max.y - margin),
            );
            let crowded = self
                .actors
                .values()
                .filter(|a| a.is_alive())
                .any(|a| a.position().distance(candidate) < SPAWN_SPACING);
            if !crowded {
                break;
            }
        }
        candidate
    }

    pub fn remove_actor(&mut self, id: ActorId) -> SimResult<()> {
        if self.actors.remove(&id).is_none() {
            return Err(SimError::UnknownActor(id));
        }
        self.pending_inputs.remove(&id);
        self.bots.remove(&id);
        self.latency.remove_actor(id);
        info!("Removed actor {}", id);
        Ok(())
    }

    /// Queues input for the next tick, replacing anything not yet consumed.
    pub fn set_input(&mut self, id: ActorId, input: PlayerInput) -> bool {
        if !self.actors.contains_key(&id) {
            debug!("Dropping input for unknown actor {}", id);
            return false;
        }
        self.pending_inputs.insert(id, input);
        true
    }

    pub fn set_collectibles(&mut self, points: Vec<Vec2>) {
        self.collectibles = points;
    }

    /// Folds a client echo of a server timestamp into that actor's RTT.
    pub fn record_round_trip(&mut self, id: ActorId, echo_ms: u64) -> Option<f32> {
        if !self.actors.contains_key(&id) {
            return None;
        }
        Some(self.latency.record_round_trip(id, echo_ms, self.now_ms))
    }

    /// Applies a packet received from a participant. Returns false when it
    /// was ignored.
    pub fn handle_packet(&mut self, packet: Packet) -> bool {
        match packet {
            Packet::Input {
                actor_id,
                input,
                echo_ms,
            } => {
                if !self.set_input(actor_id, input) {
                    return false;
                }
                // Zero means the client has not seen a tick yet
                if echo_ms > 0 {
                    self.record_round_trip(actor_id, echo_ms);
                }
                true
            }
            Packet::Pong { actor_id, ping_id } => self.process_pong(actor_id, ping_id).is_some(),
            Packet::Ping { .. } | Packet::Tuning(_) | Packet::Tick(_) => {
                debug!("Ignoring server-bound copy of an outbound packet");
                false
            }
        }
    }

    pub fn process_pong(&mut self, id: ActorId, ping_id: u32) -> Option<f32> {
        if !self.actors.contains_key(&id) {
            return None;
        }
        self.latency.process_pong(id, ping_id, self.now_ms)
    }

    /// Drops pings that never came back and starts new ones for every human
    /// actor that is due.
    pub fn issue_pings(&mut self) -> Vec<(ActorId, Packet)> {
        let now = self.now_ms;
        let expired = self.latency.expire_pings(now);
        if expired > 0 {
            debug!("{} pings timed out", expired);
        }
        let mut pings = Vec::new();
        for id in self.latency.due_for_ping(now) {
            if self.bots.contains_key(&id) {
                continue;
            }
            if let Some(ping_id) = self.latency.issue_ping(id, now) {
                pings.push((id, Packet::Ping { ping_id, server_ms: now }));
            }
        }
        pings
    }

    pub fn start_round(&mut self) -> SimResult<()> {
        match self.phase {
            RoundPhase::Running => return Err(SimError::RoundInProgress),
            RoundPhase::Finished => return Err(SimError::RoundFinished),
            RoundPhase::Lobby => {}
        }
        if self.actors.is_empty() {
            return Err(SimError::NoActors);
        }
        self.phase = RoundPhase::Running;
        self.round_started_ms = self.now_ms;
        self.outcome = None;
        self.clock.reset();
        info!(
            "Round started with {} actors ({} bots)",
            self.actors.len(),
            self.bots.len()
        );
        Ok(())
    }

    /// Ends the round and tears down all per-round state.
    pub fn stop_round(&mut self) {
        self.history.clear();
        self.history.release();
        self.opponent_buffers.clear();
        self.pending_inputs.clear();
        self.bots.clear();
        self.actors.clear();
        self.latency.clear();
        self.collectibles.clear();
        self.clock.reset();
        self.phase = RoundPhase::Lobby;
        self.outcome = None;
        self.tick = 0;
        self.now_ms = 0;
        self.round_started_ms = 0;
        self.arena = self.world;
        info!("Round stopped");
    }

    /// Feeds wall-clock time in and runs every whole tick that is due.
    pub fn advance(&mut self, elapsed: Duration) -> Vec<TickResult> {
        if self.phase != RoundPhase::Running {
            return Vec::new();
        }
        let due = self.clock.accumulate(elapsed);
        let mut results = Vec::with_capacity(due as usize);
        for _ in 0..due {
            results.push(self.step());
            if self.phase != RoundPhase::Running {
                self.clock.reset();
                break;
            }
        }
        results
    }

    /// Runs exactly one tick. Outside a running round nothing moves and the
    /// current state is returned as is.
    pub fn step(&mut self) -> TickResult {
        if self.phase != RoundPhase::Running {
            // No tick ran, so nothing new was laid down
            let mut result = self.tick_result(Vec::new());
            for actor in &mut result.actors {
                actor.trail_added.clear();
            }
            return result;
        }

        self.tick += 1;
        self.now_ms += self.config.tick_interval_ms;
        let now = self.now_ms;
        let dt = self.config.tick_secs();

        while let Some((id, input)) = self.pending_inputs.pop_first() {
            if let Some(actor) = self.actors.get_mut(&id) {
                actor.set_input(input, &self.arena);
            }
        }

        let shrink_factor = self.shrink_factor(now);
        self.arena = self.world.scaled(
            shrink_factor,
            TUNING.world.min_width.min(self.world.width()),
            TUNING.world.min_height.min(self.world.height()),
        );
        let ctx = StepContext {
            now_ms: now,
            bounds: self.arena,
            shrink_factor,
            reference_dt: TUNING.tick.interval_secs(),
        };
        for actor in self.actors.values_mut() {
            actor.update(dt, self.config.speed_multiplier, &ctx);
        }

        self.collisions.separate_bodies(&mut self.actors, &self.arena);
        let hits = self.collisions.resolve(&self.actors, now);
        let eliminations = self.validate_hits(hits, now);
        for event in &eliminations {
            if let Some(actor) = self.actors.get_mut(&event.victim) {
                actor.eliminate(now);
            }
            match event.eliminator {
                Some(by) => info!("Actor {} eliminated by actor {} at tick {}", event.victim, by, self.tick),
                None => info!("Actor {} ran into its own trail at tick {}", event.victim, self.tick),
            }
        }

        self.history.record(now, &self.actors);
        self.drive_bots(dt, now);

        self.outcome = self.decide_outcome();
        if let Some(outcome) = self.outcome {
            self.phase = RoundPhase::Finished;
            info!("Round finished at tick {}: {:?}", self.tick, outcome);
        }

        self.tick_result(eliminations)
    }

    /// Drops borderline hits on laggy humans that their own view did not show.
    fn validate_hits(&self, hits: Vec<TrailHit>, now: u64) -> Vec<EliminationEvent> {
        hits.into_iter()
            .filter(|hit| {
                if self.bots.contains_key(&hit.victim) {
                    return true;
                }
                match self.latency.confirm_hit(hit, &self.history, now) {
                    HitVerdict::Confirmed => true,
                    HitVerdict::Excused => {
                        debug!(
                            "Excused borderline hit on actor {} by trail of {}",
                            hit.victim, hit.owner
                        );
                        false
                    }
                }
            })
            .map(|hit| EliminationEvent {
                victim: hit.victim,
                eliminator: (!hit.is_self_hit()).then_some(hit.owner),
                cause: EliminationCause::Trail {
                    owner: hit.owner,
                    ordinal: hit.ordinal,
                },
                position: hit.point,
            })
            .collect()
    }

    /// Computes every bot's input for the next tick.
    fn drive_bots(&mut self, dt: f32, now: u64) {
        let mut opponents = self.opponent_buffers.acquire();
        for (id, bot) in self.bots.iter_mut() {
            let Some(actor) = self.actors.get(id).filter(|a| a.is_alive()) else {
                continue;
            };
            opponents.clear();
            opponents.extend(
                self.actors
                    .values()
                    .filter(|other| other.is_alive() && other.id() != *id)
                    .map(|other| Opponent {
                        id: other.id(),
                        position: other.position(),
                        velocity: other.velocity(),
                    }),
            );
            let sense = Sense {
                bounds: self.arena,
                opponents: &opponents,
                collectibles: &self.collectibles,
                hazards: &self.collisions,
            };
            let input = bot.update(actor, &sense, dt, now);
            self.pending_inputs.insert(*id, input);
        }
        self.opponent_buffers.release(opponents);
    }

    fn decide_outcome(&self) -> Option<RoundOutcome> {
        let mut alive = self.actors.values().filter(|a| a.is_alive());
        match (alive.next(), alive.next()) {
            (None, _) => Some(RoundOutcome::Draw),
            (Some(last), None) if self.actors.len() > 1 => Some(RoundOutcome::Winner(last.id())),
            _ => None,
        }
    }

    /// 1.0 until the shrink starts, then linearly down to the final scale.
    fn shrink_factor(&self, now: u64) -> f32 {
        if !self.config.shrink_enabled {
            return 1.0;
        }
        let world = &TUNING.world;
        let elapsed = now.saturating_sub(self.round_started_ms) as f32 / 1000.0;
        if elapsed <= world.shrink_start_secs {
            return 1.0;
        }
        let progress = ((elapsed - world.shrink_start_secs) / world.shrink_duration_secs).min(1.0);
        1.0 - (1.0 - world.final_scale) * progress
    }

    fn tick_result(&self, eliminations: Vec<EliminationEvent>) -> TickResult {
        TickResult {
            tick: self.tick,
            timestamp_ms: self.now_ms,
            arena: self.arena,
            actors: self.actors.values().map(|a| a.state(self.now_ms)).collect(),
            eliminations,
            outcome: self.outcome,
        }
    }
}
