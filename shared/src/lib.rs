//! Types shared between the authoritative simulation and the network
//! boundary: the tuning table, arena math, player input and the per-tick
//! public state that gets broadcast to clients.

pub mod constants;
pub mod math;

pub use constants::{Tuning, TUNING, TUNING_VERSION};
pub use math::{lerp_angle, wrap_angle, Bounds, Vec2};

use serde::{Deserialize, Serialize};

/// Identifier of a participant, human or bot.
pub type ActorId = u32;

/// Latest steering intent for one actor. Only the most recent value counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerInput {
    /// Point in arena space the actor steers toward
    pub target: Vec2,
    pub accelerate: bool,
    pub boost: bool,
    pub drift: bool,
}

impl PlayerInput {
    /// Input that keeps thrusting toward `target`.
    pub fn toward(target: Vec2) -> Self {
        Self {
            target,
            accelerate: true,
            boost: false,
            drift: false,
        }
    }
}

/// A trail point as seen by remote peers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailPointState {
    pub ordinal: u64,
    pub position: Vec2,
    pub created_ms: u64,
    pub expires_ms: u64,
}

/// Public per-tick state of one actor.
///
/// Trail data is sent as a delta: the points appended this tick plus the
/// ordinal of the oldest point still alive. Everything older than
/// `trail_head` can be dropped by the receiver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorState {
    pub id: ActorId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub heading: f32,
    pub alive: bool,
    pub boosting: bool,
    pub boost_energy: f32,
    pub trail_added: Vec<TrailPointState>,
    pub trail_head: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EliminationCause {
    /// Ran into a trail point. `owner == victim` for a self-collision.
    Trail { owner: ActorId, ordinal: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EliminationEvent {
    pub victim: ActorId,
    /// Credited actor, `None` for self-eliminations
    pub eliminator: Option<ActorId>,
    pub cause: EliminationCause,
    pub position: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundOutcome {
    Winner(ActorId),
    Draw,
}

/// Everything the simulation produces for one tick, copied by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickResult {
    pub tick: u64,
    pub timestamp_ms: u64,
    pub arena: Bounds,
    pub actors: Vec<ActorState>,
    pub eliminations: Vec<EliminationEvent>,
    pub outcome: Option<RoundOutcome>,
}

impl TickResult {
    pub fn eliminated_ids(&self) -> Vec<ActorId> {
        self.eliminations.iter().map(|e| e.victim).collect()
    }

    pub fn actor(&self, id: ActorId) -> Option<&ActorState> {
        self.actors.iter().find(|a| a.id == id)
    }
}

/// Messages crossing the simulation boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Packet {
    Input {
        actor_id: ActorId,
        input: PlayerInput,
        /// Echo of the last server timestamp the client saw, for RTT
        echo_ms: u64,
    },
    Ping {
        ping_id: u32,
        server_ms: u64,
    },
    Pong {
        actor_id: ActorId,
        ping_id: u32,
    },
    Tuning(Tuning),
    Tick(TickResult),
}

impl Packet {
    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Packet, bincode::Error> {
        bincode::deserialize(bytes)
    }
}
