use shared::ActorId;
use thiserror::Error;

/// Failures surfaced to the caller of the simulation.
///
/// Steady-state ticks never produce one of these; they only come out of
/// construction, roster changes and round lifecycle calls.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimError {
    #[error("cannot start a round without actors")]
    NoActors,
    #[error("a round is already in progress")]
    RoundInProgress,
    #[error("the previous round is over, stop it before starting another")]
    RoundFinished,
    #[error("actor {0} is already in the roster")]
    DuplicateActor(ActorId),
    #[error("actor {0} is not in the roster")]
    UnknownActor(ActorId),
    #[error("roster is full ({0} actors)")]
    RosterFull(usize),
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

pub type SimResult<T> = Result<T, SimError>;
