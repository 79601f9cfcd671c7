//! # Trail Arena Server Library
//!
//! Authoritative simulation core for a top-down arena where every actor drags
//! a fading trail behind it and touching anyone's trail is fatal. The crate
//! owns the canonical state of a round: it integrates actors on a fixed
//! timestep, finds trail contacts, arbitrates borderline hits with latency
//! compensation and drives bot-controlled actors.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Every tick consumes the latest input per actor, steps movement, resolves
//! body and trail contacts, records a history snapshot and decides the round
//! outcome. Results are handed out as value copies so callers never hold
//! references into live state.
//!
//! ### Fairness Under Latency
//! A bounded history of past positions lets the server rewind to the moment a
//! lagging client actually saw the world. Hits that were only grazes from that
//! viewpoint are excused.
//!
//! ### Bots
//! Bot actors sense the arena through the same collision index the server
//! uses for hit detection and produce ordinary inputs for the next tick.
//!
//! ## Module Organization
//!
//! ### Actor Module (`actor`)
//! Movement model, boost and burst mechanics, trail emission and expiry.
//!
//! ### Collision Module (`collision`)
//! Uniform grid over all live trail points, trail hit resolution with
//! deterministic attribution, and body separation.
//!
//! ### History and Latency Modules (`history`, `latency`)
//! - Fixed-capacity ring of position snapshots with interpolation
//! - Smoothed RTT and jitter per actor, ping bookkeeping
//! - Rewound confirmation of borderline hits
//!
//! ### Bot Module (`bot`)
//! Search, hunt and panic states with eased aiming.
//!
//! ### Game and Runner Modules (`game`, `runner`)
//! The `Simulation` orchestrator and an async loop that paces it against the
//! wall clock.
//!
//! ### Support Modules
//! `clock` for fixed-step accumulation, `pool` for buffer reuse, `config` and
//! `error` for setup and failure reporting.
//!
//! ## Determinism
//!
//! The roster is kept in id order and all randomness flows from a seeded
//! generator, so two simulations built from the same configuration and fed
//! the same inputs produce identical tick results regardless of how the
//! elapsed time was chunked.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::SimConfig;
//! use server::game::Simulation;
//! use server::runner::{run_match, MatchOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut sim = Simulation::new(SimConfig::default())?;
//!     for id in 0..4 {
//!         let spawn = sim.random_spawn();
//!         sim.add_bot(id, spawn)?;
//!     }
//!
//!     let shutdown = async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     };
//!     let summary = run_match(&mut sim, &MatchOptions::default(), shutdown).await?;
//!     println!("{:?}", summary.outcome);
//!     Ok(())
//! }
//! ```

pub mod actor;
pub mod bot;
pub mod clock;
pub mod collision;
pub mod config;
pub mod error;
pub mod game;
pub mod history;
pub mod latency;
pub mod pool;
pub mod runner;

pub use config::SimConfig;
pub use error::{SimError, SimResult};
pub use game::{RoundPhase, Simulation};
