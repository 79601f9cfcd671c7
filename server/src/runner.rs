//! Drives a [`Simulation`] from a tokio interval until the round ends.
//!
//! Wall-clock time between interval ticks is fed into
//! [`Simulation::advance`], so late wakeups produce catch-up ticks instead
//! of longer steps. Every tick result is encoded as a broadcast packet to
//! keep an eye on the per-tick payload size.

use crate::error::SimResult;
use crate::game::{RoundPhase, Simulation};
use log::{debug, info, warn};
use shared::{EliminationEvent, Packet, RoundOutcome, TickResult};
use std::future::Future;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};

#[derive(Debug, Clone, PartialEq)]
pub struct MatchOptions {
    /// Simulated time after which the match is cut off
    pub duration: Option<Duration>,
    /// Pace ticks against the wall clock. When false, ticks run back to back.
    pub realtime: bool,
    /// Emit a stats line every this many ticks, 0 disables it
    pub stats_every_ticks: u64,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            duration: None,
            realtime: true,
            stats_every_ticks: 200,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    RoundOver,
    Deadline,
    Interrupted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchSummary {
    pub ticks: u64,
    pub sim_ms: u64,
    pub outcome: Option<RoundOutcome>,
    pub eliminations: Vec<EliminationEvent>,
    pub largest_packet_bytes: usize,
    pub total_packet_bytes: usize,
    pub pings_sent: usize,
    pub stop_reason: StopReason,
}

impl MatchSummary {
    pub fn average_packet_bytes(&self) -> f64 {
        if self.ticks == 0 {
            return 0.0;
        }
        self.total_packet_bytes as f64 / self.ticks as f64
    }
}

/// Starts the round if needed and runs it until it is decided, the deadline
/// passes or `shutdown` resolves.
pub async fn run_match<F>(
    sim: &mut Simulation,
    options: &MatchOptions,
    shutdown: F,
) -> SimResult<MatchSummary>
where
    F: Future<Output = ()>,
{
    if sim.phase() != RoundPhase::Running {
        sim.start_round()?;
    }

    let tick_length = Duration::from_millis(sim.config().tick_interval_ms);
    let deadline_ms = options.duration.map(|d| d.as_millis() as u64);
    let mut summary = MatchSummary {
        ticks: 0,
        sim_ms: sim.now_ms(),
        outcome: None,
        eliminations: Vec::new(),
        largest_packet_bytes: 0,
        total_packet_bytes: 0,
        pings_sent: 0,
        stop_reason: StopReason::RoundOver,
    };

    let mut ticker = interval(tick_length);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Skip the first tick since it fires immediately
    ticker.tick().await;
    let mut last_update = Instant::now();

    tokio::pin!(shutdown);

    loop {
        let elapsed = if options.realtime {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = &mut shutdown => {
                    summary.stop_reason = StopReason::Interrupted;
                    break;
                }
            }
            let now = Instant::now();
            let elapsed = now - last_update;
            last_update = now;
            elapsed
        } else {
            tokio::task::yield_now().await;
            tick_length
        };

        for result in sim.advance(elapsed) {
            record_tick(&mut summary, &result);
            if options.stats_every_ticks > 0 && result.tick % options.stats_every_ticks == 0 {
                log_stats(sim, &summary);
            }
        }
        summary.sim_ms = sim.now_ms();
        for (to, ping) in sim.issue_pings() {
            if let Packet::Ping { ping_id, .. } = ping {
                debug!("Ping {} due for actor {}", ping_id, to);
            }
            summary.pings_sent += 1;
        }

        if sim.phase() == RoundPhase::Finished {
            summary.outcome = sim.outcome();
            summary.stop_reason = StopReason::RoundOver;
            break;
        }
        if deadline_ms.map_or(false, |deadline| sim.now_ms() >= deadline) {
            summary.stop_reason = StopReason::Deadline;
            break;
        }
    }

    info!(
        "Match ended after {} ticks ({} ms simulated): {:?}, outcome {:?}",
        summary.ticks, summary.sim_ms, summary.stop_reason, summary.outcome
    );
    info!(
        "Tick packets: {:.0} bytes average, {} bytes largest",
        summary.average_packet_bytes(),
        summary.largest_packet_bytes
    );
    Ok(summary)
}

fn record_tick(summary: &mut MatchSummary, result: &TickResult) {
    summary.ticks += 1;
    summary.eliminations.extend(result.eliminations.iter().copied());

    match Packet::Tick(result.clone()).encode() {
        Ok(bytes) => {
            summary.largest_packet_bytes = summary.largest_packet_bytes.max(bytes.len());
            summary.total_packet_bytes += bytes.len();
        }
        Err(e) => warn!("Failed to encode tick {}: {}", result.tick, e),
    }
}

fn log_stats(sim: &Simulation, summary: &MatchSummary) {
    let history = sim.history();
    let pool = history.pool_stats();
    info!(
        "Tick {}: {} of {} alive, {} trail points indexed",
        sim.tick(),
        sim.alive_count(),
        sim.actor_count(),
        sim.collisions().indexed_points()
    );
    debug!(
        "History {} snapshots ({} bytes), pool reused {} created {} dropped {}, largest packet {} bytes",
        history.len(),
        history.memory_usage_bytes(),
        pool.reused,
        pool.created,
        pool.dropped,
        summary.largest_packet_bytes
    );
}
