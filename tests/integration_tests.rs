//! Integration tests for the trail arena simulation
//!
//! These tests drive whole rounds through the public `Simulation` API and
//! check cross-component behavior: trail kills, determinism, teardown and the
//! async match runner.

use server::config::SimConfig;
use server::error::SimError;
use server::game::{RoundPhase, Simulation};
use server::runner::{run_match, MatchOptions, StopReason};
use shared::{EliminationCause, Packet, PlayerInput, RoundOutcome, TickResult, Vec2};
use std::f32::consts::FRAC_PI_2;
use std::time::Duration;

fn steady_config() -> SimConfig {
    SimConfig {
        shrink_enabled: false,
        ..SimConfig::default()
    }
}

/// Two humans flying parallel lines far apart, nobody can die for a while.
fn parallel_flyers() -> Simulation {
    let mut sim = Simulation::new(steady_config()).unwrap();
    sim.add_actor(1, Vec2::new(500.0, 500.0)).unwrap();
    sim.add_actor(2, Vec2::new(500.0, 2000.0)).unwrap();
    sim.set_input(1, PlayerInput::toward(Vec2::new(3400.0, 500.0)));
    sim.set_input(2, PlayerInput::toward(Vec2::new(3400.0, 2000.0)));
    sim.start_round().unwrap();
    sim
}

fn bot_match(seed: u64) -> Simulation {
    let mut sim = Simulation::new(SimConfig {
        seed,
        ..SimConfig::default()
    })
    .unwrap();
    for id in 0..4 {
        let spawn = sim.random_spawn();
        sim.add_bot(id, spawn).unwrap();
    }
    sim.start_round().unwrap();
    sim
}

/// ROUND LIFECYCLE TESTS
mod lifecycle_tests {
    use super::*;

    /// Crossing another actor's trail eliminates the crosser and credits the owner
    #[test]
    fn trail_contact_eliminates_actor() {
        let mut sim = Simulation::new(steady_config()).unwrap();
        sim.add_actor(1, Vec2::new(600.0, 1250.0)).unwrap();
        sim.add_actor(2, Vec2::new(1500.0, 2200.0)).unwrap();
        sim.add_actor(3, Vec2::new(3000.0, 400.0)).unwrap();
        sim.set_input(1, PlayerInput::toward(Vec2::new(3400.0, 1250.0)));
        sim.set_input(3, PlayerInput::toward(Vec2::new(200.0, 400.0)));
        sim.start_round().unwrap();

        // Let actor 1 lay down a straight trail
        let results = sim.advance(Duration::from_millis(1500));
        assert_eq!(results.len(), 100);
        assert!(results.iter().all(|r| r.eliminations.is_empty()));
        let trail = sim.actor(1).unwrap().trail();
        assert!(trail.len() > 5);
        let mark = trail[2].position;

        // Drop actor 2 just above that point, heading straight through it
        sim.actor_mut(2)
            .unwrap()
            .place(mark + Vec2::new(0.0, -60.0), Vec2::new(0.0, 200.0), FRAC_PI_2);
        sim.set_input(2, PlayerInput::toward(mark + Vec2::new(0.0, 500.0)));

        let mut kill_tick = None;
        for _ in 0..60 {
            let result = sim.step();
            if let Some(event) = result.eliminations.iter().find(|e| e.victim == 2) {
                assert_eq!(event.eliminator, Some(1));
                assert!(matches!(event.cause, EliminationCause::Trail { owner: 1, .. }));
                assert!(!result.actor(2).unwrap().alive);
                kill_tick = Some(result.tick);
                break;
            }
        }
        let kill_tick = kill_tick.expect("actor 2 never touched the trail");

        let next = sim.step();
        assert_eq!(next.tick, kill_tick + 1);
        assert!(!next.actor(2).unwrap().alive);
        assert!(next.actor(1).unwrap().alive);
        assert!(next.eliminations.iter().all(|e| e.victim != 2));
        assert_eq!(sim.phase(), RoundPhase::Running);
    }

    /// The last actor standing wins and ticking stops
    #[test]
    fn last_survivor_wins() {
        let mut sim = Simulation::new(steady_config()).unwrap();
        sim.add_actor(1, Vec2::new(600.0, 1250.0)).unwrap();
        sim.add_actor(2, Vec2::new(1500.0, 2200.0)).unwrap();
        sim.set_input(1, PlayerInput::toward(Vec2::new(3400.0, 1250.0)));
        sim.start_round().unwrap();
        sim.advance(Duration::from_millis(1500));

        let mark = sim.actor(1).unwrap().trail()[2].position;
        sim.actor_mut(2)
            .unwrap()
            .place(mark + Vec2::new(0.0, -60.0), Vec2::new(0.0, 200.0), FRAC_PI_2);
        sim.set_input(2, PlayerInput::toward(mark + Vec2::new(0.0, 500.0)));

        let results = sim.advance(Duration::from_millis(900));
        let last = results.last().unwrap();
        assert_eq!(last.outcome, Some(RoundOutcome::Winner(1)));
        assert_eq!(sim.phase(), RoundPhase::Finished);
        assert!(results.len() < 60);

        let tick = sim.tick();
        assert!(sim.advance(Duration::from_secs(1)).is_empty());
        assert_eq!(sim.tick(), tick);
    }

    /// Starting without actors is refused
    #[test]
    fn empty_round_cannot_start() {
        let mut sim = Simulation::new(SimConfig::default()).unwrap();
        assert_eq!(sim.start_round(), Err(SimError::NoActors));
    }

    /// Stopping a round drops history, pools and the roster
    #[test]
    fn stop_round_releases_state() {
        let mut sim = bot_match(11);
        sim.advance(Duration::from_secs(2));
        assert!(sim.history().len() > 0);

        sim.stop_round();
        assert_eq!(sim.phase(), RoundPhase::Lobby);
        assert_eq!(sim.actor_count(), 0);
        assert!(sim.history().is_empty());
        assert_eq!(sim.history().memory_usage_bytes(), 0);
        assert!(sim.advance(Duration::from_secs(1)).is_empty());

        sim.add_actor(9, Vec2::new(1000.0, 1000.0)).unwrap();
        sim.start_round().unwrap();
        assert_eq!(sim.advance(Duration::from_millis(30)).len(), 2);
    }
}

/// DETERMINISM TESTS
mod determinism_tests {
    use super::*;

    fn advance_in_chunks(sim: &mut Simulation, chunk: Duration, total: Duration) -> Vec<TickResult> {
        let mut fed = Duration::ZERO;
        let mut results = Vec::new();
        while fed < total {
            let step = chunk.min(total - fed);
            results.extend(sim.advance(step));
            fed += step;
        }
        results
    }

    /// Tick count depends only on the total time fed in
    #[test]
    fn tick_count_ignores_chunking() {
        let total = Duration::from_millis(3000);
        let mut whole = parallel_flyers();
        let mut pieces = parallel_flyers();
        let mut odd = parallel_flyers();

        whole.advance(total);
        advance_in_chunks(&mut pieces, Duration::from_millis(7), total);
        advance_in_chunks(&mut odd, Duration::from_micros(16_667), total);

        assert_eq!(whole.tick(), 200);
        assert_eq!(pieces.tick(), 200);
        assert_eq!(odd.tick(), 200);
        assert_eq!(
            whole.actor(1).unwrap().position(),
            pieces.actor(1).unwrap().position()
        );
        assert_eq!(
            whole.actor(2).unwrap().position(),
            odd.actor(2).unwrap().position()
        );
    }

    /// Same seed and same elapsed time give identical tick streams with bots
    #[test]
    fn seeded_bot_matches_replay_identically() {
        let total = Duration::from_millis(6006);
        let mut a = bot_match(42);
        let mut b = bot_match(42);

        let whole = a.advance(total);
        let pieces = advance_in_chunks(&mut b, Duration::from_millis(7), total);

        assert_eq!(whole.len(), pieces.len());
        assert_eq!(whole, pieces);
        assert_eq!(a.tick(), b.tick());
    }
}

/// PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    /// Tick results survive the broadcast encoding
    #[test]
    fn tick_packet_roundtrip() {
        let mut sim = parallel_flyers();
        let result = sim.advance(Duration::from_millis(1200)).pop().unwrap();
        assert!(result.actors.len() == 2);

        let bytes = Packet::Tick(result.clone()).encode().unwrap();
        match Packet::decode(&bytes).unwrap() {
            Packet::Tick(decoded) => assert_eq!(decoded, result),
            other => panic!("Wrong packet type decoded: {:?}", other),
        }
    }

    /// Echoed timestamps feed the latency tracker of known actors only
    #[test]
    fn round_trips_feed_latency() {
        let mut sim = parallel_flyers();
        sim.advance(Duration::from_millis(300));
        assert!(sim.latency().rtt(1).is_none());

        let rtt = sim.record_round_trip(1, 180).unwrap();
        assert!(rtt > 0.0);
        assert!(sim.latency().rtt(1).is_some());
        assert!(sim.record_round_trip(77, 180).is_none());
    }
}

/// MATCH RUNNER TESTS
mod runner_tests {
    use super::*;

    /// A bot match runs until decided or cut off, and reports what happened
    #[tokio::test]
    async fn bot_match_runs_to_completion() {
        let mut sim = Simulation::new(SimConfig::default()).unwrap();
        for id in 0..3 {
            let spawn = sim.random_spawn();
            sim.add_bot(id, spawn).unwrap();
        }
        let options = MatchOptions {
            duration: Some(Duration::from_secs(45)),
            realtime: false,
            stats_every_ticks: 500,
        };

        let summary = run_match(&mut sim, &options, std::future::pending())
            .await
            .unwrap();

        assert_eq!(summary.ticks, sim.tick());
        assert_eq!(summary.sim_ms, sim.now_ms());
        match summary.stop_reason {
            StopReason::RoundOver => assert!(summary.outcome.is_some()),
            StopReason::Deadline => assert!(sim.now_ms() >= 45_000),
            StopReason::Interrupted => panic!("Nothing interrupted the match"),
        }
        assert!(summary.largest_packet_bytes > 0);
    }
}
