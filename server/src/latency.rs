//! Per-participant round-trip tracking and fair rewind timestamps.
//!
//! The compensator never touches simulation state. It keeps a smoothed RTT
//! per actor and uses it to answer one question for collision validation:
//! what did the world look like from this actor's point of view when they
//! made the move that got them killed.

use crate::collision::TrailHit;
use crate::history::HistoryBuffer;
use log::debug;
use shared::{ActorId, TUNING};
use std::collections::BTreeMap;

/// Weight of a new sample in the RTT moving average.
pub const RTT_SMOOTHING: f32 = 0.3;
pub const JITTER_SMOOTHING: f32 = 0.2;
pub const MIN_RTT_MS: f32 = 10.0;
pub const MAX_RTT_MS: f32 = 500.0;
pub const PING_INTERVAL_MS: u64 = 500;
pub const PING_TIMEOUT_MS: u64 = 5000;
/// Pong samples above this are discarded outright.
pub const MAX_SANE_SAMPLE_MS: u64 = 1000;
/// Extra collision radius granted per 100 ms of RTT.
pub const RADIUS_PER_100MS: f32 = 0.5;
pub const MAX_EXTRA_RADIUS: f32 = 10.0;
/// Outer fraction of the contact radius in which a hit counts as borderline.
pub const BORDERLINE_BAND: f32 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitVerdict {
    Confirmed,
    /// The hit stands on the server but not from the victim's point of view
    Excused,
}

#[derive(Debug, Clone, Default)]
struct Link {
    rtt_ms: f32,
    jitter_ms: f32,
    samples: u32,
    last_ping_ms: Option<u64>,
    pending: BTreeMap<u32, u64>,
}

impl Link {
    fn apply_sample(&mut self, sample_ms: f32) -> f32 {
        let smoothed = (1.0 - RTT_SMOOTHING) * self.rtt_ms + RTT_SMOOTHING * sample_ms;
        self.rtt_ms = smoothed.clamp(MIN_RTT_MS, MAX_RTT_MS);
        let deviation = (sample_ms - self.rtt_ms).abs();
        self.jitter_ms = (1.0 - JITTER_SMOOTHING) * self.jitter_ms + JITTER_SMOOTHING * deviation;
        self.samples += 1;
        self.rtt_ms
    }
}

#[derive(Debug, Clone)]
pub struct LatencyCompensator {
    links: BTreeMap<ActorId, Link>,
    max_rewind_ms: u64,
    next_ping_id: u32,
}

impl LatencyCompensator {
    /// `max_rewind_ms` bounds how far back a fair timestamp may reach,
    /// normally the history retention window.
    pub fn new(max_rewind_ms: u64) -> Self {
        Self {
            links: BTreeMap::new(),
            max_rewind_ms,
            next_ping_id: 0,
        }
    }

    pub fn add_actor(&mut self, id: ActorId) {
        self.links.entry(id).or_default();
    }

    pub fn remove_actor(&mut self, id: ActorId) {
        self.links.remove(&id);
    }

    pub fn clear(&mut self) {
        self.links.clear();
        self.next_ping_id = 0;
    }

    pub fn is_tracked(&self, id: ActorId) -> bool {
        self.links.contains_key(&id)
    }

    /// Folds in a sample taken from a client echo of a server timestamp.
    pub fn record_round_trip(&mut self, id: ActorId, echo_ms: u64, now_ms: u64) -> f32 {
        let sample = now_ms.saturating_sub(echo_ms) as f32;
        self.links.entry(id).or_default().apply_sample(sample)
    }

    /// Smoothed RTT, or `None` until the actor has been measured.
    pub fn rtt(&self, id: ActorId) -> Option<f32> {
        self.links
            .get(&id)
            .filter(|link| link.samples > 0)
            .map(|link| link.rtt_ms)
    }

    pub fn one_way(&self, id: ActorId) -> Option<f32> {
        self.rtt(id).map(|rtt| rtt / 2.0)
    }

    pub fn jitter(&self, id: ActorId) -> Option<f32> {
        self.links
            .get(&id)
            .filter(|link| link.samples > 0)
            .map(|link| link.jitter_ms)
    }

    /// The instant the actor was reacting to, never further back than the rewind limit.
    pub fn fair_timestamp(&self, id: ActorId, now_ms: u64) -> Option<u64> {
        let rewind = (self.rtt(id)?.round() as u64).min(self.max_rewind_ms);
        Some(now_ms.saturating_sub(rewind))
    }

    /// Contact radius widened a little for laggy actors.
    pub fn compensated_radius(&self, id: ActorId, base: f32) -> f32 {
        match self.rtt(id) {
            Some(rtt) => base + (rtt / 100.0 * RADIUS_PER_100MS).min(MAX_EXTRA_RADIUS),
            None => base,
        }
    }

    /// Starts a ping measurement unless one went out too recently.
    pub fn issue_ping(&mut self, id: ActorId, now_ms: u64) -> Option<u32> {
        let link = self.links.get_mut(&id)?;
        if matches!(link.last_ping_ms, Some(at) if now_ms < at + PING_INTERVAL_MS) {
            return None;
        }
        let ping_id = self.next_ping_id;
        self.next_ping_id = self.next_ping_id.wrapping_add(1);
        link.last_ping_ms = Some(now_ms);
        link.pending.insert(ping_id, now_ms);
        Some(ping_id)
    }

    /// Actors whose next ping is due.
    pub fn due_for_ping(&self, now_ms: u64) -> Vec<ActorId> {
        self.links
            .iter()
            .filter(|(_, link)| match link.last_ping_ms {
                Some(at) => now_ms >= at + PING_INTERVAL_MS,
                None => true,
            })
            .map(|(id, _)| *id)
            .collect()
    }

    /// Completes a ping measurement. Unknown ids and insane samples are ignored.
    pub fn process_pong(&mut self, id: ActorId, ping_id: u32, now_ms: u64) -> Option<f32> {
        let link = self.links.get_mut(&id)?;
        let sent_ms = link.pending.remove(&ping_id)?;
        let sample = now_ms.checked_sub(sent_ms)?;
        if sample > MAX_SANE_SAMPLE_MS {
            debug!("Discarding {} ms pong sample from actor {}", sample, id);
            return None;
        }
        Some(link.apply_sample(sample as f32))
    }

    /// Forgets pings that never came back. Returns how many were dropped.
    pub fn expire_pings(&mut self, now_ms: u64) -> usize {
        let mut expired = 0;
        for link in self.links.values_mut() {
            let before = link.pending.len();
            link.pending
                .retain(|_, sent_ms| now_ms.saturating_sub(*sent_ms) <= PING_TIMEOUT_MS);
            expired += before - link.pending.len();
        }
        expired
    }

    /// Checks a trail hit against the victim's own view of the world.
    ///
    /// Only borderline hits on measured actors are examined. Such a hit
    /// stands if the trail point already existed at the victim's fair
    /// timestamp and the victim's rewound pose at that instant was within
    /// the lag-widened contact radius of the point.
    pub fn confirm_hit(&self, hit: &TrailHit, history: &HistoryBuffer, now_ms: u64) -> HitVerdict {
        let Some(fair_ms) = self.fair_timestamp(hit.victim, now_ms) else {
            return HitVerdict::Confirmed;
        };

        let contact = TUNING.trail_contact_distance_sq().sqrt();
        if hit.distance_sq.sqrt() <= contact * (1.0 - BORDERLINE_BAND) {
            return HitVerdict::Confirmed;
        }

        if hit.point_created_ms > fair_ms {
            return HitVerdict::Excused;
        }
        let Some(rewound) = history.interpolate(hit.victim, fair_ms) else {
            return HitVerdict::Excused;
        };
        let reach = self.compensated_radius(hit.victim, contact);
        if rewound.position.distance_squared(hit.point) <= reach * reach {
            HitVerdict::Confirmed
        } else {
            HitVerdict::Excused
        }
    }
}
