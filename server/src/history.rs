//! Short ring of recent actor poses.
//!
//! One snapshot is appended per tick and anything older than the retention
//! window falls off the head. The buffer is also hard-capped at
//! `ceil(retention / tick) + margin` entries, so its footprint is bounded
//! whatever timestamps it is fed.

use crate::actor::Actor;
use crate::pool::{Pool, PoolStats};
use log::debug;
use shared::{lerp_angle, wrap_angle, ActorId, Vec2};
use std::collections::{BTreeMap, VecDeque};
use std::mem::size_of;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActorSnapshot {
    pub id: ActorId,
    pub position: Vec2,
    pub heading: f32,
}

/// Poses of every alive actor at one instant. Actors are sorted by id.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub timestamp_ms: u64,
    pub actors: Vec<ActorSnapshot>,
}

impl Snapshot {
    pub fn actor(&self, id: ActorId) -> Option<&ActorSnapshot> {
        self.actors
            .binary_search_by_key(&id, |a| a.id)
            .ok()
            .map(|index| &self.actors[index])
    }
}

#[derive(Debug)]
pub struct HistoryBuffer {
    snapshots: VecDeque<Snapshot>,
    retention_ms: u64,
    cap: usize,
    buffers: Pool<Vec<ActorSnapshot>>,
}

impl HistoryBuffer {
    pub fn new(retention_ms: u64, tick_interval_ms: u64, margin: usize, pool_capacity: usize) -> Self {
        let tick = tick_interval_ms.max(1);
        let cap = ((retention_ms + tick - 1) / tick) as usize + margin;
        Self {
            snapshots: VecDeque::with_capacity(cap + 1),
            retention_ms,
            cap,
            buffers: Pool::of_vecs(pool_capacity),
        }
    }

    /// Hard limit on the number of snapshots held.
    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn retention_ms(&self) -> u64 {
        self.retention_ms
    }

    pub fn newest(&self) -> Option<&Snapshot> {
        self.snapshots.back()
    }

    pub fn oldest(&self) -> Option<&Snapshot> {
        self.snapshots.front()
    }

    /// Appends a snapshot, then prunes by age and by count.
    ///
    /// Snapshots older than the newest one held are refused so timestamps
    /// stay sorted.
    pub fn append(&mut self, snapshot: Snapshot) -> bool {
        if let Some(newest) = self.snapshots.back() {
            if snapshot.timestamp_ms < newest.timestamp_ms {
                debug!(
                    "Refusing out-of-order snapshot at {} (newest is {})",
                    snapshot.timestamp_ms, newest.timestamp_ms
                );
                self.buffers.release(snapshot.actors);
                return false;
            }
        }

        let horizon = snapshot.timestamp_ms.saturating_sub(self.retention_ms);
        self.snapshots.push_back(snapshot);

        while matches!(self.snapshots.front(), Some(s) if s.timestamp_ms < horizon) {
            self.pop_oldest();
        }
        while self.snapshots.len() > self.cap {
            self.pop_oldest();
        }
        true
    }

    /// Captures the pose of every alive actor at `now_ms`.
    pub fn record(&mut self, now_ms: u64, actors: &BTreeMap<ActorId, Actor>) -> bool {
        let mut poses = self.buffers.acquire();
        poses.extend(actors.values().filter(|a| a.is_alive()).map(|a| ActorSnapshot {
            id: a.id(),
            position: a.position(),
            heading: a.heading(),
        }));
        self.append(Snapshot {
            timestamp_ms: now_ms,
            actors: poses,
        })
    }

    /// Snapshot closest in time to `timestamp_ms`. Ties go to the earlier one.
    pub fn nearest(&self, timestamp_ms: u64) -> Option<&Snapshot> {
        let after = self.snapshots.partition_point(|s| s.timestamp_ms < timestamp_ms);
        let later = self.snapshots.get(after);
        let earlier = after.checked_sub(1).and_then(|i| self.snapshots.get(i));
        match (earlier, later) {
            (Some(e), Some(l)) => {
                if timestamp_ms - e.timestamp_ms <= l.timestamp_ms - timestamp_ms {
                    Some(e)
                } else {
                    Some(l)
                }
            }
            (e, l) => e.or(l),
        }
    }

    /// Pose of `id` at `timestamp_ms`, blended between the bracketing snapshots.
    ///
    /// Heading follows the shortest arc. With only one side available the
    /// exact value from that side is returned; nothing is extrapolated.
    pub fn interpolate(&self, id: ActorId, timestamp_ms: u64) -> Option<ActorSnapshot> {
        let after = self.snapshots.partition_point(|s| s.timestamp_ms <= timestamp_ms);
        let before = after.checked_sub(1).and_then(|i| self.snapshots.get(i));
        let after = self.snapshots.get(after);

        let from = before.and_then(|s| s.actor(id).map(|a| (s.timestamp_ms, *a)));
        let to = after.and_then(|s| s.actor(id).map(|a| (s.timestamp_ms, *a)));

        match (from, to) {
            (Some((t0, a)), Some((t1, b))) => {
                if t0 == timestamp_ms || t1 == t0 {
                    return Some(a);
                }
                let alpha = (timestamp_ms - t0) as f32 / (t1 - t0) as f32;
                Some(ActorSnapshot {
                    id,
                    position: a.position.lerp(b.position, alpha),
                    heading: wrap_angle(lerp_angle(a.heading, b.heading, alpha)),
                })
            }
            (Some((_, a)), None) => Some(a),
            (None, Some((_, b))) => Some(b),
            (None, None) => None,
        }
    }

    /// Approximate heap and inline footprint of the held snapshots.
    pub fn memory_usage_bytes(&self) -> usize {
        self.snapshots
            .iter()
            .map(|s| size_of::<Snapshot>() + s.actors.len() * size_of::<ActorSnapshot>())
            .sum()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.buffers.stats()
    }

    /// Drops every snapshot, recycling their buffers.
    pub fn clear(&mut self) {
        while !self.snapshots.is_empty() {
            self.pop_oldest();
        }
    }

    /// Drops every snapshot and the recycled buffers with them.
    pub fn release(&mut self) {
        self.snapshots.clear();
        self.buffers.clear();
    }

    fn pop_oldest(&mut self) {
        if let Some(old) = self.snapshots.pop_front() {
            self.buffers.release(old.actors);
        }
    }
}
