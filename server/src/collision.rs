//! Spatial collision index.
//!
//! Every tick the index is rebuilt from scratch out of the live trail points
//! of every alive actor, bucketed into a uniform grid. Each actor then only
//! tests the 3x3 block of cells around it, which keeps a pass near-linear in
//! the number of points.
//!
//! The grid is laid out like a compressed sparse row table: one counting
//! pass sizes the cells, a prefix sum turns counts into offsets, and a
//! second pass scatters entries into one flat buffer. All buffers are kept
//! between ticks so a steady-state rebuild does not allocate.

use crate::actor::Actor;
use shared::{ActorId, Bounds, Vec2, TUNING};
use std::collections::BTreeMap;

/// Read access to the hazards of the latest index build.
pub trait HazardField {
    /// True if any trail point not owned by `ignore_owner` lies within `radius` of `point`.
    fn hazard_near(&self, point: Vec2, radius: f32, ignore_owner: Option<ActorId>) -> bool;
}

/// A lethal contact between an actor and a trail point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailHit {
    pub victim: ActorId,
    pub owner: ActorId,
    pub ordinal: u64,
    /// Where the trail point sits
    pub point: Vec2,
    pub point_created_ms: u64,
    pub distance_sq: f32,
}

impl TrailHit {
    pub fn is_self_hit(&self) -> bool {
        self.victim == self.owner
    }

    /// Orders candidates for death attribution: nearest point, then lower
    /// owner id, then lower ordinal.
    fn beats(&self, other: &TrailHit) -> bool {
        (self.distance_sq, self.owner, self.ordinal) < (other.distance_sq, other.owner, other.ordinal)
    }
}

#[derive(Debug, Clone, Copy)]
struct TrailEntry {
    owner: ActorId,
    ordinal: u64,
    position: Vec2,
    created_ms: u64,
}

/// Uniform grid with a flat, offset-indexed cell layout.
#[derive(Debug, Clone)]
struct Grid<T> {
    origin: Vec2,
    cell_size: f32,
    cols: usize,
    rows: usize,
    cell_start: Vec<u32>,
    cursor: Vec<u32>,
    entries: Vec<T>,
    staged: Vec<(u32, T)>,
}

impl<T: Copy> Grid<T> {
    fn new(bounds: &Bounds, cell_size: f32) -> Self {
        let cols = ((bounds.width() / cell_size).ceil() as usize).max(1);
        let rows = ((bounds.height() / cell_size).ceil() as usize).max(1);
        Self {
            origin: bounds.min,
            cell_size,
            cols,
            rows,
            cell_start: vec![0; cols * rows + 1],
            cursor: Vec::with_capacity(cols * rows),
            entries: Vec::new(),
            staged: Vec::new(),
        }
    }

    fn coords(&self, point: Vec2) -> (usize, usize) {
        let cx = ((point.x - self.origin.x) / self.cell_size).floor();
        let cy = ((point.y - self.origin.y) / self.cell_size).floor();
        // Clamping also maps NaN to cell zero
        let cx = cx.clamp(0.0, (self.cols - 1) as f32) as usize;
        let cy = cy.clamp(0.0, (self.rows - 1) as f32) as usize;
        (cx, cy)
    }

    fn begin(&mut self) {
        self.staged.clear();
    }

    fn stage(&mut self, point: Vec2, item: T) {
        let (cx, cy) = self.coords(point);
        self.staged.push(((cy * self.cols + cx) as u32, item));
    }

    fn commit(&mut self) {
        let cells = self.cols * self.rows;
        self.cell_start.clear();
        self.cell_start.resize(cells + 1, 0);
        for (cell, _) in &self.staged {
            self.cell_start[*cell as usize + 1] += 1;
        }
        for i in 0..cells {
            self.cell_start[i + 1] += self.cell_start[i];
        }

        self.cursor.clear();
        self.cursor.extend_from_slice(&self.cell_start[..cells]);
        self.entries.clear();
        if let Some((_, first)) = self.staged.first() {
            self.entries.resize(self.staged.len(), *first);
        }
        for (cell, item) in &self.staged {
            let slot = &mut self.cursor[*cell as usize];
            self.entries[*slot as usize] = *item;
            *slot += 1;
        }
    }

    fn cell(&self, cx: usize, cy: usize) -> &[T] {
        let index = cy * self.cols + cx;
        let start = self.cell_start[index] as usize;
        let end = self.cell_start[index + 1] as usize;
        &self.entries[start..end]
    }

    /// Visits every entry in cells that may hold something within `radius` of `point`.
    fn visit_near(&self, point: Vec2, radius: f32, mut visit: impl FnMut(&T)) {
        let reach = ((radius / self.cell_size).ceil() as usize).max(1);
        let (cx, cy) = self.coords(point);
        let x_range = cx.saturating_sub(reach)..=(cx + reach).min(self.cols - 1);
        for y in cy.saturating_sub(reach)..=(cy + reach).min(self.rows - 1) {
            for x in x_range.clone() {
                self.cell(x, y).iter().for_each(&mut visit);
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Clone)]
pub struct CollisionIndex {
    trails: Grid<TrailEntry>,
    bodies: Grid<(ActorId, Vec2)>,
    pairs: Vec<(ActorId, ActorId)>,
}

impl CollisionIndex {
    pub fn new(world: &Bounds) -> Self {
        Self::with_cell_size(world, TUNING.collision.cell_size)
    }

    pub fn with_cell_size(world: &Bounds, cell_size: f32) -> Self {
        Self {
            trails: Grid::new(world, cell_size),
            bodies: Grid::new(world, cell_size),
            pairs: Vec::new(),
        }
    }

    /// Number of trail points in the latest build.
    pub fn indexed_points(&self) -> usize {
        self.trails.len()
    }

    /// Rebuilds the index and tests every alive actor against it.
    ///
    /// All actors are judged against the same build, so actors crossing
    /// each other's trails in one tick are all reported together. At most
    /// one hit is reported per victim, ordered by victim id.
    pub fn resolve(&mut self, actors: &BTreeMap<ActorId, Actor>, now_ms: u64) -> Vec<TrailHit> {
        self.rebuild(actors, now_ms);

        let contact_sq = TUNING.trail_contact_distance_sq();
        let reach = TUNING.collision.actor_radius + TUNING.collision.trail_radius;
        let mut hits = Vec::new();

        for actor in actors.values().filter(|a| a.is_alive()) {
            let position = actor.position();
            let mut best: Option<TrailHit> = None;

            self.trails.visit_near(position, reach, |entry| {
                if entry.owner == actor.id() && self_hit_excused(actor, entry.ordinal, now_ms) {
                    return;
                }
                let distance_sq = position.distance_squared(entry.position);
                if distance_sq >= contact_sq {
                    return;
                }
                let candidate = TrailHit {
                    victim: actor.id(),
                    owner: entry.owner,
                    ordinal: entry.ordinal,
                    point: entry.position,
                    point_created_ms: entry.created_ms,
                    distance_sq,
                };
                if best.map_or(true, |current| candidate.beats(&current)) {
                    best = Some(candidate);
                }
            });

            hits.extend(best);
        }
        hits
    }

    /// Pushes overlapping bodies apart and trades their approach velocity.
    ///
    /// Contacts never eliminate anyone. Returns the number of contacts resolved.
    pub fn separate_bodies(&mut self, actors: &mut BTreeMap<ActorId, Actor>, bounds: &Bounds) -> usize {
        let body = TUNING.collision.actor_radius * TUNING.collision.body_radius_scale;
        let combined = body * 2.0;

        self.bodies.begin();
        for actor in actors.values().filter(|a| a.is_alive()) {
            self.bodies.stage(actor.position(), (actor.id(), actor.position()));
        }
        self.bodies.commit();

        self.pairs.clear();
        for actor in actors.values().filter(|a| a.is_alive()) {
            let id = actor.id();
            let position = actor.position();
            let pairs = &mut self.pairs;
            self.bodies.visit_near(position, combined, |(other, other_position)| {
                if *other > id && position.distance_squared(*other_position) < combined * combined {
                    pairs.push((id, *other));
                }
            });
        }

        let mut resolved = 0;
        for &(a, b) in &self.pairs {
            let (Some(first), Some(second)) = (actors.get(&a), actors.get(&b)) else {
                continue;
            };
            let Some(contact) = resolve_contact(first, second, combined, bounds) else {
                continue;
            };
            if let Some(first) = actors.get_mut(&a) {
                let heading = first.heading();
                first.place(contact.first_position, contact.first_velocity, heading);
            }
            if let Some(second) = actors.get_mut(&b) {
                let heading = second.heading();
                second.place(contact.second_position, contact.second_velocity, heading);
            }
            resolved += 1;
        }
        resolved
    }
}

impl HazardField for CollisionIndex {
    fn hazard_near(&self, point: Vec2, radius: f32, ignore_owner: Option<ActorId>) -> bool {
        let radius_sq = radius * radius;
        let mut found = false;
        self.trails.visit_near(point, radius, |entry| {
            if !found && Some(entry.owner) != ignore_owner {
                found = point.distance_squared(entry.position) < radius_sq;
            }
        });
        found
    }
}

impl CollisionIndex {
    fn rebuild(&mut self, actors: &BTreeMap<ActorId, Actor>, now_ms: u64) {
        self.trails.begin();
        for actor in actors.values().filter(|a| a.is_alive()) {
            for point in actor.trail().iter().filter(|p| !p.is_expired(now_ms)) {
                self.trails.stage(
                    point.position,
                    TrailEntry {
                        owner: actor.id(),
                        ordinal: point.ordinal,
                        position: point.position,
                        created_ms: point.created_ms,
                    },
                );
            }
        }
        self.trails.commit();
    }
}

/// Own trail points that cannot kill their owner right now.
fn self_hit_excused(actor: &Actor, ordinal: u64, now_ms: u64) -> bool {
    let grace = &TUNING.collision;
    if ordinal + grace.self_grace_points >= actor.next_ordinal() {
        return true;
    }
    if now_ms < actor.spawn_ms() + grace.spawn_self_grace_ms {
        return true;
    }
    matches!(actor.last_bounce_ms(), Some(at) if now_ms < at + grace.post_bounce_grace_ms)
}

struct Contact {
    first_position: Vec2,
    first_velocity: Vec2,
    second_position: Vec2,
    second_velocity: Vec2,
}

fn resolve_contact(first: &Actor, second: &Actor, combined: f32, bounds: &Bounds) -> Option<Contact> {
    let delta = second.position() - first.position();
    let distance = delta.magnitude();
    let overlap = combined - distance;
    if overlap <= 0.0 {
        return None;
    }

    // Coincident centres get pushed apart along x
    let normal = if distance < 0.001 {
        Vec2::new(1.0, 0.0)
    } else {
        delta * (1.0 / distance)
    };

    let separation = normal * (overlap / 2.0);
    let mut first_velocity = first.velocity();
    let mut second_velocity = second.velocity();

    let approach = (second_velocity - first_velocity).dot(normal);
    if approach < 0.0 {
        let restitution = TUNING.collision.body_restitution;
        // Equal masses share one impulse, so momentum along the normal is kept
        let impulse = (1.0 + restitution) * approach / 2.0;
        first_velocity += normal * impulse;
        second_velocity += normal * -impulse;
    }

    Some(Contact {
        first_position: bounds.clamp(first.position() - separation, 0.0),
        first_velocity,
        second_position: bounds.clamp(second.position() + separation, 0.0),
        second_velocity,
    })
}
