//! Bounded object reuse.
//!
//! A [`Pool`] keeps a free list of previously used values so hot paths can
//! recycle buffers instead of allocating every tick. It never blocks and
//! never fails: an empty pool manufactures a fresh value and a full pool
//! drops whatever is handed back.

/// Counters describing how well a pool is doing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Values handed out from the free list
    pub reused: u64,
    /// Values manufactured because the free list was empty
    pub created: u64,
    /// Values dropped on release because the free list was full
    pub dropped: u64,
}

pub struct Pool<T> {
    free: Vec<T>,
    capacity: usize,
    create: fn() -> T,
    reset: fn(&mut T),
    stats: PoolStats,
}

impl<T> Pool<T> {
    pub fn new(capacity: usize, create: fn() -> T, reset: fn(&mut T)) -> Self {
        Self {
            free: Vec::with_capacity(capacity),
            capacity,
            create,
            reset,
            stats: PoolStats::default(),
        }
    }

    /// Hands out a recycled value, or a new one if nothing is free.
    pub fn acquire(&mut self) -> T {
        match self.free.pop() {
            Some(value) => {
                self.stats.reused += 1;
                value
            }
            None => {
                self.stats.created += 1;
                (self.create)()
            }
        }
    }

    /// Resets `value` and keeps it for reuse unless the pool is full.
    pub fn release(&mut self, mut value: T) {
        if self.free.len() >= self.capacity {
            self.stats.dropped += 1;
            return;
        }
        (self.reset)(&mut value);
        self.free.push(value);
    }

    /// Number of values currently waiting on the free list.
    pub fn len(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    /// Drops every pooled value and forgets the counters.
    pub fn clear(&mut self) {
        self.free.clear();
        self.stats = PoolStats::default();
    }
}

impl<E> Pool<Vec<E>> {
    /// Pool of vectors that come back empty but keep their allocation.
    pub fn of_vecs(capacity: usize) -> Self {
        Pool::new(capacity, Vec::new, Vec::clear)
    }
}

impl<T> std::fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("free", &self.free.len())
            .field("capacity", &self.capacity)
            .field("stats", &self.stats)
            .finish()
    }
}
