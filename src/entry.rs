//! Bookkeeping for a single pooled resource

use std::time::{Duration, Instant};

/// Lifecycle state of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Idle,
    Active,
    Invalid,
}

/// Statistics regarding one entry of the pool.
#[derive(Debug, Clone, Copy)]
pub struct EntryStatus {
    id: u64,
    state: EntryState,
    created_at: Instant,
    last_borrowed_at: Option<Instant>,
    last_returned_at: Option<Instant>,
    borrow_count: u64,
}

impl EntryStatus {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id,
            state: EntryState::Idle,
            created_at: Instant::now(),
            last_borrowed_at: None,
            last_returned_at: None,
            borrow_count: 0,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn last_borrowed_at(&self) -> Option<Instant> {
        self.last_borrowed_at
    }

    pub fn last_returned_at(&self) -> Option<Instant> {
        self.last_returned_at
    }

    /// Returns the instant when this entry was last used.
    pub fn last_used(&self) -> Instant {
        match (self.last_borrowed_at, self.last_returned_at) {
            (Some(borrowed), Some(returned)) => borrowed.max(returned),
            (Some(at), None) | (None, Some(at)) => at,
            (None, None) => self.created_at,
        }
    }

    pub fn borrow_count(&self) -> u64 {
        self.borrow_count
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Time spent idle since the entry last went back to the pool
    pub fn idle_time(&self) -> Duration {
        self.last_returned_at.unwrap_or(self.created_at).elapsed()
    }

    pub(crate) fn mark_borrowed(&mut self) {
        self.state = EntryState::Active;
        self.last_borrowed_at = Some(Instant::now());
        self.borrow_count += 1;
    }

    pub(crate) fn mark_returned(&mut self) {
        self.state = EntryState::Idle;
        self.last_returned_at = Some(Instant::now());
    }

    pub(crate) fn mark_invalid(&mut self) {
        self.state = EntryState::Invalid;
    }
}

/// A resource together with its bookkeeping.
#[derive(Debug)]
pub(crate) struct PooledEntry<T> {
    pub resource: T,
    pub status: EntryStatus,
}

impl<T> PooledEntry<T> {
    pub fn new(id: u64, resource: T) -> Self {
        Self {
            resource,
            status: EntryStatus::new(id),
        }
    }

    pub fn id(&self) -> u64 {
        self.status.id
    }
}
