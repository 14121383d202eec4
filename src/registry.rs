//! The two disjoint entry sets: idle entries waiting to be borrowed and
//! active entries currently held by callers.

use std::collections::{HashMap, VecDeque};

use crate::config::QueueStrategy;
use crate::entry::{EntryStatus, PooledEntry};

/// Idle entries, front is the next one handed out.
///
/// LIFO pushes returned entries to the front, so its coldest entry sits at
/// the back. FIFO pushes to the back and hands out the coldest first, so
/// its cold end is the front.
#[derive(Debug)]
pub(crate) struct IdleRegistry<T> {
    deque: VecDeque<PooledEntry<T>>,
    strategy: QueueStrategy,
}

impl<T> IdleRegistry<T> {
    pub fn new(strategy: QueueStrategy) -> Self {
        Self {
            deque: VecDeque::new(),
            strategy,
        }
    }

    pub fn push(&mut self, mut entry: PooledEntry<T>) {
        entry.status.mark_returned();
        match self.strategy {
            QueueStrategy::Lifo => self.deque.push_front(entry),
            QueueStrategy::Fifo => self.deque.push_back(entry),
        }
    }

    /// Put back an entry that was taken out for inspection without being
    /// borrowed. Its idle timestamps are left untouched.
    pub fn restore_cold(&mut self, entry: PooledEntry<T>) {
        match self.strategy {
            QueueStrategy::Lifo => self.deque.push_back(entry),
            QueueStrategy::Fifo => self.deque.push_front(entry),
        }
    }

    pub fn pop(&mut self) -> Option<PooledEntry<T>> {
        self.deque.pop_front()
    }

    /// Remove up to `count` entries from the cold end
    pub fn take_coldest(&mut self, count: usize) -> Vec<PooledEntry<T>> {
        let count = count.min(self.deque.len());
        let mut taken = Vec::with_capacity(count);
        for _ in 0..count {
            let entry = match self.strategy {
                QueueStrategy::Lifo => self.deque.pop_back(),
                QueueStrategy::Fifo => self.deque.pop_front(),
            };
            taken.extend(entry);
        }
        taken
    }

    pub fn drain(&mut self) -> Vec<PooledEntry<T>> {
        self.deque.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.deque.len()
    }
}

/// Entries currently borrowed, keyed by entry id. The resources themselves
/// live in the borrowers' guards.
#[derive(Debug, Default)]
pub(crate) struct ActiveRegistry {
    entries: HashMap<u64, EntryStatus>,
}

impl ActiveRegistry {
    pub fn insert(&mut self, mut status: EntryStatus) {
        status.mark_borrowed();
        self.entries.insert(status.id(), status);
    }

    pub fn remove(&mut self, id: u64) -> Option<EntryStatus> {
        self.entries.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryState;

    fn ids<T>(registry: &mut IdleRegistry<T>) -> Vec<u64> {
        std::iter::from_fn(|| registry.pop()).map(|e| e.id()).collect()
    }

    #[test]
    fn test_lifo_hands_out_most_recent() {
        let mut idle = IdleRegistry::new(QueueStrategy::Lifo);
        for id in 1..=3 {
            idle.push(PooledEntry::new(id, ()));
        }
        assert_eq!(ids(&mut idle), vec![3, 2, 1]);
    }

    #[test]
    fn test_fifo_hands_out_oldest() {
        let mut idle = IdleRegistry::new(QueueStrategy::Fifo);
        for id in 1..=3 {
            idle.push(PooledEntry::new(id, ()));
        }
        assert_eq!(ids(&mut idle), vec![1, 2, 3]);
    }

    #[test]
    fn test_take_coldest_from_back() {
        let mut idle = IdleRegistry::new(QueueStrategy::Lifo);
        for id in 1..=4 {
            idle.push(PooledEntry::new(id, ()));
        }
        let cold: Vec<u64> = idle.take_coldest(2).iter().map(|e| e.id()).collect();
        assert_eq!(cold, vec![1, 2]);
        assert_eq!(idle.len(), 2);
        assert_eq!(idle.take_coldest(10).len(), 2);
        assert_eq!(idle.len(), 0);
    }

    #[test]
    fn test_take_coldest_fifo_from_front() {
        let mut idle = IdleRegistry::new(QueueStrategy::Fifo);
        for id in 1..=3 {
            idle.push(PooledEntry::new(id, ()));
        }
        let cold: Vec<u64> = idle.take_coldest(1).iter().map(|e| e.id()).collect();
        assert_eq!(cold, vec![1]);
        assert_eq!(idle.len(), 2);
    }

    #[test]
    fn test_restore_cold_keeps_entry_at_cold_end() {
        for strategy in [QueueStrategy::Lifo, QueueStrategy::Fifo] {
            let mut idle = IdleRegistry::new(strategy);
            for id in 1..=3 {
                idle.push(PooledEntry::new(id, ()));
            }
            let coldest = idle.take_coldest(1);
            assert_eq!(coldest[0].id(), 1);
            for entry in coldest {
                idle.restore_cold(entry);
            }
            let cold: Vec<u64> = idle.take_coldest(1).iter().map(|e| e.id()).collect();
            assert_eq!(cold, vec![1], "{strategy:?}");
        }
    }

    #[test]
    fn test_active_registry_tracks_borrows() {
        let mut active = ActiveRegistry::default();
        active.insert(EntryStatus::new(9));
        assert_eq!(active.len(), 1);

        let status = active.remove(9).unwrap();
        assert_eq!(status.state(), EntryState::Active);
        assert_eq!(status.borrow_count(), 1);
        assert!(active.remove(9).is_none());
    }
}
