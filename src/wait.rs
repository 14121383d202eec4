//! FIFO queue of blocked borrowers.
//!
//! Each waiter owns a single-use channel. A returner pops the oldest waiter
//! and sends it a [`Grant`] while still holding the pool lock, so a waiter
//! that later finds itself missing from the queue knows its grant is already
//! sitting in its channel.

use std::collections::VecDeque;

use crossbeam::channel::{self, Receiver, Sender};
use tokio::sync::oneshot;

use crate::entry::PooledEntry;

/// What a woken waiter receives
#[derive(Debug)]
pub(crate) enum Grant<T> {
    /// An entry, already registered as active for the waiter
    Entry(PooledEntry<T>),

    /// A reserved capacity slot; the waiter creates the resource itself
    Slot,
}

enum Notifier<T> {
    Thread(Sender<Grant<T>>),
    Task(oneshot::Sender<Grant<T>>),
}

impl<T> Notifier<T> {
    fn notify(self, grant: Grant<T>) -> Result<(), Grant<T>> {
        match self {
            Notifier::Thread(tx) => tx.try_send(grant).map_err(|e| e.into_inner()),
            Notifier::Task(tx) => tx.send(grant),
        }
    }
}

struct Waiter<T> {
    ticket: u64,
    notifier: Notifier<T>,
}

pub(crate) struct WaitQueue<T> {
    waiters: VecDeque<Waiter<T>>,
    next_ticket: u64,
}

impl<T> WaitQueue<T> {
    pub fn new() -> Self {
        Self {
            waiters: VecDeque::new(),
            next_ticket: 0,
        }
    }

    /// Enqueue a blocking waiter
    pub fn enqueue_thread(&mut self) -> (u64, Receiver<Grant<T>>) {
        let (tx, rx) = channel::bounded(1);
        (self.enqueue(Notifier::Thread(tx)), rx)
    }

    /// Enqueue an async waiter
    pub fn enqueue_task(&mut self) -> (u64, oneshot::Receiver<Grant<T>>) {
        let (tx, rx) = oneshot::channel();
        (self.enqueue(Notifier::Task(tx)), rx)
    }

    fn enqueue(&mut self, notifier: Notifier<T>) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.waiters.push_back(Waiter { ticket, notifier });
        ticket
    }

    /// Withdraw a waiter. Returns false if it was already woken (or the
    /// queue was closed), in which case its channel decides the outcome.
    pub fn remove(&mut self, ticket: u64) -> bool {
        match self.waiters.iter().position(|w| w.ticket == ticket) {
            Some(index) => {
                self.waiters.remove(index);
                true
            }
            None => false,
        }
    }

    /// Hand `grant` to the oldest live waiter. Gives it back when nobody
    /// is waiting.
    pub fn notify(&mut self, mut grant: Grant<T>) -> Option<Grant<T>> {
        while let Some(waiter) = self.waiters.pop_front() {
            match waiter.notifier.notify(grant) {
                Ok(()) => return None,
                Err(returned) => grant = returned,
            }
        }
        Some(grant)
    }

    /// Drop every waiter; their channels disconnect.
    pub fn close(&mut self) {
        self.waiters.clear();
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}
