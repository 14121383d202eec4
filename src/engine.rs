//! One generation of a pool: a fixed configuration and factory plus the
//! idle set, active set and waiter queue, all behind a single lock.
//!
//! Factory calls are never made while the lock is held. Capacity is
//! reserved under the lock (`total` counts idle, active and in-flight
//! creations) and given back after the factory call completes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam::channel::Receiver;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::config::{PoolConfiguration, WaitPolicy};
use crate::entry::PooledEntry;
use crate::errors::{FactoryError, PoolError, PoolResult};
use crate::eviction::EvictionPolicy;
use crate::factory::ResourceFactory;
use crate::metrics::{MetricsTracker, PoolMetrics};
use crate::registry::{ActiveRegistry, IdleRegistry};
use crate::wait::{Grant, WaitQueue};

struct PoolState<T> {
    idle: IdleRegistry<T>,
    active: ActiveRegistry,
    waiters: WaitQueue<T>,
    total: usize,
    closed: bool,
}

impl<T> PoolState<T> {
    /// Give a capacity slot back, or pass it straight to the oldest waiter.
    fn release_slot(&mut self) {
        if self.waiters.notify(Grant::Slot).is_some() {
            self.total -= 1;
        }
    }

    /// Route a live entry to the oldest waiter, else to the idle set.
    /// Returns the entry when it must be destroyed instead.
    fn offer_entry(&mut self, mut entry: PooledEntry<T>, idle_capacity: Option<usize>) -> Option<PooledEntry<T>> {
        let id = entry.id();
        entry.status.mark_returned();
        self.active.insert(entry.status);
        let Some(Grant::Entry(entry)) = self.waiters.notify(Grant::Entry(entry)) else {
            return None;
        };
        self.active.remove(id);
        if self.closed || idle_capacity.is_some_and(|max| self.idle.len() >= max) {
            return Some(entry);
        }
        self.idle.push(entry);
        None
    }
}

enum Acquired<T, R> {
    Ready(Grant<T>),
    Queued(u64, R),
}

/// Outcome of withdrawing a waiter after its wait ended without a grant
enum Withdrawal<T> {
    Withdrawn,
    Granted(Grant<T>),
    Closed,
}

pub(crate) struct PoolEngine<F: ResourceFactory> {
    owner: u64,
    config: PoolConfiguration,
    eviction: EvictionPolicy,
    factory: F,
    state: Mutex<PoolState<F::Resource>>,
    metrics: MetricsTracker,
    next_id: AtomicU64,
}

impl<F: ResourceFactory> PoolEngine<F> {
    pub fn new(owner: u64, config: PoolConfiguration, factory: F) -> Self {
        let state = PoolState {
            idle: IdleRegistry::new(config.queue_strategy),
            active: ActiveRegistry::default(),
            waiters: WaitQueue::new(),
            total: 0,
            closed: false,
        };
        Self {
            owner,
            eviction: config.eviction_policy(),
            config,
            factory,
            state: Mutex::new(state),
            metrics: MetricsTracker::new(),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn owner(&self) -> u64 {
        self.owner
    }

    pub fn config(&self) -> &PoolConfiguration {
        &self.config
    }

    /// Borrow an entry, blocking the calling thread while the pool is
    /// exhausted.
    pub fn borrow(&self) -> PoolResult<PooledEntry<F::Resource>> {
        let start = Instant::now();
        let deadline = self.deadline(start);
        loop {
            let grant = match self.acquire(start, deadline, WaitQueue::enqueue_thread)? {
                Acquired::Ready(grant) => grant,
                Acquired::Queued(ticket, rx) => self.wait_blocking(ticket, rx, start, deadline)?,
            };
            if let Some(entry) = self.prepare(grant)? {
                return Ok(self.finish_borrow(entry, start));
            }
        }
    }

    /// Borrow an entry, suspending the calling task while the pool is
    /// exhausted. Dropping the future releases the waiter's place in the
    /// queue or hands back whatever it was granted.
    pub async fn borrow_async(&self) -> PoolResult<PooledEntry<F::Resource>> {
        let start = Instant::now();
        let deadline = self.deadline(start);
        loop {
            let grant = match self.acquire(start, deadline, WaitQueue::enqueue_task)? {
                Acquired::Ready(grant) => grant,
                Acquired::Queued(ticket, rx) => {
                    let pending = PendingWait {
                        engine: self,
                        ticket,
                        rx,
                        armed: true,
                    };
                    pending.wait(start, deadline).await?
                }
            };
            if let Some(entry) = self.prepare(grant)? {
                return Ok(self.finish_borrow(entry, start));
            }
        }
    }

    fn deadline(&self, start: Instant) -> Option<Instant> {
        match self.config.wait_policy() {
            WaitPolicy::Forever => None,
            WaitPolicy::FailFast => Some(start),
            WaitPolicy::Bounded(wait) => Some(start + wait),
        }
    }

    fn finish_borrow(&self, entry: PooledEntry<F::Resource>, start: Instant) -> PooledEntry<F::Resource> {
        self.metrics.record_wait(start.elapsed());
        MetricsTracker::increment(&self.metrics.total_borrowed);
        tracing::trace!(entry = entry.id(), "borrowed pooled resource");
        entry
    }

    /// Take an idle entry, reserve capacity, or join the wait queue, all in
    /// one critical section.
    fn acquire<R>(
        &self,
        start: Instant,
        deadline: Option<Instant>,
        enqueue: impl FnOnce(&mut WaitQueue<F::Resource>) -> (u64, R),
    ) -> PoolResult<Acquired<F::Resource, R>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PoolError::Closed);
        }
        if let Some(entry) = state.idle.pop() {
            state.active.insert(entry.status);
            return Ok(Acquired::Ready(Grant::Entry(entry)));
        }
        if self.config.capacity().is_none_or(|max| state.total < max) {
            state.total += 1;
            return Ok(Acquired::Ready(Grant::Slot));
        }
        let may_wait = deadline != Some(start)
            && self.config.max_waiters.is_none_or(|max| state.waiters.len() < max);
        if !may_wait {
            drop(state);
            return Err(self.exhausted(start));
        }
        let (ticket, rx) = enqueue(&mut state.waiters);
        Ok(Acquired::Queued(ticket, rx))
    }

    fn exhausted(&self, start: Instant) -> PoolError {
        MetricsTracker::increment(&self.metrics.exhausted_events);
        PoolError::Exhausted(start.elapsed())
    }

    fn wait_blocking(
        &self,
        ticket: u64,
        rx: Receiver<Grant<F::Resource>>,
        start: Instant,
        deadline: Option<Instant>,
    ) -> PoolResult<Grant<F::Resource>> {
        let received = match deadline {
            Some(deadline) => rx.recv_deadline(deadline).ok(),
            None => rx.recv().ok(),
        };
        if let Some(grant) = received {
            return Ok(grant);
        }

        match self.withdraw(ticket, || rx.try_recv().ok()) {
            Withdrawal::Granted(grant) => Ok(grant),
            Withdrawal::Withdrawn => Err(self.exhausted(start)),
            Withdrawal::Closed => Err(PoolError::Closed),
        }
    }

    /// Leave the wait queue. A waiter that is no longer queued was either
    /// granted (the grant is in its channel, sent under the same lock) or
    /// disconnected by close.
    fn withdraw(
        &self,
        ticket: u64,
        try_recv: impl FnOnce() -> Option<Grant<F::Resource>>,
    ) -> Withdrawal<F::Resource> {
        if self.state.lock().waiters.remove(ticket) {
            return Withdrawal::Withdrawn;
        }
        match try_recv() {
            Some(grant) => Withdrawal::Granted(grant),
            None => Withdrawal::Closed,
        }
    }

    /// Turn a grant into a ready entry. `Ok(None)` means the granted idle
    /// entry was unusable and has been destroyed; the caller retries.
    fn prepare(&self, grant: Grant<F::Resource>) -> PoolResult<Option<PooledEntry<F::Resource>>> {
        match grant {
            Grant::Entry(mut entry) => {
                if self.eviction.is_expired(&entry.status) {
                    tracing::debug!(entry = entry.id(), "idle resource expired on borrow");
                    self.invalidate_active(entry);
                    return Ok(None);
                }
                if let Err(error) = self.factory.activate(&mut entry.resource) {
                    tracing::debug!(entry = entry.id(), %error, "idle resource failed activation");
                    MetricsTracker::increment(&self.metrics.validation_failures);
                    self.invalidate_active(entry);
                    return Ok(None);
                }
                if self.config.test_on_borrow && !self.factory.validate(&entry.resource) {
                    tracing::debug!(entry = entry.id(), "idle resource failed validation on borrow");
                    MetricsTracker::increment(&self.metrics.validation_failures);
                    self.invalidate_active(entry);
                    return Ok(None);
                }
                self.hand_out(entry, true)
            }
            Grant::Slot => {
                let mut entry = self.create_reserved()?;
                let checked = self.config.test_on_create || self.config.test_on_borrow;
                if checked && !self.factory.validate(&entry.resource) {
                    MetricsTracker::increment(&self.metrics.validation_failures);
                    self.destroy_reserved(entry);
                    return Err(FactoryError::new("newly created resource failed validation").into());
                }
                if let Err(error) = self.factory.activate(&mut entry.resource) {
                    self.destroy_reserved(entry);
                    return Err(error.into());
                }
                self.hand_out(entry, false)
            }
        }
    }

    /// Last step before an entry reaches its borrower. If the generation
    /// was closed while the entry was being prepared it is destroyed and the
    /// borrow fails with `Closed`.
    fn hand_out(
        &self,
        entry: PooledEntry<F::Resource>,
        registered: bool,
    ) -> PoolResult<Option<PooledEntry<F::Resource>>> {
        let mut state = self.state.lock();
        if state.closed {
            if registered {
                state.active.remove(entry.id());
            }
            drop(state);
            tracing::debug!(entry = entry.id(), "pool closed during borrow");
            self.destroy_reserved(entry);
            return Err(PoolError::Closed);
        }
        if !registered {
            state.active.insert(entry.status);
        }
        Ok(Some(entry))
    }

    /// Create a resource against an already reserved slot. The slot is
    /// given back if the factory fails.
    fn create_reserved(&self) -> PoolResult<PooledEntry<F::Resource>> {
        match self.factory.create() {
            Ok(resource) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                MetricsTracker::increment(&self.metrics.total_created);
                tracing::debug!(entry = id, "created pooled resource");
                Ok(PooledEntry::new(id, resource))
            }
            Err(error) => {
                tracing::debug!(%error, "resource creation failed");
                self.state.lock().release_slot();
                Err(error.into())
            }
        }
    }

    /// Destroy an entry that holds a reserved slot but is in neither set.
    fn destroy_reserved(&self, mut entry: PooledEntry<F::Resource>) {
        entry.status.mark_invalid();
        self.destroy_resource(entry);
        self.state.lock().release_slot();
    }

    /// Destroy an entry currently registered as active.
    fn invalidate_active(&self, entry: PooledEntry<F::Resource>) {
        self.state.lock().active.remove(entry.id());
        self.destroy_reserved(entry);
    }

    fn destroy_resource(&self, entry: PooledEntry<F::Resource>) {
        let id = entry.id();
        MetricsTracker::increment(&self.metrics.total_destroyed);
        match self.factory.destroy(entry.resource) {
            Ok(()) => tracing::debug!(entry = id, "destroyed pooled resource"),
            Err(error) => tracing::warn!(entry = id, %error, "failed to destroy pooled resource"),
        }
    }

    /// Return a borrowed resource.
    pub fn release(&self, id: u64, mut resource: F::Resource) -> PoolResult<()> {
        let mut healthy = !self.config.test_on_return || self.factory.validate(&resource);
        if !healthy {
            MetricsTracker::increment(&self.metrics.validation_failures);
            tracing::debug!(entry = id, "resource failed validation on return");
        } else if let Err(error) = self.factory.passivate(&mut resource) {
            tracing::warn!(entry = id, %error, "failed to passivate returned resource");
            healthy = false;
        }

        let mut state = self.state.lock();
        let Some(status) = state.active.remove(id) else {
            drop(state);
            tracing::warn!(entry = id, "returned resource is not active in this pool");
            return Err(PoolError::UnknownResource);
        };
        MetricsTracker::increment(&self.metrics.total_returned);
        let entry = PooledEntry { resource, status };

        if !healthy || state.closed {
            drop(state);
            self.destroy_reserved(entry);
            return Ok(());
        }
        let rejected = state.offer_entry(entry, self.config.idle_capacity());
        drop(state);
        if let Some(entry) = rejected {
            self.destroy_reserved(entry);
        }
        Ok(())
    }

    /// Destroy a borrowed resource and free its slot.
    pub fn invalidate(&self, id: u64, resource: F::Resource) -> PoolResult<()> {
        let Some(status) = self.state.lock().active.remove(id) else {
            tracing::warn!(entry = id, "invalidated resource is not active in this pool");
            return Err(PoolError::UnknownResource);
        };
        self.destroy_reserved(PooledEntry { resource, status });
        Ok(())
    }

    /// Create one resource and place it idle.
    pub fn add_idle(&self) -> PoolResult<()> {
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(PoolError::Closed);
            }
            let at_capacity = self.config.capacity().is_some_and(|max| state.total >= max);
            let idle_full = self.config.idle_capacity().is_some_and(|max| state.idle.len() >= max);
            if at_capacity || idle_full {
                return Err(PoolError::Exhausted(Duration::ZERO));
            }
            state.total += 1;
        }

        let mut entry = self.create_reserved()?;
        if self.config.test_on_create && !self.factory.validate(&entry.resource) {
            MetricsTracker::increment(&self.metrics.validation_failures);
            self.destroy_reserved(entry);
            return Err(FactoryError::new("newly created resource failed validation").into());
        }
        if let Err(error) = self.factory.passivate(&mut entry.resource) {
            self.destroy_reserved(entry);
            return Err(error.into());
        }

        let mut state = self.state.lock();
        let rejected = if state.closed {
            Some(entry)
        } else {
            state.offer_entry(entry, self.config.idle_capacity())
        };
        drop(state);
        if let Some(entry) = rejected {
            self.destroy_reserved(entry);
        }
        Ok(())
    }

    /// Close this generation: destroy idle entries and fail all waiters.
    /// Active entries are destroyed as they come back.
    pub fn close(&self) {
        let idle = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.waiters.close();
            state.idle.drain()
        };
        tracing::debug!(idle = idle.len(), "closing pool");
        for entry in idle {
            self.destroy_reserved(entry);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// One eviction run over the coldest idle entries.
    pub fn evict(&self) {
        let candidates = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            let count = match self.config.num_tests_per_eviction_run {
                n if n <= 0 => state.idle.len(),
                n => n as usize,
            };
            state.idle.take_coldest(count)
        };

        let mut survivors = Vec::with_capacity(candidates.len());
        for entry in candidates {
            let expired = self.eviction.is_expired(&entry.status);
            if expired || (self.config.test_while_idle && !self.factory.validate(&entry.resource)) {
                if !expired {
                    MetricsTracker::increment(&self.metrics.validation_failures);
                }
                MetricsTracker::increment(&self.metrics.total_evicted);
                tracing::debug!(entry = entry.id(), expired, "evicting idle resource");
                self.destroy_reserved(entry);
            } else {
                survivors.push(entry);
            }
        }

        let mut rejected = Vec::new();
        {
            let mut state = self.state.lock();
            // coldest first out, so restore in reverse to keep the order
            for entry in survivors.into_iter().rev() {
                if state.closed {
                    rejected.push(entry);
                } else if state.waiters.is_empty() {
                    state.idle.restore_cold(entry);
                } else {
                    rejected.extend(state.offer_entry(entry, self.config.idle_capacity()));
                }
            }
        }
        for entry in rejected {
            self.destroy_reserved(entry);
        }
    }

    /// Top the idle set up to `min_idle` while nobody is waiting.
    pub fn ensure_min_idle(&self) {
        let min_idle = self.config.min_idle();
        loop {
            {
                let state = self.state.lock();
                if state.closed || !state.waiters.is_empty() || state.idle.len() >= min_idle {
                    return;
                }
            }
            if let Err(error) = self.add_idle() {
                tracing::debug!(%error, "could not top up idle resources");
                return;
            }
        }
    }

    pub fn active_count(&self) -> usize {
        self.state.lock().active.len()
    }

    pub fn idle_count(&self) -> usize {
        self.state.lock().idle.len()
    }

    pub fn waiter_count(&self) -> usize {
        self.state.lock().waiters.len()
    }

    pub fn mean_wait_millis(&self) -> i64 {
        self.metrics.mean_wait_millis()
    }

    pub fn max_wait_millis(&self) -> i64 {
        self.metrics.max_wait_millis()
    }

    pub fn metrics(&self) -> PoolMetrics {
        let (active, idle, waiters) = {
            let state = self.state.lock();
            (state.active.len(), state.idle.len(), state.waiters.len())
        };
        self.metrics.get_metrics(active, idle, waiters, self.config.capacity())
    }
}

/// An async waiter's place in the queue. Dropped while still armed (the
/// borrow future was cancelled) it withdraws, and a grant that raced in is
/// handed back to the pool.
struct PendingWait<'a, F: ResourceFactory> {
    engine: &'a PoolEngine<F>,
    ticket: u64,
    rx: oneshot::Receiver<Grant<F::Resource>>,
    armed: bool,
}

impl<F: ResourceFactory> PendingWait<'_, F> {
    async fn wait(mut self, start: Instant, deadline: Option<Instant>) -> PoolResult<Grant<F::Resource>> {
        let received = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline.into(), &mut self.rx)
                .await
                .ok()
                .and_then(Result::ok),
            None => (&mut self.rx).await.ok(),
        };
        if let Some(grant) = received {
            self.armed = false;
            return Ok(grant);
        }

        match self.withdraw() {
            Withdrawal::Granted(grant) => Ok(grant),
            Withdrawal::Withdrawn => Err(self.engine.exhausted(start)),
            Withdrawal::Closed => Err(PoolError::Closed),
        }
    }

    fn withdraw(&mut self) -> Withdrawal<F::Resource> {
        self.armed = false;
        let rx = &mut self.rx;
        self.engine.withdraw(self.ticket, || rx.try_recv().ok())
    }
}

impl<F: ResourceFactory> Drop for PendingWait<'_, F> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Withdrawal::Granted(grant) = self.withdraw() {
            self.engine.give_back(grant);
        }
    }
}

impl<F: ResourceFactory> PoolEngine<F> {
    /// Undo a grant whose waiter went away.
    fn give_back(&self, grant: Grant<F::Resource>) {
        let mut state = self.state.lock();
        let rejected = match grant {
            Grant::Slot => {
                state.release_slot();
                None
            }
            Grant::Entry(entry) => {
                state.active.remove(entry.id());
                if state.closed {
                    Some(entry)
                } else {
                    state.offer_entry(entry, self.config.idle_capacity())
                }
            }
        };
        drop(state);
        if let Some(entry) = rejected {
            self.destroy_reserved(entry);
        }
    }
}

impl<F: ResourceFactory> std::fmt::Debug for PoolEngine<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("PoolEngine")
            .field("owner", &self.owner)
            .field("idle", &state.idle.len())
            .field("active", &state.active.len())
            .field("waiters", &state.waiters.len())
            .field("total", &state.total)
            .field("closed", &state.closed)
            .finish()
    }
}
