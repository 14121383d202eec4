//! The pool facade and the borrowed-resource guard

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::config::PoolConfiguration;
use crate::engine::PoolEngine;
use crate::entry::{EntryStatus, PooledEntry};
use crate::errors::{FactoryError, PoolError, PoolResult};
use crate::eviction::Evictor;
use crate::factory::ResourceFactory;
use crate::metrics::PoolMetrics;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(0);

/// A borrowed resource that goes back to its pool when dropped
///
/// Use [`Pool::return_resource`] to return it explicitly and observe the
/// outcome, or [`Pool::return_broken`] to have it destroyed instead.
pub struct Pooled<F: ResourceFactory> {
    resource: Option<F::Resource>,
    id: u64,
    status: EntryStatus,
    engine: Arc<PoolEngine<F>>,
}

impl<F: ResourceFactory> Pooled<F> {
    fn new(entry: PooledEntry<F::Resource>, engine: Arc<PoolEngine<F>>) -> Self {
        let mut status = entry.status;
        status.mark_borrowed();
        Self {
            id: entry.id(),
            resource: Some(entry.resource),
            status,
            engine,
        }
    }

    /// Identity of the pool entry backing this resource
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Snapshot of the entry's bookkeeping as of this borrow
    pub fn status(&self) -> &EntryStatus {
        &self.status
    }

    fn into_parts(mut self) -> Option<(u64, F::Resource, Arc<PoolEngine<F>>)> {
        let resource = self.resource.take()?;
        Some((self.id, resource, Arc::clone(&self.engine)))
    }
}

impl<F: ResourceFactory> Deref for Pooled<F> {
    type Target = F::Resource;

    fn deref(&self) -> &Self::Target {
        self.resource.as_ref().expect("Value already taken")
    }
}

impl<F: ResourceFactory> DerefMut for Pooled<F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.resource.as_mut().expect("Value already taken")
    }
}

impl<F: ResourceFactory> Drop for Pooled<F> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take() {
            if let Err(error) = self.engine.release(self.id, resource) {
                tracing::warn!(entry = self.id, %error, "failed to return dropped resource");
            }
        }
    }
}

impl<F> fmt::Debug for Pooled<F>
where
    F: ResourceFactory,
    F::Resource: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled")
            .field("id", &self.id)
            .field("borrow_count", &self.status.borrow_count())
            .field("resource", &self.resource)
            .finish()
    }
}

struct Generation<F: ResourceFactory> {
    engine: Arc<PoolEngine<F>>,
    _evictor: Option<Evictor>,
}

/// Thread-safe pool of resources produced by a [`ResourceFactory`]
///
/// A pool starts either absent ([`Pool::new`]) or initialized
/// ([`Pool::with_factory`]) and can be re-initialized at any time. Borrows
/// already in flight stay bound to the generation they started on and fail
/// with [`PoolError::Closed`] if it closes before they complete.
///
/// Statistics getters return `-1` while the pool is absent or closed.
///
/// # Examples
///
/// ```
/// use generic_objectpool::{FnFactory, Pool, PoolConfiguration};
///
/// let pool = Pool::with_factory(
///     PoolConfiguration::new().with_max_total(2),
///     FnFactory::new(|| Ok(String::from("conn"))),
/// );
///
/// let conn = pool.borrow().unwrap();
/// assert_eq!(*conn, "conn");
/// assert_eq!(pool.active_count(), 1);
///
/// pool.return_resource(Some(conn)).unwrap();
/// assert_eq!(pool.idle_count(), 1);
///
/// pool.destroy();
/// assert_eq!(pool.idle_count(), -1);
/// ```
pub struct Pool<F: ResourceFactory> {
    id: u64,
    current: RwLock<Option<Generation<F>>>,
}

impl<F: ResourceFactory> Default for Pool<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ResourceFactory> Pool<F> {
    /// Create a pool with no generation yet; borrows fail with
    /// [`PoolError::Closed`] until [`initialize`](Self::initialize) is called.
    pub fn new() -> Self {
        Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            current: RwLock::new(None),
        }
    }

    pub fn with_factory(config: PoolConfiguration, factory: F) -> Self {
        let pool = Self::new();
        pool.initialize(config, factory);
        pool
    }

    /// Replace the current generation with a fresh, empty one. The previous
    /// generation is closed; problems doing so are logged.
    pub fn initialize(&self, config: PoolConfiguration, factory: F) {
        let period = config.eviction_period();
        let engine = Arc::new(PoolEngine::new(self.id, config, factory));
        let evictor = period.and_then(|period| Evictor::start(Arc::downgrade(&engine), period));
        let generation = Generation {
            engine,
            _evictor: evictor,
        };

        let previous = self.current.write().replace(generation);
        if let Some(previous) = previous {
            tracing::debug!(pool = self.id, "closing previous pool generation");
            previous.engine.close();
        }
    }

    fn engine(&self) -> Option<Arc<PoolEngine<F>>> {
        self.current.read().as_ref().map(|generation| Arc::clone(&generation.engine))
    }

    fn live_engine(&self) -> Option<Arc<PoolEngine<F>>> {
        self.engine().filter(|engine| !engine.is_closed())
    }

    /// Borrow a resource, blocking while the pool is exhausted for at most
    /// the configured maximum wait.
    pub fn borrow(&self) -> PoolResult<Pooled<F>> {
        let engine = self.engine().ok_or(PoolError::Closed)?;
        let entry = engine.borrow()?;
        Ok(Pooled::new(entry, engine))
    }

    /// Borrow a resource without blocking the executor thread while waiting.
    ///
    /// Factory calls still run inline on the calling task.
    pub async fn borrow_async(&self) -> PoolResult<Pooled<F>> {
        let engine = self.engine().ok_or(PoolError::Closed)?;
        let entry = engine.borrow_async().await?;
        Ok(Pooled::new(entry, engine))
    }

    /// Return a borrowed resource. `None` is a no-op.
    pub fn return_resource(&self, resource: Option<Pooled<F>>) -> PoolResult<()> {
        let Some(pooled) = resource else {
            return Ok(());
        };
        if pooled.engine.owner() != self.id {
            return Err(PoolError::UnknownResource);
        }
        match pooled.into_parts() {
            Some((id, resource, engine)) => engine.release(id, resource),
            None => Ok(()),
        }
    }

    /// Destroy a borrowed resource instead of returning it, freeing its
    /// capacity slot. `None` is a no-op.
    pub fn return_broken(&self, resource: Option<Pooled<F>>) -> PoolResult<()> {
        let Some(pooled) = resource else {
            return Ok(());
        };
        if pooled.engine.owner() != self.id {
            return Err(PoolError::UnknownResource);
        }
        match pooled.into_parts() {
            Some((id, resource, engine)) => engine.invalidate(id, resource),
            None => Ok(()),
        }
    }

    /// Close the pool. Idle resources are destroyed now, borrowed ones when
    /// they come back.
    pub fn destroy(&self) {
        if let Some(engine) = self.engine() {
            engine.close();
        }
    }

    /// Eagerly create `count` idle resources. Resources added before a
    /// failure stay in the pool.
    pub fn add_idle_objects(&self, count: usize) -> PoolResult<()> {
        let engine = self.engine().ok_or(PoolError::Closed)?;
        add_idle(&engine, count)
    }

    /// Like [`add_idle_objects`](Self::add_idle_objects), on tokio's
    /// blocking thread pool.
    pub async fn add_idle_objects_async(&self, count: usize) -> PoolResult<()> {
        let engine = self.engine().ok_or(PoolError::Closed)?;
        tokio::task::spawn_blocking(move || add_idle(&engine, count))
            .await
            .map_err(|_| PoolError::Cancelled)?
    }

    /// Whether the pool is absent or closed
    pub fn is_closed(&self) -> bool {
        self.live_engine().is_none()
    }

    /// Configuration of the current generation
    pub fn config(&self) -> Option<PoolConfiguration> {
        self.engine().map(|engine| engine.config().clone())
    }

    pub fn active_count(&self) -> i64 {
        self.live_engine().map_or(-1, |engine| engine.active_count() as i64)
    }

    pub fn idle_count(&self) -> i64 {
        self.live_engine().map_or(-1, |engine| engine.idle_count() as i64)
    }

    pub fn waiter_count(&self) -> i64 {
        self.live_engine().map_or(-1, |engine| engine.waiter_count() as i64)
    }

    pub fn mean_wait_millis(&self) -> i64 {
        self.live_engine().map_or(-1, |engine| engine.mean_wait_millis())
    }

    pub fn max_wait_millis(&self) -> i64 {
        self.live_engine().map_or(-1, |engine| engine.max_wait_millis())
    }

    /// Get pool metrics
    pub fn metrics(&self) -> Option<PoolMetrics> {
        self.live_engine().map(|engine| engine.metrics())
    }
}

fn add_idle<F: ResourceFactory>(engine: &PoolEngine<F>, count: usize) -> PoolResult<()> {
    for _ in 0..count {
        engine.add_idle().map_err(|error| match error {
            PoolError::Closed => PoolError::Closed,
            cause => FactoryError::with_source("Error trying to add idle objects", cause).into(),
        })?;
    }
    Ok(())
}

impl<F: ResourceFactory> Drop for Pool<F> {
    fn drop(&mut self) {
        if let Some(generation) = self.current.get_mut().take() {
            generation.engine.close();
        }
    }
}

impl<F: ResourceFactory> fmt::Debug for Pool<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("id", &self.id)
            .field("engine", &self.engine())
            .finish()
    }
}
