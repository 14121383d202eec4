//! Eviction policies and the background eviction thread

use std::sync::Weak;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, Sender};
use crossbeam::select;

use crate::engine::PoolEngine;
use crate::entry::EntryStatus;
use crate::factory::ResourceFactory;

/// Eviction policy for idle entries, derived from the configured
/// idle time and time-to-live.
///
/// # Examples
///
/// ```
/// use generic_objectpool::{EvictionPolicy, PoolConfiguration};
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new().with_ttl(Duration::from_secs(3600));
/// // entries older than an hour, or idle for longer than the configured
/// // minimum evictable idle time, are destroyed by the sweep
/// assert!(matches!(EvictionPolicy::from(&config), EvictionPolicy::Combined { .. }));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// No eviction
    #[default]
    None,

    /// Time-to-live: entries expire after a fixed duration
    TimeToLive(Duration),

    /// Idle timeout: entries expire after being idle
    IdleTimeout(Duration),

    /// Combined: TTL or idle timeout
    Combined {
        ttl: Duration,
        idle_timeout: Duration,
    },
}

impl EvictionPolicy {
    pub fn is_expired(&self, status: &EntryStatus) -> bool {
        match self {
            EvictionPolicy::None => false,
            EvictionPolicy::TimeToLive(ttl) => status.age() > *ttl,
            EvictionPolicy::IdleTimeout(timeout) => status.idle_time() > *timeout,
            EvictionPolicy::Combined { ttl, idle_timeout } => {
                status.age() > *ttl || status.idle_time() > *idle_timeout
            }
        }
    }
}

impl From<&crate::config::PoolConfiguration> for EvictionPolicy {
    fn from(config: &crate::config::PoolConfiguration) -> Self {
        config.eviction_policy()
    }
}

/// Handle to the eviction thread of one pool generation. Dropping it
/// disconnects the shutdown channel and the thread exits.
pub(crate) struct Evictor {
    _shutdown: Sender<()>,
}

impl Evictor {
    pub fn start<F: ResourceFactory>(pool: Weak<PoolEngine<F>>, period: Duration) -> Option<Self> {
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(0);
        let spawned = thread::Builder::new()
            .name("objectpool-evictor".to_string())
            .spawn(move || {
                let ticker = channel::tick(period);
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            let Some(pool) = pool.upgrade() else { break };
                            if pool.is_closed() {
                                break;
                            }
                            pool.evict();
                            pool.ensure_min_idle();
                        }
                        recv(shutdown_rx) -> _ => break,
                    }
                }
                tracing::debug!("eviction thread stopped");
            });

        match spawned {
            Ok(_) => Some(Self {
                _shutdown: shutdown_tx,
            }),
            Err(error) => {
                tracing::error!(%error, "failed to start eviction thread");
                None
            }
        }
    }
}
