//! Pool configuration options

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::eviction::EvictionPolicy;

/// Order in which idle entries are handed out
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum QueueStrategy {
    /// Most recently returned entry first. Keeps a hot subset in use and
    /// lets the rest age out under an eviction sweep.
    #[default]
    Lifo,

    /// Least recently returned entry first.
    Fifo,
}

/// How long a borrower waits when the pool is exhausted, resolved from
/// [`PoolConfiguration::max_wait_millis`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPolicy {
    /// Block until an entry or capacity becomes available
    Forever,

    /// Fail immediately
    FailFast,

    /// Block for at most the given duration
    Bounded(Duration),
}

/// Configuration for pool behavior
///
/// Count limits are signed: a non-positive `max_total` means unbounded and
/// a negative `max_idle` means no idle limit.
///
/// # Examples
///
/// ```
/// use generic_objectpool::{PoolConfiguration, WaitPolicy};
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_max_total(16)
///     .with_max_idle(4)
///     .with_max_wait(Duration::from_millis(250))
///     .with_test_on_borrow(true);
///
/// assert_eq!(config.capacity(), Some(16));
/// assert_eq!(config.wait_policy(), WaitPolicy::Bounded(Duration::from_millis(250)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfiguration {
    /// Maximum number of live entries, idle plus active
    pub max_total: i32,

    /// Maximum number of idle entries kept around
    pub max_idle: i32,

    /// Idle floor topped up by the eviction thread
    pub min_idle: i32,

    /// Borrow wait bound in milliseconds
    pub max_wait_millis: i64,

    /// Bound on queued waiters; `None` means unbounded
    pub max_waiters: Option<usize>,

    pub queue_strategy: QueueStrategy,

    pub test_on_create: bool,
    pub test_on_borrow: bool,
    pub test_on_return: bool,
    pub test_while_idle: bool,

    /// Period of the eviction thread; non-positive disables it
    pub time_between_eviction_runs_millis: i64,

    /// Idle time after which an entry may be evicted; non-positive disables
    pub min_evictable_idle_time_millis: i64,

    /// Maximum age of an entry; non-positive disables
    pub time_to_live_millis: i64,

    /// Idle entries examined per eviction run; non-positive examines all
    pub num_tests_per_eviction_run: i32,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            max_total: 8,
            max_idle: 8,
            min_idle: 0,
            max_wait_millis: -1,
            max_waiters: None,
            queue_strategy: QueueStrategy::Lifo,
            test_on_create: false,
            test_on_borrow: false,
            test_on_return: false,
            test_while_idle: false,
            time_between_eviction_runs_millis: -1,
            min_evictable_idle_time_millis: 30 * 60 * 1000,
            time_to_live_millis: -1,
            num_tests_per_eviction_run: 3,
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of live entries
    pub fn with_max_total(mut self, max_total: i32) -> Self {
        self.max_total = max_total;
        self
    }

    pub fn with_max_idle(mut self, max_idle: i32) -> Self {
        self.max_idle = max_idle;
        self
    }

    pub fn with_min_idle(mut self, min_idle: i32) -> Self {
        self.min_idle = min_idle;
        self
    }

    /// Set a bounded borrow wait
    pub fn with_max_wait(mut self, wait: Duration) -> Self {
        self.max_wait_millis = clamped_millis(wait);
        self
    }

    /// Set the raw wait value: negative waits forever, zero fails fast
    pub fn with_max_wait_millis(mut self, millis: i64) -> Self {
        self.max_wait_millis = millis;
        self
    }

    pub fn with_max_waiters(mut self, max_waiters: usize) -> Self {
        self.max_waiters = Some(max_waiters);
        self
    }

    pub fn with_queue_strategy(mut self, strategy: QueueStrategy) -> Self {
        self.queue_strategy = strategy;
        self
    }

    pub fn with_test_on_create(mut self, enabled: bool) -> Self {
        self.test_on_create = enabled;
        self
    }

    pub fn with_test_on_borrow(mut self, enabled: bool) -> Self {
        self.test_on_borrow = enabled;
        self
    }

    pub fn with_test_on_return(mut self, enabled: bool) -> Self {
        self.test_on_return = enabled;
        self
    }

    pub fn with_test_while_idle(mut self, enabled: bool) -> Self {
        self.test_while_idle = enabled;
        self
    }

    /// Enable the background eviction thread
    ///
    /// # Examples
    ///
    /// ```
    /// use generic_objectpool::PoolConfiguration;
    /// use std::time::Duration;
    ///
    /// let config = PoolConfiguration::new()
    ///     .with_eviction(Duration::from_secs(30), Duration::from_secs(300));
    ///
    /// assert_eq!(config.eviction_period(), Some(Duration::from_secs(30)));
    /// ```
    pub fn with_eviction(mut self, period: Duration, min_evictable_idle: Duration) -> Self {
        self.time_between_eviction_runs_millis = clamped_millis(period);
        self.min_evictable_idle_time_millis = clamped_millis(min_evictable_idle);
        self
    }

    /// Set time-to-live for entries
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.time_to_live_millis = clamped_millis(ttl);
        self
    }

    pub fn with_num_tests_per_eviction_run(mut self, count: i32) -> Self {
        self.num_tests_per_eviction_run = count;
        self
    }

    /// Live entry limit, `None` when unbounded
    pub fn capacity(&self) -> Option<usize> {
        (self.max_total > 0).then_some(self.max_total as usize)
    }

    /// Idle entry limit, `None` when unbounded
    pub fn idle_capacity(&self) -> Option<usize> {
        (self.max_idle >= 0).then_some(self.max_idle as usize)
    }

    pub fn min_idle(&self) -> usize {
        self.min_idle.max(0) as usize
    }

    pub fn wait_policy(&self) -> WaitPolicy {
        match self.max_wait_millis {
            millis if millis < 0 => WaitPolicy::Forever,
            0 => WaitPolicy::FailFast,
            millis => WaitPolicy::Bounded(Duration::from_millis(millis as u64)),
        }
    }

    pub fn eviction_period(&self) -> Option<Duration> {
        positive_millis(self.time_between_eviction_runs_millis)
    }

    pub(crate) fn eviction_policy(&self) -> EvictionPolicy {
        let ttl = positive_millis(self.time_to_live_millis);
        let idle = positive_millis(self.min_evictable_idle_time_millis);
        match (ttl, idle) {
            (Some(ttl), Some(idle_timeout)) => EvictionPolicy::Combined { ttl, idle_timeout },
            (Some(ttl), None) => EvictionPolicy::TimeToLive(ttl),
            (None, Some(idle)) => EvictionPolicy::IdleTimeout(idle),
            (None, None) => EvictionPolicy::None,
        }
    }
}

fn positive_millis(millis: i64) -> Option<Duration> {
    (millis > 0).then(|| Duration::from_millis(millis as u64))
}

fn clamped_millis(duration: Duration) -> i64 {
    duration.as_millis().min(i64::MAX as u128) as i64
}
