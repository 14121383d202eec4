//! Metrics collection and export for object pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Metrics data for a pool
///
/// # Examples
///
/// ```
/// use generic_objectpool::{FnFactory, Pool, PoolConfiguration};
///
/// let pool = Pool::with_factory(PoolConfiguration::default(), FnFactory::new(|| Ok(1)));
///
/// {
///     let _obj = pool.borrow().unwrap();
///     let metrics = pool.metrics().unwrap();
///     assert_eq!(metrics.total_borrowed, 1);
///     assert_eq!(metrics.active_objects, 1);
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoolMetrics {
    pub active_objects: usize,
    pub idle_objects: usize,
    pub waiters: usize,

    /// Total resources created by the factory
    pub total_created: u64,

    /// Total resources destroyed through the factory
    pub total_destroyed: u64,

    /// Of which destroyed by the eviction sweep
    pub total_evicted: u64,

    pub total_borrowed: u64,
    pub total_returned: u64,

    /// Entries rejected by validation or activation
    pub validation_failures: u64,

    /// Borrows that failed because no capacity became available
    pub exhausted_events: u64,

    pub mean_wait_millis: i64,
    pub max_wait_millis: i64,

    /// Active entries over capacity (0.0 to 1.0); 0.0 when unbounded
    pub utilization: f64,

    /// Configured maximum, `None` when unbounded
    pub max_total: Option<usize>,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("active_objects".to_string(), self.active_objects.to_string());
        metrics.insert("idle_objects".to_string(), self.idle_objects.to_string());
        metrics.insert("waiters".to_string(), self.waiters.to_string());
        metrics.insert("total_created".to_string(), self.total_created.to_string());
        metrics.insert("total_destroyed".to_string(), self.total_destroyed.to_string());
        metrics.insert("total_evicted".to_string(), self.total_evicted.to_string());
        metrics.insert("total_borrowed".to_string(), self.total_borrowed.to_string());
        metrics.insert("total_returned".to_string(), self.total_returned.to_string());
        metrics.insert("validation_failures".to_string(), self.validation_failures.to_string());
        metrics.insert("exhausted_events".to_string(), self.exhausted_events.to_string());
        metrics.insert("mean_wait_millis".to_string(), self.mean_wait_millis.to_string());
        metrics.insert("max_wait_millis".to_string(), self.max_wait_millis.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics.insert(
            "max_total".to_string(),
            self.max_total.map_or_else(|| "unbounded".to_string(), |max| max.to_string()),
        );
        metrics
    }
}

/// Metrics exporter for Prometheus format
#[cfg(feature = "metrics")]
pub struct MetricsExporter;

#[cfg(feature = "metrics")]
impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use generic_objectpool::{FnFactory, MetricsExporter, Pool, PoolConfiguration};
    /// use std::collections::HashMap;
    ///
    /// let pool = Pool::with_factory(PoolConfiguration::default(), FnFactory::new(|| Ok(1)));
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let metrics = pool.metrics().unwrap();
    /// let output = MetricsExporter::export_prometheus(&metrics, "my_pool", Some(&tags)).unwrap();
    /// assert!(output.contains("objectpool_objects_active"));
    /// assert!(output.contains("service=\"api\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> prometheus::Result<String> {
        use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Opts, Registry, TextEncoder};

        let mut labels = HashMap::new();
        labels.insert("pool".to_string(), pool_name.to_string());
        if let Some(tags) = tags {
            labels.extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        let registry = Registry::new();
        let opts = |name: &str, help: &str| Opts::new(name, help).const_labels(labels.clone());

        let gauges = [
            ("objectpool_objects_active", "Current active objects", metrics.active_objects as i64),
            ("objectpool_objects_idle", "Current idle objects", metrics.idle_objects as i64),
            ("objectpool_waiters", "Borrowers currently waiting", metrics.waiters as i64),
            ("objectpool_wait_mean_millis", "Mean borrow wait in milliseconds", metrics.mean_wait_millis),
            ("objectpool_wait_max_millis", "Max borrow wait in milliseconds", metrics.max_wait_millis),
        ];
        for (name, help, value) in gauges {
            let gauge = IntGauge::with_opts(opts(name, help))?;
            gauge.set(value);
            registry.register(Box::new(gauge))?;
        }

        let utilization = Gauge::with_opts(opts("objectpool_utilization", "Pool utilization ratio"))?;
        utilization.set(metrics.utilization);
        registry.register(Box::new(utilization))?;

        let counters = [
            ("objectpool_objects_created_total", "Total objects created", metrics.total_created),
            ("objectpool_objects_destroyed_total", "Total objects destroyed", metrics.total_destroyed),
            ("objectpool_objects_evicted_total", "Total objects evicted", metrics.total_evicted),
            ("objectpool_objects_borrowed_total", "Total objects borrowed", metrics.total_borrowed),
            ("objectpool_objects_returned_total", "Total objects returned", metrics.total_returned),
            ("objectpool_validation_failures_total", "Validation failures", metrics.validation_failures),
            ("objectpool_events_exhausted_total", "Pool exhausted events", metrics.exhausted_events),
        ];
        for (name, help, value) in counters {
            let counter = IntCounter::with_opts(opts(name, help))?;
            counter.inc_by(value);
            registry.register(Box::new(counter))?;
        }

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Internal metrics tracker
#[derive(Debug, Default)]
pub(crate) struct MetricsTracker {
    pub total_created: AtomicU64,
    pub total_destroyed: AtomicU64,
    pub total_evicted: AtomicU64,
    pub total_borrowed: AtomicU64,
    pub total_returned: AtomicU64,
    pub validation_failures: AtomicU64,
    pub exhausted_events: AtomicU64,
    waits: Mutex<WaitStats>,
}

/// Borrow wait totals, updated together so mean and max agree
#[derive(Debug, Default)]
struct WaitStats {
    count: u64,
    sum_micros: u64,
    max_micros: u64,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record how long a successful borrow waited
    pub fn record_wait(&self, waited: Duration) {
        let micros = waited.as_micros().min(u64::MAX as u128) as u64;
        let mut waits = self.waits.lock();
        waits.count += 1;
        waits.sum_micros = waits.sum_micros.saturating_add(micros);
        waits.max_micros = waits.max_micros.max(micros);
    }

    pub fn mean_wait_millis(&self) -> i64 {
        let waits = self.waits.lock();
        if waits.count == 0 {
            return 0;
        }
        (waits.sum_micros / waits.count / 1000) as i64
    }

    pub fn max_wait_millis(&self) -> i64 {
        (self.waits.lock().max_micros / 1000) as i64
    }

    pub fn get_metrics(
        &self,
        active: usize,
        idle: usize,
        waiters: usize,
        max_total: Option<usize>,
    ) -> PoolMetrics {
        let utilization = match max_total {
            Some(capacity) if capacity > 0 => active as f64 / capacity as f64,
            _ => 0.0,
        };

        PoolMetrics {
            active_objects: active,
            idle_objects: idle,
            waiters,
            total_created: self.total_created.load(Ordering::Relaxed),
            total_destroyed: self.total_destroyed.load(Ordering::Relaxed),
            total_evicted: self.total_evicted.load(Ordering::Relaxed),
            total_borrowed: self.total_borrowed.load(Ordering::Relaxed),
            total_returned: self.total_returned.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            exhausted_events: self.exhausted_events.load(Ordering::Relaxed),
            mean_wait_millis: self.mean_wait_millis(),
            max_wait_millis: self.max_wait_millis(),
            utilization,
            max_total,
        }
    }
}
