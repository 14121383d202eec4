//! # Generic Object Pool
//!
//! Thread-safe pool of expensive-to-construct resources (connections,
//! buffers, workers) that callers borrow, use and return.
//!
//! ## Features
//!
//! - Pluggable resource construction through [`ResourceFactory`]
//! - Bounded capacity with blocking or async borrow and a maximum wait
//! - FIFO-fair waiter queue with race-free timeout and cancellation
//! - LIFO (default) or FIFO hand-out of idle resources
//! - Validation on create, borrow, return and while idle
//! - Background eviction by idle time or time-to-live, with an idle floor
//! - Automatic return of resources via RAII (Drop trait)
//! - Wait-time statistics and Prometheus metrics export
//! - Serialized re-initialization with a fresh factory and configuration
//!
//! ## Quick Start
//!
//! ```rust
//! use generic_objectpool::{FnFactory, Pool, PoolConfiguration};
//!
//! let pool = Pool::with_factory(
//!     PoolConfiguration::new().with_max_total(4),
//!     FnFactory::new(|| Ok(Vec::<u8>::with_capacity(1024))),
//! );
//! {
//!     let mut buf = pool.borrow().unwrap();
//!     buf.extend_from_slice(b"hello");
//!     // Resource automatically returned when `buf` goes out of scope
//! }
//! assert_eq!(pool.idle_count(), 1);
//! ```

mod config;
mod engine;
mod entry;
mod errors;
mod eviction;
mod factory;
mod metrics;
mod pool;
mod registry;
mod wait;

pub use config::{PoolConfiguration, QueueStrategy, WaitPolicy};
pub use entry::{EntryState, EntryStatus};
pub use errors::{FactoryError, PoolError, PoolResult};
pub use eviction::EvictionPolicy;
pub use factory::{FnFactory, ResourceFactory};
#[cfg(feature = "metrics")]
pub use metrics::MetricsExporter;
pub use metrics::PoolMetrics;
pub use pool::{Pool, Pooled};
