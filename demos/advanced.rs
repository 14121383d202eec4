//! Advanced features: custom factories, eviction, validation, metrics

use generic_objectpool::{
    FactoryError, MetricsExporter, Pool, PoolConfiguration, QueueStrategy, ResourceFactory,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

#[derive(Debug)]
struct Connection {
    serial: usize,
    healthy: bool,
}

#[derive(Default)]
struct ConnectionFactory {
    next_id: AtomicUsize,
    destroyed: AtomicUsize,
}

impl ResourceFactory for ConnectionFactory {
    type Resource = Connection;

    fn create(&self) -> Result<Connection, FactoryError> {
        let serial = self.next_id.fetch_add(1, Ordering::SeqCst);
        println!("   [factory] open connection {}", serial);
        Ok(Connection { serial, healthy: true })
    }

    fn destroy(&self, conn: Connection) -> Result<(), FactoryError> {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        println!("   [factory] close connection {}", conn.serial);
        Ok(())
    }

    fn validate(&self, conn: &Connection) -> bool {
        conn.healthy
    }
}

fn main() {
    println!("=== Generic Object Pool - Advanced Features ===\n");

    // Example 1: Broken resources
    broken_resources();

    // Example 2: Eviction / TTL
    eviction_ttl();

    // Example 3: Blocking waiters
    blocking_waiters();

    // Example 4: Prometheus metrics
    prometheus_export();
}

fn broken_resources() {
    println!("1. Broken Resources:");

    let config = PoolConfiguration::new()
        .with_max_total(2)
        .with_test_on_return(true);
    let pool = Pool::with_factory(config, ConnectionFactory::default());

    let conn = pool.borrow().unwrap();
    println!("   Using: {:?}", *conn);
    pool.return_broken(Some(conn)).unwrap();

    let mut conn = pool.borrow().unwrap();
    println!("   Fresh connection after invalidate: {}", conn.serial);
    conn.healthy = false;
    // fails validation on return and is destroyed
    drop(conn);
    println!("   Idle after unhealthy return: {}\n", pool.idle_count());
}

fn eviction_ttl() {
    println!("2. Eviction / TTL:");

    let config = PoolConfiguration::new()
        .with_eviction(Duration::from_millis(100), Duration::from_millis(200))
        .with_min_idle(1)
        .with_queue_strategy(QueueStrategy::Fifo);
    let pool = Pool::with_factory(config, ConnectionFactory::default());

    pool.add_idle_objects(3).unwrap();
    println!("   Initial idle: {}", pool.idle_count());

    println!("   Waiting for the eviction thread...");
    thread::sleep(Duration::from_millis(600));
    println!("   Idle after eviction (min idle 1): {}\n", pool.idle_count());
}

fn blocking_waiters() {
    println!("3. Blocking Waiters:");

    let config = PoolConfiguration::new()
        .with_max_total(1)
        .with_max_wait(Duration::from_secs(2));
    let pool = Pool::with_factory(config, ConnectionFactory::default());

    let held = pool.borrow().unwrap();
    thread::scope(|scope| {
        let waiter = scope.spawn(|| pool.borrow().map(|conn| conn.serial));
        while pool.waiter_count() < 1 {
            thread::sleep(Duration::from_millis(5));
        }
        println!("   Waiters: {}", pool.waiter_count());
        thread::sleep(Duration::from_millis(50));
        pool.return_resource(Some(held)).unwrap();
        println!("   Waiter received connection {:?}", waiter.join().unwrap());
    });
    println!("   Max wait: {}ms\n", pool.max_wait_millis());
}

fn prometheus_export() {
    println!("4. Prometheus Metrics Export:");

    let pool = Pool::with_factory(PoolConfiguration::default(), ConnectionFactory::default());

    // Use some objects
    {
        let _conn1 = pool.borrow().unwrap();
        let _conn2 = pool.borrow().unwrap();

        let mut tags = std::collections::HashMap::new();
        tags.insert("service".to_string(), "example".to_string());
        tags.insert("env".to_string(), "dev".to_string());

        if let Some(metrics) = pool.metrics() {
            match MetricsExporter::export_prometheus(&metrics, "example_pool", Some(&tags)) {
                Ok(text) => println!("{}", text),
                Err(e) => println!("   Export failed: {}", e),
            }
        }
    }
}
