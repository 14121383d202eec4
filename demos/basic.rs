//! Basic usage examples for Pool

use generic_objectpool::{FnFactory, Pool, PoolConfiguration, PoolError};
use std::time::Duration;

fn main() {
    println!("=== Generic Object Pool - Basic Examples ===\n");

    // Example 1: Simple pool of buffers
    simple_pool();

    // Example 2: Pool with configuration
    configured_pool();

    // Example 3: Fail fast when exhausted
    fail_fast();

    // Example 4: Statistics and metrics
    statistics();
}

fn simple_pool() {
    println!("1. Simple Pool:");
    let pool = Pool::with_factory(
        PoolConfiguration::default(),
        FnFactory::new(|| Ok(Vec::<u8>::with_capacity(64))),
    );

    {
        let mut buf = pool.borrow().unwrap();
        buf.extend_from_slice(b"hello");
        println!("   Borrowed buffer {} holding {} bytes", buf.id(), buf.len());
        // Buffer automatically returned when dropped
    }

    println!("   Idle after return: {}\n", pool.idle_count());
}

fn configured_pool() {
    println!("2. Configured Pool:");

    let config = PoolConfiguration::new()
        .with_max_total(5)
        .with_max_idle(3)
        .with_test_on_borrow(true);

    let pool = Pool::with_factory(
        config,
        FnFactory::new(|| Ok(1)).with_validator(|x| *x > 0),
    );
    pool.add_idle_objects(3).unwrap();

    {
        let _obj1 = pool.borrow().unwrap();
        let _obj2 = pool.borrow().unwrap();
        println!("   Active objects: {}", pool.active_count());
        println!("   Idle objects: {}", pool.idle_count());
    }

    println!("   After return - Idle: {}\n", pool.idle_count());
}

fn fail_fast() {
    println!("3. Fail Fast:");
    let config = PoolConfiguration::new()
        .with_max_total(1)
        .with_max_wait_millis(0);
    let pool = Pool::with_factory(config, FnFactory::new(|| Ok(42)));

    let obj1 = pool.borrow().unwrap();
    println!("   First borrow: {}", *obj1);

    match pool.borrow() {
        Err(PoolError::Exhausted(waited)) => println!("   Second borrow: exhausted after {waited:?}"),
        other => println!("   Second borrow: {other:?}"),
    }

    pool.return_resource(Some(obj1)).unwrap();
    println!("   Third borrow: {}\n", *pool.borrow().unwrap());
}

fn statistics() {
    println!("4. Statistics:");
    let pool = Pool::with_factory(
        PoolConfiguration::new().with_max_wait(Duration::from_millis(50)),
        FnFactory::new(|| Ok("conn")),
    );

    {
        let _a = pool.borrow().unwrap();
        let _b = pool.borrow().unwrap();
        println!("   Active: {}, Idle: {}", pool.active_count(), pool.idle_count());
        println!("   Mean wait: {}ms, Max wait: {}ms", pool.mean_wait_millis(), pool.max_wait_millis());
    }

    if let Some(metrics) = pool.metrics() {
        println!("\n   Metrics:");
        for (key, value) in metrics.export() {
            println!("     {}: {}", key, value);
        }
    }

    pool.destroy();
    println!("\n   After destroy - Active: {}, Idle: {}", pool.active_count(), pool.idle_count());
}
