//! Async usage examples

use generic_objectpool::{FnFactory, Pool, PoolConfiguration};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[tokio::main]
async fn main() {
    println!("=== Generic Object Pool - Async Examples ===\n");

    // Example 1: Async borrow
    async_borrow().await;

    // Example 2: Async with timeout
    async_with_timeout().await;

    // Example 3: Warm up idle resources
    warmup().await;

    // Example 4: Concurrent access
    concurrent_access().await;
}

async fn async_borrow() {
    println!("1. Async Borrow:");
    let pool = Pool::with_factory(PoolConfiguration::default(), FnFactory::new(|| Ok(7)));

    {
        let obj = pool.borrow_async().await.unwrap();
        println!("   Got object asynchronously: {}", *obj);
    }

    println!();
}

async fn async_with_timeout() {
    println!("2. Async with Timeout:");

    let config = PoolConfiguration::new()
        .with_max_total(1)
        .with_max_wait(Duration::from_millis(100));
    let pool = Pool::with_factory(config, FnFactory::new(|| Ok(42)));

    // Hold the only object
    let _obj = pool.borrow().unwrap();

    // Try to get another (should time out)
    match pool.borrow_async().await {
        Ok(_) => println!("   Got object"),
        Err(e) => println!("   Error: {}", e),
    }

    println!();
}

async fn warmup() {
    println!("3. Warm Up:");

    let pool = Pool::with_factory(
        PoolConfiguration::new().with_max_total(10),
        FnFactory::new(|| {
            println!("   Creating new object...");
            Ok(42)
        }),
    );

    println!("   Warming up pool with 5 objects...");
    pool.add_idle_objects_async(5).await.unwrap();
    println!("   Idle after warmup: {}", pool.idle_count());

    // Borrow (should not create a new one)
    {
        let obj = pool.borrow_async().await.unwrap();
        println!("   Got pre-created object: {}", *obj);
    }

    println!();
}

async fn concurrent_access() {
    println!("4. Concurrent Access:");

    let config = PoolConfiguration::new()
        .with_max_total(3)
        .with_max_wait(Duration::from_secs(1));
    let pool = Arc::new(Pool::with_factory(config, FnFactory::new(|| Ok(String::from("conn")))));

    let mut handles = vec![];

    for i in 0..10 {
        let pool_clone = Arc::clone(&pool);
        let handle = tokio::spawn(async move {
            match pool_clone.borrow_async().await {
                Ok(obj) => {
                    println!("   Task {} got object {}", i, obj.id());
                    sleep(Duration::from_millis(50)).await;
                }
                Err(e) => println!("   Task {} couldn't get object: {}", i, e),
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.await.unwrap();
    }

    println!("   Final idle: {}, mean wait: {}ms", pool.idle_count(), pool.mean_wait_millis());
}
