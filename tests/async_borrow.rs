mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::TestFactory;
use generic_objectpool::{Pool, PoolConfiguration, PoolError};
use tokio::time::{sleep, timeout};

fn pool_with(config: PoolConfiguration) -> (Arc<Pool<TestFactory>>, TestFactory) {
    let factory = TestFactory::default();
    (Arc::new(Pool::with_factory(config, factory.clone())), factory)
}

async fn wait_for_waiters(pool: &Pool<TestFactory>, count: i64) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while pool.waiter_count() != count {
        assert!(Instant::now() < deadline, "waiters never queued");
        sleep(Duration::from_millis(2)).await;
    }
}

#[tokio::test]
async fn async_borrow_and_return() {
    let (pool, _) = pool_with(PoolConfiguration::default());

    let obj = pool.borrow_async().await.unwrap();
    assert_eq!(*obj, 0);
    assert_eq!(pool.active_count(), 1);
    drop(obj);

    assert_eq!(pool.idle_count(), 1);
    assert_eq!(*pool.borrow_async().await.unwrap(), 0);
}

#[tokio::test]
async fn async_waiter_receives_returned_entry() {
    let (pool, _) = pool_with(PoolConfiguration::new().with_max_total(1));
    let held = pool.borrow_async().await.unwrap();
    let held_id = held.id();

    let waiter = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { pool.borrow_async().await.map(|obj| obj.id()) })
    };
    wait_for_waiters(&pool, 1).await;

    pool.return_resource(Some(held)).unwrap();
    assert_eq!(waiter.await.unwrap().unwrap(), held_id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn async_and_blocking_waiters_share_one_queue() {
    let (pool, _) = pool_with(PoolConfiguration::new().with_max_total(1));
    let held = pool.borrow().unwrap();

    let blocking = {
        let pool = Arc::clone(&pool);
        tokio::task::spawn_blocking(move || pool.borrow().map(|obj| *obj))
    };
    wait_for_waiters(&pool, 1).await;
    let task = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { pool.borrow_async().await.map(|obj| *obj) })
    };
    wait_for_waiters(&pool, 2).await;

    drop(held);
    assert_eq!(blocking.await.unwrap().unwrap(), 0);
    assert_eq!(task.await.unwrap().unwrap(), 0);
}

#[tokio::test]
async fn async_borrow_times_out() {
    let config = PoolConfiguration::new()
        .with_max_total(1)
        .with_max_wait(Duration::from_millis(30));
    let (pool, _) = pool_with(config);
    let _held = pool.borrow_async().await.unwrap();

    let start = Instant::now();
    assert!(matches!(pool.borrow_async().await, Err(PoolError::Exhausted(_))));
    assert!(start.elapsed() >= Duration::from_millis(30));
    assert_eq!(pool.waiter_count(), 0);
}

#[tokio::test]
async fn cancelled_borrow_leaves_the_queue() {
    let (pool, _) = pool_with(PoolConfiguration::new().with_max_total(1));
    let held = pool.borrow_async().await.unwrap();

    let cancelled = timeout(Duration::from_millis(20), pool.borrow_async()).await;
    assert!(cancelled.is_err());
    assert_eq!(pool.waiter_count(), 0);

    pool.return_resource(Some(held)).unwrap();
    assert_eq!(pool.idle_count(), 1);
    assert_eq!(pool.active_count(), 0);
}

#[tokio::test]
async fn cancelled_borrow_hands_back_granted_entry() {
    let (pool, _) = pool_with(PoolConfiguration::new().with_max_total(1));
    let held = pool.borrow_async().await.unwrap();

    {
        let pending = pool.borrow_async();
        tokio::pin!(pending);
        assert!(timeout(Duration::from_millis(10), &mut pending).await.is_err());
        assert_eq!(pool.waiter_count(), 1);

        // granted but never polled again
        pool.return_resource(Some(held)).unwrap();
        assert_eq!(pool.waiter_count(), 0);
    }

    assert_eq!(pool.idle_count(), 1);
    assert_eq!(pool.active_count(), 0);
}

#[tokio::test]
async fn cancelled_borrow_hands_back_granted_slot() {
    let (pool, factory) = pool_with(PoolConfiguration::new().with_max_total(1));
    let held = pool.borrow_async().await.unwrap();

    {
        let pending = pool.borrow_async();
        tokio::pin!(pending);
        assert!(timeout(Duration::from_millis(10), &mut pending).await.is_err());

        pool.return_broken(Some(held)).unwrap();
        assert_eq!(pool.waiter_count(), 0);
    }

    // the slot came back, so capacity allows a fresh resource
    pool.add_idle_objects(1).unwrap();
    assert_eq!(pool.idle_count(), 1);
    assert_eq!(factory.created(), 2);
}

#[tokio::test]
async fn destroy_fails_async_waiters() {
    let (pool, _) = pool_with(PoolConfiguration::new().with_max_total(1));
    let _held = pool.borrow_async().await.unwrap();

    let waiter = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { pool.borrow_async().await.map(|obj| *obj) })
    };
    wait_for_waiters(&pool, 1).await;

    pool.destroy();
    assert!(matches!(waiter.await.unwrap(), Err(PoolError::Closed)));
}

#[tokio::test]
async fn add_idle_objects_async_fills_the_pool() {
    let (pool, factory) = pool_with(PoolConfiguration::new().with_max_total(4));

    pool.add_idle_objects_async(3).await.unwrap();
    assert_eq!(pool.idle_count(), 3);

    assert!(matches!(
        pool.add_idle_objects_async(3).await,
        Err(PoolError::Factory(_))
    ));
    assert_eq!(pool.idle_count(), 4);
    assert_eq!(factory.created(), 4);
}
