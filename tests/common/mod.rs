#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use generic_objectpool::{FactoryError, ResourceFactory};

#[derive(Debug, Default)]
pub struct Counters {
    pub created: AtomicUsize,
    pub destroyed: AtomicUsize,
    pub fail_create: AtomicBool,
    pub fail_destroy: AtomicBool,
    /// Resources numbered below this fail validation
    pub valid_from: AtomicUsize,
}

/// Factory handing out sequential numbers and counting lifecycle calls
#[derive(Debug, Clone, Default)]
pub struct TestFactory {
    pub counters: Arc<Counters>,
}

impl TestFactory {
    pub fn created(&self) -> usize {
        self.counters.created.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> usize {
        self.counters.destroyed.load(Ordering::SeqCst)
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.counters.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_destroy(&self, fail: bool) {
        self.counters.fail_destroy.store(fail, Ordering::SeqCst);
    }

    pub fn set_valid_from(&self, first_valid: usize) {
        self.counters.valid_from.store(first_valid, Ordering::SeqCst);
    }
}

impl ResourceFactory for TestFactory {
    type Resource = usize;

    fn create(&self) -> Result<usize, FactoryError> {
        if self.counters.fail_create.load(Ordering::SeqCst) {
            return Err(FactoryError::new("create refused"));
        }
        Ok(self.counters.created.fetch_add(1, Ordering::SeqCst))
    }

    fn destroy(&self, _resource: usize) -> Result<(), FactoryError> {
        self.counters.destroyed.fetch_add(1, Ordering::SeqCst);
        if self.counters.fail_destroy.load(Ordering::SeqCst) {
            return Err(FactoryError::new("destroy refused"));
        }
        Ok(())
    }

    fn validate(&self, resource: &usize) -> bool {
        *resource >= self.counters.valid_from.load(Ordering::SeqCst)
    }
}

/// Poll `condition` until it holds, panicking after two seconds
pub fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(2));
    }
}
