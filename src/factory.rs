//! Pluggable resource construction

use std::fmt;
use std::marker::PhantomData;

use crate::errors::FactoryError;

/// Creates, checks and disposes of the resources held by a pool.
///
/// Only [`create`](ResourceFactory::create) is required. The remaining hooks
/// default to treating every resource as valid and disposing of it by drop.
/// The pool never calls a factory method while holding its internal lock, so
/// implementations are free to block on I/O.
pub trait ResourceFactory: Send + Sync + 'static {
    /// The pooled resource type
    type Resource: Send + 'static;

    /// Build a new resource
    fn create(&self) -> Result<Self::Resource, FactoryError>;

    /// Dispose of a resource. Failures are logged by the pool, never surfaced.
    fn destroy(&self, resource: Self::Resource) -> Result<(), FactoryError> {
        drop(resource);
        Ok(())
    }

    /// Whether the resource is still usable
    fn validate(&self, _resource: &Self::Resource) -> bool {
        true
    }

    /// Prepare a resource that is about to be handed to a borrower
    fn activate(&self, _resource: &mut Self::Resource) -> Result<(), FactoryError> {
        Ok(())
    }

    /// Reset a resource that is about to become idle
    fn passivate(&self, _resource: &mut Self::Resource) -> Result<(), FactoryError> {
        Ok(())
    }
}

/// A [`ResourceFactory`] built from a closure
///
/// # Examples
///
/// ```
/// use generic_objectpool::{FnFactory, ResourceFactory};
///
/// let factory = FnFactory::new(|| Ok(Vec::<u8>::with_capacity(4096)))
///     .with_validator(|buf| buf.capacity() >= 4096);
///
/// let buf = factory.create().unwrap();
/// assert!(factory.validate(&buf));
/// ```
pub struct FnFactory<T, C> {
    create: C,
    validator: Option<fn(&T) -> bool>,
    _marker: PhantomData<fn() -> T>,
}

impl<T, C> FnFactory<T, C>
where
    C: Fn() -> Result<T, FactoryError>,
{
    pub fn new(create: C) -> Self {
        Self {
            create,
            validator: None,
            _marker: PhantomData,
        }
    }

    /// Attach a validation function
    pub fn with_validator(mut self, validator: fn(&T) -> bool) -> Self {
        self.validator = Some(validator);
        self
    }
}

impl<T, C> fmt::Debug for FnFactory<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnFactory")
            .field("has_validator", &self.validator.is_some())
            .finish()
    }
}

impl<T, C> ResourceFactory for FnFactory<T, C>
where
    T: Send + 'static,
    C: Fn() -> Result<T, FactoryError> + Send + Sync + 'static,
{
    type Resource = T;

    fn create(&self) -> Result<T, FactoryError> {
        (self.create)()
    }

    fn validate(&self, resource: &T) -> bool {
        self.validator.is_none_or(|validate| validate(resource))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fn_factory_without_validator_accepts_everything() {
        let factory = FnFactory::new(|| Ok(7));
        let value = factory.create().unwrap();
        assert_eq!(value, 7);
        assert!(factory.validate(&value));
        assert!(factory.destroy(value).is_ok());
    }

    #[test]
    fn test_fn_factory_validator() {
        let factory = FnFactory::new(|| Ok(-1)).with_validator(|x| *x > 0);
        assert!(!factory.validate(&-1));
        assert!(factory.validate(&3));
    }

    #[test]
    fn test_fn_factory_propagates_create_error() {
        let factory = FnFactory::<i32, _>::new(|| Err(FactoryError::new("offline")));
        let err = factory.create().unwrap_err();
        assert_eq!(err.message(), "offline");
    }
}
