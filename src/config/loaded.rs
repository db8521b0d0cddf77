//! Immutable, shareable result of a typed load.

use std::ops::Deref;
use std::sync::Arc;

/// A decoded configuration value.
///
/// Cloning is cheap and every clone reads the same value. There is no way
/// to mutate the value once it is wrapped, so a `LoadedConfig<T>` can be
/// shared across threads whenever `T: Send + Sync`.
#[derive(Debug)]
pub struct LoadedConfig<T> {
    value: Arc<T>,
}

impl<T> LoadedConfig<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Arc::new(value),
        }
    }

    /// Borrow the decoded value.
    pub fn get(&self) -> &T {
        &self.value
    }

    /// Shared pointer to the decoded value.
    pub fn shared(&self) -> Arc<T> {
        Arc::clone(&self.value)
    }

    /// True when both handles point at the same decoded value.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl<T: Clone> LoadedConfig<T> {
    /// Take an owned copy of the value.
    pub fn into_inner(self) -> T {
        Arc::try_unwrap(self.value).unwrap_or_else(|shared| (*shared).clone())
    }
}

impl<T> Clone for LoadedConfig<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
        }
    }
}

impl<T> Deref for LoadedConfig<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> AsRef<T> for LoadedConfig<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

impl<T: PartialEq> PartialEq for LoadedConfig<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: Eq> Eq for LoadedConfig<T> {}

impl<T> From<T> for LoadedConfig<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}
