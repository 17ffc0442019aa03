//! Generic versioned document with atomic compare-and-swap.
//!
//! A [`VersionedDocument`] holds one immutable value behind an `Arc`
//! together with a version stamp. Readers clone the `Arc` under a shared
//! lock and never observe a half-applied write; writers replace the value
//! whole under the exclusive lock, so the critical section is a version
//! comparison plus a pointer swap.

use std::sync::{Arc, PoisonError, RwLock};

use shapewise_types::Version;

use crate::StoreError;

/// An immutable copy of a document tagged with the version it was read at.
#[derive(Debug)]
pub struct Snapshot<T> {
    version: Version,
    value: Arc<T>,
}

impl<T> Snapshot<T> {
    pub fn version(&self) -> Version {
        self.version
    }

    pub fn value(&self) -> &Arc<T> {
        &self.value
    }

    pub fn into_value(self) -> Arc<T> {
        self.value
    }
}

// Manual impl: cloning a snapshot never requires `T: Clone`.
impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            version: self.version,
            value: Arc::clone(&self.value),
        }
    }
}

/// A value plus a monotonically increasing version stamp.
#[derive(Debug)]
pub struct VersionedDocument<T> {
    current: RwLock<Snapshot<T>>,
}

impl<T> VersionedDocument<T> {
    /// Creates a document at [`Version::ZERO`].
    pub fn new(value: T) -> Self {
        Self::with_version(value, Version::ZERO)
    }

    /// Creates a document resuming at a known version.
    pub fn with_version(value: T, version: Version) -> Self {
        Self {
            current: RwLock::new(Snapshot {
                version,
                value: Arc::new(value),
            }),
        }
    }

    /// Returns the current snapshot.
    ///
    /// Never blocks on other readers and never fails.
    pub fn read(&self) -> Snapshot<T> {
        // The value is replaced whole, so a poisoned guard still holds a
        // consistent snapshot.
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn version(&self) -> Version {
        self.read().version
    }

    /// Replaces the value iff the current version equals `expected`.
    ///
    /// On success the new version is `expected + 1`.
    pub fn compare_and_swap(&self, expected: Version, value: T) -> Result<Snapshot<T>, StoreError> {
        self.compare_and_swap_with(expected, |_, _| value)
    }

    /// Like [`compare_and_swap`](Self::compare_and_swap), but builds the new
    /// value inside the critical section from the current value and the
    /// version it will be stored at.
    ///
    /// `build` must be short and must not perform I/O; every other writer
    /// waits on it.
    pub fn compare_and_swap_with<F>(&self, expected: Version, build: F) -> Result<Snapshot<T>, StoreError>
    where
        F: FnOnce(&T, Version) -> T,
    {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if current.version != expected {
            return Err(StoreError::VersionConflict {
                expected,
                actual: current.version,
            });
        }

        let next = expected.next();
        let value = build(&current.value, next);
        *current = Snapshot {
            version: next,
            value: Arc::new(value),
        };

        // Postcondition: version advanced by exactly one
        debug_assert_eq!(current.version.as_u64(), expected.as_u64() + 1);

        Ok(current.clone())
    }

    /// Replaces the value unconditionally, still advancing the version by one.
    pub fn force_replace_with<F>(&self, build: F) -> Snapshot<T>
    where
        F: FnOnce(&T, Version) -> T,
    {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let next = current.version.next();
        let value = build(&current.value, next);
        *current = Snapshot {
            version: next,
            value: Arc::new(value),
        };
        current.clone()
    }
}

impl<T: Default> Default for VersionedDocument<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
