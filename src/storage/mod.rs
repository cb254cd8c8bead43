//! Versioned, expiring key/value storage partitioned by context.
//!
//! Records are addressed by `(context, key)`. Every record carries a version
//! starting at 1 and an optional absolute expiration in epoch milliseconds. A
//! record past its expiration is absent to every read and update, whether or
//! not it has been reaped yet.
//!
//! Version conflicts are an expected outcome of optimistic concurrency and are
//! reported through `UpdateResult` / `DeleteResult`, never as errors.

pub mod client;
pub mod map;
pub mod memory;
pub mod replay;

use std::marker::PhantomData;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{StorageError, StorageResult};

pub use client::{ClientStorageService, ClientStorageState, DataSealer};
pub use map::StorageMap;
pub use memory::MemoryStorageService;
pub use replay::ReplayCache;

/// A stored value with its version and optional expiration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageRecord {
    pub value: String,
    pub version: i64,
    pub expiration: Option<i64>,
}

impl StorageRecord {
    pub fn new(value: impl Into<String>, expiration: Option<i64>) -> Self {
        Self {
            value: value.into(),
            version: 1,
            expiration,
        }
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.expiration.is_some_and(|exp| exp <= now)
    }
}

/// Outcome of a versioned update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateResult {
    Updated(i64),
    NotFound,
    /// The stored version no longer matches; carries the current version
    VersionConflict(i64),
}

/// Outcome of a versioned delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteResult {
    Deleted,
    NotFound,
    VersionConflict(i64),
}

/// Outcome of a read conditioned on the caller's cached version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionedRead {
    NotFound,
    /// The caller's version is current; no payload is returned
    Unchanged(i64),
    Changed(StorageRecord),
}

/// Size limits a storage service enforces on writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageCapabilities {
    pub context_size: usize,
    pub key_size: usize,
    pub value_size: usize,
}

impl Default for StorageCapabilities {
    fn default() -> Self {
        Self {
            context_size: 255,
            key_size: 255,
            value_size: usize::MAX,
        }
    }
}

impl StorageCapabilities {
    pub fn check_context(&self, context: &str) -> StorageResult<()> {
        check("context", context.len(), self.context_size)
    }

    pub fn check_key(&self, key: &str) -> StorageResult<()> {
        check("key", key.len(), self.key_size)
    }

    pub fn check_value(&self, value: &str) -> StorageResult<()> {
        check("value", value.len(), self.value_size)
    }

    pub fn check_record(&self, context: &str, key: &str, value: &str) -> StorageResult<()> {
        self.check_context(context)?;
        self.check_key(key)?;
        self.check_value(value)
    }
}

fn check(field: &'static str, size: usize, limit: usize) -> StorageResult<()> {
    if size > limit {
        return Err(StorageError::CapabilityExceeded { field, size, limit });
    }
    Ok(())
}

/// Source of the current time in epoch milliseconds
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Converts custom objects to and from stored string values
pub trait StorageSerializer<T> {
    fn serialize(&self, object: &T) -> StorageResult<String>;

    fn deserialize(&self, value: &str) -> StorageResult<T>;
}

/// `StorageSerializer` backed by serde_json
#[derive(Debug)]
pub struct JsonStorageSerializer<T>(PhantomData<fn() -> T>);

impl<T> JsonStorageSerializer<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for JsonStorageSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serialize + DeserializeOwned> StorageSerializer<T> for JsonStorageSerializer<T> {
    fn serialize(&self, object: &T) -> StorageResult<String> {
        serde_json::to_string(object).map_err(StorageError::serialization)
    }

    fn deserialize(&self, value: &str) -> StorageResult<T> {
        serde_json::from_str(value).map_err(StorageError::serialization)
    }
}

/// The storage contract shared by every backend
pub trait StorageService: Send + Sync {
    fn capabilities(&self) -> StorageCapabilities;

    /// Insert at version 1. Returns false when a live record already exists.
    fn create(&self, context: &str, key: &str, value: &str, expiration: Option<i64>) -> StorageResult<bool>;

    fn read(&self, context: &str, key: &str) -> StorageResult<Option<StorageRecord>>;

    /// Read unless the caller's `version` is still current
    fn read_if_changed(&self, context: &str, key: &str, version: i64) -> StorageResult<VersionedRead>;

    /// Replace the value, returning the new version, or `None` when absent
    fn update(&self, context: &str, key: &str, value: &str, expiration: Option<i64>) -> StorageResult<Option<i64>>;

    /// Replace the value only if the stored version is `version`
    fn update_with_version(
        &self,
        version: i64,
        context: &str,
        key: &str,
        value: &str,
        expiration: Option<i64>,
    ) -> StorageResult<UpdateResult>;

    fn update_expiration(&self, context: &str, key: &str, expiration: Option<i64>) -> StorageResult<bool>;

    fn delete(&self, context: &str, key: &str) -> StorageResult<bool>;

    fn delete_with_version(&self, version: i64, context: &str, key: &str) -> StorageResult<DeleteResult>;

    /// Physically remove expired records of a context
    fn reap(&self, context: &str) -> StorageResult<()>;

    fn update_context_expiration(&self, context: &str, expiration: Option<i64>) -> StorageResult<()>;

    fn delete_context(&self, context: &str) -> StorageResult<()>;

    fn create_object<T, S>(
        &self,
        context: &str,
        key: &str,
        object: &T,
        serializer: &S,
        expiration: Option<i64>,
    ) -> StorageResult<bool>
    where
        Self: Sized,
        S: StorageSerializer<T>,
    {
        let value = serializer.serialize(object)?;
        self.create(context, key, &value, expiration)
    }

    fn read_object<T, S>(&self, context: &str, key: &str, serializer: &S) -> StorageResult<Option<T>>
    where
        Self: Sized,
        S: StorageSerializer<T>,
    {
        self.read(context, key)?
            .map(|record| serializer.deserialize(&record.value))
            .transpose()
    }

    fn update_object<T, S>(
        &self,
        context: &str,
        key: &str,
        object: &T,
        serializer: &S,
        expiration: Option<i64>,
    ) -> StorageResult<Option<i64>>
    where
        Self: Sized,
        S: StorageSerializer<T>,
    {
        let value = serializer.serialize(object)?;
        self.update(context, key, &value, expiration)
    }
}
