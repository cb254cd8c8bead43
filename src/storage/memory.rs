//! In-memory storage service.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::map::StorageMap;
use super::{
    Clock, DeleteResult, StorageCapabilities, StorageRecord, StorageService, SystemClock, UpdateResult, VersionedRead,
};
use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};

/// Storage held in process memory behind a single reader/writer lock.
///
/// Reads share the lock; every read-modify-write holds it exclusively for the
/// whole sequence. `initialize` starts a background task that reaps every
/// context periodically.
pub struct MemoryStorageService {
    map: Arc<RwLock<StorageMap>>,
    capabilities: StorageCapabilities,
    clock: Arc<dyn Clock>,
    cleanup_interval: Duration,
    reaper: Mutex<Option<JoinHandle<()>>>,
}

impl MemoryStorageService {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            map: Arc::new(RwLock::new(StorageMap::new())),
            capabilities: StorageCapabilities::default(),
            clock,
            cleanup_interval: Duration::from_secs(300),
            reaper: Mutex::new(None),
        }
    }

    /// Limits and reaper interval from the `[storage]` configuration section
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new()
            .with_capabilities(config.capabilities())
            .cleanup_interval(config.cleanup_interval())
    }

    pub fn with_capabilities(mut self, capabilities: StorageCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Interval of the background reaper; zero disables it
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Start the background reaper on the current tokio runtime
    pub fn initialize(&self) -> StorageResult<()> {
        if self.cleanup_interval.is_zero() {
            debug!("Storage reaper disabled");
            return Ok(());
        }
        let mut reaper = self.reaper.lock();
        if reaper.is_some() {
            return Ok(());
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| StorageError::Reaper {
            details: e.to_string(),
        })?;

        let map = Arc::clone(&self.map);
        let clock = Arc::clone(&self.clock);
        let period = self.cleanup_interval;
        *reaper = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = map.write().reap_all(clock.now_millis());
                debug!(removed, "Reaped expired storage records");
            }
        }));
        info!(interval_secs = period.as_secs(), "Storage reaper started");
        Ok(())
    }

    /// Stop the background reaper
    pub fn shutdown(&self) {
        if let Some(handle) = self.reaper.lock().take() {
            handle.abort();
            info!("Storage reaper stopped");
        }
    }

    pub fn is_reaping(&self) -> bool {
        self.reaper.lock().as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Records held, including expired ones not yet reaped
    pub fn record_count(&self) -> usize {
        self.map.read().len()
    }

    fn now(&self) -> i64 {
        self.clock.now_millis()
    }
}

impl Default for MemoryStorageService {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MemoryStorageService {
    fn drop(&mut self) {
        if let Some(handle) = self.reaper.get_mut().take() {
            handle.abort();
        }
    }
}

impl StorageService for MemoryStorageService {
    fn capabilities(&self) -> StorageCapabilities {
        self.capabilities
    }

    fn create(&self, context: &str, key: &str, value: &str, expiration: Option<i64>) -> StorageResult<bool> {
        self.capabilities.check_record(context, key, value)?;
        Ok(self.map.write().create(context, key, value, expiration, self.now()))
    }

    fn read(&self, context: &str, key: &str) -> StorageResult<Option<StorageRecord>> {
        Ok(self.map.read().read(context, key, self.now()))
    }

    fn read_if_changed(&self, context: &str, key: &str, version: i64) -> StorageResult<VersionedRead> {
        Ok(self.map.read().read_if_changed(context, key, version, self.now()))
    }

    fn update(&self, context: &str, key: &str, value: &str, expiration: Option<i64>) -> StorageResult<Option<i64>> {
        self.capabilities.check_value(value)?;
        let result = self
            .map
            .write()
            .update(None, context, key, Some(value), expiration, self.now());
        Ok(match result {
            UpdateResult::Updated(version) => Some(version),
            _ => None,
        })
    }

    fn update_with_version(
        &self,
        version: i64,
        context: &str,
        key: &str,
        value: &str,
        expiration: Option<i64>,
    ) -> StorageResult<UpdateResult> {
        self.capabilities.check_value(value)?;
        Ok(self
            .map
            .write()
            .update(Some(version), context, key, Some(value), expiration, self.now()))
    }

    fn update_expiration(&self, context: &str, key: &str, expiration: Option<i64>) -> StorageResult<bool> {
        let result = self.map.write().update(None, context, key, None, expiration, self.now());
        Ok(matches!(result, UpdateResult::Updated(_)))
    }

    fn delete(&self, context: &str, key: &str) -> StorageResult<bool> {
        let result = self.map.write().delete(None, context, key, self.now());
        Ok(result == DeleteResult::Deleted)
    }

    fn delete_with_version(&self, version: i64, context: &str, key: &str) -> StorageResult<DeleteResult> {
        Ok(self.map.write().delete(Some(version), context, key, self.now()))
    }

    fn reap(&self, context: &str) -> StorageResult<()> {
        let removed = self.map.write().reap(context, self.now());
        debug!(context, removed, "Reaped storage context");
        Ok(())
    }

    fn update_context_expiration(&self, context: &str, expiration: Option<i64>) -> StorageResult<()> {
        let updated = self
            .map
            .write()
            .update_context_expiration(context, expiration, self.now());
        debug!(context, updated, "Updated context expiration");
        Ok(())
    }

    fn delete_context(&self, context: &str) -> StorageResult<()> {
        self.map.write().delete_context(context);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{JsonStorageSerializer, ManualClock};
    use rayon::prelude::*;

    fn service() -> (MemoryStorageService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000));
        (MemoryStorageService::with_clock(clock.clone()), clock)
    }

    #[test]
    fn test_create_duplicate_keeps_first_value() {
        let (storage, _) = service();
        assert!(storage.create("ctx", "key", "v1", None).unwrap());
        assert!(!storage.create("ctx", "key", "v2", None).unwrap());

        let record = storage.read("ctx", "key").unwrap().unwrap();
        assert_eq!(record.value, "v1");
        assert_eq!(record.version, 1);
    }

    #[test]
    fn test_optimistic_update() {
        let (storage, _) = service();
        storage.create("ctx", "key", "v1", None).unwrap();
        assert_eq!(
            storage.update_with_version(1, "ctx", "key", "v2", None).unwrap(),
            UpdateResult::Updated(2)
        );
        assert_eq!(
            storage.update_with_version(1, "ctx", "key", "v3", None).unwrap(),
            UpdateResult::VersionConflict(2)
        );
        let record = storage.read("ctx", "key").unwrap().unwrap();
        assert_eq!((record.value.as_str(), record.version), ("v2", 2));

        assert_eq!(
            storage.update_with_version(1, "ctx", "missing", "v", None).unwrap(),
            UpdateResult::NotFound
        );
        assert_eq!(storage.update("ctx", "missing", "v", None).unwrap(), None);
    }

    #[test]
    fn test_expired_record_is_absent_before_reap() {
        let (storage, clock) = service();
        storage.create("ctx", "old", "v", Some(500)).unwrap();
        assert!(storage.read("ctx", "old").unwrap().is_none());
        assert_eq!(storage.record_count(), 1);
        assert!(storage.update("ctx", "old", "v2", None).unwrap().is_none());
        assert!(!storage.delete("ctx", "old").unwrap());

        storage.create("ctx", "soon", "v", Some(1_500)).unwrap();
        assert!(storage.read("ctx", "soon").unwrap().is_some());
        clock.advance(500);
        assert!(storage.read("ctx", "soon").unwrap().is_none());

        storage.reap("ctx").unwrap();
        assert_eq!(storage.record_count(), 0);
        assert!(storage.read("ctx", "soon").unwrap().is_none());
    }

    #[test]
    fn test_conditional_read() {
        let (storage, _) = service();
        assert_eq!(storage.read_if_changed("ctx", "key", 1).unwrap(), VersionedRead::NotFound);
        storage.create("ctx", "key", "v1", None).unwrap();
        assert_eq!(storage.read_if_changed("ctx", "key", 1).unwrap(), VersionedRead::Unchanged(1));

        storage.update("ctx", "key", "v2", None).unwrap();
        match storage.read_if_changed("ctx", "key", 1).unwrap() {
            VersionedRead::Changed(record) => {
                assert_eq!(record.value, "v2");
                assert_eq!(record.version, 2);
            }
            other => panic!("expected a changed record, got {other:?}"),
        }
    }

    #[test]
    fn test_versioned_delete() {
        let (storage, _) = service();
        storage.create("ctx", "key", "v1", None).unwrap();
        storage.update("ctx", "key", "v2", None).unwrap();
        assert_eq!(
            storage.delete_with_version(1, "ctx", "key").unwrap(),
            DeleteResult::VersionConflict(2)
        );
        assert_eq!(storage.delete_with_version(2, "ctx", "key").unwrap(), DeleteResult::Deleted);
        assert_eq!(storage.delete_with_version(2, "ctx", "key").unwrap(), DeleteResult::NotFound);
    }

    #[test]
    fn test_context_operations() {
        let (storage, clock) = service();
        storage.create("ctx", "a", "1", None).unwrap();
        storage.create("ctx", "b", "2", None).unwrap();
        storage.create("other", "a", "3", None).unwrap();

        storage.update_context_expiration("ctx", Some(2_000)).unwrap();
        assert_eq!(storage.read("ctx", "a").unwrap().unwrap().version, 2);
        clock.set(2_000);
        assert!(storage.read("ctx", "b").unwrap().is_none());
        assert!(storage.read("other", "a").unwrap().is_some());

        storage.delete_context("other").unwrap();
        assert!(storage.read("other", "a").unwrap().is_none());
    }

    #[test]
    fn test_update_expiration_bumps_version() {
        let (storage, _) = service();
        storage.create("ctx", "key", "v", None).unwrap();
        assert!(storage.update_expiration("ctx", "key", Some(5_000)).unwrap());
        let record = storage.read("ctx", "key").unwrap().unwrap();
        assert_eq!((record.version, record.expiration), (2, Some(5_000)));
        assert!(!storage.update_expiration("ctx", "missing", None).unwrap());
    }

    #[test]
    fn test_capabilities_enforced_on_write() {
        let (storage, _) = service();
        let storage = storage.with_capabilities(StorageCapabilities {
            context_size: 8,
            key_size: 8,
            value_size: 4,
        });
        assert!(matches!(
            storage.create("ctx", "key", "too long", None),
            Err(StorageError::CapabilityExceeded { field: "value", .. })
        ));
        storage.create("ctx", "key", "ok", None).unwrap();
        assert!(storage.update("ctx", "key", "too long", None).is_err());
    }

    #[test]
    fn test_object_round_trip() {
        let (storage, _) = service();
        let serializer = JsonStorageSerializer::<Vec<String>>::new();
        let names = vec!["a".to_string(), "b".to_string()];
        assert!(storage.create_object("ctx", "names", &names, &serializer, None).unwrap());
        assert_eq!(storage.read_object("ctx", "names", &serializer).unwrap(), Some(names));

        storage.create("ctx", "broken", "not json", None).unwrap();
        assert!(matches!(
            storage.read_object("ctx", "broken", &serializer),
            Err(StorageError::Serialization(_))
        ));
    }

    #[test]
    fn test_concurrent_creates_have_one_winner() {
        let (storage, _) = service();
        let winners = (0..64)
            .into_par_iter()
            .filter(|i| storage.create("ctx", "race", &i.to_string(), None).unwrap())
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_concurrent_versioned_updates_never_lose_writes() {
        let (storage, _) = service();
        storage.create("ctx", "counter", "0", None).unwrap();
        (0..32).into_par_iter().for_each(|_| loop {
            let record = storage.read("ctx", "counter").unwrap().unwrap();
            let next = (record.value.parse::<u32>().unwrap() + 1).to_string();
            match storage
                .update_with_version(record.version, "ctx", "counter", &next, None)
                .unwrap()
            {
                UpdateResult::Updated(_) => break,
                UpdateResult::VersionConflict(_) => continue,
                UpdateResult::NotFound => panic!("counter vanished"),
            }
        });
        let record = storage.read("ctx", "counter").unwrap().unwrap();
        assert_eq!(record.value, "32");
        assert_eq!(record.version, 33);
    }

    #[tokio::test]
    async fn test_background_reaper() {
        let clock = Arc::new(ManualClock::new(0));
        let storage = MemoryStorageService::with_clock(clock.clone()).cleanup_interval(Duration::from_millis(10));
        storage.create("ctx", "key", "v", Some(10)).unwrap();
        clock.set(100);

        storage.initialize().unwrap();
        assert!(storage.is_reaping());
        for _ in 0..100 {
            if storage.record_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(storage.record_count(), 0);

        storage.shutdown();
        assert!(!storage.is_reaping());
    }

    #[test]
    fn test_initialize_needs_runtime() {
        let storage = MemoryStorageService::new();
        assert!(matches!(storage.initialize(), Err(StorageError::Reaper { .. })));
        let disabled = MemoryStorageService::new().cleanup_interval(Duration::ZERO);
        assert!(disabled.initialize().is_ok());
    }
}
