//! Storage kept by the client, as a sealed JSON blob.
//!
//! Each request decodes the blob into a `ClientStorageState`, works against
//! it through the `StorageService` contract and, when something changed,
//! saves it back to a new blob. The persisted layout is
//! `{"context": {"key": {"v": "value", "x": expiration}}}` with `x` omitted
//! for records that never expire. Versions are not persisted and restart at 1.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::map::StorageMap;
use super::{
    Clock, DeleteResult, StorageCapabilities, StorageRecord, StorageService, SystemClock, UpdateResult, VersionedRead,
};
use crate::error::{StorageError, StorageResult};

/// Authenticated encryption applied to the blob before it leaves the process
pub trait DataSealer: Send + Sync {
    fn seal(&self, data: &str, expiration: Option<i64>) -> StorageResult<String>;

    fn unseal(&self, sealed: &str) -> StorageResult<String>;
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedRecord {
    v: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    x: Option<i64>,
}

type PersistedMap = BTreeMap<String, BTreeMap<String, PersistedRecord>>;

/// What the caller should do with its copy of the blob after `save`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientStorageUpdate {
    Unchanged,
    /// Nothing is stored any more; drop the blob
    Clear,
    Set(String),
}

pub struct ClientStorageService {
    capabilities: StorageCapabilities,
    clock: Arc<dyn Clock>,
    sealer: Arc<dyn DataSealer>,
}

impl ClientStorageService {
    pub fn new(sealer: Arc<dyn DataSealer>) -> Self {
        Self {
            capabilities: StorageCapabilities {
                context_size: 255,
                key_size: 255,
                value_size: 4096,
            },
            clock: Arc::new(SystemClock),
            sealer,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_capabilities(mut self, capabilities: StorageCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Decode the client's blob. A blob that fails to unseal or parse is
    /// logged and replaced by empty state, which will overwrite it on save.
    pub fn load(&self, sealed: Option<&str>) -> ClientStorageState {
        let state = ClientStorageState {
            capabilities: self.capabilities,
            clock: Arc::clone(&self.clock),
            sealer: Arc::clone(&self.sealer),
            map: RwLock::new(StorageMap::new()),
            dirty: AtomicBool::new(false),
        };
        let Some(sealed) = sealed.filter(|s| !s.is_empty()) else {
            return state;
        };
        match self.decode(sealed) {
            Ok(map) => {
                debug!(records = map.len(), "Loaded client storage");
                *state.map.write() = map;
            }
            Err(e) => {
                warn!(error = %e, "Discarding unreadable client storage");
                state.dirty.store(true, Ordering::SeqCst);
            }
        }
        state
    }

    fn decode(&self, sealed: &str) -> StorageResult<StorageMap> {
        let json = self.sealer.unseal(sealed)?;
        let persisted: PersistedMap = serde_json::from_str(&json).map_err(StorageError::serialization)?;
        let now = self.clock.now_millis();
        let mut map = StorageMap::new();
        for (context, records) in persisted {
            for (key, record) in records {
                let record = StorageRecord::new(record.v, record.x);
                if !record.is_expired(now) {
                    map.insert(&context, &key, record);
                }
            }
        }
        Ok(map)
    }
}

/// Decoded client storage for one request
pub struct ClientStorageState {
    capabilities: StorageCapabilities,
    clock: Arc<dyn Clock>,
    sealer: Arc<dyn DataSealer>,
    map: RwLock<StorageMap>,
    dirty: AtomicBool,
}

impl ClientStorageState {
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    fn mark_dirty_if(&self, changed: bool) {
        if changed {
            self.dirty.store(true, Ordering::SeqCst);
        }
    }

    fn now(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Encode and seal the live records if anything changed since `load`
    pub fn save(&self) -> StorageResult<ClientStorageUpdate> {
        if !self.is_dirty() {
            return Ok(ClientStorageUpdate::Unchanged);
        }
        let now = self.now();
        let mut persisted = PersistedMap::new();
        let mut expiration = Some(i64::MIN);
        {
            let map = self.map.read();
            for (context, records) in map.contexts() {
                for (key, record) in records.iter().filter(|(_, r)| !r.is_expired(now)) {
                    expiration = match (expiration, record.expiration) {
                        (Some(latest), Some(exp)) => Some(latest.max(exp)),
                        _ => None,
                    };
                    persisted.entry(context.to_string()).or_default().insert(
                        key.clone(),
                        PersistedRecord {
                            v: record.value.clone(),
                            x: record.expiration,
                        },
                    );
                }
            }
        }
        if persisted.is_empty() {
            self.dirty.store(false, Ordering::SeqCst);
            return Ok(ClientStorageUpdate::Clear);
        }

        // dirty is cleared only once the blob is sealed
        let json = serde_json::to_string(&persisted).map_err(StorageError::serialization)?;
        let sealed = self.sealer.seal(&json, expiration)?;
        self.dirty.store(false, Ordering::SeqCst);
        debug!(bytes = sealed.len(), "Saved client storage");
        Ok(ClientStorageUpdate::Set(sealed))
    }
}

impl StorageService for ClientStorageState {
    fn capabilities(&self) -> StorageCapabilities {
        self.capabilities
    }

    fn create(&self, context: &str, key: &str, value: &str, expiration: Option<i64>) -> StorageResult<bool> {
        self.capabilities.check_record(context, key, value)?;
        let created = self.map.write().create(context, key, value, expiration, self.now());
        self.mark_dirty_if(created);
        Ok(created)
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
        match result {
            UpdateResult::Updated(version) => {
                self.mark_dirty_if(true);
                Ok(Some(version))
            }
            _ => Ok(None),
        }
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
        let result = self
            .map
            .write()
            .update(Some(version), context, key, Some(value), expiration, self.now());
        self.mark_dirty_if(matches!(result, UpdateResult::Updated(_)));
        Ok(result)
    }

    fn update_expiration(&self, context: &str, key: &str, expiration: Option<i64>) -> StorageResult<bool> {
        let result = self.map.write().update(None, context, key, None, expiration, self.now());
        let updated = matches!(result, UpdateResult::Updated(_));
        self.mark_dirty_if(updated);
        Ok(updated)
    }

    fn delete(&self, context: &str, key: &str) -> StorageResult<bool> {
        let deleted = self.map.write().delete(None, context, key, self.now()) == DeleteResult::Deleted;
        self.mark_dirty_if(deleted);
        Ok(deleted)
    }

    fn delete_with_version(&self, version: i64, context: &str, key: &str) -> StorageResult<DeleteResult> {
        let result = self.map.write().delete(Some(version), context, key, self.now());
        self.mark_dirty_if(result == DeleteResult::Deleted);
        Ok(result)
    }

    fn reap(&self, context: &str) -> StorageResult<()> {
        let removed = self.map.write().reap(context, self.now());
        self.mark_dirty_if(removed > 0);
        Ok(())
    }

    fn update_context_expiration(&self, context: &str, expiration: Option<i64>) -> StorageResult<()> {
        let updated = self
            .map
            .write()
            .update_context_expiration(context, expiration, self.now());
        self.mark_dirty_if(updated > 0);
        Ok(())
    }

    fn delete_context(&self, context: &str) -> StorageResult<()> {
        let removed = self.map.write().delete_context(context);
        self.mark_dirty_if(removed);
        Ok(())
    }
}
