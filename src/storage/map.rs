//! In-process record map shared by the storage backends.
//!
//! `StorageMap` holds no lock and no clock: callers pass `now` and provide
//! their own synchronization.

use std::collections::HashMap;

use super::{DeleteResult, StorageRecord, UpdateResult, VersionedRead};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageMap {
    contexts: HashMap<String, HashMap<String, StorageRecord>>,
}

impl StorageMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn live(&self, context: &str, key: &str, now: i64) -> Option<&StorageRecord> {
        self.contexts
            .get(context)?
            .get(key)
            .filter(|record| !record.is_expired(now))
    }

    fn live_mut(&mut self, context: &str, key: &str, now: i64) -> Option<&mut StorageRecord> {
        self.contexts
            .get_mut(context)?
            .get_mut(key)
            .filter(|record| !record.is_expired(now))
    }

    pub fn create(&mut self, context: &str, key: &str, value: &str, expiration: Option<i64>, now: i64) -> bool {
        if self.live(context, key, now).is_some() {
            return false;
        }
        self.contexts
            .entry(context.to_string())
            .or_default()
            .insert(key.to_string(), StorageRecord::new(value, expiration));
        true
    }

    /// Insert a record as-is, replacing whatever is there
    pub fn insert(&mut self, context: &str, key: &str, record: StorageRecord) {
        self.contexts
            .entry(context.to_string())
            .or_default()
            .insert(key.to_string(), record);
    }

    pub fn read(&self, context: &str, key: &str, now: i64) -> Option<StorageRecord> {
        self.live(context, key, now).cloned()
    }

    pub fn read_if_changed(&self, context: &str, key: &str, version: i64, now: i64) -> VersionedRead {
        match self.live(context, key, now) {
            None => VersionedRead::NotFound,
            Some(record) if record.version == version => VersionedRead::Unchanged(version),
            Some(record) => VersionedRead::Changed(record.clone()),
        }
    }

    pub fn update(
        &mut self,
        expected_version: Option<i64>,
        context: &str,
        key: &str,
        value: Option<&str>,
        expiration: Option<i64>,
        now: i64,
    ) -> UpdateResult {
        let Some(record) = self.live_mut(context, key, now) else {
            return UpdateResult::NotFound;
        };
        if let Some(expected) = expected_version
            && expected != record.version
        {
            return UpdateResult::VersionConflict(record.version);
        }
        if let Some(value) = value {
            record.value = value.to_string();
        }
        record.expiration = expiration;
        record.version += 1;
        UpdateResult::Updated(record.version)
    }

    pub fn delete(&mut self, expected_version: Option<i64>, context: &str, key: &str, now: i64) -> DeleteResult {
        let current = match self.live(context, key, now) {
            Some(record) => record.version,
            None => return DeleteResult::NotFound,
        };
        if let Some(expected) = expected_version
            && expected != current
        {
            return DeleteResult::VersionConflict(current);
        }
        if let Some(records) = self.contexts.get_mut(context) {
            records.remove(key);
            if records.is_empty() {
                self.contexts.remove(context);
            }
        }
        DeleteResult::Deleted
    }

    /// Remove expired records of one context, returning how many went
    pub fn reap(&mut self, context: &str, now: i64) -> usize {
        let Some(records) = self.contexts.get_mut(context) else {
            return 0;
        };
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now));
        let removed = before - records.len();
        if records.is_empty() {
            self.contexts.remove(context);
        }
        removed
    }

    pub fn reap_all(&mut self, now: i64) -> usize {
        let contexts: Vec<String> = self.contexts.keys().cloned().collect();
        contexts.iter().map(|context| self.reap(context, now)).sum()
    }

    /// Set the expiration of every live record in a context
    /// Returns how many live records were touched
    pub fn update_context_expiration(&mut self, context: &str, expiration: Option<i64>, now: i64) -> usize {
        let Some(records) = self.contexts.get_mut(context) else {
            return 0;
        };
        let mut updated = 0;
        for record in records.values_mut().filter(|r| !r.is_expired(now)) {
            record.expiration = expiration;
            record.version += 1;
            updated += 1;
        }
        updated
    }

    pub fn delete_context(&mut self, context: &str) -> bool {
        self.contexts.remove(context).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Number of stored records, expired or not
    pub fn len(&self) -> usize {
        self.contexts.values().map(HashMap::len).sum()
    }

    pub fn contexts(&self) -> impl Iterator<Item = (&str, &HashMap<String, StorageRecord>)> + '_ {
        self.contexts.iter().map(|(context, records)| (context.as_str(), records))
    }
}
