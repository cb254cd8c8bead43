use std::sync::Arc;

use tracing::warn;

use super::StorageService;
use crate::error::StorageResult;

/// Detects reuse of one-time message identifiers
pub struct ReplayCache {
    storage: Arc<dyn StorageService>,
}

impl ReplayCache {
    pub fn new(storage: Arc<dyn StorageService>) -> Self {
        Self { storage }
    }

    /// True the first time `message_id` is seen in `context`, false on a
    /// replay. The identifier is remembered until `expires` (epoch millis).
    pub fn check(&self, context: &str, message_id: &str, expires: i64) -> StorageResult<bool> {
        let fresh = self.storage.create(context, message_id, "x", Some(expires))?;
        if !fresh {
            warn!(context, message_id, "Replay detected");
        }
        Ok(fresh)
    }
}
