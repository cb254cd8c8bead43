use std::collections::HashMap;

use parking_lot::Mutex;
use xmltooling::StorageError;
use xmltooling::error::StorageResult;
use xmltooling::storage::DataSealer;

mockall::mock! {
    pub Sealer {}

    impl DataSealer for Sealer {
        fn seal(&self, data: &str, expiration: Option<i64>) -> StorageResult<String>;
        fn unseal(&self, sealed: &str) -> StorageResult<String>;
    }
}

/// Reversible sealer that remembers the expiration of every blob it sealed
#[derive(Default)]
pub struct RecordingSealer {
    sealed: Mutex<HashMap<String, Option<i64>>>,
}

impl RecordingSealer {
    pub fn expiration_of(&self, sealed: &str) -> Option<Option<i64>> {
        self.sealed.lock().get(sealed).copied()
    }
}

impl DataSealer for RecordingSealer {
    fn seal(&self, data: &str, expiration: Option<i64>) -> StorageResult<String> {
        let sealed = format!("sealed:{}", data);
        self.sealed.lock().insert(sealed.clone(), expiration);
        Ok(sealed)
    }

    fn unseal(&self, sealed: &str) -> StorageResult<String> {
        sealed
            .strip_prefix("sealed:")
            .map(str::to_string)
            .ok_or_else(|| StorageError::Sealer {
                details: "not sealed by this sealer".to_string(),
            })
    }
}
