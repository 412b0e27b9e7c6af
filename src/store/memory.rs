//! In-process [`TokenStore`] for tests and short-lived sessions.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::store::{validate_service, PersistedTokenRecord, TokenStore};
use crate::StoreResult;

/// Cloning shares the underlying map.
#[derive(Clone, Debug, Default)]
pub struct MemoryTokenStore(Arc<RwLock<HashMap<String, PersistedTokenRecord>>>);

impl MemoryTokenStore {
    pub fn new() -> Self {
        Default::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self, service: &str) -> Option<PersistedTokenRecord> {
        self.0
            .read()
            .get(service)
            .filter(|record| !record.is_empty())
            .cloned()
    }

    fn save(&self, service: &str, record: &PersistedTokenRecord) -> StoreResult<()> {
        validate_service(service)?;
        self.0.write().insert(service.to_string(), record.clone());
        Ok(())
    }
}
