use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::AppError;
use crate::models::CredentialRecord;
use crate::repositories::CredentialStore;

/// テスト用インメモリストア
///
/// Mutex で書き込みを直列化する
#[derive(Clone, Default)]
pub struct InMemoryCredentialStore {
    records: Arc<Mutex<HashMap<String, CredentialRecord>>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for InMemoryCredentialStore {
    async fn get_by_username(
        &self,
        username: &str,
    ) -> Result<Option<CredentialRecord>, AppError> {
        let records = self.records.lock().expect("store mutex poisoned");
        Ok(records.get(username).cloned())
    }

    async fn put(&self, record: &CredentialRecord) -> Result<(), AppError> {
        let mut records = self.records.lock().expect("store mutex poisoned");
        records.insert(record.username.clone(), record.clone());
        Ok(())
    }
}
