use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::domain::AuthorizationRecord;

use super::traits::AuthorizationStore;

/// In-memory authorization store.
///
/// The default backend for tests and single-node deployments; durable
/// storage is expected to be wired in by the embedding application.
#[derive(Debug, Default)]
pub struct MemoryAuthorizationStore {
    records: Mutex<HashMap<(String, String), AuthorizationRecord>>,
}

impl MemoryAuthorizationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl AuthorizationStore for MemoryAuthorizationStore {
    async fn find(
        &self,
        user_id: &str,
        scheme: &str,
    ) -> anyhow::Result<Option<AuthorizationRecord>> {
        let key = (user_id.to_string(), scheme.to_string());
        Ok(self.records.lock().get(&key).cloned())
    }

    async fn find_or_create(
        &self,
        user_id: &str,
        scheme: &str,
    ) -> anyhow::Result<AuthorizationRecord> {
        let key = (user_id.to_string(), scheme.to_string());
        let mut records = self.records.lock();

        if let Some(record) = records.get(&key) {
            return Ok(record.clone());
        }

        let mut record = AuthorizationRecord::new(user_id);
        record.scheme = scheme.to_string();
        records.insert(key, record.clone());
        Ok(record)
    }

    async fn save(&self, record: &AuthorizationRecord) -> anyhow::Result<()> {
        let key = (record.user_id.clone(), record.scheme.clone());
        self.records.lock().insert(key, record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::authorization::SCHEME_NAME;
    use crate::domain::PersonId;
    use chrono::Utc;

    #[tokio::test]
    async fn test_find_or_create_is_idempotent() {
        let store = MemoryAuthorizationStore::new();

        let first = store.find_or_create("u1", SCHEME_NAME).await.unwrap();
        assert!(first.metadata.is_empty());

        let mut updated = first.clone();
        updated.set_person_id(PersonId(5));
        store.save(&updated).await.unwrap();

        // Second touch returns the stored record, not a fresh one.
        let second = store.find_or_create("u1", SCHEME_NAME).await.unwrap();
        assert_eq!(second.person_id(), Some(PersonId(5)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_find_absent() {
        let store = MemoryAuthorizationStore::new();
        assert!(store.find("nobody", SCHEME_NAME).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_preserves_grant() {
        let store = MemoryAuthorizationStore::new();
        let mut record = store.find_or_create("u1", SCHEME_NAME).await.unwrap();
        record.grant(Utc::now());
        store.save(&record).await.unwrap();

        let found = store.find("u1", SCHEME_NAME).await.unwrap().unwrap();
        assert!(found.granted());
    }
}
