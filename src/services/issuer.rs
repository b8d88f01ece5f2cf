//! Key issuance orchestration.
//!
//! One issue request is one sequential unit of work: validate the
//! requester, generate a key, persist the record, return the key. Requests
//! share no mutable state, so concurrent issuance needs no coordination.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::{
    error::AppError,
    models::upload_key::NewUploadKey,
    services::generator::KeyGenerator,
    store::KeyStore,
};

/// Issues upload keys against the injected store.
pub struct KeyIssuer {
    store: Arc<dyn KeyStore>,
    generator: KeyGenerator,
    retention: Duration,
}

impl KeyIssuer {
    /// # Arguments
    ///
    /// * `store` - Persistent key store
    /// * `generator` - Configured key generator
    /// * `retention` - How long an issued key stays valid
    pub fn new(store: Arc<dyn KeyStore>, generator: KeyGenerator, retention: Duration) -> Self {
        Self {
            store,
            generator,
            retention,
        }
    }

    /// Issue a new upload key for `requester`.
    ///
    /// # Process
    ///
    /// 1. Reject an empty requester with a validation error
    /// 2. Generate the key (random source failures propagate)
    /// 3. Persist a record expiring one retention window from now
    /// 4. Return the key string
    ///
    /// The key is only reported to the caller after the insert succeeds, so
    /// a caller never sees a key that was not durably stored.
    pub async fn issue(&self, requester: &str) -> Result<String, AppError> {
        if requester.is_empty() {
            return Err(AppError::Validation("no requester supplied".to_string()));
        }

        let key = self.generator.generate()?;

        let record = NewUploadKey {
            key: key.clone(),
            requester: requester.to_string(),
            expiry: Utc::now() + self.retention,
        };
        self.store.insert(record).await?;

        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::MemoryKeyStore;

    const ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

    fn issuer(store: Arc<MemoryKeyStore>) -> KeyIssuer {
        let generator = KeyGenerator::new(ALPHABET, 8).unwrap();
        KeyIssuer::new(store, generator, Duration::days(7))
    }

    #[tokio::test]
    async fn issue_stores_a_record_and_returns_the_key() {
        let store = Arc::new(MemoryKeyStore::new(500));
        let issuer = issuer(store.clone());

        let before = Utc::now();
        let key = issuer.issue("alice").await.unwrap();
        let after = Utc::now();

        assert_eq!(key.len(), 8);
        assert!(key.chars().all(|ch| ALPHABET.contains(ch)));

        let records = store.stored_records();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.key, key);
        assert_eq!(record.requester, "alice");

        // expiry is creation time plus exactly the retention window
        assert!(record.expiry >= before + Duration::days(7));
        assert!(record.expiry <= after + Duration::days(7));
    }

    #[tokio::test]
    async fn empty_requester_fails_without_a_store_write() {
        let store = Arc::new(MemoryKeyStore::new(500));
        let issuer = issuer(store.clone());

        let result = issuer.issue("").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(store.record_count(), 0);
    }

    #[tokio::test]
    async fn insert_failure_means_no_key_is_reported() {
        let store = Arc::new(MemoryKeyStore::new(500));
        store.fail_next_insert();
        let issuer = issuer(store.clone());

        let result = issuer.issue("alice").await;
        assert!(matches!(result, Err(AppError::Database(_))));
        assert_eq!(store.record_count(), 0);
    }
}
