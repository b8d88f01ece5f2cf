//! Persistent key store capability.
//!
//! The orchestrating components (issuer, reaper) talk to storage through the
//! [`KeyStore`] trait; the production implementation is PostgreSQL via sqlx.
//! Tests use an in-memory implementation with scripted failures.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt};
use uuid::Uuid;

use crate::{db::DbPool, error::AppError, models::upload_key::NewUploadKey};

/// Opaque reference to a stored key record.
///
/// Identifies a record for deletion without exposing its contents. The
/// wrapped id is assigned by the store on insert and immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordRef(pub Uuid);

impl std::fmt::Display for RecordRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Capability interface over the persistent document store.
///
/// # Contracts
///
/// - `insert` is a single atomic write: on failure, no record exists.
/// - `query_expired` yields a lazy, finite, non-restartable sequence in
///   backend-defined order. Each pull can fail independently; a pulled
///   error is distinct from end-of-sequence.
/// - `delete_batch` deletes at most the configured mutation cap as one
///   atomic unit-of-work and rejects anything larger. Deleting a reference
///   that no longer exists is a benign no-op, which makes overlapping
///   sweeps safe without coordination.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Append a new key record, returning a reference usable for deletion.
    async fn insert(&self, record: NewUploadKey) -> Result<RecordRef, AppError>;

    /// Stream references to every record with `expiry <= now`.
    fn query_expired(&self, now: DateTime<Utc>) -> BoxStream<'_, Result<RecordRef, AppError>>;

    /// Delete a set of references as one bounded atomic unit-of-work.
    async fn delete_batch(&self, refs: &[RecordRef]) -> Result<(), AppError>;
}

/// PostgreSQL-backed key store.
pub struct PgKeyStore {
    pool: DbPool,
    batch_cap: usize,
}

impl PgKeyStore {
    /// # Arguments
    ///
    /// * `pool` - Database connection pool
    /// * `batch_cap` - Hard cap on deletions per atomic batch
    pub fn new(pool: DbPool, batch_cap: usize) -> Self {
        Self { pool, batch_cap }
    }
}

#[async_trait]
impl KeyStore for PgKeyStore {
    async fn insert(&self, record: NewUploadKey) -> Result<RecordRef, AppError> {
        // Single statement: either the row exists afterwards or nothing does
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO upload_keys (key, requester, expiry)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&record.key)
        .bind(&record.requester)
        .bind(record.expiry)
        .fetch_one(&self.pool)
        .await?;

        Ok(RecordRef(id))
    }

    fn query_expired(&self, now: DateTime<Utc>) -> BoxStream<'_, Result<RecordRef, AppError>> {
        // fetch() streams rows from a server-side cursor, so an unbounded
        // expired set is never materialized in memory at once
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM upload_keys WHERE expiry <= $1")
            .bind(now)
            .fetch(&self.pool)
            .map(|row| row.map(RecordRef).map_err(AppError::from))
            .boxed()
    }

    async fn delete_batch(&self, refs: &[RecordRef]) -> Result<(), AppError> {
        if refs.len() > self.batch_cap {
            return Err(AppError::BatchTooLarge {
                size: refs.len(),
                cap: self.batch_cap,
            });
        }
        if refs.is_empty() {
            return Ok(());
        }

        let ids: Vec<Uuid> = refs.iter().map(|r| r.0).collect();

        // One statement, one implicit transaction. Ids already deleted by a
        // concurrent sweep simply match no row.
        sqlx::query("DELETE FROM upload_keys WHERE id = ANY($1)")
            .bind(&ids)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use futures::stream;

    use super::*;

    /// In-memory key store with scripted failures.
    ///
    /// Mirrors the [`KeyStore`] contracts, including the batch cap and
    /// idempotent deletes, and records every `delete_batch` call so tests
    /// can assert on the batching arithmetic.
    pub(crate) struct MemoryKeyStore {
        batch_cap: usize,
        state: Mutex<State>,
    }

    #[derive(Default)]
    struct State {
        records: HashMap<Uuid, NewUploadKey>,
        fail_next_insert: bool,
        enumeration_error_at: Option<usize>,
        failing_batches: Vec<usize>,
        delete_calls: Vec<Vec<RecordRef>>,
    }

    fn storage_error(context: &str) -> AppError {
        AppError::Database(sqlx::Error::Protocol(context.to_string()))
    }

    impl MemoryKeyStore {
        pub(crate) fn new(batch_cap: usize) -> Self {
            Self {
                batch_cap,
                state: Mutex::new(State::default()),
            }
        }

        /// Make the next insert fail with a persistence error.
        pub(crate) fn fail_next_insert(&self) {
            self.state.lock().unwrap().fail_next_insert = true;
        }

        /// Make the expired-record stream yield an error after `index`
        /// successful elements.
        pub(crate) fn fail_enumeration_at(&self, index: usize) {
            self.state.lock().unwrap().enumeration_error_at = Some(index);
        }

        /// Make the `call_index`-th delete_batch call (0-based) fail.
        pub(crate) fn fail_batch(&self, call_index: usize) {
            self.state.lock().unwrap().failing_batches.push(call_index);
        }

        pub(crate) fn delete_call_sizes(&self) -> Vec<usize> {
            self.state
                .lock()
                .unwrap()
                .delete_calls
                .iter()
                .map(|call| call.len())
                .collect()
        }

        pub(crate) fn stored_records(&self) -> Vec<NewUploadKey> {
            self.state
                .lock()
                .unwrap()
                .records
                .values()
                .cloned()
                .collect()
        }

        pub(crate) fn record_count(&self) -> usize {
            self.state.lock().unwrap().records.len()
        }
    }

    #[async_trait]
    impl KeyStore for MemoryKeyStore {
        async fn insert(&self, record: NewUploadKey) -> Result<RecordRef, AppError> {
            let mut state = self.state.lock().unwrap();
            if state.fail_next_insert {
                state.fail_next_insert = false;
                return Err(storage_error("insert rejected"));
            }
            let id = Uuid::new_v4();
            state.records.insert(id, record);
            Ok(RecordRef(id))
        }

        fn query_expired(&self, now: DateTime<Utc>) -> BoxStream<'_, Result<RecordRef, AppError>> {
            let state = self.state.lock().unwrap();
            let mut items: Vec<Result<RecordRef, AppError>> = state
                .records
                .iter()
                .filter(|(_, record)| record.expiry <= now)
                .map(|(id, _)| Ok(RecordRef(*id)))
                .collect();

            if let Some(at) = state.enumeration_error_at {
                items.truncate(at);
                items.push(Err(storage_error("cursor read failed")));
            }

            stream::iter(items).boxed()
        }

        async fn delete_batch(&self, refs: &[RecordRef]) -> Result<(), AppError> {
            if refs.len() > self.batch_cap {
                return Err(AppError::BatchTooLarge {
                    size: refs.len(),
                    cap: self.batch_cap,
                });
            }

            let mut state = self.state.lock().unwrap();
            let call_index = state.delete_calls.len();
            state.delete_calls.push(refs.to_vec());

            if state.failing_batches.contains(&call_index) {
                // Atomic unit-of-work: a failed batch deletes nothing
                return Err(storage_error("batch commit failed"));
            }

            for reference in refs {
                // Missing ids are a no-op, matching the trait contract
                state.records.remove(&reference.0);
            }
            Ok(())
        }
    }
}
