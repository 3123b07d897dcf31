// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed store.
//!
//! Every entity lives in its own collection keyed by its id. Multi-document
//! changes go through a single Firestore transaction.
//!
//! The version check in [`Store::commit`] reads the guarded document inside
//! the same transaction that carries the writes. Firestore then fails the
//! commit if another writer touched that document after the read, which
//! surfaces as [`StoreError::Conflict`].

use crate::db::{doc_version, ChangeSet, FieldValue, Query, Store, StoreError, Write};
use async_trait::async_trait;
use firestore::errors::FirestoreError;
use firestore::FirestoreConsistencySelector;
use serde_json::Value;
use std::sync::Arc;

// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreStore {
    client: Option<firestore::FirestoreDb>,
    commit_lock: Arc<tokio::sync::Mutex<()>>,
}

fn backend(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn concurrent_modification() -> StoreError {
    StoreError::Conflict("The record was modified concurrently, please retry".to_string())
}

impl FirestoreStore {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, StoreError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| backend(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self::with_client(client))
    }

    fn with_client(client: firestore::FirestoreDb) -> Self {
        Self {
            client: Some(client),
            commit_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, StoreError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| backend(format!("Failed to connect to Firestore Emulator: {}", e)))?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self::with_client(client))
    }

    /// Create an offline client; every operation returns an error.
    pub fn new_mock() -> Self {
        Self {
            client: None,
            commit_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, StoreError> {
        self.client
            .as_ref()
            .ok_or_else(|| backend("Database not connected (offline mode)"))
    }
}

#[async_trait]
impl Store for FirestoreStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collection)
            .obj::<Value>()
            .one(id)
            .await
            .map_err(backend)
    }

    async fn put(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collection)
            .document_id(id)
            .object(&doc)
            .execute()
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collection)
            .document_id(id)
            .execute()
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Value>, StoreError> {
        let select = self.get_client()?.fluent().select().from(collection);

        let select = if query.filters.is_empty() {
            select
        } else {
            let filters = query.filters.clone();
            select.filter(move |q| {
                q.for_all(filters.iter().map(|f| match &f.value {
                    FieldValue::Str(s) => q.field(f.field).eq(s.clone()),
                    FieldValue::Bool(b) => q.field(f.field).eq(*b),
                }))
            })
        };

        let select = match query.order_desc {
            Some(field) => {
                select.order_by([(field, firestore::FirestoreQueryDirection::Descending)])
            }
            None => select,
        };

        let select = match query.limit {
            Some(limit) => select.limit(limit),
            None => select,
        };

        select.obj::<Value>().query().await.map_err(backend)
    }

    async fn commit(&self, changes: ChangeSet) -> Result<(), StoreError> {
        if changes.writes.len() > BATCH_SIZE {
            return Err(backend(format!(
                "Change set of {} writes exceeds the transaction limit",
                changes.writes.len()
            )));
        }

        let _lock = self.commit_lock.lock().await;
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| backend(format!("Failed to begin transaction: {}", e)))?;

        if let Some(guard) = &changes.guard {
            // Reading through the transaction makes Firestore check this
            // document for conflicting writes at commit time.
            let in_transaction = client.clone_with_consistency_selector(
                FirestoreConsistencySelector::Transaction(transaction.transaction_id().clone()),
            );
            let current: Option<Value> = in_transaction
                .fluent()
                .select()
                .by_id_in(guard.collection)
                .obj()
                .one(&guard.id)
                .await
                .map_err(backend)?;
            let current = current.as_ref().map(doc_version);
            if current != guard.expected {
                tracing::debug!(
                    collection = guard.collection,
                    id = %guard.id,
                    ?current,
                    expected = ?guard.expected,
                    "Version check failed"
                );
                let _ = transaction.rollback().await;
                return Err(concurrent_modification());
            }
        }

        let count = changes.writes.len();
        for write in &changes.writes {
            match write {
                Write::Put {
                    collection,
                    id,
                    doc,
                } => {
                    client
                        .fluent()
                        .update()
                        .in_col(collection)
                        .document_id(id)
                        .object(doc)
                        .add_to_transaction(&mut transaction)
                        .map_err(|e| {
                            backend(format!("Failed to add {} write to transaction: {}", collection, e))
                        })?;
                }
                Write::Delete { collection, id } => {
                    client
                        .fluent()
                        .delete()
                        .from(collection)
                        .document_id(id)
                        .add_to_transaction(&mut transaction)
                        .map_err(|e| {
                            backend(format!(
                                "Failed to add {} deletion to transaction: {}",
                                collection, e
                            ))
                        })?;
                }
            }
        }

        transaction.commit().await.map_err(|e| match e {
            FirestoreError::DatabaseError(ref db) if db.retry_possible => {
                tracing::debug!(error = %e, "Transaction aborted by a concurrent write");
                concurrent_modification()
            }
            e => backend(format!("Transaction commit failed: {}", e)),
        })?;

        tracing::debug!(writes = count, "Change set committed");
        Ok(())
    }
}
