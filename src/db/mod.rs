// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Storage layer.
//!
//! Handlers and services talk to a [`Store`]; documents travel as JSON
//! values and are (de)serialized at the edge by the typed helpers on
//! `dyn Store`.

pub mod firestore;
pub mod memory;

pub use self::firestore::FirestoreStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

const MAX_CONCURRENT_DB_OPS: usize = 50;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const KITCHENS: &str = "kitchens";
    pub const PLANS: &str = "plans";
    pub const MENU_ITEMS: &str = "menu_items";
    pub const MENU_TEMPLATES: &str = "menu_templates";
    pub const BANNERS: &str = "banners";
    pub const SUBSCRIPTIONS: &str = "subscriptions";
    pub const DELIVERIES: &str = "deliveries";
    pub const DELIVERY_REQUESTS: &str = "delivery_requests";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const AUDIT_LOGS: &str = "audit_logs";
    pub const IMAGES: &str = "images";
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Optimistic version check failed; the caller should re-read and retry.
    #[error("{0}")]
    Conflict(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Document encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Equality filter value. Enums and dates are stored as strings.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Bool(bool),
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Str(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Str(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl FieldValue {
    pub fn matches(&self, value: Option<&Value>) -> bool {
        match (self, value) {
            (FieldValue::Str(s), Some(Value::String(v))) => s == v,
            (FieldValue::Bool(b), Some(Value::Bool(v))) => b == v,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Filter {
    pub field: &'static str,
    pub value: FieldValue,
}

/// A conjunction of equality filters with optional ordering and limit.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filters: Vec<Filter>,
    /// Field to sort by, descending.
    pub order_desc: Option<&'static str>,
    pub limit: Option<u32>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &'static str, value: impl Into<FieldValue>) -> Self {
        self.filters.push(Filter {
            field,
            value: value.into(),
        });
        self
    }

    /// Add an equality filter only when `value` is present.
    pub fn eq_opt<V: Into<FieldValue>>(self, field: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.eq(field, v),
            None => self,
        }
    }

    pub fn order_desc(mut self, field: &'static str) -> Self {
        self.order_desc = Some(field);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a document satisfies every filter.
    pub fn matches(&self, doc: &Value) -> bool {
        self.filters
            .iter()
            .all(|f| f.value.matches(doc.get(f.field)))
    }
}

/// Optimistic concurrency precondition for a commit.
#[derive(Debug, Clone)]
pub struct VersionGuard {
    pub collection: &'static str,
    pub id: String,
    /// `None` means the document must not exist yet.
    pub expected: Option<u64>,
}

#[derive(Debug, Clone)]
pub enum Write {
    Put {
        collection: &'static str,
        id: String,
        doc: Value,
    },
    Delete {
        collection: &'static str,
        id: String,
    },
}

/// A set of writes applied atomically by [`Store::commit`].
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub guard: Option<VersionGuard>,
    pub writes: Vec<Write>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn guard_version(&mut self, collection: &'static str, id: &str, expected: Option<u64>) {
        self.guard = Some(VersionGuard {
            collection,
            id: id.to_string(),
            expected,
        });
    }

    pub fn put<T: Serialize>(
        &mut self,
        collection: &'static str,
        id: &str,
        doc: &T,
    ) -> Result<(), StoreError> {
        self.writes.push(Write::Put {
            collection,
            id: id.to_string(),
            doc: serde_json::to_value(doc)?,
        });
        Ok(())
    }

    pub fn delete(&mut self, collection: &'static str, id: &str) {
        self.writes.push(Write::Delete {
            collection,
            id: id.to_string(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Read the `version` field of a stored document.
pub fn doc_version(doc: &Value) -> u64 {
    doc.get("version").and_then(Value::as_u64).unwrap_or(0)
}

/// Document storage backend.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    async fn put(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Value>, StoreError>;

    /// Apply every write or none. Fails with [`StoreError::Conflict`] when
    /// the guard's version does not match the stored document.
    async fn commit(&self, changes: ChangeSet) -> Result<(), StoreError>;
}

impl dyn Store + '_ {
    pub async fn get_doc<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<T>, StoreError> {
        match self.get(collection, id).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn put_doc<T: Serialize>(
        &self,
        collection: &str,
        id: &str,
        doc: &T,
    ) -> Result<(), StoreError> {
        self.put(collection, id, serde_json::to_value(doc)?).await
    }

    pub async fn query_docs<T: DeserializeOwned>(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Vec<T>, StoreError> {
        self.query(collection, query)
            .await?
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(StoreError::from))
            .collect()
    }

    /// Fetch several documents by id concurrently; missing ids are skipped.
    pub async fn get_many<T: DeserializeOwned>(
        &self,
        collection: &str,
        ids: &[String],
    ) -> Result<Vec<T>, StoreError> {
        // Collect the reads first; mapping them inside the stream is not `Send` for handlers.
        let reads: Vec<_> = ids.iter().map(|id| self.get(collection, id)).collect();
        let docs: Vec<Result<Option<Value>, StoreError>> = stream::iter(reads)
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect()
            .await;

        let mut found = Vec::with_capacity(docs.len());
        for doc in docs {
            if let Some(doc) = doc? {
                found.push(serde_json::from_value(doc)?);
            }
        }
        Ok(found)
    }
}
