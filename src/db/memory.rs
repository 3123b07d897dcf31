// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store for local development and tests.

use crate::db::{doc_version, ChangeSet, Query, Store, StoreError, Write};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::{Arc, Mutex};

type Collection = Arc<DashMap<String, Value>>;

/// One concurrent map per collection.
#[derive(Default)]
pub struct MemoryStore {
    collections: DashMap<String, Collection>,
    /// Serializes commits so a change set is applied as a unit.
    commit_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn collection(&self, name: &str) -> Collection {
        self.collections
            .entry(name.to_string())
            .or_default()
            .value()
            .clone()
    }

    /// Number of documents in a collection.
    pub fn count(&self, name: &str) -> usize {
        self.collections.get(name).map(|c| c.len()).unwrap_or(0)
    }
}

fn compare_desc(field: &str, a: &Value, b: &Value) -> Ordering {
    let key = |v: &Value| v.get(field).cloned().unwrap_or(Value::Null);
    match (key(a), key(b)) {
        (Value::String(x), Value::String(y)) => y.cmp(&x),
        (Value::Number(x), Value::Number(y)) => y
            .as_f64()
            .partial_cmp(&x.as_f64())
            .unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.collection(collection).get(id).map(|d| d.value().clone()))
    }

    async fn put(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError> {
        self.collection(collection).insert(id.to_string(), doc);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.collection(collection).remove(id);
        Ok(())
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Value>, StoreError> {
        let mut docs: Vec<Value> = self
            .collection(collection)
            .iter()
            .filter(|entry| query.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        if let Some(field) = query.order_desc {
            docs.sort_by(|a, b| compare_desc(field, a, b));
        }
        if let Some(limit) = query.limit {
            docs.truncate(limit as usize);
        }
        Ok(docs)
    }

    async fn commit(&self, changes: ChangeSet) -> Result<(), StoreError> {
        let _guard = self
            .commit_lock
            .lock()
            .map_err(|_| StoreError::Backend("commit lock poisoned".to_string()))?;

        if let Some(guard) = &changes.guard {
            let current = self
                .collection(guard.collection)
                .get(&guard.id)
                .map(|d| doc_version(d.value()));
            if current != guard.expected {
                tracing::debug!(
                    collection = guard.collection,
                    id = %guard.id,
                    ?current,
                    expected = ?guard.expected,
                    "Version check failed"
                );
                return Err(StoreError::Conflict(
                    "The record was modified concurrently, please retry".to_string(),
                ));
            }
        }

        for write in changes.writes {
            match write {
                Write::Put {
                    collection,
                    id,
                    doc,
                } => {
                    self.collection(collection).insert(id, doc);
                }
                Write::Delete { collection, id } => {
                    self.collection(collection).remove(&id);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_get_query() {
        let store = MemoryStore::new();
        store
            .put("users", "u1", json!({"role": "customer", "created_at": "2026-01-01"}))
            .await
            .unwrap();
        store
            .put("users", "u2", json!({"role": "admin", "created_at": "2026-02-01"}))
            .await
            .unwrap();
        store
            .put("users", "u3", json!({"role": "customer", "created_at": "2026-03-01"}))
            .await
            .unwrap();

        let customers = store
            .query(
                "users",
                &Query::new()
                    .eq("role", "customer")
                    .order_desc("created_at")
                    .limit(1),
            )
            .await
            .unwrap();
        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0]["created_at"], "2026-03-01");
        assert_eq!(store.count("users"), 3);
    }

    #[tokio::test]
    async fn test_commit_version_guard() {
        let store = MemoryStore::new();
        let mut create = ChangeSet::new();
        create.guard_version("subscriptions", "s1", None);
        create
            .put("subscriptions", "s1", &json!({"version": 1}))
            .unwrap();
        create.put("deliveries", "d1", &json!({"n": 1})).unwrap();
        store.commit(create.clone()).await.unwrap();

        // Replaying the creation must fail and write nothing.
        let mut replay = create;
        replay.writes.push(Write::Delete {
            collection: "deliveries",
            id: "d1".to_string(),
        });
        assert!(matches!(
            store.commit(replay).await,
            Err(StoreError::Conflict(_))
        ));
        assert!(store.get("deliveries", "d1").await.unwrap().is_some());

        let mut update = ChangeSet::new();
        update.guard_version("subscriptions", "s1", Some(1));
        update
            .put("subscriptions", "s1", &json!({"version": 2}))
            .unwrap();
        store.commit(update).await.unwrap();
        let doc = store.get("subscriptions", "s1").await.unwrap().unwrap();
        assert_eq!(doc_version(&doc), 2);
    }
}
