use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::DatabaseError;
use crate::store::{DocumentStore, Filter, UniqueIndex};

/// In-process document store.
///
/// Every write runs under one write lock, so unique index checks and the
/// write they guard cannot interleave with another writer.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Value>>>,
    unique_indexes: Vec<UniqueIndex>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unique_index(mut self, index: UniqueIndex) -> Self {
        self.unique_indexes.push(index);
        self
    }

    fn check_unique(
        &self,
        collection: &str,
        candidate: &Value,
        existing: &[Value],
    ) -> Result<(), DatabaseError> {
        let candidate_id = document_id(candidate);

        for index in self.unique_indexes.iter().filter(|i| i.collection == collection) {
            let clash = existing
                .iter()
                .filter(|doc| document_id(doc) != candidate_id)
                .any(|doc| index.collides(candidate, doc));

            if clash {
                warn!("Unique index {} rejected write to {}", index.name, collection);
                return Err(DatabaseError::UniqueViolation(index.name.clone()));
            }
        }

        Ok(())
    }
}

fn document_id(document: &Value) -> Option<&str> {
    document.get("id").and_then(Value::as_str)
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(
        &self,
        collection: &str,
        filters: &[Filter],
        _auth_token: Option<&str>,
    ) -> Result<Vec<Value>, DatabaseError> {
        let collections = self.collections.read().await;

        let matches = collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| filters.iter().all(|f| f.matches(doc)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(matches)
    }

    async fn insert(
        &self,
        collection: &str,
        document: Value,
        _auth_token: Option<&str>,
    ) -> Result<Value, DatabaseError> {
        let id = document_id(&document)
            .ok_or_else(|| DatabaseError::InvalidDocument("document has no string id".to_string()))?
            .to_string();

        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();

        if docs.iter().any(|doc| document_id(doc) == Some(id.as_str())) {
            return Err(DatabaseError::UniqueViolation(format!("{}_pkey", collection)));
        }

        self.check_unique(collection, &document, docs)?;

        debug!("Inserted {} into {}", id, collection);
        docs.push(document.clone());
        Ok(document)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        changes: Value,
        _auth_token: Option<&str>,
    ) -> Result<Value, DatabaseError> {
        let Value::Object(changes) = changes else {
            return Err(DatabaseError::InvalidDocument("update must be a JSON object".to_string()));
        };

        let mut collections = self.collections.write().await;
        let docs = collections
            .get_mut(collection)
            .ok_or_else(|| DatabaseError::NotFound(format!("{} {}", collection, id)))?;

        let position = docs
            .iter()
            .position(|doc| document_id(doc) == Some(id))
            .ok_or_else(|| DatabaseError::NotFound(format!("{} {}", collection, id)))?;

        let mut merged = docs[position].clone();
        if let Value::Object(fields) = &mut merged {
            for (key, value) in changes {
                if key != "id" {
                    fields.insert(key, value);
                }
            }
        }

        self.check_unique(collection, &merged, docs)?;

        debug!("Updated {} in {}", id, collection);
        docs[position] = merged.clone();
        Ok(merged)
    }

    async fn delete(
        &self,
        collection: &str,
        id: &str,
        _auth_token: Option<&str>,
    ) -> Result<(), DatabaseError> {
        let mut collections = self.collections.write().await;
        let docs = collections
            .get_mut(collection)
            .ok_or_else(|| DatabaseError::NotFound(format!("{} {}", collection, id)))?;

        let before = docs.len();
        docs.retain(|doc| document_id(doc) != Some(id));

        if docs.len() == before {
            return Err(DatabaseError::NotFound(format!("{} {}", collection, id)));
        }

        debug!("Deleted {} from {}", id, collection);
        Ok(())
    }
}
