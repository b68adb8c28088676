//! In-process [`DocumentStore`] used by tests and local runs without MongoDB.

use crate::error::BillingError;
use crate::services::store::{compare_bson, DocumentStore, Filter, FindOptions, SortOrder, Update};
use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Collections of documents behind one mutex, so every operation is atomic
/// with respect to every other, including the counter increment.
#[derive(Default)]
pub struct InMemoryStore {
    collections: Mutex<HashMap<String, Vec<Document>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Vec<Document>>>, BillingError> {
        self.collections
            .lock()
            .map_err(|_| BillingError::Storage("in-memory store lock poisoned".to_string()))
    }

    /// Number of documents in a collection.
    pub fn count(&self, collection: &str) -> usize {
        self.lock()
            .map(|c| c.get(collection).map(Vec::len).unwrap_or(0))
            .unwrap_or(0)
    }

    /// Raw copy of a stored document, bypassing typed decoding.
    pub fn raw(&self, collection: &str, id: &str) -> Option<Document> {
        let filter = Filter::eq("_id", id);
        self.lock().ok().and_then(|c| {
            c.get(collection)
                .and_then(|docs| docs.iter().find(|d| filter.matches(d)).cloned())
        })
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, BillingError> {
        let collections = self.lock()?;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| filter.matches(d)).cloned()))
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, BillingError> {
        let collections = self.lock()?;
        let mut found: Vec<Document> = collections
            .get(collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default();
        drop(collections);

        if let Some((field, order)) = &options.sort {
            found.sort_by(|a, b| {
                let ordering = compare_bson(a.get(field), b.get(field));
                match order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            });
        }

        let skipped = found.into_iter().skip(options.skip as usize);
        Ok(match options.limit {
            Some(limit) if limit > 0 => skipped.take(limit as usize).collect(),
            _ => skipped.collect(),
        })
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<(), BillingError> {
        let mut collections = self.lock()?;
        let docs = collections.entry(collection.to_string()).or_default();
        if let Some(id) = document.get("_id") {
            if docs.iter().any(|d| d.get("_id") == Some(id)) {
                return Err(BillingError::Storage(format!(
                    "duplicate key in {collection}: {id}"
                )));
            }
        }
        docs.push(document);
        Ok(())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<bool, BillingError> {
        let mut collections = self.lock()?;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };
        match docs.iter_mut().find(|d| filter.matches(d)) {
            Some(document) => {
                update.apply(document);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<u64, BillingError> {
        let mut collections = self.lock()?;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let mut modified = 0;
        for document in docs.iter_mut().filter(|d| filter.matches(d)) {
            update.apply(document);
            modified += 1;
        }
        Ok(modified)
    }

    async fn find_one_and_increment(
        &self,
        collection: &str,
        id: &str,
        field: &str,
    ) -> Result<i64, BillingError> {
        let mut collections = self.lock()?;
        let docs = collections.entry(collection.to_string()).or_default();
        let key = Bson::String(id.to_string());
        match docs.iter_mut().find(|d| d.get("_id") == Some(&key)) {
            Some(document) => {
                let next = match document.get(field) {
                    Some(Bson::Int64(v)) => v + 1,
                    Some(Bson::Int32(v)) => i64::from(*v) + 1,
                    None => 1,
                    Some(other) => {
                        return Err(BillingError::Storage(format!(
                            "counter {id} holds non-integer {field}: {other}"
                        )));
                    }
                };
                document.insert(field, next);
                Ok(next)
            }
            None => {
                docs.push(doc! { "_id": id, field: 1_i64 });
                Ok(1)
            }
        }
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<bool, BillingError> {
        let mut collections = self.lock()?;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };
        match docs.iter().position(|d| filter.matches(d)) {
            Some(index) => {
                docs.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn health_check(&self) -> Result<(), BillingError> {
        self.lock().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn increment_creates_counter_lazily() {
        let store = InMemoryStore::new();
        assert_eq!(
            store
                .find_one_and_increment("counters", "invoice_number_2024", "sequence_value")
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            store
                .find_one_and_increment("counters", "invoice_number_2024", "sequence_value")
                .await
                .unwrap(),
            2
        );
        assert_eq!(
            store
                .find_one_and_increment("counters", "invoice_number_2025", "sequence_value")
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let store = InMemoryStore::new();
        store.insert_one("c", doc! { "_id": "a" }).await.unwrap();
        assert!(store.insert_one("c", doc! { "_id": "a" }).await.is_err());
        assert_eq!(store.count("c"), 1);
    }

    #[tokio::test]
    async fn find_many_sorts_and_pages() {
        let store = InMemoryStore::new();
        for (id, n) in [("a", 2), ("b", 3), ("c", 1)] {
            store
                .insert_one("c", doc! { "_id": id, "n": n, "user_id": "u" })
                .await
                .unwrap();
        }
        let options = FindOptions::sorted("n", SortOrder::Descending).page(1, 1);
        let found = store
            .find_many("c", &Filter::eq("user_id", "u"), &options)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get_str("_id").unwrap(), "a");
    }

    #[tokio::test]
    async fn update_many_counts_only_matches() {
        let store = InMemoryStore::new();
        store
            .insert_one("w", doc! { "_id": "a", "invoice_id": Bson::Null })
            .await
            .unwrap();
        store
            .insert_one("w", doc! { "_id": "b", "invoice_id": "old" })
            .await
            .unwrap();
        let modified = store
            .update_many(
                "w",
                &Filter::is_in("_id", vec!["a", "b"]).with(Filter::is_null("invoice_id")),
                &Update::set("invoice_id", "new"),
            )
            .await
            .unwrap();
        assert_eq!(modified, 1);
        assert_eq!(store.raw("w", "b").unwrap().get_str("invoice_id").unwrap(), "old");
    }
}
