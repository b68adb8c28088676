//! Generic typed repository over a [`DocumentStore`].

use crate::error::BillingError;
use crate::services::store::{DocumentStore, Filter, FindOptions, Update};
use mongodb::bson::{self, Document};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;

/// A stored, user-owned record.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: &'static str;
    /// Name used in `NotFound` errors.
    const KIND: &'static str;

    fn id(&self) -> &str;
}

/// Typed access to one collection. Every document crossing this boundary is
/// (de)serialized strictly; a stored document that does not fit `T` is a
/// storage error, never a partially filled value.
pub struct Repository<T> {
    store: Arc<dyn DocumentStore>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> Repository<T> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }

    pub async fn get_owned(&self, user_id: &str, id: &str) -> Result<Option<T>, BillingError> {
        self.find_one(&Filter::owned(user_id, id)).await
    }

    /// Like [`get_owned`](Self::get_owned) but absence is an error.
    pub async fn require_owned(&self, user_id: &str, id: &str) -> Result<T, BillingError> {
        self.get_owned(user_id, id)
            .await?
            .ok_or_else(|| BillingError::not_found(T::KIND, id))
    }

    pub async fn find_one(&self, filter: &Filter) -> Result<Option<T>, BillingError> {
        self.store
            .find_one(T::COLLECTION, filter)
            .await?
            .map(decode::<T>)
            .transpose()
    }

    pub async fn find(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<T>, BillingError> {
        self.store
            .find_many(T::COLLECTION, filter, options)
            .await?
            .into_iter()
            .map(decode::<T>)
            .collect()
    }

    pub async fn insert(&self, entity: &T) -> Result<(), BillingError> {
        self.store
            .insert_one(T::COLLECTION, encode(entity)?)
            .await
    }

    /// Overwrite every stored field of an owned entity except its id.
    pub async fn replace_owned(&self, user_id: &str, entity: &T) -> Result<bool, BillingError> {
        let mut document = encode(entity)?;
        document.remove("_id");
        let update = document
            .into_iter()
            .fold(Update::default(), |update, (key, value)| {
                update.and_set(&key, value)
            });
        self.store
            .update_one(T::COLLECTION, &Filter::owned(user_id, entity.id()), &update)
            .await
    }

    pub async fn update_one(&self, filter: &Filter, update: &Update) -> Result<bool, BillingError> {
        self.store.update_one(T::COLLECTION, filter, update).await
    }

    pub async fn update_many(&self, filter: &Filter, update: &Update) -> Result<u64, BillingError> {
        self.store.update_many(T::COLLECTION, filter, update).await
    }

    pub async fn delete_owned(&self, user_id: &str, id: &str) -> Result<bool, BillingError> {
        self.store
            .delete_one(T::COLLECTION, &Filter::owned(user_id, id))
            .await
    }
}

fn encode<T: Entity>(entity: &T) -> Result<Document, BillingError> {
    bson::to_document(entity).map_err(|e| {
        BillingError::Storage(format!("failed to encode {}: {}", T::KIND, e))
    })
}

fn decode<T: Entity>(document: Document) -> Result<T, BillingError> {
    let id = document.get_str("_id").unwrap_or("<missing>").to_string();
    bson::from_document(document).map_err(|e| {
        tracing::error!(kind = T::KIND, id = %id, error = %e, "Rejected malformed stored document");
        BillingError::Storage(format!("malformed {} document {}: {}", T::KIND, id, e))
    })
}
