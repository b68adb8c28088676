//! MongoDB backend for timebill-service.

use crate::error::BillingError;
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::{DocumentStore, Filter, FindOptions, Update};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Bson, Document},
    options::{FindOneAndUpdateOptions, IndexOptions, ReturnDocument},
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!("Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::from(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for timebill-service");

        let indexes: [(&str, Document, &str, bool); 6] = [
            ("clients", doc! { "user_id": 1 }, "clients_user_idx", false),
            ("projects", doc! { "user_id": 1, "client_id": 1 }, "projects_user_client_idx", false),
            (
                "work_items",
                doc! { "user_id": 1, "project_id": 1, "invoice_id": 1 },
                "work_items_billing_idx",
                false,
            ),
            (
                "invoices",
                doc! { "user_id": 1, "invoice_number": 1 },
                "invoices_number_idx",
                true,
            ),
            ("invoices", doc! { "user_id": 1, "issue_date": -1 }, "invoices_issue_date_idx", false),
            ("events", doc! { "user_id": 1, "relevant_date": -1 }, "events_timeline_idx", false),
        ];

        for (collection, keys, name, unique) in indexes {
            let index = IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                        .name(name.to_string())
                        .unique(unique)
                        .build(),
                )
                .build();

            self.collection(collection)
                .create_index(index, None)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to create {} index on {}: {}", name, collection, e);
                    AppError::from(e)
                })?;
            tracing::info!(collection = collection, index = name, "Created index");
        }

        Ok(())
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection(name)
    }

    pub fn client(&self) -> &MongoClient {
        &self.client
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl DocumentStore for MongoDb {
    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, BillingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_one"])
            .start_timer();
        let found = self
            .collection(collection)
            .find_one(filter.to_document(), None)
            .await
            .map_err(|e| {
                tracing::error!(collection = collection, "Failed to find document: {}", e);
                BillingError::from(e)
            })?;
        timer.observe_duration();
        Ok(found)
    }

    async fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, BillingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_many"])
            .start_timer();

        let mut find_options = mongodb::options::FindOptions::default();
        find_options.sort = options.sort_document();
        find_options.skip = (options.skip > 0).then_some(options.skip);
        find_options.limit = options.limit;

        let cursor = self
            .collection(collection)
            .find(filter.to_document(), find_options)
            .await
            .map_err(|e| {
                tracing::error!(collection = collection, "Failed to query documents: {}", e);
                BillingError::from(e)
            })?;
        let documents: Vec<Document> = cursor.try_collect().await.map_err(|e| {
            tracing::error!(collection = collection, "Failed to collect documents: {}", e);
            BillingError::from(e)
        })?;

        timer.observe_duration();
        Ok(documents)
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<(), BillingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_one"])
            .start_timer();
        self.collection(collection)
            .insert_one(document, None)
            .await
            .map_err(|e| {
                tracing::error!(collection = collection, "Failed to insert document: {}", e);
                BillingError::from(e)
            })?;
        timer.observe_duration();
        Ok(())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<bool, BillingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_one"])
            .start_timer();
        let result = self
            .collection(collection)
            .update_one(filter.to_document(), update.to_document(), None)
            .await
            .map_err(|e| {
                tracing::error!(collection = collection, "Failed to update document: {}", e);
                BillingError::from(e)
            })?;
        timer.observe_duration();
        Ok(result.matched_count > 0)
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<u64, BillingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_many"])
            .start_timer();
        let result = self
            .collection(collection)
            .update_many(filter.to_document(), update.to_document(), None)
            .await
            .map_err(|e| {
                tracing::error!(collection = collection, "Failed to update documents: {}", e);
                BillingError::from(e)
            })?;
        timer.observe_duration();
        Ok(result.modified_count)
    }

    async fn find_one_and_increment(
        &self,
        collection: &str,
        id: &str,
        field: &str,
    ) -> Result<i64, BillingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_one_and_increment"])
            .start_timer();
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        let updated = self
            .collection(collection)
            .find_one_and_update(doc! { "_id": id }, doc! { "$inc": { field: 1_i64 } }, options)
            .await
            .map_err(|e| {
                tracing::error!(counter = id, "Failed to increment counter: {}", e);
                BillingError::from(e)
            })?;
        timer.observe_duration();

        match updated.as_ref().and_then(|d| d.get(field)) {
            Some(Bson::Int64(value)) => Ok(*value),
            Some(Bson::Int32(value)) => Ok(i64::from(*value)),
            other => Err(BillingError::Storage(format!(
                "counter {id} returned unexpected {field}: {other:?}"
            ))),
        }
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<bool, BillingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_one"])
            .start_timer();
        let result = self
            .collection(collection)
            .delete_one(filter.to_document(), None)
            .await
            .map_err(|e| {
                tracing::error!(collection = collection, "Failed to delete document: {}", e);
                BillingError::from(e)
            })?;
        timer.observe_duration();
        Ok(result.deleted_count > 0)
    }

    async fn health_check(&self) -> Result<(), BillingError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                BillingError::from(e)
            })?;
        Ok(())
    }
}
