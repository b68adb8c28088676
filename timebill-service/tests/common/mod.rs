#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use mongodb::bson::Document;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use timebill_service::billing::{BillingEngine, EligibilitySelector};
use timebill_service::catalog::Catalog;
use timebill_service::config::{BillingConfig, IssuerDetails};
use timebill_service::error::BillingError;
use timebill_service::models::{
    Client, CreateInvoiceRequest, NewClient, NewProject, NewTimeEntry, NewWorkItem, Project,
    Rate, WorkItem,
};
use timebill_service::services::{
    DocumentStore, Filter, FindOptions, InMemoryStore, MockPdfRenderer, Repository,
    TemplateEmailComposer, Update,
};

pub const TEST_USER: &str = "user_alice";
pub const OTHER_USER: &str = "user_bob";

pub fn issuer() -> IssuerDetails {
    IssuerDetails {
        name: "Alice Freelance".into(),
        address_line1: "Hauptstr. 1".into(),
        zip_city: "10115 Berlin".into(),
        tax_id: "12/345/67890".into(),
        vat_id: "DE123456789".into(),
        bank_holder: "Alice Freelance".into(),
        bank_iban: "DE02120300000000202051".into(),
        bank_bic: "BYLADEM1001".into(),
        bank_name: "Testbank".into(),
    }
}

pub fn issue_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
}

pub struct TestApp {
    pub memory: Arc<InMemoryStore>,
    pub store: Arc<dyn DocumentStore>,
    pub renderer: Arc<MockPdfRenderer>,
    pub engine: BillingEngine,
    pub catalog: Catalog,
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::spawn_on(Arc::new(InMemoryStore::new()))
    }

    pub fn spawn_on(memory: Arc<InMemoryStore>) -> Self {
        Self::on_store(memory.clone(), memory)
    }

    /// Engine on `store`, which must ultimately write into `memory`.
    pub fn on_store(memory: Arc<InMemoryStore>, store: Arc<dyn DocumentStore>) -> Self {
        let renderer = Arc::new(MockPdfRenderer::new());
        let engine = BillingEngine::new(
            store.clone(),
            renderer.clone(),
            Arc::new(TemplateEmailComposer::new("€")),
            BillingConfig::default(),
            issuer(),
        );
        let catalog = Catalog::new(memory.clone());

        TestApp {
            memory,
            store,
            renderer,
            engine,
            catalog,
        }
    }

    pub async fn client(&self, user_id: &str, name: &str) -> Client {
        self.catalog
            .create_client(
                user_id,
                NewClient {
                    name: name.into(),
                    email: Some(format!("billing@{}.example", name.to_lowercase())),
                    address_street: Some("Marktplatz 5".into()),
                    address_zip: Some("80331".into()),
                    address_city: Some("München".into()),
                    address_country: Some("DE".into()),
                    ..Default::default()
                },
            )
            .await
            .expect("Failed to create client")
    }

    pub async fn project(&self, user_id: &str, client_id: &str, rates: Vec<Rate>) -> Project {
        self.catalog
            .create_project(
                user_id,
                NewProject {
                    name: "Website Relaunch".into(),
                    client_id: client_id.into(),
                    rates,
                    ..Default::default()
                },
            )
            .await
            .expect("Failed to create project")
    }

    /// Work item with one entry per `(rate, hours)`.
    pub async fn work_item(
        &self,
        user_id: &str,
        project_id: &str,
        name: &str,
        entries: &[(&str, Decimal)],
    ) -> WorkItem {
        self.catalog
            .create_work_item(
                user_id,
                NewWorkItem {
                    project_id: project_id.into(),
                    name: name.into(),
                    description: None,
                    time_entries: entries
                        .iter()
                        .map(|(rate, hours)| NewTimeEntry::new("work", *rate, *hours))
                        .collect(),
                },
            )
            .await
            .expect("Failed to create work item")
    }

    /// Client, project with a 120/h "Standard" rate, ready for work items.
    pub async fn billing_setup(&self, user_id: &str) -> (Client, Project) {
        let client = self.client(user_id, "Acme").await;
        let project = self
            .project(user_id, &client.id, vec![Rate::new("Standard", dec!(120))])
            .await;
        (client, project)
    }

    pub fn selector(&self) -> EligibilitySelector {
        EligibilitySelector::new(
            Repository::new(self.memory.clone()),
            Repository::new(self.memory.clone()),
        )
    }

    pub fn invoice_count(&self) -> usize {
        self.memory.count("invoices")
    }

    pub fn counter_value(&self, year: i32) -> Option<i64> {
        self.memory
            .raw("counters", &format!("invoice_number_{year}"))
            .and_then(|d| d.get_i64("sequence_value").ok())
    }
}

pub fn request(client: &Client, project: &Project, items: &[&WorkItem]) -> CreateInvoiceRequest {
    CreateInvoiceRequest {
        client_id: client.id.clone(),
        project_ids: vec![project.id.clone()],
        work_item_ids: items.iter().map(|w| w.id.clone()).collect(),
        issue_date: Some(issue_date()),
        tax_rate: Some(dec!(19.0)),
        ..Default::default()
    }
}

/// Store whose counter increments always fail.
pub struct CounterDownStore {
    pub inner: Arc<InMemoryStore>,
}

#[async_trait]
impl DocumentStore for CounterDownStore {
    async fn find_one(&self, c: &str, f: &Filter) -> Result<Option<Document>, BillingError> {
        self.inner.find_one(c, f).await
    }

    async fn find_many(
        &self,
        c: &str,
        f: &Filter,
        o: &FindOptions,
    ) -> Result<Vec<Document>, BillingError> {
        self.inner.find_many(c, f, o).await
    }

    async fn insert_one(&self, c: &str, d: Document) -> Result<(), BillingError> {
        self.inner.insert_one(c, d).await
    }

    async fn update_one(&self, c: &str, f: &Filter, u: &Update) -> Result<bool, BillingError> {
        self.inner.update_one(c, f, u).await
    }

    async fn update_many(&self, c: &str, f: &Filter, u: &Update) -> Result<u64, BillingError> {
        self.inner.update_many(c, f, u).await
    }

    async fn find_one_and_increment(
        &self,
        _c: &str,
        _id: &str,
        _field: &str,
    ) -> Result<i64, BillingError> {
        Err(BillingError::Storage("connection refused".into()))
    }

    async fn delete_one(&self, c: &str, f: &Filter) -> Result<bool, BillingError> {
        self.inner.delete_one(c, f).await
    }

    async fn health_check(&self) -> Result<(), BillingError> {
        Err(BillingError::Storage("connection refused".into()))
    }
}

/// Store where another invoice claims `stolen_id` right before the first
/// bulk mark-billed update runs.
pub struct RacingStore {
    pub inner: Arc<InMemoryStore>,
    pub stolen_id: String,
    fired: AtomicBool,
}

impl RacingStore {
    pub fn new(inner: Arc<InMemoryStore>, stolen_id: &str) -> Self {
        Self {
            inner,
            stolen_id: stolen_id.to_string(),
            fired: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl DocumentStore for RacingStore {
    async fn find_one(&self, c: &str, f: &Filter) -> Result<Option<Document>, BillingError> {
        self.inner.find_one(c, f).await
    }

    async fn find_many(
        &self,
        c: &str,
        f: &Filter,
        o: &FindOptions,
    ) -> Result<Vec<Document>, BillingError> {
        self.inner.find_many(c, f, o).await
    }

    async fn insert_one(&self, c: &str, d: Document) -> Result<(), BillingError> {
        self.inner.insert_one(c, d).await
    }

    async fn update_one(&self, c: &str, f: &Filter, u: &Update) -> Result<bool, BillingError> {
        self.inner.update_one(c, f, u).await
    }

    async fn update_many(&self, c: &str, f: &Filter, u: &Update) -> Result<u64, BillingError> {
        if c == "work_items" && !self.fired.swap(true, Ordering::SeqCst) {
            self.inner
                .update_one(
                    c,
                    &Filter::eq("_id", self.stolen_id.as_str()),
                    &Update::set("invoice_id", "concurrent-invoice"),
                )
                .await?;
        }
        self.inner.update_many(c, f, u).await
    }

    async fn find_one_and_increment(
        &self,
        c: &str,
        id: &str,
        field: &str,
    ) -> Result<i64, BillingError> {
        self.inner.find_one_and_increment(c, id, field).await
    }

    async fn delete_one(&self, c: &str, f: &Filter) -> Result<bool, BillingError> {
        self.inner.delete_one(c, f).await
    }

    async fn health_check(&self) -> Result<(), BillingError> {
        self.inner.health_check().await
    }
}
