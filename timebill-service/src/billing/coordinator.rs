//! Invoice commit and the operations on existing invoices.

use crate::billing::compiler::compile;
use crate::billing::eligibility::EligibilitySelector;
use crate::billing::events::EventLog;
use crate::billing::pdf::PdfCache;
use crate::billing::sequence::SequenceAllocator;
use crate::config::{BillingConfig, IssuerDetails};
use crate::error::BillingError;
use crate::models::{
    Client, ClientInfo, CreateInvoiceRequest, EmailContent, EmailTemplateRequest, Event,
    EventQuery, EventType, Invoice, InvoiceQuery, InvoiceStatus, Project, WorkItem,
};
use crate::services::email::EmailComposer;
use crate::services::metrics::{
    ERRORS_TOTAL, INVOICES_TOTAL, INVOICE_AMOUNT_TOTAL, PARTIAL_COMMITS_TOTAL,
};
use crate::services::queries::{invoices, work_items};
use crate::services::renderer::PdfRenderer;
use crate::services::repository::Repository;
use crate::services::store::{DocumentStore, Filter, FindOptions, SortOrder, Update};
use crate::workers::{PdfJob, PdfQueue};
use chrono::{Datelike, Days, NaiveDate, Utc};
use mongodb::bson::{self, DateTime as BsonDateTime};
use rust_decimal::prelude::ToPrimitive;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Owns every invoice write. Invoices are created only through
/// [`create_invoice`](Self::create_invoice) and afterwards change only by
/// status transition or PDF caching.
#[derive(Clone)]
pub struct BillingEngine {
    projects: Repository<Project>,
    work_items: Repository<WorkItem>,
    invoices: Repository<Invoice>,
    selector: EligibilitySelector,
    allocator: SequenceAllocator,
    events: EventLog,
    pdf: PdfCache,
    composer: Arc<dyn EmailComposer>,
    billing: BillingConfig,
    issuer: IssuerDetails,
    pdf_queue: Option<PdfQueue>,
}

impl BillingEngine {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        renderer: Arc<dyn PdfRenderer>,
        composer: Arc<dyn EmailComposer>,
        billing: BillingConfig,
        issuer: IssuerDetails,
    ) -> Self {
        let clients = Repository::<Client>::new(store.clone());
        let work_items = Repository::<WorkItem>::new(store.clone());
        let invoices = Repository::<Invoice>::new(store.clone());
        let events = EventLog::new(Repository::new(store.clone()));

        Self {
            projects: Repository::new(store.clone()),
            selector: EligibilitySelector::new(clients, work_items.clone()),
            allocator: SequenceAllocator::new(store),
            pdf: PdfCache::new(invoices.clone(), renderer, issuer.clone(), events.clone()),
            work_items,
            invoices,
            events,
            composer,
            billing,
            issuer,
            pdf_queue: None,
        }
    }

    /// Render PDFs in the background after each invoice is created.
    pub fn with_pdf_queue(mut self, queue: PdfQueue) -> Self {
        self.pdf_queue = Some(queue);
        self
    }

    pub fn pdf_cache(&self) -> PdfCache {
        self.pdf.clone()
    }

    pub fn allocator(&self) -> &SequenceAllocator {
        &self.allocator
    }

    /// Generate an invoice from unbilled work items.
    ///
    /// Everything up to number allocation is free of side effects, so a
    /// rejected request leaves the counter untouched. The invoice insert is
    /// the commit point: later steps only log when they fall short.
    #[instrument(skip(self, request), fields(client_id = %request.client_id))]
    pub async fn create_invoice(
        &self,
        user_id: &str,
        request: CreateInvoiceRequest,
    ) -> Result<Invoice, BillingError> {
        self.create_invoice_inner(user_id, request)
            .await
            .inspect_err(count_error)
    }

    async fn create_invoice_inner(
        &self,
        user_id: &str,
        request: CreateInvoiceRequest,
    ) -> Result<Invoice, BillingError> {
        validate_request(&request)?;

        let selection = self
            .selector
            .select_billable_entries(
                user_id,
                &request.client_id,
                &request.project_ids,
                &request.work_item_ids,
            )
            .await?;
        let client_snapshot = ClientInfo::from(&selection.client);

        let projects = self.load_projects(user_id, &selection.work_items).await?;
        let tax_rate = request.tax_rate.unwrap_or(self.billing.default_tax_rate);
        let compiled = compile(&selection.work_items, &projects, tax_rate)?;
        if compiled.line_items.is_empty() {
            return Err(BillingError::NoBillableItems);
        }

        let issue_date = request.issue_date.unwrap_or_else(|| Utc::now().date_naive());
        let due_days = request.due_date_days.unwrap_or(self.billing.default_due_days);
        let due_date = issue_date
            .checked_add_days(Days::new(u64::from(due_days)))
            .ok_or_else(|| {
                BillingError::Validation(format!(
                    "due date {due_days} days after {issue_date} is out of range"
                ))
            })?;

        // Explicit bounds win; missing ones come from the billed work.
        let service_date_from = request.service_date_from.or(compiled.first_work_date);
        let service_date_to = request.service_date_to.or(compiled.last_work_date);
        validate_period(service_date_from, service_date_to)?;

        let invoice_number = self
            .allocator
            .next_invoice_number(issue_date.year(), &self.billing.invoice_number_prefix)
            .await?;

        let now = Utc::now();
        let invoice = Invoice {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            invoice_number,
            client_id: request.client_id.clone(),
            project_ids: request.project_ids.clone(),
            issue_date,
            due_date,
            service_date_from,
            service_date_to,
            line_items: compiled.line_items,
            subtotal: compiled.subtotal,
            tax_rate,
            tax_amount: compiled.tax_amount,
            total_amount: compiled.total_amount,
            status: InvoiceStatus::Processed,
            payment_date: None,
            notes: request.notes.clone(),
            client_snapshot,
            template_id: "default".to_string(),
            pdf: None,
            created_at: now,
            updated_at: now,
        };

        self.invoices.insert(&invoice).await?;
        info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            total_amount = %invoice.total_amount,
            "Invoice created"
        );

        self.mark_billed(user_id, &invoice).await;

        self.events
            .record(
                Event::new(
                    EventType::InvoiceCreated,
                    user_id,
                    invoice.issue_date,
                    format!(
                        "Invoice {} created for client {}.",
                        invoice.invoice_number, invoice.client_snapshot.name
                    ),
                )
                .related_to("Invoice", &invoice.id)
                .with_details(json!({
                    "invoice_number": invoice.invoice_number,
                    "client_id": invoice.client_id,
                    "total_amount": invoice.total_amount.to_string(),
                })),
            )
            .await;

        INVOICES_TOTAL
            .with_label_values(&[invoice.status.as_str()])
            .inc();
        INVOICE_AMOUNT_TOTAL
            .with_label_values(&[self.billing.currency.as_str()])
            .inc_by(invoice.total_amount.to_f64().unwrap_or_default());

        let stored = match self.invoices.get_owned(user_id, &invoice.id).await {
            Ok(Some(stored)) => stored,
            Ok(None) => {
                warn!(invoice_id = %invoice.id, "Created invoice not readable yet, returning local copy");
                invoice
            }
            Err(e) => {
                warn!(invoice_id = %invoice.id, error = %e, "Re-reading created invoice failed, returning local copy");
                invoice
            }
        };

        if let Some(queue) = &self.pdf_queue {
            let job = PdfJob {
                user_id: user_id.to_string(),
                invoice_id: stored.id.clone(),
            };
            if let Err(e) = queue.enqueue(job) {
                warn!(invoice_id = %stored.id, error = %e, "PDF will be rendered on first request");
            }
        }

        Ok(stored)
    }

    async fn load_projects(
        &self,
        user_id: &str,
        items: &[WorkItem],
    ) -> Result<Vec<Project>, BillingError> {
        let mut ids: Vec<String> = items.iter().map(|w| w.project_id.clone()).collect();
        ids.sort();
        ids.dedup();
        self.projects
            .find(
                &Filter::and(vec![
                    Filter::is_in("_id", ids),
                    Filter::eq("user_id", user_id),
                ]),
                &FindOptions::default(),
            )
            .await
    }

    /// One conditional bulk update. Fewer modifications than line-item work
    /// items means another invoice claimed some of them first; the invoice
    /// stands and the discrepancy is left for reconciliation.
    async fn mark_billed(&self, user_id: &str, invoice: &Invoice) {
        let consumed = invoice.work_item_ids();
        let expected = consumed.len() as u64;

        let result = self
            .work_items
            .update_many(
                &work_items::claimable(user_id, &consumed),
                &work_items::mark_billed(&invoice.id, Utc::now()),
            )
            .await;

        match result {
            Ok(modified) if modified == expected => {
                info!(invoice_id = %invoice.id, work_items = modified, "Marked work items billed");
            }
            Ok(modified) => {
                PARTIAL_COMMITS_TOTAL.inc();
                warn!(
                    invoice_id = %invoice.id,
                    invoice_number = %invoice.invoice_number,
                    expected = expected,
                    modified = modified,
                    work_item_ids = ?consumed,
                    "Partial commit: fewer work items marked billed than invoiced"
                );
            }
            Err(e) => {
                PARTIAL_COMMITS_TOTAL.inc();
                error!(
                    invoice_id = %invoice.id,
                    invoice_number = %invoice.invoice_number,
                    work_item_ids = ?consumed,
                    error = %e,
                    "Partial commit: marking work items billed failed"
                );
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn get_invoice(&self, user_id: &str, invoice_id: &str) -> Result<Invoice, BillingError> {
        self.invoices.require_owned(user_id, invoice_id).await
    }

    /// Newest first.
    pub async fn list_invoices(
        &self,
        user_id: &str,
        query: &InvoiceQuery,
    ) -> Result<Vec<Invoice>, BillingError> {
        let options =
            FindOptions::sorted("created_at", SortOrder::Descending).page(query.skip, query.limit);
        self.invoices
            .find(&invoices::listing(user_id, query), &options)
            .await
    }

    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        user_id: &str,
        invoice_id: &str,
        status: InvoiceStatus,
    ) -> Result<Invoice, BillingError> {
        self.transition(user_id, invoice_id, status, Update::default())
            .await
            .inspect_err(count_error)
    }

    #[instrument(skip(self))]
    pub async fn mark_paid(
        &self,
        user_id: &str,
        invoice_id: &str,
        payment_date: NaiveDate,
    ) -> Result<Invoice, BillingError> {
        let date = bson::to_bson(&payment_date)
            .map_err(|e| BillingError::Storage(format!("failed to encode payment date: {}", e)))?;
        self.transition(
            user_id,
            invoice_id,
            InvoiceStatus::Paid,
            Update::set("payment_date", date),
        )
        .await
        .inspect_err(count_error)
    }

    async fn transition(
        &self,
        user_id: &str,
        invoice_id: &str,
        target: InvoiceStatus,
        extra: Update,
    ) -> Result<Invoice, BillingError> {
        let update = extra
            .and_set("status", target.as_str())
            .and_set("updated_at", BsonDateTime::from_chrono(Utc::now()));

        let matched = self
            .invoices
            .update_one(&invoices::transition(user_id, invoice_id, target), &update)
            .await?;

        if !matched {
            let current = self.invoices.require_owned(user_id, invoice_id).await?;
            return Err(BillingError::Validation(format!(
                "invoice {} cannot move from {} to {}",
                current.invoice_number, current.status, target
            )));
        }

        let invoice = self.invoices.require_owned(user_id, invoice_id).await?;
        info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            status = %target,
            "Invoice status updated"
        );
        INVOICES_TOTAL.with_label_values(&[target.as_str()]).inc();

        self.events
            .record(
                Event::new(
                    EventType::InvoiceStatusUpdated,
                    user_id,
                    invoice.payment_date.unwrap_or_else(|| Utc::now().date_naive()),
                    format!("Invoice {} marked {}.", invoice.invoice_number, target),
                )
                .related_to("Invoice", &invoice.id)
                .with_details(json!({ "status": target.as_str() })),
            )
            .await;

        Ok(invoice)
    }

    /// Audit timeline of everything recorded for the user.
    pub async fn list_events(
        &self,
        user_id: &str,
        query: &EventQuery,
    ) -> Result<Vec<Event>, BillingError> {
        self.events.list(user_id, query).await.inspect_err(count_error)
    }

    /// PDF bytes, rendered and stored on first request.
    pub async fn invoice_pdf(&self, user_id: &str, invoice_id: &str) -> Result<Vec<u8>, BillingError> {
        self.pdf
            .ensure(user_id, invoice_id)
            .await
            .inspect_err(count_error)
    }

    pub async fn compose_invoice_email(
        &self,
        user_id: &str,
        invoice_id: &str,
        request: &EmailTemplateRequest,
    ) -> Result<EmailContent, BillingError> {
        let invoice = self.invoices.require_owned(user_id, invoice_id).await?;
        self.composer
            .compose(&invoice, request, &self.issuer)
            .await
            .inspect_err(count_error)
    }
}

fn validate_request(request: &CreateInvoiceRequest) -> Result<(), BillingError> {
    if request.client_id.trim().is_empty() {
        return Err(BillingError::Validation("client_id is required".to_string()));
    }
    validate_period(request.service_date_from, request.service_date_to)?;
    if let Some(rate) = request.tax_rate {
        if rate.is_sign_negative() {
            return Err(BillingError::Validation(format!(
                "tax rate must not be negative, got {rate}"
            )));
        }
    }
    Ok(())
}

fn validate_period(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<(), BillingError> {
    match (from, to) {
        (Some(from), Some(to)) if from > to => Err(BillingError::Validation(format!(
            "service period starts {from} after it ends {to}"
        ))),
        _ => Ok(()),
    }
}

fn count_error(e: &BillingError) {
    ERRORS_TOTAL.with_label_values(&[e.label()]).inc();
}
