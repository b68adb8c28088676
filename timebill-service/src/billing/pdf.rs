//! Lazily rendered, stored invoice PDFs.

use crate::billing::events::EventLog;
use crate::config::IssuerDetails;
use crate::error::BillingError;
use crate::models::{Event, EventType, Invoice};
use crate::services::metrics::PDF_RENDERS_TOTAL;
use crate::services::queries::invoices;
use crate::services::renderer::PdfRenderer;
use crate::services::repository::Repository;
use crate::services::store::Update;
use mongodb::bson::{spec::BinarySubtype, Binary, Bson};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Stored PDF bytes are a cache of the invoice content: they are written at
/// most once per invoice and can always be rendered again.
#[derive(Clone)]
pub struct PdfCache {
    invoices: Repository<Invoice>,
    renderer: Arc<dyn PdfRenderer>,
    issuer: IssuerDetails,
    events: EventLog,
}

impl PdfCache {
    pub fn new(
        invoices: Repository<Invoice>,
        renderer: Arc<dyn PdfRenderer>,
        issuer: IssuerDetails,
        events: EventLog,
    ) -> Self {
        Self {
            invoices,
            renderer,
            issuer,
            events,
        }
    }

    /// Stored bytes when present, otherwise render and store.
    #[instrument(skip(self))]
    pub async fn ensure(&self, user_id: &str, invoice_id: &str) -> Result<Vec<u8>, BillingError> {
        let invoice = self.invoices.require_owned(user_id, invoice_id).await?;
        if let Some(bytes) = invoice.pdf_bytes() {
            PDF_RENDERS_TOTAL.with_label_values(&["cached"]).inc();
            return Ok(bytes.to_vec());
        }

        let bytes = self
            .renderer
            .render(&invoice, &self.issuer)
            .await
            .inspect_err(|_| PDF_RENDERS_TOTAL.with_label_values(&["failed"]).inc())?;

        self.store(&invoice, &bytes).await;
        Ok(bytes)
    }

    /// Write the bytes only if no PDF is stored yet. A failed or lost write
    /// costs a re-render later, nothing more.
    async fn store(&self, invoice: &Invoice, bytes: &[u8]) {
        let binary = Bson::Binary(Binary {
            subtype: BinarySubtype::Generic,
            bytes: bytes.to_vec(),
        });

        match self
            .invoices
            .update_one(
                &invoices::without_pdf(&invoice.user_id, &invoice.id),
                &Update::set("pdf", binary),
            )
            .await
        {
            Ok(true) => {
                PDF_RENDERS_TOTAL.with_label_values(&["stored"]).inc();
                info!(
                    invoice_id = %invoice.id,
                    invoice_number = %invoice.invoice_number,
                    size = bytes.len(),
                    "Stored invoice PDF"
                );
                self.events
                    .record(
                        Event::new(
                            EventType::InvoicePdfGenerated,
                            &invoice.user_id,
                            invoice.issue_date,
                            format!("PDF generated for invoice {}", invoice.invoice_number),
                        )
                        .related_to("Invoice", &invoice.id),
                    )
                    .await;
            }
            Ok(false) => {
                info!(invoice_id = %invoice.id, "PDF already stored by another renderer");
            }
            Err(e) => {
                warn!(invoice_id = %invoice.id, error = %e, "Failed to store rendered PDF");
            }
        }
    }
}
