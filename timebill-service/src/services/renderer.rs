//! PDF rendering collaborators.

use crate::config::{IssuerDetails, PdfConfig};
use crate::error::BillingError;
use crate::models::Invoice;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// What a renderer receives: the invoice without its cached PDF, plus the
/// issuing business.
#[derive(Debug, Clone, Serialize)]
pub struct RenderPayload<'a> {
    pub invoice: &'a Invoice,
    pub issuer: &'a IssuerDetails,
}

/// Turns an invoice into PDF bytes. Must be a pure function of its inputs.
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn render(
        &self,
        invoice: &Invoice,
        issuer: &IssuerDetails,
    ) -> Result<Vec<u8>, BillingError>;
}

/// Renders through an external HTTP rendering service.
pub struct HttpPdfRenderer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPdfRenderer {
    pub fn new(config: &PdfConfig) -> Result<Self, BillingError> {
        let endpoint = config.renderer_endpoint.clone().ok_or_else(|| {
            BillingError::Render("PDF_RENDERER_ENDPOINT is not configured".to_string())
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.render_timeout_secs))
            .build()
            .map_err(|e| BillingError::Render(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl PdfRenderer for HttpPdfRenderer {
    async fn render(
        &self,
        invoice: &Invoice,
        issuer: &IssuerDetails,
    ) -> Result<Vec<u8>, BillingError> {
        let mut invoice = invoice.clone();
        invoice.pdf = None;
        let payload = RenderPayload {
            invoice: &invoice,
            issuer,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| BillingError::Render(format!("Renderer request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BillingError::Render(format!(
                "Renderer returned {} for invoice {}",
                status, invoice.invoice_number
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BillingError::Render(format!("Failed to read renderer body: {}", e)))?;

        tracing::info!(
            invoice_number = %invoice.invoice_number,
            size = bytes.len(),
            "PDF rendered"
        );
        Ok(bytes.to_vec())
    }
}

/// Renderer used when no rendering service is configured and in tests.
pub struct MockPdfRenderer {
    failing: AtomicBool,
    render_count: AtomicU64,
}

impl MockPdfRenderer {
    pub fn new() -> Self {
        Self {
            failing: AtomicBool::new(false),
            render_count: AtomicU64::new(0),
        }
    }

    /// Make every following render fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn render_count(&self) -> u64 {
        self.render_count.load(Ordering::SeqCst)
    }
}

impl Default for MockPdfRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PdfRenderer for MockPdfRenderer {
    async fn render(
        &self,
        invoice: &Invoice,
        issuer: &IssuerDetails,
    ) -> Result<Vec<u8>, BillingError> {
        self.render_count.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(BillingError::Render("mock renderer failure".to_string()));
        }

        tracing::info!(
            invoice_number = %invoice.invoice_number,
            "[MOCK] PDF would be rendered"
        );

        Ok(format!(
            "%PDF-1.4\n% {} {} {}\n%%EOF",
            issuer.name, invoice.invoice_number, invoice.total_amount
        )
        .into_bytes())
    }
}
