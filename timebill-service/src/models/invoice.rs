//! Invoice model for timebill-service.

use crate::models::{ClientInfo, InvoiceLineItem};
use crate::services::repository::Entity;
use chrono::{DateTime, NaiveDate, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use mongodb::bson::Binary;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Processed,
    Sent,
    Paid,
    Void,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Processed => "processed",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Void => "void",
        }
    }

    /// Statuses an invoice may be in to move to `self`.
    pub fn allowed_sources(&self) -> &'static [InvoiceStatus] {
        match self {
            InvoiceStatus::Draft => &[],
            InvoiceStatus::Processed => &[InvoiceStatus::Draft],
            InvoiceStatus::Sent => &[InvoiceStatus::Processed],
            InvoiceStatus::Paid => &[InvoiceStatus::Processed, InvoiceStatus::Sent],
            InvoiceStatus::Void => &[
                InvoiceStatus::Draft,
                InvoiceStatus::Processed,
                InvoiceStatus::Sent,
            ],
        }
    }

    pub fn can_transition_to(&self, next: InvoiceStatus) -> bool {
        next.allowed_sources().contains(self)
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invoice document. Created only by the billing engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub invoice_number: String,
    pub client_id: String,
    pub project_ids: Vec<String>,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub service_date_from: Option<NaiveDate>,
    #[serde(default)]
    pub service_date_to: Option<NaiveDate>,
    pub line_items: Vec<InvoiceLineItem>,
    pub subtotal: Decimal,
    /// Percent, e.g. `19` for 19 %.
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub status: InvoiceStatus,
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    pub client_snapshot: ClientInfo,
    #[serde(default = "default_template")]
    pub template_id: String,
    /// Rendered PDF. A regenerable cache, never a source of truth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf: Option<Binary>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

fn default_template() -> String {
    "default".to_string()
}

impl Entity for Invoice {
    const COLLECTION: &'static str = "invoices";
    const KIND: &'static str = "Invoice";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Invoice {
    pub fn pdf_bytes(&self) -> Option<&[u8]> {
        self.pdf.as_ref().map(|b| b.bytes.as_slice())
    }

    /// Ids of every work item referenced by a line item, first-seen order.
    pub fn work_item_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for id in self.line_items.iter().flat_map(|l| l.work_item_ids.iter()) {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }
}

/// Input for generating an invoice from unbilled work.
#[derive(Debug, Clone, Default)]
pub struct CreateInvoiceRequest {
    pub client_id: String,
    pub project_ids: Vec<String>,
    pub work_item_ids: Vec<String>,
    /// Defaults to today.
    pub issue_date: Option<NaiveDate>,
    /// Defaults to the configured payment term.
    pub due_date_days: Option<u32>,
    /// Derived from the billed work when absent.
    pub service_date_from: Option<NaiveDate>,
    pub service_date_to: Option<NaiveDate>,
    /// Defaults to the configured tax rate.
    pub tax_rate: Option<Decimal>,
    pub notes: Option<String>,
}

/// Filter parameters for listing invoices.
#[derive(Debug, Clone)]
pub struct InvoiceQuery {
    pub client_id: Option<String>,
    pub status: Option<InvoiceStatus>,
    pub skip: u64,
    pub limit: i64,
}

impl Default for InvoiceQuery {
    fn default() -> Self {
        Self {
            client_id: None,
            status: None,
            skip: 0,
            limit: 100,
        }
    }
}

/// Optional overrides for the invoice email.
#[derive(Debug, Clone, Default)]
pub struct EmailTemplateRequest {
    pub recipient_email: Option<String>,
    pub subject: Option<String>,
    pub body_template: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailContent {
    pub subject: String,
    pub body: String,
    pub recipient: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paid_and_void_are_terminal() {
        for next in [
            InvoiceStatus::Draft,
            InvoiceStatus::Processed,
            InvoiceStatus::Sent,
            InvoiceStatus::Paid,
            InvoiceStatus::Void,
        ] {
            assert!(!InvoiceStatus::Paid.can_transition_to(next));
            assert!(!InvoiceStatus::Void.can_transition_to(next));
        }
    }

    #[test]
    fn processed_can_be_sent_paid_or_voided() {
        assert!(InvoiceStatus::Processed.can_transition_to(InvoiceStatus::Sent));
        assert!(InvoiceStatus::Processed.can_transition_to(InvoiceStatus::Paid));
        assert!(InvoiceStatus::Processed.can_transition_to(InvoiceStatus::Void));
        assert!(!InvoiceStatus::Processed.can_transition_to(InvoiceStatus::Draft));
        assert!(!InvoiceStatus::Sent.can_transition_to(InvoiceStatus::Processed));
    }
}
