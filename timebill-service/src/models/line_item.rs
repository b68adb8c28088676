//! Line item model for invoices.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One invoice row, derived from one time entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLineItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
    /// Work items this row was compiled from.
    pub work_item_ids: Vec<String>,
}
