//! Year-scoped invoice numbering.

use crate::error::BillingError;
use crate::services::store::DocumentStore;
use std::sync::Arc;
use tracing::{error, info, instrument};

pub const COUNTER_COLLECTION: &str = "counters";
const SEQUENCE_FIELD: &str = "sequence_value";

/// Hands out invoice numbers from one counter document per year. Each call
/// is a single atomic increment-and-read in the store; there is no
/// in-process state, so any number of engines may share a database.
#[derive(Clone)]
pub struct SequenceAllocator {
    store: Arc<dyn DocumentStore>,
}

impl SequenceAllocator {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn counter_id(year: i32) -> String {
        format!("invoice_number_{year}")
    }

    #[instrument(skip(self))]
    pub async fn next_invoice_number(&self, year: i32, prefix: &str) -> Result<String, BillingError> {
        let sequence = self
            .store
            .find_one_and_increment(COUNTER_COLLECTION, &Self::counter_id(year), SEQUENCE_FIELD)
            .await
            .map_err(|e| {
                error!(year = year, error = %e, "Invoice counter increment failed");
                BillingError::AllocationFailure(e.to_string())
            })?;

        let number = format_invoice_number(prefix, year, sequence);
        info!(invoice_number = %number, "Allocated invoice number");
        Ok(number)
    }
}

/// `{prefix}{year}-{sequence:04}`, e.g. `RE-2024-0001`. Sequences beyond
/// 9999 simply get wider.
pub fn format_invoice_number(prefix: &str, year: i32, sequence: i64) -> String {
    format!("{prefix}{year}-{sequence:04}")
}
