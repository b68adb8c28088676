//! The billing engine: number allocation, selection of billable work,
//! line item compilation and the invoice commit.

pub mod compiler;
mod coordinator;
pub mod eligibility;
mod events;
mod pdf;
pub mod sequence;

pub use compiler::{compile, round_money, CompiledInvoice};
pub use coordinator::BillingEngine;
pub use eligibility::{EligibilitySelector, Selection};
pub use events::EventLog;
pub use pdf::PdfCache;
pub use sequence::{format_invoice_number, SequenceAllocator};
