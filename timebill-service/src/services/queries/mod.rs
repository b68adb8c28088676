//! Entity-specific query logic, kept out of the generic repository.

pub mod events;
pub mod invoices;
pub mod work_items;
