use crate::models::{InvoiceQuery, InvoiceStatus};
use crate::services::store::Filter;
use mongodb::bson::Bson;

pub fn listing(user_id: &str, query: &InvoiceQuery) -> Filter {
    let mut filter = Filter::and(vec![Filter::eq("user_id", user_id)]);
    if let Some(client_id) = &query.client_id {
        filter = filter.with(Filter::eq("client_id", client_id.as_str()));
    }
    if let Some(status) = query.status {
        filter = filter.with(Filter::eq("status", status.as_str()));
    }
    filter
}

/// Matches the invoice only while it is in a status that may move to `target`.
pub fn transition(user_id: &str, invoice_id: &str, target: InvoiceStatus) -> Filter {
    let sources: Vec<Bson> = target
        .allowed_sources()
        .iter()
        .map(|s| Bson::String(s.as_str().to_string()))
        .collect();
    Filter::owned(user_id, invoice_id).with(Filter::is_in("status", sources))
}

/// Matches the invoice only while no PDF is stored on it.
pub fn without_pdf(user_id: &str, invoice_id: &str) -> Filter {
    Filter::owned(user_id, invoice_id).with(Filter::is_null("pdf"))
}
