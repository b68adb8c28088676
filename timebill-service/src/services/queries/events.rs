use crate::models::EventQuery;
use crate::services::store::Filter;

/// Dates are stored as `YYYY-MM-DD` strings, so string bounds order them.
pub fn timeline(user_id: &str, query: &EventQuery) -> Filter {
    let mut filter = Filter::and(vec![Filter::eq("user_id", user_id)]);
    if let Some(from) = query.date_from {
        filter = filter.with(Filter::gte("relevant_date", from.to_string()));
    }
    if let Some(to) = query.date_to {
        filter = filter.with(Filter::lte("relevant_date", to.to_string()));
    }
    if let Some(event_type) = query.event_type {
        filter = filter.with(Filter::eq("event_type", event_type.as_str()));
    }
    filter
}
