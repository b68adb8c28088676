use crate::error::BillingError;
use crate::models::{Event, EventQuery};
use crate::services::queries::events;
use crate::services::repository::Repository;
use crate::services::store::{FindOptions, SortOrder};
use tracing::warn;

const MAX_PAGE: i64 = 500;

/// Append-only audit trail. Recording is best effort: an event that cannot
/// be written is logged and dropped, never failing the operation it
/// describes.
#[derive(Clone)]
pub struct EventLog {
    events: Repository<Event>,
}

impl EventLog {
    pub fn new(events: Repository<Event>) -> Self {
        Self { events }
    }

    pub async fn record(&self, event: Event) {
        if let Err(e) = self.events.insert(&event).await {
            warn!(
                event_type = %event.event_type,
                related_entity_id = ?event.related_entity_id,
                error = %e,
                "Failed to record audit event"
            );
        }
    }

    /// A user's timeline, most recently logged first. Page size is capped.
    pub async fn list(&self, user_id: &str, query: &EventQuery) -> Result<Vec<Event>, BillingError> {
        if let (Some(from), Some(to)) = (query.date_from, query.date_to) {
            if from > to {
                return Err(BillingError::Validation(format!(
                    "event range starts {from} after it ends {to}"
                )));
            }
        }
        let options = FindOptions::sorted("timestamp", SortOrder::Descending)
            .page(query.skip, query.limit.clamp(1, MAX_PAGE));
        self.events
            .find(&events::timeline(user_id, query), &options)
            .await
    }
}
