//! Append-only audit events.

use crate::services::repository::Entity;
use chrono::{DateTime, NaiveDate, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "work_item.created")]
    WorkItemCreated,
    #[serde(rename = "invoice.created")]
    InvoiceCreated,
    #[serde(rename = "invoice.status.updated")]
    InvoiceStatusUpdated,
    #[serde(rename = "invoice.pdf.generated")]
    InvoicePdfGenerated,
    #[serde(rename = "client.created")]
    ClientCreated,
    #[serde(rename = "project.created")]
    ProjectCreated,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::WorkItemCreated => "work_item.created",
            EventType::InvoiceCreated => "invoice.created",
            EventType::InvoiceStatusUpdated => "invoice.status.updated",
            EventType::InvoicePdfGenerated => "invoice.pdf.generated",
            EventType::ClientCreated => "client.created",
            EventType::ProjectCreated => "project.created",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "_id")]
    pub id: String,
    pub event_type: EventType,
    pub user_id: String,
    /// Date the event is shown under on timelines and calendars.
    pub relevant_date: NaiveDate,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub related_entity_id: Option<String>,
    #[serde(default)]
    pub related_entity_type: Option<String>,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub timestamp: DateTime<Utc>,
}

impl Entity for Event {
    const COLLECTION: &'static str = "events";
    const KIND: &'static str = "Event";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Event {
    pub fn new(
        event_type: EventType,
        user_id: &str,
        relevant_date: NaiveDate,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_type,
            user_id: user_id.to_string(),
            relevant_date,
            description: Some(description.into()),
            related_entity_id: None,
            related_entity_type: None,
            details: None,
            timestamp: Utc::now(),
        }
    }

    pub fn related_to(mut self, entity_type: &str, entity_id: &str) -> Self {
        self.related_entity_type = Some(entity_type.to_string());
        self.related_entity_id = Some(entity_id.to_string());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Timeline filter: inclusive `relevant_date` range and an optional type.
#[derive(Debug, Clone)]
pub struct EventQuery {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub event_type: Option<EventType>,
    pub skip: u64,
    pub limit: i64,
}

impl Default for EventQuery {
    fn default() -> Self {
        Self {
            date_from: None,
            date_to: None,
            event_type: None,
            skip: 0,
            limit: 100,
        }
    }
}
