//! Work item model: a logged unit of work with embedded time entries.

use crate::services::repository::Entity;
use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Work item status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemStatus {
    #[default]
    Created,
    Active,
    Disabled,
    Canceled,
    Processed,
    Sent,
}

impl WorkItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkItemStatus::Created => "created",
            WorkItemStatus::Active => "active",
            WorkItemStatus::Disabled => "disabled",
            WorkItemStatus::Canceled => "canceled",
            WorkItemStatus::Processed => "processed",
            WorkItemStatus::Sent => "sent",
        }
    }
}

/// Hours worked at a named rate.
///
/// `price_per_hour` and `amount` are filled in server-side from the
/// project's rate table when the parent work item is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub description: String,
    pub rate_name: String,
    pub duration: Decimal,
    pub price_per_hour: Decimal,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub project_id: String,
    #[serde(default)]
    pub status: WorkItemStatus,
    /// Invoice that billed this item; `None` while unbilled.
    #[serde(default)]
    pub invoice_id: Option<String>,
    #[serde(default)]
    pub time_entries: Vec<TimeEntry>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Entity for WorkItem {
    const COLLECTION: &'static str = "work_items";
    const KIND: &'static str = "WorkItem";

    fn id(&self) -> &str {
        &self.id
    }
}

impl WorkItem {
    pub fn is_billed(&self) -> bool {
        self.invoice_id.is_some()
    }

    pub fn total_amount(&self) -> Decimal {
        self.time_entries.iter().map(|e| e.amount).sum()
    }
}

/// Input for logging work. Prices are never taken from the caller.
#[derive(Debug, Clone, Default)]
pub struct NewWorkItem {
    pub project_id: String,
    pub name: String,
    pub description: Option<String>,
    pub time_entries: Vec<NewTimeEntry>,
}

#[derive(Debug, Clone)]
pub struct NewTimeEntry {
    pub description: String,
    pub rate_name: String,
    pub duration: Decimal,
}

impl NewTimeEntry {
    pub fn new(description: impl Into<String>, rate_name: impl Into<String>, duration: Decimal) -> Self {
        Self {
            description: description.into(),
            rate_name: rate_name.into(),
            duration,
        }
    }
}

/// Work item joined with its project. Project fields are `None` when the
/// project no longer exists.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItemView {
    pub work_item: WorkItem,
    pub project_name: Option<String>,
    pub client_id: Option<String>,
}

/// Filter parameters for listing work items.
#[derive(Debug, Clone)]
pub struct WorkItemQuery {
    pub project_id: Option<String>,
    /// `Some(true)` billed only, `Some(false)` unbilled only.
    pub billed: Option<bool>,
    pub skip: u64,
    pub limit: i64,
}

impl Default for WorkItemQuery {
    fn default() -> Self {
        Self {
            project_id: None,
            billed: None,
            skip: 0,
            limit: 100,
        }
    }
}
