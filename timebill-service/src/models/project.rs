//! Project model with its named hourly rates.

use crate::services::repository::Entity;
use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Project status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Active,
    OnHold,
    Completed,
    Archived,
}

/// Named hourly price. The only authority for time entry pricing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rate {
    pub name: String,
    pub price_per_hour: Decimal,
}

impl Rate {
    pub fn new(name: impl Into<String>, price_per_hour: Decimal) -> Self {
        Self {
            name: name.into(),
            price_per_hour,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub client_id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default)]
    pub rates: Vec<Rate>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Entity for Project {
    const COLLECTION: &'static str = "projects";
    const KIND: &'static str = "Project";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Project {
    pub fn new(user_id: &str, input: NewProject) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: input.name,
            client_id: input.client_id,
            description: input.description,
            status: input.status,
            rates: input.rates,
            created_at: now,
            updated_at: now,
        }
    }

    /// Resolve a rate by its exact name.
    pub fn rate(&self, name: &str) -> Option<&Rate> {
        self.rates.iter().find(|r| r.name == name)
    }
}

/// Input for creating a project.
#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub name: String,
    pub client_id: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub rates: Vec<Rate>,
}
