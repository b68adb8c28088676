//! Client model and the snapshot embedded into invoices.

use crate::services::repository::Entity;
use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

/// A customer of the freelancer, owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address_street: Option<String>,
    #[serde(default)]
    pub address_zip: Option<String>,
    #[serde(default)]
    pub address_city: Option<String>,
    #[serde(default)]
    pub address_country: Option<String>,
    #[serde(default)]
    pub vat_id: Option<String>,
    #[serde(default)]
    pub contact_person: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Entity for Client {
    const COLLECTION: &'static str = "clients";
    const KIND: &'static str = "Client";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Client {
    pub fn new(user_id: &str, input: NewClient) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: input.name,
            email: input.email,
            address_street: input.address_street,
            address_zip: input.address_zip,
            address_city: input.address_city,
            address_country: input.address_country,
            vat_id: input.vat_id,
            contact_person: input.contact_person,
            phone: input.phone,
            notes: input.notes,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite every field present in `update`.
    pub fn apply(&mut self, update: ClientUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if update.email.is_some() {
            self.email = update.email;
        }
        if update.address_street.is_some() {
            self.address_street = update.address_street;
        }
        if update.address_zip.is_some() {
            self.address_zip = update.address_zip;
        }
        if update.address_city.is_some() {
            self.address_city = update.address_city;
        }
        if update.address_country.is_some() {
            self.address_country = update.address_country;
        }
        if update.vat_id.is_some() {
            self.vat_id = update.vat_id;
        }
        if update.contact_person.is_some() {
            self.contact_person = update.contact_person;
        }
        if update.phone.is_some() {
            self.phone = update.phone;
        }
        if update.notes.is_some() {
            self.notes = update.notes;
        }
        self.updated_at = Utc::now();
    }
}

/// Input for creating a client.
#[derive(Debug, Clone, Default)]
pub struct NewClient {
    pub name: String,
    pub email: Option<String>,
    pub address_street: Option<String>,
    pub address_zip: Option<String>,
    pub address_city: Option<String>,
    pub address_country: Option<String>,
    pub vat_id: Option<String>,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

/// Partial client update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ClientUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub address_street: Option<String>,
    pub address_zip: Option<String>,
    pub address_city: Option<String>,
    pub address_country: Option<String>,
    pub vat_id: Option<String>,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

/// Copy of the billing-relevant client fields, frozen when an invoice is
/// created. Later client edits never reach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address_street: Option<String>,
    #[serde(default)]
    pub address_zip: Option<String>,
    #[serde(default)]
    pub address_city: Option<String>,
    #[serde(default)]
    pub address_country: Option<String>,
    #[serde(default)]
    pub vat_id: Option<String>,
}

impl From<&Client> for ClientInfo {
    fn from(client: &Client) -> Self {
        Self {
            id: client.id.clone(),
            name: client.name.clone(),
            email: client.email.clone(),
            address_street: client.address_street.clone(),
            address_zip: client.address_zip.clone(),
            address_city: client.address_city.clone(),
            address_country: client.address_country.clone(),
            vat_id: client.vat_id.clone(),
        }
    }
}
