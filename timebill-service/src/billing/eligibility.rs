//! Selection of the work items a request may bill.

use crate::error::BillingError;
use crate::models::{Client, WorkItem};
use crate::services::metrics::PARTIAL_SELECTIONS_TOTAL;
use crate::services::queries::work_items;
use crate::services::repository::Repository;
use crate::services::store::FindOptions;
use tracing::{instrument, warn};

/// Outcome of a selection. `missing_ids` lists requested ids that were not
/// found, belong to someone else, sit in another project or are already
/// billed; a non-empty list is a partial selection.
#[derive(Debug, Clone)]
pub struct Selection {
    pub client: Client,
    pub work_items: Vec<WorkItem>,
    pub missing_ids: Vec<String>,
}

impl Selection {
    pub fn is_partial(&self) -> bool {
        !self.missing_ids.is_empty()
    }
}

#[derive(Clone)]
pub struct EligibilitySelector {
    clients: Repository<Client>,
    work_items: Repository<WorkItem>,
}

impl EligibilitySelector {
    pub fn new(clients: Repository<Client>, work_items: Repository<WorkItem>) -> Self {
        Self {
            clients,
            work_items,
        }
    }

    #[instrument(skip(self, project_ids, requested_ids), fields(requested = requested_ids.len()))]
    pub async fn select_billable_entries(
        &self,
        user_id: &str,
        client_id: &str,
        project_ids: &[String],
        requested_ids: &[String],
    ) -> Result<Selection, BillingError> {
        let client = self.clients.require_owned(user_id, client_id).await?;

        let mut requested: Vec<String> = Vec::with_capacity(requested_ids.len());
        for id in requested_ids {
            if !requested.contains(id) {
                requested.push(id.clone());
            }
        }
        if requested.is_empty() || project_ids.is_empty() {
            return Err(BillingError::NoBillableItems);
        }

        let mut found = self
            .work_items
            .find(
                &work_items::billable(user_id, &requested, project_ids),
                &FindOptions::default(),
            )
            .await?;

        if found.is_empty() {
            return Err(BillingError::NoBillableItems);
        }

        // Bill in the order the caller listed the items.
        found.sort_by_key(|w| requested.iter().position(|id| *id == w.id));

        let missing_ids: Vec<String> = requested
            .into_iter()
            .filter(|id| !found.iter().any(|w| w.id == *id))
            .collect();

        if !missing_ids.is_empty() {
            PARTIAL_SELECTIONS_TOTAL.inc();
            warn!(
                client_id = %client_id,
                selected = found.len(),
                missing = ?missing_ids,
                "Some requested work items are not billable, proceeding with the rest"
            );
        }

        Ok(Selection {
            client,
            work_items: found,
            missing_ids,
        })
    }
}
