use super::Catalog;
use crate::error::BillingError;
use crate::models::{
    Event, EventType, NewWorkItem, TimeEntry, WorkItem, WorkItemQuery, WorkItemStatus,
    WorkItemView,
};
use crate::services::queries::work_items;
use chrono::Utc;
use serde_json::json;
use tracing::{info, instrument};

impl Catalog {
    /// Log work against a project. Every entry is priced here from the
    /// project's current rate table; callers only name the rate.
    #[instrument(skip(self, input), fields(project_id = %input.project_id))]
    pub async fn create_work_item(
        &self,
        user_id: &str,
        input: NewWorkItem,
    ) -> Result<WorkItem, BillingError> {
        if input.name.trim().is_empty() {
            return Err(BillingError::Validation("work item name is required".to_string()));
        }

        let project = self.projects.require_owned(user_id, &input.project_id).await?;

        let mut time_entries = Vec::with_capacity(input.time_entries.len());
        for entry in input.time_entries {
            if entry.duration.is_sign_negative() {
                return Err(BillingError::Validation(format!(
                    "duration must not be negative, got {}",
                    entry.duration
                )));
            }
            let rate = project
                .rate(&entry.rate_name)
                .ok_or_else(|| BillingError::InvalidRate {
                    project_id: project.id.clone(),
                    rate_name: entry.rate_name.clone(),
                })?;

            let amount = entry
                .duration
                .checked_mul(rate.price_per_hour)
                .ok_or_else(|| {
                    BillingError::Validation(format!(
                        "{}h at {} per hour is out of range",
                        entry.duration, rate.price_per_hour
                    ))
                })?;

            time_entries.push(TimeEntry {
                description: entry.description,
                rate_name: entry.rate_name,
                duration: entry.duration,
                price_per_hour: rate.price_per_hour,
                amount,
            });
        }

        let total = time_entries
            .iter()
            .try_fold(rust_decimal::Decimal::ZERO, |total, e| total.checked_add(e.amount))
            .ok_or_else(|| {
                BillingError::Validation("work item total is out of range".to_string())
            })?;

        let now = Utc::now();
        let work_item = WorkItem {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: input.name,
            description: input.description,
            project_id: project.id.clone(),
            status: WorkItemStatus::Created,
            invoice_id: None,
            time_entries,
            created_at: now,
            updated_at: now,
        };

        self.work_items.insert(&work_item).await?;
        info!(
            work_item_id = %work_item.id,
            entries = work_item.time_entries.len(),
            "Work item created"
        );

        self.events
            .record(
                Event::new(
                    EventType::WorkItemCreated,
                    user_id,
                    now.date_naive(),
                    format!("Work item {} logged on project {}.", work_item.name, project.name),
                )
                .related_to("WorkItem", &work_item.id)
                .with_details(json!({
                    "project_id": project.id,
                    "total_amount": total.to_string(),
                })),
            )
            .await;

        Ok(work_item)
    }

    pub async fn get_work_item(&self, user_id: &str, work_item_id: &str) -> Result<WorkItem, BillingError> {
        self.work_items.require_owned(user_id, work_item_id).await
    }

    pub async fn list_work_items(
        &self,
        user_id: &str,
        query: &WorkItemQuery,
    ) -> Result<Vec<WorkItemView>, BillingError> {
        work_items::list_with_projects(&self.work_items, &self.projects, user_id, query).await
    }
}
