use super::Catalog;
use crate::error::BillingError;
use crate::models::{Event, EventType, NewProject, Project};
use chrono::Utc;
use tracing::{info, instrument};

impl Catalog {
    /// The client must belong to the caller. Rate names are unique within a
    /// project and prices positive.
    #[instrument(skip(self, input), fields(client_id = %input.client_id))]
    pub async fn create_project(&self, user_id: &str, input: NewProject) -> Result<Project, BillingError> {
        if input.name.trim().is_empty() {
            return Err(BillingError::Validation("project name is required".to_string()));
        }
        for (i, rate) in input.rates.iter().enumerate() {
            if rate.name.trim().is_empty() {
                return Err(BillingError::Validation("rate name is required".to_string()));
            }
            if rate.price_per_hour <= rust_decimal::Decimal::ZERO {
                return Err(BillingError::Validation(format!(
                    "rate '{}' must have a positive price",
                    rate.name
                )));
            }
            if input.rates[..i].iter().any(|r| r.name == rate.name) {
                return Err(BillingError::Validation(format!(
                    "rate '{}' is defined twice",
                    rate.name
                )));
            }
        }

        let client = self.clients.require_owned(user_id, &input.client_id).await?;

        let project = Project::new(user_id, input);
        self.projects.insert(&project).await?;
        info!(project_id = %project.id, rates = project.rates.len(), "Project created");

        self.events
            .record(
                Event::new(
                    EventType::ProjectCreated,
                    user_id,
                    Utc::now().date_naive(),
                    format!("Project {} created for client {}.", project.name, client.name),
                )
                .related_to("Project", &project.id),
            )
            .await;

        Ok(project)
    }

    pub async fn get_project(&self, user_id: &str, project_id: &str) -> Result<Project, BillingError> {
        self.projects.require_owned(user_id, project_id).await
    }

    /// Work items keep pointing at a deleted project; listings show them
    /// without project details.
    pub async fn delete_project(&self, user_id: &str, project_id: &str) -> Result<(), BillingError> {
        if !self.projects.delete_owned(user_id, project_id).await? {
            return Err(BillingError::not_found("Project", project_id));
        }
        info!(project_id = %project_id, "Project deleted");
        Ok(())
    }
}
