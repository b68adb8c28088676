use super::Catalog;
use crate::error::BillingError;
use crate::models::{Client, ClientUpdate, Event, EventType, NewClient};
use chrono::Utc;
use tracing::{info, instrument};

impl Catalog {
    #[instrument(skip(self, input))]
    pub async fn create_client(&self, user_id: &str, input: NewClient) -> Result<Client, BillingError> {
        if input.name.trim().is_empty() {
            return Err(BillingError::Validation("client name is required".to_string()));
        }

        let client = Client::new(user_id, input);
        self.clients.insert(&client).await?;
        info!(client_id = %client.id, "Client created");

        self.events
            .record(
                Event::new(
                    EventType::ClientCreated,
                    user_id,
                    Utc::now().date_naive(),
                    format!("Client {} created.", client.name),
                )
                .related_to("Client", &client.id),
            )
            .await;

        Ok(client)
    }

    pub async fn get_client(&self, user_id: &str, client_id: &str) -> Result<Client, BillingError> {
        self.clients.require_owned(user_id, client_id).await
    }

    /// Edits reach only the client record; invoice snapshots keep the
    /// values they were created with.
    #[instrument(skip(self, update))]
    pub async fn update_client(
        &self,
        user_id: &str,
        client_id: &str,
        update: ClientUpdate,
    ) -> Result<Client, BillingError> {
        let mut client = self.clients.require_owned(user_id, client_id).await?;
        client.apply(update);
        if client.name.trim().is_empty() {
            return Err(BillingError::Validation("client name is required".to_string()));
        }

        if !self.clients.replace_owned(user_id, &client).await? {
            return Err(BillingError::not_found("Client", client_id));
        }
        info!(client_id = %client.id, "Client updated");
        Ok(client)
    }
}
