use crate::errors::{ApiError, RegistrationError};
use crate::remote::MarketingApi;
use crate::types::ContactId;
use std::sync::Arc;

/// Finds the contact for an email, creating it when it does not exist yet.
#[derive(Clone)]
pub struct ContactResolver {
    api: Arc<dyn MarketingApi>,
}

impl ContactResolver {
    pub fn new(api: Arc<dyn MarketingApi>) -> Self {
        ContactResolver { api }
    }

    pub async fn resolve(&self, name: &str, email: &str) -> Result<ContactId, RegistrationError> {
        // A failed lookup is not fatal on its own: create decides.
        match self.api.search_contact(email).await {
            Ok(Some(id)) => {
                tracing::info!(email, contact_id = %id, "contact already registered");
                return Ok(id);
            }
            Ok(None) => {}
            Err(ApiError::Configuration) => return Err(RegistrationError::Configuration),
            Err(err) => {
                tracing::warn!(email, "contact search failed, trying to create: {err}");
            }
        }

        match self.api.create_contact(name, email).await {
            Ok(id) => {
                tracing::info!(email, contact_id = %id, "contact created");
                Ok(id)
            }
            Err(ApiError::DuplicateContact) => {
                // Created elsewhere between our search and create
                tracing::info!(email, "contact already exists, searching again");
                match self.api.search_contact(email).await? {
                    Some(id) => Ok(id),
                    None => Err(RegistrationError::ContactNotFoundAfterDuplicate),
                }
            }
            Err(err) => {
                tracing::error!(email, "could not create contact: {err}");
                Err(err.into())
            }
        }
    }
}
