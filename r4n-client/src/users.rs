//! User authentication endpoints

use crate::EurocoreClient;
use crate::error::Result;
use r4n_core::dto::user::{Credentials, TokenResponse};

impl EurocoreClient {
    /// Log in an existing eurocore user
    ///
    /// # Returns
    /// The bearer token for subsequent submissions
    pub async fn login(&self, credentials: &Credentials) -> Result<String> {
        let url = self.url("/login");
        let response = self.client.post(&url).json(credentials).send().await?;

        let body: TokenResponse = self.handle_response(response).await?;
        Ok(body.token)
    }

    /// Register a new eurocore user
    ///
    /// # Returns
    /// The bearer token for subsequent submissions
    pub async fn register(&self, credentials: &Credentials) -> Result<String> {
        let url = self.url("/register");
        let response = self.client.post(&url).json(credentials).send().await?;

        let body: TokenResponse = self.handle_response(response).await?;
        Ok(body.token)
    }
}
