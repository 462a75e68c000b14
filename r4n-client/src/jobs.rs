//! Job status endpoint

use crate::EurocoreClient;
use crate::error::Result;
use r4n_core::dto::job::JobStatusPayload;

impl EurocoreClient {
    /// Look up the current status of a queued job
    ///
    /// # Arguments
    /// * `location` - The path returned in the submission's `Location` header
    pub async fn job_status(&self, location: &str) -> Result<JobStatusPayload> {
        let url = self.url(location);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }
}
