//! Content submission endpoints
//!
//! Every call here queues a job on eurocore and returns the submitted job
//! together with the location its status can be polled at.

use crate::EurocoreClient;
use crate::error::Result;
use r4n_core::dto::content::{EditDispatch, NewDispatch, NewRmbPost, RemoveDispatch};
use r4n_core::dto::job::Submission;

impl EurocoreClient {
    // =============================================================================
    // Dispatches
    // =============================================================================

    /// Queue publication of a new dispatch
    pub async fn create_dispatch(&self, token: &str, req: &NewDispatch) -> Result<Submission> {
        let url = self.url("/dispatch");
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(req)
            .send()
            .await?;

        self.handle_submission(response).await
    }

    /// Queue an edit of an existing dispatch
    ///
    /// # Arguments
    /// * `token` - Bearer token of the submitting user
    /// * `dispatch_id` - The NationStates dispatch id
    /// * `req` - Replacement content
    pub async fn edit_dispatch(
        &self,
        token: &str,
        dispatch_id: u64,
        req: &EditDispatch,
    ) -> Result<Submission> {
        let url = self.url(&format!("/dispatch/{}", dispatch_id));
        let response = self
            .client
            .put(&url)
            .bearer_auth(token)
            .json(req)
            .send()
            .await?;

        self.handle_submission(response).await
    }

    /// Queue removal of an existing dispatch
    pub async fn remove_dispatch(
        &self,
        token: &str,
        dispatch_id: u64,
        req: &RemoveDispatch,
    ) -> Result<Submission> {
        let url = self.url(&format!("/dispatch/{}", dispatch_id));
        let response = self
            .client
            .delete(&url)
            .bearer_auth(token)
            .json(req)
            .send()
            .await?;

        self.handle_submission(response).await
    }

    // =============================================================================
    // RMB Posts
    // =============================================================================

    /// Queue a post on a regional message board
    pub async fn create_rmbpost(&self, token: &str, req: &NewRmbPost) -> Result<Submission> {
        let url = self.url("/rmbpost");
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(req)
            .send()
            .await?;

        self.handle_submission(response).await
    }
}
