//! Submission service
//!
//! Queues content jobs on eurocore for a logged-in user and hands the
//! resulting jobs to the poller:
//! - Submits with the user's cached token, refreshing it once on a 401
//! - Renders the initial job view and keeps its notification handle
//! - Registers the job so the poller can track it to completion

use r4n_client::{ClientError, EurocoreClient};
use r4n_core::domain::job::{DispatchAction, Job, JobPayload, UserRef};
use r4n_core::dto::content::{EditDispatch, NewDispatch, NewRmbPost, RemoveDispatch};
use r4n_core::dto::job::Submission;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::service::notifier::Notifier;
use crate::service::registry::JobRegistry;
use crate::service::sessions::{SessionError, UserSessions};

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("eurocore rejected the submission: {0}")]
    Client(#[from] ClientError),
}

/// Service that submits content jobs and starts tracking them
pub struct SubmissionService {
    client: Arc<EurocoreClient>,
    sessions: Arc<UserSessions>,
    registry: JobRegistry,
    notifier: Arc<dyn Notifier>,
}

impl SubmissionService {
    pub fn new(
        client: Arc<EurocoreClient>,
        sessions: Arc<UserSessions>,
        registry: JobRegistry,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            client,
            sessions,
            registry,
            notifier,
        }
    }

    /// Queues publication of a new dispatch
    pub async fn add_dispatch(
        &self,
        user_id: u64,
        req: NewDispatch,
        ping_on_completion: bool,
    ) -> Result<Job, SubmitError> {
        let client = &self.client;
        let req = &req;
        self.submit(
            user_id,
            JobPayload::dispatch(DispatchAction::Add),
            ping_on_completion,
            move |token| async move { client.create_dispatch(&token, req).await },
        )
        .await
    }

    /// Queues an edit of an existing dispatch
    pub async fn edit_dispatch(
        &self,
        user_id: u64,
        dispatch_id: u64,
        req: EditDispatch,
        ping_on_completion: bool,
    ) -> Result<Job, SubmitError> {
        let client = &self.client;
        let req = &req;
        self.submit(
            user_id,
            JobPayload::dispatch(DispatchAction::Edit),
            ping_on_completion,
            move |token| async move { client.edit_dispatch(&token, dispatch_id, req).await },
        )
        .await
    }

    /// Queues removal of an existing dispatch
    pub async fn remove_dispatch(
        &self,
        user_id: u64,
        dispatch_id: u64,
        req: RemoveDispatch,
        ping_on_completion: bool,
    ) -> Result<Job, SubmitError> {
        let client = &self.client;
        let req = &req;
        self.submit(
            user_id,
            JobPayload::dispatch(DispatchAction::Remove),
            ping_on_completion,
            move |token| async move { client.remove_dispatch(&token, dispatch_id, req).await },
        )
        .await
    }

    /// Queues a post on a regional message board
    pub async fn post_rmb(
        &self,
        user_id: u64,
        req: NewRmbPost,
        ping_on_completion: bool,
    ) -> Result<Job, SubmitError> {
        let client = &self.client;
        let req = &req;
        self.submit(
            user_id,
            JobPayload::rmb_post(),
            ping_on_completion,
            move |token| async move { client.create_rmbpost(&token, req).await },
        )
        .await
    }

    /// Sends a submission with the user's token, retrying once with a
    /// refreshed token if eurocore rejects the cached one
    async fn submit<F, Fut>(
        &self,
        user_id: u64,
        payload: JobPayload,
        ping_on_completion: bool,
        send: F,
    ) -> Result<Job, SubmitError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<Submission, ClientError>>,
    {
        let (owner, token) = self.sessions.credentials(user_id)?;

        let submission = match send(token).await {
            Err(e) if e.is_unauthorized() => {
                warn!("Token for {} rejected, logging in again", owner.name);
                let token = self.sessions.refresh(user_id).await?;
                send(token).await?
            }
            result => result?,
        };

        Ok(self.track(submission, payload, owner, ping_on_completion).await)
    }

    /// Renders the initial view and registers the job with the poller
    async fn track(
        &self,
        submission: Submission,
        payload: JobPayload,
        owner: UserRef,
        ping_on_completion: bool,
    ) -> Job {
        let mut job = Job::new(submission.into_new_job(payload, owner, ping_on_completion));
        info!("Submitted {} for {}", job, job.owner().name);

        match self.notifier.render_initial(&job).await {
            Ok(handle) => {
                job.set_notification_handle(handle);
            }
            Err(e) => warn!("Failed to render initial view of {}: {}", job.key(), e),
        }

        if !job.is_terminal() {
            self.registry.insert(job.clone());
            return job;
        }

        // Finished before it was ever polled; nothing left to track
        if job.ping_on_completion() {
            if let Err(e) = self.notifier.notify_mention(&job).await {
                warn!("Failed to mention owner of {}: {}", job.key(), e);
            }
        }
        info!("{} finished on submission, not tracking", job);
        job
    }
}
