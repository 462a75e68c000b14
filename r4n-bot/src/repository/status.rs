//! Job status repository
//!
//! Performs a single status lookup for a tracked job and maps the eurocore
//! payload into a [`JobUpdate`].

use async_trait::async_trait;
use r4n_client::{ClientError, EurocoreClient};
use r4n_core::domain::job::{Job, JobUpdate};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Why a status lookup failed
#[derive(Debug, Error)]
pub enum FetchCause {
    /// Network error or non-2xx response
    #[error(transparent)]
    Request(ClientError),

    /// The body was missing a required field or carried a bad timestamp
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

impl From<ClientError> for FetchCause {
    fn from(err: ClientError) -> Self {
        if err.is_malformed() {
            FetchCause::MalformedResponse(err.to_string())
        } else {
            FetchCause::Request(err)
        }
    }
}

/// A status lookup that did not produce an update
///
/// Always transient: the job keeps its state and is retried next cycle.
#[derive(Debug, Error)]
#[error("failed to fetch status of {key}: {cause}")]
pub struct FetchFailed {
    pub key: String,
    pub cause: FetchCause,
}

impl FetchFailed {
    pub fn new(job: &Job, cause: impl Into<FetchCause>) -> Self {
        Self {
            key: job.key().to_string(),
            cause: cause.into(),
        }
    }
}

/// Repository trait for job status lookups
#[async_trait]
pub trait StatusFetcher: Send + Sync {
    /// Fetches the current state of `job` from its remote location
    ///
    /// Never touches the job itself; callers apply the returned update.
    async fn fetch(&self, job: &Job) -> Result<JobUpdate, FetchFailed>;
}

/// HTTP implementation of StatusFetcher
pub struct HttpStatusFetcher {
    client: Arc<EurocoreClient>,
}

impl HttpStatusFetcher {
    /// Creates a new HTTP status fetcher
    pub fn new(client: Arc<EurocoreClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StatusFetcher for HttpStatusFetcher {
    async fn fetch(&self, job: &Job) -> Result<JobUpdate, FetchFailed> {
        let payload = self
            .client
            .job_status(job.location())
            .await
            .map_err(|e| FetchFailed::new(job, e))?;

        Ok(payload.into_update(job.kind()))
    }
}
