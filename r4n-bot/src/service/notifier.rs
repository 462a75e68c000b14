//! Notification boundary
//!
//! The bot hands rendered job views to a [`Notifier`], which owns the
//! delivery details: sending a first view, editing it in place as the job
//! progresses, and mentioning the owner once the job finishes.

use async_trait::async_trait;
use r4n_core::domain::job::{Job, NotificationHandle};
use r4n_core::domain::view::{FieldValue, JobView};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Errors raised while delivering a notification
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("notification rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("notification timed out after {0:?}")]
    TimedOut(Duration),
}

/// Delivers job views to users
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Establishes the connection notifications are delivered over
    ///
    /// The poller does not start until this has succeeded.
    async fn connect(&self) -> Result<(), NotifyError> {
        Ok(())
    }

    /// Sends the first view of a job and returns a handle to it
    async fn render_initial(&self, job: &Job) -> Result<NotificationHandle, NotifyError>;

    /// Replaces a previously sent view with the job's current state
    async fn render_update(&self, job: &Job, handle: &NotificationHandle)
    -> Result<(), NotifyError>;

    /// Mentions the job's owner
    async fn notify_mention(&self, job: &Job) -> Result<(), NotifyError>;
}

/// Notifier that only writes views to the log
///
/// Used when no webhook is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn render_initial(&self, job: &Job) -> Result<NotificationHandle, NotifyError> {
        info!("{}", summarize(&job.render()));
        Ok(NotificationHandle::new(job.key()))
    }

    async fn render_update(
        &self,
        job: &Job,
        handle: &NotificationHandle,
    ) -> Result<(), NotifyError> {
        info!("[{}] {}", handle, summarize(&job.render()));
        Ok(())
    }

    async fn notify_mention(&self, job: &Job) -> Result<(), NotifyError> {
        info!(
            "@{} ({}): {} finished with status {}",
            job.owner().name,
            job.owner().id,
            job.key(),
            job.status()
        );
        Ok(())
    }
}

/// One-line plain text rendering of a view
pub fn summarize(view: &JobView) -> String {
    let fields: Vec<String> = view
        .fields
        .iter()
        .map(|field| {
            let value = match &field.value {
                FieldValue::Text(text) | FieldValue::Link(text) | FieldValue::Code(text) => {
                    text.clone()
                }
                FieldValue::Timestamp { at, .. } => at.to_rfc3339(),
            };
            format!("{}={}", field.name, value)
        })
        .collect();

    format!("{} | {} | {}", view.title, fields.join(", "), view.footer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use r4n_core::domain::job::{JobPayload, JobStatus, NewJob, UserRef};

    fn rmb_job() -> Job {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        Job::new(NewJob {
            job_id: 9,
            payload: JobPayload::rmb_post(),
            owner: UserRef::new(1, "testlandia"),
            location: "/queue/rmbpost/9".to_string(),
            created_at: at,
            modified_at: at,
            status: JobStatus::Queued,
            error: None,
            ping_on_completion: true,
        })
    }

    #[test]
    fn test_summarize() {
        let summary = summarize(&rmb_job().render());
        assert!(summary.starts_with("RMBPost 9: Queued | Status=queued"));
        assert!(summary.contains("Job Created=2024-05-01T12:00:00+00:00"));
        assert!(summary.ends_with("| Initiated by testlandia"));
    }

    #[tokio::test]
    async fn test_log_notifier_uses_job_key_as_handle() {
        let job = rmb_job();
        let handle = LogNotifier.render_initial(&job).await.unwrap();
        assert_eq!(handle.as_str(), "rmbpost-9");
        assert!(LogNotifier.render_update(&job, &handle).await.is_ok());
        assert!(LogNotifier.notify_mention(&job).await.is_ok());
    }
}
