//! Job DTOs returned by the eurocore API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::job::{
    DispatchAction, JobKind, JobPayload, JobStatus, JobUpdate, NewJob, UserRef,
};

/// Timestamp codec for eurocore's `2024-05-01T12:00:00.123456Z` format
pub mod eurocore_time {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

    pub fn parse(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        NaiveDateTime::parse_from_str(value, FORMAT).map(|naive| naive.and_utc())
    }

    pub fn format(value: &DateTime<Utc>) -> String {
        value.format(FORMAT).to_string()
    }

    pub fn serialize<S: Serializer>(
        value: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Body of `GET <location>` for a queued job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusPayload {
    pub status: JobStatus,
    #[serde(with = "eurocore_time")]
    pub modified_at: DateTime<Utc>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub dispatch_id: Option<u64>,
    #[serde(default)]
    pub rmbpost_id: Option<u64>,
}

impl JobStatusPayload {
    /// Maps the payload onto the fields a job of `kind` tracks
    pub fn into_update(self, kind: JobKind) -> JobUpdate {
        let remote_id = match kind {
            JobKind::Dispatch => self.dispatch_id,
            JobKind::RmbPost => self.rmbpost_id,
        };

        JobUpdate {
            status: self.status,
            modified_at: self.modified_at,
            error: self.error,
            remote_id,
        }
    }
}

/// Body returned when a job is submitted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedJob {
    pub id: u64,
    #[serde(default)]
    pub action: Option<DispatchAction>,
    pub status: JobStatus,
    #[serde(with = "eurocore_time")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "eurocore_time")]
    pub modified_at: DateTime<Utc>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub dispatch_id: Option<u64>,
    #[serde(default)]
    pub rmbpost_id: Option<u64>,
}

/// A submitted job together with the path it is polled at
#[derive(Debug, Clone)]
pub struct Submission {
    pub job: SubmittedJob,
    /// Value of the response's `Location` header
    pub location: String,
}

impl Submission {
    /// Builds the tracked job for this submission
    ///
    /// `payload` selects the job kind; the dispatch action reported by
    /// eurocore wins over the requested one.
    pub fn into_new_job(
        self,
        mut payload: JobPayload,
        owner: UserRef,
        ping_on_completion: bool,
    ) -> NewJob {
        let remote_id = match payload.kind() {
            JobKind::Dispatch => self.job.dispatch_id,
            JobKind::RmbPost => self.job.rmbpost_id,
        };
        payload.set_remote_id(remote_id);

        if let (JobPayload::Dispatch { action, .. }, Some(reported)) =
            (&mut payload, self.job.action)
        {
            *action = reported;
        }

        NewJob {
            job_id: self.job.id,
            payload,
            owner,
            location: self.location,
            created_at: self.job.created_at,
            modified_at: self.job.modified_at,
            status: self.job.status,
            error: self.job.error,
            ping_on_completion,
        }
    }
}
