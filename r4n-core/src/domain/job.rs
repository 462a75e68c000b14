//! Job domain types
//!
//! A [`Job`] tracks one asynchronous operation the eurocore API performs on
//! behalf of a user (publishing a dispatch, posting to an RMB). Jobs start
//! out `queued` and move to exactly one terminal state.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use crate::domain::view::{FieldValue, JobView, TimeStyle, ViewField};

/// Captures the message that precedes the closing `</p>` in eurocore errors
static ERROR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)</p>").expect("error pattern is a valid regex"));

const DISPATCH_URL: &str = "https://www.nationstates.net/page=dispatch/id=";
const RMB_POST_URL: &str = "https://www.nationstates.net/page=rmb/postid=";

/// Job execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Success,
    Failure,
}

impl JobStatus {
    /// Whether no further transitions can happen from this status
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failure)
    }

    /// Wire name of the status
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Success => "success",
            JobStatus::Failure => "failure",
        }
    }

    /// Title-cased label used in rendered views
    pub fn title(self) -> &'static str {
        match self {
            JobStatus::Queued => "Queued",
            JobStatus::Success => "Success",
            JobStatus::Failure => "Failure",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a dispatch job does to the remote dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchAction {
    Add,
    Edit,
    Remove,
}

impl DispatchAction {
    pub fn as_str(self) -> &'static str {
        match self {
            DispatchAction::Add => "add",
            DispatchAction::Edit => "edit",
            DispatchAction::Remove => "remove",
        }
    }
}

impl fmt::Display for DispatchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of remote job; namespaces the registry key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Dispatch,
    RmbPost,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Dispatch => "dispatch",
            JobKind::RmbPost => "rmbpost",
        }
    }

    /// Registry key for a remote job of this kind
    pub fn key(self, job_id: u64) -> String {
        format!("{}-{}", self.as_str(), job_id)
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific job data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum JobPayload {
    Dispatch {
        action: DispatchAction,
        /// Assigned by eurocore once the dispatch exists
        dispatch_id: Option<u64>,
    },
    RmbPost {
        /// Assigned by eurocore once the post exists
        post_id: Option<u64>,
    },
}

impl JobPayload {
    pub fn dispatch(action: DispatchAction) -> Self {
        JobPayload::Dispatch {
            action,
            dispatch_id: None,
        }
    }

    pub fn rmb_post() -> Self {
        JobPayload::RmbPost { post_id: None }
    }

    pub fn kind(&self) -> JobKind {
        match self {
            JobPayload::Dispatch { .. } => JobKind::Dispatch,
            JobPayload::RmbPost { .. } => JobKind::RmbPost,
        }
    }

    /// Id of the remote artifact, once known
    pub fn remote_id(&self) -> Option<u64> {
        match self {
            JobPayload::Dispatch { dispatch_id, .. } => *dispatch_id,
            JobPayload::RmbPost { post_id } => *post_id,
        }
    }

    /// Records the remote artifact id. An id that is already known is never cleared.
    pub(crate) fn set_remote_id(&mut self, id: Option<u64>) {
        let Some(id) = id else { return };

        match self {
            JobPayload::Dispatch { dispatch_id, .. } => *dispatch_id = Some(id),
            JobPayload::RmbPost { post_id } => *post_id = Some(id),
        }
    }

    /// Link to the remote artifact, if one can be viewed
    pub fn artifact_url(&self) -> Option<String> {
        match self {
            JobPayload::Dispatch {
                action: DispatchAction::Remove,
                ..
            } => None,
            JobPayload::Dispatch { dispatch_id, .. } => {
                dispatch_id.map(|id| format!("{DISPATCH_URL}{id}"))
            }
            JobPayload::RmbPost { post_id } => post_id.map(|id| format!("{RMB_POST_URL}{id}")),
        }
    }
}

/// The user who initiated a job
///
/// Only identifies the user; the session and its credentials are owned elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    /// Chat platform id, used for mentions
    pub id: u64,
    /// Eurocore username
    pub name: String,
}

impl UserRef {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Opaque reference to a previously delivered status view
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationHandle(String);

impl NotificationHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Field updates produced by one successful status lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobUpdate {
    pub status: JobStatus,
    pub modified_at: DateTime<Utc>,
    /// Raw error field, before extraction
    pub error: Option<String>,
    /// Remote artifact id for the job's kind
    pub remote_id: Option<u64>,
}

/// Outcome of applying a [`JobUpdate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Status did not change
    Unchanged,
    /// The job just reached this terminal status
    Completed(JobStatus),
}

/// Everything needed to start tracking a freshly submitted job
#[derive(Debug, Clone)]
pub struct NewJob {
    pub job_id: u64,
    pub payload: JobPayload,
    pub owner: UserRef,
    pub location: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub status: JobStatus,
    /// Raw error field from the submission response
    pub error: Option<String>,
    pub ping_on_completion: bool,
}

/// A tracked remote job
#[derive(Debug, Clone)]
pub struct Job {
    key: String,
    job_id: u64,
    owner: UserRef,
    location: String,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
    status: JobStatus,
    error: Option<String>,
    ping_on_completion: bool,
    notification: Option<NotificationHandle>,
    payload: JobPayload,
}

impl Job {
    /// Creates a job keyed as `{kind}-{job_id}`
    pub fn new(new: NewJob) -> Self {
        let mut job = Self {
            key: new.payload.kind().key(new.job_id),
            job_id: new.job_id,
            owner: new.owner,
            location: new.location,
            created_at: new.created_at,
            modified_at: new.modified_at,
            status: new.status,
            error: None,
            ping_on_completion: new.ping_on_completion,
            notification: None,
            payload: new.payload,
        };
        job.apply_error(new.error.as_deref());
        job
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Numeric id eurocore assigned to the job
    pub fn job_id(&self) -> u64 {
        self.job_id
    }

    pub fn kind(&self) -> JobKind {
        self.payload.kind()
    }

    pub fn owner(&self) -> &UserRef {
        &self.owner
    }

    /// Path polled for status updates
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn ping_on_completion(&self) -> bool {
        self.ping_on_completion
    }

    pub fn notification_handle(&self) -> Option<&NotificationHandle> {
        self.notification.as_ref()
    }

    pub fn payload(&self) -> &JobPayload {
        &self.payload
    }

    /// Extracts the message from a raw eurocore error field
    ///
    /// Input that does not match the error pattern leaves the current error untouched.
    pub fn apply_error(&mut self, raw: Option<&str>) {
        if let Some(message) = raw.and_then(extract_error) {
            self.error = Some(message);
        }
    }

    /// Applies a status lookup to this job
    ///
    /// Status only ever moves from `queued` to a terminal state; once terminal
    /// it is never changed again. The remote id is recorded once known and
    /// never cleared.
    pub fn apply_update(&mut self, update: JobUpdate) -> Transition {
        self.modified_at = update.modified_at;
        self.apply_error(update.error.as_deref());
        self.payload.set_remote_id(update.remote_id);

        if self.status.is_terminal() || !update.status.is_terminal() {
            return Transition::Unchanged;
        }

        self.status = update.status;
        Transition::Completed(update.status)
    }

    /// Stores the handle of the first rendered view
    ///
    /// Returns `false` and keeps the existing handle if one was already set.
    pub fn set_notification_handle(&mut self, handle: NotificationHandle) -> bool {
        if self.notification.is_some() {
            return false;
        }
        self.notification = Some(handle);
        true
    }

    /// Renders the job into a presentation-neutral view
    pub fn render(&self) -> JobView {
        let mut fields = Vec::with_capacity(6);
        let artifact_label = match &self.payload {
            JobPayload::Dispatch { action, .. } => {
                fields.push(ViewField::inline("Action", FieldValue::text(action.as_str())));
                "View Dispatch"
            }
            JobPayload::RmbPost { .. } => "View RMB Post",
        };

        fields.push(ViewField::inline(
            "Status",
            FieldValue::text(self.status.as_str()),
        ));
        fields.push(ViewField::inline(
            "Job Created",
            FieldValue::Timestamp {
                at: self.created_at,
                style: TimeStyle::Absolute,
            },
        ));
        fields.push(ViewField::inline(
            "Job Modified",
            FieldValue::Timestamp {
                at: self.modified_at,
                style: TimeStyle::Relative,
            },
        ));

        if let Some(url) = self.payload.artifact_url() {
            fields.push(ViewField::block(artifact_label, FieldValue::Link(url)));
        }

        fields.push(ViewField::block(
            "Error",
            FieldValue::Code(self.error.clone().unwrap_or_default()),
        ));

        let label = match self.kind() {
            JobKind::Dispatch => "Dispatch",
            JobKind::RmbPost => "RMBPost",
        };

        JobView {
            key: self.key.clone(),
            title: format!("{} {}: {}", label, self.job_id, self.status.title()),
            status: self.status,
            fields,
            footer: format!("Initiated by {}", self.owner.name),
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.key, self.status)
    }
}

/// Returns the text before the closing `</p>` of a raw error, if present
pub fn extract_error(raw: &str) -> Option<String> {
    ERROR_PATTERN
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
