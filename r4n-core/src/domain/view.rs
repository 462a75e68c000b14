//! Rendered job views
//!
//! A [`JobView`] describes what a user should see about a job without
//! committing to any chat platform's formatting. Notifiers decide how each
//! [`FieldValue`] is drawn.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::job::JobStatus;

/// How a timestamp should be presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeStyle {
    /// A fixed date and time
    Absolute,
    /// Relative to now, e.g. "2 minutes ago"
    Relative,
}

/// Value of a single view field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum FieldValue {
    Text(String),
    Timestamp { at: DateTime<Utc>, style: TimeStyle },
    Link(String),
    /// Preformatted text; shown even when empty
    Code(String),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewField {
    pub name: String,
    pub value: FieldValue,
    /// Whether the field may share a row with its neighbours
    pub inline: bool,
}

impl ViewField {
    pub fn inline(name: impl Into<String>, value: FieldValue) -> Self {
        Self {
            name: name.into(),
            value,
            inline: true,
        }
    }

    pub fn block(name: impl Into<String>, value: FieldValue) -> Self {
        Self {
            name: name.into(),
            value,
            inline: false,
        }
    }
}

/// Presentation-neutral status view of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobView {
    pub key: String,
    pub title: String,
    pub status: JobStatus,
    pub fields: Vec<ViewField>,
    pub footer: String,
}

impl JobView {
    /// Looks up a field by name
    pub fn field(&self, name: &str) -> Option<&ViewField> {
        self.fields.iter().find(|field| field.name == name)
    }
}
