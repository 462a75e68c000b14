//! Webhook notifier
//!
//! Delivers job views as embeds through a chat webhook. The message id
//! returned for the first view is the notification handle; later views
//! edit that message in place.

use async_trait::async_trait;
use r4n_core::domain::job::{Job, NotificationHandle};
use r4n_core::domain::view::{FieldValue, JobView, TimeStyle};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::service::notifier::{Notifier, NotifyError};

/// Embed accent colour
const EMBED_COLOR: u32 = 0x5865F2;

#[derive(Debug, Deserialize)]
struct WebhookMessage {
    id: String,
}

/// Notifier backed by a chat webhook URL
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    /// Creates a new webhook notifier
    ///
    /// # Arguments
    /// * `client` - HTTP client, usually shared with the eurocore client
    /// * `url` - Webhook URL including its token
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            client,
            url: url.trim_end_matches('/').to_string(),
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, NotifyError> {
        let status = response.status();

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn connect(&self) -> Result<(), NotifyError> {
        let response = self.client.get(&self.url).send().await?;
        Self::check(response).await?;
        debug!("Webhook reachable");
        Ok(())
    }

    async fn render_initial(&self, job: &Job) -> Result<NotificationHandle, NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .query(&[("wait", "true")])
            .json(&json!({ "embeds": [embed(&job.render())] }))
            .send()
            .await?;

        let message: WebhookMessage = Self::check(response).await?.json().await?;
        Ok(NotificationHandle::new(message.id))
    }

    async fn render_update(
        &self,
        job: &Job,
        handle: &NotificationHandle,
    ) -> Result<(), NotifyError> {
        let url = format!("{}/messages/{}", self.url, handle);
        let response = self
            .client
            .patch(&url)
            .json(&json!({ "embeds": [embed(&job.render())] }))
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn notify_mention(&self, job: &Job) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&mention(job))
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }
}

/// Renders a view as a webhook embed
fn embed(view: &JobView) -> Value {
    let fields: Vec<Value> = view
        .fields
        .iter()
        .map(|field| {
            json!({
                "name": field.name,
                "value": format_value(&field.value),
                "inline": field.inline,
            })
        })
        .collect();

    json!({
        "title": view.title,
        "color": EMBED_COLOR,
        "fields": fields,
        "footer": { "text": view.footer },
    })
}

fn format_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Text(text) | FieldValue::Link(text) => text.clone(),
        FieldValue::Timestamp {
            at,
            style: TimeStyle::Absolute,
        } => format!("<t:{}>", at.timestamp()),
        FieldValue::Timestamp {
            at,
            style: TimeStyle::Relative,
        } => format!("<t:{}:R>", at.timestamp()),
        FieldValue::Code(text) => format!("```{}```", text),
    }
}

/// Message that pings a job's owner
fn mention(job: &Job) -> Value {
    let owner = job.owner();
    json!({
        "content": format!(
            "<@{}> {} {} finished: {}",
            owner.id,
            job.kind(),
            job.job_id(),
            job.status().title()
        ),
        "allowed_mentions": { "users": [owner.id.to_string()] },
    })
}
