//! Service layer
//!
//! Services contain the bot's business logic. They track submitted jobs,
//! cache user sessions, and deliver job views through a notifier.
//!
//! Collaborators are trait-based to enable testing and dependency injection.

mod notifier;
mod registry;
mod sessions;
mod submission;
mod webhook;

pub use notifier::{LogNotifier, Notifier, NotifyError, summarize};
pub use registry::JobRegistry;
pub use sessions::{Session, SessionError, UserSessions};
pub use submission::{SubmissionService, SubmitError};
pub use webhook::WebhookNotifier;
