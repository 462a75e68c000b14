//! R4N Bot
//!
//! Chat bot that queues content jobs on eurocore and tracks them to
//! completion.
//!
//! Architecture:
//! - Configuration: Load settings from environment or defaults
//! - Repositories: HTTP status lookups against eurocore
//! - Services: Sessions, submissions, the job registry and notifiers
//! - Scheduler: Job polling and lifecycle management
//! - API: Command surface users submit through

pub mod api;
pub mod config;
pub mod repository;
pub mod scheduler;
pub mod service;
