//! API Module
//!
//! HTTP command surface for the bot. Each route mirrors a chat command:
//! users log in or register with eurocore, then queue dispatch and RMB
//! post jobs that the poller tracks to completion.

pub mod error;
pub mod health;
pub mod job;
pub mod user;

use axum::{
    Router,
    routing::{get, post, put},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::service::{JobRegistry, SubmissionService, UserSessions};

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<UserSessions>,
    pub submissions: Arc<SubmissionService>,
    pub registry: JobRegistry,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // User endpoints
        .route("/users/{id}/login", post(user::login))
        .route("/users/{id}/register", post(user::register))
        // Job submission endpoints
        .route("/users/{id}/dispatches", post(job::add_dispatch))
        .route(
            "/users/{id}/dispatches/{dispatch_id}",
            put(job::edit_dispatch).delete(job::remove_dispatch),
        )
        .route("/users/{id}/rmbposts", post(job::post_rmb))
        // Tracked jobs
        .route("/jobs", get(job::list_jobs))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
