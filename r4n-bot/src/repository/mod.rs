//! Repository layer
//!
//! Repositories are stateless adapters over the eurocore client. They
//! translate API responses into domain updates without any business logic.
//!
//! All repositories are trait-based to enable testing and mocking.

mod status;

pub use status::{FetchCause, FetchFailed, HttpStatusFetcher, StatusFetcher};
