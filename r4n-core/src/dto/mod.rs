//! Data Transfer Objects for the eurocore API
//!
//! Request and response bodies as they travel over the wire. Conversions
//! into domain types live next to the DTOs that feed them.

pub mod content;
pub mod job;
pub mod user;
