//! Core domain types
//!
//! This module contains the structures the bot reasons about: remote jobs
//! submitted on behalf of a user, and the presentation-neutral view that is
//! handed to whatever delivers notifications.

pub mod job;
pub mod view;
