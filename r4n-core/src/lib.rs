//! R4N Core
//!
//! Core types shared by the eurocore client and the bot.
//!
//! This crate contains:
//! - Domain types: tracked jobs, their lifecycle and rendered views
//! - DTOs: request and response bodies exchanged with the eurocore API

pub mod domain;
pub mod dto;
