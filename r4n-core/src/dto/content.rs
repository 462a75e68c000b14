//! Content submission DTOs
//!
//! Bodies for the eurocore endpoints that queue dispatch and RMB post jobs.

use serde::{Deserialize, Serialize};

/// Request to publish a new dispatch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDispatch {
    /// Nation the dispatch is published as
    pub nation: String,
    pub title: String,
    pub text: String,
    pub category: u8,
    pub subcategory: u16,
}

/// Request to replace an existing dispatch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditDispatch {
    pub nation: String,
    pub title: String,
    pub text: String,
    pub category: u8,
    pub subcategory: u16,
}

/// Request to delete an existing dispatch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveDispatch {
    pub nation: String,
}

/// Request to post on a regional message board
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRmbPost {
    pub nation: String,
    pub region: String,
    pub text: String,
}
