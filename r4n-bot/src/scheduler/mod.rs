//! Scheduler layer
//!
//! This layer polls eurocore for the status of every tracked job, pushes
//! updated views to users, and drops jobs once they reach a terminal state.

pub mod poller;

pub use poller::{CycleReport, JobPoller, PollerConfig, SchedulerFault};
