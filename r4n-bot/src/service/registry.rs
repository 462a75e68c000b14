//! Job registry
//!
//! In-memory map of every job the bot is tracking, keyed by `{kind}-{id}`.
//! Submissions insert into it, the poller reads snapshots of it and writes
//! polled state back, and terminal jobs are compacted out after each cycle.

use r4n_core::domain::job::{Job, JobUpdate, Transition};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct Entry {
    job: Job,
    /// Consecutive failed status lookups
    failures: u32,
}

/// Shared, cloneable registry of tracked jobs
///
/// Every operation takes the lock once and releases it before returning,
/// so readers always work on owned copies and never hold the map across a
/// network call.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<Mutex<HashMap<String, Entry>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts tracking a job, replacing any job registered under the same key
    pub fn insert(&self, job: Job) -> Option<Job> {
        let key = job.key().to_string();
        self.lock()
            .insert(key, Entry { job, failures: 0 })
            .map(|entry| entry.job)
    }

    pub fn get(&self, key: &str) -> Option<Job> {
        self.lock().get(key).map(|entry| entry.job.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Point-in-time copy of all jobs, oldest first
    pub fn snapshot(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.lock().values().map(|entry| entry.job.clone()).collect();
        jobs.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.key().cmp(b.key()))
        });
        jobs
    }

    /// Applies a polled update to the live entry for `polled`
    ///
    /// The update is dropped when the key was removed, now belongs to a
    /// different remote job (same key, different location), or the live
    /// entry already reached a terminal status in an overlapping cycle.
    /// Otherwise returns the updated job and the transition it made.
    pub fn apply_update(&self, polled: &Job, update: JobUpdate) -> Option<(Job, Transition)> {
        let mut jobs = self.lock();
        let entry = jobs
            .get_mut(polled.key())
            .filter(|entry| entry.job.location() == polled.location())
            .filter(|entry| !entry.job.is_terminal())?;

        let transition = entry.job.apply_update(update);
        entry.failures = 0;
        Some((entry.job.clone(), transition))
    }

    /// Counts a failed status lookup, returning the consecutive failure count
    pub fn record_failure(&self, key: &str) -> Option<u32> {
        self.lock().get_mut(key).map(|entry| {
            entry.failures = entry.failures.saturating_add(1);
            entry.failures
        })
    }

    pub fn failures(&self, key: &str) -> Option<u32> {
        self.lock().get(key).map(|entry| entry.failures)
    }

    /// Removes every job matching `predicate` and returns them
    ///
    /// The predicate sees the live entry, so a job that replaced a snapshot
    /// entry mid-cycle is judged on its own state.
    pub fn compact<F>(&self, predicate: F) -> Vec<Job>
    where
        F: Fn(&Job) -> bool,
    {
        let mut jobs = self.lock();
        let keys: Vec<String> = jobs
            .iter()
            .filter(|(_, entry)| predicate(&entry.job))
            .map(|(key, _)| key.clone())
            .collect();

        keys.iter()
            .filter_map(|key| jobs.remove(key))
            .map(|entry| entry.job)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use r4n_core::domain::job::{
        DispatchAction, JobPayload, JobStatus, JobUpdate, NewJob, UserRef,
    };

    fn job(job_id: u64, location: &str, offset_secs: i64) -> Job {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::seconds(offset_secs);
        Job::new(NewJob {
            job_id,
            payload: JobPayload::dispatch(DispatchAction::Add),
            owner: UserRef::new(1, "testlandia"),
            location: location.to_string(),
            created_at: at,
            modified_at: at,
            status: JobStatus::Queued,
            error: None,
            ping_on_completion: false,
        })
    }

    fn complete(job: &mut Job) {
        job.apply_update(success());
    }

    #[test]
    fn test_insert_replaces_on_collision() {
        let registry = JobRegistry::new();
        assert!(registry.insert(job(1, "/queue/dispatch/1", 0)).is_none());

        let replaced = registry.insert(job(1, "/queue/dispatch/1-retry", 5));
        assert_eq!(replaced.unwrap().location(), "/queue/dispatch/1");
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("dispatch-1").unwrap().location(),
            "/queue/dispatch/1-retry"
        );
    }

    #[test]
    fn test_snapshot_is_ordered_and_detached() {
        let registry = JobRegistry::new();
        registry.insert(job(3, "/queue/dispatch/3", 20));
        registry.insert(job(1, "/queue/dispatch/1", 0));
        registry.insert(job(2, "/queue/dispatch/2", 10));

        let snapshot = registry.snapshot();
        let keys: Vec<&str> = snapshot.iter().map(|j| j.key()).collect();
        assert_eq!(keys, vec!["dispatch-1", "dispatch-2", "dispatch-3"]);

        registry.compact(|_| true);
        registry.insert(job(4, "/queue/dispatch/4", 30));
        assert_eq!(snapshot.len(), 3);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_compact_removes_only_terminal() {
        let registry = JobRegistry::new();
        let mut done = job(1, "/queue/dispatch/1", 0);
        complete(&mut done);
        registry.insert(done);
        registry.insert(job(2, "/queue/dispatch/2", 0));

        let removed = registry.compact(Job::is_terminal);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].key(), "dispatch-1");
        assert!(!registry.contains("dispatch-1"));
        assert!(registry.contains("dispatch-2"));
    }

    fn success() -> JobUpdate {
        JobUpdate {
            status: JobStatus::Success,
            modified_at: Utc::now(),
            error: None,
            remote_id: Some(7),
        }
    }

    #[test]
    fn test_update_skips_replaced_or_removed_jobs() {
        let registry = JobRegistry::new();
        let polled = job(1, "/queue/dispatch/1", 0);
        registry.insert(polled.clone());

        // Re-submitted under the same key while the poll was in flight
        registry.insert(job(1, "/queue/dispatch/1-retry", 5));
        assert!(registry.apply_update(&polled, success()).is_none());
        assert_eq!(
            registry.get("dispatch-1").unwrap().status(),
            JobStatus::Queued
        );
        assert!(registry.compact(Job::is_terminal).is_empty());

        registry.compact(|_| true);
        assert!(registry.apply_update(&polled, success()).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_update_completes_live_entry_once() {
        let registry = JobRegistry::new();
        let snapshot = job(1, "/queue/dispatch/1", 0);
        registry.insert(snapshot.clone());

        // Two cycles holding the same stale snapshot
        let (updated, transition) = registry.apply_update(&snapshot, success()).unwrap();
        assert_eq!(transition, Transition::Completed(JobStatus::Success));
        assert_eq!(updated.payload().remote_id(), Some(7));

        assert!(registry.apply_update(&snapshot, success()).is_none());
        assert_eq!(
            registry.get("dispatch-1").unwrap().status(),
            JobStatus::Success
        );
    }

    #[test]
    fn test_failures_reset_on_update() {
        let registry = JobRegistry::new();
        let tracked = job(1, "/queue/dispatch/1", 0);
        registry.insert(tracked.clone());

        assert_eq!(registry.record_failure("dispatch-1"), Some(1));
        assert_eq!(registry.record_failure("dispatch-1"), Some(2));
        assert_eq!(registry.record_failure("dispatch-9"), None);

        let queued = JobUpdate {
            status: JobStatus::Queued,
            ..success()
        };
        let (_, transition) = registry.apply_update(&tracked, queued).unwrap();
        assert_eq!(transition, Transition::Unchanged);
        assert_eq!(registry.failures("dispatch-1"), Some(0));
    }
}
