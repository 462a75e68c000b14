//! Job poller
//!
//! Refreshes every tracked job from eurocore on a fixed interval.
//! Each job is polled in its own task; jobs that finish are announced,
//! re-rendered one last time and evicted from the registry.

use r4n_core::domain::job::{Job, Transition};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Semaphore, watch};
use tokio::task::{AbortHandle, JoinError, JoinHandle, JoinSet};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::repository::{FetchCause, FetchFailed, StatusFetcher};
use crate::service::{JobRegistry, Notifier, NotifyError};

/// Poller timing
#[derive(Debug, Clone, Copy)]
pub struct PollerConfig {
    /// Time between the start of two poll cycles
    pub poll_interval: Duration,
    /// Upper bound on each status lookup and notification call
    pub request_timeout: Duration,
    /// Status lookups allowed in flight at once
    pub max_concurrent_fetches: usize,
}

impl From<&Config> for PollerConfig {
    fn from(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval,
            request_timeout: config.request_timeout,
            max_concurrent_fetches: config.max_concurrent_fetches,
        }
    }
}

/// Unexpected failure in the poll cycle driver itself
#[derive(Debug, Error)]
pub enum SchedulerFault {
    #[error("poll task aborted: {0}")]
    TaskAborted(#[from] JoinError),
}

/// Counters for a single poll cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub polled: usize,
    pub updated: usize,
    pub failed: usize,
    pub completed: usize,
    pub evicted: usize,
}

enum JobOutcome {
    Updated { completed: bool },
    Failed,
    /// The job was replaced or removed while its status was in flight
    Superseded,
}

/// One pass over the registry
#[derive(Clone)]
struct PollCycle {
    registry: JobRegistry,
    fetcher: Arc<dyn StatusFetcher>,
    notifier: Arc<dyn Notifier>,
    /// Shared by every cycle, so overlapping cycles stay within the limit
    fetch_permits: Arc<Semaphore>,
    request_timeout: Duration,
}

impl PollCycle {
    async fn run(&self) -> Result<CycleReport, SchedulerFault> {
        let jobs = self.registry.snapshot();
        let mut report = CycleReport {
            polled: jobs.len(),
            ..CycleReport::default()
        };

        if jobs.is_empty() {
            return Ok(report);
        }

        let mut tasks = JoinSet::new();
        for job in jobs {
            let cycle = self.clone();
            tasks.spawn(async move { cycle.poll_job(job).await });
        }

        let mut fault = None;
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(JobOutcome::Updated { completed }) => {
                    report.updated += 1;
                    if completed {
                        report.completed += 1;
                    }
                }
                Ok(JobOutcome::Failed) => report.failed += 1,
                Ok(JobOutcome::Superseded) => {}
                Err(e) => {
                    error!("Poll task aborted: {}", e);
                    report.failed += 1;
                    fault = Some(SchedulerFault::from(e));
                }
            }
        }

        report.evicted = self.registry.compact(Job::is_terminal).len();

        match fault {
            Some(fault) => Err(fault),
            None => Ok(report),
        }
    }

    async fn poll_job(&self, job: Job) -> JobOutcome {
        let Ok(_permit) = self.fetch_permits.acquire().await else {
            return JobOutcome::Superseded;
        };

        let update = match time::timeout(self.request_timeout, self.fetcher.fetch(&job)).await {
            Ok(Ok(update)) => update,
            Ok(Err(failure)) => return self.fetch_failed(failure),
            Err(_) => {
                let cause = FetchCause::TimedOut(self.request_timeout);
                return self.fetch_failed(FetchFailed::new(&job, cause));
            }
        };

        let Some((job, transition)) = self.registry.apply_update(&job, update) else {
            debug!("{} changed while polling, dropping update", job.key());
            return JobOutcome::Superseded;
        };

        if let Transition::Completed(status) = transition {
            info!("{} finished with status {}", job.key(), status);

            if job.ping_on_completion() {
                if let Err(e) = self.deliver(self.notifier.notify_mention(&job)).await {
                    warn!("Failed to mention owner of {}: {}", job.key(), e);
                }
            }
        }

        match job.notification_handle() {
            Some(handle) => {
                if let Err(e) = self.deliver(self.notifier.render_update(&job, handle)).await {
                    warn!("Failed to update view of {}: {}", job.key(), e);
                }
            }
            None => debug!("{} has no notification handle, skipping view", job.key()),
        }

        JobOutcome::Updated {
            completed: matches!(transition, Transition::Completed(_)),
        }
    }

    fn fetch_failed(&self, failure: FetchFailed) -> JobOutcome {
        let failures = self.registry.record_failure(&failure.key).unwrap_or_default();
        warn!("{} (consecutive failures: {})", failure, failures);
        JobOutcome::Failed
    }

    async fn deliver<T>(
        &self,
        call: impl Future<Output = Result<T, NotifyError>>,
    ) -> Result<T, NotifyError> {
        time::timeout(self.request_timeout, call)
            .await
            .unwrap_or(Err(NotifyError::TimedOut(self.request_timeout)))
    }
}

struct Running {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

enum PollerState {
    Stopped,
    Running(Running),
    /// Shutdown was signalled; the supervisor may still be finishing a cycle
    Stopping(AbortHandle),
}

impl PollerState {
    fn is_active(&self) -> bool {
        match self {
            PollerState::Stopped => false,
            PollerState::Running(running) => !running.handle.is_finished(),
            PollerState::Stopping(handle) => !handle.is_finished(),
        }
    }
}

/// Job poller that keeps tracked jobs up to date until they finish
pub struct JobPoller {
    cycle: PollCycle,
    poll_interval: Duration,
    ready: watch::Receiver<bool>,
    state: Mutex<PollerState>,
}

impl JobPoller {
    /// Creates a new, stopped job poller
    ///
    /// # Arguments
    /// * `registry` - Jobs to poll
    /// * `fetcher` - Status lookups
    /// * `notifier` - Delivery of updated views and completion mentions
    /// * `config` - Poll interval and per-call timeout
    /// * `ready` - Flips to `true` once the notification connection is up
    pub fn new(
        registry: JobRegistry,
        fetcher: Arc<dyn StatusFetcher>,
        notifier: Arc<dyn Notifier>,
        config: PollerConfig,
        ready: watch::Receiver<bool>,
    ) -> Self {
        Self {
            cycle: PollCycle {
                registry,
                fetcher,
                notifier,
                fetch_permits: Arc::new(Semaphore::new(config.max_concurrent_fetches.max(1))),
                request_timeout: config.request_timeout,
            },
            poll_interval: config.poll_interval,
            ready,
            state: Mutex::new(PollerState::Stopped),
        }
    }

    fn state(&self) -> MutexGuard<'_, PollerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts polling once the connection is ready
    ///
    /// Returns `false` without side effects if the poller is already running
    /// or a previous run is still shutting down.
    pub fn start(&self) -> bool {
        let mut state = self.state();
        match &*state {
            PollerState::Running(_) if state.is_active() => {
                debug!("Job poller already running");
                return false;
            }
            PollerState::Stopping(_) if state.is_active() => {
                warn!("Job poller still stopping, not restarting");
                return false;
            }
            _ => {}
        }

        info!("Starting job poller (interval: {:?})", self.poll_interval);

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(supervise(
            self.cycle.clone(),
            self.poll_interval,
            self.ready.clone(),
            shutdown_rx,
        ));

        *state = PollerState::Running(Running { shutdown, handle });
        true
    }

    /// Stops polling, letting an in-flight cycle finish
    ///
    /// Returns `false` if the poller was not running. The poller cannot be
    /// restarted until the previous supervisor has exited.
    pub async fn stop(&self) -> bool {
        let running = {
            let mut state = self.state();
            match std::mem::replace(&mut *state, PollerState::Stopped) {
                PollerState::Running(running) => {
                    *state = PollerState::Stopping(running.handle.abort_handle());
                    running
                }
                other => {
                    *state = other;
                    debug!("Job poller not running");
                    return false;
                }
            }
        };

        info!("Stopping job poller");
        running.shutdown.send_replace(true);

        if let Err(e) = running.handle.await {
            if e.is_panic() {
                error!("Job poller supervisor panicked: {}", e);
            }
        }

        let mut state = self.state();
        if matches!(*state, PollerState::Stopping(_)) {
            *state = PollerState::Stopped;
        }
        true
    }

    pub fn is_running(&self) -> bool {
        let state = self.state();
        matches!(*state, PollerState::Running(_)) && state.is_active()
    }

    /// Runs a single poll cycle immediately
    pub async fn poll_once(&self) -> Result<CycleReport, SchedulerFault> {
        self.cycle.run().await
    }
}

/// Waits for readiness, then keeps the poll loop alive until shutdown
async fn supervise(
    cycle: PollCycle,
    period: Duration,
    mut ready: watch::Receiver<bool>,
    mut shutdown: watch::Receiver<bool>,
) {
    tokio::select! {
        is_ready = async { ready.wait_for(|ready| *ready).await.is_ok() } => {
            if !is_ready {
                warn!("Connection closed before it became ready; job poller not started");
                return;
            }
        }
        _ = shutdown.changed() => return,
    }

    debug!("Connection ready, polling every {:?}", period);

    loop {
        let run = tokio::spawn(run_loop(cycle.clone(), period, shutdown.clone()));

        match run.await {
            Ok(()) => break,
            Err(e) if e.is_panic() => error!("Poll loop panicked, restarting: {}", e),
            Err(e) => {
                debug!("Poll loop cancelled: {}", e);
                break;
            }
        }

        tokio::select! {
            _ = time::sleep(period) => {}
            _ = shutdown.changed() => break,
        }
    }

    info!("Job poller stopped");
}

/// Runs poll cycles on a fixed interval until shutdown is signalled
async fn run_loop(cycle: PollCycle, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        if *shutdown.borrow() {
            break;
        }

        debug!("Polling tracked jobs");

        match cycle.run().await {
            Ok(report) if report.polled > 0 => info!(
                "Polled {} job(s): {} updated, {} failed, {} finished, {} evicted",
                report.polled, report.updated, report.failed, report.completed, report.evicted
            ),
            Ok(_) => debug!("No jobs to poll"),
            Err(fault) => error!("Scheduler fault during poll cycle: {}", fault),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use r4n_core::domain::job::{
        DispatchAction, JobPayload, JobStatus, JobUpdate, NewJob, NotificationHandle, UserRef,
    };
    use r4n_core::domain::view::{FieldValue, JobView};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    enum Behavior {
        Respond(JobUpdate),
        Fail,
        Hang,
        Panic,
        Delay(Duration, JobUpdate),
        /// Registers another job while the lookup is in flight
        Submit(JobRegistry, Job, JobUpdate),
    }

    #[derive(Default)]
    struct FakeFetcher {
        behaviors: Mutex<HashMap<String, Behavior>>,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl FakeFetcher {
        fn set(&self, key: &str, behavior: Behavior) {
            self.behaviors
                .lock()
                .unwrap()
                .insert(key.to_string(), behavior);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn peak(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StatusFetcher for FakeFetcher {
        async fn fetch(&self, job: &Job) -> Result<JobUpdate, FetchFailed> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let behavior = self.behaviors.lock().unwrap().get(job.key()).cloned();

            match behavior {
                Some(Behavior::Respond(update)) => Ok(update),
                Some(Behavior::Fail) => Err(FetchFailed::new(
                    job,
                    FetchCause::MalformedResponse("missing field `status`".to_string()),
                )),
                Some(Behavior::Hang) => std::future::pending().await,
                Some(Behavior::Panic) => panic!("fetcher exploded"),
                Some(Behavior::Delay(delay, update)) => {
                    let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    self.peak.fetch_max(now, Ordering::SeqCst);
                    time::sleep(delay).await;
                    self.in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(update)
                }
                Some(Behavior::Submit(registry, submitted, update)) => {
                    registry.insert(submitted);
                    Ok(update)
                }
                None => Ok(update(JobStatus::Queued, None)),
            }
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        mentions: Mutex<Vec<String>>,
        views: Mutex<Vec<JobView>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn render_initial(&self, job: &Job) -> Result<NotificationHandle, NotifyError> {
            Ok(NotificationHandle::new(job.key()))
        }

        async fn render_update(
            &self,
            job: &Job,
            _handle: &NotificationHandle,
        ) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError::Rejected {
                    status: 404,
                    message: "Unknown Message".to_string(),
                });
            }
            self.views.lock().unwrap().push(job.render());
            Ok(())
        }

        async fn notify_mention(&self, job: &Job) -> Result<(), NotifyError> {
            self.mentions.lock().unwrap().push(job.key().to_string());
            Ok(())
        }
    }

    fn update(status: JobStatus, dispatch_id: Option<u64>) -> JobUpdate {
        JobUpdate {
            status,
            modified_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 30).unwrap(),
            error: None,
            remote_id: dispatch_id,
        }
    }

    fn tracked(job_id: u64, ping_on_completion: bool) -> Job {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut job = Job::new(NewJob {
            job_id,
            payload: JobPayload::dispatch(DispatchAction::Add),
            owner: UserRef::new(1, "testlandia"),
            location: format!("/queue/dispatch/{}", job_id),
            created_at: at,
            modified_at: at,
            status: JobStatus::Queued,
            error: None,
            ping_on_completion,
        });
        job.set_notification_handle(NotificationHandle::new(job.key()));
        job
    }

    struct Harness {
        registry: JobRegistry,
        fetcher: Arc<FakeFetcher>,
        notifier: Arc<RecordingNotifier>,
        ready: watch::Sender<bool>,
        poller: JobPoller,
    }

    fn harness(notifier: RecordingNotifier, ready: bool) -> Harness {
        harness_with_limit(notifier, ready, 8)
    }

    fn harness_with_limit(
        notifier: RecordingNotifier,
        ready: bool,
        max_concurrent_fetches: usize,
    ) -> Harness {
        let registry = JobRegistry::new();
        let fetcher = Arc::new(FakeFetcher::default());
        let notifier = Arc::new(notifier);
        let (ready, ready_rx) = watch::channel(ready);
        let poller = JobPoller::new(
            registry.clone(),
            fetcher.clone(),
            notifier.clone(),
            PollerConfig {
                poll_interval: Duration::from_secs(10),
                request_timeout: Duration::from_secs(5),
                max_concurrent_fetches,
            },
            ready_rx,
        );

        Harness {
            registry,
            fetcher,
            notifier,
            ready,
            poller,
        }
    }

    #[tokio::test]
    async fn test_cycle_isolates_fetch_failures() {
        let h = harness(RecordingNotifier::default(), true);
        for id in 1..=3 {
            h.registry.insert(tracked(id, false));
        }
        h.fetcher.set("dispatch-1", Behavior::Respond(update(JobStatus::Success, Some(7))));
        h.fetcher.set("dispatch-2", Behavior::Fail);

        let report = h.poller.poll_once().await.unwrap();
        assert_eq!(
            report,
            CycleReport {
                polled: 3,
                updated: 2,
                failed: 1,
                completed: 1,
                evicted: 1,
            }
        );

        assert!(!h.registry.contains("dispatch-1"));

        let failed = h.registry.get("dispatch-2").unwrap();
        assert_eq!(failed.status(), JobStatus::Queued);
        assert_eq!(failed.modified_at(), tracked(2, false).modified_at());
        assert_eq!(h.registry.failures("dispatch-2"), Some(1));

        let queued = h.registry.get("dispatch-3").unwrap();
        assert_eq!(queued.status(), JobStatus::Queued);
        assert_eq!(
            queued.modified_at(),
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 30).unwrap()
        );
    }

    #[tokio::test]
    async fn test_mentions_once_per_completion() {
        let h = harness(RecordingNotifier::default(), true);
        h.registry.insert(tracked(1, true));
        h.registry.insert(tracked(2, false));
        h.registry.insert(tracked(3, true));
        h.fetcher.set("dispatch-1", Behavior::Respond(update(JobStatus::Success, Some(7))));
        h.fetcher.set("dispatch-2", Behavior::Respond(update(JobStatus::Failure, None)));

        h.poller.poll_once().await.unwrap();
        h.poller.poll_once().await.unwrap();

        assert_eq!(*h.notifier.mentions.lock().unwrap(), vec!["dispatch-1"]);
        assert!(h.registry.contains("dispatch-3"));
        assert_eq!(h.registry.len(), 1);
    }

    #[tokio::test]
    async fn test_completed_dispatch_is_rendered_and_evicted() {
        let h = harness(RecordingNotifier::default(), true);
        h.registry.insert(tracked(42, true));
        h.fetcher.set("dispatch-42", Behavior::Respond(update(JobStatus::Success, Some(7))));

        let report = h.poller.poll_once().await.unwrap();
        assert_eq!(report.completed, 1);
        assert!(h.registry.is_empty());

        let views = h.notifier.views.lock().unwrap();
        let view = views.last().unwrap();
        assert_eq!(view.title, "Dispatch 42: Success");
        assert_eq!(
            view.field("View Dispatch").map(|f| &f.value),
            Some(&FieldValue::Link(
                "https://www.nationstates.net/page=dispatch/id=7".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_block_compaction() {
        let notifier = RecordingNotifier {
            fail: true,
            ..RecordingNotifier::default()
        };
        let h = harness(notifier, true);
        h.registry.insert(tracked(1, true));
        h.fetcher.set("dispatch-1", Behavior::Respond(update(JobStatus::Success, None)));

        let report = h.poller.poll_once().await.unwrap();
        assert_eq!(report.evicted, 1);
        assert!(h.registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_fetch_times_out() {
        let h = harness(RecordingNotifier::default(), true);
        h.registry.insert(tracked(1, false));
        h.registry.insert(tracked(2, false));
        h.fetcher.set("dispatch-1", Behavior::Hang);
        h.fetcher.set("dispatch-2", Behavior::Respond(update(JobStatus::Success, None)));

        let report = h.poller.poll_once().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.evicted, 1);
        assert_eq!(h.registry.get("dispatch-1").unwrap().status(), JobStatus::Queued);
        assert_eq!(h.registry.failures("dispatch-1"), Some(1));
    }

    #[tokio::test]
    async fn test_panicking_task_is_contained() {
        let h = harness(RecordingNotifier::default(), true);
        h.registry.insert(tracked(1, false));
        h.registry.insert(tracked(2, false));
        h.fetcher.set("dispatch-1", Behavior::Panic);
        h.fetcher.set("dispatch-2", Behavior::Respond(update(JobStatus::Success, None)));

        let fault = h.poller.poll_once().await.unwrap_err();
        assert!(matches!(fault, SchedulerFault::TaskAborted(_)));

        assert!(h.registry.contains("dispatch-1"));
        assert!(!h.registry.contains("dispatch-2"));
    }

    #[tokio::test]
    async fn test_start_and_stop_are_idempotent() {
        let h = harness(RecordingNotifier::default(), true);

        assert!(!h.poller.stop().await);
        assert!(h.poller.start());
        assert!(!h.poller.start());
        assert!(h.poller.is_running());

        assert!(h.poller.stop().await);
        assert!(!h.poller.stop().await);
        assert!(!h.poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_readiness() {
        let h = harness(RecordingNotifier::default(), false);
        h.registry.insert(tracked(1, false));

        h.poller.start();
        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(h.fetcher.calls(), 0);

        h.ready.send_replace(true);
        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(h.fetcher.calls(), 1);

        h.poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_on_interval_through_faults() {
        let h = harness(RecordingNotifier::default(), true);
        h.registry.insert(tracked(1, false));
        h.fetcher.set("dispatch-1", Behavior::Panic);

        h.poller.start();
        time::sleep(Duration::from_secs(25)).await;

        // Ticks at 0s, 10s and 20s
        assert_eq!(h.fetcher.calls(), 3);
        assert!(h.poller.is_running());
        assert!(h.registry.contains("dispatch-1"));

        h.poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_lets_in_flight_cycle_finish() {
        let h = harness(RecordingNotifier::default(), true);
        h.registry.insert(tracked(1, false));
        h.fetcher.set("dispatch-1", Behavior::Hang);

        h.poller.start();
        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(h.fetcher.calls(), 1);

        assert!(h.poller.stop().await);
        assert!(!h.poller.is_running());
        assert_eq!(h.registry.failures("dispatch-1"), Some(1));
        assert_eq!(h.registry.get("dispatch-1").unwrap().status(), JobStatus::Queued);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_cycles_mention_once() {
        let h = harness(RecordingNotifier::default(), true);
        h.registry.insert(tracked(1, true));
        h.registry.insert(tracked(2, false));
        h.fetcher.set(
            "dispatch-1",
            Behavior::Delay(Duration::from_secs(1), update(JobStatus::Success, Some(7))),
        );
        // Keeps both cycles open past the completion so neither compacts early
        h.fetcher.set("dispatch-2", Behavior::Hang);

        let (first, second) = tokio::join!(h.poller.poll_once(), h.poller.poll_once());
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_eq!(first.completed + second.completed, 1);
        assert_eq!(*h.notifier.mentions.lock().unwrap(), vec!["dispatch-1"]);
        assert!(!h.registry.contains("dispatch-1"));
        assert_eq!(h.registry.failures("dispatch-2"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_refused_while_stopping() {
        let h = harness(RecordingNotifier::default(), true);
        h.registry.insert(tracked(1, true));
        h.registry.insert(tracked(2, false));
        h.fetcher.set(
            "dispatch-1",
            Behavior::Delay(Duration::from_secs(1), update(JobStatus::Success, Some(7))),
        );
        h.fetcher.set("dispatch-2", Behavior::Hang);

        assert!(h.poller.start());
        time::sleep(Duration::from_millis(500)).await;

        let (stopped, restarted) = tokio::join!(h.poller.stop(), async {
            tokio::task::yield_now().await;
            h.poller.start()
        });
        assert!(stopped);
        assert!(!restarted);
        assert!(!h.poller.is_running());

        // Once the old supervisor has exited a restart goes through
        assert!(h.poller.start());
        time::sleep(Duration::from_secs(1)).await;
        assert!(h.poller.stop().await);

        assert_eq!(*h.notifier.mentions.lock().unwrap(), vec!["dispatch-1"]);
        assert!(!h.registry.contains("dispatch-1"));
        assert!(h.registry.contains("dispatch-2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetches_respect_concurrency_limit() {
        let h = harness_with_limit(RecordingNotifier::default(), true, 2);
        for id in 1..=5 {
            h.registry.insert(tracked(id, false));
            h.fetcher.set(
                &format!("dispatch-{}", id),
                Behavior::Delay(Duration::from_secs(1), update(JobStatus::Queued, None)),
            );
        }

        let report = h.poller.poll_once().await.unwrap();
        assert_eq!(report.updated, 5);
        assert_eq!(report.failed, 0);
        assert_eq!(h.fetcher.peak(), 2);
    }

    #[tokio::test]
    async fn test_job_submitted_mid_cycle_survives_compaction() {
        let h = harness(RecordingNotifier::default(), true);
        h.registry.insert(tracked(1, false));
        h.fetcher.set(
            "dispatch-1",
            Behavior::Submit(
                h.registry.clone(),
                tracked(2, false),
                update(JobStatus::Success, Some(7)),
            ),
        );

        let report = h.poller.poll_once().await.unwrap();
        assert_eq!(report.polled, 1);
        assert_eq!(report.evicted, 1);
        assert_eq!(h.fetcher.calls(), 1);

        assert!(!h.registry.contains("dispatch-1"));
        let submitted = h.registry.get("dispatch-2").unwrap();
        assert_eq!(submitted.status(), JobStatus::Queued);
        assert_eq!(h.registry.len(), 1);
    }
}
