//! Cron-style job runner on the tokio runtime.
//!
//! Triggers are expressed in KST and converted to UTC cron expressions.
//! A job whose previous run is still active when the next trigger fires has
//! that run aborted (replace-existing).

pub mod stats;

use crate::domain::error::DomainError;
use chrono::Utc;
use futures::FutureExt;
use stats::SchedulerStats;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::Instrument;
use uuid::Uuid;

const KST_OFFSET_HOURS: u32 = 9;

pub type JobFuture = Pin<Box<dyn Future<Output = Result<String, DomainError>> + Send>>;
pub type JobHandler = Arc<dyn Fn() -> JobFuture + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Interval { minutes: u32 },
    /// Wall-clock time in KST, every day.
    Calendar { hour: u32, minute: u32 },
}

impl Trigger {
    pub fn every(minutes: u32) -> Self {
        Trigger::Interval { minutes }
    }

    pub fn at(hour: u32, minute: u32) -> Self {
        Trigger::Calendar { hour, minute }
    }

    /// Six-field (seconds first) cron expression in UTC for calendar triggers.
    pub fn cron_utc(&self) -> Option<String> {
        match *self {
            Trigger::Calendar { hour, minute } => {
                let utc_hour = (hour + 24 - KST_OFFSET_HOURS) % 24;
                Some(format!("0 {minute} {utc_hour} * * *"))
            }
            Trigger::Interval { .. } => None,
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Interval { minutes } => write!(f, "every {minutes}m"),
            Trigger::Calendar { hour, minute } => write!(f, "{hour:02}:{minute:02} KST"),
        }
    }
}

#[derive(Clone)]
pub struct JobSpec {
    pub id: String,
    pub description: String,
    pub triggers: Vec<Trigger>,
    pub handler: JobHandler,
}

impl JobSpec {
    pub fn new<F, Fut>(id: &str, description: &str, triggers: Vec<Trigger>, handler: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, DomainError>> + Send + 'static,
    {
        Self {
            id: id.to_string(),
            description: description.to_string(),
            triggers,
            handler: Arc::new(move || Box::pin(handler()) as JobFuture),
        }
    }
}

struct Inner {
    jobs: Vec<JobSpec>,
    stats: Arc<SchedulerStats>,
    running: Mutex<HashMap<String, AbortHandle>>,
}

/// Owns the job table, the per-job running slot and the stats.
#[derive(Clone)]
pub struct JobRunner {
    inner: Arc<Inner>,
}

impl JobRunner {
    pub fn new(jobs: Vec<JobSpec>) -> Self {
        Self {
            inner: Arc::new(Inner {
                jobs,
                stats: Arc::new(SchedulerStats::new()),
                running: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn stats(&self) -> Arc<SchedulerStats> {
        self.inner.stats.clone()
    }

    pub fn jobs(&self) -> &[JobSpec] {
        &self.inner.jobs
    }

    fn spec(&self, id: &str) -> Result<&JobSpec, DomainError> {
        self.inner
            .jobs
            .iter()
            .find(|j| j.id == id)
            .ok_or_else(|| DomainError::NotFound(format!("job {id}")))
    }

    /// Spawns a run of `id`, aborting a still-running previous run.
    pub fn trigger(&self, id: &str) -> Result<JoinHandle<Result<String, DomainError>>, DomainError> {
        let spec = self.spec(id)?;
        let handle = tokio::spawn(execute(
            spec.id.clone(),
            spec.handler.clone(),
            self.inner.stats.clone(),
        ));

        let previous = match self.inner.running.lock() {
            Ok(mut running) => running.insert(spec.id.clone(), handle.abort_handle()),
            Err(poisoned) => poisoned
                .into_inner()
                .insert(spec.id.clone(), handle.abort_handle()),
        };
        if let Some(prev) = previous {
            if !prev.is_finished() {
                tracing::warn!(job_id = %spec.id, "Previous run still active, aborting it");
                prev.abort();
                self.inner.stats.record_aborted(&spec.id);
            }
        }
        Ok(handle)
    }

    /// Runs `id` inline and returns its summary. Used by `run-job`.
    pub async fn run_now(&self, id: &str) -> Result<String, DomainError> {
        let spec = self.spec(id)?;
        execute(spec.id.clone(), spec.handler.clone(), self.inner.stats.clone()).await
    }

    /// Registers every trigger with a cron scheduler and starts it.
    /// The returned scheduler must be kept alive.
    pub async fn start(&self) -> Result<JobScheduler, DomainError> {
        let sched = JobScheduler::new().await.map_err(sched_err)?;

        for spec in &self.inner.jobs {
            for trigger in &spec.triggers {
                let runner = self.clone();
                let id = spec.id.clone();
                let run = move |_uuid: Uuid, _sched: JobScheduler| {
                    let runner = runner.clone();
                    let id = id.clone();
                    Box::pin(async move {
                        if let Err(e) = runner.trigger(&id) {
                            tracing::error!(job_id = %id, error = %e, "Failed to trigger job");
                        }
                    }) as Pin<Box<dyn Future<Output = ()> + Send>>
                };
                let job = match trigger {
                    Trigger::Interval { minutes } => Job::new_repeated_async(
                        Duration::from_secs(u64::from(*minutes) * 60),
                        run,
                    ),
                    Trigger::Calendar { .. } => {
                        let cron = trigger.cron_utc().unwrap_or_default();
                        Job::new_async(cron.as_str(), run)
                    }
                }
                .map_err(sched_err)?;
                sched.add(job).await.map_err(sched_err)?;
                tracing::info!(job_id = %spec.id, trigger = %trigger, "Job scheduled");
            }
        }

        sched.start().await.map_err(sched_err)?;
        tracing::info!(jobs = self.inner.jobs.len(), "Scheduler started");
        Ok(sched)
    }
}

fn sched_err(e: impl std::fmt::Display) -> DomainError {
    DomainError::Config(format!("scheduler: {e}"))
}

async fn execute(
    id: String,
    handler: JobHandler,
    stats: Arc<SchedulerStats>,
) -> Result<String, DomainError> {
    let span = tracing::info_span!("job", job_id = %id, run_id = %Uuid::new_v4());
    async move {
        stats.record_start(&id, Utc::now());
        let started = std::time::Instant::now();
        let outcome = AssertUnwindSafe(handler()).catch_unwind().await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(summary)) => {
                tracing::info!(duration_ms, summary = %summary, "Job succeeded");
                stats.record_success(&id, duration_ms, summary.clone());
                Ok(summary)
            }
            Ok(Err(e)) => {
                tracing::error!(duration_ms, error = %e, "Job failed");
                stats.record_failure(&id, duration_ms, e.to_string());
                Err(e)
            }
            Err(_) => {
                tracing::error!(duration_ms, "Job panicked");
                stats.record_failure(&id, duration_ms, "panicked".to_string());
                Err(DomainError::Job(format!("{id} panicked")))
            }
        }
    }
    .instrument(span)
    .await
}
