use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

/// Per-job counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobStats {
    pub total_runs: u64,
    pub successes: u64,
    pub failures: u64,
    /// Runs cancelled because the next trigger fired while they were still going.
    pub aborted: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub last_duration_ms: Option<u64>,
    pub last_error: Option<String>,
    pub last_summary: Option<String>,
}

impl JobStats {
    /// Percentage of completed runs that succeeded.
    pub fn success_rate(&self) -> f64 {
        let completed = self.successes + self.failures;
        if completed == 0 {
            0.0
        } else {
            self.successes as f64 / completed as f64 * 100.0
        }
    }
}

/// Stats shared between job wrappers (writers) and readers.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    jobs: RwLock<HashMap<String, JobStats>>,
}

impl SchedulerStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, job_id: &str, f: impl FnOnce(&mut JobStats)) {
        match self.jobs.write() {
            Ok(mut jobs) => f(jobs.entry(job_id.to_string()).or_default()),
            Err(poisoned) => f(poisoned.into_inner().entry(job_id.to_string()).or_default()),
        }
    }

    pub fn record_start(&self, job_id: &str, at: DateTime<Utc>) {
        self.update(job_id, |s| {
            s.total_runs += 1;
            s.last_run = Some(at);
        });
    }

    pub fn record_success(&self, job_id: &str, duration_ms: u64, summary: String) {
        self.update(job_id, |s| {
            s.successes += 1;
            s.last_duration_ms = Some(duration_ms);
            s.last_summary = Some(summary);
        });
    }

    pub fn record_failure(&self, job_id: &str, duration_ms: u64, error: String) {
        self.update(job_id, |s| {
            s.failures += 1;
            s.last_duration_ms = Some(duration_ms);
            s.last_error = Some(error);
        });
    }

    pub fn record_aborted(&self, job_id: &str) {
        self.update(job_id, |s| s.aborted += 1);
    }

    /// Immutable copy of all job stats, ordered by job id.
    pub fn snapshot(&self) -> BTreeMap<String, JobStats> {
        let read = |jobs: &HashMap<String, JobStats>| -> BTreeMap<String, JobStats> {
            jobs.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };
        match self.jobs.read() {
            Ok(jobs) => read(&jobs),
            Err(poisoned) => read(&poisoned.into_inner()),
        }
    }

    pub fn get(&self, job_id: &str) -> Option<JobStats> {
        self.snapshot().remove(job_id)
    }
}
