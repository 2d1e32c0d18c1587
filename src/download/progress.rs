//! Job status tracking.
//!
//! Every submitted job gets an entry in a shared [`ProgressTracker`] that
//! workers update as they run and clients poll by job id. The tracker is
//! instance-owned so independent orchestrators never see each other's jobs.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::core::{AppError, AppResult};

/// Lifecycle state of a tracked job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobState {
    #[serde(rename = "starting")]
    Starting,
    #[serde(rename = "downloading")]
    Downloading,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "completed_with_errors")]
    CompletedWithErrors,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Starting => "starting",
            JobState::Downloading => "downloading",
            JobState::Completed => "completed",
            JobState::Error => "error",
            JobState::CompletedWithErrors => "completed_with_errors",
        }
    }

    /// Terminal states never transition again and become eligible for
    /// eviction once their TTL elapses.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Error | JobState::CompletedWithErrors
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Batch-level counters attached to playlist job statuses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    pub total_items: usize,
    /// 1-based index of the item currently being processed
    pub current_item: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Snapshot of one job's status as reported to pollers.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub state: JobState,
    /// Percent complete, 0.0 to 100.0, never decreasing
    pub progress: f64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<BatchProgress>,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub updated_at: Instant,
    /// Set when the job enters a terminal state, drives eviction
    #[serde(skip)]
    pub terminal_at: Option<Instant>,
}

impl JobStatus {
    fn new(state: JobState, message: String) -> Self {
        let now = Instant::now();
        JobStatus {
            state,
            progress: 0.0,
            message,
            batch: None,
            created_at: Utc::now(),
            updated_at: now,
            terminal_at: if state.is_terminal() { Some(now) } else { None },
        }
    }
}

/// Concurrent job status store.
///
/// All mutation goes through [`ProgressTracker::update`] so each change is
/// applied atomically under the entry's shard lock.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    jobs: DashMap<String, JobStatus>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        ProgressTracker { jobs: DashMap::new() }
    }

    /// Registers a new job. Overwrites any stale entry under the same id.
    pub fn create(&self, job_id: &str, state: JobState, message: impl Into<String>) {
        self.jobs
            .insert(job_id.to_string(), JobStatus::new(state, message.into()));
    }

    /// Applies `apply` to the job's status under the entry lock.
    ///
    /// Updates to unknown ids are ignored; a worker may report after its
    /// entry was evicted and that must not resurrect the job.
    pub fn update<F>(&self, job_id: &str, apply: F)
    where
        F: FnOnce(&mut JobStatus),
    {
        if let Some(mut entry) = self.jobs.get_mut(job_id) {
            apply(entry.value_mut());
            let status = entry.value_mut();
            status.updated_at = Instant::now();
            if status.state.is_terminal() && status.terminal_at.is_none() {
                status.terminal_at = Some(status.updated_at);
                log::debug!("Job {job_id} reached terminal state {}", status.state);
            }
        } else {
            log::warn!("Ignoring status update for unknown job {job_id}");
        }
    }

    /// Records download progress, clamped to 100 and never decreasing.
    pub fn set_progress(&self, job_id: &str, percent: f64, message: impl Into<String>) {
        let message = message.into();
        self.update(job_id, |status| {
            status.state = JobState::Downloading;
            status.progress = status.progress.max(percent.clamp(0.0, 100.0));
            status.message = message;
        });
    }

    /// Returns the current status snapshot for a job.
    pub fn get(&self, job_id: &str) -> AppResult<JobStatus> {
        self.jobs
            .get(job_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(job_id.to_string()))
    }

    /// Removes terminal entries older than `ttl`. Returns how many were
    /// evicted. Called opportunistically on job submission rather than from
    /// a background task.
    pub fn evict_terminal(&self, ttl: Duration) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|_, status| match status.terminal_at {
            Some(at) => at.elapsed() < ttl,
            None => true,
        });
        let evicted = before - self.jobs.len();
        if evicted > 0 {
            log::info!("Evicted {evicted} finished download entries");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
