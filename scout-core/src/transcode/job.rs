use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Validating,
    Running,
    Succeeded,
    Failed,
    TimedOut,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed | JobState::TimedOut)
    }

    fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Validating, JobState::Running)
                | (JobState::Validating, JobState::Failed)
                | (JobState::Running, JobState::Succeeded)
                | (JobState::Running, JobState::Failed)
                | (JobState::Running, JobState::TimedOut)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobState::Validating => "validating",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
            JobState::TimedOut => "timed_out",
        };
        f.write_str(label)
    }
}

/// One remux attempt of an adaptive playlist into a local artifact.
#[derive(Debug, Clone, Serialize)]
pub struct TranscodeJob {
    pub id: Uuid,
    pub input_url: String,
    pub output_path: PathBuf,
    pub started_at: DateTime<Utc>,
    state: JobState,
}

impl TranscodeJob {
    pub fn new(input_url: impl Into<String>, output_path: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            input_url: input_url.into(),
            output_path,
            started_at: Utc::now(),
            state: JobState::Validating,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Moves to `next`; transitions out of a terminal state or backwards are ignored.
    pub fn transition(&mut self, next: JobState) -> bool {
        if !self.state.can_transition_to(next) {
            debug!(job = %self.id, from = %self.state, to = %next, "ignored transcode state change");
            return false;
        }
        debug!(job = %self.id, from = %self.state, to = %next, "transcode state changed");
        self.state = next;
        true
    }

    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_forward_transitions_only() {
        let mut job = TranscodeJob::new("https://cdn.example/master.m3u8", PathBuf::from("out.mp4"));
        assert_eq!(job.state(), JobState::Validating);
        assert!(!job.transition(JobState::Succeeded));
        assert!(job.transition(JobState::Running));
        assert!(job.transition(JobState::TimedOut));
        assert!(job.state().is_terminal());
        assert!(!job.transition(JobState::Running));
        assert_eq!(job.state(), JobState::TimedOut);
    }
}
