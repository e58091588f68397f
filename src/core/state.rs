//! Execution state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall pipeline run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run is executing groups
    Running,
    /// Every group finished
    Completed,
    /// A group failed and the run was aborted
    Failed,
}

/// Summary of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run ID
    pub run_id: Uuid,

    /// Pipeline name
    pub pipeline_name: String,

    pub status: RunStatus,

    pub started_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,

    /// Number of execution groups that finished
    pub groups: usize,

    /// Stage names in the order their groups finished
    pub completed_stages: Vec<String>,
}

impl RunSummary {
    /// Start a new run summary
    pub fn start(pipeline_name: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            pipeline_name: pipeline_name.into(),
            status: RunStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            groups: 0,
            completed_stages: Vec::new(),
        }
    }

    /// Record a finished group
    pub fn record_group(&mut self, stages: &[String]) {
        self.groups += 1;
        self.completed_stages.extend_from_slice(stages);
    }

    pub fn complete(&mut self) {
        self.status = RunStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self) {
        self.status = RunStatus::Failed;
        self.completed_at = Some(Utc::now());
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }
}
