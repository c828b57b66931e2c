/// Core workflow type definitions
///
/// Workflows own their triggers, actions and runs. Every child row carries the
/// parent workflow id; ownership is resolved through the workflow's `user_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A user-owned workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    /// Owning user; the tenant scope for everything below this workflow
    pub user_id: String,
    pub name: String,
    pub is_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Something that can start a workflow run (cron, webhook, manual, ...)
///
/// `config` is opaque: its schema belongs to the trigger type.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub id: String,
    pub workflow_id: String,
    pub trigger_type: String,
    pub config: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

/// One step of a workflow
///
/// `position` is advisory ordering supplied by the caller. It is neither
/// renumbered nor checked for uniqueness; equal positions keep insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub id: String,
    pub workflow_id: String,
    pub action_type: String,
    pub position: i32,
    pub config: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle of a run: `pending -> running -> {success, failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Success | RunStatus::Failed)
    }

    /// Forward-only transition table. Nothing skips `running` and nothing
    /// leaves a terminal state.
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (RunStatus::Pending, RunStatus::Running)
                | (RunStatus::Running, RunStatus::Success)
                | (RunStatus::Running, RunStatus::Failed)
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RunStatus::Pending),
            "running" => Ok(RunStatus::Running),
            "success" => Ok(RunStatus::Success),
            "failed" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status '{}'", other)),
        }
    }
}

/// One execution attempt of a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: String,
    pub workflow_id: String,
    pub status: RunStatus,
    /// Type of the trigger that produced this run ("manual" for API enqueues)
    pub trigger_type: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Append-only record of one action's outcome within one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLog {
    pub id: String,
    pub run_id: String,
    pub action_id: String,
    /// Position of the action at the time it ran
    pub action_position: i32,
    pub success: bool,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for [`RunLog`]
#[derive(Debug, Clone, PartialEq)]
pub struct NewRunLog {
    pub run_id: String,
    pub action_id: String,
    pub action_position: i32,
    pub success: bool,
    pub message: String,
}
