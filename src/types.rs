//! Core types for the task tree.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Task status lifecycle.
///
/// `Cancelled` is terminal but the task is retained for history; cancelled
/// tasks are excluded from scheduling and health scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Blocked,
    Done,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Done => "done",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal states are excluded from scheduling and health scans.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Cancelled)
    }

    /// Active states participate in the execution plan.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            TaskStatus::Pending | TaskStatus::InProgress | TaskStatus::Blocked
        )
    }
}

/// Task priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Critical => "critical",
        }
    }

    /// Scheduling rank: lower sorts first (critical = 0).
    pub fn rank(&self) -> u8 {
        match self {
            TaskPriority::Critical => 0,
            TaskPriority::High => 1,
            TaskPriority::Medium => 2,
            TaskPriority::Low => 3,
        }
    }
}

/// A task in the tree.
///
/// Ownership (`parent`/`children`) and reference (`dependencies`) relations
/// are kept as id-valued adjacency, never embedded pointers; lookups go
/// through the owning [`crate::tree::TaskTree`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub due_date: Option<i64>,
    #[serde(default)]
    pub estimate_minutes: Option<i64>,
    #[serde(default)]
    pub actual_minutes: Option<i64>,
    #[serde(default)]
    pub progress: i32,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub notes: String,
    /// Parent task id; `None` only for the root.
    #[serde(default)]
    pub parent: Option<String>,
    /// Ordered child ids (display/priority order).
    #[serde(default)]
    pub children: Vec<String>,
    /// Ids this task is blocked on. Not an ownership relation; may cross
    /// subtree boundaries.
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
}

impl Task {
    /// Create a task with defaults (pending, medium priority, no progress).
    pub fn new(id: impl Into<String>, title: impl Into<String>, now: i64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            status: TaskStatus::Pending,
            priority: TaskPriority::Medium,
            created_at: now,
            updated_at: now,
            due_date: None,
            estimate_minutes: None,
            actual_minutes: None,
            progress: 0,
            tags: BTreeSet::new(),
            notes: String::new(),
            parent: None,
            children: Vec::new(),
            dependencies: BTreeSet::new(),
        }
    }
}

/// Get the current timestamp in milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
