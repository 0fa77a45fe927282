//! The proposal boundary.
//!
//! Proposals arrive from an external interpreter (typically LLM-derived) and
//! are never trusted as free-form structures: they parse into this fixed
//! shape with `deny_unknown_fields`, and anything malformed is rejected as a
//! validation error before any merge logic runs.

use crate::error::{Error, Result};
use crate::types::{TaskPriority, TaskStatus};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// A candidate change-set to merge into the canonical tree.
///
/// A full tree snapshot is just the limiting case of a diff that mentions
/// every task. Absence of a task id is never deletion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Proposal {
    /// Millisecond timestamp of the canonical tree the proposer saw.
    /// Merging over a newer tree logs a stale-proposal warning.
    #[serde(default)]
    pub based_on: Option<i64>,
    #[serde(default)]
    pub tasks: Vec<TaskChange>,
}

/// One task's worth of proposed change.
///
/// Every `Some` field is explicit intent and overwrites the canonical
/// value; `None` means untouched. For a new id, unset fields fall back to
/// defaults (pending, medium priority, progress 0).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskChange {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub due_date: Option<i64>,
    #[serde(default)]
    pub estimate_minutes: Option<i64>,
    #[serde(default)]
    pub actual_minutes: Option<i64>,
    #[serde(default)]
    pub progress: Option<i32>,
    #[serde(default)]
    pub tags: Option<BTreeSet<String>>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Declared parent. For a new id this is where the task is inserted
    /// (root when absent); for an existing id a differing value is a
    /// reparent request.
    #[serde(default)]
    pub parent: Option<String>,
    /// Requested index in the parent's children list; appended when absent
    /// or out of range.
    #[serde(default)]
    pub position: Option<usize>,
    /// Full replacement dependency set.
    #[serde(default)]
    pub dependencies: Option<BTreeSet<String>>,
}

impl TaskChange {
    /// A change that only names a task, touching nothing.
    pub fn for_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

impl Proposal {
    /// Parse a proposal from JSON, rejecting unknown or malformed shapes.
    pub fn from_json(raw: &str) -> Result<Self> {
        let proposal: Proposal = serde_json::from_str(raw)
            .map_err(|e| Error::validation(format!("malformed proposal: {e}")))?;
        proposal.check_shape()?;
        Ok(proposal)
    }

    /// Structural checks that serde cannot express: non-empty ids, no id
    /// mentioned twice, sane field ranges.
    pub fn check_shape(&self) -> Result<()> {
        let mut seen: HashSet<&str> = HashSet::new();
        for change in &self.tasks {
            if change.id.trim().is_empty() {
                return Err(Error::validation("proposal contains an empty task id"));
            }
            if !seen.insert(change.id.as_str()) {
                return Err(Error::DuplicateId {
                    id: change.id.clone(),
                });
            }
            if let Some(title) = &change.title {
                if title.trim().is_empty() {
                    return Err(Error::validation(format!(
                        "proposal sets an empty title on {}",
                        change.id
                    )));
                }
            }
            if let Some(progress) = change.progress {
                if !(0..=100).contains(&progress) {
                    return Err(Error::validation(format!(
                        "proposal sets progress {progress} on {} (expected 0..=100)",
                        change.id
                    )));
                }
            }
            for minutes in [change.estimate_minutes, change.actual_minutes].into_iter().flatten() {
                if minutes < 0 {
                    return Err(Error::validation(format!(
                        "proposal sets a negative duration on {}",
                        change.id
                    )));
                }
            }
            // Explicitly inconsistent intent is rejected here rather than
            // silently normalized.
            match (change.status, change.progress) {
                (Some(TaskStatus::Done), Some(p)) if p != 100 => {
                    return Err(Error::validation(format!(
                        "proposal marks {} done with progress {p}",
                        change.id
                    )));
                }
                (Some(s), Some(100)) if s != TaskStatus::Done => {
                    return Err(Error::validation(format!(
                        "proposal sets progress 100 on {} with status {}",
                        change.id,
                        s.as_str()
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_proposal() {
        let p = Proposal::from_json(r#"{"tasks": [{"id": "t1", "title": "Write docs"}]}"#).unwrap();
        assert_eq!(p.tasks.len(), 1);
        assert_eq!(p.tasks[0].id, "t1");
        assert_eq!(p.tasks[0].title.as_deref(), Some("Write docs"));
        assert!(p.tasks[0].status.is_none());
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = Proposal::from_json(r#"{"tasks": [{"id": "t1", "urgency": 9}]}"#).unwrap_err();
        assert!(err.to_string().contains("malformed proposal"));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let raw = r#"{"tasks": [{"id": "t1"}, {"id": "t1"}]}"#;
        assert!(matches!(
            Proposal::from_json(raw).unwrap_err(),
            Error::DuplicateId { id } if id == "t1"
        ));
    }

    #[test]
    fn rejects_out_of_range_progress() {
        let raw = r#"{"tasks": [{"id": "t1", "progress": 150}]}"#;
        assert!(Proposal::from_json(raw).is_err());
    }

    #[test]
    fn rejects_done_with_partial_progress() {
        let raw = r#"{"tasks": [{"id": "t1", "status": "done", "progress": 40}]}"#;
        assert!(Proposal::from_json(raw).is_err());
    }

    #[test]
    fn accepts_done_with_full_progress() {
        let raw = r#"{"tasks": [{"id": "t1", "status": "done", "progress": 100}]}"#;
        assert!(Proposal::from_json(raw).is_ok());
    }
}
