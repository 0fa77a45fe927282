//! Structured error types for reconciliation and storage.
//!
//! Every variant is recoverable and scoped to a single commit attempt: the
//! canonical tree stays at its last good state and the caller may retry.

use thiserror::Error;

/// Errors produced by validation, reconciliation, and persistence.
#[derive(Debug, Error)]
pub enum Error {
    /// Generic invariant breach or malformed input.
    #[error("validation failed: {reason}")]
    Validation { reason: String },

    /// A task references a parent that exists neither in the canonical tree
    /// nor in the proposal being merged.
    #[error("task {task_id} references missing parent {missing_parent_id}")]
    OrphanReference {
        task_id: String,
        missing_parent_id: String,
    },

    /// A reparent (or a corrupt candidate tree) would make the parent/child
    /// relation cyclic. The cycle lists the offending ids in order.
    #[error("hierarchy cycle: {}", cycle.join(" -> "))]
    HierarchyCycle { cycle: Vec<String> },

    /// The dependency relation is cyclic. The cycle lists the offending ids
    /// in order.
    #[error("dependency cycle: {}", cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    /// The same id appears more than once in a proposal.
    #[error("duplicate task id: {id}")]
    DuplicateId { id: String },

    /// The storage collaborator failed. The in-memory canonical tree is
    /// unaffected; the caller should retry persistence.
    #[error("persistence failed: {source}")]
    Persistence {
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn validation(reason: impl Into<String>) -> Self {
        Error::Validation {
            reason: reason.into(),
        }
    }

    pub fn orphan(task_id: impl Into<String>, missing_parent_id: impl Into<String>) -> Self {
        Error::OrphanReference {
            task_id: task_id.into(),
            missing_parent_id: missing_parent_id.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::Persistence { source }
    }
}

/// Result type for tree operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_errors_render_the_path() {
        let err = Error::HierarchyCycle {
            cycle: vec!["a".into(), "b".into(), "c".into()],
        };
        assert_eq!(err.to_string(), "hierarchy cycle: a -> b -> c");
    }

    #[test]
    fn orphan_names_both_ids() {
        let err = Error::orphan("t1", "ghost");
        assert!(err.to_string().contains("t1"));
        assert!(err.to_string().contains("ghost"));
    }
}
