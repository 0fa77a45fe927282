//! Execution planning over the dependency graph.

use crate::error::Result;
use crate::graph;
use crate::tree::TaskTree;
use crate::types::TaskStatus;
use serde::Serialize;
use std::collections::HashSet;

/// One slot in the execution plan.
#[derive(Debug, Clone, Serialize)]
pub struct PlanEntry {
    pub task_id: String,
    /// Set when the task is not yet actionable: its own status is blocked,
    /// or at least one dependency is not done. Blocked entries stay in the
    /// plan; the consumer decides how to surface them.
    pub blocked: bool,
}

/// Produce a dependency-ordered execution plan.
///
/// Restricted to active tasks (pending, in progress, blocked); the root
/// container and terminal tasks are excluded. Among tasks with no ordering
/// constraint the order is deterministic: priority, due date, creation
/// time, id (see [`graph::topological_order`]).
pub fn plan(tree: &TaskTree) -> Result<Vec<PlanEntry>> {
    let active: HashSet<&str> = tree
        .tasks
        .values()
        .filter(|t| t.status.is_active() && t.id != tree.root)
        .map(|t| t.id.as_str())
        .collect();

    let order = graph::topological_order(tree, active.iter().copied())?;

    Ok(order
        .into_iter()
        .map(|task_id| {
            let task = &tree.tasks[&task_id];
            let unmet_dep = task.dependencies.iter().any(|dep| {
                tree.get(dep)
                    .map(|d| d.status != TaskStatus::Done)
                    .unwrap_or(true)
            });
            PlanEntry {
                blocked: task.status == TaskStatus::Blocked || unmet_dep,
                task_id,
            }
        })
        .collect())
}
