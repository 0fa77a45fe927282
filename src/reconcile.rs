//! The reconciliation engine.
//!
//! [`merge`] takes the canonical tree and a proposal and produces a new
//! candidate tree, or rejects it. The merge is all-or-nothing: per-task
//! operations apply to a private clone, the full candidate is validated at
//! the end, and any single violation aborts the whole merge with the
//! canonical tree untouched. [`Engine`] wires the merge to a [`TreeStore`]
//! commit.

use crate::error::{Error, Result};
use crate::proposal::{Proposal, TaskChange};
use crate::tree::{TaskTree, TreeStore};
use crate::types::{Task, TaskStatus, now_ms};
use std::sync::Arc;
use tracing::{debug, warn};

/// Merge a proposal into `current`, producing a validated candidate tree.
///
/// `now` stamps `created_at`/`updated_at` on inserted and mutated tasks.
/// `updated_at` is bumped only when a field actually changes, so re-applying
/// an already-absorbed proposal is a no-op.
pub fn merge(current: &TaskTree, proposal: &Proposal, now: i64) -> Result<TaskTree> {
    proposal.check_shape()?;

    let mut candidate = current.clone();

    let (new, existing): (Vec<&TaskChange>, Vec<&TaskChange>) = proposal
        .tasks
        .iter()
        .partition(|c| !current.contains(&c.id));

    insert_new_tasks(&mut candidate, new, now)?;

    for change in existing {
        apply_update(&mut candidate, change, proposal.based_on, now)?;
    }

    candidate.validate()?;
    Ok(candidate)
}

/// Insert newly-introduced tasks, allowing multi-level insertion in one
/// pass: a declared parent may itself be new, in any order. Tasks whose
/// parent never materializes are orphans.
fn insert_new_tasks(candidate: &mut TaskTree, new: Vec<&TaskChange>, now: i64) -> Result<()> {
    let mut pending = new;
    while !pending.is_empty() {
        let mut deferred = Vec::new();
        let mut inserted_any = false;

        for change in pending {
            if change.parent.as_deref() == Some(change.id.as_str()) {
                return Err(Error::HierarchyCycle {
                    cycle: vec![change.id.clone()],
                });
            }
            let parent_id = change.parent.clone().unwrap_or_else(|| candidate.root.clone());
            if candidate.contains(&parent_id) {
                insert_one(candidate, change, &parent_id, now)?;
                inserted_any = true;
            } else {
                deferred.push(change);
            }
        }

        if !inserted_any {
            // No parent in this batch will ever materialize. Report the
            // first by id for determinism.
            let mut remaining = deferred;
            remaining.sort_by(|a, b| a.id.cmp(&b.id));
            let orphan = remaining[0];
            return Err(Error::orphan(
                &orphan.id,
                orphan.parent.as_deref().unwrap_or_default(),
            ));
        }
        pending = deferred;
    }
    Ok(())
}

fn insert_one(candidate: &mut TaskTree, change: &TaskChange, parent_id: &str, now: i64) -> Result<()> {
    let title = change
        .title
        .as_deref()
        .ok_or_else(|| Error::validation(format!("new task {} has no title", change.id)))?;

    let mut task = Task::new(&change.id, title, now);
    task.description = change.description.clone().unwrap_or_default();
    task.status = change.status.unwrap_or(TaskStatus::Pending);
    task.priority = change.priority.unwrap_or_default();
    task.due_date = change.due_date;
    task.estimate_minutes = change.estimate_minutes;
    task.actual_minutes = change.actual_minutes;
    task.progress = change.progress.unwrap_or(0);
    task.tags = change.tags.clone().unwrap_or_default();
    task.notes = change.notes.clone().unwrap_or_default();
    task.dependencies = change.dependencies.clone().unwrap_or_default();
    task.parent = Some(parent_id.to_string());
    normalize_completion(&mut task, change);

    let siblings = &mut candidate
        .tasks
        .get_mut(parent_id)
        .expect("parent existence checked by caller")
        .children;
    let index = change.position.unwrap_or(siblings.len()).min(siblings.len());
    siblings.insert(index, change.id.clone());

    debug!(task = %change.id, parent = %parent_id, "inserted task");
    candidate.tasks.insert(change.id.clone(), task);
    Ok(())
}

/// Couple progress and status when only one side was stated: done implies
/// progress 100 and vice versa. Inconsistent explicit pairs were already
/// rejected by the proposal shape check.
fn normalize_completion(task: &mut Task, change: &TaskChange) {
    if change.status == Some(TaskStatus::Done) && change.progress.is_none() {
        task.progress = 100;
    }
    if change.progress == Some(100) && change.status.is_none() {
        task.status = TaskStatus::Done;
    }
}

/// Apply a field-level update to an existing task. Every explicitly-set
/// field overwrites; untouched fields keep the canonical value.
fn apply_update(
    candidate: &mut TaskTree,
    change: &TaskChange,
    based_on: Option<i64>,
    now: i64,
) -> Result<()> {
    let id = change.id.as_str();
    let (old_parent, old_updated_at) = {
        let task = &candidate.tasks[id];
        (task.parent.clone(), task.updated_at)
    };

    if let Some(based_on) = based_on {
        if old_updated_at > based_on {
            // The proposer saw an older tree. Explicit fields still win;
            // untouched fields keep the newer canonical values.
            warn!(task = %id, based_on, updated_at = old_updated_at, "merging stale proposal");
        }
    }

    let mut changed = false;

    // Reparent / reorder before field edits so cycle errors surface with
    // the tree still coherent.
    if let Some(new_parent) = &change.parent {
        if old_parent.is_none() {
            return Err(Error::validation(format!("cannot reparent the root task {id}")));
        }
        if old_parent.as_deref() != Some(new_parent.as_str()) {
            if !candidate.contains(new_parent) {
                return Err(Error::orphan(id, new_parent));
            }
            if candidate.is_in_subtree(new_parent, id) {
                return Err(Error::HierarchyCycle {
                    cycle: subtree_cycle(candidate, new_parent, id),
                });
            }
            move_task(candidate, id, new_parent, change.position);
            changed = true;
        } else if let Some(position) = change.position {
            changed |= reorder_task(candidate, id, new_parent, position);
        }
    } else if let Some(position) = change.position {
        if let Some(parent) = old_parent.clone() {
            changed |= reorder_task(candidate, id, &parent, position);
        }
    }

    let task = candidate.tasks.get_mut(id).expect("existing id");

    macro_rules! set_field {
        ($field:ident, $value:expr) => {
            if let Some(value) = $value {
                if task.$field != value {
                    task.$field = value;
                    changed = true;
                }
            }
        };
    }

    set_field!(title, change.title.clone());
    set_field!(description, change.description.clone());
    set_field!(status, change.status);
    set_field!(priority, change.priority);
    set_field!(due_date, change.due_date.map(Some));
    set_field!(estimate_minutes, change.estimate_minutes.map(Some));
    set_field!(actual_minutes, change.actual_minutes.map(Some));
    set_field!(progress, change.progress);
    set_field!(tags, change.tags.clone());
    set_field!(notes, change.notes.clone());

    if let Some(deps) = &change.dependencies {
        if deps.contains(id) {
            return Err(Error::DependencyCycle {
                cycle: vec![id.to_string()],
            });
        }
        if &task.dependencies != deps {
            task.dependencies = deps.clone();
            changed = true;
        }
    }

    normalize_completion(task, change);

    // Reopening a done task must state where progress now stands; keeping
    // the stale 100 would break the progress/status invariant.
    if let Some(status) = change.status {
        if status != TaskStatus::Done && change.progress.is_none() && task.progress == 100 {
            return Err(Error::validation(format!(
                "reopening task {id} requires an explicit progress value"
            )));
        }
    }

    if changed {
        task.updated_at = now;
        debug!(task = %id, "updated task");
    }
    Ok(())
}

/// The ordered hierarchy cycle a reparent would create: the path from the
/// requested parent up through its ancestors to the moving task.
fn subtree_cycle(tree: &TaskTree, new_parent: &str, moving: &str) -> Vec<String> {
    let mut cycle = vec![new_parent.to_string()];
    if new_parent == moving {
        return cycle;
    }
    for ancestor in tree.ancestors(new_parent) {
        cycle.push(ancestor.to_string());
        if ancestor == moving {
            break;
        }
    }
    cycle
}

/// Detach `id` from its current parent and attach under `new_parent` at the
/// requested position (appended when absent or past the end).
fn move_task(tree: &mut TaskTree, id: &str, new_parent: &str, position: Option<usize>) {
    let old_parent = tree.tasks[id].parent.clone();
    if let Some(old_parent) = old_parent {
        if let Some(parent) = tree.tasks.get_mut(&old_parent) {
            parent.children.retain(|c| c != id);
        }
    }
    let siblings = &mut tree.tasks.get_mut(new_parent).expect("checked by caller").children;
    let index = position.unwrap_or(siblings.len()).min(siblings.len());
    siblings.insert(index, id.to_string());
    tree.tasks.get_mut(id).expect("existing id").parent = Some(new_parent.to_string());
}

/// Move `id` to `position` within its current parent. Returns whether the
/// order actually changed.
fn reorder_task(tree: &mut TaskTree, id: &str, parent: &str, position: usize) -> bool {
    let siblings = &mut tree.tasks.get_mut(parent).expect("checked by caller").children;
    let Some(current) = siblings.iter().position(|c| c == id) else {
        return false;
    };
    let target = position.min(siblings.len() - 1);
    if current == target {
        return false;
    }
    let moved = siblings.remove(current);
    siblings.insert(target, moved);
    true
}

/// The reconciliation engine: merges proposals and commits them through the
/// tree store as one logical transaction. No intermediate state is ever
/// observable by readers.
pub struct Engine {
    store: TreeStore,
}

impl Engine {
    pub fn new(store: TreeStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &TreeStore {
        &self.store
    }

    /// Merge `proposal` against the current canonical tree and commit the
    /// result. On any rejection the canonical tree is unchanged.
    pub fn apply(&self, proposal: &Proposal) -> Result<Arc<TaskTree>> {
        let current = self.store.current();
        let candidate = merge(&current, proposal, now_ms())?;
        self.store.commit(candidate)
    }
}
