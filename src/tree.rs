//! The canonical task tree and its store.
//!
//! [`TaskTree`] is an arena: tasks keyed by id, with parent/child and
//! dependency relations expressed as ids. [`TreeStore`] owns the canonical
//! snapshot; `commit` validates a candidate against the structural
//! invariants and atomically swaps it in, so readers always see a complete,
//! consistent tree and never a partially-applied merge.

use crate::error::{Error, Result};
use crate::graph;
use crate::types::{Task, TaskStatus, now_ms};
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// A complete snapshot of the task hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTree {
    /// All tasks, keyed by id.
    pub tasks: HashMap<String, Task>,
    /// Id of the single parentless task.
    pub root: String,
    /// Monotonic commit counter, bumped by [`TreeStore::commit`].
    #[serde(default)]
    pub revision: u64,
}

impl TaskTree {
    /// Fixed id of the synthesized root.
    pub const ROOT_ID: &'static str = "root";

    /// A tree containing only the synthesized root. Used when no prior
    /// state exists.
    pub fn bootstrap(now: i64) -> Self {
        let mut root = Task::new(Self::ROOT_ID, "Root", now);
        // The root is a container, not a unit of work.
        root.status = TaskStatus::Done;
        root.progress = 100;
        let mut tasks = HashMap::new();
        tasks.insert(Self::ROOT_ID.to_string(), root);
        Self {
            tasks,
            root: Self::ROOT_ID.to_string(),
            revision: 0,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    /// Number of tasks, root included.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Walk the parent chain from `id` up to the root, excluding `id`
    /// itself. Stops if the chain is broken or loops.
    pub fn ancestors<'a>(&'a self, id: &str) -> Vec<&'a str> {
        let mut chain = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut current = self.tasks.get(id).and_then(|t| t.parent.as_deref());
        while let Some(pid) = current {
            if !seen.insert(pid) {
                break;
            }
            chain.push(pid);
            current = self.tasks.get(pid).and_then(|t| t.parent.as_deref());
        }
        chain
    }

    /// True if `id` is `ancestor` or lies anywhere below it.
    pub fn is_in_subtree(&self, id: &str, ancestor: &str) -> bool {
        id == ancestor || self.ancestors(id).contains(&ancestor)
    }

    /// Validate the six structural invariants. Hierarchy checks run here;
    /// dependency acyclicity is delegated to [`graph::detect_cycle`].
    pub fn validate(&self) -> Result<()> {
        // Id consistency: map key and task id must agree.
        for (key, task) in &self.tasks {
            if key != &task.id {
                return Err(Error::validation(format!(
                    "task keyed as {key} carries id {}",
                    task.id
                )));
            }
        }

        // Exactly one root, and it is the declared one.
        let parentless: Vec<&str> = self
            .tasks
            .values()
            .filter(|t| t.parent.is_none())
            .map(|t| t.id.as_str())
            .collect();
        match parentless.as_slice() {
            [only] if *only == self.root => {}
            [only] => {
                return Err(Error::validation(format!(
                    "declared root is {} but parentless task is {only}",
                    self.root
                )));
            }
            [] => return Err(Error::validation("no root task (every task has a parent)")),
            many => {
                let mut ids: Vec<&str> = many.to_vec();
                ids.sort_unstable();
                return Err(Error::validation(format!(
                    "multiple parentless tasks: {}",
                    ids.join(", ")
                )));
            }
        }

        // Parent/child linkage: every child id resolves, and every non-root
        // task appears in exactly one children list - its parent's.
        let mut appears_in: HashMap<&str, Vec<&str>> = HashMap::new();
        for task in self.tasks.values() {
            let mut seen_children: HashSet<&str> = HashSet::new();
            for child in &task.children {
                if !self.tasks.contains_key(child) {
                    return Err(Error::validation(format!(
                        "task {} lists unknown child {child}",
                        task.id
                    )));
                }
                if !seen_children.insert(child.as_str()) {
                    return Err(Error::validation(format!(
                        "task {} lists child {child} more than once",
                        task.id
                    )));
                }
                appears_in.entry(child.as_str()).or_default().push(task.id.as_str());
            }
        }
        for task in self.tasks.values() {
            let listings = appears_in
                .get(task.id.as_str())
                .map(Vec::as_slice)
                .unwrap_or_default();
            match (&task.parent, listings) {
                (None, []) => {} // the root
                (None, parents) => {
                    return Err(Error::validation(format!(
                        "root {} is listed as a child of {}",
                        task.id,
                        parents.join(", ")
                    )));
                }
                (Some(parent), [listed]) if *listed == parent.as_str() => {
                    if !self.tasks.contains_key(parent) {
                        return Err(Error::orphan(&task.id, parent));
                    }
                }
                (Some(parent), _) => {
                    if !self.tasks.contains_key(parent) {
                        return Err(Error::orphan(&task.id, parent));
                    }
                    return Err(Error::validation(format!(
                        "task {} has parent {parent} but inconsistent child listings",
                        task.id
                    )));
                }
            }
        }

        // Acyclicity of the hierarchy: with the linkage above established,
        // a cycle is exactly a task unreachable from the root.
        let mut reached: HashSet<&str> = HashSet::new();
        let mut stack = vec![self.root.as_str()];
        while let Some(id) = stack.pop() {
            if !reached.insert(id) {
                continue;
            }
            for child in &self.tasks[id].children {
                stack.push(child.as_str());
            }
        }
        if reached.len() < self.tasks.len() {
            let mut unreached: Vec<&str> = self
                .tasks
                .keys()
                .map(String::as_str)
                .filter(|id| !reached.contains(id))
                .collect();
            unreached.sort_unstable();
            return Err(Error::HierarchyCycle {
                cycle: parent_cycle(self, unreached[0]),
            });
        }

        // Per-task field invariants.
        for task in self.tasks.values() {
            if task.title.trim().is_empty() {
                return Err(Error::validation(format!("task {} has an empty title", task.id)));
            }
            if !(0..=100).contains(&task.progress) {
                return Err(Error::validation(format!(
                    "task {} progress {} outside 0..=100",
                    task.id, task.progress
                )));
            }
            if (task.progress == 100) != (task.status == TaskStatus::Done) {
                return Err(Error::validation(format!(
                    "task {} has progress {} with status {}",
                    task.id,
                    task.progress,
                    task.status.as_str()
                )));
            }
            for field in [task.estimate_minutes, task.actual_minutes].into_iter().flatten() {
                if field < 0 {
                    return Err(Error::validation(format!(
                        "task {} has a negative duration",
                        task.id
                    )));
                }
            }
            for dep in &task.dependencies {
                if !self.tasks.contains_key(dep) {
                    return Err(Error::validation(format!(
                        "task {} depends on unknown task {dep}",
                        task.id
                    )));
                }
            }
        }

        // Dependency acyclicity.
        if let Some(cycle) = graph::detect_cycle(self) {
            return Err(Error::DependencyCycle { cycle });
        }

        Ok(())
    }
}

/// Extract the parent-chain cycle containing or trapping `start`.
fn parent_cycle(tree: &TaskTree, start: &str) -> Vec<String> {
    let mut seen: Vec<&str> = Vec::new();
    let mut current = start;
    loop {
        if let Some(pos) = seen.iter().position(|&s| s == current) {
            return seen[pos..].iter().map(|s| s.to_string()).collect();
        }
        seen.push(current);
        match tree.tasks.get(current).and_then(|t| t.parent.as_deref()) {
            Some(parent) => current = parent,
            // Chain ended without looping; report the walked path.
            None => return seen.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Owner of the canonical tree.
///
/// Readers get the last-committed immutable snapshot through an `ArcSwap`
/// and never block; writers serialize on a mutex, so at most one commit is
/// in flight and later callers queue.
pub struct TreeStore {
    snapshot: ArcSwap<TaskTree>,
    write_lock: Mutex<()>,
}

impl TreeStore {
    /// Create a store from an initial tree, validating it first.
    pub fn new(initial: TaskTree) -> Result<Self> {
        initial.validate()?;
        Ok(Self {
            snapshot: ArcSwap::from_pointee(initial),
            write_lock: Mutex::new(()),
        })
    }

    /// A store holding only the synthesized root.
    pub fn empty() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(TaskTree::bootstrap(now_ms())),
            write_lock: Mutex::new(()),
        }
    }

    /// The canonical snapshot.
    pub fn current(&self) -> Arc<TaskTree> {
        self.snapshot.load_full()
    }

    /// Atomically replace the canonical tree if the candidate satisfies all
    /// invariants; otherwise the store is left unchanged and the specific
    /// violation is returned.
    pub fn commit(&self, mut candidate: TaskTree) -> Result<Arc<TaskTree>> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        candidate.validate()?;
        candidate.revision = self.snapshot.load().revision + 1;
        let committed = Arc::new(candidate);
        self.snapshot.store(Arc::clone(&committed));
        tracing::debug!(revision = committed.revision, tasks = committed.len(), "committed tree");
        Ok(committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child(tree: &mut TaskTree, id: &str, parent: &str, now: i64) {
        let mut task = Task::new(id, format!("task {id}"), now);
        task.parent = Some(parent.to_string());
        tree.tasks.get_mut(parent).unwrap().children.push(id.to_string());
        tree.tasks.insert(id.to_string(), task);
    }

    #[test]
    fn bootstrap_tree_is_valid() {
        let tree = TaskTree::bootstrap(1);
        assert!(tree.validate().is_ok());
        assert_eq!(tree.root, TaskTree::ROOT_ID);
    }

    #[test]
    fn valid_two_level_tree() {
        let mut tree = TaskTree::bootstrap(1);
        child(&mut tree, "a", TaskTree::ROOT_ID, 2);
        child(&mut tree, "b", "a", 3);
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn missing_parent_is_orphan() {
        let mut tree = TaskTree::bootstrap(1);
        let mut task = Task::new("a", "task a", 2);
        task.parent = Some("ghost".to_string());
        tree.tasks.insert("a".to_string(), task);
        match tree.validate().unwrap_err() {
            Error::OrphanReference {
                task_id,
                missing_parent_id,
            } => {
                assert_eq!(task_id, "a");
                assert_eq!(missing_parent_id, "ghost");
            }
            other => panic!("expected OrphanReference, got {other:?}"),
        }
    }

    #[test]
    fn two_parentless_tasks_rejected() {
        let mut tree = TaskTree::bootstrap(1);
        tree.tasks.insert("stray".to_string(), Task::new("stray", "stray", 2));
        assert!(matches!(tree.validate(), Err(Error::Validation { .. })));
    }

    #[test]
    fn parent_cycle_detected_as_hierarchy_cycle() {
        let mut tree = TaskTree::bootstrap(1);
        // a and b parent each other, detached from the root.
        let mut a = Task::new("a", "a", 2);
        a.parent = Some("b".to_string());
        a.children.push("b".to_string());
        let mut b = Task::new("b", "b", 2);
        b.parent = Some("a".to_string());
        b.children.push("a".to_string());
        tree.tasks.insert("a".to_string(), a);
        tree.tasks.insert("b".to_string(), b);
        match tree.validate().unwrap_err() {
            Error::HierarchyCycle { cycle } => {
                assert_eq!(cycle.len(), 2);
                assert!(cycle.contains(&"a".to_string()));
                assert!(cycle.contains(&"b".to_string()));
            }
            other => panic!("expected HierarchyCycle, got {other:?}"),
        }
    }

    #[test]
    fn progress_status_coupling_enforced() {
        let mut tree = TaskTree::bootstrap(1);
        child(&mut tree, "a", TaskTree::ROOT_ID, 2);
        tree.tasks.get_mut("a").unwrap().progress = 100; // still pending
        assert!(matches!(tree.validate(), Err(Error::Validation { .. })));
        let a = tree.tasks.get_mut("a").unwrap();
        a.status = TaskStatus::Done;
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn unknown_dependency_rejected() {
        let mut tree = TaskTree::bootstrap(1);
        child(&mut tree, "a", TaskTree::ROOT_ID, 2);
        tree.tasks.get_mut("a").unwrap().dependencies.insert("ghost".to_string());
        assert!(matches!(tree.validate(), Err(Error::Validation { .. })));
    }

    #[test]
    fn store_commit_bumps_revision_and_swaps() {
        let store = TreeStore::empty();
        let mut candidate = (*store.current()).clone();
        child(&mut candidate, "a", TaskTree::ROOT_ID, 2);
        let committed = store.commit(candidate).unwrap();
        assert_eq!(committed.revision, 1);
        assert!(store.current().contains("a"));
    }

    #[test]
    fn rejected_commit_leaves_store_unchanged() {
        let store = TreeStore::empty();
        let before = store.current();
        let mut candidate = (*before).clone();
        let mut stray = Task::new("stray", "stray", 2);
        stray.parent = Some("ghost".to_string());
        candidate.tasks.insert("stray".to_string(), stray);
        assert!(store.commit(candidate).is_err());
        let after = store.current();
        assert_eq!(before.revision, after.revision);
        assert_eq!(before.len(), after.len());
    }

    #[test]
    fn ancestors_walks_to_root() {
        let mut tree = TaskTree::bootstrap(1);
        child(&mut tree, "a", TaskTree::ROOT_ID, 2);
        child(&mut tree, "b", "a", 3);
        assert_eq!(tree.ancestors("b"), vec!["a", TaskTree::ROOT_ID]);
        assert!(tree.is_in_subtree("b", "a"));
        assert!(!tree.is_in_subtree("a", "b"));
    }
}
