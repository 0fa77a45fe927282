//! Dependency graph: cycle detection and topological ordering.
//!
//! The dependency relation is a directed graph over task ids, separate from
//! the parent/child hierarchy. An edge `a -> b` means `a` depends on (is
//! blocked by) `b`. The graph is built lazily from a tree's dependency sets;
//! nothing here mutates the tree.

use crate::error::{Error, Result};
use crate::tree::TaskTree;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Sort key for zero-in-degree ties in [`topological_order`]: priority
/// (critical first), then due date ascending with absent dates last, then
/// creation time, then id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct OrderKey {
    priority_rank: u8,
    due: (bool, i64),
    created_at: i64,
    id: String,
}

impl OrderKey {
    fn for_task(tree: &TaskTree, id: &str) -> Self {
        let task = &tree.tasks[id];
        Self {
            priority_rank: task.priority.rank(),
            // (true, _) sorts after every (false, due), so no-due-date last
            due: match task.due_date {
                Some(due) => (false, due),
                None => (true, 0),
            },
            created_at: task.created_at,
            id: id.to_string(),
        }
    }
}

/// Find a dependency cycle anywhere in the tree.
///
/// Depth-first traversal tracking the recursion stack; an edge back to a
/// node currently on the stack closes a cycle. Returns the full ordered
/// cycle for diagnostics, or `None` if the dependency relation is acyclic.
pub fn detect_cycle(tree: &TaskTree) -> Option<Vec<String>> {
    let ids: HashSet<&str> = tree.tasks.keys().map(String::as_str).collect();
    detect_cycle_in(tree, &ids)
}

/// Cycle detection restricted to a subset of task ids. Edges leaving the
/// subset are ignored.
fn detect_cycle_in(tree: &TaskTree, ids: &HashSet<&str>) -> Option<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        OnStack,
        Finished,
    }

    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut path: Vec<&str> = Vec::new();

    // Sorted roots keep the reported cycle deterministic.
    let mut starts: Vec<&str> = ids.iter().copied().collect();
    starts.sort_unstable();

    for start in starts {
        if marks.contains_key(start) {
            continue;
        }
        if let Some(cycle) = visit(tree, ids, start, &mut marks, &mut path) {
            return Some(cycle);
        }
    }
    return None;

    fn visit<'a>(
        tree: &'a TaskTree,
        ids: &HashSet<&str>,
        node: &'a str,
        marks: &mut HashMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        marks.insert(node, Mark::OnStack);
        path.push(node);

        for dep in &tree.tasks[node].dependencies {
            let dep = dep.as_str();
            if !ids.contains(dep) {
                continue;
            }
            match marks.get(dep) {
                Some(Mark::OnStack) => {
                    let pos = path.iter().position(|&n| n == dep).unwrap_or(0);
                    return Some(path[pos..].iter().map(|s| s.to_string()).collect());
                }
                Some(Mark::Finished) => {}
                None => {
                    if let Some(cycle) = visit(tree, ids, dep, marks, path) {
                        return Some(cycle);
                    }
                }
            }
        }

        path.pop();
        marks.insert(node, Mark::Finished);
        None
    }
}

/// Compute a deterministic topological order over the given task ids.
///
/// Kahn's algorithm: repeatedly emit a zero-in-degree node, breaking ties
/// with [`OrderKey`]. A task's in-degree counts only dependencies that are
/// themselves in `ids`; edges to excluded tasks carry no ordering weight.
/// Fails with [`Error::DependencyCycle`] when no order exists.
pub fn topological_order<'a, I>(tree: &TaskTree, ids: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = &'a str>,
{
    let included: HashSet<&str> = ids.into_iter().collect();

    // dependents[d] = included tasks that depend on d
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut in_degree: HashMap<&str, usize> = HashMap::new();

    for &id in &included {
        let mut degree = 0;
        for dep in &tree.tasks[id].dependencies {
            if included.contains(dep.as_str()) {
                degree += 1;
                dependents.entry(dep.as_str()).or_default().push(id);
            }
        }
        in_degree.insert(id, degree);
    }

    let mut ready: BinaryHeap<Reverse<OrderKey>> = in_degree
        .iter()
        .filter(|(_, &d)| d == 0)
        .map(|(&id, _)| Reverse(OrderKey::for_task(tree, id)))
        .collect();

    let mut order = Vec::with_capacity(included.len());
    while let Some(Reverse(key)) = ready.pop() {
        order.push(key.id.clone());
        if let Some(deps) = dependents.get(key.id.as_str()) {
            for &dependent in deps {
                let degree = in_degree
                    .get_mut(dependent)
                    .expect("dependent is in the included set");
                *degree -= 1;
                if *degree == 0 {
                    ready.push(Reverse(OrderKey::for_task(tree, dependent)));
                }
            }
        }
    }

    if order.len() < included.len() {
        // Every remaining node sits on or behind a cycle; report it.
        let remaining: HashSet<&str> = included
            .iter()
            .copied()
            .filter(|id| !order.iter().any(|o| o.as_str() == *id))
            .collect();
        let cycle = detect_cycle_in(tree, &remaining)
            .unwrap_or_else(|| remaining.iter().map(|s| s.to_string()).collect());
        return Err(Error::DependencyCycle { cycle });
    }

    Ok(order)
}
