//! End-to-end tests for the load -> reconcile -> persist -> query pipeline.

use propel::config::HealthConfig;
use propel::health;
use propel::proposal::{Proposal, TaskChange};
use propel::reconcile::Engine;
use propel::schedule;
use propel::storage::JsonFileStore;
use propel::tree::{TaskTree, TreeStore};
use propel::types::{TaskPriority, TaskStatus};
use std::collections::BTreeSet;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

fn new_task(id: &str, title: &str) -> TaskChange {
    TaskChange {
        title: Some(title.to_string()),
        ..TaskChange::for_id(id)
    }
}

fn proposal(tasks: Vec<TaskChange>) -> Proposal {
    Proposal {
        based_on: None,
        tasks,
    }
}

#[test]
fn fresh_store_loads_bootstrap_tree() {
    let dir = tempfile::tempdir().unwrap();
    let storage = JsonFileStore::new(dir.path().join("tasks.json"));
    let tree = storage.load().unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree.root, TaskTree::ROOT_ID);
}

#[test]
fn commits_survive_a_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.json");

    {
        let storage = JsonFileStore::new(&path);
        let engine = Engine::new(TreeStore::new(storage.load().unwrap()).unwrap());
        let tree = engine
            .apply(&proposal(vec![
                new_task("a", "Persisted A"),
                {
                    let mut b = new_task("b", "Persisted B");
                    b.parent = Some("a".to_string());
                    b.dependencies = Some(BTreeSet::from(["a".to_string()]));
                    b
                },
            ]))
            .unwrap();
        storage.save(&tree).unwrap();
    }

    let storage = JsonFileStore::new(&path);
    let reloaded = storage.load().unwrap();
    assert_eq!(reloaded.revision, 1);
    assert_eq!(reloaded.tasks["b"].parent.as_deref(), Some("a"));
    assert!(reloaded.tasks["b"].dependencies.contains("a"));
    assert_eq!(reloaded.tasks["a"].children, vec!["b"]);
}

#[test]
fn persistence_failure_does_not_roll_back_memory() {
    let dir = tempfile::tempdir().unwrap();
    // A directory at the target path makes the rename fail.
    let path = dir.path().join("tasks.json");
    std::fs::create_dir_all(&path).unwrap();

    let engine = Engine::new(TreeStore::empty());
    let tree = engine.apply(&proposal(vec![new_task("a", "A")])).unwrap();

    let storage = JsonFileStore::new(&path);
    assert!(storage.save(&tree).is_err());
    // The canonical in-memory state still carries the commit.
    assert!(engine.store().current().contains("a"));
}

#[test]
fn plan_over_a_reconciled_tree() {
    let engine = Engine::new(TreeStore::empty());
    engine
        .apply(&proposal(vec![
            {
                let mut a = new_task("a", "High, due later");
                a.priority = Some(TaskPriority::High);
                a.due_date = Some(2 * DAY_MS);
                a
            },
            {
                let mut b = new_task("b", "Low, due sooner");
                b.priority = Some(TaskPriority::Low);
                b.due_date = Some(DAY_MS);
                b
            },
        ]))
        .unwrap();

    // No dependency between them: priority breaks the tie.
    let tree = engine.store().current();
    let ids: Vec<String> = schedule::plan(&tree)
        .unwrap()
        .into_iter()
        .map(|e| e.task_id)
        .collect();
    assert_eq!(ids, vec!["a", "b"]);
}

#[test]
fn scan_over_a_reconciled_tree() {
    let engine = Engine::new(TreeStore::empty());
    engine
        .apply(&proposal(vec![new_task("a", "Waiting"), {
            let mut b = new_task("b", "Blocker");
            b.status = Some(TaskStatus::InProgress);
            b
        }]))
        .unwrap();
    engine
        .apply(&proposal(vec![{
            let mut a = TaskChange::for_id("a");
            a.dependencies = Some(BTreeSet::from(["b".to_string()]));
            a
        }]))
        .unwrap();

    let tree = engine.store().current();
    let report = health::scan(&tree, propel::types::now_ms(), &HealthConfig::default());
    assert_eq!(report.blocked, vec!["a"]);
    assert_eq!(report.summary.active, 2);
}

#[test]
fn readers_see_immutable_snapshots() {
    let engine = Engine::new(TreeStore::empty());
    let before = engine.store().current();
    engine.apply(&proposal(vec![new_task("a", "A")])).unwrap();
    // The snapshot taken before the commit is unchanged.
    assert!(!before.contains("a"));
    assert!(engine.store().current().contains("a"));
}
