//! Text rendering of trees, plans, and risk reports for the CLI.

use crate::health::RiskReport;
use crate::schedule::PlanEntry;
use crate::tree::TaskTree;
use crate::types::{Task, TaskPriority};
use chrono::{TimeZone, Utc};

/// Render the tree as an indented outline, children in stored order.
pub fn format_tree(tree: &TaskTree) -> String {
    let mut out = String::new();
    let root = &tree.tasks[&tree.root];
    out.push_str(&format!("# Tasks ({})\n", tree.len() - 1));
    for child in &root.children {
        format_subtree(tree, child, 0, &mut out);
    }
    if root.children.is_empty() {
        out.push_str("(empty)\n");
    }
    out
}

fn format_subtree(tree: &TaskTree, id: &str, depth: usize, out: &mut String) {
    let task = &tree.tasks[id];
    out.push_str(&"  ".repeat(depth));
    out.push_str(&format_task_line(task));
    out.push('\n');
    for child in &task.children {
        format_subtree(tree, child, depth + 1, out);
    }
}

/// One task as a single outline line.
fn format_task_line(task: &Task) -> String {
    let marker = match task.priority {
        TaskPriority::Critical => "!!! ",
        TaskPriority::High => "!! ",
        TaskPriority::Medium | TaskPriority::Low => "",
    };
    let due = task
        .due_date
        .map(|d| format!(" due {}", format_date(d)))
        .unwrap_or_default();
    let deps = if task.dependencies.is_empty() {
        String::new()
    } else {
        format!(" [after {}]", task.dependencies.iter().cloned().collect::<Vec<_>>().join(", "))
    };
    format!(
        "- {}{} `{}` ({}, {}%){}{}",
        marker,
        task.title,
        task.id,
        task.status.as_str(),
        task.progress,
        due,
        deps,
    )
}

/// Render an execution plan, flagging entries that are not yet actionable.
pub fn format_plan(tree: &TaskTree, entries: &[PlanEntry]) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Plan ({} tasks)\n", entries.len()));
    for (i, entry) in entries.iter().enumerate() {
        let task = &tree.tasks[&entry.task_id];
        let flag = if entry.blocked { " [blocked]" } else { "" };
        out.push_str(&format!(
            "{}. {} `{}` ({}){}\n",
            i + 1,
            task.title,
            task.id,
            task.priority.as_str(),
            flag,
        ));
    }
    out
}

/// Render a risk report as grouped sections.
pub fn format_report(tree: &TaskTree, report: &RiskReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "# Health ({} active / {} done / {} cancelled of {})\n",
        report.summary.active, report.summary.done, report.summary.cancelled, report.summary.total,
    ));
    if report.is_clean() {
        out.push_str("No risks detected.\n");
        return out;
    }
    for (label, ids) in [
        ("Overdue", &report.overdue),
        ("At risk", &report.at_risk),
        ("Blocked", &report.blocked),
        ("Stale", &report.stale),
    ] {
        if ids.is_empty() {
            continue;
        }
        out.push_str(&format!("\n## {label} ({})\n", ids.len()));
        for id in ids {
            if let Some(task) = tree.get(id) {
                out.push_str(&format!("- {} `{}`\n", task.title, id));
            }
        }
    }
    out
}

fn format_date(ms: i64) -> String {
    match Utc.timestamp_millis_opt(ms).single() {
        Some(dt) => dt.format("%Y-%m-%d").to_string(),
        None => ms.to_string(),
    }
}
