//! Risk analysis over the task tree.
//!
//! A scan is a read-only aggregation: it classifies every non-terminal task
//! and never mutates the tree. Done and cancelled tasks are skipped but
//! still counted in the summary.

use crate::config::HealthConfig;
use crate::tree::TaskTree;
use crate::types::TaskStatus;
use serde::Serialize;

const HOUR_MS: i64 = 60 * 60 * 1000;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Aggregate counts over the whole tree (root excluded).
#[derive(Debug, Clone, Default, Serialize)]
pub struct Summary {
    pub total: usize,
    pub active: usize,
    pub done: usize,
    pub cancelled: usize,
}

/// Output of a health scan.
#[derive(Debug, Clone, Serialize)]
pub struct RiskReport {
    pub generated_at: i64,
    pub summary: Summary,
    /// Due date strictly before the scan time.
    pub overdue: Vec<String>,
    /// Not updated within the stale threshold.
    pub stale: Vec<String>,
    /// At least one dependency not done.
    pub blocked: Vec<String>,
    /// Due inside the lookahead window with progress behind the linear
    /// elapsed-time estimate.
    pub at_risk: Vec<String>,
}

impl RiskReport {
    pub fn is_clean(&self) -> bool {
        self.overdue.is_empty()
            && self.stale.is_empty()
            && self.blocked.is_empty()
            && self.at_risk.is_empty()
    }
}

/// Classify every non-cancelled, non-done task at time `now`.
pub fn scan(tree: &TaskTree, now: i64, config: &HealthConfig) -> RiskReport {
    let stale_after = config.stale_after_days * DAY_MS;
    let lookahead = config.lookahead_hours * HOUR_MS;

    let mut report = RiskReport {
        generated_at: now,
        summary: Summary::default(),
        overdue: Vec::new(),
        stale: Vec::new(),
        blocked: Vec::new(),
        at_risk: Vec::new(),
    };

    for task in tree.tasks.values() {
        if task.id == tree.root {
            continue;
        }
        report.summary.total += 1;
        match task.status {
            TaskStatus::Done => {
                report.summary.done += 1;
                continue;
            }
            TaskStatus::Cancelled => {
                report.summary.cancelled += 1;
                continue;
            }
            _ => report.summary.active += 1,
        }

        if let Some(due) = task.due_date {
            if due < now {
                report.overdue.push(task.id.clone());
            } else if due - now <= lookahead {
                if let Some(expected) = expected_progress(task.created_at, due, now) {
                    if (task.progress as f64) < expected * config.min_progress_ratio {
                        report.at_risk.push(task.id.clone());
                    }
                }
            }
        }

        if now - task.updated_at > stale_after {
            report.stale.push(task.id.clone());
        }

        let blocked = task.dependencies.iter().any(|dep| {
            tree.get(dep)
                .map(|d| d.status != TaskStatus::Done)
                .unwrap_or(true)
        });
        if blocked {
            report.blocked.push(task.id.clone());
        }
    }

    report.overdue.sort_unstable();
    report.stale.sort_unstable();
    report.blocked.sort_unstable();
    report.at_risk.sort_unstable();
    report
}

/// Linear progress estimate: the elapsed fraction of created->due scaled to
/// 0..=100. `None` when the window is empty or inverted.
fn expected_progress(created_at: i64, due: i64, now: i64) -> Option<f64> {
    if due <= created_at {
        return None;
    }
    let fraction = (now - created_at) as f64 / (due - created_at) as f64;
    Some((fraction * 100.0).clamp(0.0, 100.0))
}
