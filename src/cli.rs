//! CLI command definitions.
//!
//! The main entry point is the `Cli` struct with clap derive subcommands.
//! Commands either read the tree (`show`, `plan`, `scan`) or build a
//! proposal and push it through the reconciliation engine (`add`, `done`,
//! `cancel`, `apply`).

use crate::types::TaskPriority;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Task tree manager: reconciles proposed changes into a canonical tree,
/// plans execution order, and flags risks.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the tasks data file (overrides config)
    #[arg(short, long, global = true)]
    pub data: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the task tree
    Show,

    /// Add a single task
    Add(AddArgs),

    /// Mark a task done
    Done {
        /// Task id
        id: String,
    },

    /// Cancel a task (kept for history, excluded from planning)
    Cancel {
        /// Task id
        id: String,
    },

    /// Merge a proposal file (JSON; `-` for stdin) into the tree
    Apply {
        /// Proposal file path, or `-` to read stdin
        file: String,
    },

    /// Print the dependency-ordered execution plan
    Plan,

    /// Scan for overdue, stale, blocked, and at-risk tasks
    Scan {
        /// Emit the raw report as JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

/// Arguments for `add`.
#[derive(clap::Args, Debug)]
pub struct AddArgs {
    /// Task title
    pub title: String,

    /// Parent task id (defaults to the root)
    #[arg(short, long)]
    pub parent: Option<String>,

    /// Priority
    #[arg(long, value_enum)]
    pub priority: Option<CliPriority>,

    /// Due date, YYYY-MM-DD (UTC)
    #[arg(long)]
    pub due: Option<String>,

    /// Description text
    #[arg(long)]
    pub description: Option<String>,

    /// Estimated duration in minutes
    #[arg(long)]
    pub estimate: Option<i64>,

    /// Task ids this task depends on (repeatable)
    #[arg(long = "after")]
    pub after: Vec<String>,
}

/// Priority as a CLI value.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl From<CliPriority> for TaskPriority {
    fn from(p: CliPriority) -> Self {
        match p {
            CliPriority::Low => TaskPriority::Low,
            CliPriority::Medium => TaskPriority::Medium,
            CliPriority::High => TaskPriority::High,
            CliPriority::Critical => TaskPriority::Critical,
        }
    }
}
