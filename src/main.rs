//! propel - task tree manager.
//!
//! Loads the persisted tree, routes commands through the reconciliation
//! engine, and persists the new canonical tree after successful commits.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::Parser;
use propel::cli::{AddArgs, Cli, Command};
use propel::config::AppConfig;
use propel::proposal::{Proposal, TaskChange};
use propel::reconcile::Engine;
use propel::storage::JsonFileStore;
use propel::tree::TreeStore;
use propel::types::{TaskStatus, now_ms};
use propel::{format, health, schedule};
use std::collections::BTreeSet;
use std::io::Read;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::load(cli.config.as_deref())?;
    let data_file = cli.data.clone().unwrap_or_else(|| config.resolve_data_file());
    let storage = JsonFileStore::new(data_file);

    let initial = storage.load().context("loading task tree")?;
    let engine = Engine::new(TreeStore::new(initial)?);

    match cli.command {
        Command::Show => {
            print!("{}", format::format_tree(&engine.store().current()));
        }
        Command::Add(args) => {
            let proposal = add_proposal(&args)?;
            let id = proposal.tasks[0].id.clone();
            apply_and_persist(&engine, &storage, &proposal)?;
            println!("added {id}");
        }
        Command::Done { id } => {
            let proposal = status_proposal(&engine, &id, TaskStatus::Done)?;
            apply_and_persist(&engine, &storage, &proposal)?;
            println!("done {id}");
        }
        Command::Cancel { id } => {
            let proposal = status_proposal(&engine, &id, TaskStatus::Cancelled)?;
            apply_and_persist(&engine, &storage, &proposal)?;
            println!("cancelled {id}");
        }
        Command::Apply { file } => {
            let raw = read_proposal_source(&file)?;
            let proposal = Proposal::from_json(&raw)?;
            let tree = apply_and_persist(&engine, &storage, &proposal)?;
            println!("merged {} change(s), revision {}", proposal.tasks.len(), tree.revision);
        }
        Command::Plan => {
            let tree = engine.store().current();
            let entries = schedule::plan(&tree)?;
            print!("{}", format::format_plan(&tree, &entries));
        }
        Command::Scan { json } => {
            let tree = engine.store().current();
            let report = health::scan(&tree, now_ms(), &config.health);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", format::format_report(&tree, &report));
            }
        }
    }

    Ok(())
}

/// Commit the proposal and persist the result. Persistence failure is
/// reported but the in-memory commit stands; a retry re-saves it.
fn apply_and_persist(
    engine: &Engine,
    storage: &JsonFileStore,
    proposal: &Proposal,
) -> Result<std::sync::Arc<propel::tree::TaskTree>> {
    let tree = engine.apply(proposal)?;
    if let Err(e) = storage.save(&tree) {
        warn!(error = %e, "commit succeeded but persistence failed; re-run to retry");
        return Err(e).context("persisting task tree");
    }
    Ok(tree)
}

fn add_proposal(args: &AddArgs) -> Result<Proposal> {
    let due_date = args.due.as_deref().map(parse_due_date).transpose()?;
    let change = TaskChange {
        title: Some(args.title.clone()),
        description: args.description.clone(),
        priority: args.priority.map(Into::into),
        due_date,
        estimate_minutes: args.estimate,
        parent: args.parent.clone(),
        dependencies: if args.after.is_empty() {
            None
        } else {
            Some(args.after.iter().cloned().collect::<BTreeSet<_>>())
        },
        ..TaskChange::for_id(Uuid::now_v7().to_string())
    };
    Ok(Proposal {
        based_on: None,
        tasks: vec![change],
    })
}

fn status_proposal(engine: &Engine, id: &str, status: TaskStatus) -> Result<Proposal> {
    if !engine.store().current().contains(id) {
        bail!("no such task: {id}");
    }
    let change = TaskChange {
        status: Some(status),
        ..TaskChange::for_id(id)
    };
    Ok(Proposal {
        based_on: None,
        tasks: vec![change],
    })
}

fn read_proposal_source(file: &str) -> Result<String> {
    if file == "-" {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("reading proposal from stdin")?;
        Ok(raw)
    } else {
        std::fs::read_to_string(file).with_context(|| format!("reading proposal {file}"))
    }
}

/// Parse YYYY-MM-DD as end-of-day UTC.
fn parse_due_date(s: &str) -> Result<i64> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("invalid due date {s:?}, expected YYYY-MM-DD"))?;
    let dt = date
        .and_hms_opt(23, 59, 59)
        .context("invalid due date time")?;
    Ok(dt.and_utc().timestamp_millis())
}
