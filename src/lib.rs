//! propel - task-tree reconciliation engine.
//!
//! The canonical task hierarchy lives in a [`tree::TreeStore`]; externally
//! produced proposals ([`proposal::Proposal`]) are merged through the
//! [`reconcile::Engine`] as validated, all-or-nothing commits. The
//! [`schedule`] and [`health`] modules are read-only consumers of committed
//! snapshots.

pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod graph;
pub mod health;
pub mod proposal;
pub mod reconcile;
pub mod schedule;
pub mod storage;
pub mod tree;
pub mod types;
