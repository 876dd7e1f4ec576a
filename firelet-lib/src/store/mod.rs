//! Tabular store (component C3): loads/saves the five authoritative tables
//! from a repository directory, tracks a dirty marker, and offers row-level
//! mutation used by the object model (component C2).
//!
//! Two backends share this module's record format and row operations:
//! [`simple`] (no history) and [`versioned`] (git-backed history, up to 30
//! recent versions, `rollback(n)`).

mod record;
pub mod simple;
pub mod versioned;

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::model::{Host, HostGroup, Network, Rule, Service, TableId};

pub const LOCK_FILE: &str = "lock";

#[derive(Debug, Error)]
pub enum Error {
    #[error("persistence error reading `{path}`: {source}")]
    ReadIO { path: PathBuf, source: std::io::Error },
    #[error("persistence error writing `{path}`: {source}")]
    WriteIO { path: PathBuf, source: std::io::Error },
    #[error("malformed record in `{path}` line {line}: {reason}")]
    MalformedRecord { path: PathBuf, line: usize, reason: String },
    #[error("version history error: {0}")]
    History(String),
    #[error("version {0} does not exist")]
    NoSuchVersion(usize),
}

/// In-memory aggregate of the five authoritative tables plus the dirty
/// marker. Row mutations replace rows rather than aliasing them, and always
/// set `dirty`.
#[derive(Debug, Default, Clone)]
pub struct Tables {
    pub rules: Vec<Rule>,
    pub hosts: Vec<Host>,
    pub hostgroups: Vec<HostGroup>,
    pub services: Vec<Service>,
    pub networks: Vec<Network>,
}

impl Tables {
    /// Removes a row from `table` at `idx`. Out-of-range indices are no-ops.
    pub fn delete(&mut self, table: TableId, idx: usize) {
        match table {
            TableId::Rules => remove(&mut self.rules, idx),
            TableId::Hosts => remove(&mut self.hosts, idx),
            TableId::HostGroups => remove(&mut self.hostgroups, idx),
            TableId::Services => remove(&mut self.services, idx),
            TableId::Networks => remove(&mut self.networks, idx),
        }
    }

    /// Swaps rule `idx` with its predecessor. Out-of-range or `idx == 0` is a no-op.
    pub fn move_up(&mut self, idx: usize) {
        if idx > 0 && idx < self.rules.len() {
            self.rules.swap(idx, idx - 1);
        }
    }

    /// Swaps rule `idx` with its successor. Out-of-range is a no-op.
    pub fn move_down(&mut self, idx: usize) {
        if idx + 1 < self.rules.len() {
            self.rules.swap(idx, idx + 1);
        }
    }
}

fn remove<T>(v: &mut Vec<T>, idx: usize) {
    if idx < v.len() {
        v.remove(idx);
    }
}

/// One entry of `version_list`: `(timestamp, id, author, message)`.
pub type Version = (String, String, String, String);

/// Unifies [`simple::Store`] and [`versioned::Store`] behind the handful of
/// operations the orchestrator (component C8) needs, so it is written once
/// against either backend.
pub trait Backend {
    fn tables(&self) -> &Tables;
    fn tables_mut(&mut self) -> &mut Tables;
    fn save_needed(&self) -> bool;
    fn save(&mut self) -> Result<(), Error>;
    fn reset(&mut self) -> Result<(), Error>;
    fn rollback(&mut self, n: usize) -> Result<(), Error>;
    fn version_list(&self) -> Vec<Version>;
}

impl Backend for simple::Store {
    fn tables(&self) -> &Tables {
        &self.tables
    }
    fn tables_mut(&mut self) -> &mut Tables {
        &mut self.tables
    }
    fn save_needed(&self) -> bool {
        simple::Store::save_needed(self)
    }
    fn save(&mut self) -> Result<(), Error> {
        simple::Store::save(self)
    }
    fn reset(&mut self) -> Result<(), Error> {
        simple::Store::reset(self)
    }
    fn rollback(&mut self, n: usize) -> Result<(), Error> {
        simple::Store::rollback(self, n)
    }
    fn version_list(&self) -> Vec<Version> {
        simple::Store::version_list(self)
    }
}

impl Backend for versioned::Store {
    fn tables(&self) -> &Tables {
        &self.tables
    }
    fn tables_mut(&mut self) -> &mut Tables {
        &mut self.tables
    }
    fn save_needed(&self) -> bool {
        versioned::Store::save_needed(self)
    }
    fn save(&mut self) -> Result<(), Error> {
        versioned::Store::save(self)
    }
    fn reset(&mut self) -> Result<(), Error> {
        versioned::Store::reset(self)
    }
    fn rollback(&mut self, n: usize) -> Result<(), Error> {
        versioned::Store::rollback(self, n)
    }
    fn version_list(&self) -> Vec<Version> {
        versioned::Store::version_list(self)
    }
}

pub(crate) fn table_path(repodir: &Path, table: &str) -> PathBuf {
    repodir.join(format!("{table}.csv"))
}

pub(crate) fn lock_path(repodir: &Path) -> PathBuf {
    repodir.join(LOCK_FILE)
}

/// Loads all five tables from `repodir`. A missing file loads as an empty
/// table, per `spec.md` §4.3's error conditions.
pub(crate) fn load_tables(repodir: &Path) -> Result<Tables, Error> {
    let rules = record::parse_rules(&record::rules_file(repodir), &record::load_lines(&record::rules_file(repodir))?)?;
    let hosts = record::parse_hosts(&record::hosts_file(repodir), &record::load_lines(&record::hosts_file(repodir))?)?;
    let hostgroups = record::parse_hostgroups(
        &record::hostgroups_file(repodir),
        &record::load_lines(&record::hostgroups_file(repodir))?,
    )?;
    let services =
        record::parse_services(&record::services_file(repodir), &record::load_lines(&record::services_file(repodir))?)?;
    let networks =
        record::parse_networks(&record::networks_file(repodir), &record::load_lines(&record::networks_file(repodir))?)?;
    Ok(Tables { rules, hosts, hostgroups, services, networks })
}

pub(crate) fn save_tables(repodir: &Path, tables: &Tables) -> Result<(), Error> {
    record::write_lines(&record::rules_file(repodir), &record::format_rules(&tables.rules))?;
    record::write_lines(&record::hosts_file(repodir), &record::format_hosts(&tables.hosts))?;
    record::write_lines(&record::hostgroups_file(repodir), &record::format_hostgroups(&tables.hostgroups))?;
    record::write_lines(&record::services_file(repodir), &record::format_services(&tables.services))?;
    record::write_lines(&record::networks_file(repodir), &record::format_networks(&tables.networks))?;
    Ok(())
}
