//! Versioned store backend (`spec.md` §4.3 item 2): the same five files,
//! backed by a git working tree, one commit per `save`. Grounded in
//! `original_source/lib/flcore.py`'s `GitFireSet`, which wraps the same
//! five CSV files in a `git.Repo` and treats `save_needed` as
//! `repo.is_dirty`.

use git2::{Repository, Signature};
use std::path::{Path, PathBuf};

use super::{Error, Tables, Version};
use crate::model::TableId;

const FILES: [&str; 5] = ["rules.csv", "hosts.csv", "hostgroups.csv", "services.csv", "networks.csv"];
const MAX_VERSIONS: usize = 30;

pub struct Store {
    repodir: PathBuf,
    repo: Repository,
    pub tables: Tables,
}

impl Store {
    pub fn open(repodir: impl AsRef<Path>) -> Result<Store, Error> {
        let repodir = repodir.as_ref().to_path_buf();
        std::fs::create_dir_all(&repodir).map_err(|source| Error::WriteIO { path: repodir.clone(), source })?;
        let repo = match Repository::open(&repodir) {
            Ok(repo) => repo,
            Err(_) => Repository::init(&repodir).map_err(|e| Error::History(e.to_string()))?,
        };
        let tables = super::load_tables(&repodir)?;
        Ok(Store { repodir, repo, tables })
    }

    pub fn save_needed(&self) -> bool {
        match self.repo.statuses(None) {
            Ok(statuses) => !statuses.is_empty(),
            Err(_) => true,
        }
    }

    pub fn delete(&mut self, table: TableId, idx: usize) {
        self.tables.delete(table, idx);
    }

    pub fn move_up(&mut self, idx: usize) {
        self.tables.move_up(idx);
    }

    pub fn move_down(&mut self, idx: usize) {
        self.tables.move_down(idx);
    }

    /// Mem to disk, committed as a new version.
    pub fn save(&mut self) -> Result<(), Error> {
        super::save_tables(&self.repodir, &self.tables)?;
        if !self.save_needed() {
            return Ok(());
        }
        self.commit("firelet: save configuration")
    }

    /// Disk to mem: checks out `HEAD` forcefully, discarding in-memory and
    /// working-tree changes, then reloads.
    pub fn reset(&mut self) -> Result<(), Error> {
        let mut checkout = git2::build::CheckoutBuilder::new();
        checkout.force();
        self.repo
            .checkout_head(Some(&mut checkout))
            .map_err(|e| Error::History(e.to_string()))?;
        self.tables = super::load_tables(&self.repodir)?;
        Ok(())
    }

    /// Up to the 30 most recent versions, walking back from `HEAD`.
    pub fn version_list(&self) -> Vec<Version> {
        let mut out = Vec::new();
        let Ok(mut revwalk) = self.repo.revwalk() else {
            return out;
        };
        if revwalk.push_head().is_err() {
            return out;
        }
        for oid in revwalk.take(MAX_VERSIONS) {
            let Ok(oid) = oid else { continue };
            let Ok(commit) = self.repo.find_commit(oid) else { continue };
            let timestamp = commit.time().seconds().to_string();
            let id = oid.to_string();
            let author = commit.author().name().unwrap_or("unknown").to_string();
            let message = commit.message().unwrap_or("").trim().to_string();
            out.push((timestamp, id, author, message));
        }
        out
    }

    /// Checks out the *n*th version back from `HEAD` (0 == current) and reloads.
    pub fn rollback(&mut self, n: usize) -> Result<(), Error> {
        let mut revwalk = self.repo.revwalk().map_err(|e| Error::History(e.to_string()))?;
        revwalk.push_head().map_err(|e| Error::History(e.to_string()))?;
        let oid = revwalk
            .nth(n)
            .ok_or(Error::NoSuchVersion(n))?
            .map_err(|e| Error::History(e.to_string()))?;
        let commit = self.repo.find_commit(oid).map_err(|e| Error::History(e.to_string()))?;
        let object = commit.as_object();
        let mut checkout = git2::build::CheckoutBuilder::new();
        checkout.force();
        self.repo
            .reset(object, git2::ResetType::Hard, Some(&mut checkout))
            .map_err(|e| Error::History(e.to_string()))?;
        self.tables = super::load_tables(&self.repodir)?;
        Ok(())
    }

    fn commit(&mut self, message: &str) -> Result<(), Error> {
        let mut index = self.repo.index().map_err(|e| Error::History(e.to_string()))?;
        for file in FILES {
            if self.repodir.join(file).exists() {
                index.add_path(Path::new(file)).map_err(|e| Error::History(e.to_string()))?;
            }
        }
        index.write().map_err(|e| Error::History(e.to_string()))?;
        let tree_id = index.write_tree().map_err(|e| Error::History(e.to_string()))?;
        let tree = self.repo.find_tree(tree_id).map_err(|e| Error::History(e.to_string()))?;
        let sig = Signature::now("firelet", "firelet@localhost").map_err(|e| Error::History(e.to_string()))?;
        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .map_err(|e| Error::History(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Host;

    #[test]
    fn first_save_creates_a_commit() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open(dir.path()).unwrap();
        store.tables.hosts.push(Host { name: "h1".into(), iface: "eth0".into(), address: 1 });
        store.save().unwrap();
        assert_eq!(store.version_list().len(), 1);
    }

    #[test]
    fn second_save_adds_another_version() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open(dir.path()).unwrap();
        store.tables.hosts.push(Host { name: "h1".into(), iface: "eth0".into(), address: 1 });
        store.save().unwrap();
        store.tables.hosts.push(Host { name: "h2".into(), iface: "eth0".into(), address: 2 });
        store.save().unwrap();
        assert_eq!(store.version_list().len(), 2);
    }

    #[test]
    fn rollback_restores_previous_version_contents() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open(dir.path()).unwrap();
        store.tables.hosts.push(Host { name: "h1".into(), iface: "eth0".into(), address: 1 });
        store.save().unwrap();
        store.tables.hosts.push(Host { name: "h2".into(), iface: "eth0".into(), address: 2 });
        store.save().unwrap();

        store.rollback(1).unwrap();
        assert_eq!(store.tables.hosts.len(), 1);
        assert_eq!(store.tables.hosts[0].name, "h1");
    }

    #[test]
    fn rollback_out_of_range_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open(dir.path()).unwrap();
        store.tables.hosts.push(Host { name: "h1".into(), iface: "eth0".into(), address: 1 });
        store.save().unwrap();
        assert!(store.rollback(5).is_err());
    }
}
