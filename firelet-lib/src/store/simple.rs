//! Simple store backend (`spec.md` §4.3 item 1): five whitespace-delimited
//! files, no version history, dirty tracked by the presence of `lock`.

use std::path::{Path, PathBuf};

use super::{record, Error, Tables, Version};
use crate::model::TableId;

#[derive(Debug)]
pub struct Store {
    repodir: PathBuf,
    pub tables: Tables,
    dirty: bool,
}

impl Store {
    pub fn open(repodir: impl AsRef<Path>) -> Result<Store, Error> {
        let repodir = repodir.as_ref().to_path_buf();
        std::fs::create_dir_all(&repodir).map_err(|source| Error::WriteIO { path: repodir.clone(), source })?;
        let tables = super::load_tables(&repodir)?;
        let dirty = super::lock_path(&repodir).exists();
        Ok(Store { repodir, tables, dirty })
    }

    pub fn save_needed(&self) -> bool {
        self.dirty
    }

    pub fn delete(&mut self, table: TableId, idx: usize) {
        self.tables.delete(table, idx);
        self.mark_dirty();
    }

    pub fn move_up(&mut self, idx: usize) {
        self.tables.move_up(idx);
        self.mark_dirty();
    }

    pub fn move_down(&mut self, idx: usize) {
        self.tables.move_down(idx);
        self.mark_dirty();
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
        let _ = std::fs::write(super::lock_path(&self.repodir), b"");
    }

    /// Mem to disk: writes all five tables, clears the dirty marker.
    pub fn save(&mut self) -> Result<(), Error> {
        if !self.dirty {
            return Ok(());
        }
        super::save_tables(&self.repodir, &self.tables)?;
        self.dirty = false;
        let lock = super::lock_path(&self.repodir);
        if lock.exists() {
            std::fs::remove_file(&lock).map_err(|source| Error::WriteIO { path: lock, source })?;
        }
        Ok(())
    }

    /// Disk to mem: discards in-memory changes, clears the dirty marker.
    pub fn reset(&mut self) -> Result<(), Error> {
        self.tables = super::load_tables(&self.repodir)?;
        self.dirty = false;
        let lock = super::lock_path(&self.repodir);
        if lock.exists() {
            std::fs::remove_file(&lock).map_err(|source| Error::WriteIO { path: lock, source })?;
        }
        Ok(())
    }

    /// No history kept: a single synthetic header row, as the original's
    /// `DumbFireSet.version_list` returns.
    pub fn version_list(&self) -> Vec<Version> {
        vec![(
            "timestamp".to_string(),
            "version id".to_string(),
            "author".to_string(),
            "changelog".to_string(),
        )]
    }

    pub fn rollback(&mut self, _n: usize) -> Result<(), Error> {
        Err(Error::History("rollback unavailable: store has no version history".to_string()))
    }
}
