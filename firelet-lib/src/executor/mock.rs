//! File-backed transport (`spec.md` §4.7 "Mock transport"): substitutes
//! `iptables-save-<host>` / `ip-addr-show-<host>` files for real SSH
//! sessions, so the fetch/compile/project/deliver/activate pipeline is
//! exercisable without a fleet. Direct analogue of
//! `original_source/firelet/flssh.py`'s `MockSSHConnector`.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use super::{build_restore_block, Error, Executor, FetchResult};
use crate::dump;

#[derive(Clone, Debug)]
pub struct MockExecutor {
    base_dir: PathBuf,
}

impl MockExecutor {
    pub fn new(base_dir: impl Into<PathBuf>) -> MockExecutor {
        MockExecutor { base_dir: base_dir.into() }
    }

    fn save_path(&self, host: &str) -> PathBuf {
        self.base_dir.join(format!("iptables-save-{host}"))
    }

    fn addr_path(&self, host: &str) -> PathBuf {
        self.base_dir.join(format!("ip-addr-show-{host}"))
    }

    fn pending_path(&self, host: &str) -> PathBuf {
        self.base_dir.join(format!(".pending-{host}"))
    }
}

async fn read_lines(path: &Path) -> Result<Vec<String>, Error> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(content.lines().map(str::to_string).collect())
}

impl Executor for MockExecutor {
    async fn fetch(&self, host: &str, _address: Ipv4Addr) -> Result<FetchResult, Error> {
        let save_lines = read_lines(&self.save_path(host)).await?;
        let dump = dump::parse_iptables_save(&save_lines, host)?;
        let addr_lines = read_lines(&self.addr_path(host)).await?;
        let interfaces = dump::parse_ip_addr_show(&addr_lines);
        Ok((dump, interfaces))
    }

    async fn deliver(&self, host: &str, _address: Ipv4Addr, directives: &[String]) -> Result<(), Error> {
        let block = build_restore_block(host, directives);
        tokio::fs::create_dir_all(&self.base_dir).await?;
        tokio::fs::write(self.pending_path(host), block).await?;
        Ok(())
    }

    async fn activate(&self, host: &str, _address: Ipv4Addr) -> Result<(), Error> {
        let pending = self.pending_path(host);
        if tokio::fs::try_exists(&pending).await? {
            tokio::fs::rename(&pending, self.save_path(host)).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn addr() -> Ipv4Addr {
        "127.0.0.1".parse().unwrap()
    }

    #[tokio::test]
    async fn fetch_reads_back_fixture_files() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("iptables-save-fw1"), "*filter\n-A INPUT -s 1.1.1.1 -j ACCEPT\nCOMMIT\n")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("ip-addr-show-fw1"), "1: eth0:    <UP>\n    inet 1.1.1.1/24 scope global eth0\n")
            .await
            .unwrap();

        let executor = MockExecutor::new(dir.path());
        let (dump, interfaces) = executor.fetch("fw1", addr()).await.unwrap();
        assert_eq!(dump.filter, vec!["-A INPUT -s 1.1.1.1 -j ACCEPT".to_string()]);
        assert_eq!(interfaces["eth0"].ipv4.as_deref(), Some("1.1.1.1/24"));
    }

    #[tokio::test]
    async fn fetch_on_missing_fixture_errors() {
        let dir = tempfile::tempdir().unwrap();
        let executor = MockExecutor::new(dir.path());
        assert!(executor.fetch("missing-host", addr()).await.is_err());
    }

    #[tokio::test]
    async fn deliver_then_activate_replaces_the_saved_dump() {
        let dir = tempfile::tempdir().unwrap();
        let executor = MockExecutor::new(dir.path());
        executor.deliver("fw1", addr(), &["-A FORWARD -j DROP".to_string()]).await.unwrap();
        executor.activate("fw1", addr()).await.unwrap();

        let (dump, _) = executor.fetch("fw1", addr()).await.unwrap();
        assert_eq!(dump.filter, vec!["-A FORWARD -j DROP".to_string()]);
    }

    #[tokio::test]
    async fn activate_without_a_prior_deliver_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let executor = MockExecutor::new(dir.path());
        executor.activate("fw1", addr()).await.unwrap();
    }
}
