//! Real SSH transport (`spec.md` §4.7), grounded in
//! `original_source/firelet/flssh.py`'s `SSHConnector`: a `pxssh` login with
//! a timeout there becomes an `openssh::Session` here, the system `ssh`
//! binary spawned asynchronously rather than a pseudo-tty driven by a
//! Python thread.

use std::net::Ipv4Addr;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use openssh::{KnownHosts, SessionBuilder};

use super::{build_restore_block, Error, Executor, FetchResult};
use crate::dump;

#[derive(Clone, Debug)]
pub struct SshExecutor {
    username: String,
    connect_timeout: Duration,
}

impl SshExecutor {
    pub fn new(username: impl Into<String>, connect_timeout: Duration) -> SshExecutor {
        SshExecutor { username: username.into(), connect_timeout }
    }

    async fn connect(&self, address: Ipv4Addr) -> Result<openssh::Session, Error> {
        let destination = format!("{}@{}", self.username, address);
        let connect = SessionBuilder::default().known_hosts_check(KnownHosts::Accept).connect_timeout(self.connect_timeout).connect(&destination);
        match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(Ok(session)) => Ok(session),
            Ok(Err(e)) => Err(Error::Ssh(e)),
            Err(_) => Err(Error::Timeout),
        }
    }

    /// Closes gracefully; a session left alive after an error is dropped,
    /// which forces the underlying control-master connection down.
    async fn close(session: openssh::Session) {
        if session.close().await.is_err() {
            tracing::warn!("ssh session did not close cleanly, forcing shutdown via drop");
        }
    }
}

fn lines_from(output: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(output).lines().map(str::to_string).collect()
}

impl Executor for SshExecutor {
    async fn fetch(&self, host: &str, address: Ipv4Addr) -> Result<FetchResult, Error> {
        let session = self.connect(address).await?;

        let save_output = session.command("sudo").arg("/sbin/iptables-save").output().await?;
        let addr_output = session.command("/bin/ip").args(["addr", "show"]).output().await?;
        Self::close(session).await;

        let filter_lines = lines_from(&save_output.stdout);
        let dump = dump::parse_iptables_save(&filter_lines, host)?;
        let addr_lines = lines_from(&addr_output.stdout);
        let interfaces = dump::parse_ip_addr_show(&addr_lines);
        Ok((dump, interfaces))
    }

    async fn deliver(&self, host: &str, address: Ipv4Addr, directives: &[String]) -> Result<(), Error> {
        let session = self.connect(address).await?;
        let block = build_restore_block(host, directives);
        let timestamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
        let remote_file = format!(".iptables-{timestamp}");

        let mut write = session.command("tee").arg(&remote_file).stdin(Stdio::piped()).stdout(Stdio::null()).spawn().await?;
        if let Some(mut stdin) = write.stdin().take() {
            stdin.write_all(block.as_bytes()).await?;
            stdin.shutdown().await?;
        }
        write.wait().await?;

        session.command("sync").status().await?;
        session.command("/bin/ln").args(["-fs", &remote_file, "iptables_current"]).status().await?;
        Self::close(session).await;
        Ok(())
    }

    async fn activate(&self, _host: &str, address: Ipv4Addr) -> Result<(), Error> {
        let session = self.connect(address).await?;
        session.shell("/sbin/iptables-restore < iptables_current").status().await?;
        Self::close(session).await;
        Ok(())
    }
}
