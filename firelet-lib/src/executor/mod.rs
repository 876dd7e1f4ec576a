//! Remote executor (component C7): the transport-agnostic contract the
//! orchestrator drives, plus the concurrent fan-out across a fleet.
//!
//! Grounded in `original_source/firelet/flssh.py`'s `SSHConnector` /
//! `MockSSHConnector`: one session per host per operation, a barrier at the
//! end of each phase, and a `build_restore_block` that matches the original
//! byte for byte in shape (`*filter` / three `ACCEPT` chain policies /
//! directives / `COMMIT`).

pub mod mock;
pub mod ssh;

use std::collections::HashMap;
use std::future::Future;
use std::net::Ipv4Addr;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;

use crate::dump;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error("dump parse error: {0}")]
    Dump(#[from] dump::Error),
    #[error("ssh error: {0}")]
    Ssh(#[from] openssh::Error),
    #[error("connection to host timed out")]
    Timeout,
}

/// One host's fetched state: the filter/nat dump plus its interface table.
pub type FetchResult = (dump::Dump, HashMap<String, dump::InterfaceAddrs>);

/// Transport contract, implemented by [`mock::MockExecutor`] (file-backed,
/// no network) and [`ssh::SshExecutor`] (real sessions via the `openssh`
/// crate). Sessions are single-use: each call opens, acts, and closes.
pub trait Executor: Send + Sync {
    fn fetch(&self, host: &str, address: Ipv4Addr) -> impl Future<Output = Result<FetchResult, Error>> + Send;
    fn deliver(
        &self,
        host: &str,
        address: Ipv4Addr,
        directives: &[String],
    ) -> impl Future<Output = Result<(), Error>> + Send;
    fn activate(&self, host: &str, address: Ipv4Addr) -> impl Future<Output = Result<(), Error>> + Send;
}

/// `# Created by firelet for host <host>` + the fixed three-chain-policy
/// preamble + one line per directive + `COMMIT`, per `spec.md` §4.7.
pub fn build_restore_block(host: &str, directives: &[String]) -> String {
    let mut block = format!("# Created by firelet for host {host}\n*filter\n:INPUT ACCEPT\n:FORWARD ACCEPT\n:OUTPUT ACCEPT\n");
    for directive in directives {
        block.push_str(directive);
        block.push('\n');
    }
    block.push_str("COMMIT\n");
    block
}

/// Fans out `fetch` across every target host, one task each, and barriers
/// until all complete. A host absent from `targets`, or whose fetch errors,
/// gets no entry in the returned map — the orchestrator treats that as
/// "unreachable" / contributes it to `FetchIncomplete`.
pub async fn fetch_all<E>(executor: Arc<E>, targets: &HashMap<String, Ipv4Addr>) -> HashMap<String, FetchResult>
where
    E: Executor + 'static,
{
    let mut set = JoinSet::new();
    for (host, address) in targets.clone() {
        let executor = Arc::clone(&executor);
        set.spawn(async move {
            let result = executor.fetch(&host, address).await;
            (host, result)
        });
    }
    let mut out = HashMap::new();
    while let Some(joined) = set.join_next().await {
        let Ok((host, result)) = joined else { continue };
        if let Ok(fetched) = result {
            out.insert(host, fetched);
        }
    }
    out
}

/// Fans out `deliver` across `plans`; a host's entry is present in the
/// returned set iff delivery succeeded.
pub async fn deliver_all<E>(executor: Arc<E>, targets: &HashMap<String, Ipv4Addr>, plans: HashMap<String, Vec<String>>) -> std::collections::HashSet<String>
where
    E: Executor + 'static,
{
    let mut set = JoinSet::new();
    for (host, directives) in plans {
        let Some(&address) = targets.get(&host) else { continue };
        let executor = Arc::clone(&executor);
        set.spawn(async move {
            let result = executor.deliver(&host, address, &directives).await;
            (host, result)
        });
    }
    let mut ok = std::collections::HashSet::new();
    while let Some(joined) = set.join_next().await {
        let Ok((host, result)) = joined else { continue };
        if result.is_ok() {
            ok.insert(host);
        }
    }
    ok
}

/// Fans out `activate` across every target host.
pub async fn activate_all<E>(executor: Arc<E>, targets: &HashMap<String, Ipv4Addr>) -> std::collections::HashSet<String>
where
    E: Executor + 'static,
{
    let mut set = JoinSet::new();
    for (host, address) in targets.clone() {
        let executor = Arc::clone(&executor);
        set.spawn(async move {
            let result = executor.activate(&host, address).await;
            (host, result)
        });
    }
    let mut ok = std::collections::HashSet::new();
    while let Some(joined) = set.join_next().await {
        let Ok((host, result)) = joined else { continue };
        if result.is_ok() {
            ok.insert(host);
        }
    }
    ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restore_block_has_three_policy_lines_and_commit() {
        let block = build_restore_block("fw1", &["-A FORWARD -j ACCEPT".to_string()]);
        assert!(block.starts_with("# Created by firelet for host fw1\n*filter\n"));
        assert!(block.contains(":INPUT ACCEPT\n"));
        assert!(block.contains(":FORWARD ACCEPT\n"));
        assert!(block.contains(":OUTPUT ACCEPT\n"));
        assert!(block.contains("-A FORWARD -j ACCEPT\n"));
        assert!(block.trim_end().ends_with("COMMIT"));
    }
}
