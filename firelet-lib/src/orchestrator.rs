//! Orchestrator (component C8): wires the store, compiler, projector, and
//! executor together into the three high-level operations
//! (`check`/`deploy`/`rollback`), plus the supplemented `status` read.

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::compiler;
use crate::error::Error;
use crate::executor::{self, Executor};
use crate::project;
use crate::store::Backend;

/// Directives present on only one side of a check, per host/interface.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HostDiff {
    /// Desired (compiled) but absent from the live dump.
    pub missing: Vec<String>,
    /// Present on the live host but not called for by the compiled rules.
    pub extra: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckReport {
    /// Keyed by `"host:iface"`.
    pub diffs: HashMap<String, HostDiff>,
}

/// Per-host outcome of a `deploy`/`rollback` cycle, per `spec.md` §4.7's
/// `deliver_all`/`activate_all` contract: every target host gets an entry,
/// `true` for `"ok"` (delivered and activated) and `false` standing in for
/// the `∅` status cell (delivery or activation did not succeed).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeployStatus {
    pub hosts: HashMap<String, bool>,
}

impl DeployStatus {
    pub fn unreachable(&self) -> Vec<String> {
        let mut hosts: Vec<String> = self.hosts.iter().filter(|(_, &ok)| !ok).map(|(h, _)| h.clone()).collect();
        hosts.sort();
        hosts
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub save_needed: bool,
    pub last_reachability: HashMap<String, bool>,
}

pub struct Orchestrator<S, E> {
    store: S,
    executor: Arc<E>,
    targets: HashMap<String, Ipv4Addr>,
    last_reachability: HashMap<String, bool>,
}

impl<S, E> Orchestrator<S, E>
where
    S: Backend,
    E: Executor + 'static,
{
    pub fn new(store: S, executor: E, targets: HashMap<String, Ipv4Addr>) -> Orchestrator<S, E> {
        Orchestrator { store, executor: Arc::new(executor), targets, last_reachability: HashMap::new() }
    }

    pub fn status(&self) -> Status {
        Status { save_needed: self.store.save_needed(), last_reachability: self.last_reachability.clone() }
    }

    /// fetch -> parse -> compile -> project -> diff against parsed live
    /// state. Any target host missing from the fetch is fatal: a diff is
    /// only meaningful when every host's live state was observed.
    pub async fn check(&mut self) -> Result<CheckReport, Error> {
        let fetched = executor::fetch_all(Arc::clone(&self.executor), &self.targets).await;

        for host in self.targets.keys() {
            self.last_reachability.insert(host.clone(), fetched.contains_key(host));
        }

        let mut missing: Vec<String> = self.targets.keys().filter(|h| !fetched.contains_key(*h)).cloned().collect();
        if !missing.is_empty() {
            missing.sort();
            return Err(Error::FetchIncomplete(missing));
        }

        let directives = compiler::compile(self.store.tables())?;
        let projected = project::project(&directives, &self.store.tables().hosts);

        let mut diffs = HashMap::new();
        for (host, by_iface) in &projected {
            for (iface, desired) in by_iface {
                let key = format!("{host}:{iface}");
                let live: HashSet<&String> = fetched
                    .get(host)
                    .map(|(dump, _)| dump.filter.iter().collect())
                    .unwrap_or_default();
                let desired_set: HashSet<&String> = desired.iter().collect();

                let missing = desired.iter().filter(|d| !live.contains(*d)).cloned().collect();
                let extra = fetched
                    .get(host)
                    .map(|(dump, _)| dump.filter.iter().filter(|d| !desired_set.contains(d)).cloned().collect())
                    .unwrap_or_default();
                diffs.insert(key, HostDiff { missing, extra });
            }
        }

        Ok(CheckReport { diffs })
    }

    /// compile -> project -> deliver -> activate. Activation is attempted
    /// only for hosts whose delivery succeeded (`spec.md` §4.8 "abort
    /// activation if any delivery is missing" applies per host, not to the
    /// whole fleet — per `spec.md` §8 scenario 7, one unreachable host among
    /// five must not block the other four from deploying). The returned
    /// status map has one entry per target host: `true` once both phases
    /// succeeded, `false` otherwise.
    pub async fn deploy(&mut self) -> Result<DeployStatus, Error> {
        let directives = compiler::compile(self.store.tables())?;
        let projected = project::project(&directives, &self.store.tables().hosts);

        let plans: HashMap<String, Vec<String>> = projected
            .into_iter()
            .flat_map(|(host, by_iface)| by_iface.into_values().map(move |lines| (host.clone(), lines)))
            .fold(HashMap::new(), |mut acc, (host, mut lines)| {
                acc.entry(host).or_insert_with(Vec::new).append(&mut lines);
                acc
            });

        let delivered = executor::deliver_all(Arc::clone(&self.executor), &self.targets, plans).await;

        let activate_targets: HashMap<String, Ipv4Addr> =
            self.targets.iter().filter(|(host, _)| delivered.contains(*host)).map(|(h, a)| (h.clone(), *a)).collect();
        let activated = executor::activate_all(Arc::clone(&self.executor), &activate_targets).await;

        let mut hosts = HashMap::new();
        for host in self.targets.keys() {
            let ok = delivered.contains(host) && activated.contains(host);
            hosts.insert(host.clone(), ok);
            self.last_reachability.insert(host.clone(), ok);
        }
        Ok(DeployStatus { hosts })
    }

    /// Delegates to the store, then deploys the restored configuration.
    pub async fn rollback(&mut self, n: usize) -> Result<DeployStatus, Error> {
        self.store.rollback(n)?;
        self.deploy().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::FetchResult;
    use crate::model::{Action, Host, Rule};
    use crate::store::Tables;

    struct FakeStore {
        tables: Tables,
    }

    impl Backend for FakeStore {
        fn tables(&self) -> &Tables {
            &self.tables
        }
        fn tables_mut(&mut self) -> &mut Tables {
            &mut self.tables
        }
        fn save_needed(&self) -> bool {
            false
        }
        fn save(&mut self) -> Result<(), crate::store::Error> {
            Ok(())
        }
        fn reset(&mut self) -> Result<(), crate::store::Error> {
            Ok(())
        }
        fn rollback(&mut self, _n: usize) -> Result<(), crate::store::Error> {
            Ok(())
        }
        fn version_list(&self) -> Vec<crate::store::Version> {
            Vec::new()
        }
    }

    #[derive(Clone)]
    struct FakeExecutor;

    impl Executor for FakeExecutor {
        async fn fetch(&self, _host: &str, _address: Ipv4Addr) -> Result<FetchResult, executor::Error> {
            Ok((
                crate::dump::Dump { nat: Vec::new(), filter: vec!["-A FORWARD -s 1.1.1.1 -j ACCEPT".to_string()] },
                HashMap::new(),
            ))
        }
        async fn deliver(&self, _host: &str, _address: Ipv4Addr, _directives: &[String]) -> Result<(), executor::Error> {
            Ok(())
        }
        async fn activate(&self, _host: &str, _address: Ipv4Addr) -> Result<(), executor::Error> {
            Ok(())
        }
    }

    fn sample_tables() -> Tables {
        let mut tables = Tables::default();
        tables.hosts.push(Host { name: "fw1".into(), iface: "eth0".into(), address: crate::addr::parse("1.1.1.1").unwrap() });
        tables.rules.push(Rule {
            enabled: true,
            name: "allow".into(),
            src: "fw1:eth0".into(),
            src_service: "*".into(),
            dst: "*".into(),
            dst_service: "*".into(),
            action: Action::Accept,
            log_level: 0,
            description: String::new(),
        });
        tables
    }

    #[tokio::test]
    async fn check_reports_no_diff_when_live_matches_desired() {
        let store = FakeStore { tables: sample_tables() };
        let targets = HashMap::from([("fw1".to_string(), "1.1.1.1".parse().unwrap())]);
        let mut orchestrator = Orchestrator::new(store, FakeExecutor, targets);

        let report = orchestrator.check().await.unwrap();
        let diff = &report.diffs["fw1:eth0"];
        assert!(diff.missing.is_empty());
        assert!(diff.extra.is_empty());
    }

    #[tokio::test]
    async fn check_is_fetch_incomplete_when_a_target_does_not_respond() {
        let store = FakeStore { tables: sample_tables() };
        let targets = HashMap::from([
            ("fw1".to_string(), "1.1.1.1".parse().unwrap()),
            ("fw2".to_string(), "2.2.2.2".parse().unwrap()),
        ]);

        struct PartialExecutor;
        impl Executor for PartialExecutor {
            async fn fetch(&self, host: &str, _address: Ipv4Addr) -> Result<FetchResult, executor::Error> {
                if host == "fw1" {
                    Ok((crate::dump::Dump::default(), HashMap::new()))
                } else {
                    Err(executor::Error::Timeout)
                }
            }
            async fn deliver(&self, _h: &str, _a: Ipv4Addr, _d: &[String]) -> Result<(), executor::Error> {
                Ok(())
            }
            async fn activate(&self, _h: &str, _a: Ipv4Addr) -> Result<(), executor::Error> {
                Ok(())
            }
        }

        let mut orchestrator = Orchestrator::new(store, PartialExecutor, targets);
        let err = orchestrator.check().await.unwrap_err();
        assert!(matches!(err, Error::FetchIncomplete(hosts) if hosts == vec!["fw2".to_string()]));
    }

    #[tokio::test]
    async fn deploy_returns_empty_unreachable_list_when_all_hosts_activate() {
        let store = FakeStore { tables: sample_tables() };
        let targets = HashMap::from([("fw1".to_string(), "1.1.1.1".parse().unwrap())]);
        let mut orchestrator = Orchestrator::new(store, FakeExecutor, targets);

        let status = orchestrator.deploy().await.unwrap();
        assert!(status.unreachable().is_empty());
        assert_eq!(status.hosts.get("fw1"), Some(&true));
    }

    #[tokio::test]
    async fn deploy_reports_per_host_status_when_one_of_several_is_unreachable() {
        let store = FakeStore { tables: sample_tables() };
        let targets = HashMap::from([
            ("fw1".to_string(), "1.1.1.1".parse().unwrap()),
            ("fw2".to_string(), "2.2.2.2".parse().unwrap()),
            ("fw3".to_string(), "3.3.3.3".parse().unwrap()),
            ("fw4".to_string(), "4.4.4.4".parse().unwrap()),
            ("fw5".to_string(), "5.5.5.5".parse().unwrap()),
        ]);

        struct PartialExecutor;
        impl Executor for PartialExecutor {
            async fn fetch(&self, _host: &str, _address: Ipv4Addr) -> Result<FetchResult, executor::Error> {
                Ok((crate::dump::Dump::default(), HashMap::new()))
            }
            async fn deliver(&self, host: &str, _address: Ipv4Addr, _directives: &[String]) -> Result<(), executor::Error> {
                if host == "fw3" {
                    Err(executor::Error::Timeout)
                } else {
                    Ok(())
                }
            }
            async fn activate(&self, _host: &str, _address: Ipv4Addr) -> Result<(), executor::Error> {
                Ok(())
            }
        }

        let mut orchestrator = Orchestrator::new(store, PartialExecutor, targets);
        let status = orchestrator.deploy().await.unwrap();

        assert_eq!(status.hosts.len(), 5);
        assert_eq!(status.unreachable(), vec!["fw3".to_string()]);
        assert_eq!(status.hosts.get("fw1"), Some(&true));
        assert_eq!(status.hosts.get("fw2"), Some(&true));
        assert_eq!(status.hosts.get("fw3"), Some(&false));
        assert_eq!(status.hosts.get("fw4"), Some(&true));
        assert_eq!(status.hosts.get("fw5"), Some(&true));
    }
}
