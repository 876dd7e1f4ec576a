//! Whitespace-delimited record (de)serialization for the five table files.
//!
//! Each line is one row. Fixed-shape rows split on whitespace with a capped
//! split count so the last column can carry free text (the rule
//! description); a literal `-` stands in for an intentionally empty field so
//! column counts stay stable on reload.

use std::path::{Path, PathBuf};

use super::Error;
use crate::model::{Action, Host, HostGroup, Network, Protocol, Rule, Service};

const EMPTY: &str = "-";

fn field(s: &str) -> &str {
    if s == EMPTY { "" } else { s }
}

fn encode(s: &str) -> &str {
    if s.is_empty() { EMPTY } else { s }
}

pub fn load_lines(path: &Path) -> Result<Vec<String>, Error> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content.lines().filter(|l| !l.trim().is_empty()).map(str::to_string).collect()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(source) => Err(Error::ReadIO { path: path.to_path_buf(), source }),
    }
}

pub fn write_lines(path: &Path, lines: &[String]) -> Result<(), Error> {
    let mut content = lines.join("\n");
    if !lines.is_empty() {
        content.push('\n');
    }
    std::fs::write(path, content).map_err(|source| Error::WriteIO { path: path.to_path_buf(), source })
}

fn malformed(path: &Path, line: usize, reason: impl Into<String>) -> Error {
    Error::MalformedRecord { path: path.to_path_buf(), line, reason: reason.into() }
}

pub fn parse_hosts(path: &Path, lines: &[String]) -> Result<Vec<Host>, Error> {
    lines
        .iter()
        .enumerate()
        .map(|(i, l)| {
            let parts: Vec<&str> = l.split_whitespace().collect();
            let [name, iface, address] = parts[..] else {
                return Err(malformed(path, i, "expected `name iface address`"));
            };
            let address = crate::addr::parse(address).map_err(|e| malformed(path, i, e.to_string()))?;
            Ok(Host { name: name.to_string(), iface: iface.to_string(), address })
        })
        .collect()
}

pub fn format_hosts(hosts: &[Host]) -> Vec<String> {
    hosts.iter().map(|h| format!("{} {} {}", h.name, h.iface, crate::addr::format(h.address))).collect()
}

pub fn parse_networks(path: &Path, lines: &[String]) -> Result<Vec<Network>, Error> {
    lines
        .iter()
        .enumerate()
        .map(|(i, l)| {
            let parts: Vec<&str> = l.split_whitespace().collect();
            let [name, address, masklen] = parts[..] else {
                return Err(malformed(path, i, "expected `name address masklen`"));
            };
            let address = crate::addr::parse(address).map_err(|e| malformed(path, i, e.to_string()))?;
            let masklen: u8 = masklen.parse().map_err(|_| malformed(path, i, "masklen not a number"))?;
            Ok(Network { name: name.to_string(), address, masklen })
        })
        .collect()
}

pub fn format_networks(networks: &[Network]) -> Vec<String> {
    networks
        .iter()
        .map(|n| format!("{} {} {}", n.name, crate::addr::format(n.address), n.masklen))
        .collect()
}

pub fn parse_hostgroups(path: &Path, lines: &[String]) -> Result<Vec<HostGroup>, Error> {
    lines
        .iter()
        .enumerate()
        .map(|(i, l)| {
            let mut parts = l.split_whitespace();
            let name = parts.next().ok_or_else(|| malformed(path, i, "missing name"))?;
            let members = parts.map(str::to_string).collect();
            Ok(HostGroup { name: name.to_string(), members })
        })
        .collect()
}

pub fn format_hostgroups(groups: &[HostGroup]) -> Vec<String> {
    groups
        .iter()
        .map(|g| {
            let mut s = g.name.clone();
            for m in &g.members {
                s.push(' ');
                s.push_str(m);
            }
            s
        })
        .collect()
}

pub fn parse_services(path: &Path, lines: &[String]) -> Result<Vec<Service>, Error> {
    lines
        .iter()
        .enumerate()
        .map(|(i, l)| {
            let parts: Vec<&str> = l.split_whitespace().collect();
            let [name, protocol, ports] = parts[..] else {
                return Err(malformed(path, i, "expected `name protocol ports`"));
            };
            let protocol = protocol
                .parse::<Protocol>()
                .map_err(|_| malformed(path, i, format!("unknown protocol `{protocol}`")))?;
            Ok(Service { name: name.to_string(), protocol, ports: field(ports).to_string() })
        })
        .collect()
}

pub fn format_services(services: &[Service]) -> Vec<String> {
    services
        .iter()
        .map(|s| {
            let protocol = if s.protocol == Protocol::Any { "*".to_string() } else { s.protocol.to_string() };
            format!("{} {} {}", s.name, protocol, encode(&s.ports))
        })
        .collect()
}

pub fn parse_rules(path: &Path, lines: &[String]) -> Result<Vec<Rule>, Error> {
    lines
        .iter()
        .enumerate()
        .map(|(i, l)| {
            let parts: Vec<&str> = l.splitn(9, char::is_whitespace).collect();
            let [enabled, name, src, src_service, dst, dst_service, action, log_level, description] = parts[..]
            else {
                return Err(malformed(path, i, "expected 9 whitespace-separated columns"));
            };
            let enabled = match enabled {
                "y" => true,
                "n" => false,
                other => return Err(malformed(path, i, format!("enabled must be y/n, got `{other}`"))),
            };
            let action = action.parse::<Action>().map_err(|_| malformed(path, i, format!("unknown action `{action}`")))?;
            let log_level: u8 = log_level.parse().map_err(|_| malformed(path, i, "log_level not a number"))?;
            if log_level > 7 {
                return Err(malformed(path, i, "log_level must be 0..=7"));
            }
            Ok(Rule {
                enabled,
                name: name.to_string(),
                src: src.to_string(),
                src_service: src_service.to_string(),
                dst: dst.to_string(),
                dst_service: dst_service.to_string(),
                action,
                log_level,
                description: field(description).to_string(),
            })
        })
        .collect()
}

pub fn format_rules(rules: &[Rule]) -> Vec<String> {
    rules
        .iter()
        .map(|r| {
            format!(
                "{} {} {} {} {} {} {} {} {}",
                if r.enabled { "y" } else { "n" },
                r.name,
                r.src,
                r.src_service,
                r.dst,
                r.dst_service,
                r.action,
                r.log_level,
                encode(&r.description),
            )
        })
        .collect()
}

pub fn rules_file(repodir: &Path) -> PathBuf {
    super::table_path(repodir, "rules")
}
pub fn hosts_file(repodir: &Path) -> PathBuf {
    super::table_path(repodir, "hosts")
}
pub fn hostgroups_file(repodir: &Path) -> PathBuf {
    super::table_path(repodir, "hostgroups")
}
pub fn services_file(repodir: &Path) -> PathBuf {
    super::table_path(repodir, "services")
}
pub fn networks_file(repodir: &Path) -> PathBuf {
    super::table_path(repodir, "networks")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_round_trips_with_spaced_description() {
        let path = Path::new("rules.csv");
        let line = "y allow-web h1:eth0 * h2:eth0 web ACCEPT 3 allow web traffic out".to_string();
        let parsed = parse_rules(path, &[line.clone()]).unwrap();
        assert_eq!(parsed[0].description, "allow web traffic out");
        let back = format_rules(&parsed);
        assert_eq!(back[0], line);
    }

    #[test]
    fn rule_rejects_bad_log_level() {
        let path = Path::new("rules.csv");
        let line = "y r h1 * h2 * ACCEPT 9 -".to_string();
        assert!(parse_rules(path, &[line]).is_err());
    }

    #[test]
    fn service_empty_ports_round_trips_through_placeholder() {
        let path = Path::new("services.csv");
        let line = "any-tcp TCP -".to_string();
        let parsed = parse_services(path, &[line.clone()]).unwrap();
        assert!(parsed[0].ports.is_empty());
        assert_eq!(format_services(&parsed)[0], line);
    }

    #[test]
    fn hostgroup_with_zero_members_parses() {
        let path = Path::new("hostgroups.csv");
        let parsed = parse_hostgroups(path, &["empty".to_string()]).unwrap();
        assert_eq!(parsed[0].name, "empty");
        assert!(parsed[0].members.is_empty());
    }
}
