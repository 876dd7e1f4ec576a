//! Rule compiler (component C5): resolves symbolic references, expands
//! host groups, pairs source/destination protocols, and emits the ordered,
//! deterministic list of concrete packet-filter directives described in
//! `spec.md` §4.5.

use std::collections::HashMap;
use thiserror::Error;

use crate::addr;
use crate::model::{Action, HostGroup, Protocol, Service};
use crate::store::Tables;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("rule `{rule}`: unresolved reference `{reference}`")]
    UnresolvedReference { rule: String, reference: String },
    #[error("host group cycle detected at `{0}`")]
    Cycle(String),
    #[error("rule `{rule}`: invalid rule: {reason}")]
    InvalidRule { rule: String, reason: String },
}

/// A resolved source/destination: a host address or a CIDR network.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Endpoint {
    Host(u32),
    Net(u32, u8),
}

impl Endpoint {
    fn directive_field(&self) -> String {
        match self {
            Endpoint::Host(a) => addr::format(*a),
            Endpoint::Net(a, m) => format!("{}/{}", addr::format(*a), m),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    Gray,
    Black,
}

/// Recursively flattens a host group's members into Hosts and Networks only,
/// rejecting cycles via gray/black DFS marking (`spec.md` §9 "Cyclic host
/// groups").
fn flatten_group(
    name: &str,
    groups: &HashMap<&str, &HostGroup>,
    addr_tbl: &HashMap<String, u32>,
    net_tbl: &HashMap<String, (u32, u8)>,
    state: &mut HashMap<String, Color>,
    cache: &mut HashMap<String, Vec<Endpoint>>,
) -> Result<Vec<Endpoint>, Error> {
    if let Some(cached) = cache.get(name) {
        return Ok(cached.clone());
    }
    if state.get(name) == Some(&Color::Gray) {
        return Err(Error::Cycle(name.to_string()));
    }
    state.insert(name.to_string(), Color::Gray);

    let group = groups.get(name).expect("caller only flattens known group names");
    let mut out = Vec::new();
    for member in &group.members {
        if let Some(&a) = addr_tbl.get(member) {
            out.push(Endpoint::Host(a));
        } else if let Some(&(a, m)) = net_tbl.get(member) {
            out.push(Endpoint::Net(a, m));
        } else if groups.contains_key(member.as_str()) {
            out.extend(flatten_group(member, groups, addr_tbl, net_tbl, state, cache)?);
        } else {
            return Err(Error::UnresolvedReference { rule: name.to_string(), reference: member.clone() });
        }
    }
    state.insert(name.to_string(), Color::Black);
    cache.insert(name.to_string(), out.clone());
    Ok(out)
}

/// `res(name)` from `spec.md` §4.5: resolves a rule's `src`/`dst` to zero or
/// more endpoints. `None` stands for the unrestricted `"*"` endpoint.
fn res(
    rule_name: &str,
    name: &str,
    addr_tbl: &HashMap<String, u32>,
    net_tbl: &HashMap<String, (u32, u8)>,
    hg_flat: &HashMap<String, Vec<Endpoint>>,
) -> Result<Vec<Option<Endpoint>>, Error> {
    if let Some(&a) = addr_tbl.get(name) {
        return Ok(vec![Some(Endpoint::Host(a))]);
    }
    if let Some(&(a, m)) = net_tbl.get(name) {
        return Ok(vec![Some(Endpoint::Net(a, m))]);
    }
    if let Some(list) = hg_flat.get(name) {
        return Ok(list.iter().cloned().map(Some).collect());
    }
    if name == "*" {
        return Ok(vec![None]);
    }
    Err(Error::UnresolvedReference { rule: rule_name.to_string(), reference: name.to_string() })
}

fn port_flag(ports: &str, flag: &str) -> Option<String> {
    if ports.is_empty() {
        return None;
    }
    let multiport = if ports.contains(',') { " -m multiport" } else { "" };
    Some(format!("{multiport} {flag} {ports}"))
}

fn valid_log_prefix(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Resolves and compiles the five tables into an ordered list of concrete
/// directives. Deterministic: identical input tables always produce
/// byte-identical output.
pub fn compile(tables: &Tables) -> Result<Vec<String>, Error> {
    let addr_tbl: HashMap<String, u32> = tables.hosts.iter().map(|h| (h.key(), h.address)).collect();
    let net_tbl: HashMap<String, (u32, u8)> =
        tables.networks.iter().map(|n| (n.name.clone(), (n.address, n.masklen))).collect();
    let groups: HashMap<&str, &HostGroup> = tables.hostgroups.iter().map(|g| (g.name.as_str(), g)).collect();

    let mut state = HashMap::new();
    let mut cache = HashMap::new();
    let mut hg_flat = HashMap::new();
    for group in &tables.hostgroups {
        let flat = flatten_group(&group.name, &groups, &addr_tbl, &net_tbl, &mut state, &mut cache)?;
        hg_flat.insert(group.name.clone(), flat);
    }

    let mut svc: HashMap<&str, &Service> = tables.services.iter().map(|s| (s.name.as_str(), s)).collect();
    let any = Service::any();
    svc.entry("*").or_insert(&any);

    let mut directives = Vec::new();
    for rule in &tables.rules {
        if !rule.enabled {
            continue;
        }
        if rule.log_level > 0 && !valid_log_prefix(&rule.name) {
            return Err(Error::InvalidRule {
                rule: rule.name.clone(),
                reason: "log-emitting rule names must match [A-Za-z0-9_-]".to_string(),
            });
        }

        let src_svc = svc
            .get(rule.src_service.as_str())
            .ok_or_else(|| Error::UnresolvedReference { rule: rule.name.clone(), reference: rule.src_service.clone() })?;
        let dst_svc = svc
            .get(rule.dst_service.as_str())
            .ok_or_else(|| Error::UnresolvedReference { rule: rule.name.clone(), reference: rule.dst_service.clone() })?;

        // Protocol reconciliation: a genuine mismatch drops the rule silently.
        if src_svc.protocol != Protocol::Any && dst_svc.protocol != Protocol::Any && src_svc.protocol != dst_svc.protocol
        {
            continue;
        }
        let protocol = if src_svc.protocol != Protocol::Any { src_svc.protocol } else { dst_svc.protocol };
        let proto_flag = protocol.lowercase().map(|p| format!(" -p {p}"));
        let sport_flag = port_flag(&src_svc.ports, "--sport");
        let dport_flag = port_flag(&dst_svc.ports, "--dport");

        let srcs = res(&rule.name, &rule.src, &addr_tbl, &net_tbl, &hg_flat)?;
        let dsts = res(&rule.name, &rule.dst, &addr_tbl, &net_tbl, &hg_flat)?;

        for src in &srcs {
            for dst in &dsts {
                let s_flag = src.as_ref().map(|e| format!(" -s {}", e.directive_field()));
                let d_flag = dst.as_ref().map(|e| format!(" -d {}", e.directive_field()));
                let predicate = format!(
                    "{}{}{}{}{}",
                    proto_flag.clone().unwrap_or_default(),
                    s_flag.clone().unwrap_or_default(),
                    sport_flag.clone().unwrap_or_default(),
                    d_flag.clone().unwrap_or_default(),
                    dport_flag.clone().unwrap_or_default(),
                );
                if rule.log_level > 0 {
                    directives.push(format!(
                        "-A FORWARD{predicate} --log-level {} --log-prefix {} -j LOG",
                        rule.log_level, rule.name
                    ));
                }
                let action = match rule.action {
                    Action::Accept => "ACCEPT",
                    Action::Drop => "DROP",
                };
                directives.push(format!("-A FORWARD{predicate} -j {action}"));
            }
        }
    }
    Ok(directives)
}
