//! Parsers for the remote packet-filter dump format and the
//! interface-enumeration output (component C4).
//!
//! Grounded in `original_source/firelet/flssh.py`'s `parse_iptables_save`
//! and `parse_ip_addr_show`.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("host `{host}`: missing '*filter' and/or 'COMMIT' in iptables-save output")]
    MissingFilterBlock { host: String },
}

/// The two chains kept from an `iptables-save` dump.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Dump {
    pub nat: Vec<String>,
    pub filter: Vec<String>,
}

const KEPT_PREFIXES: [&str; 5] = ["-A PREROUTING", "-A POSTROUTING", "-A OUTPUT", "-A INPUT", "-A FORWARD"];

fn is_kept_rule(line: &str) -> bool {
    KEPT_PREFIXES.iter().any(|p| line.starts_with(p))
}

/// Extracts the lines between a `*section` marker and its `COMMIT`,
/// preserving relative order and discarding anything that is not a kept
/// rule line (counters, comments, chain declarations).
fn extract_block(lines: &[&str], section: &str) -> Option<Vec<String>> {
    let start = lines.iter().position(|l| *l == section)?;
    let end = lines[start..].iter().position(|l| *l == "COMMIT")? + start;
    Some(lines[start..end].iter().filter(|l| is_kept_rule(l)).map(|l| l.to_string()).collect())
}

/// Parses an `iptables-save`-formatted dump. `*nat` is optional (absence
/// yields an empty `nat` list); `*filter` terminated by `COMMIT` is
/// mandatory, and its absence is a fatal, per-host `ParseError`.
pub fn parse_iptables_save(lines: &[String], host: &str) -> Result<Dump, Error> {
    let borrowed: Vec<&str> = lines.iter().map(String::as_str).collect();
    let nat = extract_block(&borrowed, "*nat").unwrap_or_default();
    let filter =
        extract_block(&borrowed, "*filter").ok_or_else(|| Error::MissingFilterBlock { host: host.to_string() })?;
    Ok(Dump { nat, filter })
}

/// One interface's addresses, as reported by `ip addr show`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InterfaceAddrs {
    pub ipv4: Option<String>,
    pub ipv6: Option<String>,
}

fn is_interface_header(line: &str) -> bool {
    if line.is_empty() || line.starts_with(char::is_whitespace) {
        return false;
    }
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 3 {
        return false;
    }
    let (index_field, name_field) = (fields[0], fields[1]);
    if !index_field.ends_with(':') || !name_field.ends_with(':') {
        return false;
    }
    index_field.trim_end_matches(':').parse::<u32>().is_ok()
}

/// Parses `ip addr show` output into `iface -> (ipv4, ipv6)`. A header line
/// opens a new interface record; `    inet ` / `    inet6 ` lines set (and,
/// if repeated, overwrite) that record's addresses; the record is flushed
/// when a new header appears or at EOF.
pub fn parse_ip_addr_show(lines: &[String]) -> HashMap<String, InterfaceAddrs> {
    let mut out = HashMap::new();
    let mut current: Option<(String, InterfaceAddrs)> = None;

    for line in lines {
        if is_interface_header(line) {
            if let Some((name, addrs)) = current.take() {
                out.insert(name, addrs);
            }
            let name = line.split_whitespace().nth(1).expect("checked by is_interface_header");
            let name = name.trim_end_matches(':').to_string();
            current = Some((name, InterfaceAddrs::default()));
        } else if let Some((_, addrs)) = current.as_mut() {
            if let Some(rest) = line.strip_prefix("    inet ") {
                addrs.ipv4 = rest.split_whitespace().next().map(str::to_string);
            } else if let Some(rest) = line.strip_prefix("    inet6 ") {
                addrs.ipv6 = rest.split_whitespace().next().map(str::to_string);
            }
        }
    }
    if let Some((name, addrs)) = current.take() {
        out.insert(name, addrs);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(s: &str) -> Vec<String> {
        s.lines().map(str::to_string).collect()
    }

    #[test]
    fn missing_filter_block_is_fatal_and_names_host() {
        let dump = lines("*nat\nCOMMIT\n");
        let err = parse_iptables_save(&dump, "border-fw").unwrap_err();
        assert_eq!(err, Error::MissingFilterBlock { host: "border-fw".to_string() });
    }

    #[test]
    fn missing_nat_yields_empty_nat_list() {
        let dump = lines("*filter\n-A INPUT -s 1.1.1.1 -j ACCEPT\nCOMMIT\n");
        let parsed = parse_iptables_save(&dump, "h1").unwrap();
        assert!(parsed.nat.is_empty());
        assert_eq!(parsed.filter, vec!["-A INPUT -s 1.1.1.1 -j ACCEPT".to_string()]);
    }

    #[test]
    fn discards_counters_and_chain_declarations() {
        let dump = lines(
            "*filter\n:INPUT ACCEPT [18151:2581032]\n-A INPUT -s 3.3.3.3/32 -j ACCEPT\n# a comment\nCOMMIT\n",
        );
        let parsed = parse_iptables_save(&dump, "h1").unwrap();
        assert_eq!(parsed.filter, vec!["-A INPUT -s 3.3.3.3/32 -j ACCEPT".to_string()]);
    }

    #[test]
    fn preserves_relative_order_within_block() {
        let dump = lines("*filter\n-A INPUT -s 1.1.1.1 -j ACCEPT\n-A FORWARD -s 2.2.2.2 -j DROP\nCOMMIT\n");
        let parsed = parse_iptables_save(&dump, "h1").unwrap();
        assert_eq!(
            parsed.filter,
            vec!["-A INPUT -s 1.1.1.1 -j ACCEPT".to_string(), "-A FORWARD -s 2.2.2.2 -j DROP".to_string()]
        );
    }

    #[test]
    fn interface_listing_parses_header_and_addresses() {
        let dump = lines(
            "1: lo:    <LOOPBACK,UP,LOWER_UP> mtu 65536 qdisc noqueue\n    inet 127.0.0.1/8 scope host lo\n    inet6 ::1/128 scope host\n2: eth0:    <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500\n    inet 3.3.3.3/24 brd 3.3.3.255 scope global eth0\n",
        );
        let parsed = parse_ip_addr_show(&dump);
        assert_eq!(parsed["lo"].ipv4.as_deref(), Some("127.0.0.1/8"));
        assert_eq!(parsed["lo"].ipv6.as_deref(), Some("::1/128"));
        assert_eq!(parsed["eth0"].ipv4.as_deref(), Some("3.3.3.3/24"));
        assert!(parsed["eth0"].ipv6.is_none());
    }

    #[test]
    fn repeated_address_line_overwrites_within_same_interface() {
        let dump = lines("1: eth0:    <UP> mtu 1500\n    inet 1.1.1.1/24 scope global eth0\n    inet 2.2.2.2/24 scope global secondary eth0\n");
        let parsed = parse_ip_addr_show(&dump);
        assert_eq!(parsed["eth0"].ipv4.as_deref(), Some("2.2.2.2/24"));
    }

    #[test]
    fn non_header_line_with_colon_fields_is_not_mistaken_for_header() {
        assert!(!is_interface_header("    inet 1.1.1.1/24 scope global eth0"));
        assert!(!is_interface_header("not: a: header: at: all"));
    }
}
