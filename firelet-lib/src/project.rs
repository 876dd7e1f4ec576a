//! Host projector (component C6): maps compiled directives onto the
//! host/interface that should receive each one.
//!
//! Grounded in `original_source/lib/flcore.py`'s `select_rules`: a directive
//! belongs to a host/interface iff the host's address appears, as a literal
//! substring, in the directive text. This is a coarse filter by design — it
//! matches both `-s` and `-d` occurrences, so every host sees every rule
//! that mentions it in either direction.

use std::collections::HashMap;

use crate::addr;
use crate::model::Host;

/// `project[hostname][iface] -> [directive...]`, first-seen order preserved.
pub type Projection = HashMap<String, HashMap<String, Vec<String>>>;

pub fn project(directives: &[String], hosts: &[Host]) -> Projection {
    let mut out: Projection = HashMap::new();
    for host in hosts {
        let needle = addr::format(host.address);
        let matched: Vec<String> = directives.iter().filter(|d| d.contains(&needle)).cloned().collect();
        out.entry(host.name.clone()).or_default().insert(host.iface.clone(), matched);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(name: &str, iface: &str, ip: &str) -> Host {
        Host { name: name.into(), iface: iface.into(), address: addr::parse(ip).unwrap() }
    }

    #[test]
    fn directive_mentioning_host_as_source_is_selected() {
        let directives = vec!["-A FORWARD -s 1.1.1.1 -d 2.2.2.2 -j ACCEPT".to_string()];
        let hosts = vec![host("h1", "eth0", "1.1.1.1")];
        let projection = project(&directives, &hosts);
        assert_eq!(projection["h1"]["eth0"], directives);
    }

    #[test]
    fn directive_mentioning_host_as_destination_is_selected() {
        let directives = vec!["-A FORWARD -s 2.2.2.2 -d 1.1.1.1 -j ACCEPT".to_string()];
        let hosts = vec![host("h1", "eth0", "1.1.1.1")];
        let projection = project(&directives, &hosts);
        assert_eq!(projection["h1"]["eth0"], directives);
    }

    #[test]
    fn unrelated_directive_is_excluded() {
        let directives = vec!["-A FORWARD -s 9.9.9.9 -d 8.8.8.8 -j ACCEPT".to_string()];
        let hosts = vec![host("h1", "eth0", "1.1.1.1")];
        let projection = project(&directives, &hosts);
        assert!(projection["h1"]["eth0"].is_empty());
    }

    #[test]
    fn first_seen_order_is_preserved_across_multiple_matches() {
        let directives = vec![
            "-A FORWARD -s 1.1.1.1 -j DROP".to_string(),
            "-A FORWARD -s 9.9.9.9 -j ACCEPT".to_string(),
            "-A FORWARD -d 1.1.1.1 -j ACCEPT".to_string(),
        ];
        let hosts = vec![host("h1", "eth0", "1.1.1.1")];
        let projection = project(&directives, &hosts);
        assert_eq!(
            projection["h1"]["eth0"],
            vec![directives[0].clone(), directives[2].clone()]
        );
    }

    #[test]
    fn each_interface_of_a_multihomed_host_gets_its_own_entry() {
        let directives = vec![
            "-A FORWARD -s 1.1.1.1 -j ACCEPT".to_string(),
            "-A FORWARD -s 2.2.2.2 -j ACCEPT".to_string(),
        ];
        let hosts = vec![host("fw", "eth0", "1.1.1.1"), host("fw", "eth1", "2.2.2.2")];
        let projection = project(&directives, &hosts);
        assert_eq!(projection["fw"]["eth0"], vec![directives[0].clone()]);
        assert_eq!(projection["fw"]["eth1"], vec![directives[1].clone()]);
    }
}
