//! Daemon configuration (ambient stack, `spec.md` §6 "Configuration").
//!
//! TOML on disk, loaded the way the teacher's `config::read` loads its own
//! configuration file: a default path overridable by an environment
//! variable, `toml` + `serde` for parsing, a `thiserror` error enum
//! distinguishing "file absent" from "file malformed".

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;

pub const DEFAULT_PATH: &str = "/etc/firelet/config.toml";
pub const ENV_VAR: &str = "FIRELET_CONFIG_PATH";

const DEFAULT_REPODIR: &str = "firewall";
const DEFAULT_USERNAME: &str = "firelet";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration file not found")]
    NoFile,
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error("deserialization error: {0}")]
    TomlDeserialization(#[from] toml::de::Error),
    #[error("target `{0}` has no configured management addresses")]
    EmptyTarget(String),
}

/// Transport mode: `Live` drives real SSH sessions, `Mock` substitutes the
/// file-backed transport so the pipeline is exercisable without a fleet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Live,
    Mock,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_repodir")]
    pub repodir: PathBuf,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default)]
    pub targets: HashMap<String, Vec<Ipv4Addr>>,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            repodir: default_repodir(),
            username: default_username(),
            targets: HashMap::new(),
            mode: Mode::default(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

fn default_repodir() -> PathBuf {
    PathBuf::from(DEFAULT_REPODIR)
}

fn default_username() -> String {
    DEFAULT_USERNAME.to_string()
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

impl Config {
    /// The first configured management address for a target, per §6
    /// "the first entry is used".
    pub fn target_address(&self, host: &str) -> Result<Ipv4Addr, Error> {
        self.targets
            .get(host)
            .and_then(|addrs| addrs.first())
            .copied()
            .ok_or_else(|| Error::EmptyTarget(host.to_string()))
    }
}

pub async fn read(path: &Path) -> Result<Config, Error> {
    let content = fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::NoFile
        } else {
            Error::IO(e)
        }
    })?;
    toml::from_str(&content).map_err(Error::from)
}

pub fn path_from_env() -> PathBuf {
    std::env::var(ENV_VAR).map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(DEFAULT_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_documented_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.repodir, PathBuf::from("firewall"));
        assert_eq!(cfg.username, "firelet");
        assert_eq!(cfg.mode, Mode::Live);
        assert_eq!(cfg.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn deserializes_partial_toml_with_defaults_filled_in() {
        let toml = r#"
            repodir = "/srv/firewall"
            mode = "mock"
        "#;
        let cfg: Config = toml::from_str(toml).unwrap();
        assert_eq!(cfg.repodir, PathBuf::from("/srv/firewall"));
        assert_eq!(cfg.mode, Mode::Mock);
        assert_eq!(cfg.username, "firelet");
    }

    #[test]
    fn target_address_picks_first_entry() {
        let mut cfg = Config::default();
        cfg.targets.insert("fw1".to_string(), vec!["10.0.0.1".parse().unwrap(), "10.0.0.2".parse().unwrap()]);
        assert_eq!(cfg.target_address("fw1").unwrap(), "10.0.0.1".parse::<Ipv4Addr>().unwrap());
    }

    #[test]
    fn target_address_errors_when_host_unconfigured() {
        let cfg = Config::default();
        assert!(cfg.target_address("missing").is_err());
    }
}
