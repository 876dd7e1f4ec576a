use clap::Parser;

use std::path::PathBuf;

use firelet_lib::{config, socket};

/// firelet daemon - compiles, projects and deploys a symbolic firewall
/// policy to a fleet of remote hosts.
#[derive(Clone, Debug, Parser)]
#[command(version)]
pub struct Cli {
    /// Socket path for communication with firelet-ctl
    #[arg(short, long, env = socket::ENV_VAR, default_value = socket::DEFAULT_PATH)]
    pub socket_path: PathBuf,

    /// General configuration file
    #[arg(short, long, env = config::ENV_VAR, default_value = config::DEFAULT_PATH)]
    pub config_path: PathBuf,
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cli_with_minimum_arguments() {
        let args = Cli::try_parse_from(["firelet", "--socket-path", "/tmp/firelet.socket", "--config-path", "/tmp/firelet.toml"]).unwrap();
        assert_eq!(args.socket_path, PathBuf::from("/tmp/firelet.socket"));
        assert_eq!(args.config_path, PathBuf::from("/tmp/firelet.toml"));
    }

    #[test]
    fn falls_back_to_documented_defaults() {
        let args = Cli::try_parse_from(["firelet"]).unwrap();
        assert_eq!(args.socket_path, PathBuf::from(socket::DEFAULT_PATH));
        assert_eq!(args.config_path, PathBuf::from(config::DEFAULT_PATH));
    }
}
