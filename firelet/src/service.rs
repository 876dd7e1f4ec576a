//! Wires a loaded [`Config`] into a running [`Orchestrator`] and dispatches
//! IPC [`Command`]s to it. Grounded in the teacher's `core::Core`, which
//! plays the same role (own the stateful core, expose `handle_cmd`) for its
//! own command set.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::Path;
use thiserror::Error;

use firelet_lib::command::{Command, Response};
use firelet_lib::config::{self, Config, Mode};
use firelet_lib::executor::mock::MockExecutor;
use firelet_lib::executor::ssh::SshExecutor;
use firelet_lib::executor::Executor;
use firelet_lib::orchestrator::Orchestrator;
use firelet_lib::store::{versioned, Backend};

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] config::Error),
    #[error("store error: {0}")]
    Store(#[from] firelet_lib::store::Error),
}

/// The daemon runs either transport depending on `config.mode`; kept as an
/// enum rather than a trait object since `Executor`'s methods return
/// `impl Future` and are therefore not object-safe.
pub enum Service {
    Mock(Orchestrator<versioned::Store, MockExecutor>),
    Live(Orchestrator<versioned::Store, SshExecutor>),
}

fn first_addresses(config: &Config) -> HashMap<String, Ipv4Addr> {
    config
        .targets
        .iter()
        .filter_map(|(host, addrs)| addrs.first().map(|addr| (host.clone(), *addr)))
        .collect()
}

impl Service {
    pub async fn init(config_path: &Path) -> Result<Service, Error> {
        let config = config::read(config_path).await?;
        let store = versioned::Store::open(&config.repodir)?;
        let targets = first_addresses(&config);

        Ok(match config.mode {
            Mode::Mock => {
                let executor = MockExecutor::new(config.repodir.join("mock"));
                Service::Mock(Orchestrator::new(store, executor, targets))
            }
            Mode::Live => {
                let executor = SshExecutor::new(config.username.clone(), config.connect_timeout);
                Service::Live(Orchestrator::new(store, executor, targets))
            }
        })
    }

    pub async fn handle_cmd(&mut self, cmd: Command) -> Response {
        match self {
            Service::Mock(orchestrator) => dispatch(orchestrator, cmd).await,
            Service::Live(orchestrator) => dispatch(orchestrator, cmd).await,
        }
    }
}

async fn dispatch<S, E>(orchestrator: &mut Orchestrator<S, E>, cmd: Command) -> Response
where
    S: Backend,
    E: Executor + 'static,
{
    match cmd {
        Command::Ping => Response::Pong,
        Command::Status => Response::Status(orchestrator.status()),
        Command::Check => match orchestrator.check().await {
            Ok(report) => Response::Check(report),
            Err(e) => {
                tracing::error!(error = %e, "check failed");
                Response::Error(e.to_string())
            }
        },
        Command::Deploy => match orchestrator.deploy().await {
            Ok(status) => {
                let unreachable = status.unreachable();
                warn_unreachable(&unreachable);
                Response::Deployed { unreachable }
            }
            Err(e) => {
                tracing::error!(error = %e, "deploy failed");
                Response::Error(e.to_string())
            }
        },
        Command::Rollback(n) => match orchestrator.rollback(n).await {
            Ok(status) => {
                let unreachable = status.unreachable();
                warn_unreachable(&unreachable);
                Response::RolledBack { unreachable }
            }
            Err(e) => {
                tracing::error!(error = %e, "rollback failed");
                Response::Error(e.to_string())
            }
        },
    }
}

fn warn_unreachable(hosts: &[String]) {
    for host in hosts {
        tracing::warn!(%host, "host unreachable during activation");
    }
}
