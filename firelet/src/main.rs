use ctrlc::Error as CtrlcError;
use notify::{RecursiveMode, Watcher};
use std::path::Path;
use std::process;
use std::time::Duration;

use firelet_lib::{command::Command, socket};

mod cli;
mod service;

/// Bridges the synchronous `ctrlc` handler onto the async world: a thread
/// blocks on a `crossbeam_channel` receive and forwards the signal as a
/// `tokio` notification.
fn ctrlc_shutdown() -> Result<tokio::sync::mpsc::Receiver<()>, exitcode::ExitCode> {
    let (crossbeam_tx, crossbeam_rx) = crossbeam_channel::bounded(1);
    match ctrlc::set_handler(move || {
        let _ = crossbeam_tx.send(());
    }) {
        Ok(_) => {}
        Err(CtrlcError::NoSuchSignal(signal_type)) => {
            tracing::error!(?signal_type, "no such signal");
            return Err(exitcode::OSERR);
        }
        Err(CtrlcError::MultipleHandlers) => {
            tracing::error!("multiple handlers");
            return Err(exitcode::UNAVAILABLE);
        }
        Err(CtrlcError::System(e)) => {
            tracing::error!(error = ?e, "system error");
            return Err(exitcode::IOERR);
        }
    }

    let (tokio_tx, tokio_rx) = tokio::sync::mpsc::channel(1);
    tokio::task::spawn_blocking(move || {
        if crossbeam_rx.recv().is_ok() {
            let _ = tokio_tx.blocking_send(());
        }
    });
    Ok(tokio_rx)
}

/// Watches the configuration file's parent directory and forwards change
/// events (grace-debounced) onto a `tokio` channel. The watcher itself must
/// stay alive for the duration of the daemon, so it is returned alongside
/// the receiver.
fn config_watch(config_path: &Path) -> Result<(notify::RecommendedWatcher, tokio::sync::mpsc::Receiver<()>), exitcode::ExitCode> {
    let parent = match config_path.parent() {
        Some(dir) => dir.to_path_buf(),
        None => {
            tracing::error!("config path has no parent");
            return Err(exitcode::UNAVAILABLE);
        }
    };

    let (crossbeam_tx, crossbeam_rx) = crossbeam_channel::unbounded::<notify::Result<notify::Event>>();
    let mut watcher = match notify::recommended_watcher(crossbeam_tx) {
        Ok(watcher) => watcher,
        Err(e) => {
            tracing::error!(error = ?e, "error creating config watcher");
            return Err(exitcode::IOERR);
        }
    };
    if let Err(e) = watcher.watch(&parent, RecursiveMode::NonRecursive) {
        tracing::error!(error = ?e, "error watching config directory");
        return Err(exitcode::IOERR);
    }

    let (tokio_tx, tokio_rx) = tokio::sync::mpsc::channel(1);
    let config_path = config_path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        const GRACE_PERIOD: Duration = Duration::from_millis(333);
        let mut last_sent = std::time::Instant::now() - GRACE_PERIOD;
        while let Ok(event) = crossbeam_rx.recv() {
            let relevant = matches!(
                event,
                Ok(notify::Event { ref paths, .. }) if paths.iter().any(|p| p == &config_path)
            );
            if relevant && last_sent.elapsed() >= GRACE_PERIOD {
                last_sent = std::time::Instant::now();
                if tokio_tx.blocking_send(()).is_err() {
                    break;
                }
            }
        }
    });
    Ok((watcher, tokio_rx))
}

async fn daemon(socket_path: &Path, config_path: &Path) -> exitcode::ExitCode {
    let mut shutdown_rx = match ctrlc_shutdown() {
        Ok(rx) => rx,
        Err(exit) => return exit,
    };

    // keep the watcher alive for the daemon's lifetime
    let (_watcher, mut config_rx) = match config_watch(config_path) {
        Ok(w) => w,
        Err(exit) => return exit,
    };

    let mut service = match service::Service::init(config_path).await {
        Ok(service) => service,
        Err(e) => {
            tracing::error!(error = ?e, "failed to initialize service");
            return exitcode::OSERR;
        }
    };

    let listener = match socket::bind(socket_path).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = ?e, "error binding socket");
            return exitcode::OSFILE;
        }
    };

    tracing::info!(socket = %socket_path.display(), "enter listening mode");
    let exit_code = loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                tracing::info!("shutdown requested");
                break exitcode::OK;
            }
            _ = config_rx.recv() => {
                tracing::info!("configuration file changed, reload on next restart");
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => {
                        if let Err(e) = socket::serve_one(stream, |cmd: Command| async move { service.handle_cmd(cmd).await }).await {
                            tracing::error!(error = ?e, "error serving request");
                        }
                    }
                    Err(e) => tracing::error!(error = ?e, "error accepting connection"),
                }
            }
        }
    };

    if let Err(e) = std::fs::remove_file(socket_path) {
        tracing::warn!(error = %e, "failed removing socket");
    }

    exit_code
}

#[tokio::main]
async fn main() {
    let args = cli::parse();

    // keep the reload handle alive for the daemon's lifetime
    let (_log_reload_handle, log_path) = firelet_lib::logging::init();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), log_file = %log_path, "starting {}", env!("CARGO_PKG_NAME"));

    let exit = daemon(&args.socket_path, &args.config_path).await;

    if exit != exitcode::OK {
        tracing::warn!("abnormal exit");
    }

    process::exit(exit)
}
