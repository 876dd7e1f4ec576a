//! Unix-domain-socket JSON IPC between `firelet-ctl` and the `firelet`
//! daemon: write the request, half-close, read the response to EOF.
//! Adapted directly from the teacher's own root-socket module.

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

use std::io;
use std::path::{Path, PathBuf};

use crate::command::{Command, Response};

pub const DEFAULT_PATH: &str = "/var/run/firelet.sock";
pub const ENV_VAR: &str = "FIRELET_SOCKET_PATH";

#[derive(Debug, Error)]
pub enum Error {
    #[error("service not running")]
    ServiceNotRunning,
    #[error("failed serializing message: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IO(#[from] io::Error),
}

pub fn path_from_env() -> PathBuf {
    std::env::var(ENV_VAR).map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(DEFAULT_PATH))
}

/// Client side: sends `cmd` and returns the daemon's parsed response.
pub async fn process_cmd(socket_path: &Path, cmd: &Command) -> Result<Response, Error> {
    check_path(socket_path)?;

    let mut stream = UnixStream::connect(socket_path).await?;
    let json_cmd = serde_json::to_string(cmd)?;
    push_message(&mut stream, &json_cmd).await?;
    let str_resp = pull_message(&mut stream).await?;
    serde_json::from_str::<Response>(&str_resp).map_err(Error::Serialization)
}

/// Server side: reads one framed `Command` off an accepted connection and
/// writes back the framed `Response`.
pub async fn serve_one<F, Fut>(mut stream: UnixStream, handle: F) -> Result<(), Error>
where
    F: FnOnce(Command) -> Fut,
    Fut: std::future::Future<Output = Response>,
{
    let raw = pull_message(&mut stream).await?;
    let cmd: Command = serde_json::from_str(&raw)?;
    let response = handle(cmd).await;
    let json = serde_json::to_string(&response)?;
    push_message(&mut stream, &json).await
}

pub async fn bind(socket_path: &Path) -> Result<UnixListener, Error> {
    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    UnixListener::bind(socket_path).map_err(Error::from)
}

fn check_path(socket_path: &Path) -> Result<(), Error> {
    match socket_path.try_exists() {
        Ok(true) => Ok(()),
        Ok(false) => Err(Error::ServiceNotRunning),
        Err(e) => Err(e.into()),
    }
}

async fn push_message(socket: &mut UnixStream, json: &str) -> Result<(), Error> {
    socket.write_all(json.as_bytes()).await?;
    socket.flush().await?;
    socket.shutdown().await.map_err(Error::from)
}

async fn pull_message(socket: &mut UnixStream) -> Result<String, Error> {
    let mut message = String::new();
    socket.read_to_string(&mut message).await.map(|_| message).map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn check_path_reports_service_not_running_when_socket_missing() {
        let tmp = tempdir().unwrap();
        let missing = tmp.path().join("missing.sock");
        assert!(matches!(check_path(&missing), Err(Error::ServiceNotRunning)));
    }

    #[tokio::test]
    async fn push_and_pull_round_trip_a_frame() {
        let (mut server, mut client) = UnixStream::pair().unwrap();
        let json = serde_json::to_string(&Command::Ping).unwrap();
        let push = push_message(&mut client, &json);
        let pull = pull_message(&mut server);
        let (_, pulled) = tokio::try_join!(push, pull).unwrap();
        assert_eq!(pulled, json);
    }

    #[tokio::test]
    async fn process_cmd_round_trips_through_a_real_listener() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("socket");
        let listener_path = path.clone();

        let server = tokio::spawn(async move {
            let listener = UnixListener::bind(&listener_path).unwrap();
            let (stream, _) = listener.accept().await.unwrap();
            serve_one(stream, |cmd| async move {
                assert!(matches!(cmd, Command::Ping));
                Response::Pong
            })
            .await
            .unwrap();
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let resp = process_cmd(&path, &Command::Ping).await.unwrap();
        assert!(matches!(resp, Response::Pong));
        server.await.unwrap();
    }
}
