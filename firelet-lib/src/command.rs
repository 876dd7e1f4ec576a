//! IPC contract between `firelet-ctl` and the `firelet` daemon, carried as
//! JSON over the Unix socket in [`crate::socket`].

use serde::{Deserialize, Serialize};

use crate::orchestrator::{CheckReport, Status};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Command {
    Check,
    Deploy,
    Rollback(usize),
    Status,
    Ping,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Response {
    Check(CheckReport),
    Deployed { unreachable: Vec<String> },
    RolledBack { unreachable: Vec<String> },
    Status(Status),
    Pong,
    Error(String),
}
