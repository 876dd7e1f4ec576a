use std::process;

use firelet_lib::command::{Command, Response};
use firelet_lib::socket;

mod cli;

#[tokio::main]
async fn main() {
    let args = cli::parse();

    let cmd: Command = args.command.into();
    let resp = match socket::process_cmd(&args.socket_path, &cmd).await {
        Ok(resp) => resp,
        Err(e) => {
            eprintln!("error processing {cmd:?}: {e}");
            process::exit(exitcode::UNAVAILABLE);
        }
    };

    if args.json {
        json_print(&resp)
    } else {
        pretty_print(&resp)
    };

    process::exit(determine_exitcode(&resp));
}

fn json_print(resp: &Response) {
    match serde_json::to_string_pretty(resp) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("error serializing response to JSON: {e}"),
    }
}

fn pretty_print(resp: &Response) {
    match resp {
        Response::Check(report) => {
            if report.diffs.values().all(|d| d.missing.is_empty() && d.extra.is_empty()) {
                println!("no differences: live state matches compiled policy");
                return;
            }
            for (host_iface, diff) in &report.diffs {
                if diff.missing.is_empty() && diff.extra.is_empty() {
                    continue;
                }
                println!("{host_iface}:");
                for d in &diff.missing {
                    println!("  + {d}");
                }
                for d in &diff.extra {
                    println!("  - {d}");
                }
            }
        }
        Response::Deployed { unreachable } if unreachable.is_empty() => {
            println!("deployed to all targets");
        }
        Response::Deployed { unreachable } => {
            println!("deployed, but these targets did not activate: {}", unreachable.join(", "));
        }
        Response::RolledBack { unreachable } if unreachable.is_empty() => {
            println!("rolled back and deployed to all targets");
        }
        Response::RolledBack { unreachable } => {
            println!("rolled back, but these targets did not activate: {}", unreachable.join(", "));
        }
        Response::Status(status) => {
            println!("save needed: {}", status.save_needed);
            for (host, reachable) in &status.last_reachability {
                println!("  {host}: {}", if *reachable { "reachable" } else { "unreachable" });
            }
        }
        Response::Pong => {
            println!("pong");
        }
        Response::Error(message) => {
            eprintln!("error: {message}");
        }
    }
}

fn determine_exitcode(resp: &Response) -> exitcode::ExitCode {
    match resp {
        Response::Check(_) => exitcode::OK,
        Response::Deployed { unreachable } | Response::RolledBack { unreachable } => {
            if unreachable.is_empty() {
                exitcode::OK
            } else {
                exitcode::UNAVAILABLE
            }
        }
        Response::Status(_) => exitcode::OK,
        Response::Pong => exitcode::OK,
        Response::Error(_) => exitcode::SOFTWARE,
    }
}
