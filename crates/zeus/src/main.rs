//! Thin binary entry point: the CLI lives in `cli/`, the dashboard server in
//! `server/`; this file only wires them up and terminates the process.

mod cli;
mod server;

fn main() {
    std::process::exit(cli::run());
}
