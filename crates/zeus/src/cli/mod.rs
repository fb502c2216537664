//! # CLI layer
//!
//! The only place in the binary that knows about stdout/stderr and exit
//! codes. Parses arguments with clap, dispatches to handlers that call the
//! `zeusapp` API facade, and maps errors onto the exit-code contract:
//! 0 success, 2 user error, 3 integrity error, 4 conflict, 5 internal.
//! (clap itself exits 2 on unknown commands and bad flags.)

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod handlers;
mod render;
mod setup;

use setup::{Cli, Commands};
use zeusapp::error::Result;

pub fn run() -> i32 {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .try_init();

    match dispatch(&cli.command) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("Error: {err}");
            err.exit_code()
        }
    }
}

fn dispatch(command: &Commands) -> Result<()> {
    match command {
        Commands::Init { name } => handlers::init(name.as_deref()),
        Commands::Status => handlers::status(),
        Commands::Add { kind, title, set } => handlers::add(kind, title, set),
        Commands::List { kind, status } => handlers::list(kind, status.as_deref()),
        Commands::Show { id } => handlers::show(id),
        Commands::Update { id, set } => handlers::update(id, set),
        Commands::Delete { id } => handlers::delete(id),
        Commands::Pending => handlers::pending(),
        Commands::Approve { proposal_id } => handlers::approve(proposal_id),
        Commands::Reject {
            proposal_id,
            reason,
        } => handlers::reject(proposal_id, reason.as_deref()),
        Commands::Snapshot { command } => handlers::snapshot(command),
        Commands::History { limit } => handlers::history(*limit),
        Commands::Doctor => handlers::doctor(),
        Commands::Fix { dry_run } => handlers::fix(*dry_run),
        Commands::Graph {
            format,
            unified,
            focus,
            depth,
            hide_completed,
            hide_draft,
        } => handlers::graph(
            *format,
            *unified,
            focus.as_deref(),
            *depth,
            *hide_completed,
            *hide_draft,
        ),
        Commands::Uml { command } => handlers::uml(command),
        Commands::Dashboard { port, no_open, dev } => {
            handlers::dashboard(*port, *no_open, *dev)
        }
    }
}
