//! Argument parsing for the `zeus` binary.

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "zeus",
    bin_name = "zeus",
    version,
    disable_help_subcommand = true
)]
#[command(
    about = "Local, file-backed project structure: vision, objectives, use cases, activities",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a .zeus project in the current directory
    Init {
        /// Project name (defaults to the directory name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Project overview: counts, health, pending proposals
    Status,
    /// Create an entity (routed through the approval engine)
    Add {
        /// Entity kind (objective, usecase, activity, actor, ...)
        kind: String,
        /// Title of the new entity
        title: String,
        /// Additional fields as FIELD=VALUE (VALUE parsed as YAML)
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        set: Vec<String>,
    },
    /// List entities of one kind
    List {
        kind: String,
        /// Filter by status (draft, in_progress, completed)
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one entity as YAML
    Show { id: String },
    /// Patch entity fields (routed through the approval engine)
    Update {
        id: String,
        #[arg(long = "set", value_name = "FIELD=VALUE", required = true)]
        set: Vec<String>,
    },
    /// Delete an entity (fails while it is still referenced)
    Delete { id: String },
    /// List pending proposals
    Pending,
    /// Approve a pending proposal and execute it
    Approve { proposal_id: String },
    /// Reject a pending proposal
    Reject {
        proposal_id: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Snapshots of the whole project tree
    Snapshot {
        #[command(subcommand)]
        command: SnapshotCommands,
    },
    /// Recent change log entries
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Audit project health
    Doctor,
    /// Repair self-healable defects found by doctor
    Fix {
        /// Report planned actions without touching disk
        #[arg(long)]
        dry_run: bool,
    },
    /// Render the project graph
    Graph {
        #[arg(long, value_enum, default_value_t = GraphFormat::Text)]
        format: GraphFormat,
        /// Emit the full layout + routing payload as JSON
        #[arg(long)]
        unified: bool,
        /// Restrict to the neighbourhood of this entity
        #[arg(long)]
        focus: Option<String>,
        /// Neighbourhood radius in hops (with --focus)
        #[arg(long)]
        depth: Option<usize>,
        #[arg(long)]
        hide_completed: bool,
        #[arg(long)]
        hide_draft: bool,
    },
    /// UML payloads
    Uml {
        #[command(subcommand)]
        command: UmlCommands,
    },
    /// Serve the local dashboard
    Dashboard {
        #[arg(long, default_value_t = 7420)]
        port: u16,
        /// Do not launch a browser
        #[arg(long)]
        no_open: bool,
        /// Permissive CORS for local tooling
        #[arg(long)]
        dev: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum SnapshotCommands {
    /// Capture the current tree
    Create { label: Option<String> },
    /// List snapshots, newest first
    List,
    /// Swap a snapshot back in (the replaced tree is kept as a backup)
    Restore { timestamp: String },
}

#[derive(Subcommand, Debug)]
pub enum UmlCommands {
    #[command(subcommand)]
    Show(UmlTarget),
}

#[derive(Subcommand, Debug)]
pub enum UmlTarget {
    /// Use case diagram payload
    Usecase,
    /// One activity's nodes and transitions
    Activity { id: String },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
}
