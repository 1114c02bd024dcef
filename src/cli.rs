//! CLI argument parsing using clap v4
//!
//! Defines the command-line interface for the tetrahedron tool.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use tetrahedron::module::ModuleCategory;
use tetrahedron::protocol::{ConsentVote, LossType};
use tetrahedron::topology::{Vertex, VertexCategory};

/// Tetrahedron - four-person groups and what happens when one is lost
///
/// Manages tetrahedron modules in a local state file and walks groups
/// through the missing-node protocol: memorial, triad stabilization,
/// consent to a new fourth, or restoration.
#[derive(Parser, Debug)]
#[command(name = "tetrahedron")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(short, long, env = "TETRA_CONFIG", global = true)]
    pub config: Option<String>,

    /// State file (overrides storage.state_file)
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Display version and build information
    Version,

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Create and inspect modules
    Module {
        #[command(subcommand)]
        subcommand: ModuleSubcommand,
    },

    /// Missing-node protocol
    Memorial {
        #[command(subcommand)]
        subcommand: MemorialSubcommand,
    },

    /// Show every group and where it is in the protocol
    Status,
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the current configuration
    Show,

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the configuration
    Validate,
}

/// Module subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ModuleSubcommand {
    /// Create a module from exactly four vertices
    Create {
        /// Group id (also the module id)
        #[arg(short, long)]
        group: String,

        /// Human-readable name
        #[arg(short, long)]
        name: String,

        /// Module category
        #[arg(long, default_value = "family")]
        category: ModuleCategory,

        /// Vertex as id:name:category; give exactly four
        #[arg(long = "vertex", required = true)]
        vertices: Vec<Vertex>,

        /// Replace an existing module for this group
        #[arg(short, long)]
        force: bool,
    },

    /// Show a module's vertices and edges
    Show {
        #[arg(short, long)]
        group: String,
    },

    /// Set the strength of the edge between two vertices
    Edge {
        #[arg(short, long)]
        group: String,

        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,

        /// New strength, clamped to [0, 1]
        #[arg(long, allow_negative_numbers = true)]
        strength: f64,
    },
}

/// Memorial subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum MemorialSubcommand {
    /// Mark a vertex as lost and open triad stabilization
    Mark {
        #[arg(short, long)]
        group: String,

        #[arg(long)]
        vertex: String,

        /// death, departure, distance, drift, disagreement or temporary
        #[arg(long)]
        loss_type: LossType,

        /// Date of the loss (YYYY-MM-DD)
        #[arg(long)]
        loss_date: NaiveDate,

        /// Last day the vertex was active (defaults to the loss date)
        #[arg(long)]
        last_active: Option<NaiveDate>,

        /// Keep the memorial visible after a new fourth joins
        #[arg(long)]
        preserve: bool,

        /// Something the vertex contributed (repeatable)
        #[arg(long = "contribution")]
        contributions: Vec<String>,
    },

    /// Check whether the triad has stabilized
    Check {
        #[arg(short, long)]
        group: String,
    },

    /// Submit the triad's consent votes for a new fourth
    Vote {
        #[arg(short, long)]
        group: String,

        /// vertex=ready|not-ready|needs-discussion (repeatable)
        #[arg(long = "vote", value_parser = parse_vote, required = true)]
        votes: Vec<(String, ConsentVote)>,

        /// Every triad member must vote ready
        #[arg(long)]
        unanimous: bool,

        /// Preferred category for the new fourth
        #[arg(long)]
        prefer: Option<VertexCategory>,
    },

    /// Restore a vertex after a reversible loss
    Restore {
        #[arg(short, long)]
        group: String,

        #[arg(long)]
        vertex: String,
    },

    /// Leave a message on a memorial
    Message {
        #[arg(short, long)]
        group: String,

        #[arg(long)]
        vertex: String,

        #[arg(long)]
        author: String,

        #[arg(long)]
        text: String,
    },

    /// List a group's memorials
    List {
        #[arg(short, long)]
        group: String,
    },

    /// Whether a memorial stays visible as a ghost
    Ghost {
        #[arg(short, long)]
        group: String,

        #[arg(long)]
        vertex: String,
    },
}

/// Parse `vertex=vote`
fn parse_vote(s: &str) -> Result<(String, ConsentVote), String> {
    let (vertex, vote) = s
        .split_once('=')
        .ok_or_else(|| format!("Expected vertex=vote, got '{}'", s))?;
    if vertex.is_empty() {
        return Err(format!("Missing vertex id in '{}'", s));
    }
    Ok((vertex.to_string(), vote.parse()?))
}
