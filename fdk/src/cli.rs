//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::endpoints::SearchField;

/// Flowdeck - API tester console runtime
#[derive(Parser)]
#[command(
    name = "fdk",
    about = "Endpoint catalog, session and flow view tooling for the API tester console",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Serve backend GET requests from this directory instead of http.base-url
    #[arg(long, global = true, value_name = "DIR")]
    pub static_dir: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Browse and edit the endpoint catalog
    Endpoints {
        #[command(subcommand)]
        command: EndpointsCommand,
    },

    /// Log in and store the session
    Login {
        /// Account email
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long)]
        password: String,
    },

    /// Create an account and log in
    Register {
        /// Account email
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long)]
        password: String,

        /// Display name
        #[arg(short, long)]
        name: Option<String>,
    },

    /// End the stored session
    Logout,

    /// Show the logged-in user
    Whoami {
        /// Only show the stored user, skip the profile request
        #[arg(long)]
        offline: bool,
    },

    /// Show persisted application logs
    Logs {
        /// Number of entries to show (newest first)
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,

        /// Delete all persisted entries
        #[arg(long)]
        clear: bool,
    },

    /// Render flow definitions
    Flows {
        #[command(subcommand)]
        command: FlowsCommand,
    },
}

/// Endpoint catalog subcommands
#[derive(Debug, Subcommand)]
pub enum EndpointsCommand {
    /// Load and list endpoints grouped by category
    List {
        /// Only show this category
        #[arg(short = 'C', long)]
        category: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Search the loaded catalog
    Search {
        /// Text to look for
        query: String,

        /// Field to search (repeatable; default: all but id)
        #[arg(short = 'F', long = "field")]
        fields: Vec<SearchField>,

        /// Match whole field values only
        #[arg(long)]
        exact: bool,

        /// Case-sensitive matching
        #[arg(long)]
        case_sensitive: bool,
    },

    /// Show one endpoint as JSON
    Show {
        /// Endpoint ID
        id: String,
    },

    /// Add a custom endpoint from a JSON object
    Add {
        /// Endpoint JSON, e.g. '{"method":"GET","path":"/health"}'
        json: String,
    },

    /// Remove a custom endpoint
    Remove {
        /// Endpoint ID
        id: String,
    },
}

/// Flow subcommands
#[derive(Debug, Subcommand)]
pub enum FlowsCommand {
    /// Render the flow list (and optionally one flow's steps) as an outline
    Show {
        /// JSON file holding a flow array or `{"flows": [...]}`
        file: PathBuf,

        /// ID of the flow to render as active
        #[arg(short, long)]
        active: Option<String>,
    },
}

/// Get the path to the log file
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("flowdeck")
        .join("logs")
        .join("flowdeck.log")
}

/// Output format for list commands
#[derive(Clone, Debug, Default, PartialEq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => {
                debug!(%s, "OutputFormat::from_str: unknown format");
                Err(format!("Unknown format: {}. Use: text or json", s))
            }
        }
    }
}
