//! CLI argument parsing using clap 4.x derive macros

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Terminal chat pane for a devops assistant backend
///
/// Streams plain-text messages over a WebSocket derived from the backend's
/// HTTP address (`http://host:port` → `ws://host:port/ws/chat`).
#[derive(Parser, Debug)]
#[command(name = "devpane")]
#[command(author, about, long_about = None)]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// The command to execute (defaults to `chat`)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Backend base address (overrides the config file and BACKEND_URL)
    #[arg(short, long, global = true)]
    pub backend_url: Option<String>,

    /// Config file to use instead of the standard locations
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print version information
    #[arg(long)]
    pub version: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open the chat pane
    Chat {
        /// Write the transcript as JSON to this file when the session ends
        #[arg(short, long)]
        save: Option<PathBuf>,

        /// Disable coloured output
        #[arg(long)]
        no_color: bool,
    },

    /// Check the backend's /health and /api/info endpoints
    Probe,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        cmd: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,

    /// Print where the configuration is read from
    Path,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
