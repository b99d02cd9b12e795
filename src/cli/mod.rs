//! CLI module for Lektor.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Lektor - ask questions about your course materials
///
/// Indexes course documents and answers questions about them with a model
/// that can search lesson content and look up course outlines.
#[derive(Parser, Debug)]
#[command(name = "lektor")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Ingest this folder before serving (defaults to ingest.docs_dir if it exists)
        #[arg(long)]
        docs: Option<PathBuf>,
    },

    /// Ask a single question about the indexed courses
    Ask {
        /// The question to ask
        question: String,

        /// Show the tool calls made while answering
        #[arg(long)]
        show_tools: bool,
    },

    /// Start an interactive chat session
    Chat,

    /// Index the course documents in a folder
    Ingest {
        /// Folder of .txt/.md course documents (defaults to ingest.docs_dir)
        dir: Option<PathBuf>,

        /// Remove all indexed courses first
        #[arg(long)]
        clear: bool,
    },

    /// List indexed courses
    Courses,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the default configuration file if none exists
    Init,
}
