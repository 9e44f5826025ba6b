use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Search rotated log folders by time window and pattern", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to the usual search locations)
    #[clap(long, global = true, value_parser)]
    pub config: Option<PathBuf>,

    #[clap(long, global = true, value_parser, default_value_t = false)]
    pub verbose: bool,

    /// Write logs to this file instead of stderr
    #[clap(long, global = true, value_parser)]
    pub log: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

/// Time window shared by the query commands, as `YYYY-MM-DD HH:MM:SS`.
#[derive(clap::Args, Debug, Clone)]
pub struct WindowArgs {
    #[clap(long, value_parser)]
    pub start: String,

    #[clap(long, value_parser)]
    pub end: String,

    /// Directory the folder names are relative to
    #[clap(long, value_parser)]
    pub base_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP search endpoint
    Serve {
        #[clap(long, value_parser)]
        host: Option<String>,

        #[clap(long, value_parser)]
        port: Option<u16>,

        #[clap(long, value_parser)]
        base_dir: Option<PathBuf>,
    },

    /// Print matching lines from the given folders
    Search {
        #[clap(flatten)]
        window: WindowArgs,

        /// Treat the pattern as a regular expression
        #[clap(long, value_parser, default_value_t = false)]
        regex: bool,

        pattern: String,

        #[clap(required = true)]
        folders: Vec<String>,
    },

    /// Print the candidate files a search would scan
    Files {
        #[clap(flatten)]
        window: WindowArgs,

        #[clap(required = true)]
        folders: Vec<String>,
    },

    /// Generate shell completion scripts
    Completions {
        #[clap(value_enum)]
        shell: Shell,
    },
}
