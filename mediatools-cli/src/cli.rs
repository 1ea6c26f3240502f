use clap::{Parser, Subcommand};
use mediatools_core::ToolId;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mediatools", version, about = "Provision yt-dlp and FFmpeg")]
pub struct Cli {
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    pub json: bool,
    #[arg(long, global = true, help = "Path to a JSON config file")]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, help = "Directory holding tools shipped with the application")]
    pub bundled_dir: Option<PathBuf>,
    #[arg(long, global = true, help = "User data directory; downloads go to <dir>/bin")]
    pub user_data_dir: Option<PathBuf>,
    #[arg(short, long, global = true, help = "Enable debug logging")]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Make tools usable, downloading only what is missing
    Setup {
        /// Tools to set up (default: all)
        tools: Vec<ToolId>,
    },
    /// Force a fresh download of a tool into the user bin directory
    Download { tool: ToolId },
    /// Report where a tool is installed and what is wrong with it
    Diagnose { tool: ToolId },
    /// Print the command to spawn for a tool and the tier it came from
    Which { tool: ToolId },
    /// List registry entries for the current OS
    List,
}
