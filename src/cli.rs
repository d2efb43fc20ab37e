use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// macdeploy - install software from disk images on macOS
#[derive(Parser, Debug)]
#[command(name = "macdeploy")]
#[command(about = "Fetch, mount and install disk-image payloads on macOS")]
#[command(version)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// JSON configuration file with tool paths and directories
    #[arg(long, global = true, env = "MACDEPLOY_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install software
    Install {
        #[command(subcommand)]
        source: InstallCommands,
    },
    /// Show information about installed software
    Info {
        #[command(subcommand)]
        subject: InfoCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum InstallCommands {
    /// Download a DMG, install its payload and verify the result
    Dmg {
        /// URL (or local path) of the disk image
        url: String,

        /// Where the payload is installed, e.g. /Applications/Foo.app
        #[arg(short, long)]
        destination: PathBuf,

        /// Version expected at the destination afterwards
        #[arg(short, long)]
        target: Option<String>,

        /// Install even if the installed version is the same or newer
        #[arg(long)]
        overwrite: bool,

        /// Directory the disk image is downloaded to
        #[arg(long, env = "MACDEPLOY_DOWNLOAD_DIR")]
        download_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum InfoCommands {
    /// Show application bundle details
    App {
        /// Path to the application bundle
        path: PathBuf,

        /// Single key to show, e.g. `identifier` or `short_version.major`
        key: Option<String>,

        /// Print JSON instead of `key: value` lines
        #[arg(short, long)]
        json: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}
