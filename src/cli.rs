use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use filetrigger::TriggerConfig;

/// Run a command whenever a file or directory changes.
///
/// filetrigger watches a path, waits for bursts of changes to settle, ignores hidden files and
/// directories, and re-runs the given command once per burst (and once at startup).
#[derive(Parser, Debug)]
#[command(
    name = "filetrigger",
    version,
    about,
    long_about = None,
    propagate_version = true,
)]
pub struct Cli {
    /// Log debug output to stderr (RUST_LOG overrides this).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch a file or directory and run a command on every change.
    ///
    /// The command runs once immediately, then once per debounced change. It receives
    /// FILETRIGGER_KIND (initial, create, write, rename, remove, chmod, other) and
    /// FILETRIGGER_PATH in its environment. Ctrl-C stops watching.
    Watch(WatchArgs),

    /// Atomically replace a file with the contents of stdin.
    Write {
        /// File to replace.
        path: PathBuf,

        /// Permission bits of the new file, in octal.
        #[arg(long, default_value = "644", value_parser = parse_mode)]
        mode: u32,
    },
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// File or directory to watch.
    pub path: PathBuf,

    /// Include subdirectories when watching a directory.
    #[arg(short, long)]
    pub recursive: bool,

    /// Watch only direct children, even if the config file sets `recursive = true`.
    #[arg(long, conflicts_with = "recursive")]
    pub no_recursive: bool,

    /// Quiet period after a change before the command runs (default 100).
    #[arg(long)]
    pub debounce_ms: Option<u64>,

    /// Capacity of the raw event queue (default 64).
    #[arg(long)]
    pub queue_depth: Option<usize>,

    /// Log command failures and keep watching instead of exiting on the first one.
    #[arg(long)]
    pub keep_going: bool,

    /// Print every trigger as a JSON line on stdout before running the command.
    #[arg(long)]
    pub json: bool,

    /// Config file to use instead of ./filetrigger.toml.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Command and arguments to run.
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

impl WatchArgs {
    /// Recursion after applying the command line over the config file.
    pub fn recursive(&self, config: &TriggerConfig) -> bool {
        if self.recursive {
            true
        } else if self.no_recursive {
            false
        } else {
            config.recursive.unwrap_or(false)
        }
    }
}

fn parse_mode(raw: &str) -> Result<u32, String> {
    let digits = raw.strip_prefix("0o").unwrap_or(raw);
    u32::from_str_radix(digits, 8).map_err(|err| format!("invalid octal mode {raw:?}: {err}"))
}
