// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Output format for commands supporting structured output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

const HELP_TEMPLATE: &str = "{about-with-newline}
{usage-heading} {usage}

{before-help}Options:
{options}{after-help}";

const COMMANDS_HELP: &str = "\
Commands:
  status      Show queues and how much is left to sync
  sync        Upload queues left on disk to the server
  clear       Remove queues from disk
";

const QUICKSTART: &str = "\
Get started:
  runq status                          List queues under the data directory
  runq sync .runq/run-1 --url ws://host:7890
  runq clear .runq/run-1               Remove a fully synced queue";

/// Parse a string that must not be empty or whitespace-only.
fn non_empty_string(s: &str) -> Result<String, String> {
    if s.trim().is_empty() {
        Err("cannot be empty".to_string())
    } else {
        Ok(s.to_string())
    }
}

#[derive(Parser, Debug)]
#[command(name = "runq")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Inspect and sync durable run metadata queues")]
#[command(help_template = HELP_TEMPLATE)]
#[command(before_help = COMMANDS_HELP)]
#[command(after_help = QUICKSTART)]
pub struct Cli {
    /// Read queue settings from this TOML file
    #[arg(long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show queues and how much is left to sync
    #[command(after_help = "\
Examples:
  runq status                    All queues under the data directory
  runq status --base /tmp/q      All queues under /tmp/q
  runq status .runq/run-1 -o json")]
    Status {
        /// Queue directories (default: every queue under the base directory)
        dirs: Vec<PathBuf>,

        /// Directory holding queues (default: $RUNQ_DATA_DIR or .runq)
        #[arg(long, value_name = "dir")]
        base: Option<PathBuf>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Upload queues left on disk to the server
    #[command(after_help = "\
Examples:
  runq sync .runq/run-1 --url ws://localhost:7890
  runq sync .runq/a .runq/b --url ws://host:7890 --run-id exp-42")]
    Sync {
        /// Queue directories to sync
        #[arg(required = true)]
        dirs: Vec<PathBuf>,

        /// WebSocket endpoint of the server
        #[arg(long, value_parser = non_empty_string)]
        url: String,

        /// Run the operations belong to (default: the queue directory name)
        #[arg(long, value_parser = non_empty_string)]
        run_id: Option<String>,

        /// Give up after this many seconds without reaching the server
        #[arg(long, value_name = "secs")]
        timeout: Option<u64>,
    },

    /// Remove queues from disk
    #[command(after_help = "\
Examples:
  runq clear .runq/run-1           Remove a fully synced queue
  runq clear .runq/run-1 --force   Remove it even with unsynced operations")]
    Clear {
        /// Queue directories to remove
        #[arg(required = true)]
        dirs: Vec<PathBuf>,

        /// Also remove queues with unsynced operations
        #[arg(long, short)]
        force: bool,
    },
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
