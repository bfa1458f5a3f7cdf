use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "histsync",
    about = "Multi-writer history merge and prune over a shared transaction log",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the writer's TOML config
    #[arg(short, long, global = true, default_value = "histsync.toml")]
    pub config: PathBuf,

    /// Verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write a config file for one writer
    Init(InitArgs),
    /// Save a record change through the main context
    Append(AppendArgs),
    /// Run one merge-then-prune cycle
    Process,
    /// Watch the shared log and merge outside writes until Ctrl-C
    Watch,
    /// Show roster watermarks and log size
    Status,
    /// List the entries in the shared log
    Log(LogArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// This writer's identifier
    #[arg(long)]
    pub originator: String,
    /// Every writer's identifier, including this one
    #[arg(long, value_delimiter = ',', required = true)]
    pub roster: Vec<String>,
    /// Directory shared by all writers
    #[arg(long)]
    pub data_dir: PathBuf,
    /// fsync every log write
    #[arg(long)]
    pub durable: bool,
    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct AppendArgs {
    #[arg(long)]
    pub entity: String,
    #[arg(long)]
    pub key: String,
    /// Record value as JSON
    #[arg(long, required_unless_present = "delete", conflicts_with = "delete")]
    pub value: Option<String>,
    /// Delete the record instead of writing it
    #[arg(long)]
    pub delete: bool,
}

#[derive(Args)]
pub struct LogArgs {
    /// Show only the newest N entries
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
    /// One line per entry
    #[arg(long)]
    pub oneline: bool,
}
