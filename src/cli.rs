use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub verbose: u8,    // global -v occurrences
}

#[derive(Parser)]
#[command(name = "whn")]
#[command(about = "Attribute surviving source lines to the recorded AI edits that wrote them")]
#[command(version, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Default action: query a file's surviving edits
    #[command(flatten)]
    pub query: QueryArgs,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress progress bars and non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Raise log verbosity (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the provenance store for this repository
    Enable(EnableArgs),

    /// Stop recording without deleting history
    Disable(DisableArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Parser, Debug, Default)]
pub struct QueryArgs {
    /// File to query (repo-relative or absolute)
    pub path: Option<Utf8PathBuf>,

    /// Line filter: a single line `n`, or a range `a:b` / `a,b`
    #[arg(short = 'L', value_name = "SPEC")]
    pub line: Option<String>,

    /// Only edits at or after this date (RFC 3339 or YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub since: Option<String>,

    /// Only edits by this author
    #[arg(long, value_name = "NAME")]
    pub author: Option<String>,

    /// Only edits whose prompt, change, or reason contains this text
    #[arg(long, value_name = "TEXT")]
    pub grep: Option<String>,

    /// Only edits carrying this trace id
    #[arg(long, value_name = "ID")]
    pub trace: Option<String>,

    /// Include prompt and reasoning in the output
    #[arg(long)]
    pub explain: bool,

    /// Print store summary statistics instead of querying
    #[arg(long)]
    pub stats: bool,

    /// Force an index rebuild before querying
    #[arg(long)]
    pub rebuild: bool,

    /// Backfill empty reason columns from prompts during rebuild
    #[arg(long)]
    pub fill_reasons: bool,

    /// Keep superseded edits in file-wide output
    #[arg(long)]
    pub include_history: bool,

    /// Emit a JSON array instead of human text
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct EnableArgs {
    /// Directory inside the repository to enable
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Parser, Debug)]
pub struct DisableArgs {
    /// Directory inside the repository to disable
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Parser)]
pub struct CompletionsArgs {
    /// Shell to generate a completion script for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,

    /// Write the script into this directory instead of stdout
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Force stdout even when --out-dir is set
    #[arg(long)]
    pub stdout: bool,
}
