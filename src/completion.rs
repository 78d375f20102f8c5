//! `completions`: emit a completion script for the user's shell.

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::{generate, generate_to};

use crate::cli::{AppContext, Cli, CompletionsArgs};

const BIN_NAME: &str = "whn";

pub fn run(args: CompletionsArgs, ctx: &AppContext) -> Result<()> {
    let mut cmd = Cli::command();

    // Without --out-dir (or with an explicit --stdout) the script goes to
    // stdout, so `whn completions zsh > _whn` style piping just works.
    let Some(dir) = args.out_dir.filter(|_| !args.stdout) else {
        generate(args.shell, &mut cmd, BIN_NAME, &mut std::io::stdout());
        return Ok(());
    };

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let written = generate_to(args.shell, &mut cmd, BIN_NAME, &dir)
        .with_context(|| format!("Failed to write completion script into {}", dir.display()))?;

    if !ctx.quiet {
        eprintln!("completion script written to {}", written.display());
    }
    Ok(())
}
