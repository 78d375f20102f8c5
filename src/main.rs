use clap::Parser;
use tracing_subscriber::EnvFilter;
use whence::cli::{AppContext, Cli, Commands};
use whence::core::errors::{WhenceError, exit_code_for};

fn main() {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,

        no_color: cli.no_color,

        verbose: cli.verbose,
    };

    let result = match cli.command {
        Some(Commands::Enable(args)) => whence::lifecycle::enable_run(args, &ctx),

        Some(Commands::Disable(args)) => whence::lifecycle::disable_run(args, &ctx),

        Some(Commands::Completions(args)) => whence::completion::run(args, &ctx),

        None => whence::query::run(cli.query, &ctx),
    };

    if let Err(err) = result {
        eprintln!("error: {err:#}");
        let code = err
            .downcast_ref::<WhenceError>()
            .map(exit_code_for)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

// RUST_LOG wins; -v / -vv raise the default floor.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
