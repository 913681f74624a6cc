//! gg - the gitgate binary.

use std::process::ExitCode;

use gitgate::cli::{self, Cli};

fn main() -> ExitCode {
    // Parse early so logging can honor the global flags; clap handles
    // --help/--version itself and exits.
    let cli = Cli::parse_args();

    let default_level = if cli.debug {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    let env = env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, default_level);
    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .init();

    match cli::run_parsed(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
