use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Logs go to stderr so stdout stays free for banners and JSON.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Parses the command line, mapping usage errors to exit code 1.
///
/// `--help` and `--version` print their text and yield exit code 0.
pub fn parse_args<T: Parser>() -> Result<T, ExitCode> {
    T::try_parse().map_err(|err| {
        let _ = err.print();
        if err.use_stderr() {
            ExitCode::from(1)
        } else {
            ExitCode::SUCCESS
        }
    })
}

pub fn report_failure(report: miette::Report) -> ExitCode {
    eprintln!("{report:?}");
    ExitCode::from(1)
}
