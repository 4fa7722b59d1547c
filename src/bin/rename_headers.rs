use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::info;

use nextstrain_autobuild::cli::{init_tracing, parse_args, report_failure};
use nextstrain_autobuild::fasta;

#[derive(Parser)]
#[command(name = "rename-headers")]
#[command(about = "Rename FASTA headers through a two-column old-id/new-id table")]
#[command(version)]
struct Cli {
    /// Input FASTA file
    sequences: PathBuf,
    /// Two-column mapping file (old id, new id)
    mapping: PathBuf,
    /// Output FASTA file
    output: PathBuf,
}

fn main() -> ExitCode {
    let cli = match parse_args::<Cli>() {
        Ok(cli) => cli,
        Err(code) => return code,
    };
    init_tracing();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => report_failure(report),
    }
}

fn run(cli: Cli) -> miette::Result<()> {
    let stats = fasta::rename_file(&cli.sequences, &cli.mapping, &cli.output)?;
    info!(
        "wrote {}: {} headers renamed, {} without a mapping",
        cli.output.display(),
        stats.renamed,
        stats.unknown
    );
    Ok(())
}
