use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::info;

use nextstrain_autobuild::cli::{init_tracing, parse_args, report_failure};
use nextstrain_autobuild::fasta;

#[derive(Parser)]
#[command(name = "extract-sequences")]
#[command(about = "Extract sequences from a FASTA file based on a list of IDs")]
#[command(after_help = "Example usage: extract-sequences --ids ids.txt --input input.fasta --output output.fasta")]
#[command(version)]
struct Cli {
    /// File containing list of IDs, one per line
    #[arg(long)]
    ids: PathBuf,
    /// Input FASTA file
    #[arg(long)]
    input: PathBuf,
    /// Output FASTA file for matched sequences
    #[arg(long)]
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
    let kept = fasta::extract_file(&cli.ids, &cli.input, &cli.output)?;
    info!("wrote {kept} matching sequences to {}", cli.output.display());
    Ok(())
}
