use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{info, warn};

use nextstrain_autobuild::cli::{init_tracing, parse_args, report_failure};
use nextstrain_autobuild::fs_util;
use nextstrain_autobuild::genbank::{self, EntrezHttpClient};

#[derive(Parser)]
#[command(name = "fetch-genbank")]
#[command(about = "Download FASTA sequences from GenBank using accession numbers")]
#[command(version)]
struct Cli {
    /// File with one accession number per line
    #[arg(long, short_alias = 'a', alias = "acc")]
    accession: PathBuf,

    /// Folder where <accession>.fasta files are saved
    #[arg(long, short = 'o', alias = "out")]
    output: PathBuf,

    /// Contact address sent to NCBI with each request
    #[arg(long)]
    email: Option<String>,
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
    let accessions = genbank::read_accessions(fs_util::open_text(&cli.accession)?)?;
    let client = EntrezHttpClient::new(cli.email)?;
    let summary = genbank::download_all(&client, &accessions, &cli.output)?;
    if summary.failed.is_empty() {
        info!("all {} sequences downloaded successfully", summary.saved.len());
    } else {
        warn!(
            "downloaded {} of {} sequences; {} failed",
            summary.saved.len(),
            accessions.len(),
            summary.failed.len()
        );
    }
    Ok(())
}
