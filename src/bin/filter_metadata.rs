use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use miette::IntoDiagnostic;
use tracing::info;

use nextstrain_autobuild::cli::{init_tracing, parse_args, report_failure};
use nextstrain_autobuild::metadata::{self, DEFAULT_SPECIES, Delimiter, MetadataFilter};
use nextstrain_autobuild::output::JsonOutput;

#[derive(Parser)]
#[command(name = "filter-metadata")]
#[command(about = "Filter a genome metadata table and normalize collection dates for augur")]
#[command(version)]
struct Cli {
    /// Genome table (CSV or TSV, optionally gzipped)
    input: PathBuf,

    /// Directory for metadata_filtered.csv and metadata_filtered.tsv
    #[arg(short = 'o', long, default_value = ".")]
    out_dir: PathBuf,

    /// Accepted species name; repeat for several [default: West Nile virus]
    #[arg(long = "species")]
    species: Vec<String>,

    /// Input delimiter [default: from the file extension]
    #[arg(long, value_enum)]
    delimiter: Option<Delimiter>,

    /// Print the output paths as JSON
    #[arg(long)]
    json: bool,
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
    let filter = if cli.species.is_empty() {
        MetadataFilter::new(DEFAULT_SPECIES)?
    } else {
        MetadataFilter::new(cli.species.as_slice())?
    };
    let records = metadata::read_path(&cli.input, cli.delimiter)?;
    let records = filter.apply(records);
    let outputs = metadata::write_outputs(&records, &cli.out_dir)?;
    info!(
        "kept {} records; wrote {} and {}",
        outputs.rows,
        outputs.csv.display(),
        outputs.tsv.display()
    );
    if cli.json {
        JsonOutput::print_json(&outputs).into_diagnostic()?;
    }
    Ok(())
}
