use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing::info;

use nextstrain_autobuild::cli::{init_tracing, parse_args, report_failure};
use nextstrain_autobuild::config::{ConfigLoader, RunConfig, default_colors, default_lat_longs};
use nextstrain_autobuild::output::{BannerOutput, JsonOutput, OutputMode};
use nextstrain_autobuild::pipeline::{Pipeline, ProgressSink};
use nextstrain_autobuild::runner::SystemCommandRunner;

#[derive(Parser)]
#[command(name = "nextstrain-autobuild")]
#[command(about = "Runs a Nextstrain analysis of RNA virus sequences with augur")]
#[command(
    after_help = "Example usage:\n  nextstrain-autobuild --results my_results --configs my_configs --threads 8 \
                  --sequences my_sequences.fasta --reference reference.gb \
                  --metadata metadata.tsv --title \"My Analysis\""
)]
#[command(version)]
struct Cli {
    /// Directory to store results
    #[arg(short = 'r', long, default_value = "results")]
    results: String,

    /// Directory containing Nextstrain configs
    #[arg(short = 'c', long, default_value = "configs")]
    configs: String,

    /// Number of threads for align and tree
    #[arg(short = 't', long, default_value_t = RunConfig::DEFAULT_THREADS)]
    threads: usize,

    /// FASTA file containing the sequences
    #[arg(short = 's', long)]
    sequences: String,

    /// Reference sequence (FASTA or GenBank)
    #[arg(short = 'f', long)]
    reference: String,

    /// Sequence metadata (TSV)
    #[arg(short = 'm', long)]
    metadata: String,

    /// Latitudes and longitudes file [default: <configs>/lat_longs.tsv]
    #[arg(short = 'l', long, short_alias = 'g', alias = "longitude")]
    lat_longs: Option<String>,

    /// Colors file [default: <configs>/colors.tsv]
    #[arg(short = 'e', long)]
    colors: Option<String>,

    /// Analysis maintainers, e.g. 'Name <URL>; Name2 <URL>'
    #[arg(short = 'n', long)]
    maintainers: Option<String>,

    /// Build URL/repository displayed by auspice
    #[arg(short = 'b', long)]
    build_url: Option<String>,

    /// Include samples matching these values, e.g. host=rat
    #[arg(short = 'w', long)]
    include_where: Option<String>,

    /// File with strains to include regardless of subsampling
    #[arg(short = 'i', long)]
    include_strains: Option<String>,

    /// Title of the build
    #[arg(short = 'T', long, default_value = RunConfig::DEFAULT_TITLE)]
    title: String,

    /// Auspice JSON written by export
    #[arg(short = 'o', long, default_value = RunConfig::DEFAULT_AUSPICE_OUTPUT)]
    auspice_output: String,

    /// Open the result in auspice once export finishes
    #[arg(long)]
    view: bool,

    /// Print the commands without running them
    #[arg(long)]
    dry_run: bool,

    /// Print a JSON summary instead of step banners
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn into_config(self) -> miette::Result<RunConfig> {
        let configs_dir = Utf8PathBuf::from(self.configs);
        let params = ConfigLoader::load_params(&configs_dir)?;
        Ok(RunConfig {
            results_dir: Utf8PathBuf::from(self.results),
            threads: self.threads,
            sequences: Utf8PathBuf::from(self.sequences),
            reference: Utf8PathBuf::from(self.reference),
            metadata: Utf8PathBuf::from(self.metadata),
            lat_longs: self
                .lat_longs
                .map(Utf8PathBuf::from)
                .unwrap_or_else(|| default_lat_longs(&configs_dir)),
            colors: self
                .colors
                .map(Utf8PathBuf::from)
                .unwrap_or_else(|| default_colors(&configs_dir)),
            maintainers: self.maintainers,
            build_url: self.build_url,
            title: self.title,
            include_where: self.include_where,
            include_strains: self.include_strains.map(Utf8PathBuf::from),
            auspice_output: Utf8PathBuf::from(self.auspice_output),
            view: self.view,
            params,
            configs_dir,
        })
    }
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
    let dry_run = cli.dry_run;
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Banners
    };
    let config = cli.into_config()?;
    config.ensure_results_dir()?;
    let pipeline = Pipeline::new(&config);

    if dry_run {
        let plan = pipeline.plan()?;
        match output_mode {
            OutputMode::Json => JsonOutput::print_plan(&plan).into_diagnostic()?,
            OutputMode::Banners => BannerOutput::print_plan(&plan),
        }
        return Ok(());
    }

    let runner = SystemCommandRunner::new();
    let sink: &dyn ProgressSink = match output_mode {
        OutputMode::Json => &JsonOutput,
        OutputMode::Banners => &BannerOutput,
    };
    let summary = pipeline.run(&runner, sink)?;
    info!(
        "build finished: {} steps in {} ms, results in {}",
        summary.steps.len(),
        summary.elapsed_ms,
        summary.results_dir
    );
    if matches!(output_mode, OutputMode::Json) {
        JsonOutput::print_summary(&summary).into_diagnostic()?;
    }
    Ok(())
}
