use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{error, info};

use crate::config::RunConfig;
use crate::error::BuildError;
use crate::runner::CommandRunner;

pub const AUGUR: &str = "augur";
pub const NEXTSTRAIN: &str = "nextstrain";

/// A file one step hands to the steps after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Artifact {
    SequenceIndex,
    FilteredSequences,
    FilteredMetadata,
    FilteredStrains,
    FilterLog,
    Alignment,
    RawTree,
    Tree,
    BranchLengths,
    Traits,
    NucleotideMutations,
    AuspiceJson,
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Artifact::SequenceIndex => "sequence index",
            Artifact::FilteredSequences => "filtered sequences",
            Artifact::FilteredMetadata => "filtered metadata",
            Artifact::FilteredStrains => "filtered strain list",
            Artifact::FilterLog => "filter log",
            Artifact::Alignment => "alignment",
            Artifact::RawTree => "raw tree",
            Artifact::Tree => "time-resolved tree",
            Artifact::BranchLengths => "branch lengths node-data",
            Artifact::Traits => "traits node-data",
            Artifact::NucleotideMutations => "nucleotide mutations node-data",
            Artifact::AuspiceJson => "auspice JSON",
        };
        f.write_str(name)
    }
}

/// Paths produced so far in a build, keyed by artifact kind.
#[derive(Debug, Clone, Default)]
pub struct Artifacts {
    paths: HashMap<Artifact, Utf8PathBuf>,
}

impl Artifacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, artifact: Artifact) -> Option<&Utf8Path> {
        self.paths.get(&artifact).map(Utf8PathBuf::as_path)
    }

    pub fn require(&self, step: Step, artifact: Artifact) -> Result<&Utf8Path, BuildError> {
        self.get(artifact).ok_or_else(|| BuildError::MissingArtifact {
            step: step.name().to_string(),
            artifact: artifact.to_string(),
        })
    }

    pub fn record(&mut self, artifact: Artifact, path: Utf8PathBuf) {
        self.paths.insert(artifact, path);
    }

    pub fn absorb(&mut self, outputs: &[StepOutput]) {
        for output in outputs {
            self.record(output.artifact, output.path.clone());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepOutput {
    pub artifact: Artifact,
    pub path: Utf8PathBuf,
}

/// One fully resolved external command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invocation {
    pub step: Step,
    pub program: String,
    pub args: Vec<String>,
    pub outputs: Vec<StepOutput>,
}

impl Invocation {
    /// Shell-like rendering for logs and dry runs; never executed through a shell.
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().map(|arg| quote(arg)));
        parts.join(" ")
    }
}

fn quote(arg: &str) -> String {
    if !arg.is_empty() && !arg.chars().any(|ch| ch.is_whitespace() || ch == '"' || ch == '\'') {
        return arg.to_string();
    }
    format!("\"{}\"", arg.replace('"', "\\\""))
}

struct ArgList {
    args: Vec<String>,
}

impl ArgList {
    fn new(subcommand: &[&str]) -> Self {
        Self {
            args: subcommand.iter().map(|part| part.to_string()).collect(),
        }
    }

    fn opt(mut self, flag: &str, value: impl fmt::Display) -> Self {
        self.args.push(flag.to_string());
        self.args.push(value.to_string());
        self
    }

    fn opt_if(self, flag: &str, value: Option<impl fmt::Display>) -> Self {
        match value {
            Some(value) => self.opt(flag, value),
            None => self,
        }
    }

    fn multi<T: fmt::Display>(mut self, flag: &str, values: &[T]) -> Self {
        self.args.push(flag.to_string());
        self.args.extend(values.iter().map(ToString::to_string));
        self
    }

    fn positional(mut self, value: impl fmt::Display) -> Self {
        self.args.push(value.to_string());
        self
    }

    fn switch(mut self, flag: &str) -> Self {
        self.args.push(flag.to_string());
        self
    }

    fn finish(self) -> Vec<String> {
        self.args
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Index,
    Filter,
    Align,
    Tree,
    Refine,
    Traits,
    Ancestral,
    Export,
    View,
}

impl Step {
    pub const AUGUR_STEPS: [Step; 8] = [
        Step::Index,
        Step::Filter,
        Step::Align,
        Step::Tree,
        Step::Refine,
        Step::Traits,
        Step::Ancestral,
        Step::Export,
    ];

    /// The ordered steps of a build; `view` is appended only when requested.
    pub fn sequence(config: &RunConfig) -> Vec<Step> {
        let mut steps = Self::AUGUR_STEPS.to_vec();
        if config.view {
            steps.push(Step::View);
        }
        steps
    }

    pub fn name(&self) -> &'static str {
        match self {
            Step::Index => "index",
            Step::Filter => "filter",
            Step::Align => "align",
            Step::Tree => "tree",
            Step::Refine => "refine",
            Step::Traits => "traits",
            Step::Ancestral => "ancestral",
            Step::Export => "export",
            Step::View => "view",
        }
    }

    pub fn banner(&self) -> &'static str {
        match self {
            Step::Index => "Indexing sequences...",
            Step::Filter => "Filtering metadata and sequences...",
            Step::Align => "Aligning virus sequences from FASTA...",
            Step::Tree => "Constructing the phylogeny...",
            Step::Refine => "Constructing the time resolved tree...",
            Step::Traits => "Constructing ancestral traits...",
            Step::Ancestral => "Inferring ancestral traits...",
            Step::Export => "Exporting results to be visualized by auspice...",
            Step::View => "Viewing results with auspice...",
        }
    }

    pub fn program(&self) -> &'static str {
        match self {
            Step::View => NEXTSTRAIN,
            _ => AUGUR,
        }
    }

    /// Resolves this step's command from the configuration and the outputs of earlier steps.
    pub fn build(&self, config: &RunConfig, artifacts: &Artifacts) -> Result<Invocation, BuildError> {
        let (args, outputs) = match self {
            Step::Index => {
                let index = config.result_path("sequence_index.tsv");
                let args = ArgList::new(&["index"])
                    .opt("--sequences", &config.sequences)
                    .opt("--output", &index)
                    .finish();
                (args, vec![output(Artifact::SequenceIndex, index)])
            }
            Step::Filter => {
                let index = artifacts.require(*self, Artifact::SequenceIndex)?;
                let sequences = config.result_path("filtered.fasta");
                let metadata = config.result_path("meta.tsv");
                let strains = config.result_path("strains.tsv");
                let log = config.result_path("output.log");
                let args = ArgList::new(&["filter"])
                    .opt("--metadata", &config.metadata)
                    .opt("--sequences", &config.sequences)
                    .opt("--sequence-index", index)
                    .multi("--group-by", &config.params.group_by)
                    .opt("--sequences-per-group", config.params.sequences_per_group)
                    .opt("--output", &sequences)
                    .opt("--output-metadata", &metadata)
                    .opt("--output-strains", &strains)
                    .opt("--output-log", &log)
                    .opt_if("--include", config.include_strains.as_ref())
                    .opt_if("--include-where", config.include_where.as_ref())
                    .finish();
                (
                    args,
                    vec![
                        output(Artifact::FilteredSequences, sequences),
                        output(Artifact::FilteredMetadata, metadata),
                        output(Artifact::FilteredStrains, strains),
                        output(Artifact::FilterLog, log),
                    ],
                )
            }
            Step::Align => {
                let sequences = artifacts.require(*self, Artifact::FilteredSequences)?;
                let aligned = config.result_path("aligned.fasta");
                let args = ArgList::new(&["align"])
                    .opt("--sequences", sequences)
                    .opt("--reference-sequence", &config.reference)
                    .opt("--output", &aligned)
                    .opt("--nthreads", config.threads)
                    .finish();
                (args, vec![output(Artifact::Alignment, aligned)])
            }
            Step::Tree => {
                let alignment = artifacts.require(*self, Artifact::Alignment)?;
                let tree = config.result_path("tree_raw.nwk");
                let args = ArgList::new(&["tree"])
                    .opt("--alignment", alignment)
                    .opt("--output", &tree)
                    .opt("--nthreads", config.threads)
                    .finish();
                (args, vec![output(Artifact::RawTree, tree)])
            }
            Step::Refine => {
                let alignment = artifacts.require(*self, Artifact::Alignment)?;
                let raw_tree = artifacts.require(*self, Artifact::RawTree)?;
                let metadata = artifacts.require(*self, Artifact::FilteredMetadata)?;
                let tree = config.result_path("tree.nwk");
                let branch_lengths = config.result_path("branch_lengths.json");
                let params = &config.params;
                let args = ArgList::new(&["refine"])
                    .opt("--alignment", alignment)
                    .opt("--tree", raw_tree)
                    .opt("--metadata", metadata)
                    .opt("--output-tree", &tree)
                    .opt("--output-node-data", &branch_lengths)
                    .switch("--timetree")
                    .opt("--coalescent", &params.coalescent)
                    .opt("--date-inference", &params.date_inference)
                    .switch("--stochastic-resolve")
                    .opt("--clock-std-dev", params.clock_std_dev)
                    .opt("--clock-rate", params.clock_rate)
                    .switch("--date-confidence")
                    .finish();
                (
                    args,
                    vec![
                        output(Artifact::Tree, tree),
                        output(Artifact::BranchLengths, branch_lengths),
                    ],
                )
            }
            Step::Traits => {
                let tree = artifacts.require(*self, Artifact::Tree)?;
                let metadata = artifacts.require(*self, Artifact::FilteredMetadata)?;
                let traits = config.result_path("traits.json");
                let args = ArgList::new(&["traits"])
                    .opt("--tree", tree)
                    .opt("--metadata", metadata)
                    .multi("--columns", &config.params.trait_columns)
                    .switch("--confidence")
                    .opt("--output-node-data", &traits)
                    .finish();
                (args, vec![output(Artifact::Traits, traits)])
            }
            Step::Ancestral => {
                let tree = artifacts.require(*self, Artifact::Tree)?;
                let alignment = artifacts.require(*self, Artifact::Alignment)?;
                let mutations = config.result_path("nt_muts.json");
                let args = ArgList::new(&["ancestral"])
                    .opt("--tree", tree)
                    .opt("--alignment", alignment)
                    .opt("--output-node-data", &mutations)
                    .finish();
                (args, vec![output(Artifact::NucleotideMutations, mutations)])
            }
            Step::Export => {
                let tree = artifacts.require(*self, Artifact::Tree)?;
                let node_data = [
                    artifacts.require(*self, Artifact::BranchLengths)?,
                    artifacts.require(*self, Artifact::Traits)?,
                    artifacts.require(*self, Artifact::NucleotideMutations)?,
                ];
                let args = ArgList::new(&["export", "v2"])
                    .opt("--auspice-config", config.auspice_config())
                    .opt("--title", &config.title)
                    .opt_if("--maintainers", config.maintainers.as_ref())
                    .opt_if("--build-url", config.build_url.as_ref())
                    .opt("--tree", tree)
                    .multi("--node-data", &node_data)
                    .opt("--colors", &config.colors)
                    .opt("--lat-longs", &config.lat_longs)
                    .multi("--color-by-metadata", &config.params.color_by_metadata)
                    .opt("--output", &config.auspice_output)
                    .finish();
                (
                    args,
                    vec![output(Artifact::AuspiceJson, config.auspice_output.clone())],
                )
            }
            Step::View => {
                artifacts.require(*self, Artifact::AuspiceJson)?;
                let args = ArgList::new(&["view"])
                    .positional(format!("{}/", config.auspice_dir()))
                    .finish();
                (args, Vec::new())
            }
        };

        Ok(Invocation {
            step: *self,
            program: self.program().to_string(),
            args,
            outputs,
        })
    }
}

fn output(artifact: Artifact, path: Utf8PathBuf) -> StepOutput {
    StepOutput { artifact, path }
}

#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Started { step: Step, banner: &'static str },
    Finished { step: Step, elapsed: Duration },
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: Step,
    pub command: String,
    pub elapsed_ms: u128,
    pub outputs: Vec<StepOutput>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub results_dir: Utf8PathBuf,
    pub steps: Vec<StepReport>,
    pub elapsed_ms: u128,
}

pub struct Pipeline<'a> {
    config: &'a RunConfig,
    steps: Vec<Step>,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a RunConfig) -> Self {
        Self {
            steps: Step::sequence(config),
            config,
        }
    }

    pub fn with_steps(config: &'a RunConfig, steps: Vec<Step>) -> Self {
        Self { config, steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Resolves every command without running anything.
    pub fn plan(&self) -> Result<Vec<Invocation>, BuildError> {
        let mut artifacts = Artifacts::new();
        let mut plan = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let invocation = step.build(self.config, &artifacts)?;
            artifacts.absorb(&invocation.outputs);
            plan.push(invocation);
        }
        Ok(plan)
    }

    /// Runs the steps in order, stopping at the first one that does not exit cleanly.
    pub fn run(
        &self,
        runner: &dyn CommandRunner,
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, BuildError> {
        let started = Instant::now();
        self.config.ensure_results_dir()?;
        self.config.check_configs_dir();

        let mut programs: Vec<&str> = self.steps.iter().map(Step::program).collect();
        programs.dedup();
        for program in programs {
            runner.ensure_available(program)?;
        }

        let mut artifacts = Artifacts::new();
        let mut reports = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let invocation = step.build(self.config, &artifacts)?;
            prepare_output_dirs(&invocation.outputs)?;

            sink.event(ProgressEvent::Started {
                step: *step,
                banner: step.banner(),
            });
            info!(step = step.name(), "running {}", invocation.command_line());
            let step_started = Instant::now();
            let outcome = runner.execute(&invocation)?;
            if !outcome.is_success() {
                error!(
                    step = step.name(),
                    "error executing command: {}",
                    invocation.command_line()
                );
                return Err(BuildError::StepFailed {
                    step: step.name().to_string(),
                    status: outcome.describe(),
                    command: invocation.command_line(),
                });
            }
            let elapsed = step_started.elapsed();
            sink.event(ProgressEvent::Finished {
                step: *step,
                elapsed,
            });

            artifacts.absorb(&invocation.outputs);
            reports.push(StepReport {
                step: *step,
                command: invocation.command_line(),
                elapsed_ms: elapsed.as_millis(),
                outputs: invocation.outputs,
            });
        }

        Ok(RunSummary {
            results_dir: self.config.results_dir.clone(),
            steps: reports,
            elapsed_ms: started.elapsed().as_millis(),
        })
    }
}

fn prepare_output_dirs(outputs: &[StepOutput]) -> Result<(), BuildError> {
    for output in outputs {
        if let Some(parent) = output.path.parent().filter(|p| !p.as_str().is_empty()) {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| BuildError::Filesystem(format!("create {parent}: {err}")))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RunConfig {
        RunConfig::new("results", "configs", "seqs.fasta", "ref.gb", "meta.tsv")
    }

    #[test]
    fn later_step_needs_earlier_output() {
        let err = Step::Align.build(&config(), &Artifacts::new()).unwrap_err();
        assert!(matches!(err, BuildError::MissingArtifact { .. }));
    }

    #[test]
    fn align_reads_filtered_sequences() {
        let mut artifacts = Artifacts::new();
        artifacts.record(
            Artifact::FilteredSequences,
            Utf8PathBuf::from("results/filtered.fasta"),
        );
        let invocation = Step::Align.build(&config(), &artifacts).unwrap();
        assert_eq!(
            invocation.command_line(),
            "augur align --sequences results/filtered.fasta --reference-sequence ref.gb \
             --output results/aligned.fasta --nthreads 8"
        );
    }

    #[test]
    fn traits_and_ancestral_banners() {
        assert_eq!(Step::Traits.banner(), "Constructing ancestral traits...");
        assert_eq!(Step::Ancestral.banner(), "Inferring ancestral traits...");
    }

    #[test]
    fn quoting_only_when_needed() {
        assert_eq!(quote("plain"), "plain");
        assert_eq!(quote("My Analysis"), "\"My Analysis\"");
        assert_eq!(quote(""), "\"\"");
    }
}
