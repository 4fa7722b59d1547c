use std::fs;
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use nextstrain_autobuild::config::RunConfig;
use nextstrain_autobuild::error::BuildError;
use nextstrain_autobuild::pipeline::{
    Invocation, Pipeline, ProgressEvent, ProgressSink, Step,
};
use nextstrain_autobuild::runner::{CommandRunner, ExitOutcome};

/// Pretends to be augur: records each call and touches the declared outputs.
#[derive(Default)]
struct FakeRunner {
    fail_at: Option<Step>,
    missing_tool: bool,
    calls: Mutex<Vec<Invocation>>,
    results_dir_seen: Mutex<Vec<bool>>,
    results_dir: Option<Utf8PathBuf>,
}

impl FakeRunner {
    fn failing_at(step: Step) -> Self {
        Self {
            fail_at: Some(step),
            ..Self::default()
        }
    }

    fn steps_called(&self) -> Vec<Step> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|invocation| invocation.step)
            .collect()
    }
}

impl CommandRunner for FakeRunner {
    fn ensure_available(&self, program: &str) -> Result<(), BuildError> {
        if self.missing_tool {
            return Err(BuildError::MissingTool(program.to_string()));
        }
        Ok(())
    }

    fn execute(&self, invocation: &Invocation) -> Result<ExitOutcome, BuildError> {
        self.calls.lock().unwrap().push(invocation.clone());
        if let Some(dir) = &self.results_dir {
            self.results_dir_seen
                .lock()
                .unwrap()
                .push(dir.as_std_path().is_dir());
        }
        if self.fail_at == Some(invocation.step) {
            return Ok(ExitOutcome::failed(1));
        }
        for output in &invocation.outputs {
            fs::write(output.path.as_std_path(), b"").unwrap();
        }
        Ok(ExitOutcome::success())
    }
}

#[derive(Default)]
struct RecordingSink {
    started: Mutex<Vec<Step>>,
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        if let ProgressEvent::Started { step, .. } = event {
            self.started.lock().unwrap().push(step);
        }
    }
}

fn temp_config(root: &tempfile::TempDir) -> RunConfig {
    let root = Utf8PathBuf::from_path_buf(root.path().to_path_buf()).unwrap();
    let mut config = RunConfig::new(
        root.join("results"),
        root.join("configs"),
        root.join("sequences.fasta"),
        root.join("reference.gb"),
        root.join("metadata.tsv"),
    );
    config.auspice_output = root.join("auspice").join("westnile.json");
    config
}

fn arg_after<'a>(invocation: &'a Invocation, flag: &str) -> Option<&'a str> {
    invocation
        .args
        .iter()
        .position(|arg| arg == flag)
        .and_then(|index| invocation.args.get(index + 1))
        .map(String::as_str)
}

#[test]
fn runs_every_step_in_order() {
    let temp = tempfile::tempdir().unwrap();
    let config = temp_config(&temp);
    let runner = FakeRunner::default();
    let sink = RecordingSink::default();

    let summary = Pipeline::new(&config).run(&runner, &sink).unwrap();

    assert_eq!(runner.steps_called(), Step::AUGUR_STEPS.to_vec());
    assert_eq!(*sink.started.lock().unwrap(), Step::AUGUR_STEPS.to_vec());
    assert_eq!(summary.steps.len(), 8);
    assert!(config.auspice_output.as_std_path().exists());
}

#[test]
fn results_dir_exists_before_first_step() {
    let temp = tempfile::tempdir().unwrap();
    let config = temp_config(&temp);
    assert!(!config.results_dir.as_std_path().exists());

    let runner = FakeRunner {
        results_dir: Some(config.results_dir.clone()),
        ..FakeRunner::default()
    };
    Pipeline::new(&config).run(&runner, &RecordingSink::default()).unwrap();

    let seen = runner.results_dir_seen.lock().unwrap();
    assert_eq!(seen.first(), Some(&true));
}

#[test]
fn failing_step_stops_the_build() {
    let temp = tempfile::tempdir().unwrap();
    let config = temp_config(&temp);
    let runner = FakeRunner::failing_at(Step::Align);

    let err = Pipeline::new(&config)
        .run(&runner, &RecordingSink::default())
        .unwrap_err();

    assert_matches!(err, BuildError::StepFailed { ref step, .. } if step == "align");
    assert_eq!(
        runner.steps_called(),
        vec![Step::Index, Step::Filter, Step::Align]
    );
    assert!(config.result_path("filtered.fasta").as_std_path().exists());
    assert!(!config.result_path("aligned.fasta").as_std_path().exists());
    assert!(!config.result_path("tree_raw.nwk").as_std_path().exists());
}

#[test]
fn no_later_outputs_after_any_failure() {
    for (position, failing) in Step::AUGUR_STEPS.iter().enumerate() {
        let temp = tempfile::tempdir().unwrap();
        let config = temp_config(&temp);
        let plan = Pipeline::new(&config).plan().unwrap();
        let runner = FakeRunner::failing_at(*failing);

        let result = Pipeline::new(&config).run(&runner, &RecordingSink::default());

        assert!(result.is_err(), "{failing:?} should fail the build");
        assert_eq!(runner.steps_called().len(), position + 1);
        for later in &plan[position..] {
            for output in &later.outputs {
                assert!(
                    !output.path.as_std_path().exists(),
                    "{} exists after {failing:?} failed",
                    output.path
                );
            }
        }
    }
}

#[test]
fn missing_tool_runs_nothing() {
    let temp = tempfile::tempdir().unwrap();
    let config = temp_config(&temp);
    let runner = FakeRunner {
        missing_tool: true,
        ..FakeRunner::default()
    };

    let err = Pipeline::new(&config)
        .run(&runner, &RecordingSink::default())
        .unwrap_err();

    assert_matches!(err, BuildError::MissingTool(_));
    assert!(runner.steps_called().is_empty());
}

#[test]
fn each_step_reads_previous_outputs() {
    let config = RunConfig::new("res", "cfg", "seqs.fasta", "ref.gb", "meta.tsv");
    let plan = Pipeline::new(&config).plan().unwrap();
    let by_step = |step: Step| plan.iter().find(|inv| inv.step == step).unwrap();

    assert_eq!(
        arg_after(by_step(Step::Filter), "--sequence-index"),
        Some("res/sequence_index.tsv")
    );
    assert_eq!(
        arg_after(by_step(Step::Align), "--sequences"),
        Some("res/filtered.fasta")
    );
    assert_eq!(
        arg_after(by_step(Step::Tree), "--alignment"),
        Some("res/aligned.fasta")
    );
    assert_eq!(
        arg_after(by_step(Step::Refine), "--tree"),
        Some("res/tree_raw.nwk")
    );
    assert_eq!(
        arg_after(by_step(Step::Refine), "--metadata"),
        Some("res/meta.tsv")
    );
    assert_eq!(
        arg_after(by_step(Step::Traits), "--tree"),
        Some("res/tree.nwk")
    );
    assert_eq!(
        arg_after(by_step(Step::Ancestral), "--alignment"),
        Some("res/aligned.fasta")
    );

    let export = by_step(Step::Export);
    assert_eq!(&export.args[..2], &["export", "v2"]);
    assert_eq!(arg_after(export, "--auspice-config"), Some("cfg/auspice_config.json"));
    assert_eq!(arg_after(export, "--lat-longs"), Some("cfg/lat_longs.tsv"));
    assert_eq!(arg_after(export, "--colors"), Some("cfg/colors.tsv"));
    let node_data = export
        .args
        .iter()
        .skip_while(|arg| *arg != "--node-data")
        .skip(1)
        .take(3)
        .cloned()
        .collect::<Vec<_>>();
    assert_eq!(
        node_data,
        vec![
            "res/branch_lengths.json",
            "res/traits.json",
            "res/nt_muts.json"
        ]
    );
}

#[test]
fn threads_only_reach_align_and_tree() {
    let mut config = RunConfig::new("res", "cfg", "seqs.fasta", "ref.gb", "meta.tsv");
    config.threads = 4;
    for invocation in Pipeline::new(&config).plan().unwrap() {
        let threads = arg_after(&invocation, "--nthreads");
        match invocation.step {
            Step::Align | Step::Tree => assert_eq!(threads, Some("4")),
            _ => assert_eq!(threads, None),
        }
    }
}

#[test]
fn optional_filter_flags_only_when_given() {
    let mut config = RunConfig::new("res", "cfg", "seqs.fasta", "ref.gb", "meta.tsv");
    let filter = Pipeline::new(&config).plan().unwrap()[1].clone();
    assert_eq!(filter.step, Step::Filter);
    assert!(!filter.args.iter().any(|arg| arg == "--include"));
    assert!(!filter.args.iter().any(|arg| arg == "--include-where"));

    config.include_where = Some("host=rat".to_string());
    config.include_strains = Some(Utf8PathBuf::from("keep.txt"));
    let filter = Pipeline::new(&config).plan().unwrap()[1].clone();
    assert_eq!(arg_after(&filter, "--include"), Some("keep.txt"));
    assert_eq!(arg_after(&filter, "--include-where"), Some("host=rat"));
}

#[test]
fn export_skips_absent_maintainers() {
    let mut config = RunConfig::new("res", "cfg", "seqs.fasta", "ref.gb", "meta.tsv");
    let export = Pipeline::new(&config).plan().unwrap()[7].clone();
    assert!(!export.args.iter().any(|arg| arg == "--maintainers"));
    assert_eq!(arg_after(&export, "--title"), Some("Nextstrain Analysis"));

    config.maintainers = Some("Lab <https://example.org>".to_string());
    config.title = "WNV Europe".to_string();
    let export = Pipeline::new(&config).plan().unwrap()[7].clone();
    assert_eq!(
        arg_after(&export, "--maintainers"),
        Some("Lab <https://example.org>")
    );
    assert!(export.command_line().contains("--title \"WNV Europe\""));
}

#[test]
fn params_reach_the_command_line() {
    let mut config = RunConfig::new("res", "cfg", "seqs.fasta", "ref.gb", "meta.tsv");
    config.params.clock_rate = 0.001;
    config.params.sequences_per_group = 5;
    let plan = Pipeline::new(&config).plan().unwrap();
    assert_eq!(arg_after(&plan[1], "--sequences-per-group"), Some("5"));
    assert_eq!(arg_after(&plan[4], "--clock-rate"), Some("0.001"));
    assert_eq!(arg_after(&plan[4], "--clock-std-dev"), Some("0.0002"));
}

#[test]
fn view_is_opt_in() {
    let mut config = RunConfig::new("res", "cfg", "seqs.fasta", "ref.gb", "meta.tsv");
    assert!(!Pipeline::new(&config).steps().contains(&Step::View));

    config.view = true;
    let plan = Pipeline::new(&config).plan().unwrap();
    let view = plan.last().unwrap();
    assert_eq!(view.step, Step::View);
    assert_eq!(view.command_line(), "nextstrain view auspice/");
}

#[test]
fn planning_touches_nothing() {
    let temp = tempfile::tempdir().unwrap();
    let config = temp_config(&temp);
    let plan = Pipeline::new(&config).plan().unwrap();
    assert_eq!(plan.len(), 8);
    assert!(!config.results_dir.as_std_path().exists());
}
