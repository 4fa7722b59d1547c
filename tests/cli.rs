use std::fs;
use std::process::Command;

const AUTOBUILD: &str = env!("CARGO_BIN_EXE_nextstrain-autobuild");
const RENAME: &str = env!("CARGO_BIN_EXE_rename-headers");

const REQUIRED: [(&str, &str); 3] = [
    ("--sequences", "seqs.fasta"),
    ("--reference", "ref.gb"),
    ("--metadata", "meta.tsv"),
];

#[test]
fn missing_required_input_is_a_usage_error() {
    for skipped in 0..REQUIRED.len() {
        let temp = tempfile::tempdir().unwrap();
        let mut cmd = Command::new(AUTOBUILD);
        cmd.current_dir(temp.path()).arg("--dry-run");
        for (index, (flag, value)) in REQUIRED.iter().enumerate() {
            if index != skipped {
                cmd.args([flag, value]);
            }
        }
        let output = cmd.output().unwrap();
        assert_eq!(output.status.code(), Some(1));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("Usage"), "no usage message: {stderr}");
        assert!(stderr.contains(REQUIRED[skipped].0));
    }
}

#[test]
fn help_exits_cleanly() {
    let output = Command::new(AUTOBUILD).arg("--help").output().unwrap();
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("--sequences"));
}

#[test]
fn dry_run_creates_results_dir_and_prints_plan() {
    let temp = tempfile::tempdir().unwrap();
    let output = Command::new(AUTOBUILD)
        .current_dir(temp.path())
        .args(["-r", "out/nested", "-s", "seqs.fasta", "-f", "ref.gb", "-m", "meta.tsv"])
        .arg("--dry-run")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    assert!(temp.path().join("out/nested").is_dir());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("augur index --sequences seqs.fasta --output out/nested/sequence_index.tsv"));
    assert!(stdout.contains("augur export v2"));
    assert!(!temp.path().join("out/nested/sequence_index.tsv").exists());
}

#[test]
fn longitude_alias_sets_lat_longs() {
    let temp = tempfile::tempdir().unwrap();
    let output = Command::new(AUTOBUILD)
        .current_dir(temp.path())
        .args(["-s", "seqs.fasta", "-f", "ref.gb", "-m", "meta.tsv", "-g", "coords.tsv"])
        .args(["--dry-run", "--json"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let export = plan
        .as_array()
        .unwrap()
        .iter()
        .find(|step| step["step"] == "export")
        .unwrap();
    let args: Vec<&str> = export["args"]
        .as_array()
        .unwrap()
        .iter()
        .map(|arg| arg.as_str().unwrap())
        .collect();
    let index = args.iter().position(|arg| *arg == "--lat-longs").unwrap();
    assert_eq!(args[index + 1], "coords.tsv");
}

#[test]
fn rename_headers_needs_three_arguments() {
    let output = Command::new(RENAME).args(["a.fasta", "map.tsv"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));

    let output = Command::new(RENAME)
        .args(["a.fasta", "map.tsv", "out.fasta", "extra"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn rename_headers_end_to_end() {
    let temp = tempfile::tempdir().unwrap();
    let sequences = temp.path().join("in.fasta");
    let mapping = temp.path().join("map.tsv");
    let renamed = temp.path().join("out.fasta");
    fs::write(&sequences, ">ABC123\nACGT\n>XYZ999\nGGCC\n").unwrap();
    fs::write(&mapping, "ABC123\tStrainX\n").unwrap();

    let output = Command::new(RENAME)
        .args([&sequences, &mapping, &renamed])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(
        fs::read_to_string(&renamed).unwrap(),
        ">StrainX\nACGT\n>UNKNOWN_XYZ999\nGGCC\n"
    );
}
