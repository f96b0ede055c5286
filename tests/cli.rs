mod common;

use std::fs;

use assert_cmd::Command;
use common::TestWorkspace;
use predicates::prelude::*;
use predicates::str::contains;
use rand::{Rng, SeedableRng, rngs::StdRng};

const SMALL_ESTIMATOR: [&str; 6] = [
    "--estimator-min",
    "256",
    "--estimator-avg",
    "1024",
    "--estimator-max",
    "4096",
];

fn bench() -> Command {
    let mut cmd = Command::cargo_bin("dedup-bench").expect("binary exists");
    cmd.env_remove("XTOOL_TOKEN");
    cmd
}

#[test]
fn synthetic_compares_formats_and_exports_records() {
    let workspace = TestWorkspace::new();
    let target = workspace.path().join("synthetic");
    let csv = workspace.path().join("results.csv");
    let json = workspace.path().join("results.json");

    bench()
        .args([
            "synthetic",
            r#"{"a": "int", "b": "str"}"#,
            "--rows",
            "2000",
            "--num-edits",
            "2",
            "--edit-size",
            "5",
            "--cdc-min-size",
            "4",
            "--cdc-max-size",
            "16",
            "--with-json",
            "--with-sqlite",
        ])
        .args(SMALL_ESTIMATOR)
        .arg("--target-dir")
        .arg(&target)
        .arg("--csv")
        .arg(&csv)
        .arg("--json")
        .arg(&json)
        .assert()
        .success()
        .stdout(contains("Dedup Ratio"))
        .stdout(contains("Updated B"))
        .stdout(contains("parquet"))
        .stdout(contains("sqlite"));

    assert!(target.join("deleted/parquet").is_dir());
    let text = fs::read_to_string(&csv).expect("read csv");
    // 6 variants x (3 compressions x 2 chunking modes + json + sqlite), plus the header.
    assert_eq!(text.lines().count(), 6 * 8 + 1);
    let records: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&json).expect("read json")).expect("parse json");
    assert_eq!(records.as_array().map(Vec::len), Some(48));
    assert!(records[0]["dedup_ratio"].as_f64().unwrap() > 0.0);
}

#[test]
fn synthetic_rejects_bad_schemas_and_plans() {
    bench()
        .args(["synthetic", r#"{"a": "decimal"}"#, "--rows", "100"])
        .assert()
        .failure()
        .stderr(contains("error:"));

    let workspace = TestWorkspace::new();
    bench()
        .args([
            "synthetic",
            r#"{"a": "int"}"#,
            "--rows",
            "100",
            "--num-edits",
            "20",
            "--edit-size",
            "10",
        ])
        .arg("--target-dir")
        .arg(workspace.path().join("out"))
        .assert()
        .failure()
        .stderr(contains("synthetic tables"));
    assert!(!workspace.path().join("out").exists());
}

#[test]
fn config_file_replaces_the_format_matrix() {
    let workspace = TestWorkspace::new();
    let config = workspace.write(
        "bench.yml",
        br#"
formats:
  - kind: parquet
    compression: zstd
    cdc: true
estimator: { min: 256, avg: 1024, max: 4096 }
max_workers: 2
"#,
    );
    let csv = workspace.path().join("results.csv");
    bench()
        .args(["synthetic", r#"{"a": "int"}"#, "--rows", "500", "--num-edits", "1"])
        .arg("--config")
        .arg(&config)
        .arg("--target-dir")
        .arg(workspace.path().join("out"))
        .arg("--csv")
        .arg(&csv)
        .assert()
        .success()
        .stdout(contains("zstd-cdc"));
    // deleted, inserted, appended, updated, updated_a
    assert_eq!(fs::read_to_string(&csv).unwrap().lines().count(), 5 + 1);
}

#[test]
fn dedup_reports_the_ratio_of_given_files() {
    let workspace = TestWorkspace::new();
    let mut rng = StdRng::seed_from_u64(5);
    let data = (0..200_000).map(|_| rng.random::<u8>()).collect::<Vec<_>>();
    let a = workspace.write("a.bin", &data);
    let b = workspace.write("b.bin", &data);

    bench()
        .arg("dedup")
        .arg(&a)
        .arg(&b)
        .assert()
        .success()
        .stdout(contains("Files"))
        .stdout(contains("50.00%"));

    bench()
        .arg("dedup")
        .arg(workspace.path().join("missing.bin"))
        .assert()
        .failure()
        .stderr(contains("does not exist"));
}

#[cfg(unix)]
#[test]
fn dedup_includes_the_external_tool_when_configured() {
    let workspace = TestWorkspace::new();
    let tool = workspace.script("xtool", r#"[ -n "$MY_TOKEN" ] || exit 9
echo "transmitted 1024 bytes""#);
    let file = workspace.write("a.bin", &[7u8; 4096]);

    bench()
        .arg("dedup")
        .arg(&file)
        .arg("--xtool-program")
        .arg(&tool)
        .args(["--xtool-token-var", "MY_TOKEN"])
        .env("MY_TOKEN", "secret")
        .assert()
        .success()
        .stdout(contains("External Ratio"))
        .stdout(contains("25.00%"));

    bench()
        .arg("dedup")
        .arg(&file)
        .arg("--xtool-program")
        .arg(&tool)
        .args(["--xtool-token-var", "MY_TOKEN"])
        .env_remove("MY_TOKEN")
        .assert()
        .failure()
        .stderr(contains("MY_TOKEN"));
}

#[test]
fn rewrite_compares_existing_parquet_files() {
    let workspace = TestWorkspace::new();
    let schema = r#"{"a": "int", "b": ["str"]}"#;
    workspace.parquet("day1", common::table(schema, 300, 1));
    workspace.parquet("day2", common::table(schema, 300, 2));
    let target = workspace.path().join("rewrites");

    bench()
        .arg("rewrite")
        .arg(workspace.path())
        .arg("--target-dir")
        .arg(&target)
        .args(["--skip-snappy", "--cdc-min-size", "1", "--cdc-max-size", "4"])
        .args(SMALL_ESTIMATOR)
        .assert()
        .success()
        .stdout(contains("Combined"))
        .stdout(contains("zstd"))
        .stdout(contains("snappy").not());
    assert!(target.join("combined/parquet").is_dir());

    bench()
        .arg("rewrite")
        .arg(workspace.path())
        .arg("--target-dir")
        .arg(&target)
        .args(["--skip-snappy", "--skip-zstd"])
        .assert()
        .failure()
        .stderr(contains("nothing to compare"));
}

#[test]
fn param_impact_requires_a_parameter_choice() {
    let workspace = TestWorkspace::new();
    let input = workspace.parquet("input", common::table(r#"{"a": "int"}"#, 2000, 3));
    let out = workspace.path().join("sweep");

    bench()
        .arg("param-impact")
        .arg(&input)
        .arg(&out)
        .assert()
        .failure();

    bench()
        .arg("param-impact")
        .arg(&input)
        .arg(&out)
        .args(["--row-group-size", "--value", "512,1024"])
        .args(SMALL_ESTIMATOR)
        .assert()
        .success()
        .stdout(contains("Overall"))
        .stdout(contains("row-group-size"));
}
