//! CLI integration tests using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn adaptest() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("adaptest").unwrap()
}

#[test]
fn validate_valid_item_bank() {
    adaptest()
        .arg("validate")
        .arg("--item-bank")
        .arg("../../item-banks/algebra.toml")
        .assert()
        .success()
        .stdout(predicate::str::contains("21 items"))
        .stdout(predicate::str::contains("All item banks valid"));
}

#[test]
fn validate_directory() {
    adaptest()
        .arg("validate")
        .arg("--item-bank")
        .arg("../../item-banks")
        .assert()
        .success()
        .stdout(predicate::str::contains("Algebra"))
        .stdout(predicate::str::contains("Geometry"));
}

#[test]
fn validate_reports_warnings() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("odd.toml");
    std::fs::write(
        &path,
        r#"
[item_bank]
id = "odd"
name = "Odd"
subject = "misc"

[[items]]
id = "x1"
prompt = "Pick one"
options = ["a", "b"]
answer = "c"
difficulty = 4.5
"#,
    )
    .unwrap();

    adaptest()
        .arg("validate")
        .arg("--item-bank")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("[x1] WARNING"))
        .stdout(predicate::str::contains("2 warning(s) found"));
}

#[test]
fn validate_rejects_invalid_parameters() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(
        &path,
        r#"
[item_bank]
id = "bad"
name = "Bad"
subject = "misc"

[[items]]
id = "x1"
prompt = "?"
answer = "a"
difficulty = 0.0
guessing = 1.2
"#,
    )
    .unwrap();

    adaptest()
        .arg("validate")
        .arg("--item-bank")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("guessing must be in [0, 1)"));
}

#[test]
fn validate_nonexistent_file() {
    adaptest()
        .arg("validate")
        .arg("--item-bank")
        .arg("nonexistent.toml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    adaptest()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created adaptest.toml"))
        .stdout(predicate::str::contains("Created item-banks/example.toml"));

    assert!(dir.path().join("adaptest.toml").exists());
    assert!(dir.path().join("item-banks/example.toml").exists());

    adaptest()
        .current_dir(dir.path())
        .arg("validate")
        .arg("--item-bank")
        .arg("item-banks/example.toml")
        .assert()
        .success()
        .stdout(predicate::str::contains("5 items"))
        .stdout(predicate::str::contains("All item banks valid"));
}

#[test]
fn init_skips_existing() {
    let dir = TempDir::new().unwrap();

    adaptest()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();

    adaptest()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn estimate_single_correct_response() {
    adaptest()
        .arg("estimate")
        .arg("--item-bank")
        .arg("../../item-banks/algebra.toml")
        .arg("--responses")
        .arg("../../response-logs/single-correct.toml")
        .assert()
        .success()
        .stdout(predicate::str::contains("Theta: 1.078"))
        .stdout(predicate::str::contains("Standard error: 0.235"))
        .stdout(predicate::str::contains("Level: Good"))
        .stdout(predicate::str::contains(
            "Stop: yes (rule first met after response 1)",
        ));
}

#[test]
fn estimate_json_output() {
    let output = adaptest()
        .arg("estimate")
        .arg("--item-bank")
        .arg("../../item-banks/algebra.toml")
        .arg("--responses")
        .arg("../../response-logs/mixed.toml")
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let steps = json["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 4);
    assert_eq!(steps[0]["is_correct"], true);
    assert_eq!(steps[3]["is_correct"], false);
    assert_eq!(json["estimate"]["response_count"], 4);
    assert_eq!(json["stop_rule_first_met"], 1);
    assert_eq!(json["should_stop"], true);
    assert_eq!(json["level"], "average");
    let theta = json["estimate"]["theta"].as_f64().unwrap();
    assert!((theta - -0.3883).abs() < 1e-3, "theta = {theta}");
}

#[test]
fn estimate_honours_config_stop_rule() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("strict.toml");
    std::fs::write(&config, "[stopping]\nse_threshold = 0.1\nmax_responses = 10\n").unwrap();

    adaptest()
        .arg("estimate")
        .arg("--item-bank")
        .arg("../../item-banks/algebra.toml")
        .arg("--responses")
        .arg("../../response-logs/single-correct.toml")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Stop: no"));
}

#[test]
fn estimate_unknown_item_fails() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("log.toml");
    std::fs::write(&log, "[[responses]]\nitem = \"zzz\"\ncorrect = true\n").unwrap();

    adaptest()
        .arg("estimate")
        .arg("--item-bank")
        .arg("../../item-banks/algebra.toml")
        .arg("--responses")
        .arg(&log)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no parameters found for item 'zzz'"));
}

#[test]
fn simulate_writes_reports() {
    let dir = TempDir::new().unwrap();

    adaptest()
        .arg("simulate")
        .arg("--item-bank")
        .arg("../../item-banks/algebra.toml")
        .arg("--thetas")
        .arg("-1,0,1")
        .arg("--replications")
        .arg("5")
        .arg("--seed")
        .arg("7")
        .arg("--format")
        .arg("all")
        .arg("--output")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("RMSE"))
        .stdout(predicate::str::contains("15 sessions"));

    let mut json_reports = 0;
    let mut md_reports = 0;
    for entry in std::fs::read_dir(dir.path()).unwrap() {
        let path = entry.unwrap().path();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => {
                json_reports += 1;
                let report: serde_json::Value =
                    serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
                assert_eq!(report["per_theta"].as_array().unwrap().len(), 3);
                assert_eq!(report["simulation"]["seed"], 7);
            }
            Some("md") => md_reports += 1,
            _ => {}
        }
    }
    assert_eq!((json_reports, md_reports), (1, 1));
}

#[test]
fn simulate_filter_can_empty_the_bank() {
    adaptest()
        .arg("simulate")
        .arg("--item-bank")
        .arg("../../item-banks/algebra.toml")
        .arg("--filter")
        .arg("topology")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no items left"));
}

#[test]
fn compare_identical_simulations() {
    let dir = TempDir::new().unwrap();

    adaptest()
        .arg("simulate")
        .arg("--item-bank")
        .arg("../../item-banks/geometry.toml")
        .arg("--replications")
        .arg("3")
        .arg("--output")
        .arg(dir.path())
        .assert()
        .success();

    let report = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .find(|p| p.extension().is_some_and(|e| e == "json"))
        .unwrap();

    adaptest()
        .arg("compare")
        .arg("--baseline")
        .arg(&report)
        .arg("--current")
        .arg(&report)
        .arg("--fail-on-regression")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 regressions"))
        .stdout(predicate::str::contains("5 unchanged"));
}

#[test]
fn compare_nonexistent_report() {
    adaptest()
        .arg("compare")
        .arg("--baseline")
        .arg("no_such_file.json")
        .arg("--current")
        .arg("also_no_file.json")
        .assert()
        .failure();
}

#[test]
fn info_prints_information_curve() {
    adaptest()
        .arg("info")
        .arg("--item-bank")
        .arg("../../item-banks/geometry.toml")
        .arg("--from")
        .arg("-1")
        .arg("--to")
        .arg("1")
        .arg("--step")
        .arg("1")
        .assert()
        .success()
        .stdout(predicate::str::contains("Geometry (5 items)"))
        .stdout(predicate::str::contains("-1.00"))
        .stdout(predicate::str::contains("1.00"));
}

#[test]
fn take_runs_until_stdin_closes() {
    adaptest()
        .arg("take")
        .arg("--item-bank")
        .arg("../../item-banks/algebra.toml")
        .arg("--examinee")
        .arg("ada")
        .write_stdin("B\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Question 1:"))
        .stdout(predicate::str::contains("Examinee:** ada"));
}

#[test]
fn take_stops_on_the_stopping_rule() {
    // alg-010 (b = 0) is served first; answering it correctly already
    // brings the standard error below 0.3.
    adaptest()
        .arg("take")
        .arg("--item-bank")
        .arg("../../item-banks/algebra.toml")
        .write_stdin("x^2 + 2x + 1\nA\nA\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Correct (theta 1.08)"))
        .stdout(predicate::str::contains("Question 2:").not())
        .stdout(predicate::str::contains("Responses:** 1 (1 correct)"));
}

#[test]
fn help_output() {
    adaptest()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("IRT adaptive testing engine"));
}

#[test]
fn version_output() {
    adaptest()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("adaptest"));
}

#[test]
fn info_rejects_oversized_grid() {
    adaptest()
        .arg("info")
        .arg("--item-bank")
        .arg("../../item-banks/geometry.toml")
        .arg("--step")
        .arg("1e-12")
        .assert()
        .failure()
        .stderr(predicate::str::contains("more than 10000 points"));
}
