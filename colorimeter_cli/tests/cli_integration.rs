use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use assert_cmd::Command;
use tempfile::tempdir;

fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
startup = "Nitrate"
gain = "32x"
precision = 3
"#;
    let path = dir.path().join("colorimeter.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn write_valid_calibrations(dir: &tempfile::TempDir) -> PathBuf {
    let json = r#"{
  "Nitrate": {
    "units": "ppm",
    "led": "630",
    "channel": "630nm",
    "fit_type": "polynomial",
    "fit_coef": [10.0, 1.0]
  }
}"#;
    let path = dir.path().join("calibrations.json");
    fs::write(&path, json).unwrap();
    path
}

fn firmware(dir: &tempfile::TempDir) -> Command {
    let cfg = write_valid_config(dir);
    let cals = write_valid_calibrations(dir);
    let mut cmd = Command::cargo_bin("colorimeter_cli").unwrap();
    cmd.arg("--config").arg(cfg);
    cmd.arg("--calibrations").arg(cals);
    cmd
}

#[test]
fn help_prints_usage() {
    Command::cargo_bin("colorimeter_cli")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"));
}

#[test]
fn read_command_reports_channel_counts_on_stdout() {
    let dir = tempdir().unwrap();
    firmware(&dir)
        .args(["--ticks", "30"])
        .write_stdin("{\"command\": \"read\"}\n")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"command\":\"read\"")
                .and(predicate::str::contains("\"415nm\""))
                .and(predicate::str::contains("\"clear\"")),
        );
}

#[rstest]
#[case::missing_field("{\"noise\": 1}\n", "{\"command\":\"missing\"}")]
#[case::unknown_command("{\"command\": \"launch\"}\n", "unknown command")]
fn protocol_error_responses(#[case] input: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    firmware(&dir)
        .args(["--ticks", "30"])
        .write_stdin(input.to_string())
        .assert()
        .success()
        .stdout(predicate::str::contains(needle));
}

#[test]
fn malformed_line_gets_no_response() {
    let dir = tempdir().unwrap();
    let output = firmware(&dir)
        .args(["--ticks", "30"])
        .write_stdin("}}} not json\n")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(output.stdout.is_empty(), "unexpected stdout: {:?}", output.stdout);
}

#[test]
fn missing_sensor_aborts_but_keeps_serving_serial() {
    let dir = tempdir().unwrap();
    firmware(&dir)
        .args(["--no-sensor", "--ticks", "30"])
        .write_stdin("{\"command\": \"read\"}\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("sensor unavailable"))
        .stderr(predicate::str::contains("ABORTED").and(predicate::str::contains("missing sensor?")));
}

#[test]
fn missing_config_file_shows_a_boot_message() {
    let dir = tempdir().unwrap();
    let cals = write_valid_calibrations(&dir);
    Command::cargo_bin("colorimeter_cli")
        .unwrap()
        .arg("--config")
        .arg(dir.path().join("nope.toml"))
        .arg("--calibrations")
        .arg(cals)
        .args(["--ticks", "10"])
        .assert()
        .success()
        .stderr(predicate::str::contains("failed to read configuration file"));
}

#[test]
fn scripted_menu_press_opens_the_menu() {
    let dir = tempdir().unwrap();
    firmware(&dir)
        .args(["--buttons", "0x08", "--ticks", "30"])
        .assert()
        .success()
        .stderr(
            predicate::str::contains("== menu ==")
                .and(predicate::str::contains("0 Absorbance")),
        );
}

#[test]
fn invalid_button_script_is_rejected() {
    let dir = tempdir().unwrap();
    firmware(&dir)
        .args(["--buttons", "bogus", "--ticks", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid button mask"));
}
