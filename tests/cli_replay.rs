use std::path::PathBuf;
use std::process::Command;

use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_sentry_cli"))
}

fn fixture_file(name: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(name)
        .to_string_lossy()
        .into_owned()
}

#[test]
fn replay_fixture_succeeds() {
    let output = cli()
        .args(["replay", "--fixture", "break_in"])
        .output()
        .expect("failed to run sentry_cli replay");
    assert!(
        output.status.success(),
        "CLI exited with {:?}",
        output.status.code()
    );

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let json: Value = serde_json::from_str(stdout.trim()).expect("replay report JSON payload");
    assert_eq!(json["fixture"], "break_in");
    assert_eq!(json["notification_count"].as_u64(), Some(4));
    assert_eq!(json["final_counter"].as_u64(), Some(4));
}

#[test]
fn replay_fixture_detects_mismatch() {
    let output = cli()
        .args([
            "replay",
            "--fixture",
            "break_in",
            "--expect",
            &fixture_file("break_in_incorrect.expect.json"),
        ])
        .output()
        .expect("failed to run mismatch replay");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8(output.stderr).expect("stderr UTF-8");
    assert!(
        stderr.contains("\"failures\""),
        "expected diff JSON in stderr, got {stderr}"
    );
}

#[test]
fn replay_wraps_slot_ids() {
    let output = cli()
        .args(["replay", "--fixture", "counter_wrap"])
        .output()
        .expect("failed to run counter_wrap replay");
    assert!(
        output.status.success(),
        "CLI exited with {:?}",
        output.status.code()
    );

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let json: Value = serde_json::from_str(stdout.trim()).expect("replay report JSON payload");
    let ids: Vec<u64> = json["notifications"]
        .as_array()
        .expect("notifications array")
        .iter()
        .map(|entry| entry["id"].as_u64().expect("numeric id"))
        .collect();
    assert_eq!(ids, vec![8, 9, 0]);
}

#[test]
fn replay_reports_faults() {
    let output = cli()
        .args(["replay", "--fixture", "sensor_glitch"])
        .output()
        .expect("failed to run sensor_glitch replay");
    assert!(
        output.status.success(),
        "CLI exited with {:?}",
        output.status.code()
    );

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let json: Value = serde_json::from_str(stdout.trim()).expect("replay report JSON payload");
    assert_eq!(json["faults"][0], "interpreter rejected input tensor");
    assert_eq!(json["notification_count"].as_u64(), Some(2));
}

#[test]
fn dump_fixtures_lists_assets() {
    let output = cli()
        .arg("dump-fixtures")
        .output()
        .expect("failed to run dump-fixtures");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    assert!(
        stdout.contains("break_in"),
        "expected fixture listing, got {stdout}"
    );
    assert!(stdout.contains("nursery"));
}

#[test]
fn probe_posts_on_fallback_channel() {
    let output = cli().arg("probe").output().expect("failed to run probe");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let json: Value = serde_json::from_str(stdout.trim()).expect("probe JSON payload");
    assert_eq!(json["channel"]["id"], "test");
    assert_eq!(json["channel"]["name"], "My notification");
    assert!(json["kind"].is_null());
}
