//! Integration tests for `embroider-bridge resolve`.

use serial_test::serial;
use std::process::Command;

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args([
        "run",
        "-q",
        "-p",
        "embroider-bridge-cli",
        "--bin",
        "embroider-bridge",
        "--",
    ]);
    cmd
}

#[test]
#[serial]
fn test_resolve_json_handled_and_default() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    std::fs::create_dir_all(&src).unwrap();
    std::fs::write(src.join("a.js"), "import './b';").unwrap();
    std::fs::write(src.join("b.js"), "").unwrap();

    let output = cargo_bin()
        .args(["--json", "resolve", "./b", "./nope", "--context"])
        .arg(&src)
        .arg("--issuer")
        .arg(src.join("a.js"))
        .output()
        .expect("failed to run embroider-bridge");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let results: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["specifier"], "./b");
    assert_eq!(results[0]["outcome"], "handled");
    assert_eq!(results[1]["specifier"], "./nope");
    assert_eq!(results[1]["outcome"], "default");
}

#[test]
#[serial]
fn test_resolve_json_virtual_rule() {
    let dir = tempfile::tempdir().unwrap();
    let rules = dir.path().join("resolver.json");
    std::fs::write(
        &rules,
        r##"{"virtualFiles":{"#entry":"/app/assets/app.js"}}"##,
    )
    .unwrap();

    let output = cargo_bin()
        .args(["--json", "resolve", "#entry"])
        .args(["--issuer", "/app/index.js", "--context", "/app"])
        .arg("--rules")
        .arg(&rules)
        .args(["--app-root", "/app"])
        .output()
        .expect("failed to run embroider-bridge");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let results: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let request = results[0]["record"]["request"].as_str().unwrap();
    assert!(
        request.starts_with("!@embroider/webpack/src/virtual-loader?f=%2Fapp%2Fassets%2Fapp.js")
    );
}

#[test]
#[serial]
fn test_resolve_bad_rules_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let rules = dir.path().join("resolver.json");
    std::fs::write(&rules, "{").unwrap();

    let output = cargo_bin()
        .args(["resolve", "./a", "--rules"])
        .arg(&rules)
        .output()
        .expect("failed to run embroider-bridge");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to parse config"));
}

#[test]
#[serial]
fn test_version() {
    let output = cargo_bin()
        .arg("version")
        .output()
        .expect("failed to run embroider-bridge");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("embroider-bridge "));
}
