//! Runs the `advexp` binary end to end.

use std::process::{Command, Output};

fn advexp(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_advexp"))
        .args(args)
        .env_remove("ADVEXP_CONFIG")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run advexp")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn resolve_prints_run_dir() {
    let out = advexp(&["resolve", "--output", "json", "attack=pgd", "dataset=cifar100"]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let value: serde_json::Value = serde_json::from_str(&stdout(&out)).expect("json output");
    assert_eq!(value["logging.run_dir"], "attack_logs/pgd/cifar100");
    assert_eq!(value["n_classes"], 100);
    assert_eq!(value["margin"], 1.0);
}

#[test]
fn invalid_dataset_exits_non_zero_and_names_field() {
    let out = advexp(&["validate", "dataset=imagenet"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("dataset"), "stderr: {stderr}");
    assert!(stderr.contains("imagenet"), "stderr: {stderr}");
}

#[test]
fn digest_is_stable_across_runs() {
    let a = advexp(&["digest", "seed=7"]);
    let b = advexp(&["digest", "seed=7"]);
    assert!(a.status.success());
    assert_eq!(stdout(&a), stdout(&b));
    assert_eq!(stdout(&a).trim().len(), 64);
}

#[test]
fn config_file_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("attack.yaml");
    let default = advexp(&["show-default"]);
    assert!(default.status.success());
    std::fs::write(&path, &default.stdout).unwrap();

    let path_arg = path.to_str().unwrap();
    let out = advexp(&["validate", "--config", path_arg, "attack=cw"]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert!(stdout(&out).contains("attack_logs/cw/cifar10"));
}

#[test]
fn missing_config_file_fails() {
    let out = advexp(&["resolve", "--config", "/nonexistent/advexp.yaml"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("advexp.yaml"));
}
