//! The same experiment document in YAML, TOML and JSON resolves identically.

use std::path::{Path, PathBuf};

use advexp_config::{ConfigError, ConfigLoader, DocumentFormat, DEFAULT_DOCUMENT};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

#[test]
fn toml_and_json_match_yaml() {
    let yaml = ConfigLoader::embedded_default().resolve().expect("yaml");
    let toml = ConfigLoader::from_path(fixture("attack.toml"))
        .expect("read toml")
        .resolve()
        .expect("toml");
    let json = ConfigLoader::from_path(fixture("attack.json"))
        .expect("read json")
        .resolve()
        .expect("json");

    assert_eq!(yaml, toml);
    assert_eq!(yaml, json);
    assert_eq!(yaml.fingerprint().unwrap(), toml.fingerprint().unwrap());
}

#[test]
fn format_follows_extension() {
    let loader = ConfigLoader::from_path(fixture("attack.toml")).unwrap();
    assert_eq!(loader.format(), DocumentFormat::Toml);
    assert!(loader.source_name().ends_with("attack.toml"));
}

#[test]
fn yaml_file_on_disk_with_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("experiment.yml");
    std::fs::write(&path, DEFAULT_DOCUMENT).unwrap();

    let config = ConfigLoader::from_path(&path)
        .unwrap()
        .with_override("attack=cw")
        .with_override("dataset=tiny_imagenet")
        .resolve()
        .unwrap();
    assert_eq!(config.logging.run_dir, "attack_logs/cw/tiny_imagenet");
    assert_eq!(config.profile.n_classes, 200);
}

#[test]
fn explicit_format_overrides_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("experiment.conf");
    std::fs::write(&path, std::fs::read_to_string(fixture("attack.json")).unwrap()).unwrap();

    // JSON is valid YAML, but pin the format anyway.
    let config = ConfigLoader::from_path(&path)
        .unwrap()
        .with_format(DocumentFormat::Json)
        .resolve()
        .unwrap();
    assert_eq!(config.logging.run_dir, "attack_logs/fgsm/cifar10");

    let err = ConfigLoader::from_path(&path)
        .unwrap()
        .with_format(DocumentFormat::Toml)
        .resolve()
        .unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ConfigLoader::from_path(dir.path().join("nope.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
    assert!(err.to_string().contains("nope.yaml"));
}
