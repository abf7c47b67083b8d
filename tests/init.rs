use std::process::Command;

#[test]
fn init_creates_valid_toml() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_lodestar"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(output.status.success(), "lodestar init failed: {}", String::from_utf8_lossy(&output.stderr));

    let config_path = dir.path().join(".lodestar.toml");
    assert!(config_path.exists(), ".lodestar.toml should exist");

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[index]"));
    assert!(content.contains("[search]"));
    assert!(content.contains("[scan]"));

    // Verify it's a config lodestar-core accepts
    let config = lodestar_core::LodestarConfig::from_toml(&content).unwrap();
    assert_eq!(config.index.dimensions, lodestar_core::DEFAULT_DIMENSIONS);
}

#[test]
fn init_refuses_if_exists() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".lodestar.toml"), "# existing").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_lodestar"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    let content = std::fs::read_to_string(dir.path().join(".lodestar.toml")).unwrap();
    assert_eq!(content, "# existing");
}
