//! CLI integration tests for the plugin commands
//!
//! Each test writes a small data directory with synthetic plugins and runs
//! the real binary against it.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tes_plugin::test_utils::PluginFixture;
use tes_plugin::{DecodeLimits, Plugin, PluginName};

fn tes_rs() -> Command {
    Command::cargo_bin("tes-rs").unwrap()
}

fn write(dir: &Path, fixture: PluginFixture, name: &str) {
    fs::write(dir.join(name), fixture.to_bytes().unwrap()).unwrap();
}

/// Base master plus two plugins editing the same item
fn data_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        PluginFixture::new("Base.esm")
            .global(0x800, "GemRate", 1.0)
            .misc_item(0x801, "Ruby", 10, 1.0, &[]),
        "Base.esm",
    );
    write(
        dir.path(),
        PluginFixture::new("Values.esp")
            .master("Base.esm")
            .description("{{BASH:Stats}}")
            .misc_item(0x801, "Ruby", 25, 1.0, &[]),
        "Values.esp",
    );
    write(
        dir.path(),
        PluginFixture::new("Weights.esp")
            .master("Base.esm")
            .misc_item(0x801, "Ruby", 10, 0.5, &[]),
        "Weights.esp",
    );
    fs::write(
        dir.path().join("plugins.txt"),
        "# active plugins\n*Base.esm\n*Values.esp\n*Weights.esp\n",
    )
    .unwrap();
    dir
}

#[test]
fn test_info() {
    let dir = data_dir();
    tes_rs()
        .args(["plugin", "info", "--records"])
        .arg(dir.path().join("Values.esp"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Name: Values.esp"))
        .stdout(predicate::str::contains("[00] Base.esm"))
        .stdout(predicate::str::contains("Ruby"));
}

#[test]
fn test_verify() {
    let dir = data_dir();
    tes_rs()
        .args(["plugin", "verify"])
        .arg(dir.path().join("Base.esm"))
        .assert()
        .success()
        .stdout(predicate::str::contains("byte-identical"));

    fs::write(dir.path().join("Broken.esp"), b"TES4\x10\x00").unwrap();
    tes_rs()
        .args(["plugin", "verify"])
        .arg(dir.path().join("Broken.esp"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to decode plugin"));
}

fn record(signature: &[u8; 4], form_id: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = signature.to_vec();
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&form_id.to_le_bytes());
    out.extend_from_slice(&[0; 8]);
    out.extend_from_slice(payload);
    out
}

fn field(signature: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut out = signature.to_vec();
    out.extend_from_slice(&(data.len() as u16).to_le_bytes());
    out.extend_from_slice(data);
    out
}

fn header(extra: &[u8]) -> Vec<u8> {
    let mut hedr = 1.71f32.to_le_bytes().to_vec();
    hedr.extend_from_slice(&0u32.to_le_bytes());
    hedr.extend_from_slice(&0x800u32.to_le_bytes());
    let mut payload = field(b"HEDR", &hedr);
    payload.extend_from_slice(extra);
    record(b"TES4", 0, &payload)
}

#[test]
fn test_verify_requires_identical_bytes() {
    let dir = TempDir::new().unwrap();

    let latin1 = dir.path().join("Latin1.esp");
    fs::write(&latin1, header(&field(b"CNAM", b"Caf\xE9\0"))).unwrap();
    tes_rs()
        .args(["plugin", "verify"])
        .arg(&latin1)
        .assert()
        .success()
        .stdout(predicate::str::contains("byte-identical"));

    // an XXXX prefix on a short field decodes but is not written back
    let mut payload = field(b"XXXX", &3u32.to_le_bytes());
    payload.extend_from_slice(b"EDID\x00\x00Ab\x00");
    let misc = record(b"MISC", 0x800, &payload);
    let mut bytes = header(&[]);
    bytes.extend_from_slice(b"GRUP");
    bytes.extend_from_slice(&(24 + misc.len() as u32).to_le_bytes());
    bytes.extend_from_slice(b"MISC");
    bytes.extend_from_slice(&[0; 12]);
    bytes.extend_from_slice(&misc);

    let extended = dir.path().join("Extended.esp");
    fs::write(&extended, bytes).unwrap();
    tes_rs()
        .args(["plugin", "verify"])
        .arg(&extended)
        .assert()
        .failure()
        .stderr(predicate::str::contains("differs from the original"));
}

#[test]
fn test_conflicts() {
    let dir = data_dir();
    let config = dir.path().join("merge.yaml");
    fs::write(&config, "tags: honor\n").unwrap();
    tes_rs()
        .args(["plugin", "conflicts", "--data"])
        .arg(dir.path())
        .arg("--load-order")
        .arg(dir.path().join("plugins.txt"))
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Ruby"))
        .stdout(predicate::str::contains("Weights.esp"))
        .stdout(predicate::str::contains("GemRate").not());
}

#[test]
fn test_patch_merges_selected_groups() {
    let dir = data_dir();
    let config = dir.path().join("merge.json");
    fs::write(&config, r#"{"categories":{"MISC":{"selective":["Stats"]}}}"#).unwrap();
    let output = dir.path().join("Bashed Patch, 0.esp");

    tes_rs()
        .args(["plugin", "patch", "--data"])
        .arg(dir.path())
        .arg("--load-order")
        .arg(dir.path().join("plugins.txt"))
        .arg("--config")
        .arg(&config)
        .arg("--skip-redundant")
        .assert()
        .success()
        .stdout(predicate::str::contains("Records: 1"))
        .stdout(predicate::str::contains("Masters: Base.esm"));

    let bytes = fs::read(&output).unwrap();
    let patch = Plugin::decode(
        PluginName::new("Bashed Patch, 0.esp"),
        &bytes,
        &DecodeLimits::default(),
    )
    .unwrap();
    assert_eq!(patch.masters(), vec![PluginName::new("Base.esm")]);
    let data = patch.records().next().unwrap().subrecords().last().unwrap().data.clone();
    assert_eq!(&data[..4], &25i32.to_le_bytes());
    assert_eq!(&data[4..], &0.5f32.to_le_bytes());
}

#[test]
fn test_patch_rejects_unsupported_config() {
    let dir = data_dir();
    let config = dir.path().join("merge.json");
    fs::write(&config, r#"{"categories":{"WEAP":{"selective":["Stats"]}}}"#).unwrap();

    tes_rs()
        .args(["plugin", "patch", "--data"])
        .arg(dir.path())
        .arg("--load-order")
        .arg(dir.path().join("plugins.txt"))
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid merge configuration"));
    assert!(!dir.path().join("Bashed Patch, 0.esp").exists());
}

#[test]
fn test_completions() {
    tes_rs()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tes-rs"));
}
