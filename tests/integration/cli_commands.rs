#![allow(missing_docs)]

use std::fs;
use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use tempfile::TempDir;
use tessera::{IdConfig, IdLayout, TypeTag};

fn write_config(config: &IdConfig) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("ids.toml");
    fs::write(&path, config.to_toml_string().expect("serialize config")).expect("write config");
    (dir, path)
}

fn stdout_json(args: &[&str]) -> Value {
    let output = cargo_bin_cmd!("tessera")
        .args(["--format", "json"])
        .args(args)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&output).expect("valid json")
}

#[test]
fn encode_prints_the_packed_id() {
    let expected = IdLayout::default()
        .encode(3, TypeTag::Vertex, 42, false)
        .unwrap();
    cargo_bin_cmd!("tessera")
        .args(["encode", "--partition", "3", "--type", "vertex", "--sequence", "42"])
        .assert()
        .success()
        .stdout(format!("{}\n", expected.raw()));
}

#[test]
fn decode_emits_fields_as_json() {
    let id = IdLayout::default()
        .encode(7, TypeTag::Edge, 9, true)
        .unwrap()
        .raw()
        .to_string();
    let json = stdout_json(&["decode", &id]);
    assert_eq!(json["partition"], 7);
    assert_eq!(json["type_tag"], "edge");
    assert_eq!(json["sequence"], 9);
    assert_eq!(json["invisible"], true);
}

#[test]
fn decode_rejects_temporary_ids() {
    cargo_bin_cmd!("tessera")
        .args(["decode", "-7"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn encode_overflow_fails() {
    cargo_bin_cmd!("tessera")
        .args(["encode", "--partition", "32", "--type", "vertex", "--sequence", "1"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn classify_reports_value_class() {
    for (id, class) in [("-3", "temporary"), ("0", "virtual"), ("512", "persisted")] {
        let json = stdout_json(&["classify", id]);
        assert_eq!(json["class"], class, "id {id}");
    }
    cargo_bin_cmd!("tessera")
        .args(["classify", "0"])
        .assert()
        .success()
        .stdout("virtual\n");
}

#[test]
fn layout_honours_config_file() {
    let (_dir, path) = write_config(&IdConfig::wide());
    let path = path.to_str().expect("utf-8 path");
    let json = stdout_json(&["--config", path, "layout"]);
    assert_eq!(json["partition_bits"], 10);
    assert_eq!(json["partitions"], 1024);
    assert_eq!(json["sequence_bits"], 49);
    assert_eq!(json["max_partition"], 1023);

    let expected = IdLayout::new(10)
        .unwrap()
        .encode(3, TypeTag::Vertex, 1, false)
        .unwrap();
    let json = stdout_json(&[
        "--config", path, "encode", "--partition", "3", "--type", "vertex", "--sequence", "1",
    ]);
    assert_eq!(json["id"], expected.raw());
}

#[test]
fn config_path_can_come_from_the_environment() {
    let (_dir, path) = write_config(&IdConfig::single_partition());
    let output = cargo_bin_cmd!("tessera")
        .env("TESSERA_CONFIG", &path)
        .args(["--format", "json", "layout"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["partition_bits"], 0);
    assert_eq!(json["partitions"], 1);

    cargo_bin_cmd!("tessera")
        .env("TESSERA_CONFIG", &path)
        .args(["encode", "--partition", "1", "--type", "vertex", "--sequence", "1"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn layout_text_lists_widths_and_partitions() {
    cargo_bin_cmd!("tessera")
        .env_remove("TESSERA_CONFIG")
        .arg("layout")
        .assert()
        .success()
        .stdout("sequence:54 partition:5 type:3 invisible:1\npartitions=32\n");
}

#[test]
fn invalid_config_file_fails() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("bad.toml");
    fs::write(&path, "partition_bits = 40\n").expect("write config");
    cargo_bin_cmd!("tessera")
        .arg("--config")
        .arg(&path)
        .arg("layout")
        .assert()
        .failure();
}

#[test]
fn config_file_loads_through_the_library() {
    let (_dir, path) = write_config(&IdConfig::single_partition());
    let config = IdConfig::load(&path).unwrap();
    assert_eq!(config, IdConfig::single_partition());
    assert_eq!(config.layout().unwrap().max_partition(), 0);
}
