//! Corruption recovery tests for the caprock binary.
//!
//! These tests verify the system can handle:
//! - Unparseable storage files
//! - Truncated trailing records
//! - References to entities that no longer exist

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn cli(data_dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("caprock"));
    cmd.arg("--data-dir").arg(data_dir);
    cmd
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

const LIQUIDS: &str = "Vodka\n0.400000\n0.916000\n12.500000\nBL\n-----\n\
                       Sprite\n0.000000\n1.037000\n16.000000\nBR\n-----\n";
const DRINKS: &str = "Vodka Sprite\n2\nVodka\n1.500000\nSprite\n10.500000\n-----\n";
const USERS: &str = "Brian\nMale\n165.000000\nHeavy\n1\n03-03-20 20:15:30\nVodka Sprite\n-----\n";

fn write_all(dir: &Path, liquids: &str, drinks: &str, users: &str) {
    fs::write(dir.join("liquid_storage.txt"), liquids).unwrap();
    fs::write(dir.join("drink_storage.txt"), drinks).unwrap();
    fs::write(dir.join("user_storage.txt"), users).unwrap();
}

fn status_json(dir: &Path) -> serde_json::Value {
    let output = cli(dir)
        .args(["status", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&output).expect("status is JSON")
}

#[test]
fn test_corrupted_drink_file_is_quarantined() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    write_all(data_dir, LIQUIDS, "Broken\nnot-a-number\n-----\n", USERS);

    let status = status_json(data_dir);
    assert_eq!(status["liquids"].as_array().unwrap().len(), 2);
    assert_eq!(status["drinks"].as_array().unwrap().len(), 0);
    // History pointed at drinks that failed to load
    assert_eq!(
        status["profiles"][0]["consumptions"].as_array().unwrap().len(),
        0
    );

    assert_eq!(
        fs::read_to_string(data_dir.join("drink_storage.txt.corrupt")).unwrap(),
        "Broken\nnot-a-number\n-----\n"
    );
}

#[test]
fn test_truncated_liquid_file_keeps_other_streams() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    // Last record lost its sentinel mid-write
    write_all(
        data_dir,
        "Vodka\n0.400000\n0.916000\n12.500000\nBL\n-----\nSprite\n0.000000\n",
        "",
        "Taylor\nFemale\n130.000000\nRegular\n0\n-----\n",
    );

    let status = status_json(data_dir);
    assert_eq!(status["liquids"].as_array().unwrap().len(), 0);
    assert_eq!(status["profiles"][0]["name"], "Taylor");
    assert!(data_dir.join("liquid_storage.txt.corrupt").exists());
}

#[test]
fn test_dangling_references_dropped_on_next_save() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    // Sprite was deleted by hand; the drink keeps only its Vodka part
    write_all(
        data_dir,
        "Vodka\n0.400000\n0.916000\n12.500000\nBL\n-----\n",
        DRINKS,
        USERS,
    );

    cli(data_dir)
        .args(["liquid", "add", "Gin", "--abv", "0.4", "--density", "0.95"])
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(data_dir.join("drink_storage.txt")).unwrap(),
        "Vodka Sprite\n1\nVodka\n1.500000\n-----\n"
    );
    assert!(!data_dir.join("drink_storage.txt.corrupt").exists());
}

#[test]
fn test_unknown_container_code_rejects_stream() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    write_all(
        data_dir,
        "Vodka\n0.400000\n0.916000\n12.500000\nTOP\n-----\n",
        "",
        "",
    );

    cli(data_dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Vodka").not());
    assert!(data_dir.join("liquid_storage.txt.corrupt").exists());
}

#[test]
fn test_missing_files_load_as_empty() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    fs::write(data_dir.join("liquid_storage.txt"), LIQUIDS).unwrap();

    let status = status_json(data_dir);
    assert_eq!(status["liquids"].as_array().unwrap().len(), 2);
    assert_eq!(status["containers"]["BL"], "Vodka");
    assert!(status["drinks"].as_array().unwrap().is_empty());
}

#[test]
fn test_save_after_recovery_rewrites_clean_file() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    write_all(data_dir, LIQUIDS, DRINKS, "garbage without sentinel");

    cli(data_dir)
        .args([
            "profile",
            "add",
            "Ann",
            "--sex",
            "f",
            "--weight",
            "100",
            "--experience",
            "light",
        ])
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(data_dir.join("user_storage.txt")).unwrap(),
        "Ann\nFemale\n100.000000\nLight\n0\n-----\n"
    );
    assert_eq!(
        fs::read_to_string(data_dir.join("user_storage.txt.corrupt")).unwrap(),
        "garbage without sentinel"
    );
}
