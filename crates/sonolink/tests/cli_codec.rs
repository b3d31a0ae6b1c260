#![cfg(feature = "cli")]

use std::process::{Command, Output};

fn sonolink(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sonolink"))
        .arg("--log-level")
        .arg("error")
        .args(args)
        .env_remove("SONOLINK_PORT")
        .env_remove("SONOLINK_SOCKET")
        .output()
        .expect("sonolink should run")
}

#[test]
fn encode_prints_the_example_frame() {
    let out = sonolink(&[
        "--format", "pretty", "encode", "--distance", "12.5", "--light", "300",
    ]);

    assert!(out.status.success());
    assert_eq!(
        String::from_utf8_lossy(&out.stdout).trim(),
        "55 00 00 48 41 2C 01 00 00 71 AA"
    );
}

#[test]
fn encode_raw_writes_frame_bytes() {
    let out = sonolink(&[
        "--format", "raw", "encode", "--distance", "12.5", "--light", "300",
    ]);

    assert!(out.status.success());
    assert_eq!(
        out.stdout,
        [0x55, 0x00, 0x00, 0x48, 0x41, 0x2C, 0x01, 0x00, 0x00, 0x71, 0xAA]
    );
}

#[test]
fn encode_json_includes_checksum() {
    let out = sonolink(&[
        "--format", "json", "encode", "--distance", "12.5", "--light", "300",
    ]);

    let value: serde_json::Value =
        serde_json::from_slice(&out.stdout).expect("encode output should be json");
    assert_eq!(value["hex"], "55000048412c01000071aa");
    assert_eq!(value["checksum"], "71");
    assert_eq!(value["light_level"], 300);
}

#[test]
fn decode_valid_frame() {
    let out = sonolink(&["--format", "json", "decode", "55 00 00 48 41 2C 01 00 00 71 AA"]);

    assert!(out.status.success());
    let value: serde_json::Value =
        serde_json::from_slice(&out.stdout).expect("decode output should be json");
    assert_eq!(value["distance_cm"], 12.5);
    assert_eq!(value["light_level"], 300);
    assert_eq!(value["zone"], "mid");
}

#[test]
fn decode_accepts_split_arguments() {
    let out = sonolink(&[
        "--format", "json", "decode", "55", "00", "00", "48", "41", "2C", "01", "00", "00", "71",
        "AA",
    ]);
    assert!(out.status.success());
}

#[test]
fn decode_rejections_exit_data_invalid() {
    for frame in [
        // checksum
        "55000048412C01000070AA",
        // end marker
        "55000048412C01000071AB",
        // start marker
        "54000048412C01000071AA",
        // length
        "55000048412C010000",
        // not hex
        "nothex",
    ] {
        let out = sonolink(&["decode", frame]);
        assert_eq!(out.status.code(), Some(60), "frame {frame}");
        assert!(String::from_utf8_lossy(&out.stderr).contains("error:"));
    }
}

#[test]
fn missing_link_is_a_usage_error() {
    let out = sonolink(&["monitor"]);
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn version_prints_name() {
    let out = sonolink(&["version"]);
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).starts_with("sonolink "));
}
