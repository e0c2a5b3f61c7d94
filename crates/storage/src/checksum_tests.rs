// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

#[test]
fn write_then_verify_round_trips() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), b"alpha").unwrap();
    std::fs::write(dir.path().join("b.txt"), b"beta").unwrap();

    write(dir.path()).unwrap();
    assert!(verify(dir.path()).unwrap());
}

#[test]
fn modified_file_fails_verification() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("data"), b"original").unwrap();
    write(dir.path()).unwrap();

    std::fs::write(dir.path().join("data"), b"tampered").unwrap();
    assert!(!verify(dir.path()).unwrap());
}

#[test]
fn renamed_file_fails_verification() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("before"), b"contents").unwrap();
    write(dir.path()).unwrap();

    std::fs::rename(dir.path().join("before"), dir.path().join("after")).unwrap();
    assert!(!verify(dir.path()).unwrap());
}

#[test]
fn added_file_fails_verification() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("data"), b"contents").unwrap();
    write(dir.path()).unwrap();

    std::fs::write(dir.path().join("extra"), b"sneaky").unwrap();
    assert!(!verify(dir.path()).unwrap());
}

#[test]
fn missing_checksum_file_is_not_trusted() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("data"), b"contents").unwrap();
    assert!(!verify(dir.path()).unwrap());
}

#[test]
fn malformed_checksum_file_is_not_trusted() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("data"), b"contents").unwrap();
    std::fs::write(dir.path().join(CHECKSUM_FILE), b"gibberish").unwrap();
    assert!(!verify(dir.path()).unwrap());
}

#[test]
fn unknown_algorithm_is_not_trusted() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("data"), b"contents").unwrap();
    std::fs::write(dir.path().join(CHECKSUM_FILE), b"md5 abcdef\n").unwrap();
    assert!(!verify(dir.path()).unwrap());
}

#[test]
fn digest_is_stable_across_recomputation() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("data"), b"contents").unwrap();
    let first = write(dir.path()).unwrap();
    let second = write(dir.path()).unwrap();
    assert_eq!(first, second);
}
