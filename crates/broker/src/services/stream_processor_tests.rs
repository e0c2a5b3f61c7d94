// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn processor() -> StreamProcessor {
    StreamProcessor::new(PartitionId(1), StreamProcessorMode::Processing)
}

#[test]
fn starts_with_no_position_and_unpaused() {
    let sp = processor();
    assert_eq!(sp.last_processed_position(), NO_POSITION);
    assert!(!sp.is_paused());
}

#[test]
fn positions_only_move_forward() {
    let sp = processor();
    sp.record_processed(5);
    sp.record_processed(3);
    assert_eq!(sp.last_processed_position(), 5);
    sp.record_processed(9);
    assert_eq!(sp.last_processed_position(), 9);
}

#[test]
fn pause_and_resume_toggle() {
    let sp = processor();
    sp.pause();
    assert!(sp.is_paused());
    sp.pause();
    assert!(sp.is_paused());
    sp.resume();
    assert!(!sp.is_paused());
}

#[test]
fn closed_processor_ignores_position_reports() {
    let sp = processor();
    sp.record_processed(4);
    sp.close();
    sp.record_processed(10);
    assert_eq!(sp.last_processed_position(), 4);
}

#[test]
fn clones_share_state() {
    let sp = processor();
    let other = sp.clone();
    other.record_processed(2);
    assert_eq!(sp.last_processed_position(), 2);
}
