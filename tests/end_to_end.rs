//! End-to-end tests for category-update runs
//!
//! These tests drive the full pipeline from sample files to the persisted
//! train/test pair and back.

mod common;

use bindset::persistence::{DatasetStore, Schema};
use bindset::pipeline::{inspect, run_preprocess, run_preprocess_with_rng, run_rebalance};
use bindset::DatasetError;
use common::*;

fn load(path: &std::path::Path) -> DatasetStore {
    let mut store = DatasetStore::new(path);
    store.read().expect("Failed to read store");
    store
}

// ============================================================================
// First Run
// ============================================================================

#[test]
fn test_first_run_creates_both_stores() {
    let ws = Workspace::new();
    let lines = distinct_lines(20, 4);
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    ws.write_opcodes("cat0", "funcs.txt", &refs);

    let config = ws.config("cat0", 0, true, 4, 0.75);
    let report = run_preprocess_with_rng(&config, &mut seeded(1)).expect("Run failed");

    assert_eq!(report.examples, 20);
    assert_eq!((report.new_train, report.new_test), (15, 5));

    let train = load(&ws.train_path());
    let test = load(&ws.test_path());
    let schema = Schema {
        features: 4,
        function_granularity: true,
    };
    assert_eq!(train.schema(), Some(schema));
    assert_eq!(test.schema(), Some(schema));
    assert_eq!(train.count(0), 15);
    assert_eq!(test.count(0), 5);
}

#[test]
fn test_function_sentinels_excluded() {
    let ws = Workspace::new();
    let mut lines = vec![DEADCODE, PROLOGUE];
    lines.extend(SENTINELS);
    lines.push(EPILOGUE);
    ws.write_opcodes("cat1", "a.txt", &lines);

    let config = ws.config("cat1", 1, true, 4, 0.5);
    let report = run_preprocess_with_rng(&config, &mut seeded(2)).expect("Run failed");
    assert_eq!(report.samples, 3);
    assert_eq!(report.examples, 3);

    let train = load(&ws.train_path());
    let test = load(&ws.test_path());
    let mut stored: Vec<Vec<u8>> = train.get(1).iter().chain(test.get(1)).cloned().collect();
    stored.sort();
    let mut expected = vec![
        vec![0xDE, 0xAD, 0xC0, 0xDE],
        vec![0x55, 0x48, 0x89, 0xE5],
        vec![0xC9, 0xC3, 0x90, 0x90],
    ];
    expected.sort();
    assert_eq!(stored, expected);
}

#[test]
fn test_raw_chunking_across_files() {
    let ws = Workspace::new();
    ws.write_raw("raw", "a.bin", &pattern_bytes(10, 0));
    ws.write_raw("raw", "b.bin", &pattern_bytes(13, 100));
    ws.write_raw("raw", "ignored.txt", b"DE,AD\n");

    let config = ws.config("raw", 3, false, 8, 0.5);
    let report = run_preprocess_with_rng(&config, &mut seeded(3)).expect("Run failed");

    assert_eq!(report.files, 2);
    // 23 bytes -> 2 windows of 8, 7 bytes dropped
    assert_eq!(report.examples, 2);
    assert_eq!(report.train_count + report.test_count, 2);
}

// ============================================================================
// Incremental Updates
// ============================================================================

#[test]
fn test_new_category_leaves_others_untouched() {
    let ws = Workspace::new();
    ws.write_raw("a", "a.bin", &pattern_bytes(40, 1));
    ws.write_raw("b", "b.bin", &pattern_bytes(64, 50));

    run_preprocess_with_rng(&ws.config("a", 0, false, 4, 0.7), &mut seeded(4)).expect("Run a failed");
    let train_a = load(&ws.train_path()).get(0).to_vec();
    let test_a = load(&ws.test_path()).get(0).to_vec();

    run_preprocess_with_rng(&ws.config("b", 1, false, 4, 0.7), &mut seeded(5)).expect("Run b failed");
    let train = load(&ws.train_path());
    let test = load(&ws.test_path());

    assert_eq!(train.get(0), train_a.as_slice());
    assert_eq!(test.get(0), test_a.as_slice());
    assert_eq!(train.count(1) + test.count(1), 16);
    assert_eq!(train.categories().collect::<Vec<_>>(), vec![0, 1]);
}

#[test]
fn test_more_samples_extend_existing_category() {
    let ws = Workspace::new();
    ws.write_raw("first", "x.bin", &pattern_bytes(50, 0));
    ws.write_raw("second", "y.bin", &pattern_bytes(30, 9));

    run_preprocess_with_rng(&ws.config("first", 2, false, 5, 0.6), &mut seeded(6)).expect("Run failed");
    let report =
        run_preprocess_with_rng(&ws.config("second", 2, false, 5, 0.6), &mut seeded(7)).expect("Run failed");

    assert_eq!(report.examples, 6);
    assert_eq!(report.train_count + report.test_count, 16);
    assert_balanced(report.train_count, report.test_count, 0.6);
}

#[test]
fn test_split_stays_balanced_over_many_runs() {
    let ws = Workspace::new();
    let ratio = 0.8;
    for (run, len) in [3usize, 1, 7, 2, 11].into_iter().enumerate() {
        let name = format!("run{run}");
        ws.write_raw(&name, "s.bin", &pattern_bytes(len * 4, run as u8));
        let report = run_preprocess_with_rng(&ws.config(&name, 5, false, 4, ratio), &mut seeded(run as u64))
            .expect("Run failed");
        assert_balanced(report.train_count, report.test_count, ratio);
    }

    let train = load(&ws.train_path());
    let test = load(&ws.test_path());
    assert_eq!(train.count(5) + test.count(5), 24);
}

#[test]
fn test_unseeded_run_succeeds() {
    let ws = Workspace::new();
    ws.write_raw("r", "s.bin", &pattern_bytes(100, 3));

    let report = run_preprocess(&ws.config("r", 0, false, 10, 0.5)).expect("Run failed");
    assert_eq!((report.new_train, report.new_test), (5, 5));
}

// ============================================================================
// Failures Leave Stores Untouched
// ============================================================================

#[test]
fn test_features_mismatch_rejected() {
    let ws = Workspace::new();
    ws.write_raw("r", "s.bin", &pattern_bytes(64, 0));
    run_preprocess_with_rng(&ws.config("r", 0, false, 8, 0.5), &mut seeded(8)).expect("Run failed");
    let before = ws.snapshot();

    let err = run_preprocess_with_rng(&ws.config("r", 1, false, 16, 0.5), &mut seeded(9)).unwrap_err();
    assert!(matches!(err, DatasetError::SchemaIncompatible { .. }));
    assert_eq!(ws.snapshot(), before);
}

#[test]
fn test_granularity_mismatch_rejected() {
    let ws = Workspace::new();
    ws.write_opcodes("f", "a.txt", &[DEADCODE, XOR_INC]);
    run_preprocess_with_rng(&ws.config("f", 0, true, 4, 0.5), &mut seeded(10)).expect("Run failed");
    let before = ws.snapshot();

    ws.write_raw("r", "s.bin", &pattern_bytes(16, 0));
    let err = run_preprocess_with_rng(&ws.config("r", 1, false, 4, 0.5), &mut seeded(11)).unwrap_err();
    assert!(matches!(err, DatasetError::SchemaIncompatible { .. }));
    assert_eq!(ws.snapshot(), before);
}

#[test]
fn test_malformed_line_aborts_run() {
    let ws = Workspace::new();
    ws.write_opcodes("good", "a.txt", &[DEADCODE, PROLOGUE]);
    run_preprocess_with_rng(&ws.config("good", 0, true, 4, 0.5), &mut seeded(12)).expect("Run failed");
    let before = ws.snapshot();

    ws.write_opcodes("bad", "b.txt", &[EPILOGUE, "DE,A,C0,DE"]);
    let err = run_preprocess_with_rng(&ws.config("bad", 1, true, 4, 0.5), &mut seeded(13)).unwrap_err();
    match err {
        DatasetError::MalformedInput { line, .. } => assert_eq!(line, 2),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(ws.snapshot(), before);
}

#[test]
fn test_short_opcode_line_aborts_run() {
    let ws = Workspace::new();
    ws.write_opcodes("bad", "b.txt", &[DEADCODE, "DE,AD"]);

    let err = run_preprocess_with_rng(&ws.config("bad", 0, true, 4, 0.5), &mut seeded(14)).unwrap_err();
    assert!(matches!(err, DatasetError::MalformedInput { .. }));
    assert_eq!(ws.snapshot(), (None, None));
}

#[test]
fn test_missing_inputs_abort_before_writing() {
    let ws = Workspace::new();
    ws.write_raw("raw_only", "s.bin", &pattern_bytes(8, 0));

    let err = run_preprocess_with_rng(&ws.config("raw_only", 0, true, 4, 0.5), &mut seeded(15)).unwrap_err();
    assert!(matches!(err, DatasetError::NoInputFiles { extension: "txt", .. }));
    assert_eq!(ws.snapshot(), (None, None));
}

#[test]
fn test_unwritable_test_store_keeps_both_files() {
    let ws = Workspace::new();
    ws.write_raw("a", "s.bin", &pattern_bytes(40, 0));
    ws.write_raw("b", "s.bin", &pattern_bytes(24, 5));
    run_preprocess_with_rng(&ws.config("a", 0, false, 4, 0.7), &mut seeded(20)).expect("Run failed");
    let before = ws.snapshot();

    std::fs::create_dir(ws.model_dir().join("test.bin.tmp")).expect("Failed to block temp path");
    let err = run_preprocess_with_rng(&ws.config("b", 1, false, 4, 0.7), &mut seeded(21)).unwrap_err();
    assert!(matches!(err, DatasetError::Io(_)));

    assert_eq!(ws.snapshot(), before);
    assert!(!ws.model_dir().join("train.bin.tmp").exists());
}

#[test]
fn test_unwritable_test_store_blocks_rebalance() {
    let ws = Workspace::new();
    ws.write_raw("r", "s.bin", &pattern_bytes(80, 0));
    run_preprocess_with_rng(&ws.config("r", 0, false, 4, 0.5), &mut seeded(22)).expect("Run failed");
    let before = ws.snapshot();

    std::fs::create_dir(ws.model_dir().join("test.bin.tmp")).expect("Failed to block temp path");
    assert!(run_rebalance(&ws.model_dir(), 0.9).is_err());
    assert_eq!(ws.snapshot(), before);
}

#[test]
fn test_invalid_split_rejected() {
    let ws = Workspace::new();
    ws.write_raw("r", "s.bin", &pattern_bytes(8, 0));

    let err = run_preprocess_with_rng(&ws.config("r", 0, false, 4, 1.0), &mut seeded(16)).unwrap_err();
    assert!(matches!(err, DatasetError::InvalidConfig(_)));
    assert_eq!(ws.snapshot(), (None, None));
}

// ============================================================================
// Standalone Rebalance and Inspection
// ============================================================================

#[test]
fn test_rebalance_to_new_ratio_then_idempotent() {
    let ws = Workspace::new();
    ws.write_raw("r", "s.bin", &pattern_bytes(80, 0));
    run_preprocess_with_rng(&ws.config("r", 0, false, 4, 0.5), &mut seeded(17)).expect("Run failed");

    let report = run_rebalance(&ws.model_dir(), 0.9).expect("Rebalance failed");
    assert_eq!(report.moved(), 8);
    assert_eq!(load(&ws.train_path()).count(0), 18);
    assert_eq!(load(&ws.test_path()).count(0), 2);

    let before = ws.snapshot();
    let again = run_rebalance(&ws.model_dir(), 0.9).expect("Rebalance failed");
    assert!(again.is_noop());
    assert_eq!(ws.snapshot(), before);
}

#[test]
fn test_inspect_reports_both_stores() {
    let ws = Workspace::new();
    ws.write_raw("a", "s.bin", &pattern_bytes(40, 0));
    ws.write_raw("b", "s.bin", &pattern_bytes(20, 0));
    run_preprocess_with_rng(&ws.config("a", 0, false, 4, 0.7), &mut seeded(18)).expect("Run failed");
    run_preprocess_with_rng(&ws.config("b", 7, false, 4, 0.7), &mut seeded(19)).expect("Run failed");

    let summary = inspect(&ws.model_dir()).expect("Inspect failed");
    let train = summary.train.expect("train summary");
    let test = summary.test.expect("test summary");

    assert_eq!(train.categories.get(&0), Some(&7));
    assert_eq!(test.categories.get(&0), Some(&3));
    // 5 examples at 0.7 tie between 3 and 4; the floor split is kept
    assert_eq!(train.categories.get(&7), Some(&3));
    assert_eq!(test.categories.get(&7), Some(&2));
    assert_eq!(train.total_examples + test.total_examples, 15);
    assert!(train.updated_at.is_some());
}
