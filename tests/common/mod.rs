//! Shared test utilities and fixtures for Bindset tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use bindset::persistence::{TEST_FILE, TRAIN_FILE};
use bindset::pipeline::PreprocessConfig;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;

// ============================================================================
// Opcode Trace Lines (4 bytes each)
// ============================================================================

/// push rbp; mov rbp, rsp
pub const PROLOGUE: &str = "55,48,89,E5";

/// leave; ret; nop; nop
pub const EPILOGUE: &str = "C9,C3,90,90";

/// xor eax, eax; inc eax
pub const XOR_INC: &str = "31,C0,FF,C0";

/// The canonical example line
pub const DEADCODE: &str = "DE,AD,C0,DE";

/// Lines the reader must skip
pub const SENTINELS: [&str; 3] = ["", "[]", "FF,"];

// ============================================================================
// Workspace
// ============================================================================

/// A temporary model directory plus any number of category input dirs
pub struct Workspace {
    pub root: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().expect("Failed to create temp dir"),
        }
    }

    pub fn model_dir(&self) -> PathBuf {
        self.root.path().join("model")
    }

    pub fn train_path(&self) -> PathBuf {
        self.model_dir().join(TRAIN_FILE)
    }

    pub fn test_path(&self) -> PathBuf {
        self.model_dir().join(TEST_FILE)
    }

    /// Directory for the samples of one category, created on demand
    pub fn input_dir(&self, name: &str) -> PathBuf {
        let dir = self.root.path().join("input").join(name);
        std::fs::create_dir_all(&dir).expect("Failed to create input dir");
        dir
    }

    /// Write an opcode trace file with one line per entry
    pub fn write_opcodes(&self, input: &str, file: &str, lines: &[&str]) -> PathBuf {
        let path = self.input_dir(input).join(file);
        let mut content = lines.join("\n");
        content.push('\n');
        std::fs::write(&path, content).expect("Failed to write opcode file");
        path
    }

    /// Write a raw binary sample file
    pub fn write_raw(&self, input: &str, file: &str, bytes: &[u8]) -> PathBuf {
        let path = self.input_dir(input).join(file);
        std::fs::write(&path, bytes).expect("Failed to write raw file");
        path
    }

    /// Configuration for a run over `input` with the given schema
    pub fn config(&self, input: &str, category: u32, function: bool, features: usize, split: f64) -> PreprocessConfig {
        PreprocessConfig {
            input_dir: self.input_dir(input),
            category,
            model_dir: self.model_dir(),
            function,
            features,
            split,
        }
    }

    /// Byte content of both store files, for unchanged-on-failure checks
    pub fn snapshot(&self) -> (Option<Vec<u8>>, Option<Vec<u8>>) {
        (read_opt(&self.train_path()), read_opt(&self.test_path()))
    }
}

fn read_opt(path: &Path) -> Option<Vec<u8>> {
    std::fs::read(path).ok()
}

// ============================================================================
// Helpers
// ============================================================================

/// Deterministic random source
pub fn seeded(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// `count` distinct opcode lines of `width` bytes
pub fn distinct_lines(count: usize, width: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            (0..width)
                .map(|b| format!("{:02X}", (i * 7 + b) % 256))
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect()
}

/// `len` bytes of a recognizable pattern
pub fn pattern_bytes(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| seed.wrapping_add(i as u8)).collect()
}

/// Assert that a category's train share is within half an example of `ratio`
pub fn assert_balanced(train: usize, test: usize, ratio: f64) {
    let total = train + test;
    let deviation = (train as f64 - total as f64 * ratio).abs();
    assert!(
        deviation <= 0.5,
        "{train} train / {test} test deviates from ratio {ratio} by {deviation}"
    );
}
