//! Read sample files into their intermediate representation

use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use super::Granularity;
use crate::error::{DatasetError, Result};

/// Lines that denote an empty or invalid function body upstream
pub const SENTINEL_LINES: [&str; 3] = ["", "[]", "FF,"];

/// One opcode trace line, e.g. `DE,AD,C0,DE`, with its origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpcodeLine {
    /// File the line was read from
    pub source: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// Line content without the terminator
    pub text: String,
}

/// Samples of one run, before encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawSamples {
    /// One entry per usable opcode line
    Function(Vec<OpcodeLine>),
    /// One blob per input file
    Raw(Vec<Vec<u8>>),
}

impl RawSamples {
    /// Number of intermediate samples
    pub fn len(&self) -> usize {
        match self {
            RawSamples::Function(lines) => lines.len(),
            RawSamples::Raw(blobs) => blobs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Returns true if the line carries no classification signal
pub fn is_sentinel(line: &str) -> bool {
    SENTINEL_LINES.contains(&line)
}

/// Read every file according to the requested granularity
pub fn read_samples(files: &[PathBuf], granularity: Granularity) -> Result<RawSamples> {
    match granularity {
        Granularity::Function => read_function_files(files).map(RawSamples::Function),
        Granularity::Raw => read_raw_files(files).map(RawSamples::Raw),
    }
}

/// Read opcode traces, one sample per non-sentinel line
pub fn read_function_files(files: &[PathBuf]) -> Result<Vec<OpcodeLine>> {
    let mut functions = Vec::new();

    for path in files {
        let before = functions.len();
        read_function_file(path, &mut functions)?;
        debug!("{:?}: {} functions", path, functions.len() - before);
    }

    Ok(functions)
}

fn read_function_file(path: &Path, out: &mut Vec<OpcodeLine>) -> Result<()> {
    let reader = BufReader::new(File::open(path)?);

    for (idx, line) in reader.lines().enumerate() {
        let text = line.map_err(|e| match e.kind() {
            ErrorKind::InvalidData => DatasetError::MalformedInput {
                file: path.to_path_buf(),
                line: idx + 1,
                reason: "line is not valid UTF-8".to_string(),
            },
            _ => DatasetError::Io(e),
        })?;
        if is_sentinel(&text) {
            continue;
        }
        out.push(OpcodeLine {
            source: path.to_path_buf(),
            line: idx + 1,
            text,
        });
    }

    Ok(())
}

/// Read raw binaries, one blob per file
pub fn read_raw_files(files: &[PathBuf]) -> Result<Vec<Vec<u8>>> {
    let mut blobs = Vec::with_capacity(files.len());

    for path in files {
        let data = std::fs::read(path)?;
        if data.is_empty() {
            warn!("{:?} is empty and contributes no examples", path);
        }
        debug!("{:?}: {} bytes", path, data.len());
        blobs.push(data);
    }

    Ok(blobs)
}
