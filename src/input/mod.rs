//! Input discovery and raw sample reading

pub mod gather;
pub mod reader;

use serde::{Deserialize, Serialize};

/// What a single example represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Granularity {
    /// One example per function opcode trace (`.txt` input)
    Function,
    /// Fixed-width windows over raw bytes (`.bin` input)
    Raw,
}

impl Granularity {
    /// Map the boolean `function` flag used by the store header
    pub fn from_function_flag(function: bool) -> Self {
        if function {
            Granularity::Function
        } else {
            Granularity::Raw
        }
    }

    /// File extension (without the dot) accepted for this granularity
    pub fn extension(self) -> &'static str {
        match self {
            Granularity::Function => "txt",
            Granularity::Raw => "bin",
        }
    }
}

pub use gather::gather_files;
pub use reader::{read_samples, OpcodeLine, RawSamples};
