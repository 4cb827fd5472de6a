//! Run configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DatasetError, Result};
use crate::input::Granularity;
use crate::persistence::{Schema, TEST_FILE, TRAIN_FILE};
use crate::split::splitter::validate_ratio;

/// Default example width in bytes
pub const DEFAULT_FEATURES: usize = 2048;

/// Default fraction of new examples routed to training
pub const DEFAULT_SPLIT: f64 = 0.7;

/// Parameters of a single category-update run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Directory holding the sample files of one category
    pub input_dir: PathBuf,
    /// Category id the samples belong to
    pub category: u32,
    /// Directory containing (or to contain) `train.bin` and `test.bin`
    pub model_dir: PathBuf,
    /// Function granularity (`.txt` opcode traces) instead of raw `.bin`
    #[serde(default)]
    pub function: bool,
    /// Bytes per example
    #[serde(default = "default_features")]
    pub features: usize,
    /// Fraction of examples routed to training
    #[serde(default = "default_split")]
    pub split: f64,
}

fn default_features() -> usize {
    DEFAULT_FEATURES
}

fn default_split() -> f64 {
    DEFAULT_SPLIT
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            category: 0,
            model_dir: PathBuf::from("."),
            function: false,
            features: DEFAULT_FEATURES,
            split: DEFAULT_SPLIT,
        }
    }
}

impl PreprocessConfig {
    /// Create a configuration with default schema and split
    pub fn new(input_dir: impl Into<PathBuf>, category: u32, model_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            category,
            model_dir: model_dir.into(),
            ..Self::default()
        }
    }

    /// Load a configuration from a JSON file
    pub fn load_json(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader)
            .map_err(|e| DatasetError::InvalidConfig(format!("{}: {}", path.display(), e)))
    }

    /// Reject configurations no run could satisfy
    pub fn validate(&self) -> Result<()> {
        if self.features == 0 {
            return Err(DatasetError::InvalidConfig(
                "features must be a positive number of bytes".to_string(),
            ));
        }
        validate_ratio(self.split)
    }

    pub fn granularity(&self) -> Granularity {
        Granularity::from_function_flag(self.function)
    }

    /// Schema every store touched by this run must have
    pub fn schema(&self) -> Schema {
        Schema {
            features: self.features,
            function_granularity: self.function,
        }
    }

    pub fn train_path(&self) -> PathBuf {
        self.model_dir.join(TRAIN_FILE)
    }

    pub fn test_path(&self) -> PathBuf {
        self.model_dir.join(TEST_FILE)
    }
}
