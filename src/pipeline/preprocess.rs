//! Pipeline orchestration
//!
//! A run opens both stores (validating the requested schema), reads and
//! encodes the new samples, splits them, appends each part to its store,
//! rebalances the pair, stages both files and only then renames them over
//! the old ones. Every failure before the final renames leaves the files on
//! disk untouched.

use std::path::{Path, PathBuf};

use log::{info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::config::PreprocessConfig;
use crate::encoding::ExampleEncoder;
use crate::error::{DatasetError, Result};
use crate::input::{gather_files, read_samples};
use crate::persistence::{
    write_pair, DatasetStore, RebalanceReport, Schema, StoreSummary, TEST_FILE, TRAIN_FILE,
};
use crate::split::split_examples;

/// What a single preprocessing run did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessReport {
    pub category: u32,
    /// Input files read
    pub files: usize,
    /// Usable samples (opcode lines or raw files)
    pub samples: usize,
    /// Examples produced by the encoder
    pub examples: usize,
    /// New examples routed to training by the split
    pub new_train: usize,
    /// New examples routed to test by the split
    pub new_test: usize,
    /// Examples of the category in the training store after rebalancing
    pub train_count: usize,
    /// Examples of the category in the test store after rebalancing
    pub test_count: usize,
    pub rebalance: RebalanceReport,
}

/// Summaries of both stores of a model directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub train: Option<StoreSummary>,
    pub test: Option<StoreSummary>,
}

/// Run one category update with a thread-local random source
pub fn run_preprocess(config: &PreprocessConfig) -> Result<PreprocessReport> {
    run_preprocess_with_rng(config, &mut rand::thread_rng())
}

/// Run one category update, shuffling the new batch with `rng`
pub fn run_preprocess_with_rng<R: Rng + ?Sized>(
    config: &PreprocessConfig,
    rng: &mut R,
) -> Result<PreprocessReport> {
    config.validate()?;
    let schema = config.schema();

    let mut train = open_store(config.train_path(), schema)?;
    let mut test = open_store(config.test_path(), schema)?;

    let granularity = config.granularity();
    let files = gather_files(&config.input_dir, granularity)?;
    let samples = read_samples(&files, granularity)?;
    let encoder = ExampleEncoder::new(config.features)?;
    let examples = encoder.encode(&samples)?;
    info!(
        "category {}: {} files, {} samples, {} examples",
        config.category,
        files.len(),
        samples.len(),
        examples.len()
    );
    if examples.is_empty() {
        warn!(
            "category {}: no examples of {} bytes could be produced",
            config.category, config.features
        );
    }

    let total = examples.len();
    let split = split_examples(examples, config.split, rng)?;
    let (new_train, new_test) = (split.train.len(), split.test.len());

    train.extend(config.category, split.train)?;
    test.extend(config.category, split.test)?;
    let rebalance = train.rebalance(&mut test, config.split)?;

    write_pair(&mut train, &mut test)?;

    let report = PreprocessReport {
        category: config.category,
        files: files.len(),
        samples: samples.len(),
        examples: total,
        new_train,
        new_test,
        train_count: train.count(config.category),
        test_count: test.count(config.category),
        rebalance,
    };
    info!(
        "category {}: {} train / {} test examples stored",
        report.category, report.train_count, report.test_count
    );
    Ok(report)
}

/// Re-apply `split` to an existing pair of stores without new samples
pub fn run_rebalance(model_dir: &Path, split: f64) -> Result<RebalanceReport> {
    let train_path = model_dir.join(TRAIN_FILE);
    let test_path = model_dir.join(TEST_FILE);

    let (mut train, mut test) = match (read_if_exists(&train_path)?, read_if_exists(&test_path)?) {
        (Some(train), Some(test)) => (train, test),
        (Some(train), None) => {
            let test = DatasetStore::with_schema(&test_path, train.bound_schema()?)?;
            (train, test)
        }
        (None, Some(test)) => {
            let train = DatasetStore::with_schema(&train_path, test.bound_schema()?)?;
            (train, test)
        }
        (None, None) => return Err(DatasetError::StoreNotFound(train_path)),
    };

    let report = train.rebalance(&mut test, split)?;
    if report.is_noop() {
        info!("{:?} is already balanced", model_dir);
        return Ok(report);
    }

    write_pair(&mut train, &mut test)?;
    Ok(report)
}

/// Describe the stores found in `model_dir`
pub fn inspect(model_dir: &Path) -> Result<DatasetSummary> {
    let train = read_if_exists(&model_dir.join(TRAIN_FILE))?;
    let test = read_if_exists(&model_dir.join(TEST_FILE))?;
    if train.is_none() && test.is_none() {
        return Err(DatasetError::StoreNotFound(model_dir.join(TRAIN_FILE)));
    }
    Ok(DatasetSummary {
        train: train.map(|s| s.summary()),
        test: test.map(|s| s.summary()),
    })
}

/// Read a store, or initialize it with `requested` if it does not exist
///
/// An existing store whose schema differs from `requested` is rejected.
pub fn open_store(path: PathBuf, requested: Schema) -> Result<DatasetStore> {
    let mut store = DatasetStore::new(path);
    match store.read() {
        Ok(()) => {
            let stored = store.bound_schema()?;
            if stored != requested {
                return Err(DatasetError::SchemaIncompatible {
                    path: store.path().to_path_buf(),
                    stored,
                    requested,
                });
            }
        }
        Err(DatasetError::StoreNotFound(_)) => {
            info!("initializing new dataset store {:?}", store.path());
            store.set_features(requested.features)?;
            store.set_function_granularity(requested.function_granularity)?;
        }
        Err(e) => return Err(e),
    }
    Ok(store)
}

fn read_if_exists(path: &Path) -> Result<Option<DatasetStore>> {
    let mut store = DatasetStore::new(path);
    match store.read() {
        Ok(()) => Ok(Some(store)),
        Err(DatasetError::StoreNotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}
