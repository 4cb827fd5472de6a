//! Bindset: incremental train/test dataset builder for binary classifiers
//!
//! This crate turns per-category sample files (function opcode traces or
//! raw binaries) into fixed-width examples and merges them into a pair of
//! persistent, category-indexed stores whose train/test ratio is kept
//! balanced across runs.

pub mod encoding;
pub mod error;
pub mod input;
pub mod persistence;
pub mod pipeline;
pub mod split;

pub use encoding::example_encoder::ExampleEncoder;
pub use error::{DatasetError, Result};
pub use input::Granularity;
pub use persistence::dataset_store::{DatasetStore, Example, Schema, StoreSummary};
pub use persistence::rebalance::{CategoryMove, MoveDirection, RebalanceReport};
pub use pipeline::config::PreprocessConfig;
pub use pipeline::preprocess::{run_preprocess, run_preprocess_with_rng, PreprocessReport};
