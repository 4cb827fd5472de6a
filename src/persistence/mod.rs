//! On-disk dataset stores and their rebalancing

pub mod dataset_store;
pub mod rebalance;

pub use dataset_store::{write_pair, DatasetStore, Example, Schema, StagedWrite, StoreSummary};
pub use rebalance::{CategoryMove, MoveDirection, RebalanceReport};

/// File name of the training partition inside a model directory
pub const TRAIN_FILE: &str = "train.bin";

/// File name of the test partition inside a model directory
pub const TEST_FILE: &str = "test.bin";
