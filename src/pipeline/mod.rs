//! One category-update run, from sample files to persisted stores

pub mod config;
pub mod preprocess;

pub use config::PreprocessConfig;
pub use preprocess::{
    inspect, open_store, run_preprocess, run_preprocess_with_rng, run_rebalance, DatasetSummary,
    PreprocessReport,
};
