//! Shuffle-and-cut splitter

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{DatasetError, Result};
use crate::persistence::dataset_store::Example;

/// A batch cut into its training and test parts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<Example>,
    pub test: Vec<Example>,
}

/// Index at which a batch of `len` examples is cut: `floor(len * ratio)`
pub fn split_index(len: usize, ratio: f64) -> usize {
    ((len as f64 * ratio).floor() as usize).min(len)
}

/// Check that a ratio lies strictly inside (0, 1)
pub fn validate_ratio(ratio: f64) -> Result<()> {
    if ratio.is_finite() && ratio > 0.0 && ratio < 1.0 {
        Ok(())
    } else {
        Err(DatasetError::InvalidConfig(format!(
            "split ratio must be in (0, 1), got {ratio}"
        )))
    }
}

/// Shuffle `examples` uniformly with `rng` and cut at [`split_index`]
///
/// The prefix becomes training data, the suffix test data. Only the new
/// batch is split; persisted examples are handled by rebalancing.
pub fn split_examples<R: Rng + ?Sized>(
    mut examples: Vec<Example>,
    ratio: f64,
    rng: &mut R,
) -> Result<Split> {
    validate_ratio(ratio)?;
    examples.shuffle(rng);
    let cut = split_index(examples.len(), ratio);
    let test = examples.split_off(cut);
    Ok(Split {
        train: examples,
        test,
    })
}
