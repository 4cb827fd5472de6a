//! Train/test partitioning of a freshly encoded batch

pub mod splitter;

pub use splitter::{split_examples, split_index, Split};
