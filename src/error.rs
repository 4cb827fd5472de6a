//! Error types shared by every stage of a dataset update run

use std::path::PathBuf;

use thiserror::Error;

use crate::persistence::dataset_store::Schema;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, DatasetError>;

/// Errors that can abort a dataset update run
#[derive(Debug, Error)]
pub enum DatasetError {
    /// No input file with the expected extension was found
    #[error("no .{extension} files found in {}", dir.display())]
    NoInputFiles { dir: PathBuf, extension: &'static str },

    /// A store file does not exist yet
    #[error("dataset store {} does not exist", .0.display())]
    StoreNotFound(PathBuf),

    /// The requested schema disagrees with the persisted one
    #[error("incompatible schema for {}: stored {stored}, requested {requested}", path.display())]
    SchemaIncompatible {
        path: PathBuf,
        stored: Schema,
        requested: Schema,
    },

    /// The schema was already fixed by a successful read or write
    #[error("schema of {} is fixed and cannot be changed", .0.display())]
    SchemaLocked(PathBuf),

    /// The store was used before both schema fields were known
    #[error("schema of {} is not set", .0.display())]
    SchemaPending(PathBuf),

    /// A sample could not be decoded into a valid example
    #[error("malformed input in {}:{line}: {reason}", file.display())]
    MalformedInput {
        file: PathBuf,
        line: usize,
        reason: String,
    },

    /// An example does not have the store's feature count
    #[error("example for category {category} has {got} bytes, expected {expected}")]
    ExampleLength {
        category: u32,
        expected: usize,
        got: usize,
    },

    /// The store file exists but its content is not a valid dataset
    #[error("corrupt dataset store {}: {reason}", path.display())]
    CorruptStore { path: PathBuf, reason: String },

    /// The run configuration is not usable
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("directory traversal error: {0}")]
    Walk(#[from] walkdir::Error),
}
