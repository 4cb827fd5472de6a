//! Persistent, category-indexed example store
//!
//! One store backs one partition (`train.bin` or `test.bin`). The file
//! holds a header with the schema followed by every category's examples
//! concatenated in insertion order.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{DatasetError, Result};

/// A fixed-width byte vector; every example of a store has `features` bytes
pub type Example = Vec<u8>;

/// Leading bytes of every store file
pub const STORE_MAGIC: [u8; 4] = *b"BDS1";

/// Current on-disk format version
pub const FORMAT_VERSION: u32 = 1;

/// The immutable part of a store header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Byte length of every example
    pub features: usize,
    /// True if examples are function opcode traces
    pub function_granularity: bool,
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let granularity = if self.function_granularity {
            "function"
        } else {
            "raw"
        };
        write!(f, "{} features, {} granularity", self.features, granularity)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreHeader {
    features: usize,
    function_granularity: bool,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    header: StoreHeader,
    categories: BTreeMap<u32, Vec<u8>>,
}

/// Human-readable description of a store's content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSummary {
    pub path: PathBuf,
    pub schema: Option<Schema>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Example count per category
    pub categories: BTreeMap<u32, usize>,
    pub total_examples: usize,
}

/// One dataset partition, read from and written to a single file
#[derive(Debug, Clone)]
pub struct DatasetStore {
    path: PathBuf,
    features: Option<usize>,
    function_granularity: Option<bool>,
    /// Set by a successful `read` or `write`; the schema is then immutable
    locked: bool,
    updated_at: Option<DateTime<Utc>>,
    categories: BTreeMap<u32, Vec<Example>>,
}

/// A fully written temporary file waiting to replace its store
#[derive(Debug)]
pub struct StagedWrite {
    tmp_path: PathBuf,
    path: PathBuf,
    updated_at: DateTime<Utc>,
    committed: bool,
}

impl StagedWrite {
    /// Temporary file holding the new content
    pub fn tmp_path(&self) -> &Path {
        &self.tmp_path
    }
}

impl Drop for StagedWrite {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.tmp_path);
        }
    }
}

/// Persist a pair of stores, replacing neither unless both staged
///
/// Both temporary files are written and synced first; only then are they
/// renamed over their targets.
pub fn write_pair(first: &mut DatasetStore, second: &mut DatasetStore) -> Result<()> {
    let first_staged = first.stage()?;
    let second_staged = second.stage()?;
    first.commit(first_staged)?;
    second.commit(second_staged)
}

impl DatasetStore {
    /// Create an empty store bound to `path`; nothing is read yet
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            features: None,
            function_granularity: None,
            locked: false,
            updated_at: None,
            categories: BTreeMap::new(),
        }
    }

    /// Create a store with its schema already set, as for a first run
    pub fn with_schema(path: impl Into<PathBuf>, schema: Schema) -> Result<Self> {
        let mut store = Self::new(path);
        store.set_features(schema.features)?;
        store.set_function_granularity(schema.function_granularity)?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load header and examples from disk, replacing the in-memory state
    ///
    /// Fails with [`DatasetError::StoreNotFound`] if the file does not exist.
    pub fn read(&mut self) -> Result<()> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(DatasetError::StoreNotFound(self.path.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        let body = bytes
            .strip_prefix(&STORE_MAGIC[..])
            .ok_or_else(|| self.corrupt("not a dataset store"))?;
        let stored: StoreFile = bincode::deserialize(body).map_err(|e| self.corrupt(e))?;

        if stored.version != FORMAT_VERSION {
            return Err(self.corrupt(format!("unsupported format version {}", stored.version)));
        }
        let features = stored.header.features;
        if features == 0 {
            return Err(self.corrupt("header declares zero features"));
        }

        let mut categories = BTreeMap::new();
        for (category, blob) in stored.categories {
            if blob.len() % features != 0 {
                return Err(self.corrupt(format!(
                    "category {} holds {} bytes, not a multiple of {}",
                    category,
                    blob.len(),
                    features
                )));
            }
            let examples: Vec<Example> = blob.chunks_exact(features).map(<[u8]>::to_vec).collect();
            if !examples.is_empty() {
                categories.insert(category, examples);
            }
        }

        self.features = Some(features);
        self.function_granularity = Some(stored.header.function_granularity);
        self.updated_at = Some(stored.header.updated_at);
        self.categories = categories;
        self.locked = true;

        debug!(
            "read {:?}: {}, {} categories, {} examples",
            self.path,
            self.bound_schema()?,
            self.categories.len(),
            self.total_examples()
        );
        Ok(())
    }

    /// Persist header and examples
    ///
    /// The content is written to a sibling temporary file which then
    /// replaces the target, so a concurrent `read` sees either the old or
    /// the new file in full.
    pub fn write(&mut self) -> Result<()> {
        let staged = self.stage()?;
        self.commit(staged)
    }

    /// Serialize and fsync the store into its temporary file
    ///
    /// The target file is not touched until the write is committed. If
    /// staging fails, or the returned [`StagedWrite`] is dropped without
    /// being committed, the temporary file is removed.
    pub fn stage(&self) -> Result<StagedWrite> {
        let schema = self.bound_schema()?;
        let updated_at = Utc::now();

        let stored = StoreFile {
            version: FORMAT_VERSION,
            header: StoreHeader {
                features: schema.features,
                function_granularity: schema.function_granularity,
                updated_at,
            },
            categories: self
                .categories
                .iter()
                .filter(|(_, examples)| !examples.is_empty())
                .map(|(&category, examples)| (category, examples.concat()))
                .collect(),
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.temporary_path();
        let file = File::create(&tmp_path)?;
        let staged = StagedWrite {
            tmp_path,
            path: self.path.clone(),
            updated_at,
            committed: false,
        };

        let mut writer = BufWriter::new(file);
        writer.write_all(&STORE_MAGIC)?;
        bincode::serialize_into(&mut writer, &stored)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;

        Ok(staged)
    }

    /// Move a staged file over the target and mark the schema fixed
    fn commit(&mut self, mut staged: StagedWrite) -> Result<()> {
        std::fs::rename(&staged.tmp_path, &staged.path)?;
        staged.committed = true;

        self.updated_at = Some(staged.updated_at);
        self.locked = true;
        debug!(
            "wrote {:?}: {} categories, {} examples",
            self.path,
            self.categories.len(),
            self.total_examples()
        );
        Ok(())
    }

    pub fn features(&self) -> Option<usize> {
        self.features
    }

    /// Set the feature count; only valid before the schema is fixed
    pub fn set_features(&mut self, features: usize) -> Result<()> {
        self.ensure_unlocked()?;
        if features == 0 {
            return Err(DatasetError::InvalidConfig(
                "features must be a positive number of bytes".to_string(),
            ));
        }
        self.features = Some(features);
        Ok(())
    }

    pub fn function_granularity(&self) -> Option<bool> {
        self.function_granularity
    }

    /// Set the granularity flag; only valid before the schema is fixed
    pub fn set_function_granularity(&mut self, function: bool) -> Result<()> {
        self.ensure_unlocked()?;
        self.function_granularity = Some(function);
        Ok(())
    }

    /// The complete schema, if both fields are known
    pub fn schema(&self) -> Option<Schema> {
        Some(Schema {
            features: self.features?,
            function_granularity: self.function_granularity?,
        })
    }

    /// The schema, or [`DatasetError::SchemaPending`] if a field is unset
    pub fn bound_schema(&self) -> Result<Schema> {
        self.schema()
            .ok_or_else(|| DatasetError::SchemaPending(self.path.clone()))
    }

    /// True once the schema was fixed by a successful `read` or `write`
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Examples of `category` in insertion order; empty if unknown
    pub fn get(&self, category: u32) -> &[Example] {
        self.categories
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Replace every example of `category`
    pub fn set(&mut self, category: u32, examples: Vec<Example>) -> Result<()> {
        self.check_examples(category, &examples)?;
        if examples.is_empty() {
            self.categories.remove(&category);
        } else {
            self.categories.insert(category, examples);
        }
        Ok(())
    }

    /// Append examples to the end of `category`
    pub fn extend(&mut self, category: u32, examples: Vec<Example>) -> Result<()> {
        self.check_examples(category, &examples)?;
        if !examples.is_empty() {
            self.categories.entry(category).or_default().extend(examples);
        }
        Ok(())
    }

    /// Category ids in ascending order
    pub fn categories(&self) -> impl Iterator<Item = u32> + '_ {
        self.categories.keys().copied()
    }

    /// Number of examples stored for `category`
    pub fn count(&self, category: u32) -> usize {
        self.categories.get(&category).map(Vec::len).unwrap_or(0)
    }

    pub fn total_examples(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn summary(&self) -> StoreSummary {
        StoreSummary {
            path: self.path.clone(),
            schema: self.schema(),
            updated_at: self.updated_at,
            categories: self
                .categories
                .iter()
                .map(|(&category, examples)| (category, examples.len()))
                .collect(),
            total_examples: self.total_examples(),
        }
    }

    /// Mutable access for rebalancing; the caller keeps widths intact
    pub(crate) fn examples_mut(&mut self, category: u32) -> &mut Vec<Example> {
        self.categories.entry(category).or_default()
    }

    /// Drop categories left without examples
    pub(crate) fn prune_empty(&mut self) {
        self.categories.retain(|_, examples| !examples.is_empty());
    }

    fn check_examples(&self, category: u32, examples: &[Example]) -> Result<()> {
        let schema = self.bound_schema()?;
        match examples.iter().find(|e| e.len() != schema.features) {
            Some(bad) => Err(DatasetError::ExampleLength {
                category,
                expected: schema.features,
                got: bad.len(),
            }),
            None => Ok(()),
        }
    }

    fn ensure_unlocked(&self) -> Result<()> {
        if self.locked {
            Err(DatasetError::SchemaLocked(self.path.clone()))
        } else {
            Ok(())
        }
    }

    fn temporary_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn corrupt(&self, reason: impl fmt::Display) -> DatasetError {
        DatasetError::CorruptStore {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}
