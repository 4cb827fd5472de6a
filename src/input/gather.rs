//! Locate the sample files of one category

use std::path::{Path, PathBuf};

use log::debug;
use walkdir::WalkDir;

use super::Granularity;
use crate::error::{DatasetError, Result};

/// Collect every regular file under `dir` whose extension matches the
/// requested granularity, sorted by path. Symlinks are followed.
///
/// Fails with [`DatasetError::NoInputFiles`] when nothing matches, since a
/// category without usable input is a configuration error.
pub fn gather_files(dir: &Path, granularity: Granularity) -> Result<Vec<PathBuf>> {
    let extension = granularity.extension();
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .map(|ext| ext == extension)
            .unwrap_or(false);
        if matches {
            files.push(entry.into_path());
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(DatasetError::NoInputFiles {
            dir: dir.to_path_buf(),
            extension,
        });
    }

    debug!("found {} .{} files in {:?}", files.len(), extension, dir);
    Ok(files)
}
