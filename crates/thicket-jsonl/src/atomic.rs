//! Atomic write operations for JSONL files.
//!
//! Whole-file rewrites go through a sibling temporary file that is flushed,
//! synced, and then renamed over the target. On POSIX filesystems the rename
//! is atomic, so readers see either the old file or the new one, never a
//! partial write.
//!
//! 1. Data is written to `<name>.tmp` next to the target
//! 2. The temporary file is flushed and synced to disk
//! 3. The temporary file is renamed to the target path
//!
//! If any step before the rename fails, the temporary file is removed on a
//! best-effort basis and the original file is left untouched.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::{JsonlWriter, Result};

/// Atomically writes a slice of values to a JSONL file.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be created, a value fails
/// to serialize, or the final rename fails. On failure the target is
/// unchanged.
///
/// # Examples
///
/// ```no_run
/// use thicket_jsonl::write_jsonl_atomic;
///
/// # fn example() -> thicket_jsonl::Result<()> {
/// write_jsonl_atomic("numbers.jsonl", &[1, 2, 3])?;
/// # Ok(())
/// # }
/// ```
pub fn write_jsonl_atomic<T, P>(path: P, values: &[T]) -> Result<()>
where
    T: Serialize,
    P: AsRef<Path>,
{
    write_jsonl_atomic_iter(path, values.iter())
}

/// Atomically writes an iterator of values to a JSONL file.
///
/// # Errors
///
/// See [`write_jsonl_atomic`].
pub fn write_jsonl_atomic_iter<T, I, P>(path: P, values: I) -> Result<()>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
    P: AsRef<Path>,
{
    write_atomic_with(path, |writer| writer.write_all(values))
}

/// Atomically rewrites `path` with whatever `fill` writes.
///
/// Use this when the content comes from several differently-typed sources
/// that must land in one file in a fixed order.
///
/// # Errors
///
/// Any error from `fill` aborts the write and is returned as-is.
pub fn write_atomic_with<P, F>(path: P, fill: F) -> Result<()>
where
    P: AsRef<Path>,
    F: FnOnce(&mut JsonlWriter<File>) -> Result<()>,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let temp_path = make_temp_path(path);

    let lines = match write_to_temp_file(&temp_path, fill) {
        Ok(lines) => lines,
        Err(e) => {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                tracing::debug!(
                    path = %temp_path.display(),
                    error = %cleanup,
                    "temp file cleanup failed"
                );
            }
            return Err(e);
        }
    };

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }

    tracing::trace!(path = %path.display(), lines, "atomic rewrite complete");
    Ok(())
}

/// Creates a temporary file path for atomic write operations.
///
/// `.tmp` is appended to the existing extension, or used as the extension
/// when there is none.
fn make_temp_path(path: &Path) -> PathBuf {
    let mut temp_path = path.to_path_buf();
    let new_extension = match path.extension() {
        Some(ext) => {
            let mut new_ext = ext.to_os_string();
            new_ext.push(".tmp");
            new_ext
        }
        None => std::ffi::OsString::from("tmp"),
    };
    temp_path.set_extension(new_extension);
    temp_path
}

/// Writes and syncs the temp file, returning the number of lines written.
fn write_to_temp_file<F>(temp_path: &Path, fill: F) -> Result<usize>
where
    F: FnOnce(&mut JsonlWriter<File>) -> Result<()>,
{
    let file = File::create(temp_path)?;
    let mut writer = JsonlWriter::new(file);
    fill(&mut writer)?;
    let lines = writer.lines_written();
    let file = writer.into_inner()?;
    file.sync_all()?;
    Ok(lines)
}
