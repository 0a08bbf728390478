//! Input/output helpers.
//!
//! - vintage snapshot parsing (`vintage`)
//! - canonical series + forecast CSV (`export`)
//! - model JSON read/write (`model`)
//!
//! Every output file is written to a sibling temp file and renamed into place,
//! so a failed or interrupted run never leaves a truncated file behind.

use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AppError;

pub mod export;
pub mod model;
pub mod vintage;

pub use export::*;
pub use model::*;
pub use vintage::*;

/// Create `path` (and its parent directory) via `<name>.tmp` + rename.
pub(crate) fn write_replacing<E, F>(path: &Path, fill: F) -> Result<(), AppError>
where
    E: Display,
    F: FnOnce(fs::File) -> Result<(), E>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::new(2, format!("Failed to create '{}': {e}", parent.display())))?;
    }

    let tmp = temp_path(path);
    let result = fs::File::create(&tmp)
        .map_err(|e| AppError::new(2, format!("Failed to create '{}': {e}", tmp.display())))
        .and_then(|file| fill(file).map_err(|e| AppError::new(2, format!("Failed to write '{}': {e}", path.display()))))
        .and_then(|()| {
            fs::rename(&tmp, path)
                .map_err(|e| AppError::new(2, format!("Failed to move output into '{}': {e}", path.display())))
        });

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// Remove an output left by an earlier run; a missing file is fine.
pub(crate) fn remove_stale(path: &Path) -> Result<(), AppError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AppError::new(
            2,
            format!("Failed to remove stale '{}': {e}", path.display()),
        )),
    }
}

pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
