//! Local vintage store: the data directory as a set of raw snapshots.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::domain::{RawVintage, VintageId};
use crate::error::AppError;

/// Load every `*.csv` in `dir` whose stem names a vintage (`v117`, `latest`).
///
/// Derived outputs living in the same directory (`cleaned_monthly_series.csv`,
/// `forecasting.csv`) are ignored. The result is sorted by vintage id.
pub fn load_vintages(dir: &Path) -> Result<Vec<RawVintage>, AppError> {
    let entries = fs::read_dir(dir)
        .map_err(|e| AppError::new(2, format!("Failed to read data directory '{}': {e}", dir.display())))?;

    let mut out = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| AppError::new(2, format!("Failed to list '{}': {e}", dir.display())))?;
        let path = entry.path();
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if !is_csv {
            continue;
        }
        let Some(id) = path.file_stem().and_then(|s| s.to_str()).and_then(VintageId::from_file_stem) else {
            debug!(path = %path.display(), "not a vintage file");
            continue;
        };
        let bytes =
            fs::read(&path).map_err(|e| AppError::new(2, format!("Failed to read '{}': {e}", path.display())))?;
        out.push(RawVintage { id, bytes });
    }

    out.sort_by_key(|v| v.id);
    Ok(out)
}

/// Write raw snapshots into `dir` as `{id}.csv`.
pub fn save_vintages(dir: &Path, vintages: &[RawVintage]) -> Result<(), AppError> {
    fs::create_dir_all(dir)
        .map_err(|e| AppError::new(2, format!("Failed to create '{}': {e}", dir.display())))?;
    for v in vintages {
        let path = dir.join(v.id.file_name());
        fs::write(&path, &v.bytes)
            .map_err(|e| AppError::new(2, format!("Failed to write '{}': {e}", path.display())))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_vintage_files_are_loaded() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["v120.csv", "v9.csv", "latest.csv", "cleaned_monthly_series.csv", "notes.txt"] {
            fs::write(dir.path().join(name), name).unwrap();
        }

        let ids: Vec<VintageId> = load_vintages(dir.path()).unwrap().into_iter().map(|v| v.id).collect();
        assert_eq!(
            ids,
            vec![VintageId::Numbered(9), VintageId::Numbered(120), VintageId::Latest]
        );
    }

    #[test]
    fn missing_directory_is_a_usage_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_vintages(&dir.path().join("nope")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
