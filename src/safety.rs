//! Safety utilities to prevent overwriting the wrong database.
//!
//! Promotion replaces the primary catalog with the staging copy and every
//! promotion writes a backup first. These checks make sure the three paths
//! involved can never point at the same file.

use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};

/// Resolve a path for comparison. Existing files are canonicalized; missing
/// ones are compared as given, joined onto the current directory if relative.
fn resolved(path: &Path) -> PathBuf {
    if let Ok(p) = path.canonicalize() {
        return p;
    }
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

fn unsafe_path(path: &Path, reason: impl Into<String>) -> PipelineError {
    PipelineError::Unsafe {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Validates that the staging database is a different file from the primary.
///
/// # Arguments
/// * `primary` - The catalog served to readers
/// * `staging` - The copy that will be validated and promoted
pub fn validate_staging_path(primary: &Path, staging: &Path) -> Result<()> {
    if resolved(primary) == resolved(staging) {
        return Err(unsafe_path(
            staging,
            format!("staging database is the primary database {}", primary.display()),
        ));
    }
    Ok(())
}

/// Validates that a backup file is new and is neither the primary nor the staging file.
///
/// # Arguments
/// * `backup` - The backup file about to be written
/// * `sources` - Databases that must not be overwritten
pub fn validate_backup_path(backup: &Path, sources: &[&Path]) -> Result<()> {
    if backup.exists() {
        return Err(unsafe_path(backup, "backup file already exists"));
    }
    let target = resolved(backup);
    for source in sources {
        if target == resolved(source) {
            return Err(unsafe_path(
                backup,
                format!("backup would overwrite {}", source.display()),
            ));
        }
    }
    Ok(())
}
