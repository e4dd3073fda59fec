// rolltail - platform/fs.rs
//
// Path helpers shared by the tailers.

use crate::util::error::TailError;
use std::path::{Path, PathBuf};

/// Resolve `path` to an absolute, canonical directory path.
///
/// Canonical form matters: watch backends report event paths rooted at the
/// canonical location (e.g. `/private/var/...` on macOS), and the directory
/// tailer compares event paths against this value to detect that the watched
/// directory itself was moved or removed.
pub fn resolve_directory(path: &Path) -> Result<PathBuf, TailError> {
    let resolved = std::fs::canonicalize(path).map_err(|source| TailError::Resolve {
        path: path.to_path_buf(),
        source,
    })?;

    let meta = std::fs::metadata(&resolved).map_err(|source| TailError::Io {
        path: resolved.clone(),
        operation: "stat",
        source,
    })?;
    if !meta.is_dir() {
        return Err(TailError::NotADirectory { path: resolved });
    }

    tracing::debug!(
        given = %path.display(),
        resolved = %resolved.display(),
        "Directory resolved"
    );
    Ok(resolved)
}
