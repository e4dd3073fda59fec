// rolltail - core/scanner.rs
//
// Candidate selection for directory tailing.
//
// Lists the immediate children of a directory in name-ascending order and
// picks the lexicographically greatest regular file whose extension is in the
// allow-list. This relies on log files being named so that name order tracks
// recency (date- or sequence-suffixed names); it is a convention, not a
// guarantee.
//
// `walkdir` is used with depth 1 and `sort_by_file_name` so the listing order
// is the same on every platform.

use crate::core::model::ExtensionSet;
use crate::util::error::TailError;
use std::path::{Path, PathBuf};

/// Return the current candidate file in `dir`, or `Ok(None)` when no entry
/// matches. A missing candidate is a tolerated steady state, not an error.
///
/// Errors only when the directory itself cannot be listed.
pub fn select_candidate(
    dir: &Path,
    extensions: &ExtensionSet,
) -> Result<Option<PathBuf>, TailError> {
    let walker = walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    let mut candidate = None;
    for entry in walker {
        let entry = entry.map_err(|source| TailError::Scan {
            path: dir.to_path_buf(),
            source,
        })?;

        if is_directory(&entry) {
            continue;
        }
        if !extensions.matches(entry.path()) {
            continue;
        }
        // Ascending listing: the last match wins.
        candidate = Some(entry.into_path());
    }

    match &candidate {
        Some(path) => tracing::trace!(
            dir = %dir.display(),
            candidate = %path.display(),
            "Scanner: candidate selected"
        ),
        None => tracing::trace!(dir = %dir.display(), "Scanner: no matching file"),
    }

    Ok(candidate)
}

/// Directories and symlinks to directories are never candidates.
fn is_directory(entry: &walkdir::DirEntry) -> bool {
    let ft = entry.file_type();
    ft.is_dir() || (ft.is_symlink() && entry.path().is_dir())
}
