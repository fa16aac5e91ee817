use crate::error::{BenchError, Result};
use std::path::{Path, PathBuf};

fn has_artifact_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|want| want.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// List the artifact files directly inside `dir`, sorted by file name.
///
/// Subdirectories are not descended into. An existing directory with no
/// matching files yields an empty list; deciding whether that is fatal is
/// left to the caller.
pub fn locate_artifacts(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(BenchError::NotFound {
            path: dir.to_path_buf(),
        });
    }

    let mut out = Vec::new();
    for entry in walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if entry.file_type().is_file() && has_artifact_extension(entry.path(), extensions) {
            out.push(entry.path().to_path_buf());
        }
    }
    out.sort();

    tracing::debug!(dir = %dir.display(), found = out.len(), "located artifacts");
    Ok(out)
}

/// Display name of an artifact: its file name.
pub fn artifact_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
