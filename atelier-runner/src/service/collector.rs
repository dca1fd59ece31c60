//! Result collection

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

use crate::error::CollectError;

/// File extensions recognised as generated images (compared case-insensitively)
pub const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// Returns up to `limit` image files in `dir`, newest first
///
/// An empty directory yields an empty list. Only failing to read the
/// directory itself is an error; unreadable entries are skipped.
pub fn collect_images(dir: &Path, limit: usize) -> Result<Vec<PathBuf>, CollectError> {
    let entries = std::fs::read_dir(dir).map_err(|source| CollectError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut images: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };

        let path = entry.path();
        if !is_image(&path) {
            continue;
        }

        match entry.metadata() {
            Ok(meta) if meta.is_file() => {
                let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                images.push((modified, path));
            }
            Ok(_) => {}
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }

    images.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    images.truncate(limit);

    debug!("Collected {} image(s) from {}", images.len(), dir.display());
    Ok(images.into_iter().map(|(_, path)| path).collect())
}

/// Deletes every image file in `dir`, returning how many were removed
///
/// A missing directory holds no images. Failing to delete one is an error,
/// since the file would otherwise be collected later.
pub fn remove_images(dir: &Path) -> Result<usize, CollectError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(source) => {
            return Err(CollectError::ReadDir {
                path: dir.to_path_buf(),
                source,
            });
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if !is_image(&path) || !entry.file_type().is_ok_and(|t| t.is_file()) {
            continue;
        }

        std::fs::remove_file(&path).map_err(|source| CollectError::Remove {
            path: path.clone(),
            source,
        })?;
        debug!("Removed {}", path.display());
        removed += 1;
    }

    Ok(removed)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}
