#![forbid(unsafe_code)]

//! Offline import: wraps media files already on disk as a catalog category so
//! they flow through the same output path as fetched media.

use std::path::{self, Path};
use std::time::UNIX_EPOCH;

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::catalog::{Category, ContentNode, Media};
use crate::error::ImportError;
use crate::filename::{sanitize_os, split_extension};

pub const IMPORT_KEY: &str = "imported";
const IMPORT_NAME: &str = "Imported Media";

/// Extensions picked up by the import, lowercase and without the dot.
pub const MEDIA_EXTENSIONS: &[&str] = &["mp4", "mp3", "m4a", "aac", "ogg", "wav"];

/// Scans the top level of `dir` for media files.
///
/// Subdirectories are not descended into. Entries whose names are not valid
/// Unicode, or cannot be inspected, are skipped with a warning. Returns an
/// empty list when nothing matched.
pub fn import_directory(dir: &Path, safe: bool) -> Result<Vec<Category>, ImportError> {
    let mut category = Category::new(IMPORT_KEY, IMPORT_NAME, true);

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(source) if source.depth() == 0 => {
                return Err(ImportError {
                    path: dir.to_path_buf(),
                    source,
                });
            }
            Err(err) => {
                warn!(error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || !has_media_extension(entry.path()) {
            continue;
        }

        let filename = sanitize_os(entry.file_name(), safe);
        if filename.is_empty() {
            warn!(path = %entry.path().display(), "skipping file without a usable name");
            continue;
        }
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!(path = %entry.path().display(), error = %err, "could not get file info");
                continue;
            }
        };
        let location = match path::absolute(entry.path()) {
            Ok(location) => location,
            Err(err) => {
                warn!(path = %entry.path().display(), error = %err, "could not resolve path");
                continue;
            }
        };
        let date = metadata
            .modified()
            .ok()
            .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |age| age.as_secs() as i64);

        let name = split_extension(&filename).0.to_owned();
        category.contents.push(ContentNode::Media(Media {
            url: location.to_string_lossy().into_owned(),
            name,
            size: metadata.len() as i64,
            date,
            friendly_name: filename.clone(),
            filename,
            ..Media::default()
        }));
    }

    if category.contents.is_empty() {
        return Ok(Vec::new());
    }
    info!(count = category.contents.len(), dir = %dir.display(), "imported files");
    Ok(vec![category])
}

fn has_media_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            MEDIA_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}
