#![forbid(unsafe_code)]

//! Filename handling for resolved media: sanitizing raw names into something
//! the local filesystem accepts, deriving the plain/friendly/subtitle
//! variants, and handing out collision-free names for a whole run.

use std::collections::HashSet;
use std::ffi::OsStr;

/// Characters removed in cross-platform safe mode (after `"` and `:` have
/// been substituted).
const SAFE_FORBIDDEN: &[char] = &['<', '>', '|', '?', '\\', '*', '/', '\0', '\n'];

/// The only characters a POSIX path component cannot contain.
const POSIX_FORBIDDEN: &[char] = &['/', '\0'];

/// Device names Windows refuses as a file stem, in any case.
const RESERVED_STEMS: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

const SUBTITLE_EXT: &str = ".vtt";

/// Turns `raw` into a legal filename.
///
/// With `safe` unset only `/` and NUL are dropped. Safe mode targets every
/// mainstream filesystem: quotes become `'`, colons become `-`, the rest of
/// the Windows-forbidden set is stripped, trailing dots and spaces are
/// trimmed, and reserved device stems get a `_` prefix. Running safe mode
/// twice is a no-op.
pub fn sanitize(raw: &str, safe: bool) -> String {
    if !safe {
        return raw.chars().filter(|c| !POSIX_FORBIDDEN.contains(c)).collect();
    }

    let substituted = raw.replace('"', "'").replace(':', "-");
    let stripped: String = substituted
        .chars()
        .filter(|c| !SAFE_FORBIDDEN.contains(c))
        .collect();
    let trimmed = stripped.trim_end_matches(['.', ' ']);

    if is_reserved_name(trimmed) {
        format!("_{trimmed}")
    } else {
        trimmed.to_owned()
    }
}

/// Same as [`sanitize`] for names coming straight from the OS. Anything that
/// is not valid Unicode comes back empty, which callers read as "no usable
/// filename".
pub fn sanitize_os(raw: &OsStr, safe: bool) -> String {
    raw.to_str()
        .map(|value| sanitize(value, safe))
        .unwrap_or_default()
}

fn is_reserved_name(name: &str) -> bool {
    let (stem, _) = split_extension(name);
    RESERVED_STEMS
        .iter()
        .any(|reserved| stem.eq_ignore_ascii_case(reserved))
}

/// Splits `name` at its last dot. The extension keeps the dot and is empty
/// when there is none.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(index) => name.split_at(index),
        None => (name, ""),
    }
}

/// Last path segment of a URL, ignoring trailing slashes.
fn url_basename(url: &str) -> &str {
    let trimmed = url.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Extension of the last path segment of a URL, e.g. `.mp4`.
fn url_extension(url: &str) -> &str {
    split_extension(url_basename(url)).1
}

/// Filename taken from the download URL itself.
pub fn media_filename(url: &str, safe: bool) -> String {
    if url.is_empty() {
        return String::new();
    }
    sanitize(url_basename(url), safe)
}

/// Filename for a subtitle track. Tracks that are not already `.vtt` get the
/// extension appended so players pick them up.
pub fn subtitle_filename(url: &str, safe: bool) -> String {
    if url.is_empty() {
        return String::new();
    }
    let base = url_basename(url);
    if url_extension(url) == SUBTITLE_EXT {
        sanitize(base, safe)
    } else {
        sanitize(&format!("{base}{SUBTITLE_EXT}"), safe)
    }
}

/// Human readable filename: the display title plus the URL's extension.
pub fn friendly_filename(name: &str, url: &str, safe: bool) -> String {
    if url.is_empty() {
        return String::new();
    }
    sanitize(&format!("{name}{}", url_extension(url)), safe)
}

/// Human readable subtitle filename, always ending in `.vtt`.
pub fn friendly_subtitle_filename(name: &str, url: &str, safe: bool) -> String {
    if url.is_empty() {
        return String::new();
    }
    sanitize(&format!("{name}{SUBTITLE_EXT}"), safe)
}

/// Set of names already handed out during one run.
///
/// Media files and subtitle files each get their own registry since a video
/// and its subtitle track legitimately share a stem.
#[derive(Debug, Default, Clone)]
pub struct FilenameRegistry {
    issued: HashSet<String>,
}

impl FilenameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `candidate` if it has not been issued yet, otherwise the first
    /// free `stem (N).ext`. The result is registered before returning.
    /// Empty candidates pass through untouched and are never registered.
    pub fn allocate(&mut self, candidate: &str) -> String {
        if candidate.is_empty() {
            return String::new();
        }
        if self.issued.insert(candidate.to_owned()) {
            return candidate.to_owned();
        }

        let (stem, ext) = split_extension(candidate);
        let mut counter = 1u32;
        loop {
            let attempt = format!("{stem} ({counter}){ext}");
            if self.issued.insert(attempt.clone()) {
                return attempt;
            }
            counter += 1;
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.issued.contains(name)
    }

    pub fn len(&self) -> usize {
        self.issued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issued.is_empty()
    }
}
