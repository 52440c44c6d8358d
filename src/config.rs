#![forbid(unsafe_code)]

//! Traversal configuration.
//!
//! Values are layered: built-in defaults, then `jwb.toml`, then `.env` /
//! process environment, then explicit overrides from the command line. The
//! merged [`TraversalConfig`] is validated once and never changes afterwards.

use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::{DateTime, Local, TimeZone};
use serde::Deserialize;

use crate::api::DEFAULT_TIMEOUT;
use crate::dates::{latest_window, parse_day};
use crate::error::ConfigError;
use crate::rendition::SelectionPrefs;

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_CONFIG_PATH: &str = "jwb.toml";
pub const DEFAULT_LANG: &str = "E";
pub const DEFAULT_QUALITY: i64 = 720;
pub const DEFAULT_INCLUDE: &[&str] = &["VideoOnDemand"];
pub const DEFAULT_EXCLUDE: &[&str] = &["VODSJJMeetings"];
pub const DEFAULT_KNOWN_USEFUL_ROOTS: &[&str] = &["Audio"];
/// Include list of the music preset.
pub const MUSIC_CATEGORIES: &[&str] = &[
    "AudioOriginalSongs",
    "SJJMeetings",
    "SJJChorus",
    "SJJInstrumental",
    "AudioChildrenSongs",
    "KingdomMelodies",
];

/// Everything a traversal run needs, fixed at start.
#[derive(Debug, Clone, PartialEq)]
pub struct TraversalConfig {
    pub lang: String,
    /// Seeds of the walk. Also decides which categories are marked `home`.
    pub include_categories: Vec<String>,
    /// Recorded as children but never expanded.
    pub exclude_categories: Vec<String>,
    /// Media whose primary category is listed here are dropped outright.
    pub filter_categories: Vec<String>,
    pub quality: i64,
    pub hard_subtitles: bool,
    pub audio_only: bool,
    pub min_date: i64,
    /// Zero or below means no upper bound.
    pub max_date: i64,
    pub friendly_filenames: bool,
    pub safe_filenames: bool,
    /// Regroup media by primary category instead of by traversal parent.
    pub update: bool,
    /// Category fetches in flight at once. 1 keeps the walk strictly
    /// sequential.
    pub fetch_workers: usize,
    /// Root categories offered even though they carry an exclude tag.
    pub known_useful_roots: Vec<String>,
    pub request_timeout: Duration,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            lang: DEFAULT_LANG.to_owned(),
            include_categories: owned(DEFAULT_INCLUDE),
            exclude_categories: owned(DEFAULT_EXCLUDE),
            filter_categories: Vec::new(),
            quality: DEFAULT_QUALITY,
            hard_subtitles: false,
            audio_only: false,
            min_date: 0,
            max_date: 0,
            friendly_filenames: false,
            safe_filenames: cfg!(windows),
            update: false,
            fetch_workers: 1,
            known_useful_roots: owned(DEFAULT_KNOWN_USEFUL_ROOTS),
            request_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl TraversalConfig {
    /// Defaults for indexing music: the song categories, nothing excluded,
    /// audio renditions only.
    pub fn music() -> Self {
        Self {
            include_categories: owned(MUSIC_CATEGORIES),
            exclude_categories: Vec::new(),
            audio_only: true,
            ..Self::default()
        }
    }

    /// Rejects configurations that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lang.trim().is_empty() {
            return Err(ConfigError::EmptyLanguage);
        }
        if self.include_categories.is_empty() {
            return Err(ConfigError::EmptyIncludeList);
        }
        if self.quality <= 0 {
            return Err(ConfigError::InvalidQuality(self.quality));
        }
        if self.max_date > 0 && self.min_date > self.max_date {
            return Err(ConfigError::InvertedDateWindow {
                min: self.min_date,
                max: self.max_date,
            });
        }
        Ok(())
    }

    pub fn selection_prefs(&self) -> SelectionPrefs {
        SelectionPrefs {
            quality_cap: self.quality,
            prefer_subtitled: self.hard_subtitles,
            audio_only: self.audio_only,
        }
    }
}

/// Shape of `jwb.toml`. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    pub lang: Option<String>,
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    pub filter: Option<Vec<String>>,
    pub quality: Option<i64>,
    pub hard_subtitles: Option<bool>,
    pub audio_only: Option<bool>,
    pub friendly: Option<bool>,
    pub safe_filenames: Option<bool>,
    pub fetch_workers: Option<usize>,
    pub known_useful_roots: Option<Vec<String>>,
    pub timeout_secs: Option<u64>,
}

/// Values given explicitly on the command line. `None` defers to the lower
/// layers.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub lang: Option<String>,
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    pub filter: Option<Vec<String>>,
    pub quality: Option<i64>,
    pub hard_subtitles: bool,
    pub audio_only: bool,
    pub friendly: bool,
    pub safe_filenames: Option<bool>,
    /// `YYYY-MM-DD` lower bound.
    pub since: Option<String>,
    /// Restrict to the last 31 days through today.
    pub latest: bool,
    /// Update mode. Implies `latest`.
    pub update: bool,
    pub fetch_workers: Option<usize>,
    /// Start from [`TraversalConfig::music`] instead of the video defaults.
    pub music: bool,
    pub config_path: Option<PathBuf>,
    pub env_path: Option<PathBuf>,
}

/// Reads every configuration layer and returns the validated result.
pub fn resolve_config(overrides: ConfigOverrides) -> Result<TraversalConfig, ConfigError> {
    let file_config = match &overrides.config_path {
        Some(path) => load_file_config(path, true)?,
        None => load_file_config(Path::new(DEFAULT_CONFIG_PATH), false)?,
    };
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    build_config(file_config, &file_vars, env_var_string, overrides, &Local::now())
}

/// Loads `path` as TOML. A missing file yields defaults unless `required`.
pub fn load_file_config(path: &Path, required: bool) -> Result<FileConfig, ConfigError> {
    if !required && !path.exists() {
        return Ok(FileConfig::default());
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn build_config<Tz: TimeZone>(
    file_config: FileConfig,
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: ConfigOverrides,
    today: &DateTime<Tz>,
) -> Result<TraversalConfig, ConfigError> {
    let defaults = if overrides.music {
        TraversalConfig::music()
    } else {
        TraversalConfig::default()
    };

    let lang = overrides
        .lang
        .filter(|value| !value.trim().is_empty())
        .or_else(|| lookup_value("JWB_LANG", file_vars, &env_lookup))
        .or(file_config.lang)
        .unwrap_or(defaults.lang);
    let quality = overrides
        .quality
        .or_else(|| {
            lookup_value("JWB_QUALITY", file_vars, &env_lookup)
                .and_then(|value| value.parse::<i64>().ok())
        })
        .or(file_config.quality)
        .unwrap_or(defaults.quality);

    let update = overrides.update;
    let (mut min_date, mut max_date) = (defaults.min_date, defaults.max_date);
    if let Some(since) = &overrides.since {
        min_date = parse_day(since)?;
    }
    if overrides.latest || update {
        (min_date, max_date) = latest_window(today);
    }

    let config = TraversalConfig {
        lang: lang.trim().to_owned(),
        include_categories: overrides
            .include
            .or(file_config.include)
            .unwrap_or(defaults.include_categories),
        exclude_categories: overrides
            .exclude
            .or(file_config.exclude)
            .unwrap_or(defaults.exclude_categories),
        filter_categories: overrides
            .filter
            .or(file_config.filter)
            .unwrap_or(defaults.filter_categories),
        quality,
        hard_subtitles: overrides.hard_subtitles
            || file_config.hard_subtitles.unwrap_or(defaults.hard_subtitles),
        audio_only: overrides.audio_only || file_config.audio_only.unwrap_or(defaults.audio_only),
        min_date,
        max_date,
        friendly_filenames: overrides.friendly
            || file_config.friendly.unwrap_or(defaults.friendly_filenames),
        safe_filenames: overrides
            .safe_filenames
            .or(file_config.safe_filenames)
            .unwrap_or(defaults.safe_filenames),
        update,
        fetch_workers: overrides
            .fetch_workers
            .or(file_config.fetch_workers)
            .unwrap_or(defaults.fetch_workers)
            .max(1),
        known_useful_roots: file_config
            .known_useful_roots
            .unwrap_or(defaults.known_useful_roots),
        request_timeout: file_config
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout),
    };
    config.validate()?;
    Ok(config)
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

/// Non-blank value of a process environment variable.
fn env_var_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

/// Process environment first, then the `.env` file.
fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| file_vars.get(key).cloned())
}

/// Splits one `.env` line into key and unquoted value. Blank lines, comments
/// and lines without `=` or with an empty value yield `None`.
fn parse_env_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    let value = unquote(value.trim());
    (!key.is_empty() && !value.is_empty()).then_some((key, value))
}

fn unquote(value: &str) -> &str {
    ['"', '\'']
        .into_iter()
        .find_map(|quote| value.strip_prefix(quote)?.strip_suffix(quote))
        .unwrap_or(value)
}

/// Reads a dotenv-style file into a map. A missing file is an empty map.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(content
        .lines()
        .filter_map(parse_env_line)
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect())
}
