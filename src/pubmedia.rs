#![forbid(unsafe_code)]

//! Index of the monthly broadcasting programs published as MP3 files through
//! the publication-media API, wrapped as a single category.

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::api::{build_agent, get_json, null_as_default};
use crate::catalog::{Category, ContentNode, Media};
use crate::config::TraversalConfig;
use crate::dates::{in_window, parse_pubmedia_date};
use crate::error::FetchError;
use crate::filename::{FilenameRegistry, friendly_filename, media_filename};

pub const PUB_MEDIA_URL: &str = "https://b.jw-cdn.org/apis/pub-media/GETPUBMEDIALINKS";

/// Newest `jwb-NNN` publication scanned. One issue holds a year of programs.
pub const LATEST_ISSUE: u32 = 134;
/// How many older issues are scanned after the newest one.
pub const ISSUE_SPAN: u32 = 10;

pub const BROADCASTING_KEY: &str = "JWBroadcasting";
const BROADCASTING_NAME: &str = "JW Broadcasting (Audio)";

/// Tracks numbered from here on are audio-described variants.
const AUDIO_DESCRIPTION_TRACK: i64 = 100;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PubMediaFile {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub file: PubMediaLink,
    #[serde(default, deserialize_with = "null_as_default")]
    pub filesize: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub track: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mimetype: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub duration: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PubMediaLink {
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub modified_datetime: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub checksum: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormatFiles {
    #[serde(default, rename = "MP3", deserialize_with = "null_as_default")]
    pub mp3: Vec<PubMediaFile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PubMediaResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub pub_name: String,
    #[serde(default, rename = "pub", deserialize_with = "null_as_default")]
    pub pub_code: String,
    /// Keyed by language code.
    #[serde(default, deserialize_with = "null_as_default")]
    pub files: HashMap<String, FormatFiles>,
}

impl PubMediaFile {
    /// Regular program tracks, as opposed to audio-described versions.
    pub fn is_main_program(&self) -> bool {
        self.track < AUDIO_DESCRIPTION_TRACK
            && !self.title.to_lowercase().contains("audio description")
    }
}

/// Splits the include list into "broadcasting requested" and the keys left
/// for the category walk.
pub fn split_broadcasting(include: &[String]) -> (bool, Vec<String>) {
    let requested = include.iter().any(|key| key == BROADCASTING_KEY);
    let rest = include
        .iter()
        .filter(|key| *key != BROADCASTING_KEY)
        .cloned()
        .collect();
    (requested, rest)
}

#[derive(Debug, Clone)]
pub struct PubMediaClient {
    agent: ureq::Agent,
    base_url: String,
    issues: RangeInclusive<u32>,
}

impl PubMediaClient {
    pub fn new(timeout: Duration) -> Self {
        Self::with_base_url(PUB_MEDIA_URL, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Self {
        Self {
            agent: build_agent(timeout),
            base_url: base_url.to_owned(),
            issues: LATEST_ISSUE.saturating_sub(ISSUE_SPAN)..=LATEST_ISSUE,
        }
    }

    /// Restricts the scan to other `jwb-NNN` issue numbers.
    pub fn with_issues(mut self, issues: RangeInclusive<u32>) -> Self {
        self.issues = issues;
        self
    }

    /// MP3 files of one publication in `lang`.
    pub fn issue_mp3s(&self, lang: &str, pub_code: &str) -> Result<Vec<PubMediaFile>, FetchError> {
        let url = format!(
            "{}?output=json&pub={pub_code}&langwritten={lang}&alllangs=0&fileformat=MP3",
            self.base_url
        );
        let mut response: PubMediaResponse = get_json(&self.agent, &url, pub_code)?;
        response
            .files
            .remove(lang)
            .map(|formats| formats.mp3)
            .ok_or_else(|| FetchError::NotFound(format!("{pub_code} in language {lang}")))
    }

    /// Scans the recent broadcasting issues, newest first.
    pub fn broadcasting_mp3s(&self, config: &TraversalConfig) -> Vec<Category> {
        self.index_issues(self.issues.clone().rev(), config)
    }

    /// Builds the broadcasting category from the given `jwb-NNN` issues.
    /// Issues that fail to load are logged and skipped. The result is empty
    /// when nothing survived filtering.
    pub fn index_issues(
        &self,
        issues: impl IntoIterator<Item = u32>,
        config: &TraversalConfig,
    ) -> Vec<Category> {
        let mut category = Category::new(BROADCASTING_KEY, BROADCASTING_NAME, true);
        let mut filenames = FilenameRegistry::new();

        for issue in issues {
            let pub_code = format!("jwb-{issue}");
            info!(publication = %pub_code, "indexing");
            let files = match self.issue_mp3s(&config.lang, &pub_code) {
                Ok(files) => files,
                Err(err) => {
                    warn!(publication = %pub_code, error = %err, "could not fetch publication");
                    continue;
                }
            };

            for file in files.iter().filter(|file| file.is_main_program()) {
                if let Some(media) = program_media(file, config, &mut filenames) {
                    category.contents.push(ContentNode::Media(media));
                }
            }
        }

        if category.contents.is_empty() {
            Vec::new()
        } else {
            vec![category]
        }
    }
}

fn program_media(
    file: &PubMediaFile,
    config: &TraversalConfig,
    filenames: &mut FilenameRegistry,
) -> Option<Media> {
    let mut media = Media {
        url: file.file.url.clone(),
        name: file.title.clone(),
        md5: file.file.checksum.clone(),
        size: file.filesize,
        duration: file.duration,
        ..Media::default()
    };

    if !file.file.modified_datetime.is_empty() {
        if let Ok(date) = parse_pubmedia_date(&file.file.modified_datetime) {
            let ts = date.timestamp();
            if !in_window(ts, config.min_date, config.max_date) {
                return None;
            }
            media.date = ts;
        }
    }

    let safe = config.safe_filenames;
    media.friendly_name = friendly_filename(&media.name, &media.url, safe);
    media.filename = if config.friendly_filenames {
        filenames.allocate(&media.friendly_name)
    } else {
        filenames.allocate(&media_filename(&media.url, safe))
    };
    Some(media)
}
