#![forbid(unsafe_code)]

//! The resolved catalog handed to downloaders and output writers.
//!
//! A run produces a list of [`Category`] trees. Contents are either nested
//! category references or fully resolved [`Media`] leaves.

use serde::Serialize;

use crate::api::MediaFile;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Category {
    pub key: String,
    pub name: String,
    /// Set on categories the user asked for directly.
    pub home: bool,
    pub contents: Vec<ContentNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ContentNode {
    Category(Category),
    Media(Media),
}

/// One playable item resolved to a single file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Media {
    /// Publish date in epoch seconds, 0 when unknown.
    pub date: i64,
    pub duration: f64,
    pub md5: String,
    pub name: String,
    pub size: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub subtitle_url: String,
    pub url: String,
    /// Unique within the run. Empty when no usable name could be derived.
    pub filename: String,
    pub friendly_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub subtitle_filename: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub friendly_subtitle_filename: String,
}

impl Media {
    /// Copies the transfer details of the chosen rendition.
    pub fn from_rendition(name: &str, file: &MediaFile) -> Self {
        Self {
            url: file.progressive_download_url.clone(),
            name: name.to_owned(),
            md5: file.checksum.clone(),
            size: file.filesize,
            duration: file.duration,
            subtitle_url: file.subtitle_url().to_owned(),
            ..Self::default()
        }
    }

    pub fn has_known_date(&self) -> bool {
        self.date != 0
    }

    pub fn has_subtitles(&self) -> bool {
        !self.subtitle_url.is_empty()
    }
}

impl Category {
    pub fn new(key: impl Into<String>, name: impl Into<String>, home: bool) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            home,
            contents: Vec::new(),
        }
    }

    /// Media leaves directly inside this category.
    pub fn media(&self) -> impl Iterator<Item = &Media> {
        self.contents.iter().filter_map(|node| match node {
            ContentNode::Media(media) => Some(media),
            ContentNode::Category(_) => None,
        })
    }

    /// Subcategory references directly inside this category.
    pub fn subcategories(&self) -> impl Iterator<Item = &Category> {
        self.contents.iter().filter_map(|node| match node {
            ContentNode::Category(category) => Some(category),
            ContentNode::Media(_) => None,
        })
    }
}

/// Every media leaf across all categories, nested ones included, in
/// traversal order.
pub fn flatten_media(categories: &[Category]) -> Vec<&Media> {
    let mut out = Vec::new();
    for category in categories {
        collect_media(category, &mut out);
    }
    out
}

fn collect_media<'a>(category: &'a Category, out: &mut Vec<&'a Media>) {
    for node in &category.contents {
        match node {
            ContentNode::Media(media) => out.push(media),
            ContentNode::Category(child) => collect_media(child, out),
        }
    }
}
