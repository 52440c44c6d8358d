#![forbid(unsafe_code)]

//! Breadth-first walk over the category graph.
//!
//! Starting from the configured include keys, every category is fetched once,
//! its subcategories are queued (unless excluded) and its media entries are
//! resolved into [`Media`] records: best rendition, date window, filenames.
//! A failing key is logged and skipped; it never aborts the run.
//!
//! With `fetch_workers > 1` several queued keys are fetched concurrently, but
//! responses are applied strictly in queue order by a single thread, so the
//! output is identical to a sequential walk.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::api::{CatalogSource, CategoryResponse, MediaEntry};
use crate::catalog::{Category, ContentNode, Media};
use crate::config::TraversalConfig;
use crate::dates::{in_window, parse_date};
use crate::error::{ConfigError, FetchError};
use crate::filename::{
    FilenameRegistry, friendly_filename, friendly_subtitle_filename, media_filename,
    subtitle_filename,
};
use crate::rendition::{Selection, select_best};

/// Mutable bookkeeping for one run. Nothing here outlives [`Traversal::run`].
#[derive(Debug, Default)]
struct TraversalState {
    queue: VecDeque<String>,
    processed: HashSet<String>,
    filenames: FilenameRegistry,
    subtitle_filenames: FilenameRegistry,
    result: Vec<Category>,
}

impl TraversalState {
    fn seeded(keys: &[String]) -> Self {
        Self {
            queue: keys.iter().cloned().collect(),
            ..Self::default()
        }
    }

    /// Pops up to `limit` keys that have not been visited yet, marking them
    /// as processed.
    fn next_batch(&mut self, limit: usize) -> Vec<String> {
        let mut batch = Vec::new();
        while batch.len() < limit {
            let Some(key) = self.queue.pop_front() else {
                break;
            };
            if self.processed.insert(key.clone()) {
                batch.push(key);
            }
        }
        batch
    }

    /// Category in the result list with `key`, created on first use.
    fn regrouped_category(&mut self, key: &str) -> &mut Category {
        let index = match self.result.iter().position(|category| category.key == key) {
            Some(index) => index,
            None => {
                self.result.push(Category::new(key, key, false));
                self.result.len() - 1
            }
        };
        &mut self.result[index]
    }
}

/// A configured walk over one catalog source.
#[derive(Debug)]
pub struct Traversal<'a, S: CatalogSource> {
    source: &'a S,
    config: &'a TraversalConfig,
}

impl<'a, S: CatalogSource> Traversal<'a, S> {
    /// Validates `config` up front so a bad configuration fails before any
    /// request is made.
    pub fn new(source: &'a S, config: &'a TraversalConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { source, config })
    }

    /// Walks the graph and returns the resolved categories.
    ///
    /// Outside update mode the result holds one entry per fetched category in
    /// visit order. In update mode media are regrouped under categories keyed
    /// by their primary category, created as they are first seen.
    pub fn run(&self) -> Vec<Category> {
        let mut state = TraversalState::seeded(&self.config.include_categories);
        loop {
            let batch = state.next_batch(self.config.fetch_workers.max(1));
            if batch.is_empty() {
                break;
            }
            for (key, outcome) in self.fetch_batch(batch) {
                match outcome {
                    Ok(response) => self.apply(&mut state, response),
                    Err(err) => warn!(category = %key, error = %err, "could not get category"),
                }
            }
        }
        state.result
    }

    /// Fetches every key of the batch, concurrently when allowed, and returns
    /// the outcomes in batch order.
    fn fetch_batch(&self, keys: Vec<String>) -> Vec<(String, Result<CategoryResponse, FetchError>)> {
        let lang = self.config.lang.as_str();
        for key in &keys {
            info!(category = %key, "indexing");
        }

        let workers = self.config.fetch_workers.min(keys.len());
        if workers <= 1 {
            return keys
                .into_iter()
                .map(|key| {
                    let outcome = self.source.fetch_category(lang, &key);
                    (key, outcome)
                })
                .collect();
        }

        let slots: Mutex<Vec<Option<Result<CategoryResponse, FetchError>>>> =
            Mutex::new((0..keys.len()).map(|_| None).collect());
        let cursor = AtomicUsize::new(0);
        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| {
                    loop {
                        let index = cursor.fetch_add(1, Ordering::Relaxed);
                        let Some(key) = keys.get(index) else {
                            break;
                        };
                        let outcome = self.source.fetch_category(lang, key);
                        slots.lock()[index] = Some(outcome);
                    }
                });
            }
        });

        keys.into_iter()
            .zip(slots.into_inner())
            .filter_map(|(key, slot)| slot.map(|outcome| (key, outcome)))
            .collect()
    }

    /// Folds one fetched category into the run state.
    fn apply(&self, state: &mut TraversalState, response: CategoryResponse) {
        let payload = response.category;
        let mut category = Category::new(
            payload.key.as_str(),
            payload.name.as_str(),
            self.config.include_categories.contains(&payload.key),
        );

        for sub in payload.subcategories {
            if !self.config.exclude_categories.contains(&sub.key) {
                state.queue.push_back(sub.key.clone());
            }
            category
                .contents
                .push(ContentNode::Category(Category::new(sub.key, sub.name, false)));
        }

        for entry in &payload.media {
            if self.config.filter_categories.contains(&entry.primary_category) {
                continue;
            }
            let Some(media) = self.resolve_media(state, entry) else {
                continue;
            };
            if self.config.update {
                state
                    .regrouped_category(&entry.primary_category)
                    .contents
                    .push(ContentNode::Media(media));
            } else {
                category.contents.push(ContentNode::Media(media));
            }
        }

        if !self.config.update {
            state.result.push(category);
        }
    }

    /// Turns one media entry into a record, or `None` when it has no usable
    /// file or falls outside the date window.
    fn resolve_media(&self, state: &mut TraversalState, entry: &MediaEntry) -> Option<Media> {
        let config = self.config;
        let file = match select_best(&entry.media_type, &entry.files, config.selection_prefs()) {
            Selection::Selected(file) => file,
            Selection::NoAudio => {
                info!(title = %entry.title, "no audio files found, skipping video-only content");
                return None;
            }
            Selection::Empty => {
                info!(title = %entry.title, "no media files found");
                return None;
            }
        };

        let mut media = Media::from_rendition(&entry.title, file);

        if !entry.first_published.is_empty() {
            match parse_date(&entry.first_published) {
                Ok(date) => {
                    let ts = date.timestamp();
                    if !in_window(ts, config.min_date, config.max_date) {
                        debug!(title = %entry.title, ts, "outside date window");
                        return None;
                    }
                    media.date = ts;
                }
                Err(err) => debug!(title = %entry.title, error = %err, "could not get timestamp"),
            }
        }

        let safe = config.safe_filenames;
        let plain = media_filename(&media.url, safe);
        media.friendly_name = friendly_filename(&media.name, &media.url, safe);
        let plain_subtitle = subtitle_filename(&media.subtitle_url, safe);
        media.friendly_subtitle_filename =
            friendly_subtitle_filename(&media.name, &media.subtitle_url, safe);

        if config.friendly_filenames {
            media.filename = state.filenames.allocate(&media.friendly_name);
            media.subtitle_filename = state
                .subtitle_filenames
                .allocate(&media.friendly_subtitle_filename);
        } else {
            media.filename = state.filenames.allocate(&plain);
            media.subtitle_filename = state.subtitle_filenames.allocate(&plain_subtitle);
        }

        Some(media)
    }
}
