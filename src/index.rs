#![forbid(unsafe_code)]

//! Assembles one index from every configured source: the broadcasting
//! programs when `JWBroadcasting` is requested, then the category walk over
//! the remaining include keys, then an optional offline import.

use std::path::Path;

use crate::api::CatalogSource;
use crate::catalog::Category;
use crate::config::TraversalConfig;
use crate::error::IndexError;
use crate::import::import_directory;
use crate::pubmedia::{PubMediaClient, split_broadcasting};
use crate::traversal::Traversal;

/// Builds the combined index.
///
/// The whole configuration is validated before any request. When the include
/// list names nothing but `JWBroadcasting`, no category is walked.
pub fn build_index<S: CatalogSource>(
    catalog: &S,
    broadcasting: &PubMediaClient,
    import_dir: Option<&Path>,
    config: &TraversalConfig,
) -> Result<Vec<Category>, IndexError> {
    config.validate()?;
    let (wants_broadcasting, catalog_keys) = split_broadcasting(&config.include_categories);
    let mut index = Vec::new();

    if wants_broadcasting {
        index.extend(broadcasting.broadcasting_mp3s(config));
    }

    if !catalog_keys.is_empty() {
        let walk_config = TraversalConfig {
            include_categories: catalog_keys,
            ..config.clone()
        };
        index.extend(Traversal::new(catalog, &walk_config)?.run());
    }

    if let Some(dir) = import_dir {
        index.extend(import_directory(dir, config.safe_filenames)?);
    }

    Ok(index)
}
