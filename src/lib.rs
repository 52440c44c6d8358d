#![forbid(unsafe_code)]

//! Catalog indexing for the broadcasting media library.
//!
//! The library walks the remote category graph, picks one rendition per
//! media item, filters by publish date and hands out filenames that are
//! unique across the whole run. Binaries under `src/bin` wire the pieces to
//! a command line.

pub mod api;
pub mod catalog;
pub mod config;
pub mod dates;
pub mod error;
pub mod filename;
pub mod import;
pub mod index;
pub mod pubmedia;
pub mod rendition;
pub mod traversal;
