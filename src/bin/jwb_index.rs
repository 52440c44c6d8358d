#![forbid(unsafe_code)]

//! Command-line front end: resolves the layered configuration, walks the
//! catalog (plus broadcasting programs and local files when asked) and prints
//! the resulting index as a tree or as JSON.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use jwb_tools::api::{CatalogSource, MediatorClient};
use jwb_tools::catalog::{Category, ContentNode, flatten_media};
use jwb_tools::config::{ConfigOverrides, resolve_config};
use jwb_tools::index::build_index;
use jwb_tools::pubmedia::PubMediaClient;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "jwb-index", version, about = "Index the broadcasting media catalog")]
struct Cli {
    /// Language code of the catalog
    #[arg(short, long)]
    lang: Option<String>,

    /// Categories to start from (comma separated). JWBroadcasting adds the
    /// broadcasting MP3 programs
    #[arg(short = 'c', long = "category", value_delimiter = ',')]
    include: Option<Vec<String>>,

    /// Subcategories that are recorded but not expanded
    #[arg(long, value_delimiter = ',')]
    exclude: Option<Vec<String>>,

    /// Drop media whose primary category is listed
    #[arg(long, value_delimiter = ',')]
    filter: Option<Vec<String>>,

    /// Maximum video height, e.g. 720
    #[arg(short = 'Q', long)]
    quality: Option<i64>,

    /// Prefer videos with burned-in subtitles
    #[arg(long)]
    hard_subtitles: bool,

    /// Only keep audio renditions
    #[arg(long)]
    audio_only: bool,

    /// Only media published on or after this day (YYYY-MM-DD)
    #[arg(long)]
    since: Option<String>,

    /// Only media from the last 31 days
    #[arg(long)]
    latest: bool,

    /// Regroup media by primary category (implies --latest)
    #[arg(long)]
    update: bool,

    /// Name files after their titles
    #[arg(short = 'H', long)]
    friendly: bool,

    /// Restrict filenames to characters every filesystem accepts
    #[arg(long)]
    safe_filenames: Option<bool>,

    /// Categories fetched concurrently
    #[arg(long)]
    fetch_workers: Option<usize>,

    /// TOML configuration file (defaults to ./jwb.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Environment file read before the process environment
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// List available languages and exit
    #[arg(short = 'L', long)]
    languages: bool,

    /// List browsable root categories with their names and exit
    #[arg(long)]
    list_categories_all: bool,

    /// List the subcategories of KEY and exit
    #[arg(short = 'C', long, value_name = "KEY")]
    list_categories: Option<String>,

    /// Also index media files from a local directory
    #[arg(long, value_name = "DIR")]
    import: Option<PathBuf>,

    /// Start from the music categories with audio only
    #[arg(long)]
    music: bool,

    /// Print the index as JSON
    #[arg(long)]
    json: bool,

    /// Less logging (repeat for even less)
    #[arg(short, action = clap::ArgAction::Count)]
    quiet: u8,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            lang: self.lang.clone(),
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            filter: self.filter.clone(),
            quality: self.quality,
            hard_subtitles: self.hard_subtitles,
            audio_only: self.audio_only,
            friendly: self.friendly,
            safe_filenames: self.safe_filenames,
            since: self.since.clone(),
            latest: self.latest,
            update: self.update,
            fetch_workers: self.fetch_workers,
            music: self.music,
            config_path: self.config.clone(),
            env_path: self.env_file.clone(),
        }
    }
}

/// Default filter for a `-q` count. `RUST_LOG` takes precedence.
fn quiet_directive(quiet: u8) -> &'static str {
    match quiet {
        0 => "jwb_tools=info,jwb_index=info",
        1 => "jwb_tools=warn,jwb_index=warn",
        _ => "jwb_tools=error,jwb_index=error",
    }
}

fn init_tracing(quiet: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(quiet_directive(quiet)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    let config = resolve_config(cli.overrides()).context("invalid configuration")?;
    let client = MediatorClient::new(config.request_timeout);

    if cli.languages {
        let languages = client.languages().context("failed to list languages")?;
        for language in languages {
            println!("{:<8}{}", language.code, language.name);
        }
        return Ok(());
    }

    if cli.list_categories_all {
        let roots = client
            .root_categories(&config.lang, &config.known_useful_roots)
            .context("failed to list root categories")?;
        for key in roots {
            println!("  {}", describe_category(&client, &config.lang, &key));
        }
        return Ok(());
    }

    if let Some(key) = &cli.list_categories {
        let response = client
            .fetch_category(&config.lang, key)
            .with_context(|| format!("failed to get category {key}"))?;
        for sub in response.category.subcategories {
            println!("{:<30}{}", sub.key, sub.name);
        }
        return Ok(());
    }

    let broadcasting = PubMediaClient::new(config.request_timeout);
    let index = build_index(&client, &broadcasting, cli.import.as_deref(), &config)
        .context("failed to build index")?;

    if cli.json {
        let rendered = serde_json::to_string_pretty(&index).context("failed to encode index")?;
        println!("{rendered}");
    } else {
        print_tree(&index);
    }
    tracing::info!(media = flatten_media(&index).len(), "done");
    Ok(())
}

/// `Name (Key)` for a root category, or just the key when its details
/// cannot be fetched.
fn describe_category(source: &impl CatalogSource, lang: &str, key: &str) -> String {
    match source.fetch_category(lang, key) {
        Ok(response) if !response.category.name.is_empty() => {
            format!("{} ({key})", response.category.name)
        }
        Ok(_) => key.to_owned(),
        Err(err) => {
            tracing::warn!(category = %key, error = %err, "could not fetch category details");
            format!("{key} (could not fetch details)")
        }
    }
}

fn print_tree(index: &[Category]) {
    for category in index {
        let marker = if category.home { "*" } else { "" };
        println!("{marker}{} ({})", category.name, category.key);
        for node in &category.contents {
            match node {
                ContentNode::Category(sub) => println!("  > {} ({})", sub.name, sub.key),
                ContentNode::Media(media) => println!("  {}  {}", media.filename, media.url),
            }
        }
    }
}
