#![forbid(unsafe_code)]

//! Client side of the mediator catalog API.
//!
//! The structs below mirror the JSON the service returns. Only the fields the
//! traversal reads are modelled; everything is defaulted so partially filled
//! entries still decode.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::error::FetchError;

pub const MEDIATOR_BASE_URL: &str = "https://data.jw-api.org/mediator/v1";

/// Per-request timeout used when the caller does not pick one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Locale the language list is requested in.
const LANGUAGE_LIST_LOCALE: &str = "E";

/// Tags that hide a root category from normal browsing.
const MAJOR_EXCLUDE_TAGS: &[&str] = &["WebExclude", "JWORGExclude"];

/// Root category types that can actually be browsed.
const BROWSABLE_ROOT_TYPES: &[&str] = &["container", "ondemand"];

/// Reads an explicit `null` as the type's empty value, same as a missing
/// field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// One downloadable rendition of a media item.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFile {
    #[serde(default, rename = "progressiveDownloadURL", deserialize_with = "null_as_default")]
    pub progressive_download_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub checksum: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub filesize: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub duration: f64,
    /// Quality label such as `720p`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub label: String,
    /// Subtitles burned into the picture.
    #[serde(default, deserialize_with = "null_as_default")]
    pub subtitled: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subtitles: Option<SubtitleRef>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mimetype: String,
}

impl MediaFile {
    /// URL of the separate subtitle track, empty when there is none.
    pub fn subtitle_url(&self) -> &str {
        self.subtitles
            .as_ref()
            .map(|subtitles| subtitles.url.as_str())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubtitleRef {
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, rename = "type", deserialize_with = "null_as_default")]
    pub media_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub primary_category: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub first_published: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub files: Vec<MediaFile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubcategoryRef {
    #[serde(default, deserialize_with = "null_as_default")]
    pub key: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryPayload {
    #[serde(default, deserialize_with = "null_as_default")]
    pub key: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subcategories: Vec<SubcategoryRef>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub media: Vec<MediaEntry>,
}

/// Body of `GET /categories/{lang}/{key}?detailed=1`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryResponse {
    pub category: CategoryPayload,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RootCategory {
    #[serde(default, deserialize_with = "null_as_default")]
    pub key: String,
    #[serde(default, rename = "type", deserialize_with = "null_as_default")]
    pub category_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RootCategoriesResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub categories: Vec<RootCategory>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Language {
    #[serde(default, deserialize_with = "null_as_default")]
    pub code: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct LanguagesResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    languages: Vec<Language>,
}

/// Anything that can resolve a category key into its contents.
///
/// The traversal only depends on this trait, which keeps it testable against
/// an in-memory catalog. Implementations are shared across fetch workers and
/// therefore must be `Sync`.
pub trait CatalogSource: Sync {
    fn fetch_category(&self, lang: &str, key: &str) -> Result<CategoryResponse, FetchError>;
}

/// Picks the root categories worth offering to users.
///
/// A category qualifies when it is browsable (`container` or `ondemand`) and
/// either carries none of the major exclude tags or is explicitly allowed.
pub fn select_root_categories(categories: &[RootCategory], allow: &[String]) -> Vec<String> {
    categories
        .iter()
        .filter(|category| BROWSABLE_ROOT_TYPES.contains(&category.category_type.as_str()))
        .filter(|category| {
            let excluded = category
                .tags
                .iter()
                .any(|tag| MAJOR_EXCLUDE_TAGS.contains(&tag.as_str()));
            !excluded || allow.iter().any(|key| key == &category.key)
        })
        .map(|category| category.key.clone())
        .collect()
}

/// Blocking HTTP client for the mediator API.
#[derive(Debug, Clone)]
pub struct MediatorClient {
    agent: ureq::Agent,
    base_url: String,
}

impl MediatorClient {
    pub fn new(timeout: Duration) -> Self {
        Self::with_base_url(MEDIATOR_BASE_URL, timeout)
    }

    /// Points the client at another deployment (or a local test server).
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Self {
        Self {
            agent: build_agent(timeout),
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    /// Every language the catalog is published in.
    pub fn languages(&self) -> Result<Vec<Language>, FetchError> {
        let url = format!(
            "{}/languages/{LANGUAGE_LIST_LOCALE}/web?clientType=www",
            self.base_url
        );
        let response: LanguagesResponse = get_json(&self.agent, &url, "language list")?;
        Ok(response.languages)
    }

    /// Keys of the browsable root categories for `lang`. `allow` names
    /// categories kept even though they carry an exclude tag.
    pub fn root_categories(&self, lang: &str, allow: &[String]) -> Result<Vec<String>, FetchError> {
        let url = format!("{}/categories/{lang}/?detailed=1", self.base_url);
        let response: RootCategoriesResponse = get_json(&self.agent, &url, "root categories")?;
        Ok(select_root_categories(&response.categories, allow))
    }
}

impl CatalogSource for MediatorClient {
    fn fetch_category(&self, lang: &str, key: &str) -> Result<CategoryResponse, FetchError> {
        let url = format!("{}/categories/{lang}/{key}?detailed=1", self.base_url);
        get_json(&self.agent, &url, &format!("category {key}"))
    }
}

pub(crate) fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(timeout)
        .user_agent(concat!("jwb-tools/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Issues a GET and decodes the JSON body, mapping every failure onto
/// [`FetchError`].
pub(crate) fn get_json<T: DeserializeOwned>(
    agent: &ureq::Agent,
    url: &str,
    resource: &str,
) -> Result<T, FetchError> {
    debug!(%url, "GET");
    match agent.get(url).call() {
        Ok(response) => response
            .into_json::<T>()
            .map_err(|source| FetchError::Decode {
                resource: resource.to_owned(),
                source,
            }),
        Err(ureq::Error::Status(404, _)) => Err(FetchError::NotFound(resource.to_owned())),
        Err(ureq::Error::Status(status, _)) => Err(FetchError::Status {
            resource: resource.to_owned(),
            status,
        }),
        Err(ureq::Error::Transport(transport)) => Err(FetchError::Transport {
            resource: resource.to_owned(),
            message: transport.to_string(),
        }),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    const CATEGORY_JSON: &str = r#"{
        "category": {
            "key": "VideoOnDemand",
            "name": "Video on Demand",
            "type": "container",
            "subcategories": [
                {"key": "VODStudio", "name": "Studio"},
                {"key": "VODChildren", "name": "Children"}
            ],
            "media": [
                {
                    "title": "Morning Worship",
                    "type": "video",
                    "primaryCategory": "VODStudio",
                    "firstPublished": "2021-06-25T10:00:00.123Z",
                    "files": [
                        {
                            "progressiveDownloadURL": "https://cdn.example/mw_720p.mp4",
                            "checksum": "abc",
                            "filesize": 1024,
                            "duration": 61.5,
                            "label": "720p",
                            "subtitled": false,
                            "subtitles": {"url": "https://cdn.example/mw.vtt"},
                            "mimetype": "video/mp4"
                        },
                        {
                            "progressiveDownloadURL": "https://cdn.example/mw_240p.mp4",
                            "label": "240p",
                            "subtitles": null
                        }
                    ]
                }
            ]
        }
    }"#;

    fn root(key: &str, kind: &str, tags: &[&str]) -> RootCategory {
        RootCategory {
            key: key.into(),
            category_type: kind.into(),
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
            ..RootCategory::default()
        }
    }

    #[test]
    fn category_response_decodes_fixture() {
        let response: CategoryResponse = serde_json::from_str(CATEGORY_JSON).unwrap();
        let category = &response.category;
        assert_eq!(category.key, "VideoOnDemand");
        assert_eq!(category.subcategories.len(), 2);
        assert_eq!(category.subcategories[1].key, "VODChildren");

        let media = &category.media[0];
        assert_eq!(media.media_type, "video");
        assert_eq!(media.primary_category, "VODStudio");
        assert_eq!(media.files[0].label, "720p");
        assert_eq!(media.files[0].duration, 61.5);
        assert_eq!(media.files[0].subtitle_url(), "https://cdn.example/mw.vtt");
        assert_eq!(media.files[1].subtitle_url(), "");
        assert_eq!(media.files[1].checksum, "");
    }

    #[test]
    fn category_response_tolerates_missing_lists() {
        let response: CategoryResponse =
            serde_json::from_str(r#"{"category": {"key": "Empty"}}"#).unwrap();
        assert!(response.category.subcategories.is_empty());
        assert!(response.category.media.is_empty());
    }

    #[test]
    fn category_response_reads_nulls_as_empty() {
        let json = r#"{
            "category": {
                "key": "VODStudio",
                "name": null,
                "subcategories": null,
                "media": [{
                    "title": "Clip",
                    "type": "video",
                    "primaryCategory": null,
                    "firstPublished": null,
                    "files": [{
                        "progressiveDownloadURL": "https://cdn.example/clip.mp4",
                        "checksum": null,
                        "filesize": null,
                        "duration": null,
                        "label": "720p",
                        "subtitled": null,
                        "subtitles": null,
                        "mimetype": null
                    }]
                }]
            }
        }"#;
        let response: CategoryResponse = serde_json::from_str(json).unwrap();
        let category = &response.category;
        assert_eq!(category.name, "");
        assert!(category.subcategories.is_empty());

        let media = &category.media[0];
        assert_eq!(media.primary_category, "");
        assert_eq!(media.first_published, "");
        let file = &media.files[0];
        assert_eq!(file.progressive_download_url, "https://cdn.example/clip.mp4");
        assert_eq!(file.checksum, "");
        assert_eq!(file.filesize, 0);
        assert_eq!(file.duration, 0.0);
        assert!(!file.subtitled);
        assert_eq!(file.subtitle_url(), "");
    }

    #[test]
    fn root_categories_read_null_tags() {
        let response: RootCategoriesResponse = serde_json::from_str(
            r#"{"categories": [{"key": "Audio", "type": "container", "name": null, "tags": null}]}"#,
        )
        .unwrap();
        assert!(response.categories[0].tags.is_empty());
        assert_eq!(select_root_categories(&response.categories, &[]), vec!["Audio"]);
    }

    #[test]
    fn root_selection_requires_browsable_type() {
        let categories = vec![
            root("VideoOnDemand", "container", &[]),
            root("LatestVideos", "ondemand", &[]),
            root("Streaming", "pseudostreaming", &[]),
        ];
        assert_eq!(
            select_root_categories(&categories, &[]),
            vec!["VideoOnDemand", "LatestVideos"]
        );
    }

    #[test]
    fn root_selection_honours_allow_list_over_exclude_tags() {
        let categories = vec![
            root("Audio", "container", &["WebExclude"]),
            root("Hidden", "container", &["JWORGExclude", "Other"]),
            root("Tagged", "container", &["SomeOtherTag"]),
            root("NotBrowsable", "pseudostreaming", &["WebExclude"]),
        ];
        let allow = vec!["Audio".to_string(), "NotBrowsable".to_string()];
        assert_eq!(
            select_root_categories(&categories, &allow),
            vec!["Audio", "Tagged"]
        );
        assert_eq!(select_root_categories(&categories, &[]), vec!["Tagged"]);
    }

    #[test]
    fn client_fetches_category_over_http() {
        let (base, server) = test_server::serve(vec![(200, CATEGORY_JSON.to_string())]);
        let client = MediatorClient::with_base_url(&base, Duration::from_secs(5));

        let response = client.fetch_category("E", "VideoOnDemand").unwrap();
        assert_eq!(response.category.name, "Video on Demand");

        let requests = server.join().unwrap();
        assert_eq!(
            requests[0],
            "GET /categories/E/VideoOnDemand?detailed=1 HTTP/1.1"
        );
    }

    #[test]
    fn client_maps_http_errors() {
        let (base, server) = test_server::serve(vec![
            (404, "{}".to_string()),
            (500, "{}".to_string()),
            (200, "not json".to_string()),
        ]);
        let client = MediatorClient::with_base_url(&base, Duration::from_secs(5));

        let missing = client.fetch_category("E", "Nope").unwrap_err();
        assert!(missing.is_not_found());
        assert!(matches!(
            client.fetch_category("E", "Broken").unwrap_err(),
            FetchError::Status { status: 500, .. }
        ));
        assert!(matches!(
            client.fetch_category("E", "Garbled").unwrap_err(),
            FetchError::Decode { .. }
        ));
        server.join().unwrap();
    }

    #[test]
    fn client_maps_timeouts_to_transport_errors() {
        let silent = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", silent.local_addr().unwrap());
        let client = MediatorClient::with_base_url(&base, Duration::from_millis(200));

        let err = client.fetch_category("E", "Slow").unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }), "{err:?}");
        assert!(!err.is_not_found());
        drop(silent);
    }

    #[test]
    fn client_maps_refused_connections_to_transport_errors() {
        let base = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            format!("http://{}", listener.local_addr().unwrap())
        };
        let client = MediatorClient::with_base_url(&base, Duration::from_secs(2));
        assert!(matches!(
            client.fetch_category("E", "Gone").unwrap_err(),
            FetchError::Transport { .. }
        ));
    }

    #[test]
    fn client_lists_languages_and_roots() {
        let (base, server) = test_server::serve(vec![
            (
                200,
                r#"{"languages": [{"code": "E", "name": "English"}, {"code": "S", "name": "Spanish"}]}"#
                    .to_string(),
            ),
            (
                200,
                r#"{"categories": [
                    {"key": "VideoOnDemand", "type": "container", "tags": []},
                    {"key": "Audio", "type": "container", "tags": ["WebExclude"]}
                ]}"#
                .to_string(),
            ),
        ]);
        let client = MediatorClient::with_base_url(&base, Duration::from_secs(5));

        let languages = client.languages().unwrap();
        assert_eq!(languages.len(), 2);
        assert_eq!(languages[1].name, "Spanish");

        let roots = client.root_categories("E", &["Audio".to_string()]).unwrap();
        assert_eq!(roots, vec!["VideoOnDemand", "Audio"]);

        let requests = server.join().unwrap();
        assert_eq!(requests[0], "GET /languages/E/web?clientType=www HTTP/1.1");
        assert_eq!(requests[1], "GET /categories/E/?detailed=1 HTTP/1.1");
    }
}
