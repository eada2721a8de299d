//! Core types for download-btn

use axum::http::HeaderMap;
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{Error, Result};

/// Identity of a persisted download button
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct ButtonId(pub i64);

impl ButtonId {
    /// Create a new ButtonId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for ButtonId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ButtonId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ButtonId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

// Implement sqlx Type, Encode, and Decode for database operations
impl sqlx::Type<sqlx::Sqlite> for ButtonId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for ButtonId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> std::result::Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for ButtonId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> std::result::Result<Self, sqlx::error::BoxDynError> {
        let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Opaque identifier of a browser session
///
/// CSRF tokens and zip artifacts are scoped to a session. The host application
/// hands the id to the browser as a cookie (see [`SessionId::cookie`]); the
/// endpoints read it back with [`SessionId::from_headers`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    const GENERATED_LEN: usize = 32;

    /// Wrap an existing session id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random session id
    pub fn generate() -> Self {
        let id = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(Self::GENERATED_LEN)
            .map(char::from)
            .collect();
        Self(id)
    }

    /// The raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read the session id from the request's `Cookie` headers
    pub fn from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<Self> {
        headers
            .get_all(axum::http::header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, value)| *name == cookie_name && !value.is_empty())
            .map(|(_, value)| Self(value.to_string()))
    }

    /// `Set-Cookie` value carrying this session id
    pub fn cookie(&self, cookie_name: &str) -> String {
        format!("{}={}; Path=/; HttpOnly; SameSite=Lax", cookie_name, self.0)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cache policy for a button's downloads
///
/// Sent to the client with `download_ready` (as the fetch cache mode) and used
/// for the `Cache-Control` header of served artifacts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum CachePolicy {
    /// Never cache; generated artifacts are released as soon as they are served
    #[default]
    #[serde(rename = "no-store")]
    NoStore,
    /// Let the browser cache keyed on the URL; a completed run may be replayed
    #[serde(rename = "default")]
    Default,
}

impl CachePolicy {
    /// Wire/storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            CachePolicy::NoStore => "no-store",
            CachePolicy::Default => "default",
        }
    }

    /// `Cache-Control` header value for artifacts served under this policy
    pub fn cache_control(&self) -> &'static str {
        match self {
            CachePolicy::NoStore => "no-store",
            CachePolicy::Default => "private, max-age=3600",
        }
    }
}

impl std::str::FromStr for CachePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "no-store" => Ok(CachePolicy::NoStore),
            "default" => Ok(CachePolicy::Default),
            other => Err(Error::Config {
                message: format!("unknown cache policy {:?}", other),
                key: Some("cache".to_string()),
            }),
        }
    }
}

/// Filename used when a download entry is a bare URL
pub const DEFAULT_FILENAME: &str = "download";

/// One resolved download: what the client fetches and the name it saves under
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ManifestItem {
    /// URL to fetch
    pub url: String,
    /// Filename to save as
    pub filename: String,
}

impl ManifestItem {
    /// Create a manifest item
    pub fn new(url: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            filename: filename.into(),
        }
    }
}

/// A download entry as stored on a button
///
/// Entries are kept as JSON so that whatever application code (or a form
/// handler) put in the list survives storage unchanged; they are validated when
/// the manifest is assembled. Valid shapes are a bare URL string, a
/// `[url, filename]` pair, or a `{"url", "filename"}` object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DownloadEntry(serde_json::Value);

impl DownloadEntry {
    /// A bare URL, saved under [`DEFAULT_FILENAME`]
    pub fn url(url: impl Into<String>) -> Self {
        Self(serde_json::Value::String(url.into()))
    }

    /// A (url, filename) pair
    pub fn named(url: impl Into<String>, filename: impl Into<String>) -> Self {
        Self(serde_json::json!([url.into(), filename.into()]))
    }

    /// An unvalidated entry
    pub fn raw(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// The stored JSON
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Resolve into a manifest item; `index` is only used for the error
    pub fn resolve(&self, index: usize) -> Result<ManifestItem> {
        use serde_json::Value;

        let malformed = || Error::MalformedDownloadEntry {
            index,
            value: self.0.clone(),
        };

        match &self.0 {
            Value::String(url) => Ok(ManifestItem::new(url.clone(), DEFAULT_FILENAME)),
            Value::Array(pair) => match pair.as_slice() {
                [Value::String(url), Value::String(filename)] => {
                    Ok(ManifestItem::new(url.clone(), filename.clone()))
                }
                _ => Err(malformed()),
            },
            Value::Object(fields) => match (fields.get("url"), fields.get("filename")) {
                (Some(Value::String(url)), Some(Value::String(filename))) if fields.len() == 2 => {
                    Ok(ManifestItem::new(url.clone(), filename.clone()))
                }
                _ => Err(malformed()),
            },
            _ => Err(malformed()),
        }
    }
}

impl From<ManifestItem> for DownloadEntry {
    fn from(item: ManifestItem) -> Self {
        Self::named(item.url, item.filename)
    }
}

impl From<&str> for DownloadEntry {
    fn from(url: &str) -> Self {
        Self::url(url)
    }
}

impl From<(&str, &str)> for DownloadEntry {
    fn from((url, filename): (&str, &str)) -> Self {
        Self::named(url, filename)
    }
}

/// Resolve persisted entries followed by transient ones into a manifest
///
/// Fails on the first malformed entry; indices count across both lists.
pub fn assemble_manifest<'a>(
    entries: impl IntoIterator<Item = &'a DownloadEntry>,
) -> Result<Vec<ManifestItem>> {
    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| entry.resolve(index))
        .collect()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bare_url_gets_default_filename() {
        let item = DownloadEntry::url("https://host/a.txt").resolve(0).unwrap();
        assert_eq!(item, ManifestItem::new("https://host/a.txt", "download"));
    }

    #[test]
    fn pair_and_object_shapes_resolve() {
        let pair = DownloadEntry::named("https://host/a.txt", "a.txt");
        let object = DownloadEntry::raw(serde_json::json!({
            "url": "https://host/b.txt",
            "filename": "b.txt",
        }));

        let manifest = assemble_manifest([&pair, &object]).unwrap();
        assert_eq!(
            manifest,
            vec![
                ManifestItem::new("https://host/a.txt", "a.txt"),
                ManifestItem::new("https://host/b.txt", "b.txt"),
            ]
        );
    }

    #[test]
    fn integer_entry_is_malformed() {
        let good = DownloadEntry::url("https://host/a.txt");
        let bad = DownloadEntry::raw(serde_json::json!(42));

        let err = assemble_manifest([&good, &bad]).unwrap_err();
        match err {
            Error::MalformedDownloadEntry { index, value } => {
                assert_eq!(index, 1);
                assert_eq!(value, serde_json::json!(42));
            }
            other => panic!("expected MalformedDownloadEntry, got {other:?}"),
        }
    }

    #[test]
    fn triples_and_non_string_pairs_are_malformed() {
        for value in [
            serde_json::json!(["a", "b", "c"]),
            serde_json::json!(["a", 1]),
            serde_json::json!({"url": "a"}),
            serde_json::json!(null),
        ] {
            assert!(DownloadEntry::raw(value).resolve(0).is_err());
        }
    }

    #[test]
    fn entry_json_is_stored_verbatim() {
        let entry = DownloadEntry::named("https://host/a.txt", "a.txt");
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"["https://host/a.txt","a.txt"]"#);
    }

    #[test]
    fn cache_policy_wire_names() {
        assert_eq!(
            serde_json::to_value(CachePolicy::NoStore).unwrap(),
            "no-store"
        );
        assert_eq!(serde_json::to_value(CachePolicy::Default).unwrap(), "default");
        assert_eq!("default".parse::<CachePolicy>().unwrap(), CachePolicy::Default);
        assert!("private".parse::<CachePolicy>().is_err());
    }

    #[test]
    fn session_id_is_read_from_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("theme=dark; download_btn_session=abc123; other=1"),
        );

        let session = SessionId::from_headers(&headers, "download_btn_session").unwrap();
        assert_eq!(session.as_str(), "abc123");
        assert!(SessionId::from_headers(&headers, "missing").is_none());
    }

    #[test]
    fn generated_session_ids_are_distinct() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_eq!(a.as_str().len(), 32);
        assert_ne!(a, b);
    }
}
