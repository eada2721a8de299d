//! Configuration types for download-btn

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::button::RenderConfig;
use crate::error::{Error, Result};

/// Default template for the button markup
pub const BUTTON_TEMPLATE: &str = "download_btn/button.html";
/// Default template for the progress bar markup
pub const PROGRESS_TEMPLATE: &str = "download_btn/progress.html";
/// Default template for the client-side driver script
pub const SCRIPT_TEMPLATE: &str = "download_btn/script.html";

/// Shortest CSRF token the gateway will issue
pub const MIN_TOKEN_LENGTH: usize = 64;

/// Default cookie carrying the session id
pub const DEFAULT_SESSION_COOKIE: &str = "download_btn_session";

/// Main configuration for the download button manager
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP surface
    #[serde(default)]
    pub server: ServerConfig,

    /// Record store location
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Manager-level rendering defaults
    #[serde(default)]
    pub render: RenderDefaults,

    /// CSRF token handling
    #[serde(default)]
    pub session: SessionConfig,

    /// Ephemeral zip archives
    #[serde(default)]
    pub artifacts: ArtifactConfig,

    /// File-creation event stream tuning
    #[serde(default)]
    pub stream: StreamConfig,
}

impl Config {
    /// Check settings that serde defaults cannot enforce
    pub fn validate(&self) -> Result<()> {
        if self.session.token_length < MIN_TOKEN_LENGTH {
            return Err(Error::Config {
                message: format!(
                    "CSRF tokens must be at least {} characters, got {}",
                    MIN_TOKEN_LENGTH, self.session.token_length
                ),
                key: Some("session.token_length".to_string()),
            });
        }

        let prefix = &self.server.url_prefix;
        if !prefix.is_empty() && (!prefix.starts_with('/') || prefix.ends_with('/')) {
            return Err(Error::Config {
                message: format!(
                    "url_prefix must be empty or start with '/' and not end with '/', got {prefix:?}"
                ),
                key: Some("server.url_prefix".to_string()),
            });
        }

        if self.stream.min_visible_transition > self.stream.max_transition {
            return Err(Error::Config {
                message: "min_visible_transition must not exceed max_transition".to_string(),
                key: Some("stream.min_visible_transition".to_string()),
            });
        }

        if self.stream.channel_capacity == 0 {
            return Err(Error::Config {
                message: "channel_capacity must be at least 1".to_string(),
                key: Some("stream.channel_capacity".to_string()),
            });
        }

        Ok(())
    }
}

/// HTTP server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:5000)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Path prefix the router is mounted under, used when building endpoint URLs
    /// for the script and for artifact downloads (default: "")
    #[serde(default)]
    pub url_prefix: String,

    /// Enable CORS for browser access (default: false)
    #[serde(default)]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: false)
    #[serde(default)]
    pub swagger_ui: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            url_prefix: String::new(),
            cors_enabled: false,
            cors_origins: default_cors_origins(),
            swagger_ui: false,
        }
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database path (default: "./download-btn.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Manager-level rendering defaults; per-button overrides are merged over these
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RenderDefaults {
    /// Default button rendering
    #[serde(default = "default_button_render")]
    pub button: RenderConfig,

    /// Default progress bar rendering
    #[serde(default = "default_progress_render")]
    pub progress: RenderConfig,

    /// Template for the client-side driver script
    #[serde(default = "default_script_template")]
    pub script_template: String,

    /// Directory of user templates, loaded in addition to the built-in ones
    #[serde(default)]
    pub template_dir: Option<PathBuf>,
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            button: default_button_render(),
            progress: default_progress_render(),
            script_template: default_script_template(),
            template_dir: None,
        }
    }
}

/// CSRF token configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Cookie carrying the session id (default: "download_btn_session")
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Length of issued tokens (default: 90, minimum 64)
    #[serde(default = "default_token_length")]
    pub token_length: usize,

    /// Revoke the token once the client reports the download (default: false)
    #[serde(default)]
    pub revoke_after_download: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            token_length: default_token_length(),
            revoke_after_download: false,
        }
    }
}

/// Ephemeral artifact configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Directory for generated zip archives (default: "./tmp")
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
        }
    }
}

/// Event stream configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Longest transition hinted to the client (default: 500 ms)
    #[serde(default = "default_max_transition", with = "duration_millis_serde")]
    pub max_transition: Duration,

    /// Gaps shorter than this are sent as instantaneous (default: 20 ms)
    #[serde(
        default = "default_min_visible_transition",
        with = "duration_millis_serde"
    )]
    pub min_visible_transition: Duration,

    /// Events buffered between the pipeline task and the response (default: 16)
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_transition: default_max_transition(),
            min_visible_transition: default_min_visible_transition(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

// Default value functions
fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 5000))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./download-btn.db")
}

fn default_button_render() -> RenderConfig {
    RenderConfig {
        classes: vec!["btn".to_string(), "btn-primary".to_string(), "w-100".to_string()],
        style: BTreeMap::new(),
        template: BUTTON_TEMPLATE.to_string(),
        text: "Download".to_string(),
    }
}

fn default_progress_render() -> RenderConfig {
    RenderConfig {
        classes: vec!["progress-bar".to_string()],
        style: BTreeMap::from([("width".to_string(), "0%".to_string())]),
        template: PROGRESS_TEMPLATE.to_string(),
        text: String::new(),
    }
}

fn default_script_template() -> String {
    SCRIPT_TEMPLATE.to_string()
}

fn default_cookie_name() -> String {
    DEFAULT_SESSION_COOKIE.to_string()
}

fn default_token_length() -> usize {
    90
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("./tmp")
}

fn default_max_transition() -> Duration {
    Duration::from_millis(500)
}

fn default_min_visible_transition() -> Duration {
    Duration::from_millis(20)
}

fn default_channel_capacity() -> usize {
    16
}

// Duration serialization helper (integer milliseconds)
mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn empty_json_yields_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();

        assert_eq!(config.session.token_length, 90);
        assert_eq!(config.session.cookie_name, "download_btn_session");
        assert_eq!(config.stream.max_transition, Duration::from_millis(500));
        assert_eq!(config.stream.min_visible_transition, Duration::from_millis(20));
        assert_eq!(config.render.button.template, BUTTON_TEMPLATE);
        assert_eq!(config.render.progress.style["width"], "0%");
    }

    #[test]
    fn stream_durations_serialize_as_millis() {
        let json = serde_json::to_value(StreamConfig::default()).unwrap();
        assert_eq!(json["max_transition"], 500);
        assert_eq!(json["min_visible_transition"], 20);

        let parsed: StreamConfig =
            serde_json::from_str(r#"{"max_transition": 750, "min_visible_transition": 10}"#)
                .unwrap();
        assert_eq!(parsed.max_transition, Duration::from_millis(750));
        assert_eq!(parsed.channel_capacity, 16);
    }

    #[test]
    fn short_tokens_are_rejected() {
        let mut config = Config::default();
        config.session.token_length = 32;

        match config.validate().unwrap_err() {
            Error::Config { key, .. } => assert_eq!(key.as_deref(), Some("session.token_length")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn inverted_transition_bounds_are_rejected() {
        let mut config = Config::default();
        config.stream.min_visible_transition = Duration::from_secs(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn url_prefix_must_be_rooted_without_trailing_slash() {
        for bad in ["app", "/app/"] {
            let mut config = Config::default();
            config.server.url_prefix = bad.to_string();
            assert!(config.validate().is_err(), "{bad:?} should be rejected");
        }

        let mut config = Config::default();
        config.server.url_prefix = "/app".to_string();
        config.validate().unwrap();
    }

    #[test]
    fn config_survives_json_round_trip() {
        let mut original = Config::default();
        original.server.url_prefix = "/app".to_string();
        original.session.revoke_after_download = true;

        let json = serde_json::to_string(&original).unwrap();
        let restored: Config = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.server.url_prefix, "/app");
        assert!(restored.session.revoke_after_download);
        assert_eq!(restored.render.button.classes, original.render.button.classes);
        assert_eq!(restored.persistence.database_path, original.persistence.database_path);
    }
}
