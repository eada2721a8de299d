//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the download-btn HTTP
//! endpoints using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the download-btn HTTP API
///
/// The spec can be accessed via:
/// - `/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
///
/// Button paths are listed without `server.url_prefix`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "download-btn HTTP API",
        version = "0.1.0",
        description = "Endpoints driving server-rendered download buttons: form handling, streamed file creation, completion and zip artifacts",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:5000", description = "Local development server")
    ),
    paths(
        // Buttons
        crate::api::routes::submit_form,
        crate::api::routes::create_files,
        crate::api::routes::mark_downloaded,
        crate::api::routes::download_artifact,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        crate::types::ButtonId,
        crate::types::CachePolicy,
        crate::types::ManifestItem,
        crate::api::routes::CsrfQuery,
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "buttons", description = "Download buttons - Form handling, file creation events, completion and artifacts"),
        (name = "system", description = "System endpoints - Health checks and OpenAPI spec"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Security addon describing the session cookie and CSRF token
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};

        if let Some(components) = &mut openapi.components {
            components.add_security_scheme(
                "session_cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(
                    crate::config::DEFAULT_SESSION_COOKIE,
                ))),
            );
            components.add_security_scheme(
                "csrf_token",
                SecurityScheme::ApiKey(ApiKey::Query(ApiKeyValue::new("csrf_token"))),
            );
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_has_button_paths() {
        let spec = ApiDoc::openapi();

        for path in [
            "/download-btn/form/{id}/{cls}",
            "/download-btn/create_files/{id}/{cls}",
            "/download-btn/downloaded/{id}/{cls}",
            "/download-btn/artifact/{id}/{cls}",
            "/health",
        ] {
            assert!(
                spec.paths.paths.contains_key(path),
                "OpenAPI spec should document {path}"
            );
        }
    }

    #[test]
    fn test_openapi_spec_has_components() {
        let spec = ApiDoc::openapi();

        let components = spec.components.unwrap();
        assert!(components.schemas.contains_key("ApiError"));
        assert!(components.schemas.contains_key("ManifestItem"));
        assert!(components.schemas.contains_key("CachePolicy"));
    }

    #[test]
    fn test_openapi_spec_has_tags() {
        let spec = ApiDoc::openapi();

        let tags = spec.tags.unwrap();
        let tag_names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tag_names, vec!["buttons", "system"]);
    }

    #[test]
    fn test_openapi_spec_info() {
        let spec = ApiDoc::openapi();

        assert_eq!(spec.info.title, "download-btn HTTP API");
        assert_eq!(spec.info.version, "0.1.0");
        assert!(spec.info.description.is_some());
    }

    #[test]
    fn test_openapi_spec_has_security_schemes() {
        let components = ApiDoc::openapi().components.unwrap();

        assert!(components.security_schemes.contains_key("session_cookie"));
        assert!(components.security_schemes.contains_key("csrf_token"));
    }
}
