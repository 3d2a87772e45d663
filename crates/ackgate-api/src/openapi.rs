//! `OpenAPI` (3.1) specification generation for `ackgate-api`.
//!
//! Served at `GET /openapi.json`.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// `OpenAPI` documentation for the acknowledgement REST API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "ackgate API",
        version = "0.1.0",
        description = "Rule acknowledgement gateway in front of the Aggregator"
    ),
    paths(
        crate::routes::acks::list_acks,
        crate::routes::acks::get_ack,
        crate::routes::acks::acknowledge,
        crate::routes::acks::update_ack,
        crate::routes::acks::delete_ack,
    ),
    components(
        schemas(
            crate::error::ApiErrorBody,
            crate::render::AckResponse,
            crate::render::AckListResponse,
            crate::render::ListMeta,
            crate::render::ListLinks,
            crate::routes::acks::AckCreateRequest,
            crate::routes::acks::AckUpdateRequest,
        )
    ),
    tags(
        (name = "acks", description = "Rule acknowledgement operations"),
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
        components.add_security_scheme(
            "identityHeader",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("x-rh-identity"))),
        );
    }
}

/// Returns the generated `OpenAPI` spec.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Returns the generated `OpenAPI` spec serialized as pretty JSON.
///
/// # Errors
///
/// Returns an error if JSON serialization fails (should not happen).
pub fn openapi_json() -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&openapi())
}
