use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use std::sync::Arc;

use crate::api::handlers::{error_response, ApiError, AppState};
use crate::store::InstanceStore;

pub const INSTANCE_HEADER: &str = "x-instance-id";

/// Axum extractor resolving the instance a request addresses.
///
/// The instance is named by the `X-Instance-Id` header; requests without it
/// go to the server's default instance. Naming an instance that was never
/// created is rejected with 404 rather than creating it.
pub struct InstanceScope(pub Arc<InstanceStore>);

#[async_trait]
impl FromRequestParts<AppState> for InstanceScope {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let instance_id = extract_header_value(&parts.headers, INSTANCE_HEADER)
            .unwrap_or_else(|| state.default_instance.clone());

        state
            .registry
            .get(&instance_id)
            .map(InstanceScope)
            .map_err(error_response)
    }
}

/// Extract header value as string
fn extract_header_value(headers: &HeaderMap, header_name: &str) -> Option<String> {
    headers
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|s| s.to_string())
}
