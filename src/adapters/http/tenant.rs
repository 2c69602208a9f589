use {
    crate::{adapters::api_errors::error_body, domain::id::TenantId},
    axum::{
        extract::FromRequestParts,
        http::{StatusCode, request::Parts},
        response::Response,
    },
};

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const LEGACY_TENANT_HEADER: &str = "x-tenant";

/// Tenant the request acts for, from `X-Tenant-ID` or the older `X-Tenant`.
#[derive(Debug, Clone)]
pub struct TenantContext(pub TenantId);

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = [TENANT_HEADER, LEGACY_TENANT_HEADER]
            .into_iter()
            .find_map(|name| parts.headers.get(name))
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                error_body(
                    StatusCode::BAD_REQUEST,
                    "tenant_required",
                    "missing X-Tenant-ID header",
                )
            })?;

        TenantId::new(raw)
            .map(Self)
            .map_err(|e| error_body(StatusCode::BAD_REQUEST, "tenant_required", e.to_string()))
    }
}
