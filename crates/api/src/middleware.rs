use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use sovereign_core::{CallerId, OrganizationId};

use crate::context::CallerContext;

pub const CALLER_HEADER: &str = "x-caller-id";
pub const ORGANIZATION_HEADER: &str = "x-organization-id";

/// Attach a [`CallerContext`] built from the identity headers.
///
/// A missing caller is `401`; a malformed organization id is `400`.
pub async fn identity_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let caller = extract_caller(req.headers())?;
    let organization = extract_organization(req.headers())?;

    req.extensions_mut()
        .insert(CallerContext::new(caller, organization));

    Ok(next.run(req).await)
}

fn extract_caller(headers: &HeaderMap) -> Result<CallerId, StatusCode> {
    let header = headers.get(CALLER_HEADER).ok_or(StatusCode::UNAUTHORIZED)?;
    let caller = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?.trim();
    if caller.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(CallerId::new(caller))
}

fn extract_organization(headers: &HeaderMap) -> Result<Option<OrganizationId>, StatusCode> {
    let Some(header) = headers.get(ORGANIZATION_HEADER) else {
        return Ok(None);
    };
    let value = header.to_str().map_err(|_| StatusCode::BAD_REQUEST)?;
    if value.trim().is_empty() {
        return Ok(None);
    }
    value
        .parse::<OrganizationId>()
        .map(Some)
        .map_err(|_| StatusCode::BAD_REQUEST)
}
