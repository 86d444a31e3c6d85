use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use crate::context::CallerContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(caller): Extension<CallerContext>) -> impl IntoResponse {
    Json(serde_json::json!({
        "callerId": caller.caller_id().as_str(),
        "organizationId": caller.organization_id().map(|o| o.get()),
    }))
}
