use std::sync::Arc;

use axum::{
    Json,
    extract::Extension,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::app::dto::IntentRequest;
use crate::app::errors::journal_error_to_response;
use crate::app::services::AppServices;
use crate::context::CallerContext;

/// `processUserIntent` over HTTP.
///
/// Always `200`: success or failure is reported in the body together with
/// the trace.
pub async fn process_intent(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Json(req): Json<IntentRequest>,
) -> Response {
    let ctx = services.request_context();
    let result = services
        .orchestrator
        .process_user_intent(&req.intent, caller.caller_id(), caller.organization_id(), &ctx)
        .await;

    debug!(success = result.success, phases = result.trace.len(), "intent answered");
    Json(result).into_response()
}

pub async fn stats(Extension(services): Extension<Arc<AppServices>>) -> Response {
    match services.journal.stats().await {
        Ok(stats) => Json(stats).into_response(),
        Err(err) => journal_error_to_response(err),
    }
}
