use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use sovereign_infra::journal::JournalError;

pub fn journal_error_to_response(err: JournalError) -> axum::response::Response {
    match err {
        JournalError::Unavailable(msg) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "journal_unavailable", msg)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
