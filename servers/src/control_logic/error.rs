use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lib_common::engine::EngineError;
use serde_json::json;
use tracing::{error, warn};

/// Errors a control-surface handler can answer with.
#[derive(Debug)]
pub enum ApiError {
    /// The request body is missing a field or is malformed.
    BadRequest(String),
    /// Failure reported by the engine client.
    Engine(EngineError),
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Engine(e)
    }
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "InvalidRequest"),
            ApiError::Engine(e) => match e {
                EngineError::GroupNotFound { .. } => (StatusCode::NOT_FOUND, "GroupNotFound"),
                EngineError::NodeNotInGroup { .. } => (StatusCode::BAD_REQUEST, "NodeNotInGroup"),
                EngineError::Unreachable { .. } => (StatusCode::BAD_GATEWAY, "EngineUnreachable"),
                EngineError::SwitchRejected { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "SwitchRejected"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "EngineError"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        let message = match &self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Engine(e) => e.to_string(),
        };
        if status.is_server_error() {
            error!(kind, %message, "request failed");
        } else {
            warn!(kind, %message, "request rejected");
        }
        (status, Json(json!({ "error": kind, "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(e: EngineError) -> StatusCode {
        ApiError::from(e).into_response().status()
    }

    #[test]
    fn engine_errors_map_to_status_codes() {
        assert_eq!(
            status_of(EngineError::GroupNotFound { group: "Proxy".into() }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(EngineError::NodeNotInGroup {
                node: "x".into(),
                group: "Proxy".into(),
                available: vec![]
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(EngineError::Unreachable {
                base_url: "http://127.0.0.1:9090/".into(),
                reason: "refused".into()
            }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(EngineError::SwitchRejected { status: 400, body: String::new() }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(EngineError::Transport("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn bad_request_is_400() {
        let response = ApiError::BadRequest("missing target".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
