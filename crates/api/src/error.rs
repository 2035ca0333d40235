use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};
use varnava_core::error::CoreError;
use varnava_resources::ResourceError;
use varnava_worker::WorkerError;

/// Application-level error type for HTTP handlers.
///
/// Renders `{ "error": "<code>", "error-details": {...} }`. The desktop
/// client dispatches on the code.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A required request field was absent.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn not_found(entity: &'static str, id: uuid::Uuid) -> Self {
        Self::Core(CoreError::NotFound { entity, id })
    }

    fn parts(&self) -> (StatusCode, &'static str, Value) {
        match self {
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, .. } => {
                    (StatusCode::NOT_FOUND, "not-found", json!({ "kind": entity }))
                }
                CoreError::Validation(msg) => (
                    StatusCode::BAD_REQUEST,
                    "invalid-settings",
                    json!({ "message": msg }),
                ),
            },

            AppError::MissingField(name) => (
                StatusCode::BAD_REQUEST,
                "missing-field",
                json!({ "name": name }),
            ),

            AppError::Resource(err) => match err {
                ResourceError::AlreadyTracked(path) => (
                    StatusCode::CONFLICT,
                    "already-tracked",
                    json!({ "path": path }),
                ),
                ResourceError::FixedModel(path) => (
                    StatusCode::CONFLICT,
                    "conflict",
                    json!({ "path": path, "message": "built-in models cannot be changed" }),
                ),
                ResourceError::NotTracked(path) => {
                    (StatusCode::NOT_FOUND, "not-found", json!({ "kind": "model", "path": path }))
                }
                ResourceError::InvalidModel { repository, reason } => (
                    StatusCode::BAD_REQUEST,
                    "invalid-model",
                    json!({ "path": repository, "message": reason }),
                ),
                ResourceError::PathNotFound(path) => (
                    StatusCode::BAD_REQUEST,
                    "path-not-found",
                    json!({ "path": path }),
                ),
                ResourceError::PathNotDirectory(path) => (
                    StatusCode::BAD_REQUEST,
                    "path-not-directory",
                    json!({ "path": path }),
                ),
                ResourceError::Hub(hub) if hub.is_transient() => {
                    tracing::warn!(error = %hub, "Model hub unavailable");
                    (
                        StatusCode::BAD_GATEWAY,
                        "hub-unavailable",
                        json!({ "message": hub.to_string() }),
                    )
                }
                other => {
                    tracing::error!(error = %other, "Resource error");
                    internal()
                }
            },

            AppError::Worker(err) => {
                tracing::error!(error = %err, "Generation worker error");
                internal()
            }

            AppError::Database(err) => {
                tracing::error!(error = %err, "Database error");
                internal()
            }

            AppError::Io(err) => {
                tracing::error!(error = %err, "IO error");
                internal()
            }
        }
    }
}

fn internal() -> (StatusCode, &'static str, Value) {
    (StatusCode::INTERNAL_SERVER_ERROR, "internal", json!({}))
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, details) = self.parts();
        let body = json!({
            "error": code,
            "error-details": details,
        });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn missing_field_names_the_field() {
        let (status, code, details) = AppError::MissingField("path").parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "missing-field");
        assert_eq!(details, json!({ "name": "path" }));
    }

    #[test]
    fn not_found_reports_entity_kind() {
        let (status, code, details) = AppError::not_found("prompt", uuid::Uuid::nil()).parts();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "not-found");
        assert_eq!(details["kind"], "prompt");
    }

    #[test]
    fn resource_errors_keep_their_codes() {
        let err = AppError::from(ResourceError::PathNotDirectory(PathBuf::from("/tmp/x")));
        assert_eq!(err.parts().1, "path-not-directory");

        let err = AppError::from(ResourceError::AlreadyTracked("org/model".into()));
        assert_eq!(err.parts().0, StatusCode::CONFLICT);
    }

    #[test]
    fn built_in_model_changes_are_conflicts() {
        let (status, code, details) =
            AppError::from(ResourceError::FixedModel("org/variation".into())).parts();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(code, "conflict");
        assert_eq!(details["path"], "org/variation");
    }
}
