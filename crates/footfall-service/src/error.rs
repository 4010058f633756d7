//! HTTP error responses.

use std::collections::BTreeMap;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Per-field validation messages, rendered as a 422 response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// `Ok` when no errors were collected.
    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }

    /// Headline message: the first error, plus how many others follow.
    pub fn summary(&self) -> String {
        let mut messages = self.0.values().flatten();
        let Some(first) = messages.next() else {
            return "The given data was invalid.".to_string();
        };
        match messages.count() {
            0 => first.clone(),
            1 => format!("{} (and 1 more error)", first),
            n => format!("{} (and {} more errors)", first, n),
        }
    }
}

/// Errors returned by request handlers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{}", .0.summary())]
    Validation(FieldErrors),
    #[error("{0}")]
    Store(footfall_store::Error),
    #[error("{0}")]
    Analytics(footfall_analytics::Error),
}

impl From<footfall_store::Error> for AppError {
    fn from(e: footfall_store::Error) -> Self {
        if e.is_not_found() {
            AppError::NotFound(e.to_string())
        } else {
            AppError::Store(e)
        }
    }
}

impl From<footfall_analytics::Error> for AppError {
    fn from(e: footfall_analytics::Error) -> Self {
        if e.is_client_error() {
            AppError::BadRequest(e.to_string())
        } else {
            AppError::Analytics(e)
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Validation(errors) => {
                let body = serde_json::json!({
                    "message": errors.summary(),
                    "errors": errors,
                });
                return (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response();
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Store(e) => {
                tracing::error!("Store error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            AppError::Analytics(e @ footfall_analytics::Error::StoreUnavailable(_)) => {
                tracing::error!("Analytics unavailable: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
            AppError::Analytics(e) => {
                tracing::error!("Analytics error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_errors_summary() {
        let mut errors = FieldErrors::new();
        assert_eq!(errors.summary(), "The given data was invalid.");

        errors.add("name", "The name field is required.");
        assert_eq!(errors.summary(), "The name field is required.");

        errors.add("status", "The status field is required.");
        errors.add("status", "The selected status is invalid.");
        assert_eq!(
            errors.summary(),
            "The name field is required. (and 2 more errors)"
        );
        assert!(errors.contains("status"));
    }

    #[test]
    fn test_field_errors_serialize_as_map() {
        let mut errors = FieldErrors::new();
        errors.add("count", "The count field must be at least 0.");
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["count"][0], "The count field must be at least 0.");
    }

    #[test]
    fn test_not_found_store_error_maps_to_not_found() {
        let err = footfall_store::Error::NotFound {
            kind: "Sensor",
            id: 9,
        };
        let app: AppError = err.into();
        assert!(matches!(app, AppError::NotFound(ref msg) if msg == "Sensor not found: 9"));
        assert_eq!(app.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_invalid_parameter_maps_to_bad_request() {
        let err = footfall_analytics::SummaryWindow::new(-1, None).unwrap_err();
        let app: AppError = err.into();
        assert_eq!(app.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_empty_field_errors_pass() {
        assert!(FieldErrors::new().into_result().is_ok());
    }
}
