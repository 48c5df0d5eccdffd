//! HTTP error mapping.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use minectl_core::ControlError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Control(#[from] ControlError),

    #[error("report export failed: {0}")]
    Export(#[from] csv::Error),

    /// Request body that is not valid JSON for the route.
    #[error(transparent)]
    Body(#[from] JsonRejection),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Control(e) => {
                StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Self::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Body(rejection) => rejection.status(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Control(ControlError::NotFound(m))
            | Self::Control(ControlError::InvalidInput(m))
            | Self::Control(ControlError::Conflict(m)) => m.clone(),
            Self::Body(rejection) => rejection.body_text(),
            _ => {
                tracing::error!("Request failed: {self}");
                "internal server error".to_string()
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_errors_keep_their_status() {
        let err = AppError::from(ControlError::not_found("person 9 not found"));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        let err = AppError::from(ControlError::invalid("code is required"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn internal_errors_are_500() {
        let err = AppError::from(ControlError::Internal(anyhow::anyhow!("pool closed")));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn body_rejections_keep_their_status() {
        use axum::{body::Body, extract::FromRequest, http::Request};

        let request = Request::new(Body::from(r#"{"code":"MK-001"}"#));
        let rejection = Json::<serde_json::Value>::from_request(request, &())
            .await
            .unwrap_err();
        let err = AppError::from(rejection);
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(
            err.into_response().status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
    }
}
