//! Error type shared by every handler and its HTTP mapping.

use axum::{
    extract::{
        multipart::MultipartError,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// One entry of the error envelope. The body of every failed request is a list of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: Option<String>,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: Some(message.into()),
        }
    }

    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            message: Some(message.into()),
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("validation failed: {0:?}")]
    Validation(Vec<MessageResponse>),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    IllegalArgument(String),
    #[error("{0}")]
    IllegalState(String),
    #[error("{0}")]
    AccessDenied(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error(transparent)]
    Unclassified(anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::AccessDenied(_) => StatusCode::FORBIDDEN,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_)
            | ApiError::IllegalArgument(_)
            | ApiError::IllegalState(_)
            | ApiError::Unclassified(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn messages(self) -> Vec<MessageResponse> {
        match self {
            ApiError::Validation(errors) => errors,
            ApiError::Unclassified(e) => {
                let text = e.to_string();
                vec![MessageResponse {
                    field: None,
                    message: (!text.is_empty()).then_some(text),
                }]
            }
            other => vec![MessageResponse::new(other.to_string())],
        }
    }

    /// Fails with every collected field error, or passes when there are none.
    pub fn check(errors: Vec<MessageResponse>) -> ApiResult<()> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(errors))
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        if let Some(sqlx::Error::RowNotFound) = e.downcast_ref::<sqlx::Error>() {
            return ApiError::NotFound("Không tìm thấy dữ liệu".into());
        }
        ApiError::Unclassified(e)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        anyhow::Error::from(e).into()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(vec![MessageResponse::new(rejection.body_text())])
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(vec![MessageResponse::new(rejection.body_text())])
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Validation(vec![MessageResponse::new(rejection.body_text())])
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        ApiError::Validation(vec![MessageResponse::new(e.body_text())])
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // runs inside the http_request span, which carries method and uri
        error!(%status, error = ?self, "request failed");
        (status, Json(self.messages())).into_response()
    }
}
