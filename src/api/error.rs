//! Conversion of domain errors into HTTP responses.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::auth::AuthError;
use crate::membership::{GateError, MembershipError};
use crate::model::{ErrorBody, FieldError};

/// Message sent for every unexpected failure.
pub const SERVER_ERROR_MESSAGE: &str = "Server error";

/// Internal detail of a server error, carried in response extensions so a
/// development-mode layer can surface it.
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

/// Errors returned by API handlers and middleware.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    Validation(Vec<FieldError>),
    BadRequest(String),
    Unauthenticated(String),
    Forbidden(String),
    NotFound(String),
    Server(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (body, detail) = match self {
            Self::Validation(errors) => (
                ErrorBody {
                    message: "Validation failed".to_string(),
                    errors,
                },
                None,
            ),
            Self::BadRequest(message)
            | Self::Unauthenticated(message)
            | Self::Forbidden(message)
            | Self::NotFound(message) => (
                ErrorBody {
                    message,
                    errors: Vec::new(),
                },
                None,
            ),
            Self::Server(detail) => {
                error!("Request failed: {}", detail);
                (
                    ErrorBody {
                        message: SERVER_ERROR_MESSAGE.to_string(),
                        errors: Vec::new(),
                    },
                    Some(detail),
                )
            }
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(detail) = detail {
            response.extensions_mut().insert(ErrorDetail(detail));
        }
        response
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(errors) => Self::Validation(errors),
            AuthError::Conflict | AuthError::InvalidCredentials => Self::BadRequest(err.to_string()),
            AuthError::MissingToken | AuthError::InvalidToken => Self::Unauthenticated(err.to_string()),
            AuthError::UserNotFound => Self::NotFound(err.to_string()),
            AuthError::DatabaseError(_) | AuthError::Internal(_) => Self::Server(err.to_string()),
        }
    }
}

impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::MembershipRequired | GateError::AdminRequired => Self::Forbidden(err.to_string()),
            GateError::UserNotFound => Self::NotFound(err.to_string()),
            GateError::DatabaseError(_) => Self::Server(err.to_string()),
        }
    }
}

impl From<MembershipError> for ApiError {
    fn from(err: MembershipError) -> Self {
        match err {
            MembershipError::AlreadyActive | MembershipError::InvalidType => Self::BadRequest(err.to_string()),
            MembershipError::NotOwner => Self::Forbidden(err.to_string()),
            MembershipError::NotFound => Self::NotFound(err.to_string()),
            MembershipError::DatabaseError(_) => Self::Server(err.to_string()),
        }
    }
}

/// Bodies that are not JSON, or do not fit the request type, are reported
/// like any other validation failure.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(vec![FieldError::new("body", rejection.body_text())])
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Server(err.to_string())
    }
}
