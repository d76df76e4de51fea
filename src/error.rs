use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::views;

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Unknown email or wrong password. The two cases are deliberately
    /// indistinguishable.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Registration with an email that is already taken.
    #[error("User already exists")]
    DuplicateUser,

    /// A resource not found error.
    #[error("Resource not found")]
    NotFound,

    /// The acting user does not own the resource.
    #[error("Forbidden")]
    Forbidden,

    /// Password hashing or hash parsing failed.
    #[error("Hashing error: {0}")]
    Hashing(String),

    /// Storing an uploaded file failed.
    #[error("Upload error: {0}")]
    Upload(String),

    /// A database error.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A Redis error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A multipart error.
    #[error("Multipart error: {0}")]
    Multipart(String),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl From<tokio_postgres::Error> for AppError {
    fn from(e: tokio_postgres::Error) -> Self {
        AppError::Persistence(e.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for AppError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        AppError::Persistence(e.to_string())
    }
}

impl From<deadpool_postgres::CreatePoolError> for AppError {
    fn from(e: deadpool_postgres::CreatePoolError) -> Self {
        AppError::Persistence(e.to_string())
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(e: axum::extract::multipart::MultipartError) -> Self {
        AppError::Multipart(e.body_text())
    }
}

impl From<garde::Report> for AppError {
    fn from(report: garde::Report) -> Self {
        AppError::Validation(report.to_string())
    }
}

impl AppError {
    /// The status code and the user-facing message for this error.
    /// Internal details are logged here and never shown.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::InvalidCredentials => {
                tracing::warn!("Authentication failed");
                (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
            }

            AppError::DuplicateUser => {
                tracing::warn!("Registration with an existing email");
                (StatusCode::CONFLICT, "User already exists".to_string())
            }

            AppError::NotFound => {
                tracing::debug!("Resource not found");
                (StatusCode::NOT_FOUND, "Post not found".to_string())
            }

            AppError::Forbidden => {
                tracing::warn!("Authorization failed");
                (
                    StatusCode::FORBIDDEN,
                    "You don't have permission to modify this post".to_string(),
                )
            }

            AppError::Hashing(msg) => {
                tracing::error!("Hashing error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Error hashing password".to_string())
            }

            AppError::Upload(msg) => {
                tracing::error!("Upload error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Error saving uploaded file".to_string())
            }

            AppError::Persistence(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong, please try again".to_string(),
                )
            }

            AppError::Redis(e) => {
                tracing::error!("Redis error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Session error".to_string())
            }

            AppError::Validation(msg) => {
                tracing::debug!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }

            AppError::Multipart(msg) => {
                tracing::warn!("Multipart error: {}", msg);
                (StatusCode::BAD_REQUEST, "Invalid form submission".to_string())
            }

            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        }
    }

    /// Renders this error as a message page whose navigation matches the
    /// caller's session.
    pub fn into_page(self, authenticated: bool) -> ErrorPage {
        ErrorPage {
            error: self,
            authenticated,
        }
    }
}

/// An error on its way to becoming an HTML message page.
#[derive(Debug)]
pub struct ErrorPage {
    error: AppError,
    authenticated: bool,
}

impl ErrorPage {
    /// The underlying error.
    pub fn error(&self) -> &AppError {
        &self.error
    }
}

impl From<AppError> for ErrorPage {
    fn from(error: AppError) -> Self {
        error.into_page(false)
    }
}

impl IntoResponse for ErrorPage {
    fn into_response(self) -> Response {
        let (status, message) = self.error.status_and_message();
        (status, Html(views::error_page(&message, self.authenticated))).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.into_page(false).into_response()
    }
}

/// Attaches the caller's session state to a failed result so the error
/// page renders the right navigation.
pub trait PageResult<T> {
    fn on_page(self, authenticated: bool) -> std::result::Result<T, ErrorPage>;
}

impl<T, E> PageResult<T> for std::result::Result<T, E>
where
    E: Into<AppError>,
{
    fn on_page(self, authenticated: bool) -> std::result::Result<T, ErrorPage> {
        self.map_err(|e| e.into().into_page(authenticated))
    }
}
