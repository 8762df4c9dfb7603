use std::error::Error as StdError;
use std::time::Duration;

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header::RETRY_AFTER};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::{AppError, ErrorReport};
use crate::application::repos::RepoError;
use crate::application::users::LoginError;
use crate::auth::{AccessDenied, AuthenticationError};
use crate::domain::error::DomainError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const SESSION_REJECTED: &str = "session_rejected";
    pub const FORBIDDEN: &str = "forbidden";
    pub const NOT_AVAILABLE: &str = "resource_not_available";
    pub const LOCKED_OUT: &str = "locked_out";
    pub const NOT_FOUND: &str = "not_found";
    pub const USER_NOT_FOUND: &str = "user_not_found";
    pub const DUPLICATE: &str = "duplicate";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const REPO: &str = "repo_error";
    pub const INTERNAL: &str = "internal_error";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
    retry_after: Option<Duration>,
    report: Option<ErrorReport>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
            retry_after: None,
            report: None,
        }
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            "Authentication required",
            None,
        )
    }

    pub fn forbidden(hint: Option<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, codes::FORBIDDEN, "Not permitted", hint)
    }

    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    pub fn locked_out(retry_after: Duration) -> Self {
        let secs = retry_after.as_secs().max(1);
        let mut error = Self::new(
            StatusCode::FORBIDDEN,
            codes::LOCKED_OUT,
            "Too many failed login attempts",
            Some(format!("Retry after {secs} seconds")),
        );
        error.retry_after = Some(Duration::from_secs(secs));
        error
    }

    pub fn internal(source: &'static str, error: &dyn StdError) -> Self {
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        let mut api = Self::new(status, codes::INTERNAL, "Internal server error", None);
        api.report = Some(ErrorReport::from_error(source, status, error));
        api
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let report = self.report.unwrap_or_else(|| {
            ErrorReport::from_message(
                "infra::http::api",
                self.status,
                format!(
                    "{}: {}",
                    self.code,
                    self.hint.as_deref().unwrap_or(self.message)
                ),
            )
        });
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        if let Some(retry_after) = self.retry_after
            && let Ok(value) = HeaderValue::from_str(&retry_after.as_secs().to_string())
        {
            response.headers_mut().insert(RETRY_AFTER, value);
        }
        report.attach(&mut response);
        response
    }
}

impl From<AppError> for ApiError {
    fn from(error: AppError) -> Self {
        match error {
            AppError::Domain(DomainError::NotFound { entity }) => ApiError::new(
                StatusCode::NOT_FOUND,
                codes::NOT_FOUND,
                "Resource not found",
                Some(format!("{entity} not found")),
            ),
            AppError::Domain(DomainError::Validation { field, message }) => ApiError::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_INPUT,
                "Invalid input",
                Some(format!("{field}: {message}")),
            ),
            AppError::Domain(DomainError::Conflict { entity }) => ApiError::new(
                StatusCode::CONFLICT,
                codes::DUPLICATE,
                "Resource already exists",
                Some(format!("{entity} already exists")),
            ),
            AppError::Repo(RepoError::NotFound) => ApiError::not_found("Resource not found"),
            AppError::Repo(RepoError::Duplicate { constraint }) => ApiError::new(
                StatusCode::CONFLICT,
                codes::DUPLICATE,
                "Duplicate record",
                Some(constraint),
            ),
            AppError::Forbidden(reason) => ApiError::forbidden(Some(reason.to_string())),
            AppError::Repo(err @ RepoError::Persistence(_)) => {
                let mut api = ApiError::internal("infra::http::repo", &err);
                api.code = codes::REPO;
                api
            }
            other => ApiError::internal("infra::http::app_error", &other),
        }
    }
}

impl From<LoginError> for ApiError {
    fn from(error: LoginError) -> Self {
        match error {
            LoginError::UnknownUser => ApiError::new(
                StatusCode::NOT_FOUND,
                codes::USER_NOT_FOUND,
                "User not found",
                None,
            ),
            LoginError::InvalidCredentials => ApiError::new(
                StatusCode::UNAUTHORIZED,
                codes::UNAUTHORIZED,
                "Invalid credentials",
                None,
            ),
            LoginError::LockedOut { retry_after } => ApiError::locked_out(retry_after),
            LoginError::App(err) => err.into(),
        }
    }
}

impl From<AuthenticationError> for ApiError {
    fn from(error: AuthenticationError) -> Self {
        match error {
            AuthenticationError::Directory(err) => {
                ApiError::internal("infra::http::session", &err)
            }
            other => {
                let mut api = ApiError::new(
                    StatusCode::UNAUTHORIZED,
                    codes::SESSION_REJECTED,
                    "Session is invalid or expired",
                    Some(other.reason().to_string()),
                );
                api.report = Some(ErrorReport::from_error(
                    "infra::http::session",
                    StatusCode::UNAUTHORIZED,
                    &other,
                ));
                api
            }
        }
    }
}

impl From<AccessDenied> for ApiError {
    fn from(denied: AccessDenied) -> Self {
        match denied {
            AccessDenied::Unauthenticated => ApiError::unauthorized(),
            AccessDenied::AlreadyAuthenticated => ApiError::new(
                StatusCode::FORBIDDEN,
                codes::NOT_AVAILABLE,
                "Resource not available",
                Some("sign out first".to_string()),
            ),
            AccessDenied::InsufficientRole(_) => ApiError::forbidden(Some(denied.to_string())),
        }
    }
}
