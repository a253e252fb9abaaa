use actix_web::http::header::{self, HeaderValue};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, HttpResponseBuilder, ResponseError};
use serde::Serialize;
use std::fmt::{Display, Formatter};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum AppErrorType {
    Unauthorized,
    Forbidden,
    Frozen,
    InvalidBody,
    InvalidCourse,
    InvalidTarget,
    NotFound,
    NoAccess,
    NotApproved,
    InvalidCode,
    TooManyAttempts,
    RateLimited,
    DbError,
    NotifyFailed,
    DeliveryFailed,
    SmsNotConfigured,
    InternalServerError,
}

impl AppErrorType {
    /// The stable code clients switch on.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::Frozen => "FROZEN",
            Self::InvalidBody => "INVALID_BODY",
            Self::InvalidCourse => "INVALID_COURSE",
            Self::InvalidTarget => "INVALID_TARGET",
            Self::NotFound => "NOT_FOUND",
            Self::NoAccess => "NO_ACCESS",
            Self::NotApproved => "NOT_APPROVED",
            Self::InvalidCode => "INVALID_CODE",
            Self::TooManyAttempts => "TOO_MANY_ATTEMPTS",
            Self::RateLimited => "RATE_LIMITED",
            Self::DbError => "DB_ERROR",
            Self::NotifyFailed => "NOTIFY_FAILED",
            Self::DeliveryFailed => "DELIVERY_FAILED",
            Self::SmsNotConfigured => "SMS_NOT_CONFIGURED",
            Self::InternalServerError => "INTERNAL_ERROR",
        }
    }
}

/// `message` is sent to the client when present; `cause` is only logged.
#[derive(Debug, PartialEq)]
pub struct AppError {
    pub error_type: AppErrorType,
    pub message: Option<String>,
    pub cause: Option<String>,
}

#[derive(Serialize)]
pub struct AppErrorResponse {
    pub ok: bool,
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AppError {
    pub fn new(error_type: AppErrorType) -> AppError {
        AppError {
            error_type,
            message: None,
            cause: None,
        }
    }

    pub fn with_cause(error_type: AppErrorType, cause: impl ToString) -> AppError {
        AppError {
            error_type,
            message: None,
            cause: Some(cause.to_string()),
        }
    }

    pub fn unauthorized(cause: impl ToString) -> AppError {
        Self::with_cause(AppErrorType::Unauthorized, cause)
    }

    pub fn forbidden() -> AppError {
        Self::new(AppErrorType::Forbidden)
    }

    pub fn frozen() -> AppError {
        Self::new(AppErrorType::Frozen)
    }

    pub fn not_found(cause: impl ToString) -> AppError {
        Self::with_cause(AppErrorType::NotFound, cause)
    }

    pub fn invalid_target(cause: impl ToString) -> AppError {
        Self::with_cause(AppErrorType::InvalidTarget, cause)
    }

    /// Malformed JSON or failed field validation. The validation text is
    /// safe to return and helps form authors.
    pub fn invalid_body(error: impl ToString) -> AppError {
        let text = error.to_string();
        AppError {
            error_type: AppErrorType::InvalidBody,
            message: Some(text.clone()),
            cause: Some(text),
        }
    }

    pub fn db_error(error: impl ToString) -> AppError {
        Self::with_cause(AppErrorType::DbError, error)
    }

    /// Storage failure on an operator-only listing; the raw database text
    /// is returned to the caller.
    pub fn db_error_verbose(error: impl ToString) -> AppError {
        let text = error.to_string();
        AppError {
            error_type: AppErrorType::DbError,
            message: Some(text.clone()),
            cause: Some(text),
        }
    }

    pub fn internal_error(error: impl ToString) -> AppError {
        Self::with_cause(AppErrorType::InternalServerError, error)
    }

    pub fn code(&self) -> &'static str {
        self.error_type.code()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        AppError::db_error(error)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::invalid_body(errors)
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}: {}", self.code(), cause),
            None => write!(f, "{}", self.code()),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self.error_type {
            AppErrorType::Unauthorized => StatusCode::UNAUTHORIZED,
            AppErrorType::Forbidden
            | AppErrorType::Frozen
            | AppErrorType::NoAccess
            | AppErrorType::NotApproved => StatusCode::FORBIDDEN,
            AppErrorType::InvalidBody
            | AppErrorType::InvalidCourse
            | AppErrorType::InvalidTarget
            | AppErrorType::InvalidCode => StatusCode::BAD_REQUEST,
            AppErrorType::NotFound => StatusCode::NOT_FOUND,
            AppErrorType::TooManyAttempts | AppErrorType::RateLimited => {
                StatusCode::TOO_MANY_REQUESTS
            }
            AppErrorType::DbError
            | AppErrorType::NotifyFailed
            | AppErrorType::DeliveryFailed
            | AppErrorType::SmsNotConfigured
            | AppErrorType::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        no_store(HttpResponse::build(self.status_code())).json(AppErrorResponse {
            ok: false,
            error: self.code(),
            message: self.message.clone(),
        })
    }
}

/// Success envelope: `{"ok": true, ...data}`. `data` must serialize as a map.
#[derive(Serialize)]
pub struct AppSuccessResponse<T> {
    pub ok: bool,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> AppSuccessResponse<T> {
    pub fn ok(data: T) -> HttpResponse {
        no_store(HttpResponse::Ok()).json(AppSuccessResponse { ok: true, data })
    }
}

#[derive(Serialize)]
pub struct Empty {}

pub fn ok_empty() -> HttpResponse {
    AppSuccessResponse::ok(Empty {})
}

pub fn no_store(mut builder: HttpResponseBuilder) -> HttpResponseBuilder {
    builder.insert_header((header::CACHE_CONTROL, HeaderValue::from_static("no-store")));
    builder
}
