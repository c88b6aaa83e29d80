//! Status-coded errors for the embedded HTTP responder
//!
//! Every request-handling failure is turned into an [`HttpError`] carrying the
//! status the response writer puts on the wire. The status is chosen where the
//! failure is detected, never derived later from the message text.

use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use plainupnp_core::SelectionError;
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use tracing::{debug, error};

/// HTTP status values the responder may emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpStatus {
    Ok,
    NoContent,
    PartialContent,
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    Conflict,
    RangeNotSatisfiable,
    InternalError,
    NotImplemented,
}

impl HttpStatus {
    pub fn code(&self) -> u16 {
        match self {
            HttpStatus::Ok => 200,
            HttpStatus::NoContent => 204,
            HttpStatus::PartialContent => 206,
            HttpStatus::BadRequest => 400,
            HttpStatus::Unauthorized => 401,
            HttpStatus::Forbidden => 403,
            HttpStatus::NotFound => 404,
            HttpStatus::MethodNotAllowed => 405,
            HttpStatus::Conflict => 409,
            HttpStatus::RangeNotSatisfiable => 416,
            HttpStatus::InternalError => 500,
            HttpStatus::NotImplemented => 501,
        }
    }

    /// Reason phrase for the status line
    pub fn reason(&self) -> &'static str {
        match self {
            HttpStatus::Ok => "OK",
            HttpStatus::NoContent => "No Content",
            HttpStatus::PartialContent => "Partial Content",
            HttpStatus::BadRequest => "Bad Request",
            HttpStatus::Unauthorized => "Unauthorized",
            HttpStatus::Forbidden => "Forbidden",
            HttpStatus::NotFound => "Not Found",
            HttpStatus::MethodNotAllowed => "Method Not Allowed",
            HttpStatus::Conflict => "Conflict",
            HttpStatus::RangeNotSatisfiable => "Requested Range Not Satisfiable",
            HttpStatus::InternalError => "Internal Server Error",
            HttpStatus::NotImplemented => "Not Implemented",
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.code())
    }

    pub fn is_server_error(&self) -> bool {
        self.code() >= 500
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            HttpStatus::Ok => StatusCode::OK,
            HttpStatus::NoContent => StatusCode::NO_CONTENT,
            HttpStatus::PartialContent => StatusCode::PARTIAL_CONTENT,
            HttpStatus::BadRequest => StatusCode::BAD_REQUEST,
            HttpStatus::Unauthorized => StatusCode::UNAUTHORIZED,
            HttpStatus::Forbidden => StatusCode::FORBIDDEN,
            HttpStatus::NotFound => StatusCode::NOT_FOUND,
            HttpStatus::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            HttpStatus::Conflict => StatusCode::CONFLICT,
            HttpStatus::RangeNotSatisfiable => StatusCode::RANGE_NOT_SATISFIABLE,
            HttpStatus::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            HttpStatus::NotImplemented => StatusCode::NOT_IMPLEMENTED,
        }
    }
}

impl std::fmt::Display for HttpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}

type Cause = Box<dyn StdError + Send + Sync + 'static>;

/// A request-handling failure with the status it must be answered with.
///
/// The optional cause is kept for diagnostics only. It is logged when the
/// response is written and never becomes part of the response body.
#[derive(Debug)]
pub struct HttpError {
    status: HttpStatus,
    message: String,
    cause: Option<Cause>,
    headers: Vec<(HeaderName, String)>,
}

impl HttpError {
    pub fn new(status: HttpStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            cause: None,
            headers: Vec::new(),
        }
    }

    pub fn with_cause(status: HttpStatus, message: impl Into<String>, cause: impl Into<Cause>) -> Self {
        Self {
            status,
            message: message.into(),
            cause: Some(cause.into()),
            headers: Vec::new(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(HttpStatus::BadRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(HttpStatus::NotFound, message)
    }

    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::new(HttpStatus::MethodNotAllowed, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(HttpStatus::Conflict, message)
    }

    pub fn range_not_satisfiable(message: impl Into<String>) -> Self {
        Self::new(HttpStatus::RangeNotSatisfiable, message)
    }

    pub fn internal(message: impl Into<String>, cause: impl Into<Cause>) -> Self {
        Self::with_cause(HttpStatus::InternalError, message, cause)
    }

    /// Attach a header written alongside the error response
    pub fn with_header(mut self, name: HeaderName, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn headers(&self) -> &[(HeaderName, String)] {
        &self.headers
    }

    pub fn status(&self) -> HttpStatus {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl StdError for HttpError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_deref().map(|cause| cause as &(dyn StdError + 'static))
    }
}

impl From<SelectionError> for HttpError {
    fn from(err: SelectionError) -> Self {
        let status = match err {
            SelectionError::IndexOutOfRange { .. } => HttpStatus::BadRequest,
            SelectionError::NotPresenting => HttpStatus::Conflict,
        };
        Self::new(status, err.to_string())
    }
}

impl From<std::io::Error> for HttpError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::with_cause(HttpStatus::NotFound, "File not found", err),
            std::io::ErrorKind::PermissionDenied => {
                Self::with_cause(HttpStatus::Forbidden, "Access denied", err)
            }
            _ => Self::internal("I/O error while serving request", err),
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        match (&self.cause, self.status.is_server_error()) {
            (Some(cause), true) => error!("{} (cause: {})", self, cause),
            (None, true) => error!("{}", self),
            (Some(cause), false) => debug!("{} (cause: {})", self, cause),
            (None, false) => debug!("{}", self),
        }

        let mut response = (
            self.status.status_code(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.message,
        )
            .into_response();
        for (name, value) in self.headers {
            match HeaderValue::try_from(value) {
                Ok(value) => {
                    response.headers_mut().insert(name, value);
                }
                Err(e) => error!("Dropping invalid {} header on error response: {}", name, e),
            }
        }
        response
    }
}
