//! Error types for the LFS proxy.
//!
//! Every error is terminal for the request it occurred in. The
//! [`IntoResponse`] impl below is the one place status codes are decided.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::batch::{ErrorBody, LFS_MEDIA_TYPE};

/// Result type for proxy operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while answering a batch request.
#[derive(Error, Debug)]
pub enum Error {
    /// No `Authorization` header was sent
    #[error("authentication required")]
    AuthMissing,

    /// The `Authorization` header is not usable Basic auth
    #[error("malformed authorization header: {0}")]
    AuthMalformed(String),

    /// Batch endpoint called with something other than POST
    #[error("method not allowed")]
    MethodNotAllowed,

    /// Client did not negotiate the LFS media type (strict mode only)
    #[error("expected application/vnd.git-lfs+json in Accept and Content-Type")]
    NotAcceptable,

    /// Request body is larger than the configured limit
    #[error("request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    /// Request body is not a batch request
    #[error("invalid batch request: {0}")]
    InvalidBody(String),

    /// A recognised path option has a value we cannot use
    #[error("invalid option '{key}': {reason}")]
    InvalidOption { key: String, reason: String },

    /// Neither an endpoint option nor the bucket path names a host
    #[error("no object store host in request path")]
    MissingHost,

    /// Only sha256 OIDs are supported
    #[error("Hash algorithm '{0}' is not supported. Only 'sha256' is currently supported.")]
    UnsupportedHashAlgorithm(String),

    /// Operation is neither upload nor download
    #[error("Operation '{0}' is not supported. Only 'upload' and 'download' are supported.")]
    UnsupportedOperation(String),

    /// Signing failed
    #[error("signing error: {0}")]
    Signing(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::AuthMissing => StatusCode::UNAUTHORIZED,
            Error::AuthMalformed(_)
            | Error::InvalidBody(_)
            | Error::InvalidOption { .. }
            | Error::MissingHost => StatusCode::BAD_REQUEST,
            Error::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Error::NotAcceptable => StatusCode::NOT_ACCEPTABLE,
            Error::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Error::UnsupportedHashAlgorithm(_) => StatusCode::CONFLICT,
            Error::UnsupportedOperation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Signing(_) | Error::Io(_) | Error::Json(_) | Error::UrlParse(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether the response carries a JSON `message` body.
    fn has_message(&self) -> bool {
        matches!(
            self,
            Error::NotAcceptable
                | Error::PayloadTooLarge(_)
                | Error::InvalidBody(_)
                | Error::InvalidOption { .. }
                | Error::MissingHost
                | Error::UnsupportedHashAlgorithm(_)
                | Error::UnsupportedOperation(_)
        )
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, "batch request failed");
        } else {
            tracing::debug!(error = %self, %status, "batch request rejected");
        }

        let mut response = if self.has_message() {
            let body = ErrorBody {
                message: self.to_string(),
            };
            match serde_json::to_vec(&body) {
                Ok(json) => (
                    status,
                    [(header::CONTENT_TYPE, HeaderValue::from_static(LFS_MEDIA_TYPE))],
                    json,
                )
                    .into_response(),
                Err(_) => status.into_response(),
            }
        } else {
            status.into_response()
        };

        match self {
            Error::MethodNotAllowed => {
                response
                    .headers_mut()
                    .insert(header::ALLOW, HeaderValue::from_static("POST"));
            }
            Error::AuthMissing => {
                response.headers_mut().insert(
                    "lfs-authenticate",
                    HeaderValue::from_static("Basic realm=\"Git LFS\""),
                );
            }
            _ => {}
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(Error::AuthMissing.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            Error::AuthMalformed("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::MethodNotAllowed.status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            Error::UnsupportedHashAlgorithm("md5".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::UnsupportedOperation("delete".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            Error::Signing("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_method_not_allowed_sets_allow_header() {
        let response = Error::MethodNotAllowed.into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(header::ALLOW).unwrap(), "POST");
    }

    #[test]
    fn test_auth_missing_has_no_body_type() {
        let response = Error::AuthMissing.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::CONTENT_TYPE).is_none());
        assert!(response.headers().get("lfs-authenticate").is_some());
    }

    #[test]
    fn test_hash_algo_message_names_algorithm() {
        let err = Error::UnsupportedHashAlgorithm("sha512".into());
        assert!(err.to_string().contains("'sha512'"));
        let response = err.into_response();
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            LFS_MEDIA_TYPE
        );
    }
}
