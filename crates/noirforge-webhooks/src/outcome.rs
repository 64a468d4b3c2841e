//! Request outcomes and their wire representation.
//!
//! Every response the gateway sends is one of these outcomes, rendered as a
//! plain-text token with a fixed HTTP status.

use std::fmt;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

/// Terminal result of handling one webhook request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Wrong method or path.
    NotFound,
    /// Body could not be read or decompressed.
    BadRequest,
    /// Body (raw or decompressed) exceeds the configured limit.
    PayloadTooLarge,
    /// Idempotency key already accepted within its TTL.
    Duplicate,
    /// A required authentication header is absent.
    MissingHeaders,
    /// Timestamp outside the replay window or not a number.
    ReplayRejected,
    /// HMAC signature does not match.
    InvalidSignature,
    /// Bearer authorization does not match.
    Unauthorized,
    /// Provider selected but its secret is not configured.
    ServerMisconfigured,
    /// Accepted and recorded.
    Ok,
    /// Authenticated but could not be persisted.
    InternalError,
}

impl Outcome {
    /// Plain-text token sent as the response body.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
            Self::PayloadTooLarge => "payload_too_large",
            Self::Duplicate => "duplicate",
            Self::MissingHeaders => "missing_headers",
            Self::ReplayRejected => "replay_rejected",
            Self::InvalidSignature => "invalid_signature",
            Self::Unauthorized => "unauthorized",
            Self::ServerMisconfigured => "server_misconfigured",
            Self::Ok => "ok",
            Self::InternalError => "internal_error",
        }
    }

    /// HTTP status for this outcome.
    pub const fn status(self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::BadRequest | Self::MissingHeaders => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Duplicate | Self::Ok => StatusCode::OK,
            Self::ReplayRejected | Self::InvalidSignature | Self::Unauthorized => {
                StatusCode::UNAUTHORIZED
            },
            Self::ServerMisconfigured | Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the delivery counts as accepted by the sender.
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Ok | Self::Duplicate)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        (self.status(), [(header::CONTENT_TYPE, "text/plain")], self.as_str()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_table() {
        let table = [
            (Outcome::NotFound, 404),
            (Outcome::BadRequest, 400),
            (Outcome::PayloadTooLarge, 413),
            (Outcome::Duplicate, 200),
            (Outcome::MissingHeaders, 400),
            (Outcome::ReplayRejected, 401),
            (Outcome::InvalidSignature, 401),
            (Outcome::Unauthorized, 401),
            (Outcome::ServerMisconfigured, 500),
            (Outcome::Ok, 200),
            (Outcome::InternalError, 500),
        ];

        for (outcome, status) in table {
            assert_eq!(outcome.status().as_u16(), status, "{outcome}");
        }
    }

    #[test]
    fn only_ok_and_duplicate_are_success() {
        assert!(Outcome::Ok.is_success());
        assert!(Outcome::Duplicate.is_success());
        assert!(!Outcome::Unauthorized.is_success());
        assert!(!Outcome::InternalError.is_success());
    }

    #[tokio::test]
    async fn response_body_is_token() {
        use http_body_util::BodyExt;

        let response = Outcome::ReplayRejected.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"replay_rejected");
    }
}
