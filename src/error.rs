use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

pub type RelayResult<T> = Result<T, RelayError>;

/// Relay error taxonomy.
///
/// The categories are deliberately coarse but disjoint, so an operator can
/// tell "the caller sent garbage" from "our keys are broken" from "the broker
/// is down" without reading stack traces. Nothing here is fatal to the
/// process; every failure is scoped to the request being handled.
#[derive(Error, Debug)]
pub enum RelayError {
    // ===== Caller-input Errors =====
    /// Malformed or oversized payload. Rejected before any broker interaction.
    #[error("invalid input: {0}")]
    Input(String),

    // ===== Crypto Errors =====
    /// Encryption or signing failure. Surfaced distinctly from delivery
    /// errors; recoverable per request, never process-fatal.
    #[error("crypto failure: {0}")]
    Crypto(String),

    // ===== Broker Errors =====
    /// Broker unreachable, rejection, or timeout. The only category eligible
    /// for caller-directed retry. `ambiguous` means the acknowledgment timed
    /// out after the record may already have been persisted, so a blind retry
    /// can create a duplicate durable message.
    #[error("delivery failure: {message}")]
    Delivery { message: String, ambiguous: bool },

    // ===== Serialization Errors =====
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ===== Configuration Errors =====
    #[error("configuration error: {0}")]
    Config(String),

    // ===== Internal Errors =====
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::Input(_) => StatusCode::BAD_REQUEST,
            RelayError::Delivery { .. } => StatusCode::BAD_GATEWAY,
            RelayError::Crypto(_)
            | RelayError::Serialization(_)
            | RelayError::Config(_)
            | RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a user-facing error message (without sensitive internals)
    pub fn user_message(&self) -> String {
        match self {
            RelayError::Input(msg) => msg.clone(),
            RelayError::Crypto(_) => "Message encryption failed".to_string(),
            RelayError::Delivery { message, .. } => format!("Message delivery failed: {}", message),
            RelayError::Serialization(_) => "Message serialization failed".to_string(),
            RelayError::Config(msg) => format!("Configuration error: {}", msg),
            RelayError::Internal(_) => "Internal server error".to_string(),
        }
    }

    /// Get error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            RelayError::Input(_) => "INPUT_ERROR",
            RelayError::Crypto(_) => "CRYPTO_ERROR",
            RelayError::Delivery { .. } => "DELIVERY_ERROR",
            RelayError::Serialization(_) => "SERIALIZATION_ERROR",
            RelayError::Config(_) => "CONFIG_ERROR",
            RelayError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether an ambiguous delivery outcome should be flagged to the caller
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, RelayError::Delivery { ambiguous: true, .. })
    }

    /// Log this error with a level appropriate to its class
    pub fn log(&self) {
        let status = self.status_code();
        let code = self.error_code();

        if status.is_server_error() {
            tracing::error!(
                error = %self,
                error_code = %code,
                status = %status.as_u16(),
                "Request failed"
            );
        } else {
            tracing::debug!(
                error = %self,
                error_code = %code,
                "Client error"
            );
        }
    }

    /// Create an input error
    pub fn input(msg: impl Into<String>) -> Self {
        RelayError::Input(msg.into())
    }

    /// Create a crypto error
    pub fn crypto(msg: impl Into<String>) -> Self {
        RelayError::Crypto(msg.into())
    }

    /// Create an unambiguous delivery error
    pub fn delivery(msg: impl Into<String>) -> Self {
        RelayError::Delivery {
            message: msg.into(),
            ambiguous: false,
        }
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        RelayError::Internal(msg.into())
    }
}

impl From<rdkafka::error::KafkaError> for RelayError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        RelayError::Delivery {
            message: err.to_string(),
            ambiguous: false,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> axum::response::Response {
        self.log();

        let status = self.status_code();
        let mut body = json!({
            "error": self.user_message(),
            "error_code": self.error_code(),
            "status": status.as_u16(),
        });

        // Ambiguous delivery outcomes are surfaced so callers know a retry
        // may duplicate the message.
        if let RelayError::Delivery { ambiguous: true, .. } = &self {
            body["ambiguous"] = json!(true);
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_distinguish_error_classes() {
        assert_eq!(
            RelayError::input("too big").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RelayError::crypto("bad key").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            RelayError::delivery("broker down").status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            RelayError::internal("oops").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(RelayError::input("x").error_code(), "INPUT_ERROR");
        assert_eq!(RelayError::crypto("x").error_code(), "CRYPTO_ERROR");
        assert_eq!(RelayError::delivery("x").error_code(), "DELIVERY_ERROR");
    }

    #[test]
    fn ambiguity_is_only_flagged_when_set() {
        let ambiguous = RelayError::Delivery {
            message: "ack timed out".to_string(),
            ambiguous: true,
        };
        assert!(ambiguous.is_ambiguous());
        assert!(!RelayError::delivery("rejected").is_ambiguous());
        assert!(!RelayError::input("empty").is_ambiguous());
    }

    #[tokio::test]
    async fn ambiguous_delivery_responses_carry_the_marker() {
        let response = RelayError::Delivery {
            message: "ack timed out".to_string(),
            ambiguous: true,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["ambiguous"], json!(true));
        assert_eq!(body["error_code"], json!("DELIVERY_ERROR"));

        // Unambiguous failures must not carry the marker at all.
        let response = RelayError::delivery("rejected outright").into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body.get("ambiguous").is_none());
    }

    #[test]
    fn crypto_errors_do_not_leak_details() {
        let err = RelayError::crypto("chacha20poly1305 aead failure at block 3");
        assert!(!err.user_message().contains("chacha20"));
    }
}
