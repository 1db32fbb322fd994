use std::io;

use http::status::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;
use url::ParseError as UrlParseError;

#[cfg(feature = "wasm")]
use serde_wasm_bindgen::Error as WasmError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum FacetError {
    #[error("Session expired, sign in again")]
    AuthExpired,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Custom error: {0}")]
    Custom(String),
    #[error("Malformed filter metadata: {0}")]
    Decode(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
}

impl FacetError {
    /// Classify a non-success transport status.
    ///
    /// A 401 always means the session token is gone; the caller must not try to recover locally.
    pub fn from_status(status: StatusCode, reason: &str) -> FacetError {
        match status {
            StatusCode::UNAUTHORIZED => FacetError::AuthExpired,
            StatusCode::NOT_FOUND => FacetError::NotFound(reason.to_string()),
            _ => FacetError::Network(format!("{status}: {reason}")),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            FacetError::AuthExpired => StatusCode::UNAUTHORIZED,
            FacetError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FacetError::Custom(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FacetError::Decode(_) => StatusCode::BAD_REQUEST,
            FacetError::Network(_) => StatusCode::BAD_GATEWAY,
            FacetError::NotFound(_) => StatusCode::NOT_FOUND,
            FacetError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True when the error must tear down the whole session instead of being shown as a notice.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, FacetError::AuthExpired)
    }
}

impl From<JsonError> for FacetError {
    fn from(src: JsonError) -> FacetError {
        FacetError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<UrlParseError> for FacetError {
    fn from(src: UrlParseError) -> FacetError {
        FacetError::Serialization(format!("Invalid URL: {src}"))
    }
}

impl From<toml::de::Error> for FacetError {
    fn from(src: toml::de::Error) -> FacetError {
        FacetError::Config(format!("Toml deserialization error: {src}"))
    }
}

impl From<io::Error> for FacetError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => FacetError::NotFound(format!("{x}")),
            _ => FacetError::Custom(format!("IOError: {}", x.kind())),
        }
    }
}

#[cfg(feature = "wasm")]
impl From<WasmError> for FacetError {
    fn from(wasm_error: WasmError) -> Self {
        FacetError::Serialization(format!("Serde-wasm-bindgen error: {wasm_error}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_status_classification() {
        assert_eq!(
            FacetError::from_status(StatusCode::UNAUTHORIZED, "Unauthorized"),
            FacetError::AuthExpired
        );
        assert!(matches!(
            FacetError::from_status(StatusCode::NOT_FOUND, "gone"),
            FacetError::NotFound(reason) if reason == "gone"
        ));
        let err = FacetError::from_status(StatusCode::SERVICE_UNAVAILABLE, "down");
        assert!(matches!(err, FacetError::Network(_)));
        assert!(!err.is_session_fatal());
        assert!(FacetError::AuthExpired.is_session_fatal());
        assert_eq!(FacetError::AuthExpired.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_json_error_is_serialization() {
        let err: FacetError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, FacetError::Serialization(_)));
    }
}
