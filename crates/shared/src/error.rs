//! Client-side error taxonomy.
//!
//! Every failure the client core can produce is one of these variants:
//! local persistence trouble, a server rejection (or an unreachable
//! server), a missing credential, form validation, or a malformed
//! success body. Gateways normalize into this taxonomy and never
//! swallow errors; retry policy lives in the query layer.

use serde::{Deserialize, Serialize};

/// A single failed form field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Device-local key-value storage is unavailable.
    Storage(String),
    /// The server rejected the request, or could not be reached at all
    /// (transport failures normalize to status 500).
    Remote { status: u16, message: String },
    /// A call that requires a bearer token was made with none stored.
    AuthRequired,
    /// Client-side form validation; never reaches the network.
    Validation(Vec<FieldError>),
    /// A success response whose body could not be decoded.
    Deserialize(String),
}

impl ClientError {
    /// The uniform shape for "no response at all" transport failures.
    pub fn unreachable() -> Self {
        ClientError::Remote {
            status: 500,
            message: "service unreachable".to_string(),
        }
    }

    /// Fill in a gateway-level default message when the server supplied
    /// none. Leaves every other variant untouched.
    pub fn or_message(self, default: &str) -> Self {
        match self {
            ClientError::Remote { status, message } if message.is_empty() => {
                ClientError::Remote {
                    status,
                    message: default.to_string(),
                }
            }
            other => other,
        }
    }

    /// True when the server rejected the request's credentials.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Remote { status: 401, .. })
    }
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Storage(msg) => write!(f, "Storage error: {}", msg),
            ClientError::Remote { status, message } => write!(f, "HTTP {}: {}", status, message),
            ClientError::AuthRequired => write!(f, "Authentication required"),
            ClientError::Validation(fields) => {
                write!(f, "Validation failed: ")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{}: {}", field.field, field.message)?;
                }
                Ok(())
            }
            ClientError::Deserialize(msg) => write!(f, "Deserialization error: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {}

/// The backend's error envelope for `/api/*` endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ErrorEnvelope {
    message: String,
}

/// Attempt to parse the server's `{"message": ...}` error body into a
/// user-facing message. Returns `None` for anything else.
pub fn try_error_message(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok()?;
    if parsed.message.trim().is_empty() {
        return None;
    }
    Some(parsed.message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_server_message_envelope() {
        assert_eq!(
            try_error_message(r#"{"message":"Invalid credentials"}"#),
            Some("Invalid credentials".to_string())
        );
        assert_eq!(try_error_message(r#"{"message":"  "}"#), None);
        assert_eq!(try_error_message("not json"), None);
        assert_eq!(try_error_message(r#"{"error":"nope"}"#), None);
    }

    #[test]
    fn or_message_only_fills_empty_remote_messages() {
        let err = ClientError::Remote {
            status: 404,
            message: String::new(),
        };
        assert_eq!(
            err.or_message("failed to fetch listing"),
            ClientError::Remote {
                status: 404,
                message: "failed to fetch listing".to_string()
            }
        );

        let err = ClientError::Remote {
            status: 409,
            message: "email already registered".to_string(),
        };
        assert_eq!(err.clone().or_message("failed to register"), err);

        assert_eq!(
            ClientError::AuthRequired.or_message("ignored"),
            ClientError::AuthRequired
        );
    }

    #[test]
    fn display_is_stable() {
        let err = ClientError::Remote {
            status: 401,
            message: "token expired".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 401: token expired");
        assert!(err.is_unauthorized());
        assert_eq!(ClientError::unreachable().to_string(), "HTTP 500: service unreachable");
    }
}
