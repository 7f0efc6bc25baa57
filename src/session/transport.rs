//! Wire commands, server responses and the transport seam.
//!
//! The service takes one form-encoded POST per command and answers with a
//! JSON object. The crate never opens connections itself; a [`Transport`]
//! turns a [`Command`] into a [`Response`].

use std::future::Future;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::{FIELD_ERROR, FIELD_RESULT, FIELD_SESSION_KEY, FIELD_TOKEN, SESSION_ERROR_MARKER};
use crate::error::{Error, Result};

/// A request to the service.
///
/// Serializes to the flat field set the service expects, `command` first,
/// suitable for `application/x-www-form-urlencoded` encoding.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Register {
        user: String,
    },
    Get {
        token: String,
        #[serde(rename = "sessionKey")]
        session_key: String,
        key: String,
        default: String,
    },
    Set {
        token: String,
        #[serde(rename = "sessionKey")]
        session_key: String,
        key: String,
        value: String,
    },
    ResetSession {
        mail: String,
    },
}

impl Command {
    /// The `command` field value.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::Get { .. } => "get",
            Self::Set { .. } => "set",
            Self::ResetSession { .. } => "reset_session",
        }
    }

    /// The remote key addressed by `get` and `set`.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Get { key, .. } | Self::Set { key, .. } => Some(key),
            Self::Register { .. } | Self::ResetSession { .. } => None,
        }
    }
}

// Credentials stay out of logs.
impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("Command");
        debug.field("command", &self.name());
        if let Some(key) = self.key() {
            debug.field("key", &key);
        }
        debug.finish_non_exhaustive()
    }
}

/// A JSON object returned by the service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    fields: Map<String, Value>,
}

impl Response {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Wraps a decoded body; anything but a JSON object is a transport error.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(Error::Transport(format!("expected a json object, got {other}"))),
        }
    }

    /// Parses a raw response body.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let value = serde_json::from_slice(body).map_err(|e| Error::Transport(format!("invalid json response: {e}")))?;
        Self::from_value(value)
    }

    /// A non-empty string field.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    #[inline]
    pub fn session_key(&self) -> Option<&str> {
        self.str_field(FIELD_SESSION_KEY)
    }

    #[inline]
    pub fn token(&self) -> Option<&str> {
        self.str_field(FIELD_TOKEN)
    }

    #[inline]
    pub fn error(&self) -> Option<&str> {
        self.str_field(FIELD_ERROR)
    }

    /// Outcome reported by `set`, in whatever shape the service chose.
    #[inline]
    pub fn result(&self) -> Option<&Value> {
        self.fields.get(FIELD_RESULT)
    }

    /// The value `get` returned for `key`.
    #[inline]
    pub fn value(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// True if the server error mentions the session, in any case.
    pub fn is_session_error(&self) -> bool {
        self.error().is_some_and(|error| error.to_lowercase().contains(SESSION_ERROR_MARKER))
    }

    #[inline]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

/// Sends a command to the service endpoint and returns its JSON response.
///
/// Network failures and non-object bodies are [`Error::Transport`].
pub trait Transport: Send + Sync + 'static {
    fn send(&self, endpoint: &str, command: &Command) -> impl Future<Output = Result<Response>> + Send;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_command_wire_fields() {
        let get = Command::Get { token: "t".into(), session_key: "k".into(), key: "__page_list__".into(), default: "[]".into() };
        assert_eq!(serde_json::to_value(&get).unwrap(), json!({ "command": "get", "token": "t", "sessionKey": "k", "key": "__page_list__", "default": "[]" }));

        let reset = Command::ResetSession { mail: "alice".into() };
        assert_eq!(serde_json::to_value(&reset).unwrap(), json!({ "command": "reset_session", "mail": "alice" }));
    }

    #[test]
    fn test_command_debug_hides_credentials() {
        let set = Command::Set { token: "secret-token".into(), session_key: "secret-key".into(), key: "page1".into(), value: "body".into() };
        let debug = format!("{set:?}");
        assert!(debug.contains("page1"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_response_accessors() {
        let response = Response::from_value(json!({ "sessionKey": "k2", "result": "ok", "page1": "hello", "token": "" })).unwrap();
        assert_eq!(response.session_key(), Some("k2"));
        assert_eq!(response.token(), None);
        assert_eq!(response.result(), Some(&json!("ok")));
        assert_eq!(response.value("page1"), Some("hello"));
        assert!(!response.is_session_error());
    }

    #[test]
    fn test_session_error_detection() {
        let response = Response::from_value(json!({ "error": "Invalid SESSION key" })).unwrap();
        assert!(response.is_session_error());

        let response = Response::from_value(json!({ "error": "quota exceeded" })).unwrap();
        assert!(!response.is_session_error());
    }

    #[test]
    fn test_response_rejects_non_object() {
        assert!(matches!(Response::from_slice(b"[1]"), Err(Error::Transport(_))));
        assert!(matches!(Response::from_slice(b"<html>"), Err(Error::Transport(_))));
    }
}
