//! Error types for the runtime

use thiserror::Error;

use crate::value::{JsValue, PropertyAccess, PropertyKey, PropertyLookup};

/// Main error type for the interpreter
///
/// Engine-detected failures carry a kind and a message. Values thrown by script
/// code travel as [`JsError::ThrownValue`] so the original payload survives
/// promise rejection and `catch` rebinding untouched.
#[derive(Debug, Clone, Error)]
pub enum JsError {
    #[error("SyntaxError: {message}")]
    SyntaxError { message: String },

    #[error("TypeError: {message}")]
    TypeError { message: String },

    #[error("ReferenceError: {name} is not defined")]
    ReferenceError { name: String },

    #[error("RangeError: {message}")]
    RangeError { message: String },

    /// A value thrown by script code (or a rejected promise's reason)
    #[error("Uncaught {}", describe_thrown(.value))]
    ThrownValue { value: JsValue },

    #[error("invalid runtime configuration: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl JsError {
    pub fn syntax_error(message: impl Into<String>) -> Self {
        JsError::SyntaxError {
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        JsError::TypeError {
            message: message.into(),
        }
    }

    pub fn reference_error(name: impl Into<String>) -> Self {
        JsError::ReferenceError { name: name.into() }
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        JsError::RangeError {
            message: message.into(),
        }
    }

    /// Create an internal error for unexpected interpreter states
    /// These should never happen in correctly-written code
    pub fn internal_error(message: impl Into<String>) -> Self {
        JsError::Internal(message.into())
    }

    /// Wrap a script-level value as an exception
    pub fn thrown(value: JsValue) -> Self {
        JsError::ThrownValue { value }
    }

    /// Script-visible constructor name for engine errors
    pub fn kind(&self) -> &'static str {
        match self {
            JsError::SyntaxError { .. } => "SyntaxError",
            JsError::TypeError { .. } => "TypeError",
            JsError::ReferenceError { .. } => "ReferenceError",
            JsError::RangeError { .. } => "RangeError",
            JsError::ThrownValue { .. } | JsError::Config(_) | JsError::Internal(_) => "Error",
        }
    }

    /// Message without the kind prefix
    pub fn message(&self) -> String {
        match self {
            JsError::SyntaxError { message }
            | JsError::TypeError { message }
            | JsError::RangeError { message } => message.clone(),
            JsError::ReferenceError { name } => format!("{} is not defined", name),
            JsError::ThrownValue { value } => describe_thrown(value),
            JsError::Config(message) | JsError::Internal(message) => message.clone(),
        }
    }

    /// Whether script `catch` clauses and promise rejection may observe this error.
    /// Configuration and internal failures always reach the host.
    pub fn is_catchable(&self) -> bool {
        !matches!(self, JsError::Config(_) | JsError::Internal(_))
    }

    /// The thrown payload, if this error came from script code
    pub fn thrown_value(&self) -> Option<&JsValue> {
        match self {
            JsError::ThrownValue { value } => Some(value),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for JsError {
    fn from(err: serde_json::Error) -> Self {
        JsError::Config(err.to_string())
    }
}

/// Render a thrown value for host-facing messages.
///
/// Error-like objects render as `name: message`; accessors are not invoked.
fn describe_thrown(value: &JsValue) -> String {
    if let JsValue::Object(_) = value {
        let name = data_property(value, "name");
        let message = data_property(value, "message");
        if let Some(name) = name {
            return match message {
                Some(message) if !message.is_empty() => format!("{}: {}", name, message),
                _ => name,
            };
        }
    }
    value.to_js_string().to_string()
}

fn data_property(value: &JsValue, key: &str) -> Option<String> {
    match value.try_get_property(&PropertyKey::from(key)) {
        Ok(PropertyLookup::Data(JsValue::String(s))) => Some(s.to_string()),
        _ => None,
    }
}
