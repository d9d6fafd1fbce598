//! Runtime configuration

use serde::{Deserialize, Serialize};

use crate::error::JsError;

/// Limits and diagnostics knobs applied to a [`crate::Runtime`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum nesting of function calls before a RangeError is raised
    pub max_call_depth: usize,
    /// Native stack a single host entry may consume before a RangeError is raised
    pub max_stack_bytes: usize,
    /// Maximum number of microtasks run by a single drain (`None` = unbounded)
    pub microtask_budget: Option<usize>,
    /// Log promises that are still unhandled after a drain
    pub warn_unhandled_rejections: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 256,
            max_stack_bytes: 1024 * 1024,
            microtask_budget: None,
            warn_unhandled_rejections: true,
        }
    }
}

impl RuntimeConfig {
    /// Load a configuration from JSON; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, JsError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject limits that would make every program fail
    pub fn validate(&self) -> Result<(), JsError> {
        if self.max_call_depth == 0 {
            return Err(JsError::Config("max_call_depth must be at least 1".to_string()));
        }
        if self.max_stack_bytes == 0 {
            return Err(JsError::Config("max_stack_bytes must be at least 1".to_string()));
        }
        if self.microtask_budget == Some(0) {
            return Err(JsError::Config("microtask_budget must be at least 1".to_string()));
        }
        Ok(())
    }
}
