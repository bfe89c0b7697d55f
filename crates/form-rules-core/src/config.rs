// crates/form-rules-core/src/config.rs
// ============================================================================
// Module: Engine Configuration
// Description: Configuration loading and validation for the form engine.
// Purpose: Provide strict TOML config parsing with hard limits and defaults.
// Dependencies: serde, thiserror, toml
// ============================================================================

//! ## Overview
//! Every section is optional and falls back to defaults, so an empty file is
//! a valid configuration. Loading enforces path and size limits and rejects
//! non-UTF-8 input before parsing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::compute::DEFAULT_CHANGE_EPSILON;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default maximum condition nesting depth.
pub const DEFAULT_MAX_CONDITION_DEPTH: usize = 32;
/// Upper bound accepted for `schema.max_condition_depth`.
pub(crate) const MAX_CONDITION_DEPTH_LIMIT: usize = 256;
/// Maximum length of a message template.
pub(crate) const MAX_TEMPLATE_LENGTH: usize = 1024;

// ============================================================================
// SECTION: Engine Config
// ============================================================================

/// Engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Compute settings.
    #[serde(default)]
    pub compute: ComputeSettings,
    /// Schema parsing limits.
    #[serde(default)]
    pub schema: SchemaLimits,
    /// Form-wide state flags.
    #[serde(default)]
    pub state: StateDefaults,
    /// Default validation messages.
    #[serde(default)]
    pub messages: MessageTemplates,
}

impl EngineConfig {
    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from disk.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        validate_path(path)?;
        let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.compute.validate()?;
        self.schema.validate()?;
        self.messages.validate()
    }
}

// ============================================================================
// SECTION: Sections
// ============================================================================

/// Compute settings.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComputeSettings {
    /// Numbers closer than this are treated as unchanged.
    #[serde(default = "default_change_epsilon")]
    pub change_epsilon: f64,
}

impl Default for ComputeSettings {
    fn default() -> Self {
        Self {
            change_epsilon: DEFAULT_CHANGE_EPSILON,
        }
    }
}

impl ComputeSettings {
    /// Validates compute settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if !self.change_epsilon.is_finite() || self.change_epsilon < 0.0 {
            return Err(ConfigError::Invalid(
                "compute.change_epsilon must be finite and non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Schema parsing limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaLimits {
    /// Deepest accepted condition tree.
    #[serde(default = "default_max_condition_depth")]
    pub max_condition_depth: usize,
}

impl Default for SchemaLimits {
    fn default() -> Self {
        Self {
            max_condition_depth: DEFAULT_MAX_CONDITION_DEPTH,
        }
    }
}

impl SchemaLimits {
    /// Validates schema limits.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(1 ..= MAX_CONDITION_DEPTH_LIMIT).contains(&self.max_condition_depth) {
            return Err(ConfigError::Invalid(format!(
                "schema.max_condition_depth must be between 1 and {MAX_CONDITION_DEPTH_LIMIT}"
            )));
        }
        Ok(())
    }
}

/// Form-wide state flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateDefaults {
    /// Disable every field.
    #[serde(default)]
    pub global_disabled: bool,
    /// Make fields without their own flag read-only.
    #[serde(default)]
    pub global_readonly: bool,
}

/// Default validation messages.
///
/// `{label}` expands to the field label (or name) and `{value}` to the rule
/// argument.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MessageTemplates {
    /// Missing required value.
    pub required: String,
    /// Text shorter than `minLength`.
    pub min_length: String,
    /// Text longer than `maxLength`.
    pub max_length: String,
    /// Number below `min`.
    pub min: String,
    /// Number above `max`.
    pub max: String,
    /// Text not matching `pattern`.
    pub pattern: String,
    /// Malformed email address.
    pub email: String,
    /// Malformed URL.
    pub url: String,
    /// Non-numeric value in a numeric field.
    pub number: String,
    /// Non-text value in a text field.
    pub text: String,
    /// Custom validator rejected the value.
    pub custom: String,
    /// Custom validator raised an error.
    pub custom_error: String,
    /// Too few list rows or uploads.
    pub min_items: String,
    /// Too many list rows or uploads.
    pub max_items: String,
    /// List value is not an array of rows.
    pub list_type: String,
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self {
            required: "{label} is required".to_string(),
            min_length: "{label} must be at least {value} characters".to_string(),
            max_length: "{label} must be at most {value} characters".to_string(),
            min: "{label} must be at least {value}".to_string(),
            max: "{label} must be at most {value}".to_string(),
            pattern: "{label} has an invalid format".to_string(),
            email: "{label} must be a valid email address".to_string(),
            url: "{label} must be a valid URL".to_string(),
            number: "{label} must be a number".to_string(),
            text: "{label} must be text".to_string(),
            custom: "{label} is invalid".to_string(),
            custom_error: "validation failed".to_string(),
            min_items: "{label} requires at least {value} items".to_string(),
            max_items: "{label} allows at most {value} items".to_string(),
            list_type: "{label} must be a list of rows".to_string(),
        }
    }
}

impl MessageTemplates {
    /// Expands `{label}` and `{value}` in a template.
    #[must_use]
    pub fn render(template: &str, label: &str, value: &str) -> String {
        template.replace("{label}", label).replace("{value}", value)
    }

    /// Validates template lengths.
    fn validate(&self) -> Result<(), ConfigError> {
        let templates = [
            ("required", &self.required),
            ("min_length", &self.min_length),
            ("max_length", &self.max_length),
            ("min", &self.min),
            ("max", &self.max),
            ("pattern", &self.pattern),
            ("email", &self.email),
            ("url", &self.url),
            ("number", &self.number),
            ("text", &self.text),
            ("custom", &self.custom),
            ("custom_error", &self.custom_error),
            ("min_items", &self.min_items),
            ("max_items", &self.max_items),
            ("list_type", &self.list_type),
        ];
        for (name, template) in templates {
            if template.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("messages.{name} must be non-empty")));
            }
            if template.len() > MAX_TEMPLATE_LENGTH {
                return Err(ConfigError::Invalid(format!("messages.{name} exceeds max length")));
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Default for [`ComputeSettings::change_epsilon`].
const fn default_change_epsilon() -> f64 {
    DEFAULT_CHANGE_EPSILON
}

/// Default for [`SchemaLimits::max_condition_depth`].
const fn default_max_condition_depth() -> usize {
    DEFAULT_MAX_CONDITION_DEPTH
}

/// Validates a config path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}
