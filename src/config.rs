//! Service configuration.
//!
//! Handles loading, merging, and validating `pictor.toml`. Stock defaults are
//! the base layer; the user file overrides any subset of keys on top.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [storage]
//! root = "."                # Directory holding storage/
//! level = 4                 # Hex digits in the id-derived directory path
//!
//! [limits]
//! min_width = 50
//! min_height = 50
//! max_width = 2560
//! max_height = 2560
//!
//! [http]
//! cache_lifetime = 31536000 # Cache-Control max-age and Expires window, seconds
//! component = "pictor"      # X-Component header value
//!
//! [placeholder]
//! # icon = "error.png"      # Custom broken-image icon (built-in glyph if unset)
//! fallback_size = 600       # Placeholder side when no dimension was requested
//!
//! [server]
//! bind = "127.0.0.1:8080"
//!
//! [logging]
//! level = "info"            # Overridden by RUST_LOG
//! format = "pretty"         # "pretty" or "json"
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [storage]
//! root = "/srv/media"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::http::HeaderPolicy;
use crate::options::DimensionLimits;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Deepest supported id path, in hex digits.
pub const MAX_LEVEL: usize = 16;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Service configuration loaded from `pictor.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Where sources live and where the cache is written.
    pub storage: StorageConfig,
    /// Bounds applied to requested dimensions.
    pub limits: DimensionLimits,
    /// Response header settings.
    pub http: HttpConfig,
    /// Broken-image fallback settings.
    pub placeholder: PlaceholderConfig,
    /// Listener settings for `pictor serve`.
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = &self.limits;
        if limits.min_width == 0
            || limits.min_height == 0
            || limits.max_width == 0
            || limits.max_height == 0
        {
            return Err(ConfigError::Validation(
                "limits must all be greater than 0".into(),
            ));
        }
        if limits.min_width > limits.max_width {
            return Err(ConfigError::Validation(
                "limits.min_width must not exceed limits.max_width".into(),
            ));
        }
        if limits.min_height > limits.max_height {
            return Err(ConfigError::Validation(
                "limits.min_height must not exceed limits.max_height".into(),
            ));
        }
        if self.storage.level > MAX_LEVEL {
            return Err(ConfigError::Validation(format!(
                "storage.level must be at most {MAX_LEVEL}"
            )));
        }
        if self.placeholder.fallback_size == 0 {
            return Err(ConfigError::Validation(
                "placeholder.fallback_size must be greater than 0".into(),
            ));
        }
        if self.http.cache_lifetime == 0 {
            return Err(ConfigError::Validation(
                "http.cache_lifetime must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Storage tree settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory that contains `storage/`.
    pub root: PathBuf,
    /// Hex digits the numeric id is padded to before splitting into
    /// two-character directories.
    pub level: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            level: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    /// Seconds a client may keep a response.
    pub cache_lifetime: u64,
    /// Value of the `X-Component` diagnostic header.
    pub component: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        let policy = HeaderPolicy::default();
        Self {
            cache_lifetime: policy.cache_lifetime,
            component: policy.component,
        }
    }
}

impl HttpConfig {
    pub fn header_policy(&self) -> HeaderPolicy {
        HeaderPolicy {
            cache_lifetime: self.cache_lifetime,
            component: self.component.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaceholderConfig {
    /// Custom broken-image icon. The built-in glyph is used when unset or
    /// undecodable.
    pub icon: Option<PathBuf>,
    /// Placeholder side when the request carried no dimension.
    pub fallback_size: u32,
}

impl Default for PlaceholderConfig {
    fn default() -> Self {
        Self {
            icon: None,
            fallback_size: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Log output style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// The base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ServiceConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<ServiceConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ServiceConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config file at `path`.
///
/// A missing file yields the validated stock defaults.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    if !path.exists() {
        return resolve_config(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    resolve_config(Some(value))
}

/// Returns a fully-commented stock `pictor.toml` with all keys and
/// explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Pictor Configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Storage
# ---------------------------------------------------------------------------
[storage]
# Directory containing storage/. Sources are read from
#   {root}/storage/{module}/{type}/{idpath}/{filename}
# and variants are cached under
#   {root}/storage/0/cache/{module}/{type}/{idpath}/
root = "."

# Hex digits the numeric id is padded to before it is split into
# two-character directories (id 255 at level 4 -> 00/ff).
level = 4

# ---------------------------------------------------------------------------
# Dimension limits
# ---------------------------------------------------------------------------
[limits]
# Requested widths and heights are clamped into [min, max].
# A request with neither dimension gets the minimum box.
min_width = 50
min_height = 50
max_width = 2560
max_height = 2560

# ---------------------------------------------------------------------------
# Response headers
# ---------------------------------------------------------------------------
[http]
# Cache-Control max-age and Expires window, in seconds (one year).
cache_lifetime = 31536000

# Value of the X-Component diagnostic header.
component = "pictor"

# ---------------------------------------------------------------------------
# Placeholder (broken image)
# ---------------------------------------------------------------------------
[placeholder]
# Custom icon composited onto placeholders. When unset or undecodable a
# built-in glyph is drawn instead.
# icon = "error.png"

# Placeholder side in pixels when the request carried no dimension.
fallback_size = 600

# ---------------------------------------------------------------------------
# HTTP server
# ---------------------------------------------------------------------------
[server]
bind = "127.0.0.1:8080"

# ---------------------------------------------------------------------------
# Logging
# ---------------------------------------------------------------------------
[logging]
# Default filter directive. RUST_LOG takes precedence when set.
level = "info"

# "pretty" for humans, "json" for log shippers.
format = "pretty"
"##
}
