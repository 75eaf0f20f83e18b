//! Tool configuration module.
//!
//! Handles loading, validating, and merging `pixbox.toml`. Stock defaults
//! are the base layer; a user file overrides only the keys it names.
//! Command-line flags override both.
//!
//! ## Config File Location
//!
//! Passed with `--config PATH`, or picked up from `./pixbox.toml` when
//! present. Without either, stock defaults apply.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [compress]
//! quality = 80                      # 0-100
//! format = "jpeg"                   # jpeg, png, webp, avif, bmp, gif, ico, tiff
//! archive_name = "compressed-images"
//!
//! [convert]
//! quality = 92
//! format = "jpeg"
//!
//! [folder]
//! archive_name = "converted-folder"
//! max_total_bytes = 52428800        # 50 MB upload ceiling
//! # format = "webp"                 # re-encode images; omit to package as-is
//!
//! [ai]
//! endpoint = "https://generativelanguage.googleapis.com/v1beta"
//! model = "gemini-2.5-flash-image-preview"
//! timeout_secs = 120
//! api_key_env = ["GEMINI_API_KEY", "GOOGLE_API_KEY"]
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::OutputFormat;
use crate::intake::DEFAULT_MAX_TOTAL_BYTES;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name looked up in the working directory when `--config` is absent.
pub const CONFIG_FILE_NAME: &str = "pixbox.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration for every tool.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    pub compress: CompressConfig,
    pub convert: ConvertConfig,
    pub folder: FolderConfig,
    pub ai: AiConfig,
}

impl ToolConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_quality("compress.quality", self.compress.quality)?;
        check_quality("convert.quality", self.convert.quality)?;
        check_name("compress.archive_name", &self.compress.archive_name)?;
        check_name("folder.archive_name", &self.folder.archive_name)?;
        if self.folder.max_total_bytes == 0 {
            return Err(ConfigError::Validation(
                "folder.max_total_bytes must be greater than zero".into(),
            ));
        }
        if !self.ai.endpoint.starts_with("http://") && !self.ai.endpoint.starts_with("https://") {
            return Err(ConfigError::Validation(
                "ai.endpoint must be an http(s) URL".into(),
            ));
        }
        check_name("ai.model", &self.ai.model)?;
        if self.ai.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "ai.timeout_secs must be greater than zero".into(),
            ));
        }
        if self.ai.api_key_env.iter().all(|v| v.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "ai.api_key_env must name at least one variable".into(),
            ));
        }
        Ok(())
    }
}

fn check_quality(key: &str, quality: u32) -> Result<(), ConfigError> {
    if quality > 100 {
        return Err(ConfigError::Validation(format!("{key} must be 0-100")));
    }
    Ok(())
}

fn check_name(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{key} must not be empty")));
    }
    Ok(())
}

/// Compress tool defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressConfig {
    pub quality: u32,
    pub format: OutputFormat,
    /// Archive name (without `.zip`) for multi-file downloads.
    pub archive_name: String,
}

impl Default for CompressConfig {
    fn default() -> Self {
        Self {
            quality: 80,
            format: OutputFormat::Jpeg,
            archive_name: "compressed-images".to_string(),
        }
    }
}

/// Convert tool defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConvertConfig {
    pub quality: u32,
    pub format: OutputFormat,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            quality: 92,
            format: OutputFormat::Jpeg,
        }
    }
}

/// Folder conversion defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FolderConfig {
    pub archive_name: String,
    /// Aggregate upload ceiling in bytes.
    pub max_total_bytes: u64,
    /// Re-encode images to this format. When absent, files are packaged as-is.
    pub format: Option<OutputFormat>,
}

impl Default for FolderConfig {
    fn default() -> Self {
        Self {
            archive_name: "converted-folder".to_string(),
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
            format: None,
        }
    }
}

/// Generative model connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AiConfig {
    pub endpoint: String,
    pub model: String,
    /// Whole-request timeout.
    pub timeout_secs: u64,
    /// Environment variables tried in order for the API key.
    pub api_key_env: Vec<String>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.5-flash-image-preview".to_string(),
            timeout_secs: 120,
            api_key_env: vec!["GEMINI_API_KEY".to_string(), "GOOGLE_API_KEY".to_string()],
        }
    }
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ToolConfig::default())?)
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

/// Read a config file as a raw TOML value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<ToolConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ToolConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the effective configuration.
///
/// An explicit `path` must exist. Without one, `pixbox.toml` in `cwd` is
/// used when present, otherwise the stock defaults.
pub fn load_config(path: Option<&Path>, cwd: &Path) -> Result<ToolConfig, ConfigError> {
    let overlay = match path {
        Some(path) => Some(load_raw_config(path)?),
        None => {
            let candidate = cwd.join(CONFIG_FILE_NAME);
            if candidate.is_file() {
                Some(load_raw_config(&candidate)?)
            } else {
                None
            }
        }
    };
    resolve_config(overlay)
}

/// Returns a fully-commented stock `pixbox.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# pixbox Configuration
# ====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# pixbox reads ./pixbox.toml, or the file passed with --config.
# Command-line flags override anything set here.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# compress: shrink images, one file or many
# ---------------------------------------------------------------------------
[compress]
# Encoder quality (0 = smallest, 100 = best). Lossless formats ignore it.
quality = 80

# Output format: jpeg, png, webp, avif, bmp, gif, ico, tiff.
format = "jpeg"

# Name of the .zip delivered when several files are compressed together.
archive_name = "compressed-images"

# ---------------------------------------------------------------------------
# convert: change one image's format and size
# ---------------------------------------------------------------------------
[convert]
quality = 92
format = "jpeg"

# ---------------------------------------------------------------------------
# convert-folder: package a whole directory tree
# ---------------------------------------------------------------------------
[folder]
archive_name = "converted-folder"

# Total upload size limit in bytes (50 MB).
max_total_bytes = 52428800

# Re-encode every image to this format. Omit to package files unchanged.
# format = "webp"

# ---------------------------------------------------------------------------
# AI photo tools (remove-bg, passport)
# ---------------------------------------------------------------------------
[ai]
endpoint = "https://generativelanguage.googleapis.com/v1beta"
model = "gemini-2.5-flash-image-preview"

# Seconds before a model request is abandoned.
timeout_secs = 120

# Environment variables checked, in order, for the API key.
api_key_env = ["GEMINI_API_KEY", "GOOGLE_API_KEY"]
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = ToolConfig::default();
        assert_eq!(config.compress.quality, 80);
        assert_eq!(config.compress.format, OutputFormat::Jpeg);
        assert_eq!(config.compress.archive_name, "compressed-images");
        assert_eq!(config.convert.quality, 92);
        assert_eq!(config.folder.archive_name, "converted-folder");
        assert_eq!(config.folder.max_total_bytes, 52_428_800);
        assert_eq!(config.folder.format, None);
        assert_eq!(config.ai.timeout_secs, 120);
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[compress]
format = "webp"
"#;
        let config: ToolConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.compress.format, OutputFormat::Webp);
        // Defaults preserved
        assert_eq!(config.compress.quality, 80);
        assert_eq!(config.convert, ConvertConfig::default());
    }

    #[test]
    fn parse_format_aliases() {
        let toml = r#"
[convert]
format = "jpg"

[folder]
format = "avif"
"#;
        let config: ToolConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.convert.format, OutputFormat::Jpeg);
        assert_eq!(config.folder.format, Some(OutputFormat::Avif));
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str(r#"quality = 90"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"quality = 70"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("quality").unwrap().as_integer(), Some(70));
    }

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[compress]
quality = 80
format = "jpeg"
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[compress]
quality = 60
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let compress = merged.get("compress").unwrap();
        assert_eq!(compress.get("quality").unwrap().as_integer(), Some(60));
        assert_eq!(compress.get("format").unwrap().as_str(), Some("jpeg"));
    }

    #[test]
    fn merge_toml_array_replaced_whole() {
        let base: toml::Value = toml::from_str(r#"keys = ["A", "B"]"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"keys = ["C"]"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("keys").unwrap().as_array().unwrap().len(), 1);
    }

    // =========================================================================
    // Unknown keys
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let result: Result<ToolConfig, _> = toml::from_str(
            r#"
[compress]
qualty = 80
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<ToolConfig, _> = toml::from_str("[resize]\nwidth = 10\n");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_format_rejected() {
        let result: Result<ToolConfig, _> = toml::from_str("[convert]\nformat = \"heic\"\n");
        assert!(result.is_err());
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(ToolConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_quality_bounds() {
        let mut config = ToolConfig::default();
        config.compress.quality = 100;
        assert!(config.validate().is_ok());

        config.compress.quality = 0;
        assert!(config.validate().is_ok());

        config.compress.quality = 101;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("compress.quality"));

        config.compress.quality = 80;
        config.convert.quality = 101;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("convert.quality"));
    }

    #[test]
    fn validate_rejects_empty_names_and_zero_limits() {
        let mut config = ToolConfig::default();
        config.folder.archive_name = " ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let mut config = ToolConfig::default();
        config.folder.max_total_bytes = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let mut config = ToolConfig::default();
        config.ai.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_ai_settings() {
        let mut config = ToolConfig::default();
        config.ai.endpoint = "generativelanguage.googleapis.com".to_string();
        assert!(config.validate().is_err());

        let mut config = ToolConfig::default();
        config.ai.api_key_env = vec![];
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(None, tmp.path()).unwrap();
        assert_eq!(config, ToolConfig::default());
    }

    #[test]
    fn load_config_picks_up_working_directory_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            "[folder]\narchive_name = \"site-assets\"\n",
        )
        .unwrap();

        let config = load_config(None, tmp.path()).unwrap();
        assert_eq!(config.folder.archive_name, "site-assets");
        assert_eq!(config.folder.max_total_bytes, DEFAULT_MAX_TOTAL_BYTES);
    }

    #[test]
    fn load_config_explicit_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("custom.toml");
        fs::write(&path, "[ai]\ntimeout_secs = 30\n").unwrap();

        let config = load_config(Some(&path), tmp.path()).unwrap();
        assert_eq!(config.ai.timeout_secs, 30);
        assert_eq!(config.ai.model, AiConfig::default().model);
    }

    #[test]
    fn load_config_missing_explicit_path_is_error() {
        let tmp = TempDir::new().unwrap();
        let result = load_config(Some(&tmp.path().join("nope.toml")), tmp.path());
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE_NAME), "this is not valid toml [[[").unwrap();
        let result = load_config(None, tmp.path());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE_NAME), "[compress]\nquality = 200\n").unwrap();
        let result = load_config(None, tmp.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn load_config_rejects_unknown_key() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE_NAME), "[folder]\nmax_bytes = 1\n").unwrap();
        assert!(load_config(None, tmp.path()).is_err());
    }

    // =========================================================================
    // Stock config
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: ToolConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, ToolConfig::default());
    }

    #[test]
    fn stock_config_toml_contains_all_sections() {
        let content = stock_config_toml();
        for section in ["[compress]", "[convert]", "[folder]", "[ai]"] {
            assert!(content.contains(section), "missing {section}");
        }
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let value = stock_defaults_value().unwrap();
        let table = value.as_table().unwrap();
        for key in ["compress", "convert", "folder", "ai"] {
            assert!(table.contains_key(key), "missing {key}");
        }
        // Unset optional format is omitted rather than serialized
        assert!(table["folder"].get("format").is_none());
    }
}
