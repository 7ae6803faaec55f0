//! Application configuration with sensible defaults.
//!
//! [`AppConfig`] is read from an optional TOML file. Every table and key is
//! optional; anything missing keeps its default. A minimal file:
//!
//! ```toml
//! [provider]
//! model = "gpt-4o-mini"
//!
//! [guard]
//! max_input_chars = 800
//! max_requests_per_session = 30
//!
//! [theme]
//! primaryColor = "#4F46E5"
//! backgroundColor = "#FFFFFF"
//! ```
//!
//! The API key never lives in the file; it comes from
//! [`API_KEY_ENV`](crate::API_KEY_ENV).

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::pricing::ModelPricing;
use crate::guard::GuardConfig;
use crate::{DEFAULT_MODEL, DEFAULT_MODERATION_MODEL, OPENAI_BASE_URL};

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "rehearse.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub sampling: SamplingConfig,
    pub guard: GuardConfig,
    pub pricing: ModelPricing,
    pub theme: Theme,
}

/// Provider endpoint and model selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL of the OpenAI-compatible API. Default: `https://api.openai.com/v1`.
    pub base_url: String,
    /// Model for analysis, guard and interviewer calls. Default: `gpt-4o-mini`.
    pub model: String,
    /// Model for the moderation endpoint. Default: `omni-moderation-latest`.
    pub moderation_model: String,
    /// Retries for transient provider failures. Default: `0`.
    pub max_retries: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: OPENAI_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            moderation_model: DEFAULT_MODERATION_MODEL.to_string(),
            max_retries: 0,
        }
    }
}

/// Sampling temperature for each kind of call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub analysis_temperature: f32,
    pub guard_temperature: f32,
    pub interviewer_temperature: f32,
    pub evaluation_temperature: f32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            analysis_temperature: 0.3,
            guard_temperature: 0.0,
            interviewer_temperature: 0.7,
            evaluation_temperature: 0.2,
        }
    }
}

/// Colors and font applied by the web UI.
///
/// Keys use camelCase so an existing `[theme]` table from a Streamlit
/// `config.toml` can be pasted in as is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Theme {
    /// `"light"` or `"dark"`.
    pub base: String,
    pub primary_color: String,
    pub background_color: String,
    pub secondary_background_color: String,
    pub text_color: String,
    /// `"sans serif"`, `"serif"` or `"monospace"`.
    pub font: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            base: "light".into(),
            primary_color: "#FF4B4B".into(),
            background_color: "#FFFFFF".into(),
            secondary_background_color: "#F0F2F6".into(),
            text_color: "#31333F".into(),
            font: "sans serif".into(),
        }
    }
}

impl Theme {
    /// CSS `font-family` value for the configured font.
    pub fn css_font_family(&self) -> &'static str {
        match self.font.to_lowercase().as_str() {
            "serif" => "Georgia, 'Times New Roman', serif",
            "monospace" => "'SFMono-Regular', Menlo, Consolas, monospace",
            _ => "'Source Sans Pro', 'Helvetica Neue', Arial, sans-serif",
        }
    }
}

impl AppConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, String> {
        let config: Self = toml::from_str(text).map_err(|e| format!("invalid config: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file.
    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        let config = Self::from_toml_str(&text)
            .map_err(|e| format!("{}: {e}", path.display()))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load `path` if given (it must exist), otherwise [`DEFAULT_CONFIG_FILE`]
    /// if present, otherwise defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, String> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.provider.model.trim().is_empty() {
            return Err("provider.model must not be empty".into());
        }
        if self.guard.max_input_chars == 0 {
            return Err("guard.max_input_chars must be at least 1".into());
        }
        if self.pricing.input_per_million < 0.0 || self.pricing.output_per_million < 0.0 {
            return Err("pricing must not be negative".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_reference_values() {
        let config = AppConfig::default();
        assert_eq!(config.provider.model, "gpt-4o-mini");
        assert_eq!(config.provider.moderation_model, "omni-moderation-latest");
        assert_eq!(config.provider.max_retries, 0);
        assert_eq!(config.guard.max_input_chars, 800);
        assert_eq!(config.guard.max_requests_per_session, 30);
        assert!((config.sampling.interviewer_temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.sampling.guard_temperature, 0.0);
        assert!((config.pricing.input_per_million - 0.05).abs() < 1e-12);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = AppConfig::from_toml_str(
            r##"
            [guard]
            max_requests_per_session = 5

            [theme]
            primaryColor = "#123456"
            font = "monospace"
            "##,
        )
        .unwrap();
        assert_eq!(config.guard.max_requests_per_session, 5);
        assert_eq!(config.guard.max_input_chars, 800);
        assert_eq!(config.theme.primary_color, "#123456");
        assert_eq!(config.theme.background_color, "#FFFFFF");
        assert!(config.theme.css_font_family().contains("monospace"));
        assert_eq!(config.provider.model, "gpt-4o-mini");
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(AppConfig::from_toml_str("[guard]\nmax_input_chars = 0").is_err());
        assert!(AppConfig::from_toml_str("[provider]\nmodel = \"\"").is_err());
        assert!(AppConfig::from_toml_str("guard = 3").is_err());
    }

    #[test]
    fn load_reads_file_and_reports_missing() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[provider]\nmodel = \"gpt-4o\"\nmax_retries = 2").unwrap();
        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.provider.model, "gpt-4o");
        assert_eq!(config.provider.max_retries, 2);

        let err = AppConfig::load_or_default(Some(Path::new("/nonexistent/rehearse.toml")))
            .unwrap_err();
        assert!(err.contains("failed to read"));
    }
}
