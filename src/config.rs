//! Designer settings. Every field has a default, so an empty TOML file is valid.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::editor::JoinGraphEditor;
use crate::layout::ArrangeEngine;
use crate::measure::TextMetrics;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSettings {
    /// Vertical gap between cards in one rank.
    pub node_sep: f64,
    /// Horizontal gap between ranks.
    pub rank_sep: f64,
    pub margin: f64,
    /// Barycenter ordering passes.
    pub sweeps: usize,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            node_sep: 40.0,
            rank_sep: 120.0,
            margin: 40.0,
            sweeps: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasSettings {
    pub char_width: f64,
    pub line_height: f64,
    pub min_card_width: f64,
    /// Height of a collapsed card.
    pub compact_card_height: f64,
}

impl Default for CanvasSettings {
    fn default() -> Self {
        let metrics = TextMetrics::default();
        Self {
            char_width: metrics.char_width,
            line_height: metrics.line_height,
            min_card_width: metrics.min_card_width,
            compact_card_height: metrics.collapsed_height,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignerConfig {
    pub history_limit: usize,
    pub model_load_timeout_ms: u64,
    /// Theme used when the dashboard document does not name one.
    pub default_theme: String,
    pub layout: LayoutSettings,
    pub canvas: CanvasSettings,
}

impl Default for DesignerConfig {
    fn default() -> Self {
        Self {
            history_limit: 100,
            model_load_timeout_ms: 15_000,
            default_theme: "light".to_string(),
            layout: LayoutSettings::default(),
            canvas: CanvasSettings::default(),
        }
    }
}

impl DesignerConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: DesignerConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "history_limit",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.model_load_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "model_load_timeout_ms",
                reason: "must be positive".to_string(),
            });
        }
        for (field, value) in [
            ("layout.node_sep", self.layout.node_sep),
            ("layout.rank_sep", self.layout.rank_sep),
            ("layout.margin", self.layout.margin),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("{} is not a non-negative number", value),
                });
            }
        }
        for (field, value) in [
            ("canvas.char_width", self.canvas.char_width),
            ("canvas.line_height", self.canvas.line_height),
            ("canvas.compact_card_height", self.canvas.compact_card_height),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("{} is not a positive number", value),
                });
            }
        }
        Ok(())
    }

    pub fn model_load_timeout(&self) -> Duration {
        Duration::from_millis(self.model_load_timeout_ms)
    }

    pub fn text_metrics(&self) -> TextMetrics {
        TextMetrics {
            char_width: self.canvas.char_width,
            line_height: self.canvas.line_height,
            min_card_width: self.canvas.min_card_width,
            collapsed_height: self.canvas.compact_card_height,
            ..TextMetrics::default()
        }
    }

    pub fn arrange_engine(&self) -> ArrangeEngine {
        ArrangeEngine::new(self.layout.node_sep, self.layout.rank_sep, self.layout.margin)
            .with_sweeps(self.layout.sweeps)
    }

    pub fn editor(&self) -> JoinGraphEditor {
        JoinGraphEditor::new(self.text_metrics(), self.arrange_engine(), self.history_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(DesignerConfig::from_toml_str("").unwrap(), DesignerConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = DesignerConfig::from_toml_str(
            r#"
            history_limit = 20
            default_theme = "dark"

            [layout]
            rank_sep = 200.0

            [canvas]
            compact_card_height = 30.0
            "#,
        )
        .unwrap();
        assert_eq!(config.history_limit, 20);
        assert_eq!(config.layout.rank_sep, 200.0);
        assert_eq!(config.layout.node_sep, 40.0);
        assert_eq!(config.text_metrics().collapsed_height, 30.0);
        assert_eq!(config.model_load_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_rejects_invalid_values() {
        let err = DesignerConfig::from_toml_str("history_limit = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "history_limit", .. }));

        let err = DesignerConfig::from_toml_str("[layout]\nnode_sep = -5.0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "layout.node_sep", .. }));

        let err = DesignerConfig::from_toml_str("history_limit = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = DesignerConfig::load("/nonexistent/misboard.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
