//! Engine configuration loading.
//!
//! Configuration is a TOML document deserialized into
//! [`CorrectorConfig`]. Every key is optional:
//!
//! ```toml
//! mode = "advanced"
//! escalation_threshold = 0.28
//!
//! [weights]
//! similarity = 0.25
//! component = 0.60
//! relevance = 0.15
//! ```

use std::path::Path;

use address_match_models::{CorrectorConfig, WeightVector};

/// Errors from loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// Path of the config file.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The document is not valid TOML for a [`CorrectorConfig`].
    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    /// The weights are negative, non-finite, or all zero.
    #[error("Invalid weights: {0:?}")]
    InvalidWeights(WeightVector),
}

/// Parses and validates a TOML configuration document.
///
/// # Errors
///
/// Returns an error if the document does not parse or the weights are
/// invalid.
pub fn parse_config(document: &str) -> Result<CorrectorConfig, ConfigError> {
    let config: CorrectorConfig = toml::from_str(document)?;
    validate(&config)?;
    Ok(config)
}

/// Reads, parses, and validates a TOML configuration file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, does not parse, or has
/// invalid weights.
pub fn load_config(path: &Path) -> Result<CorrectorConfig, ConfigError> {
    let document = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let config = parse_config(&document)?;
    log::info!("Loaded corrector config from {}", path.display());
    Ok(config)
}

/// Checks invariants serde cannot express.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidWeights`] if the weights are invalid.
pub fn validate(config: &CorrectorConfig) -> Result<(), ConfigError> {
    if !config.weights.is_valid() {
        return Err(ConfigError::InvalidWeights(config.weights));
    }
    if (config.weights.sum() - 1.0).abs() > 1e-6 {
        log::warn!(
            "Ranking weights sum to {:.3}, scores will be clamped to [0, 1]",
            config.weights.sum()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use address_match_models::RankingMode;

    #[test]
    fn empty_document_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config, CorrectorConfig::default());
    }

    #[test]
    fn overrides_selected_fields() {
        let config = parse_config(
            r#"
            mode = "basic"
            escalation_threshold = 0.4
            city_scan_limit = 10

            [weights]
            similarity = 0.3
            component = 0.5
            relevance = 0.2
            "#,
        )
        .unwrap();

        assert_eq!(config.mode, RankingMode::Basic);
        assert!((config.escalation_threshold - 0.4).abs() < f64::EPSILON);
        assert_eq!(config.city_scan_limit, 10);
        assert!((config.weights.component - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.early_exit_multiplier, 2);
    }

    #[test]
    fn rejects_invalid_weights() {
        let result = parse_config(
            r"
            [weights]
            similarity = 0.0
            component = 0.0
            relevance = 0.0
            ",
        );
        assert!(matches!(result, Err(ConfigError::InvalidWeights(_))));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(parse_config("mode = "), Err(ConfigError::Toml(_))));
        assert!(matches!(
            parse_config("mode = \"turbo\""),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let missing = std::env::temp_dir().join("address_match_missing_config.toml");
        assert!(matches!(load_config(&missing), Err(ConfigError::Io { .. })));
    }
}
