//! Configuration errors. Every variant aborts a run before any remote call.

/// Configuration loading and resolution error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Site configuration is empty or not a JSON object")]
    Malformed,

    #[error("Invalid configuration for site {site}: {}", errors.join("; "))]
    Invalid { site: String, errors: Vec<String> },

    #[error("Invalid export mode: {0}")]
    InvalidExportMode(String),

    #[error("Failed to build effective configuration: {0}")]
    Deserialize(#[from] serde_json::Error),

    #[error("Effective configuration out of range: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnv(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_display_joins_errors() {
        let err = ConfigError::Invalid {
            site: "RefArch".to_string(),
            errors: vec!["batchSize too large".to_string(), "bad mode".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Invalid configuration for site RefArch: batchSize too large; bad mode"
        );
    }
}
