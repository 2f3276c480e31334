//! Configuration loading from disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [timeouts]
            request_secs = 5

            [[backends]]
            name = "users"
            address = "127.0.0.1:3000"
            response_headers = ["X-Cache"]
            "#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.timeouts.request_secs, 5);
        assert_eq!(config.backends[0].response_headers, vec!["X-Cache"]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/gateway.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/gateway.toml"));
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn syntax_error_is_parse_error() {
        let err = parse_config("[[backends]\nname = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn semantic_error_is_validation_error() {
        let err = parse_config(
            r#"
            [[backends]]
            name = "users"
            address = "a:1"

            [[backends]]
            name = "users"
            address = "b:1"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("`users` is defined more than once"));
        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 1),
            other => panic!("unexpected error: {other}"),
        }
    }
}
