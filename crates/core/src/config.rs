//! Runtime configuration, read once by the binary and passed down.

use crate::ddl::DEFAULT_BATCH_SIZE;
use crate::error::CoreError;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const MAX_BATCH_SIZE: usize = 5000;

#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// Rows per multi-row insert, before the bind-limit bound.
    pub batch_size: usize,
    /// Serialise imports per namespace with an advisory lock.
    pub lock_namespace: bool,
}

impl ImportConfig {
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| CoreError::Validation("DATABASE_URL must be set".into()))?;

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    CoreError::Validation(format!(
                        "DATABASE_MAX_CONNECTIONS must be a positive integer, got '{raw}'"
                    ))
                })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let batch_size = match lookup("IMPORT_BATCH_SIZE") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|_| {
                    CoreError::Validation(format!(
                        "IMPORT_BATCH_SIZE must be an integer, got '{raw}'"
                    ))
                })?
                .clamp(1, MAX_BATCH_SIZE),
            None => DEFAULT_BATCH_SIZE,
        };

        let lock_namespace = match lookup("IMPORT_LOCK_NAMESPACE") {
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(CoreError::Validation(format!(
                        "IMPORT_LOCK_NAMESPACE must be a boolean, got '{raw}'"
                    )))
                }
            },
            None => true,
        };

        Ok(Self {
            database_url,
            max_connections,
            batch_size,
            lock_namespace,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ImportConfig, CoreError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ImportConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/app")]).unwrap();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.batch_size, 500);
        assert!(config.lock_namespace);
    }

    #[test]
    fn database_url_is_required() {
        assert_matches!(load(&[]), Err(CoreError::Validation(_)));
        assert_matches!(load(&[("DATABASE_URL", " ")]), Err(CoreError::Validation(_)));
    }

    #[test]
    fn batch_size_is_clamped() {
        let url = ("DATABASE_URL", "postgres://x");
        assert_eq!(load(&[url, ("IMPORT_BATCH_SIZE", "0")]).unwrap().batch_size, 1);
        assert_eq!(
            load(&[url, ("IMPORT_BATCH_SIZE", "100000")]).unwrap().batch_size,
            MAX_BATCH_SIZE
        );
        assert_eq!(load(&[url, ("IMPORT_BATCH_SIZE", "250")]).unwrap().batch_size, 250);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let url = ("DATABASE_URL", "postgres://x");
        assert_matches!(
            load(&[url, ("IMPORT_BATCH_SIZE", "lots")]),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            load(&[url, ("DATABASE_MAX_CONNECTIONS", "0")]),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            load(&[url, ("IMPORT_LOCK_NAMESPACE", "maybe")]),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn lock_can_be_disabled() {
        let config = load(&[
            ("DATABASE_URL", "postgres://x"),
            ("IMPORT_LOCK_NAMESPACE", "false"),
        ])
        .unwrap();
        assert!(!config.lock_namespace);
    }
}
