//! Startup configuration.
//!
//! Values come from the process environment (optionally seeded from a `.env`
//! file) and are resolved once into an [`AppConfig`] that is handed to the
//! store opener and the receipt extractor.

use crate::error::{FinanceError, FinanceResult};
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_DB_HOST: &str = "localhost";
pub const DEFAULT_DB_PORT: u16 = 5432;
pub const DEFAULT_DB_USER: &str = "postgres";
pub const DEFAULT_DB_NAME: &str = "invoice_data";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub name: String,
    /// Explicit file path, takes precedence over host/name
    pub path_override: Option<PathBuf>,
}

impl DbConfig {
    /// Resolves the SQLite file backing the store.
    ///
    /// `host` is the directory holding the file (`localhost` or empty means the
    /// working directory) and `name` the file stem.
    pub fn database_path(&self) -> PathBuf {
        if let Some(path) = &self.path_override {
            return path.clone();
        }
        let file_name = if Path::new(&self.name).extension().is_some() {
            self.name.clone()
        } else {
            format!("{}.db", self.name)
        };
        match self.host.trim() {
            "" | "localhost" | "127.0.0.1" => PathBuf::from(file_name),
            dir => Path::new(dir).join(file_name),
        }
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("name", &self.name)
            .field("path_override", &self.path_override)
            .finish()
    }
}

#[derive(Clone)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
}

impl AiConfig {
    pub fn is_enabled(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

impl fmt::Debug for AiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db: DbConfig,
    pub ai: AiConfig,
}

impl AppConfig {
    /// Loads `.env` (or the given file) into the environment, then resolves.
    pub fn from_env(env_file: Option<&Path>) -> FinanceResult<Self> {
        match env_file {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| {
                    FinanceError::Config(format!("Failed to load '{}': {}", path.display(), e))
                })?;
            }
            None => {
                if let Err(e) = dotenvy::dotenv() {
                    if !e.not_found() {
                        return Err(FinanceError::Config(format!("Failed to load .env: {}", e)));
                    }
                    log::debug!("No .env file found, using process environment");
                }
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> FinanceResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match get("DB_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| FinanceError::Config(format!("DB_PORT '{}' is not a valid port", raw)))?,
            None => DEFAULT_DB_PORT,
        };

        let db = DbConfig {
            host: get("DB_HOST").unwrap_or_else(|| DEFAULT_DB_HOST.to_string()),
            port,
            user: get("DB_USER").unwrap_or_else(|| DEFAULT_DB_USER.to_string()),
            password: get("DB_PASSWORD"),
            name: get("DB_NAME").unwrap_or_else(|| DEFAULT_DB_NAME.to_string()),
            path_override: None,
        };

        let ai = AiConfig {
            api_key: get("GEMINI_API_KEY"),
            model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            endpoint: get("GEMINI_ENDPOINT").unwrap_or_else(|| DEFAULT_GEMINI_ENDPOINT.to_string()),
        };

        Ok(Self { db, ai })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.db.host, "localhost");
        assert_eq!(config.db.port, 5432);
        assert_eq!(config.db.user, "postgres");
        assert_eq!(config.db.name, "invoice_data");
        assert!(config.db.password.is_none());
        assert_eq!(config.ai.model, DEFAULT_GEMINI_MODEL);
        assert!(!config.ai.is_enabled());
        assert_eq!(config.db.database_path(), PathBuf::from("invoice_data.db"));
    }

    #[test]
    fn test_values_are_read_from_lookup() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("DB_HOST", "/var/lib/finsight"),
            ("DB_USER", "alice"),
            ("DB_PASSWORD", "secret"),
            ("DB_NAME", "ledger.sqlite"),
            ("GEMINI_API_KEY", "key-123"),
        ]))
        .unwrap();

        assert_eq!(config.db.user, "alice");
        assert_eq!(config.db.password.as_deref(), Some("secret"));
        assert!(config.ai.is_enabled());
        assert_eq!(
            config.db.database_path(),
            PathBuf::from("/var/lib/finsight/ledger.sqlite")
        );
    }

    #[test]
    fn test_blank_api_key_disables_ai() {
        let config = AppConfig::from_lookup(lookup_from(&[("GEMINI_API_KEY", "   ")])).unwrap();
        assert!(!config.ai.is_enabled());
    }

    #[test]
    fn test_invalid_port_is_config_error() {
        let result = AppConfig::from_lookup(lookup_from(&[("DB_PORT", "not-a-port")]));
        assert!(matches!(result, Err(FinanceError::Config(_))));
    }

    #[test]
    fn test_path_override_wins() {
        let mut config = AppConfig::from_lookup(|_| None).unwrap();
        config.db.path_override = Some(PathBuf::from("/tmp/other.db"));
        assert_eq!(config.db.database_path(), PathBuf::from("/tmp/other.db"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("DB_PASSWORD", "hunter2"),
            ("GEMINI_API_KEY", "AIza-secret"),
        ]))
        .unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("AIza-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
