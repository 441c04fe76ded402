use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

const DEFAULT_ORIGIN: &str = "http://localhost:3000";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// A filesystem path, or a `sqlite:` / `sqlite://` / `file:` URL.
    pub database_url: String,
    pub cors: CorsConfig,
}

/// Browser origins allowed to call the API.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
    pub max_age_secs: u64,
}

impl ServerConfig {
    /// Reads a TOML file. Missing keys fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| Error::Config(format!("invalid listen address: {e}")))
    }

    /// The database file the URL points at.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        let url = self.database_url.as_str();
        let path = ["sqlite://", "sqlite:", "file:"]
            .iter()
            .find_map(|prefix| url.strip_prefix(prefix))
            .unwrap_or(url);
        let path = path.split_once('?').map_or(path, |(path, _)| path);
        PathBuf::from(path)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            database_url: "./data/folio.db".to_string(),
            cors: CorsConfig::default(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![DEFAULT_ORIGIN.to_string()],
            allow_credentials: true,
            max_age_secs: 3600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.socket_addr().unwrap().port(), 3001);
        assert_eq!(config.database_path(), PathBuf::from("./data/folio.db"));
        assert_eq!(config.cors.allowed_origins, ["http://localhost:3000"]);
    }

    #[test]
    fn test_database_url_prefixes() {
        let cases = [
            ("sqlite:///var/lib/folio.db", "/var/lib/folio.db"),
            ("sqlite://folio.db", "folio.db"),
            ("sqlite:folio.db", "folio.db"),
            ("file:folio.db?mode=rwc", "folio.db"),
            ("/tmp/folio.db", "/tmp/folio.db"),
        ];
        for (url, expected) in cases {
            let config = ServerConfig {
                database_url: url.to_string(),
                ..ServerConfig::default()
            };
            assert_eq!(config.database_path(), PathBuf::from(expected), "{url}");
        }
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ServerConfig::from_toml(
            r#"
            port = 9000

            [cors]
            allowed_origins = ["https://app.example.com"]
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.cors.allowed_origins, ["https://app.example.com"]);
        assert!(config.cors.allow_credentials);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let result = ServerConfig::from_toml("prot = 9000");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("folio.toml");
        fs::write(&path, "host = \"0.0.0.0\"\ndatabase_url = \"sqlite:db.sqlite\"\n").unwrap();

        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.database_path(), PathBuf::from("db.sqlite"));

        let missing = ServerConfig::load(&dir.path().join("absent.toml"));
        assert!(matches!(missing, Err(Error::Config(_))));
    }
}
