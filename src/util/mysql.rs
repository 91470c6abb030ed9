use std::path::{Path, PathBuf};

use crate::FixError;

/// Database engines the connection layer accepts.
pub const SUPPORTED_ENGINES: &[&str] = &["mysql", "mariadb"];

/// Database connection settings gathered from CLI flags, a defaults file
/// and interactive prompts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub engine: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub socket: Option<String>,
}

impl ConnectionConfig {
    /// Fill every unset field from `fallback`.
    pub fn or(self, fallback: ConnectionConfig) -> ConnectionConfig {
        ConnectionConfig {
            engine: self.engine.or(fallback.engine),
            host: self.host.or(fallback.host),
            port: self.port.or(fallback.port),
            user: self.user.or(fallback.user),
            password: self.password.or(fallback.password),
            database: self.database.or(fallback.database),
            socket: self.socket.or(fallback.socket),
        }
    }

    /// Check that the engine is supported and all required fields are set.
    pub fn validate(&self) -> Result<(), FixError> {
        let engine = self.engine.as_deref().unwrap_or("mysql");
        if !SUPPORTED_ENGINES
            .iter()
            .any(|e| e.eq_ignore_ascii_case(engine))
        {
            return Err(FixError::Config(format!(
                "Unsupported database engine '{}' (supported: {})",
                engine,
                SUPPORTED_ENGINES.join(", ")
            )));
        }
        for (field, value) in [
            ("username", &self.user),
            ("password", &self.password),
            ("database", &self.database),
        ] {
            if value.as_deref().map_or(true, str::is_empty) {
                return Err(FixError::Config(format!("Database {} is required", field)));
            }
        }
        Ok(())
    }

    /// Connection URL without the password, for log output.
    pub fn display_url(&self) -> String {
        format!(
            "{}://{}@{}:{}/{}",
            self.engine.as_deref().unwrap_or("mysql"),
            self.user.as_deref().unwrap_or(""),
            self.host.as_deref().unwrap_or("localhost"),
            self.port.unwrap_or(3306),
            self.database.as_deref().unwrap_or("")
        )
    }
}

/// Parse a MySQL defaults file (`.my.cnf` format) for `[client]` section credentials.
pub fn parse_defaults_file(path: &Path) -> Option<ConnectionConfig> {
    let content = std::fs::read_to_string(path).ok()?;
    Some(parse_defaults(&content))
}

fn parse_defaults(content: &str) -> ConnectionConfig {
    let mut config = ConnectionConfig::default();
    let mut in_client = false;

    for line in content.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_client = line.eq_ignore_ascii_case("[client]");
            continue;
        }
        if !in_client || line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim().to_lowercase().replace('-', "_");
            let value = value.trim().trim_matches('"').trim_matches('\'');
            match key.as_str() {
                "host" => config.host = Some(value.to_string()),
                "port" => config.port = value.parse().ok(),
                "user" => config.user = Some(value.to_string()),
                "password" => config.password = Some(value.to_string()),
                "socket" => config.socket = Some(value.to_string()),
                "database" => config.database = Some(value.to_string()),
                _ => {}
            }
        }
    }

    config
}

/// Find the default .my.cnf file.
pub fn find_defaults_file() -> Option<PathBuf> {
    if let Some(home) = std::env::var_os("HOME") {
        let path = Path::new(&home).join(".my.cnf");
        if path.exists() {
            return Some(path);
        }
    }
    let etc = Path::new("/etc/my.cnf");
    if etc.exists() {
        return Some(etc.to_path_buf());
    }
    None
}
