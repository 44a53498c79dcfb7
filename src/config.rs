// src/config.rs - Configuration management
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::fs;
use anyhow::{Context, Result};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub environment: Environment,
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub sessions: SessionConfig,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
    pub frontend: FrontendConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    pub keep_alive: u64,
    pub client_timeout: u64,
    pub client_shutdown: u64,
}

/// External REST backend that owns persistence and auth
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    pub idle_timeout_minutes: u64,
    pub max_sessions: usize,
    pub sweep_interval_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    pub max_request_size: usize,
    pub require_https: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct FrontendConfig {
    /// Directory holding the console's built index.html and assets
    pub build_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            workers: None,
            keep_alive: 30,
            client_timeout: 30,
            client_shutdown: 5,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            timeout_seconds: 15,
            max_attempts: 3,
            retry_backoff_ms: 200,
        }
    }
}

impl BackendConfig {
    /// Versioned API root, e.g. `http://host:5000/api/v1`
    pub fn api_root(&self) -> String {
        format!("{}/api/v1", self.base_url.trim_end_matches('/'))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_minutes: 60,
            max_sessions: 500,
            sweep_interval_seconds: 60,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:8080".to_string(),
                "http://localhost:8080".to_string(),
            ],
            max_request_size: 256 * 1024,
            require_https: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

pub fn load_config() -> Result<Config> {
    load_env_file()?;

    let mut config = match env::var("CONFIG_FILE") {
        Ok(config_file) => Config::from_file(Path::new(&config_file))?,
        Err(_) => Config::default(),
    };

    override_with(&mut config, |key| env::var(key).ok());

    config.validate()
        .context("Configuration validation failed")?;

    Ok(config)
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    match lookup(key) {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("Ignoring {}: cannot parse '{}'", key, raw);
                None
            }
        },
        None => None,
    }
}

/// Applies environment-style overrides; `lookup` returns the raw value of a variable
pub fn override_with(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(environment) = lookup("COLDSTORE_ENV") {
        config.environment = if environment.trim().eq_ignore_ascii_case("production") {
            Environment::Production
        } else {
            Environment::Development
        };
    }
    if let Some(host) = lookup("BIND_ADDRESS") {
        config.server.host = host;
    }
    if let Some(port) = parse_var::<u16>(&lookup, "COLDSTORE_PORT") {
        config.server.port = port;
    }
    if let Some(workers) = parse_var::<usize>(&lookup, "COLDSTORE_WORKERS") {
        config.server.workers = Some(workers);
    }
    if let Some(url) = lookup("BACKEND_API_URL") {
        config.backend.base_url = url;
    }
    if let Some(timeout) = parse_var::<u64>(&lookup, "BACKEND_TIMEOUT_SECONDS") {
        config.backend.timeout_seconds = timeout;
    }
    if let Some(minutes) = parse_var::<u64>(&lookup, "SESSION_IDLE_TIMEOUT_MINUTES") {
        config.sessions.idle_timeout_minutes = minutes;
    }
    if let Some(origins) = lookup("ALLOWED_ORIGINS") {
        config.security.allowed_origins = origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Some(level) = lookup("RUST_LOG") {
        config.logging.level = level;
    }
    if let Some(dir) = lookup("FRONTEND_BUILD_DIR") {
        let dir = dir.trim();
        config.frontend.build_dir = (!dir.is_empty()).then(|| PathBuf::from(dir));
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        let base_url = self.backend.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(anyhow::anyhow!(
                "backend.base_url must start with http:// or https:// (got '{}')",
                self.backend.base_url
            ));
        }

        if self.backend.max_attempts == 0 {
            return Err(anyhow::anyhow!("backend.max_attempts must be at least 1"));
        }

        if self.backend.timeout_seconds == 0 {
            return Err(anyhow::anyhow!("backend.timeout_seconds must be at least 1"));
        }

        if self.sessions.idle_timeout_minutes == 0 || self.sessions.max_sessions == 0 {
            return Err(anyhow::anyhow!(
                "sessions.idle_timeout_minutes and sessions.max_sessions must be positive"
            ));
        }

        if self.is_production() {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(anyhow::anyhow!("Wildcard CORS origin is not allowed in production"));
            }
            if self.security.allowed_origins.is_empty() {
                return Err(anyhow::anyhow!("ALLOWED_ORIGINS must be set in production"));
            }
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn print_startup_info(&self) {
        log::info!("❄️  Cold storage console starting up...");
        log::info!("🌐 Server: {}:{}", self.server.host, self.server.port);
        log::info!("🔗 Backend: {}", self.backend.api_root());
        log::info!(
            "🗂️  Sessions: idle timeout {} min, max {}",
            self.sessions.idle_timeout_minutes,
            self.sessions.max_sessions
        );
        log::info!("📊 Logging: {} level", self.logging.level);
        match &self.frontend.build_dir {
            Some(dir) => log::info!("🖥️  Frontend: {}", dir.display()),
            None => log::info!("🖥️  Frontend: not served (API only)"),
        }

        if !self.is_production() {
            log::warn!("🚧 Running in development mode");
        }

        if self.security.require_https {
            log::info!("🔒 HTTPS enforcement enabled");
        } else if self.is_production() {
            log::warn!("⚠️  HTTPS not required in production mode");
        }
    }
}

pub fn load_env_file() -> Result<()> {
    if let Ok(env_file) = env::var("ENV_FILE") {
        dotenvy::from_filename(&env_file)
            .with_context(|| format!("Failed to load environment file: {}", env_file))?;
    } else if Path::new(".env").exists() {
        dotenvy::dotenv().context("Failed to load .env file")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.backend.api_root(), "http://localhost:5000/api/v1");
        assert!(!config.is_production());
        assert!(config.frontend.build_dir.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.backend.base_url = "localhost:5000".to_string();
        assert!(config.validate().is_err());

        config.backend.base_url = "https://api.example.com/".to_string();
        assert!(config.validate().is_ok());
        assert_eq!(config.backend.api_root(), "https://api.example.com/api/v1");

        config.backend.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_loading() -> Result<()> {
        let toml_content = r#"
        environment = "production"

        [server]
        host = "0.0.0.0"
        port = 9000

        [backend]
        base_url = "https://backend.internal"

        [security]
        allowed_origins = ["https://console.example.com"]
        "#;

        let mut temp_file = NamedTempFile::new()?;
        temp_file.write_all(toml_content.as_bytes())?;
        temp_file.flush()?;

        let config = Config::from_file(temp_file.path())?;
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.keep_alive, 30);
        assert_eq!(config.backend.base_url, "https://backend.internal");
        assert_eq!(config.backend.max_attempts, 3);
        assert!(config.is_production());
        assert!(config.validate().is_ok());

        Ok(())
    }

    #[test]
    fn test_env_override() {
        let mut config = Config::default();
        override_with(&mut config, lookup_from(&[
            ("COLDSTORE_PORT", "9090"),
            ("COLDSTORE_WORKERS", "not-a-number"),
            ("BACKEND_API_URL", "https://coldstore-api.example.com"),
            ("SESSION_IDLE_TIMEOUT_MINUTES", "15"),
            ("ALLOWED_ORIGINS", "https://a.example.com, ,https://b.example.com"),
            ("FRONTEND_BUILD_DIR", "dist"),
        ]));

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.workers, None);
        assert_eq!(config.backend.base_url, "https://coldstore-api.example.com");
        assert_eq!(config.sessions.idle_timeout_minutes, 15);
        assert_eq!(config.security.allowed_origins, vec!["https://a.example.com", "https://b.example.com"]);
        assert_eq!(config.frontend.build_dir, Some(PathBuf::from("dist")));
    }

    #[test]
    fn test_production_security() {
        let mut config = Config::default();
        override_with(&mut config, lookup_from(&[
            ("COLDSTORE_ENV", "production"),
            ("ALLOWED_ORIGINS", "*"),
        ]));
        assert!(config.is_production());
        assert!(config.validate().is_err());

        config.security.allowed_origins = vec!["https://console.example.com".to_string()];
        assert!(config.validate().is_ok());
    }
}
