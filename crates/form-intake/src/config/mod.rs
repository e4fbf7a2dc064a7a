use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Request body cap for submissions and uploads unless overridden.
pub const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Top-level configuration, resolved once at startup and handed to each sink.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
    pub database: Option<DatabaseConfig>,
    pub backup: Option<BackupConfig>,
    pub peer: Option<PeerConfig>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .or_else(|_| env::var("PORT"))
            .unwrap_or_else(|_| "3002".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let body_limit = parse_number("APP_BODY_LIMIT_BYTES", DEFAULT_BODY_LIMIT)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let storage = StorageConfig {
            data_dir: PathBuf::from(non_empty("INTAKE_DATA_DIR").unwrap_or_else(|| "data".into())),
        };

        let upload = UploadConfig {
            dir: PathBuf::from(non_empty("INTAKE_UPLOAD_DIR").unwrap_or_else(|| "uploads".into())),
            max_bytes: parse_number("INTAKE_UPLOAD_MAX_BYTES", DEFAULT_BODY_LIMIT)?,
        };

        let database = match non_empty("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: parse_number("DATABASE_MAX_CONNECTIONS", 10)?,
                acquire_timeout: Duration::from_millis(parse_number(
                    "DATABASE_ACQUIRE_TIMEOUT_MS",
                    2_000,
                )?),
                idle_timeout: Duration::from_secs(parse_number("DATABASE_IDLE_TIMEOUT_SECS", 30)?),
            }),
            None => None,
        };

        let outbound_timeout = Duration::from_millis(parse_number("OUTBOUND_TIMEOUT_MS", 5_000)?);

        let backup = match (non_empty("GITHUB_TOKEN"), non_empty("GITHUB_REPO")) {
            (Some(token), Some(repository)) => Some(BackupConfig {
                api_base: non_empty("GITHUB_API_BASE")
                    .unwrap_or_else(|| "https://api.github.com".to_string()),
                repository,
                token,
                branch: non_empty("GITHUB_BRANCH").unwrap_or_else(|| "main".to_string()),
                base_path: non_empty("GITHUB_BACKUP_PATH")
                    .unwrap_or_else(|| "intake-backups".to_string()),
                timeout: outbound_timeout,
            }),
            _ => None,
        };

        let peer = non_empty("PEER_FORWARD_URL").map(|url| PeerConfig {
            url,
            shared_key: non_empty("PEER_FORWARD_KEY"),
            timeout: outbound_timeout,
        });

        Ok(Self {
            environment,
            server: ServerConfig {
                host,
                port,
                body_limit,
            },
            telemetry: TelemetryConfig { log_level },
            storage,
            upload,
            database,
            backup,
            peer,
        })
    }
}

fn non_empty(key: &'static str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_number<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match non_empty(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { key, value: raw }),
        None => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest JSON submission body accepted, in bytes.
    pub body_limit: usize,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Root of the local durable file store.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub dir: PathBuf,
    pub max_bytes: usize,
}

/// Primary relational store; the pool is bounded and lazily connected.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}

/// Coordinates for the version-controlled backup repository.
#[derive(Clone)]
pub struct BackupConfig {
    pub api_base: String,
    pub repository: String,
    pub token: String,
    pub branch: String,
    pub base_path: String,
    pub timeout: Duration,
}

impl fmt::Debug for BackupConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackupConfig")
            .field("api_base", &self.api_base)
            .field("repository", &self.repository)
            .field("token", &"<redacted>")
            .field("branch", &self.branch)
            .field("base_path", &self.base_path)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Peer instance that receives a best-effort copy of every record.
#[derive(Clone)]
pub struct PeerConfig {
    pub url: String,
    pub shared_key: Option<String>,
    pub timeout: Duration,
}

impl fmt::Debug for PeerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerConfig")
            .field("url", &self.url)
            .field("shared_key", &self.shared_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be a non-negative integer (got '{value}')")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
