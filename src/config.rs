use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

/// Where users, snippets, and sessions live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Redis,
    /// Process-local maps; everything is lost on restart.
    Memory,
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(StorageKind::Redis),
            "memory" => Ok(StorageKind::Memory),
            other => Err(format!("expected \"redis\" or \"memory\", got \"{}\"", other)),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    // Server
    pub bind_addr: SocketAddr,

    // Storage
    pub storage: StorageKind,
    pub redis_url: Option<String>,

    // Sessions
    pub session_lifetime_secs: u64,
    pub session_cookie_name: String,
    pub cookie_secure: bool,
    pub session_cleanup_interval_secs: u64,

    // Limits
    pub max_form_bytes: usize,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind_addr", &self.bind_addr)
            .field("storage", &self.storage)
            .field("redis_url", &self.redis_url.as_ref().map(|_| "[REDACTED]"))
            .field("session_lifetime_secs", &self.session_lifetime_secs)
            .field("session_cookie_name", &self.session_cookie_name)
            .field("cookie_secure", &self.cookie_secure)
            .field(
                "session_cleanup_interval_secs",
                &self.session_cleanup_interval_secs,
            )
            .field("max_form_bytes", &self.max_form_bytes)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("Failed to parse {0}: {1}")]
    ParseError(String, String),
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Attempt to load .env file, but don't fail if it doesn't exist
        // (env vars may be set directly in production)
        let _ = dotenvy::dotenv();

        // Server
        let bind_addr = parse_env_or_default("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 4000)))?;

        // Storage
        let storage = parse_env_or_default("STORAGE", StorageKind::Redis)?;
        let redis_url = env::var("REDIS_URL").ok().filter(|url| !url.is_empty());
        if storage == StorageKind::Redis && redis_url.is_none() {
            // Required to prevent silently falling back to unauthenticated defaults
            return Err(ConfigError::MissingVar("REDIS_URL".to_string()));
        }

        // Sessions
        let session_lifetime_secs = parse_env_or_default("SESSION_LIFETIME_SECS", 43_200)?;
        if session_lifetime_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "SESSION_LIFETIME_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let session_cookie_name =
            env::var("SESSION_COOKIE_NAME").unwrap_or_else(|_| "session".to_string());
        if session_cookie_name.is_empty()
            || !session_cookie_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConfigError::InvalidValue(
                "SESSION_COOKIE_NAME".to_string(),
                "must be non-empty and contain only alphanumeric characters, hyphens, and underscores"
                    .to_string(),
            ));
        }

        let cookie_secure = parse_env_or_default("COOKIE_SECURE", true)?;
        let session_cleanup_interval_secs =
            parse_env_or_default("SESSION_CLEANUP_INTERVAL_SECS", 300)?;

        // Limits
        let max_form_bytes = parse_env_or_default("MAX_FORM_BYTES", 65_536)?;
        if max_form_bytes == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_FORM_BYTES".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Config {
            bind_addr,
            storage,
            redis_url,
            session_lifetime_secs,
            session_cookie_name,
            cookie_secure,
            session_cleanup_interval_secs,
            max_form_bytes,
        })
    }
}

/// Helper function to parse environment variable with a default value
fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| ConfigError::ParseError(key.to_string(), format!("{}: {}", e, val))),
        Err(_) => Ok(default),
    }
}
