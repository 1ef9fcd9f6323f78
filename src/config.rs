use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Medicine Cabinet - strain catalog API
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Server host address
    #[arg(short = 'H', long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Server port
    #[arg(short, long, env = "SERVER_PORT", default_value = "8080")]
    pub port: u16,

    /// Secret used to sign auth tokens (HS256)
    #[arg(short = 's', long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Token lifetime, e.g. 7d, 12h, 30m, 45s
    #[arg(long, env = "JWT_EXPIRY", default_value = "7d")]
    pub jwt_expiry: String,

    /// Path to the SQLite database (":memory:" for a throwaway store)
    #[arg(short = 'd', long, env = "DATABASE_URL", default_value = "medicine-cabinet.db")]
    pub database_url: String,

    /// Argon2 memory cost in KiB for password hashing
    #[arg(long, env = "HASH_MEMORY_KIB", default_value = "19456")]
    pub hash_memory_kib: u32,

    /// Argon2 iteration count for password hashing
    #[arg(long, env = "HASH_ITERATIONS", default_value = "2")]
    pub hash_iterations: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Longest token lifetime accepted
pub const MAX_JWT_EXPIRY: Duration = Duration::from_secs(3_650 * 86_400);

#[derive(Clone, Debug)]
pub struct Config {
    // Server settings
    pub server_host: String,
    pub server_port: u16,

    // Tokens
    pub jwt_secret: String,
    pub jwt_expiry: Duration,

    // Storage
    pub database_url: PathBuf,

    // Password hashing
    pub hash_memory_kib: u32,
    pub hash_iterations: u32,

    pub log_level: String,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Self::from_args(CliArgs::parse())
    }

    /// Build configuration from already parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let jwt_secret = args
            .jwt_secret
            .context("JWT_SECRET is required (use -s or set JWT_SECRET env var)")?;

        let jwt_expiry = parse_duration(&args.jwt_expiry)
            .with_context(|| format!("Invalid JWT_EXPIRY: {}", args.jwt_expiry))?;

        Ok(Config {
            server_host: args.host,
            server_port: args.port,
            jwt_secret,
            jwt_expiry,
            database_url: expand_tilde(&args.database_url),
            hash_memory_kib: args.hash_memory_kib,
            hash_iterations: args.hash_iterations,
            log_level: args.log_level,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.jwt_secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET cannot be empty");
        }

        if self.jwt_expiry.is_zero() {
            anyhow::bail!("JWT_EXPIRY must be greater than zero");
        }

        if self.jwt_expiry > MAX_JWT_EXPIRY {
            anyhow::bail!(
                "JWT_EXPIRY must be at most {} days",
                MAX_JWT_EXPIRY.as_secs() / 86_400
            );
        }

        if self.hash_iterations == 0 {
            anyhow::bail!("HASH_ITERATIONS must be at least 1");
        }

        if !self.is_in_memory() {
            if let Some(parent) = self.database_url.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    anyhow::bail!(
                        "DATABASE_URL directory does not exist: {}",
                        parent.display()
                    );
                }
            }
        }

        Ok(())
    }

    /// Whether the store lives only in memory for the lifetime of the process
    pub fn is_in_memory(&self) -> bool {
        self.database_url.as_os_str() == ":memory:"
    }
}

/// Settings for the client-side session manager
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Base URL of the cabinet API, without a trailing slash
    pub base_url: String,

    /// How often the auth token is exchanged for a fresh one
    pub refresh_interval: Duration,

    /// Consecutive scheduled refresh failures that end the session (0 = never)
    pub max_refresh_failures: u32,

    /// Per-request timeout for API calls
    pub request_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            refresh_interval: Duration::from_secs(120),
            max_refresh_failures: 3,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl SessionConfig {
    /// Create a config pointed at `base_url` with default timings
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Read overrides from the environment (CABINET_URL, REFRESH_INTERVAL,
    /// MAX_REFRESH_FAILURES, HTTP_REQUEST_TIMEOUT)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build a config from a variable lookup, falling back to defaults
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match var("CABINET_URL") {
            Some(url) => Self::new(url),
            None => Self::default(),
        };

        if let Some(raw) = var("REFRESH_INTERVAL") {
            config.refresh_interval = parse_duration(&raw)
                .with_context(|| format!("Invalid REFRESH_INTERVAL: {}", raw))?;
        }

        if let Some(raw) = var("MAX_REFRESH_FAILURES") {
            config.max_refresh_failures = raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid MAX_REFRESH_FAILURES: {}", raw))?;
        }

        if let Some(raw) = var("HTTP_REQUEST_TIMEOUT") {
            config.request_timeout = parse_duration(&raw)
                .with_context(|| format!("Invalid HTTP_REQUEST_TIMEOUT: {}", raw))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate timings
    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval.is_zero() {
            anyhow::bail!("REFRESH_INTERVAL must be greater than zero");
        }

        if self.request_timeout.is_zero() {
            anyhow::bail!("HTTP_REQUEST_TIMEOUT must be greater than zero");
        }

        Ok(())
    }
}

/// Parse a duration such as "7d", "12h", "30m", "45s" or a bare number of seconds
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        anyhow::bail!("empty duration");
    }

    let (digits, multiplier) = match s.chars().last() {
        Some('d') => (&s[..s.len() - 1], 86_400),
        Some('h') => (&s[..s.len() - 1], 3_600),
        Some('m') => (&s[..s.len() - 1], 60),
        Some('s') => (&s[..s.len() - 1], 1),
        _ => (s, 1),
    };

    let value: u64 = digits
        .trim()
        .parse()
        .with_context(|| format!("Failed to parse duration: {}", s))?;

    let secs = value
        .checked_mul(multiplier)
        .with_context(|| format!("Duration out of range: {}", s))?;

    Ok(Duration::from_secs(secs))
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
