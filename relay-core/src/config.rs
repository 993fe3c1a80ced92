use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::{
    env, fmt, fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

const ENV_CONFIG: &str = "RELAY_CONFIG";
const ENV_BIND: &str = "RELAY_BIND";
const ENV_API_KEY: &str = "OPENWEATHER_API_KEY";
const ENV_UPSTREAM_URL: &str = "RELAY_UPSTREAM_URL";
const ENV_TIMEOUT_MS: &str = "RELAY_TIMEOUT_MS";
const ENV_MAX_RETRIES: &str = "RELAY_MAX_RETRIES";
const ENV_RETRY_BASE_DELAY_MS: &str = "RELAY_RETRY_BASE_DELAY_MS";
const ENV_RETRY_MAX_DELAY_MS: &str = "RELAY_RETRY_MAX_DELAY_MS";

/// Current-weather endpoint of the upstream service.
pub const DEFAULT_UPSTREAM_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

const DEFAULT_TIMEOUT_MS: u64 = 10_000;

fn default_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5000))
}

/// Retry behavior for the outbound call: exponential backoff, capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Additional attempts after the first one fails transiently.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 2, base_delay_ms: 250, max_delay_ms: 2_000 }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0 = first retry).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.base_delay_ms == 0 {
            return Duration::ZERO;
        }

        let multiplier = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);

        Duration::from_millis(delay_ms)
    }
}

/// Runtime configuration for the relay.
///
/// Resolution order: built-in defaults, then an optional TOML file, then
/// environment variables. Later layers win. The API key has no default and
/// must come from the environment or the file.
#[derive(Clone)]
pub struct Config {
    /// Socket address the HTTP listener binds to.
    pub bind: SocketAddr,

    /// Upstream endpoint serving current weather data.
    pub upstream_url: String,

    /// Credential sent to the upstream as the `appid` query parameter.
    pub api_key: String,

    /// Deadline for a single outbound attempt.
    pub timeout: Duration,

    pub retry: RetryPolicy,
}

// api_key must not leak through debug-formatted logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind", &self.bind)
            .field("upstream_url", &self.upstream_url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

/// On-disk configuration; every key is optional.
///
/// Example TOML:
/// ```toml
/// bind = "127.0.0.1:8080"
/// api_key = "..."
/// timeout_ms = 5000
///
/// [retry]
/// max_retries = 3
/// ```
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    bind: Option<SocketAddr>,
    upstream_url: Option<String>,
    api_key: Option<String>,
    timeout_ms: Option<u64>,
    retry: Option<RetryPolicy>,
}

impl FileConfig {
    fn read(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

impl Config {
    /// Load configuration from the process environment, plus the TOML file
    /// named by `path` (or by `RELAY_CONFIG`) when one is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let from_env = |key: &str| env::var(key).ok();

        let file_path =
            path.map(PathBuf::from).or_else(|| from_env(ENV_CONFIG).map(PathBuf::from));

        let file = match file_path {
            Some(p) => Some(FileConfig::read(&p)?),
            None => None,
        };

        Self::resolve(file, from_env)
    }

    /// Pure resolution step, separated so tests can inject an environment.
    fn resolve(file: Option<FileConfig>, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let file = file.unwrap_or_default();

        let bind = match env(ENV_BIND) {
            Some(s) => {
                s.parse().with_context(|| format!("Invalid {ENV_BIND} value: {s}"))?
            }
            None => file.bind.unwrap_or_else(default_bind),
        };

        let upstream_url = env(ENV_UPSTREAM_URL)
            .or(file.upstream_url)
            .unwrap_or_else(|| DEFAULT_UPSTREAM_URL.to_string());

        let api_key = env(ENV_API_KEY)
            .or(file.api_key)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "No OpenWeather API key configured.\n\
                     Hint: set the {ENV_API_KEY} environment variable, or add `api_key` to the config file."
                )
            })?;

        let timeout_ms = parsed(env(ENV_TIMEOUT_MS), ENV_TIMEOUT_MS)?
            .or(file.timeout_ms)
            .unwrap_or(DEFAULT_TIMEOUT_MS);

        let file_retry = file.retry.unwrap_or_default();
        let retry = RetryPolicy {
            max_retries: parsed(env(ENV_MAX_RETRIES), ENV_MAX_RETRIES)?
                .unwrap_or(file_retry.max_retries),
            base_delay_ms: parsed(env(ENV_RETRY_BASE_DELAY_MS), ENV_RETRY_BASE_DELAY_MS)?
                .unwrap_or(file_retry.base_delay_ms),
            max_delay_ms: parsed(env(ENV_RETRY_MAX_DELAY_MS), ENV_RETRY_MAX_DELAY_MS)?
                .unwrap_or(file_retry.max_delay_ms),
        };

        Ok(Self {
            bind,
            upstream_url,
            api_key,
            timeout: Duration::from_millis(timeout_ms),
            retry,
        })
    }
}

fn parsed<T>(value: Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    value
        .map(|s| s.parse::<T>().map_err(|err| anyhow!("Invalid {key} value '{s}': {err}")))
        .transpose()
}
