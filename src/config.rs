use std::time::Duration;

/// Configuration errors raised while reading the environment
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Settings for the transactional email provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailConfig {
    pub api_url: String,
    /// Without a key reminders are only logged
    pub api_key: Option<String>,
    pub from: String,
    pub timeout: Duration,
}

/// Settings for the reminder scheduling driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub interval: Duration,
    pub initial_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(60 * 60),
            initial_delay: Duration::from_secs(10),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    /// Bearer token for the reminder admin routes; routes stay unmounted without it
    pub admin_token: Option<String>,
    pub log_format: LogFormat,
    pub email: EmailConfig,
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Load configuration from the process environment (and `.env`, if present)
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let log_format = match get("LOG_FORMAT") {
            None => LogFormat::Text,
            Some(v) if v.eq_ignore_ascii_case("text") => LogFormat::Text,
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            Some(v) => {
                return Err(ConfigError::Invalid {
                    key: "LOG_FORMAT",
                    value: v,
                });
            }
        };

        let email = EmailConfig {
            api_url: get("EMAIL_API_URL")
                .unwrap_or_else(|| "https://api.resend.com/emails".to_string()),
            api_key: get("EMAIL_API_KEY"),
            from: get("EMAIL_FROM")
                .unwrap_or_else(|| "Expense Reminders <reminders@localhost>".to_string()),
            timeout: Duration::from_secs(parse_or(&get, "EMAIL_TIMEOUT_SECS", 15)?),
        };

        let defaults = SchedulerConfig::default();
        let interval_secs: u64 =
            parse_or(&get, "REMINDER_INTERVAL_SECS", defaults.interval.as_secs())?;
        if interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "REMINDER_INTERVAL_SECS",
                value: "0".to_string(),
            });
        }
        let scheduler = SchedulerConfig {
            enabled: parse_or(&get, "REMINDER_ENABLED", defaults.enabled)?,
            interval: Duration::from_secs(interval_secs),
            initial_delay: Duration::from_secs(parse_or(
                &get,
                "REMINDER_INITIAL_DELAY_SECS",
                defaults.initial_delay.as_secs(),
            )?),
        };

        Ok(Self {
            database_url,
            database_max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 5)?,
            jwt_secret,
            host: get("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&get, "PORT", 8080)?,
            admin_token: get("ADMIN_TOKEN"),
            log_format,
            email,
            scheduler,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<G, T>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match get(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}
