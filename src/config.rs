use std::{env, str::FromStr, time::Duration};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub password_reset_ttl: chrono::Duration,
    pub mail: MailConfig,
}

/// SMTP settings and delivery policy for the notification worker.
///
/// When `smtp_host` is unset, outgoing mail is written to the log instead.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_address: String,
    pub queue_capacity: usize,
    pub max_in_flight: usize,
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET is not set"))?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env_or("APP_PORT", 3000);
        let reset_minutes: i64 = env_or("PASSWORD_RESET_TTL_MINUTES", 24 * 60);
        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            password_reset_ttl: chrono::Duration::minutes(reset_minutes),
            mail: MailConfig::from_env(),
        })
    }
}

impl MailConfig {
    pub fn from_env() -> Self {
        Self {
            smtp_host: env::var("SMTP_HOST").ok().filter(|h| !h.is_empty()),
            smtp_port: env_or("SMTP_PORT", 587),
            smtp_username: env::var("SMTP_USERNAME").unwrap_or_default(),
            smtp_password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            from_address: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "no-reply@localhost".to_string()),
            queue_capacity: env_or("MAIL_QUEUE_CAPACITY", 256),
            max_in_flight: env_or("MAIL_MAX_IN_FLIGHT", 4),
            max_attempts: env_or::<u32>("MAIL_MAX_ATTEMPTS", 5).max(1),
            retry_base_delay: Duration::from_millis(env_or("MAIL_RETRY_BASE_MS", 500)),
            retry_max_delay: Duration::from_millis(env_or("MAIL_RETRY_MAX_MS", 30_000)),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_address: "no-reply@localhost".to_string(),
            queue_capacity: 256,
            max_in_flight: 4,
            max_attempts: 5,
            retry_base_delay: Duration::from_millis(500),
            retry_max_delay: Duration::from_secs(30),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
