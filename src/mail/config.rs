use std::env;

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u16(key: &str, default: u16) -> u16 {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

/// Static SMTP relay configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub tls: bool,
}

impl MailConfig {
    pub fn from_env() -> Self {
        Self {
            host: env_string("SMTP_HOST", "localhost"),
            port: env_u16("SMTP_PORT", 587),
            username: env_string("SMTP_USERNAME", ""),
            password: env_string("SMTP_PASSWORD", ""),
            from: env_string("SMTP_FROM", "crm@localhost"),
            tls: env_bool("SMTP_TLS", true),
        }
    }

    /// Credentials are optional; an empty username disables authentication.
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty()
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
