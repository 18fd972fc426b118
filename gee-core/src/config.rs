//! Server address settings: defaults, overridden by the HOST / PORT environment variables.

use std::env;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9999;
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Request bodies longer than this are answered with 413.
    pub max_body_bytes: usize,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Read HOST and PORT from the process environment. An unparsable PORT keeps the default.
    pub fn from_env(default_host: &str, default_port: u16) -> Self {
        Self::from_lookup(default_host, default_port, |key| env::var(key).ok())
    }

    /// Same as `from_env`, with a caller-supplied variable lookup.
    pub fn from_lookup<F>(default_host: &str, default_port: u16, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST")
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| default_host.to_string());
        let port = match lookup("PORT") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(port = %raw, default = default_port, "ignoring invalid PORT");
                default_port
            }),
            None => default_port,
        };
        Self::new(host, port)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}
