use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub struct Config {
    pub host: String,
    pub tcp_port: u16,
    pub cache_ttl: Duration,
    pub max_frame_bytes: usize,
}

impl Config {
    pub const DEFAULT_HOST: &'static str = "127.0.0.1";
    pub const DEFAULT_TCP_PORT: u16 = 5500;
    pub const DEFAULT_CACHE_TTL_SECS: u64 = 10;
    pub const DEFAULT_MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

    pub fn from_env() -> Self {
        Self {
            host: std::env::var("TALLY_HOST").unwrap_or_else(|_| Self::DEFAULT_HOST.to_string()),
            tcp_port: parse_var("TALLY_TCP_PORT", Self::DEFAULT_TCP_PORT),
            cache_ttl: Duration::from_secs(parse_var(
                "TALLY_CACHE_TTL_SECS",
                Self::DEFAULT_CACHE_TTL_SECS,
            )),
            max_frame_bytes: parse_var("TALLY_MAX_FRAME_BYTES", Self::DEFAULT_MAX_FRAME_BYTES),
        }
    }

    /// `host:port` of the TCP store
    pub fn store_addr(&self) -> String {
        format!("{}:{}", self.host, self.tcp_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: Self::DEFAULT_HOST.to_string(),
            tcp_port: Self::DEFAULT_TCP_PORT,
            cache_ttl: Duration::from_secs(Self::DEFAULT_CACHE_TTL_SECS),
            max_frame_bytes: Self::DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            warn!("{name}='{raw}' is not valid, using default {default}");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_store_addr() {
        let config = Config::default();
        assert_eq!(config.store_addr(), "127.0.0.1:5500");
        assert_eq!(config.cache_ttl, Duration::from_secs(10));
    }

    #[test]
    fn test_parse_var_unset_uses_default() {
        let port: u16 = parse_var("TALLY_TEST_UNSET_PORT_VARIABLE", 4242);
        assert_eq!(port, 4242);
    }
}
