//! Settings read from the process environment.
use std::str::FromStr;
use tracing::level_filters::LevelFilter;

/// Environment variable holding the base URL of the Loki server.
pub const ENV_URL: &str = "LOG_URL";
/// Environment variable holding the minimum level of the shipper's own diagnostics.
pub const ENV_BASE_LEVEL: &str = "LOG_BASE_LEVEL";

/// Base URL used when [`ENV_URL`] is not set.
pub const DEFAULT_URL: &str = "http://localhost:3100";
/// Diagnostic level used when [`ENV_BASE_LEVEL`] is not set or invalid.
pub const DEFAULT_BASE_LEVEL: LevelFilter = LevelFilter::INFO;

/// Settings read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the Loki server, the push path is appended to it.
    pub url: String,
    /// Minimum level of diagnostics emitted by the shipper itself.
    pub base_level: LevelFilter,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            url: DEFAULT_URL.to_string(),
            base_level: DEFAULT_BASE_LEVEL,
        }
    }
}

impl Config {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, which returns the value of a variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let url = lookup(ENV_URL)
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_URL.to_string());
        let base_level = lookup(ENV_BASE_LEVEL)
            .and_then(|level| parse_level(&level))
            .unwrap_or(DEFAULT_BASE_LEVEL);
        Config { url, base_level }
    }
}

/// Parse a level name, also accepting `warning`, `fatal` and `panic`.
fn parse_level(level: &str) -> Option<LevelFilter> {
    match level.trim().to_ascii_lowercase().as_str() {
        "warning" => Some(LevelFilter::WARN),
        "fatal" | "panic" => Some(LevelFilter::ERROR),
        level => LevelFilter::from_str(level).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(Config::from_lookup(lookup(&[])), Config::default());
        assert_eq!(
            Config::from_lookup(lookup(&[(ENV_URL, "  ")])).url,
            DEFAULT_URL
        );
    }

    #[test]
    fn reads_values() {
        let config = Config::from_lookup(lookup(&[
            (ENV_URL, "https://loki.example.com/prefix"),
            (ENV_BASE_LEVEL, "WARN"),
        ]));
        assert_eq!(config.url, "https://loki.example.com/prefix");
        assert_eq!(config.base_level, LevelFilter::WARN);
    }

    #[test]
    fn invalid_level_falls_back() {
        let config = Config::from_lookup(lookup(&[(ENV_BASE_LEVEL, "loud")]));
        assert_eq!(config.base_level, DEFAULT_BASE_LEVEL);

        let config = Config::from_lookup(lookup(&[(ENV_BASE_LEVEL, "off")]));
        assert_eq!(config.base_level, LevelFilter::OFF);
    }

    #[test]
    fn accepts_level_aliases() {
        for (value, expected) in [
            ("warning", LevelFilter::WARN),
            ("Warning", LevelFilter::WARN),
            ("FATAL", LevelFilter::ERROR),
            ("panic", LevelFilter::ERROR),
            (" debug ", LevelFilter::DEBUG),
        ] {
            let config = Config::from_lookup(lookup(&[(ENV_BASE_LEVEL, value)]));
            assert_eq!(config.base_level, expected, "{value}");
        }
    }
}
