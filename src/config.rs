use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Server settings, read once from `RESBOOK_*` environment variables.
/// Unparseable values fall back to their defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Use a volatile store instead of the WAL.
    pub in_memory: bool,
    pub password: String,
    pub max_connections: usize,
    pub compact_threshold: u64,
    pub store_timeout: Duration,
    pub metrics_port: Option<u16>,
    pub tls_cert: Option<String>,
    pub tls_key: Option<String>,
    pub seed_demo: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |key: &str| {
            lookup(key).is_some_and(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        };

        Self {
            bind: lookup("RESBOOK_BIND").unwrap_or_else(|| "0.0.0.0".into()),
            port: parsed(&lookup, "RESBOOK_PORT").unwrap_or(5433),
            data_dir: lookup("RESBOOK_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data")),
            in_memory: flag("RESBOOK_IN_MEMORY"),
            password: lookup("RESBOOK_PASSWORD").unwrap_or_else(|| "resbook".into()),
            max_connections: parsed(&lookup, "RESBOOK_MAX_CONNECTIONS").unwrap_or(256),
            compact_threshold: parsed(&lookup, "RESBOOK_COMPACT_THRESHOLD").unwrap_or(1000),
            store_timeout: Duration::from_millis(parsed(&lookup, "RESBOOK_STORE_TIMEOUT_MS").unwrap_or(5000)),
            metrics_port: parsed(&lookup, "RESBOOK_METRICS_PORT"),
            tls_cert: lookup("RESBOOK_TLS_CERT"),
            tls_key: lookup("RESBOOK_TLS_KEY"),
            seed_demo: flag("RESBOOK_SEED_DEMO"),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("resbook.wal")
    }
}

/// Unset or unparsable values fall back to the caller's default.
fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.listen_addr(), "0.0.0.0:5433");
        assert_eq!(cfg.wal_path(), PathBuf::from("./data/resbook.wal"));
        assert_eq!(cfg.max_connections, 256);
        assert_eq!(cfg.compact_threshold, 1000);
        assert_eq!(cfg.store_timeout, Duration::from_secs(5));
        assert_eq!(cfg.metrics_port, None);
        assert!(!cfg.in_memory);
        assert!(!cfg.seed_demo);
    }

    #[test]
    fn overrides() {
        let cfg = from_pairs(&[
            ("RESBOOK_PORT", "6000"),
            ("RESBOOK_BIND", "127.0.0.1"),
            ("RESBOOK_DATA_DIR", "/var/lib/resbook"),
            ("RESBOOK_STORE_TIMEOUT_MS", "250"),
            ("RESBOOK_METRICS_PORT", "9100"),
            ("RESBOOK_SEED_DEMO", "TRUE"),
            ("RESBOOK_IN_MEMORY", "1"),
        ]);
        assert_eq!(cfg.listen_addr(), "127.0.0.1:6000");
        assert_eq!(cfg.wal_path(), PathBuf::from("/var/lib/resbook/resbook.wal"));
        assert_eq!(cfg.store_timeout, Duration::from_millis(250));
        assert_eq!(cfg.metrics_port, Some(9100));
        assert!(cfg.seed_demo);
        assert!(cfg.in_memory);
    }

    #[test]
    fn garbage_numbers_fall_back() {
        let cfg = from_pairs(&[("RESBOOK_PORT", "http"), ("RESBOOK_MAX_CONNECTIONS", "-3")]);
        assert_eq!(cfg.port, 5433);
        assert_eq!(cfg.max_connections, 256);
    }

    #[test]
    fn numeric_settings_parse_to_their_own_types() {
        let cfg = from_pairs(&[
            ("RESBOOK_PORT", " 7000 "),
            ("RESBOOK_MAX_CONNECTIONS", "12"),
            ("RESBOOK_COMPACT_THRESHOLD", "5000000000"),
            ("RESBOOK_STORE_TIMEOUT_MS", "40"),
            ("RESBOOK_METRICS_PORT", "70000"),
        ]);
        assert_eq!(cfg.port, 7000);
        assert_eq!(cfg.max_connections, 12);
        assert_eq!(cfg.compact_threshold, 5_000_000_000);
        assert_eq!(cfg.store_timeout, Duration::from_millis(40));
        assert_eq!(cfg.metrics_port, None);
    }
}
