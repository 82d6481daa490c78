//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Service configuration, read from `RECRUIT_*` environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// libSQL database file.
    pub db_path: PathBuf,
    /// HTTP listen port.
    pub port: u16,
    /// Upper bound on a single profile save before it counts as failed.
    pub persist_timeout: Duration,
    /// Onboarding sessions untouched for this long are abandoned.
    pub session_idle_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/recruit.db"),
            port: 8080,
            persist_timeout: Duration::from_secs(10),
            session_idle_timeout: Duration::from_secs(30 * 60),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys fall back to the
    /// defaults; set-but-malformed keys are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let db_path = lookup("RECRUIT_DB_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let port = parse_var(&lookup, "RECRUIT_PORT")?.unwrap_or(defaults.port);

        let persist_timeout = match parse_var::<u64, _>(&lookup, "RECRUIT_PERSIST_TIMEOUT_SECS")? {
            Some(0) => {
                return Err(ConfigError::InvalidValue {
                    key: "RECRUIT_PERSIST_TIMEOUT_SECS".to_string(),
                    message: "must be at least 1 second".to_string(),
                });
            }
            Some(secs) => Duration::from_secs(secs),
            None => defaults.persist_timeout,
        };

        let session_idle_timeout = parse_var::<u64, _>(&lookup, "RECRUIT_SESSION_IDLE_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.session_idle_timeout);

        Ok(Self {
            db_path,
            port,
            persist_timeout,
            session_idle_timeout,
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{raw:?}: {e}"),
            }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.db_path, PathBuf::from("./data/recruit.db"));
        assert_eq!(config.port, 8080);
        assert_eq!(config.persist_timeout, Duration::from_secs(10));
        assert_eq!(config.session_idle_timeout, Duration::from_secs(1800));
    }

    #[test]
    fn reads_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("RECRUIT_DB_PATH", "/tmp/r.db"),
            ("RECRUIT_PORT", " 9090 "),
            ("RECRUIT_PERSIST_TIMEOUT_SECS", "3"),
            ("RECRUIT_SESSION_IDLE_SECS", "120"),
        ]))
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/r.db"));
        assert_eq!(config.port, 9090);
        assert_eq!(config.persist_timeout, Duration::from_secs(3));
        assert_eq!(config.session_idle_timeout, Duration::from_secs(120));
    }

    #[test]
    fn rejects_malformed_port() {
        let err = AppConfig::from_lookup(lookup(&[("RECRUIT_PORT", "eighty")])).unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "RECRUIT_PORT"),
            "got {err:?}"
        );
    }

    #[test]
    fn rejects_zero_timeout() {
        let err = AppConfig::from_lookup(lookup(&[("RECRUIT_PERSIST_TIMEOUT_SECS", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn blank_db_path_falls_back() {
        let config = AppConfig::from_lookup(lookup(&[("RECRUIT_DB_PATH", "  ")])).unwrap();
        assert_eq!(config.db_path, PathBuf::from("./data/recruit.db"));
    }
}
