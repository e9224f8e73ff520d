use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },
}

/// Client configuration loaded from environment variables.
///
/// All fields except the storage bucket and OAuth client id have
/// defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL, without a trailing slash.
    pub api_url: String,
    /// Object storage REST base URL.
    pub storage_url: String,
    /// Storage bucket; uploads fail with a configuration error without it.
    pub storage_bucket: Option<String>,
    /// Google OAuth client id; sign-in is refused without it.
    pub google_client_id: Option<String>,
    pub oauth_redirect_uri: String,
    /// Where the session and onboarding snapshots are persisted.
    pub data_dir: PathBuf,
    pub request_timeout: Duration,
    /// Interval between message refreshes for an open conversation.
    pub poll_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".into(),
            storage_url: "https://firebasestorage.googleapis.com".into(),
            storage_bucket: None,
            google_client_id: None,
            oauth_redirect_uri: "http://localhost:5173/auth/google/callback".into(),
            data_dir: PathBuf::from(".japa"),
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(3),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                                      |
    /// |-----------------------------|----------------------------------------------|
    /// | `JAPA_API_URL`              | `http://localhost:8000`                      |
    /// | `JAPA_STORAGE_URL`          | `https://firebasestorage.googleapis.com`     |
    /// | `JAPA_STORAGE_BUCKET`       | none                                         |
    /// | `JAPA_GOOGLE_CLIENT_ID`     | none                                         |
    /// | `JAPA_OAUTH_REDIRECT_URI`   | `http://localhost:5173/auth/google/callback` |
    /// | `JAPA_DATA_DIR`             | `./.japa`                                    |
    /// | `JAPA_REQUEST_TIMEOUT_SECS` | `30`                                         |
    /// | `JAPA_POLL_INTERVAL_SECS`   | `3`                                          |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let secs = |name: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            match var(name) {
                None => Ok(default),
                Some(value) => match value.trim().parse::<u64>() {
                    Ok(n) if n > 0 => Ok(Duration::from_secs(n)),
                    _ => Err(ConfigError::InvalidNumber { name, value }),
                },
            }
        };

        Ok(Self {
            api_url: var("JAPA_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_url),
            storage_url: var("JAPA_STORAGE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.storage_url),
            storage_bucket: var("JAPA_STORAGE_BUCKET"),
            google_client_id: var("JAPA_GOOGLE_CLIENT_ID"),
            oauth_redirect_uri: var("JAPA_OAUTH_REDIRECT_URI")
                .unwrap_or(defaults.oauth_redirect_uri),
            data_dir: var("JAPA_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            request_timeout: secs("JAPA_REQUEST_TIMEOUT_SECS", defaults.request_timeout)?,
            poll_interval: secs("JAPA_POLL_INTERVAL_SECS", defaults.poll_interval)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_url, "http://localhost:8000");
        assert_eq!(config.poll_interval, Duration::from_secs(3));
        assert!(config.google_client_id.is_none());
    }

    #[test]
    fn overrides_are_read_and_trimmed() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("JAPA_API_URL", "https://api.japa.test/"),
            ("JAPA_GOOGLE_CLIENT_ID", "abc.apps"),
            ("JAPA_STORAGE_BUCKET", "  "),
            ("JAPA_POLL_INTERVAL_SECS", "10"),
        ]))
        .unwrap();
        assert_eq!(config.api_url, "https://api.japa.test");
        assert_eq!(config.google_client_id.as_deref(), Some("abc.apps"));
        assert!(config.storage_bucket.is_none());
        assert_eq!(config.poll_interval, Duration::from_secs(10));
    }

    #[test]
    fn bad_number_is_an_error() {
        let result = ClientConfig::from_lookup(lookup(&[("JAPA_REQUEST_TIMEOUT_SECS", "soon")]));
        assert_matches!(
            result,
            Err(ConfigError::InvalidNumber { name: "JAPA_REQUEST_TIMEOUT_SECS", .. })
        );
        assert!(ClientConfig::from_lookup(lookup(&[("JAPA_POLL_INTERVAL_SECS", "0")])).is_err());
    }
}
