//! ctrlmgr configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::manager::Options;
use crate::rest::RestConfig;

/// File-backed manager configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Connection to the API server; the manager refuses to start without it
    pub rest: Option<RestConfig>,

    /// Restrict the cache to one namespace
    pub namespace: Option<String>,

    /// Cache resync period in seconds
    #[serde(rename = "sync-period-secs")]
    pub sync_period_secs: Option<u64>,

    #[serde(rename = "graceful-shutdown-timeout-secs")]
    pub graceful_shutdown_timeout_secs: Option<u64>,

    /// TRACE, DEBUG, INFO, WARN or ERROR
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

/// Names a config file, taking precedence over the search paths
pub const ENV_CONFIG: &str = "CTRLMGR_CONFIG";
/// Overrides `rest.host`; creates the `rest` section when the file has none
pub const ENV_HOST: &str = "CTRLMGR_HOST";
/// Overrides `rest.bearer-token`
pub const ENV_TOKEN: &str = "CTRLMGR_TOKEN";
/// Overrides `namespace`
pub const ENV_NAMESPACE: &str = "CTRLMGR_NAMESPACE";

impl ManagerConfig {
    /// Load from `config_path`, `$CTRLMGR_CONFIG` or the search paths, then
    /// overlay connection settings from the process environment
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        Self::load_with_env(config_path, |key| std::env::var(key).ok())
    }

    /// [`ManagerConfig::load`] with the environment supplied by `env`
    pub fn load_with_env<F>(config_path: Option<&PathBuf>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let explicit = config_path.cloned().or_else(|| lookup(&env, ENV_CONFIG).map(PathBuf::from));
        let mut config = match explicit {
            Some(path) => {
                Self::load_from_file(&path).with_context(|| format!("Failed to load config from {}", path.display()))?
            }
            None => Self::discover(),
        };
        config.apply_env(&env);
        Ok(config)
    }

    /// `./.ctrlmgr.yml`, then `<config_dir>/ctrlmgr/ctrlmgr.yml`
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".ctrlmgr.yml")];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("ctrlmgr").join("ctrlmgr.yml"));
        }
        paths
    }

    fn discover() -> Self {
        for path in Self::search_paths().into_iter().filter(|p| p.exists()) {
            match Self::load_from_file(&path) {
                Ok(config) => return config,
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable config"),
            }
        }
        info!("No config file found, using defaults");
        Self::default()
    }

    /// Overlay `CTRLMGR_HOST`, `CTRLMGR_TOKEN` and `CTRLMGR_NAMESPACE`; empty values are ignored
    pub fn apply_env<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(&env, ENV_HOST) {
            debug!(%host, "ManagerConfig::apply_env: host override");
            match self.rest.as_mut() {
                Some(rest) => rest.host = host,
                None => self.rest = Some(RestConfig::new(host)),
            }
        }
        if let Some(token) = lookup(&env, ENV_TOKEN) {
            match self.rest.as_mut() {
                Some(rest) => rest.bearer_token = Some(token),
                None => warn!("{} set without a connection config; ignoring", ENV_TOKEN),
            }
        }
        if let Some(namespace) = lookup(&env, ENV_NAMESPACE) {
            self.namespace = Some(namespace);
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Manager options with the production factories and the configured scope and timings
    pub fn to_options(&self) -> Options {
        Options {
            namespace: self.namespace.clone(),
            sync_period: self.sync_period_secs.map(Duration::from_secs),
            graceful_shutdown_timeout: self.graceful_shutdown_timeout_secs.map(Duration::from_secs),
            ..Options::default()
        }
    }
}

fn lookup<F: Fn(&str) -> Option<String>>(env: &F, key: &str) -> Option<String> {
    env(key).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn no_env(_key: &str) -> Option<String> {
        None
    }

    fn env(vars: &[(&'static str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: Vec<(&'static str, String)> = vars.iter().map(|(k, v)| (*k, v.to_string())).collect();
        move |key: &str| vars.iter().find(|(k, _)| *k == key).map(|(_, v)| v.clone())
    }

    #[test]
    fn test_default_config() {
        let config = ManagerConfig::default();
        assert!(config.rest.is_none());
        assert!(config.log_level.is_none());

        let options = config.to_options();
        assert!(options.sync_period.is_none());
        assert!(options.new_client.is_none());
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
rest:
  host: https://cluster.example.com:6443
  bearer-token: abc123
  qps: 5
namespace: payments
sync-period-secs: 600
graceful-shutdown-timeout-secs: 10
log-level: debug
"#;
        let config: ManagerConfig = serde_yaml::from_str(yaml).unwrap();
        let rest = config.rest.as_ref().unwrap();
        assert_eq!(rest.host, "https://cluster.example.com:6443");
        assert_eq!(rest.bearer_token.as_deref(), Some("abc123"));
        assert_eq!(rest.qps, 5);
        assert_eq!(rest.timeout_ms, 30_000);
        assert_eq!(config.log_level.as_deref(), Some("debug"));

        let options = config.to_options();
        assert_eq!(options.namespace.as_deref(), Some("payments"));
        assert_eq!(options.sync_period, Some(Duration::from_secs(600)));
        assert_eq!(options.graceful_shutdown_timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_load_explicit_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "namespace: staging").unwrap();
        let path = file.path().to_path_buf();

        let config = ManagerConfig::load_with_env(Some(&path), no_env).unwrap();
        assert_eq!(config.namespace.as_deref(), Some("staging"));
        assert!(config.rest.is_none());
    }

    #[test]
    fn test_env_names_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "namespace: from-env-file").unwrap();
        let path = file.path().display().to_string();

        let config = ManagerConfig::load_with_env(None, env(&[(ENV_CONFIG, &path)])).unwrap();
        assert_eq!(config.namespace.as_deref(), Some("from-env-file"));

        // An explicit path beats the variable
        let mut other = NamedTempFile::new().unwrap();
        writeln!(other, "namespace: explicit").unwrap();
        let explicit = other.path().to_path_buf();
        let config = ManagerConfig::load_with_env(Some(&explicit), env(&[(ENV_CONFIG, &path)])).unwrap();
        assert_eq!(config.namespace.as_deref(), Some("explicit"));
    }

    #[test]
    fn test_env_config_missing_file_errors() {
        let err = ManagerConfig::load_with_env(None, env(&[(ENV_CONFIG, "/nonexistent/ctrlmgr.yml")])).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/ctrlmgr.yml"));
    }

    #[test]
    fn test_env_overrides_connection() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "rest:\n  host: https://file.example.com\n  qps: 7\nnamespace: payments").unwrap();
        let path = file.path().to_path_buf();

        let config = ManagerConfig::load_with_env(
            Some(&path),
            env(&[(ENV_HOST, "https://env.example.com"), (ENV_TOKEN, "s3cret")]),
        )
        .unwrap();
        let rest = config.rest.as_ref().unwrap();
        assert_eq!(rest.host, "https://env.example.com");
        assert_eq!(rest.bearer_token.as_deref(), Some("s3cret"));
        assert_eq!(rest.qps, 7);
        assert_eq!(config.namespace.as_deref(), Some("payments"));
    }

    #[test]
    fn test_env_host_creates_connection() {
        let mut config = ManagerConfig::default();
        config.apply_env(env(&[(ENV_HOST, "https://env.example.com"), (ENV_NAMESPACE, "staging")]));
        let rest = config.rest.as_ref().unwrap();
        assert_eq!(rest.host, "https://env.example.com");
        assert_eq!(rest.qps, RestConfig::default().qps);
        assert_eq!(config.namespace.as_deref(), Some("staging"));
    }

    #[test]
    fn test_env_token_without_host_is_ignored() {
        let mut config = ManagerConfig::default();
        config.apply_env(env(&[(ENV_TOKEN, "s3cret"), (ENV_NAMESPACE, "")]));
        assert!(config.rest.is_none());
        assert!(config.namespace.is_none());
    }

    #[test]
    fn test_search_paths_start_local() {
        let paths = ManagerConfig::search_paths();
        assert_eq!(paths[0], PathBuf::from(".ctrlmgr.yml"));
        assert!(paths.iter().skip(1).all(|p| p.ends_with("ctrlmgr/ctrlmgr.yml")));
    }

    #[test]
    fn test_load_explicit_path_errors() {
        let missing = PathBuf::from("/nonexistent/ctrlmgr.yml");
        let err = ManagerConfig::load_with_env(Some(&missing), no_env).unwrap_err();
        assert!(err.to_string().contains("Failed to load config from"));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sync-period-secs: [not, a, number]").unwrap();
        assert!(ManagerConfig::load_from_file(file.path()).is_err());
    }
}
