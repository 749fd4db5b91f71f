//! # Configuration
//!
//! [`CortexConfig`] holds everything the bridge needs: where the Cortex
//! service lives, the application credentials, and the timing knobs of the
//! retry loops and the stream lease manager.
//!
//! ## Loading Priority
//!
//! [`CortexConfig::discover`] loads the first file it finds:
//!
//! 1. An explicit path (e.g. from `--config`)
//! 2. The path in `CORTEX_BRIDGE_CONFIG`
//! 3. `./cortex-bridge.toml`
//! 4. `~/.config/cortex-bridge/cortex-bridge.toml`
//!
//! and falls back to environment variables only. Environment variables
//! always override file values:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `CORTEX_URL` | `cortex_url` |
//! | `CORTEX_CLIENT_ID` / `CORTEX_CLIENT_SECRET` | credentials |
//! | `CORTEX_LICENSE` | `license` |
//! | `CORTEX_DEBIT` | `debit` |
//! | `CORTEX_PROFILE` | `profile` |
//! | `CORTEX_HEADSET_ID` | `headset_id` |
//! | `CORTEX_TLS_REJECT_UNAUTHORIZED` | `tls.accept_invalid_certs` (`0`/`false` accepts) |
//!
//! Missing credentials are not a configuration error: the client only
//! needs them for `authorize` and reports [`CortexError::MissingCredentials`]
//! there.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CortexError, CortexResult};
use crate::retry::RetryPolicy;

/// Default Cortex WebSocket URL (localhost, self-signed TLS).
pub const DEFAULT_CORTEX_URL: &str = "wss://localhost:6868";

/// Environment variable naming a config file.
pub const CONFIG_PATH_ENV: &str = "CORTEX_BRIDGE_CONFIG";

const CONFIG_FILE_NAME: &str = "cortex-bridge.toml";

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_RPC_TIMEOUT_SECS: u64 = 10;
const DEFAULT_HEADSET_CONNECT_TIMEOUT_SECS: u64 = 30;

const DEFAULT_SESSION_MAX_ATTEMPTS: u32 = 12;
const DEFAULT_SESSION_DELAY_MS: u64 = 1000;
const DEFAULT_SUBSCRIBE_MAX_ATTEMPTS: u32 = 12;
const DEFAULT_SUBSCRIBE_DELAY_MS: u64 = 1000;

const DEFAULT_DEVICE_MAX_ATTEMPTS: u32 = 10;
const DEFAULT_DEVICE_POLL_INTERVAL_MS: u64 = 500;

const DEFAULT_HOLDER_TTL_SECS: u64 = 90;
const DEFAULT_PRUNE_INTERVAL_SECS: u64 = 15;

/// Configuration for the bridge.
///
/// # Examples
///
/// ```
/// use cortex_bridge::config::CortexConfig;
///
/// let config = CortexConfig::new("my-client-id", "my-client-secret");
/// assert!(config.should_accept_invalid_certs());
/// ```
///
/// ```no_run
/// use cortex_bridge::config::CortexConfig;
///
/// let config = CortexConfig::discover(None).expect("bad config");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CortexConfig {
    /// Cortex API client ID from the Emotiv developer portal.
    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    /// WebSocket URL for the Cortex service.
    #[serde(default = "default_cortex_url")]
    pub cortex_url: String,

    /// License key sent with `authorize`.
    #[serde(default)]
    pub license: Option<String>,

    /// Number of sessions to debit from the license on `authorize`.
    #[serde(default)]
    pub debit: Option<u32>,

    /// Profile to load on the headset once a session exists.
    #[serde(default)]
    pub profile: Option<String>,

    /// Preferred headset id. Without one the first connected headset wins.
    #[serde(default)]
    pub headset_id: Option<String>,

    #[serde(default)]
    pub tls: TlsConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub streams: StreamsConfig,
}

/// TLS trust settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Accept self-signed / invalid server certificates. When unset this is
    /// decided by the URL: localhost yes, anything else no.
    #[serde(default)]
    pub accept_invalid_certs: Option<bool>,
}

/// Timeout settings, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// WebSocket handshake.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// A single JSON-RPC call.
    #[serde(default = "default_rpc_timeout")]
    pub rpc_timeout_secs: u64,

    /// Overall budget for getting a headset to `connected`.
    #[serde(default = "default_headset_connect_timeout")]
    pub headset_connect_timeout_secs: u64,
}

/// Fixed-delay retry budgets for the device-busy condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_session_max_attempts")]
    pub session_max_attempts: u32,
    #[serde(default = "default_session_delay_ms")]
    pub session_delay_ms: u64,
    #[serde(default = "default_subscribe_max_attempts")]
    pub subscribe_max_attempts: u32,
    #[serde(default = "default_subscribe_delay_ms")]
    pub subscribe_delay_ms: u64,
}

/// Device acquisition polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_device_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_device_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Stream lease settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamsConfig {
    /// Lease length granted to a holder that does not ask for one.
    #[serde(default = "default_holder_ttl")]
    pub holder_ttl_secs: u64,

    /// How often expired holders are swept.
    #[serde(default = "default_prune_interval")]
    pub prune_interval_secs: u64,
}

// ─── Defaults ───────────────────────────────────────────────────────────

fn default_cortex_url() -> String {
    DEFAULT_CORTEX_URL.to_string()
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_rpc_timeout() -> u64 {
    DEFAULT_RPC_TIMEOUT_SECS
}

fn default_headset_connect_timeout() -> u64 {
    DEFAULT_HEADSET_CONNECT_TIMEOUT_SECS
}

fn default_session_max_attempts() -> u32 {
    DEFAULT_SESSION_MAX_ATTEMPTS
}

fn default_session_delay_ms() -> u64 {
    DEFAULT_SESSION_DELAY_MS
}

fn default_subscribe_max_attempts() -> u32 {
    DEFAULT_SUBSCRIBE_MAX_ATTEMPTS
}

fn default_subscribe_delay_ms() -> u64 {
    DEFAULT_SUBSCRIBE_DELAY_MS
}

fn default_device_max_attempts() -> u32 {
    DEFAULT_DEVICE_MAX_ATTEMPTS
}

fn default_device_poll_interval_ms() -> u64 {
    DEFAULT_DEVICE_POLL_INTERVAL_MS
}

fn default_holder_ttl() -> u64 {
    DEFAULT_HOLDER_TTL_SECS
}

fn default_prune_interval() -> u64 {
    DEFAULT_PRUNE_INTERVAL_SECS
}

// ─── Default impls ──────────────────────────────────────────────────────

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            rpc_timeout_secs: DEFAULT_RPC_TIMEOUT_SECS,
            headset_connect_timeout_secs: DEFAULT_HEADSET_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            session_max_attempts: DEFAULT_SESSION_MAX_ATTEMPTS,
            session_delay_ms: DEFAULT_SESSION_DELAY_MS,
            subscribe_max_attempts: DEFAULT_SUBSCRIBE_MAX_ATTEMPTS,
            subscribe_delay_ms: DEFAULT_SUBSCRIBE_DELAY_MS,
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_DEVICE_MAX_ATTEMPTS,
            poll_interval_ms: DEFAULT_DEVICE_POLL_INTERVAL_MS,
        }
    }
}

impl Default for StreamsConfig {
    fn default() -> Self {
        Self {
            holder_ttl_secs: DEFAULT_HOLDER_TTL_SECS,
            prune_interval_secs: DEFAULT_PRUNE_INTERVAL_SECS,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn session_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(
            self.session_max_attempts,
            Duration::from_millis(self.session_delay_ms),
        )
    }

    #[must_use]
    pub fn subscribe_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(
            self.subscribe_max_attempts,
            Duration::from_millis(self.subscribe_delay_ms),
        )
    }
}

impl DeviceConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl StreamsConfig {
    #[must_use]
    pub fn holder_ttl(&self) -> Duration {
        Duration::from_secs(self.holder_ttl_secs)
    }

    #[must_use]
    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_secs)
    }
}

// ─── CortexConfig impl ─────────────────────────────────────────────────

impl CortexConfig {
    /// Create a config with just client credentials (all other fields use defaults).
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            cortex_url: default_cortex_url(),
            license: None,
            debit: None,
            profile: None,
            headset_id: None,
            tls: TlsConfig::default(),
            timeouts: TimeoutConfig::default(),
            retry: RetryConfig::default(),
            device: DeviceConfig::default(),
            streams: StreamsConfig::default(),
        }
    }

    /// Defaults plus environment variables.
    ///
    /// # Errors
    /// [`CortexError::ConfigError`] if a variable holds an unparseable value.
    pub fn from_env() -> CortexResult<Self> {
        let mut config = Self::new("", "");
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load a TOML file, then apply environment overrides.
    ///
    /// # Errors
    /// [`CortexError::ConfigError`] if the file is unreadable or malformed.
    #[cfg(feature = "config-toml")]
    pub fn from_file(path: impl AsRef<Path>) -> CortexResult<Self> {
        Self::from_file_with(path.as_ref(), |key| std::env::var(key).ok())
    }

    #[cfg(feature = "config-toml")]
    fn from_file_with(path: &Path, lookup: impl Fn(&str) -> Option<String>) -> CortexResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| CortexError::ConfigError {
            reason: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;
        let mut config: Self = toml::from_str(&contents)?;
        config.apply_env_overrides(lookup)?;
        Ok(config)
    }

    /// Search the standard locations (see the module docs).
    ///
    /// # Errors
    /// Any error from loading the file that was found.
    #[cfg(feature = "config-toml")]
    pub fn discover(explicit_path: Option<&Path>) -> CortexResult<Self> {
        Self::discover_with(explicit_path, Path::new("."), |key| std::env::var(key).ok())
    }

    #[cfg(feature = "config-toml")]
    fn discover_with(
        explicit_path: Option<&Path>,
        local_dir: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> CortexResult<Self> {
        if let Some(path) = explicit_path {
            return Self::from_file_with(path, lookup);
        }

        let candidates = [
            lookup(CONFIG_PATH_ENV).map(PathBuf::from),
            Some(local_dir.join(CONFIG_FILE_NAME)),
            user_config_path(&lookup),
        ];
        if let Some(path) = candidates.into_iter().flatten().find(|p| p.exists()) {
            tracing::debug!(path = %path.display(), "Loading config file");
            return Self::from_file_with(&path, lookup);
        }

        let mut config = Self::new("", "");
        config.apply_env_overrides(lookup)?;
        Ok(config)
    }

    /// Overlay environment values, read through `lookup`.
    ///
    /// # Errors
    /// [`CortexError::ConfigError`] for an unparseable `CORTEX_DEBIT`.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> CortexResult<()> {
        if let Some(url) = lookup("CORTEX_URL") {
            self.cortex_url = url;
        }
        if let Some(id) = lookup("CORTEX_CLIENT_ID") {
            self.client_id = id;
        }
        if let Some(secret) = lookup("CORTEX_CLIENT_SECRET") {
            self.client_secret = secret;
        }
        if let Some(license) = lookup("CORTEX_LICENSE") {
            self.license = Some(license);
        }
        if let Some(debit) = lookup("CORTEX_DEBIT") {
            let debit = debit.trim().parse().map_err(|_| CortexError::ConfigError {
                reason: format!("CORTEX_DEBIT must be a non-negative integer, got '{debit}'"),
            })?;
            self.debit = Some(debit);
        }
        if let Some(profile) = lookup("CORTEX_PROFILE") {
            self.profile = Some(profile);
        }
        if let Some(headset) = lookup("CORTEX_HEADSET_ID") {
            self.headset_id = Some(headset);
        }
        if let Some(reject) = lookup("CORTEX_TLS_REJECT_UNAUTHORIZED") {
            match reject.trim().to_ascii_lowercase().as_str() {
                "0" | "false" => self.tls.accept_invalid_certs = Some(true),
                "1" | "true" => self.tls.accept_invalid_certs = Some(false),
                other => tracing::warn!(value = other, "Ignoring CORTEX_TLS_REJECT_UNAUTHORIZED"),
            }
        }
        Ok(())
    }

    /// Whether both credentials are present.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }

    /// Returns `true` if the TLS layer should skip certificate validation.
    ///
    /// Follows `tls.accept_invalid_certs` when set; otherwise only localhost
    /// URLs (where the Cortex service uses a self-signed cert) are trusted.
    #[must_use]
    pub fn should_accept_invalid_certs(&self) -> bool {
        self.tls
            .accept_invalid_certs
            .unwrap_or_else(|| is_localhost(&self.cortex_url))
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────

/// Check if a WebSocket URL points to localhost.
fn is_localhost(url: &str) -> bool {
    let authority = url
        .strip_prefix("wss://")
        .or_else(|| url.strip_prefix("ws://"))
        .unwrap_or(url);
    let authority = authority.split('/').next().unwrap_or(authority);

    // IPv6 bracket notation: [::1]:6868
    if let Some(rest) = authority.strip_prefix('[') {
        let host = rest.split(']').next().unwrap_or("");
        return host == "::1";
    }

    let host = authority
        .rfind(':')
        .map_or(authority, |idx| &authority[..idx]);
    matches!(host, "localhost" | "127.0.0.1")
}

/// Platform-appropriate per-user config file.
#[cfg(feature = "config-toml")]
fn user_config_path(lookup: &impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        lookup("APPDATA").map(|dir| PathBuf::from(dir).join("cortex-bridge").join(CONFIG_FILE_NAME))
    }
    #[cfg(not(target_os = "windows"))]
    {
        lookup("HOME").map(|dir| {
            PathBuf::from(dir)
                .join(".config")
                .join("cortex-bridge")
                .join(CONFIG_FILE_NAME)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn unique_temp_dir(label: &str) -> PathBuf {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "cortex-bridge-config-tests-{}-{}-{}",
            label,
            std::process::id(),
            now
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_minimal_config(path: &Path, id: &str) {
        fs::write(
            path,
            format!("client_id = \"{id}\"\nclient_secret = \"{id}-secret\"\n"),
        )
        .unwrap();
    }

    #[test]
    fn test_new_defaults() {
        let config = CortexConfig::new("id", "secret");
        assert_eq!(config.cortex_url, DEFAULT_CORTEX_URL);
        assert!(config.has_credentials());
        assert_eq!(config.timeouts.connect_timeout_secs, 5);
        assert_eq!(config.timeouts.rpc_timeout_secs, 10);
        assert_eq!(config.timeouts.headset_connect_timeout_secs, 30);
        assert_eq!(config.retry.session_policy(), RetryPolicy::session());
        assert_eq!(config.retry.subscribe_policy(), RetryPolicy::subscribe());
        assert_eq!(config.device.max_attempts, 10);
        assert_eq!(config.device.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.streams.holder_ttl(), Duration::from_secs(90));
        assert_eq!(config.streams.prune_interval(), Duration::from_secs(15));
    }

    #[test]
    fn test_is_localhost() {
        assert!(is_localhost("wss://localhost:6868"));
        assert!(is_localhost("wss://127.0.0.1:6868"));
        assert!(is_localhost("ws://localhost:6868/path"));
        assert!(is_localhost("wss://[::1]:6868"));
        assert!(!is_localhost("wss://example.com:6868"));
        assert!(!is_localhost("wss://192.168.1.100:6868"));
    }

    #[test]
    fn test_should_accept_invalid_certs() {
        let mut config = CortexConfig::new("id", "secret");
        assert!(config.should_accept_invalid_certs());

        config.cortex_url = "wss://remote.example.com:6868".into();
        assert!(!config.should_accept_invalid_certs());

        config.tls.accept_invalid_certs = Some(true);
        assert!(config.should_accept_invalid_certs());

        config.cortex_url = DEFAULT_CORTEX_URL.into();
        config.tls.accept_invalid_certs = Some(false);
        assert!(!config.should_accept_invalid_certs());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = CortexConfig::new("", "");
        assert!(!config.has_credentials());

        config
            .apply_env_overrides(env(&[
                ("CORTEX_URL", "wss://remote:6868"),
                ("CORTEX_CLIENT_ID", "env-id"),
                ("CORTEX_CLIENT_SECRET", "env-secret"),
                ("CORTEX_LICENSE", "LIC"),
                ("CORTEX_DEBIT", "3"),
                ("CORTEX_PROFILE", "alice"),
                ("CORTEX_HEADSET_ID", "INSIGHT-1"),
                ("CORTEX_TLS_REJECT_UNAUTHORIZED", "false"),
            ]))
            .unwrap();

        assert_eq!(config.cortex_url, "wss://remote:6868");
        assert!(config.has_credentials());
        assert_eq!(config.license.as_deref(), Some("LIC"));
        assert_eq!(config.debit, Some(3));
        assert_eq!(config.profile.as_deref(), Some("alice"));
        assert_eq!(config.headset_id.as_deref(), Some("INSIGHT-1"));
        assert!(config.should_accept_invalid_certs());
    }

    #[test]
    fn test_env_bad_debit_is_config_error() {
        let mut config = CortexConfig::new("", "");
        let err = config
            .apply_env_overrides(env(&[("CORTEX_DEBIT", "lots")]))
            .unwrap_err();
        assert!(matches!(err, CortexError::ConfigError { .. }));
        assert!(err.to_string().contains("CORTEX_DEBIT"));
    }

    #[cfg(feature = "config-toml")]
    #[test]
    fn test_deserialize_toml() {
        let toml_str = r#"
            client_id = "test-id"
            client_secret = "test-secret"
            cortex_url = "wss://localhost:9999"
            license = "ABCD-1234"
            debit = 2

            [timeouts]
            rpc_timeout_secs = 30

            [retry]
            session_max_attempts = 3

            [device]
            poll_interval_ms = 250

            [streams]
            holder_ttl_secs = 45
        "#;

        let config: CortexConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.client_id, "test-id");
        assert_eq!(config.cortex_url, "wss://localhost:9999");
        assert_eq!(config.license.as_deref(), Some("ABCD-1234"));
        assert_eq!(config.debit, Some(2));
        assert_eq!(config.timeouts.rpc_timeout_secs, 30);
        assert_eq!(config.timeouts.connect_timeout_secs, 5);
        assert_eq!(config.retry.session_max_attempts, 3);
        assert_eq!(config.retry.session_delay_ms, 1000);
        assert_eq!(config.device.poll_interval_ms, 250);
        assert_eq!(config.streams.holder_ttl_secs, 45);
        assert_eq!(config.streams.prune_interval_secs, 15);
    }

    #[cfg(feature = "config-toml")]
    #[test]
    fn test_from_file_env_overrides_precedence() {
        let dir = unique_temp_dir("from-file-overrides");
        let config_path = dir.join(CONFIG_FILE_NAME);
        write_minimal_config(&config_path, "file-id");

        let config = CortexConfig::from_file_with(
            &config_path,
            env(&[("CORTEX_CLIENT_ID", "env-id"), ("CORTEX_URL", "wss://env:1")]),
        )
        .unwrap();
        assert_eq!(config.client_id, "env-id");
        assert_eq!(config.client_secret, "file-id-secret");
        assert_eq!(config.cortex_url, "wss://env:1");

        fs::remove_dir_all(dir).unwrap();
    }

    #[cfg(feature = "config-toml")]
    #[test]
    fn test_discover_search_priority() {
        let root = unique_temp_dir("discover-priority");
        let cwd = root.join("cwd");
        let home = root.join("home");
        let home_config = home.join(".config").join("cortex-bridge").join(CONFIG_FILE_NAME);
        fs::create_dir_all(&cwd).unwrap();
        fs::create_dir_all(home_config.parent().unwrap()).unwrap();

        let explicit_path = root.join("explicit.toml");
        let env_path = root.join("env.toml");
        write_minimal_config(&explicit_path, "explicit-id");
        write_minimal_config(&env_path, "env-file-id");
        write_minimal_config(&cwd.join(CONFIG_FILE_NAME), "local-id");
        write_minimal_config(&home_config, "home-id");

        let home_str = home.to_string_lossy().to_string();
        let env_str = env_path.to_string_lossy().to_string();
        let with_pointer = [(CONFIG_PATH_ENV, env_str.as_str()), ("HOME", home_str.as_str())];
        let without_pointer = [("HOME", home_str.as_str())];

        let explicit =
            CortexConfig::discover_with(Some(&explicit_path), &cwd, env(&with_pointer)).unwrap();
        assert_eq!(explicit.client_id, "explicit-id");

        let via_pointer = CortexConfig::discover_with(None, &cwd, env(&with_pointer)).unwrap();
        assert_eq!(via_pointer.client_id, "env-file-id");

        let via_local = CortexConfig::discover_with(None, &cwd, env(&without_pointer)).unwrap();
        assert_eq!(via_local.client_id, "local-id");

        fs::remove_file(cwd.join(CONFIG_FILE_NAME)).unwrap();
        let via_home = CortexConfig::discover_with(None, &cwd, env(&without_pointer)).unwrap();
        assert_eq!(via_home.client_id, "home-id");

        fs::remove_file(&home_config).unwrap();
        let env_only = CortexConfig::discover_with(
            None,
            &cwd,
            env(&[("HOME", home_str.as_str()), ("CORTEX_CLIENT_ID", "fallback-id")]),
        )
        .unwrap();
        assert_eq!(env_only.client_id, "fallback-id");
        assert_eq!(env_only.cortex_url, DEFAULT_CORTEX_URL);

        fs::remove_dir_all(root).unwrap();
    }

    #[cfg(feature = "config-toml")]
    #[test]
    fn test_from_file_missing_and_invalid_errors() {
        let dir = unique_temp_dir("from-file-errors");

        let missing = CortexConfig::from_file(dir.join("missing.toml")).unwrap_err();
        assert!(matches!(missing, CortexError::ConfigError { .. }));
        assert!(missing.to_string().contains("Failed to read config file"));

        let invalid_path = dir.join("invalid.toml");
        fs::write(&invalid_path, "client_id = [").unwrap();
        let invalid = CortexConfig::from_file(&invalid_path).unwrap_err();
        assert!(matches!(invalid, CortexError::ConfigError { .. }));

        fs::remove_dir_all(dir).unwrap();
    }
}
