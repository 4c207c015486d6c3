//! Configuration types
//!
//! `OperationConfig` and `TransportConfig` are built once per invocation and
//! never mutated afterwards. Profiles are read from a TOML file so the tool
//! can be pointed at different endpoints without repeating flags.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default number of concurrent leaf actions
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Default delimiter for the virtual hierarchy
pub const DEFAULT_DELIMITER: &str = "/";

/// Token bucket capacity used whenever a bandwidth limit is configured
pub const DEFAULT_BURST_BYTES: u64 = 64 * 1024;

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "S3TREE_CONFIG_DIR";

const CONFIG_FILE_NAME: &str = "config.toml";

/// Settings for one top-level recursive operation.
///
/// Threaded unchanged through every level of the walk; only the traversal
/// prefix narrows as the walk descends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationConfig {
    pub bucket: String,
    pub delimiter: String,
    pub concurrency: usize,
    pub dry_run: bool,
    pub force: bool,
    pub bypass_governance: bool,
    pub version_id: Option<String>,
}

impl OperationConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Default::default()
        }
    }

    /// Reject values that can never work, before any network call
    pub fn validate(&self) -> Result<()> {
        if self.bucket.is_empty() {
            return Err(Error::Config("missing bucket name".to_string()));
        }
        if self.concurrency < 1 {
            return Err(Error::Config(format!(
                "concurrency must be at least 1, got {}",
                self.concurrency
            )));
        }
        Ok(())
    }
}

impl Default for OperationConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            delimiter: DEFAULT_DELIMITER.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            dry_run: false,
            force: false,
            bypass_governance: false,
            version_id: None,
        }
    }
}

/// Bandwidth limit in bytes per second with a fixed burst capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub bytes_per_second: u64,
    pub burst_bytes: u64,
}

impl RateLimit {
    /// A limit with the default burst; `None` when the rate is zero
    pub fn per_second(bytes_per_second: u64) -> Option<Self> {
        (bytes_per_second > 0).then_some(Self {
            bytes_per_second,
            burst_bytes: DEFAULT_BURST_BYTES,
        })
    }
}

/// Transport behaviour applied to every request of one client.
///
/// Maps are ordered so header and parameter application is stable across
/// calls, which keeps request signatures reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportConfig {
    pub read_only: bool,
    pub rate_limit: Option<RateLimit>,
    pub headers: BTreeMap<String, String>,
    pub query_params: BTreeMap<String, String>,
}

/// Retry policy for transient listing failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Seed for the backoff jitter generator. Fixed by default; the binary
    /// draws a fresh one for every invocation.
    pub seed: u64,
}

impl RetryConfig {
    /// Single attempt, no retries
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10_000,
            seed: 0x9E37_79B9_7F4A_7C15,
        }
    }
}

/// Connection profile as stored in the configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Profile {
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub path_style: bool,
    pub read_only: bool,
    /// Human readable bandwidth limit, e.g. "1 MiB"
    pub bandwidth: String,
    pub headers: BTreeMap<String, String>,
    pub params: BTreeMap<String, String>,
}

impl Profile {
    /// Overlay every non-empty field of `other` onto this profile
    pub fn apply_overrides(&mut self, other: &Profile) {
        fn set_if_not_empty(target: &mut String, value: &str) {
            if !value.is_empty() {
                *target = value.to_string();
            }
        }

        set_if_not_empty(&mut self.endpoint, &other.endpoint);
        set_if_not_empty(&mut self.region, &other.region);
        set_if_not_empty(&mut self.access_key, &other.access_key);
        set_if_not_empty(&mut self.secret_key, &other.secret_key);
        set_if_not_empty(&mut self.bandwidth, &other.bandwidth);
        self.path_style |= other.path_style;
        self.read_only |= other.read_only;
        self.headers
            .extend(other.headers.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.params
            .extend(other.params.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Parsed endpoint URL; `None` when the SDK default endpoint should be used
    pub fn endpoint_url(&self) -> Result<Option<url::Url>> {
        if self.endpoint.trim().is_empty() {
            return Ok(None);
        }
        let url = url::Url::parse(self.endpoint.trim())
            .map_err(|e| Error::Config(format!("invalid endpoint '{}': {e}", self.endpoint)))?;
        match url.scheme() {
            "http" | "https" => Ok(Some(url)),
            other => Err(Error::Config(format!(
                "unsupported endpoint scheme '{other}', expected http or https"
            ))),
        }
    }

    /// Build the transport configuration for this profile.
    ///
    /// Dry-run forces read-only so a bug in a simulated path can never reach
    /// the store with a mutating request.
    pub fn transport_config(&self, dry_run: bool) -> Result<TransportConfig> {
        let rate_limit = if self.bandwidth.trim().is_empty() {
            None
        } else {
            let bytes = parse_size(&self.bandwidth).map_err(Error::Config)?;
            RateLimit::per_second(bytes)
        };

        Ok(TransportConfig {
            read_only: self.read_only || dry_run,
            rate_limit,
            headers: self.headers.clone(),
            query_params: self.params.clone(),
        })
    }
}

/// Contents of the configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub profiles: BTreeMap<String, Profile>,
}

impl ConfigFile {
    /// Profile names in sorted order
    pub fn profile_names(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }

    /// Look up a profile. The `default` profile may be absent.
    pub fn profile(&self, name: &str) -> Result<Profile> {
        match self.profiles.get(name) {
            Some(p) => Ok(p.clone()),
            None if name == "default" => Ok(Profile::default()),
            None => Err(Error::Config(format!(
                "profile '{name}' not found, available profiles: {}",
                self.profile_names().join(", ")
            ))),
        }
    }
}

/// Loads the configuration file from an explicit or default location
#[derive(Debug, Clone)]
pub struct ConfigManager {
    path: PathBuf,
    explicit: bool,
}

impl ConfigManager {
    /// Use the default location (`$S3TREE_CONFIG_DIR` or the user config dir)
    pub fn new() -> Result<Self> {
        let dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .ok_or_else(|| Error::Config("cannot determine config directory".into()))?
                .join("s3tree"),
        };
        Ok(Self {
            path: dir.join(CONFIG_FILE_NAME),
            explicit: false,
        })
    }

    /// Use an explicit file; a missing file is an error
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            explicit: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the file. A missing default file yields an empty config.
    pub fn load(&self) -> Result<ConfigFile> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !self.explicit => {
                tracing::debug!(path = %self.path.display(), "No config file, using defaults");
                Ok(ConfigFile::default())
            }
            Err(e) => Err(Error::Io(e)),
        }
    }
}

/// Parse a human readable byte size such as `"64KiB"`, `"1 MiB"` or `"500"`.
///
/// Both decimal (`KB`) and binary (`KiB`) suffixes are accepted; all are
/// interpreted as powers of 1024 except the explicit decimal forms.
pub fn parse_size(s: &str) -> std::result::Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }

    let suffix_start = s
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(s.len());

    let num_str = s[..suffix_start].trim();
    let suffix = s[suffix_start..].trim();

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid size number: {num_str}"))?;
    if num < 0.0 || !num.is_finite() {
        return Err(format!("Invalid size number: {num_str}"));
    }

    let multiplier: u64 = match suffix.to_uppercase().as_str() {
        "" | "B" => 1,
        "K" | "KIB" => 1024,
        "KB" => 1000,
        "M" | "MIB" => 1024 * 1024,
        "MB" => 1000 * 1000,
        "G" | "GIB" => 1024 * 1024 * 1024,
        "GB" => 1000 * 1000 * 1000,
        _ => return Err(format!("Unknown size suffix: {suffix}")),
    };

    Ok((num * multiplier as f64) as u64)
}

/// Parse `key=value` pairs, as given on the command line
pub fn parse_key_value(s: &str) -> std::result::Result<(String, String), String> {
    let (k, v) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    if k.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((k.to_string(), v.to_string()))
}
