//! Sidecar configuration and user-level settings.
//!
//! Two layers are involved:
//! - The **sidecar** record (`.archive_config.json`) lives in the directory
//!   being archived and holds the bucket and the retention threshold.
//! - The **user settings** file (TOML) supplies defaults for newly created
//!   sidecars and the ignore patterns applied while scanning.
//!
//! # Sidecar Format
//!
//! ```json
//! {
//!   "bucket": "px-archive.3f9a0c1b2d4e.downloads",
//!   "days": 60
//! }
//! ```
//!
//! # Settings Format
//!
//! ```toml
//! [defaults]
//! days = 60
//! bucket_prefix = "px-archive"
//!
//! [scan]
//! ignore = ["*.lock", "node_modules"]
//! ```

use crate::error::{ArchiverError, ArchiverResult};
use crate::stager::STAGING_DIR_NAME;
use glob::Pattern;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the sidecar record inside the working root.
pub const CONFIG_FILE_NAME: &str = ".archive_config.json";

/// Retention threshold used when nothing else specifies one.
pub const DEFAULT_DAYS: u32 = 60;

/// Prefix of generated bucket names.
pub const DEFAULT_BUCKET_PREFIX: &str = "px-archive";

const MAX_BUCKET_NAME_LEN: usize = 63;

/// The per-directory archive configuration.
///
/// Fields other than `bucket` and `days` are kept in `extra` and written
/// back untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchiveConfig {
    /// Remote bucket receiving uploads.
    pub bucket: String,
    /// Minimum number of idle days before an entry is archived.
    pub days: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// How [`ArchiveConfig::load_or_create`] obtained its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOrigin {
    /// Read verbatim from an existing sidecar.
    Loaded,
    /// Read from an existing sidecar, with missing fields filled in and saved.
    Completed,
    /// No sidecar existed; a new one was written.
    Created,
}

/// Values used to fill in a sidecar that is missing or incomplete.
#[derive(Debug, Clone)]
pub struct ConfigDefaults {
    pub days: u32,
    pub bucket_prefix: String,
    /// Pre-supplied bucket, used instead of a generated one.
    pub bucket: Option<String>,
}

impl Default for ConfigDefaults {
    fn default() -> Self {
        Self {
            days: DEFAULT_DAYS,
            bucket_prefix: DEFAULT_BUCKET_PREFIX.to_string(),
            bucket: None,
        }
    }
}

impl ConfigDefaults {
    fn bucket_for(&self, root: &Path) -> String {
        match &self.bucket {
            Some(bucket) => bucket.clone(),
            None => generate_bucket_name(&self.bucket_prefix, root),
        }
    }
}

impl ArchiveConfig {
    /// Returns the sidecar path for a working root.
    pub fn path_for(root: &Path) -> PathBuf {
        root.join(CONFIG_FILE_NAME)
    }

    /// Loads the sidecar record at `root`, or `None` when there is none.
    ///
    /// Fields that are absent come back as `None` in the [`PartialConfig`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationCorrupt` if the record is not a JSON object or a
    /// field has the wrong type.
    pub fn load(root: &Path) -> ArchiverResult<Option<PartialConfig>> {
        let path = Self::path_for(root);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(|e| ArchiverError::fs(&path, e))?;
        let corrupt = |reason: String| ArchiverError::ConfigurationCorrupt {
            path: path.clone(),
            reason,
        };

        let value: Value = serde_json::from_str(&content).map_err(|e| corrupt(e.to_string()))?;
        let Value::Object(mut fields) = value else {
            return Err(corrupt("expected a JSON object".to_string()));
        };

        let bucket = match fields.remove("bucket") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(other) => return Err(corrupt(format!("'bucket' must be a string, got {other}"))),
        };
        let days = match fields.remove("days") {
            None | Some(Value::Null) => None,
            Some(v) => Some(coerce_days(&v).map_err(corrupt)?),
        };

        Ok(Some(PartialConfig {
            bucket,
            days,
            extra: fields,
        }))
    }

    /// Loads the sidecar at `root`, creating or completing it from `defaults`.
    ///
    /// An existing record is honored verbatim; it is only rewritten when a
    /// recognized field is absent.
    pub fn load_or_create(
        root: &Path,
        defaults: &ConfigDefaults,
    ) -> ArchiverResult<(Self, ConfigOrigin)> {
        match Self::load(root)? {
            Some(partial) => {
                let complete = partial.is_complete();
                let config = Self {
                    bucket: partial.bucket.unwrap_or_else(|| defaults.bucket_for(root)),
                    days: partial.days.unwrap_or(defaults.days),
                    extra: partial.extra,
                };
                if complete {
                    debug!(bucket = %config.bucket, days = config.days, "loaded sidecar configuration");
                    Ok((config, ConfigOrigin::Loaded))
                } else {
                    config.save(root)?;
                    info!(path = %Self::path_for(root).display(), "filled missing configuration fields");
                    Ok((config, ConfigOrigin::Completed))
                }
            }
            None => {
                let config = Self {
                    bucket: defaults.bucket_for(root),
                    days: defaults.days,
                    extra: Map::new(),
                };
                config.save(root)?;
                info!(path = %Self::path_for(root).display(), "created sidecar configuration");
                Ok((config, ConfigOrigin::Created))
            }
        }
    }

    /// Writes the record as pretty-printed JSON.
    pub fn save(&self, root: &Path) -> ArchiverResult<()> {
        let path = Self::path_for(root);
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            ArchiverError::fs(
                &path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()),
            )
        })?;
        fs::write(&path, json + "\n").map_err(|e| ArchiverError::fs(&path, e))
    }
}

/// A sidecar record as read from disk, before defaults are applied.
#[derive(Debug, Clone)]
pub struct PartialConfig {
    pub bucket: Option<String>,
    pub days: Option<u32>,
    pub extra: Map<String, Value>,
}

impl PartialConfig {
    fn is_complete(&self) -> bool {
        self.bucket.is_some() && self.days.is_some()
    }
}

/// Accepts an integer or a numeric string; zero is rejected.
fn coerce_days(value: &Value) -> Result<u32, String> {
    let parsed = match value {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| format!("'days' must be a positive integer, got {n}"))?,
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| format!("'days' must be a positive integer, got \"{s}\""))?,
        other => return Err(format!("'days' must be a positive integer, got {other}")),
    };
    if parsed == 0 {
        return Err("'days' must be at least 1".to_string());
    }
    u32::try_from(parsed).map_err(|_| format!("'days' is too large: {parsed}"))
}

/// Builds a bucket name of the form `<prefix>.<id>.<directory>`.
///
/// The result only contains characters valid in S3 bucket names and is at
/// most 63 characters long.
pub fn generate_bucket_name(prefix: &str, root: &Path) -> String {
    let unique = uuid::Uuid::new_v4().simple().to_string();
    let dir_name = root
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        .unwrap_or_default();

    let dir_part = sanitize_bucket_name(&dir_name);
    let raw = if dir_part.is_empty() {
        format!("{}.{}", prefix, &unique[..12])
    } else {
        format!("{}.{}.{}", prefix, &unique[..12], dir_part)
    };
    sanitize_bucket_name(&raw)
}

fn sanitize_bucket_name(raw: &str) -> String {
    let mut name: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    while name.contains("..") {
        name = name.replace("..", ".");
    }
    name.truncate(MAX_BUCKET_NAME_LEN);
    name.trim_matches(|c| c == '.' || c == '-').to_string()
}

/// User-level settings loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default)]
    pub defaults: DefaultSettings,
    #[serde(default)]
    pub scan: ScanSettings,
}

/// Values seeding a newly created sidecar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultSettings {
    #[serde(default = "default_days")]
    pub days: u32,
    #[serde(default = "default_bucket_prefix")]
    pub bucket_prefix: String,
}

fn default_days() -> u32 {
    DEFAULT_DAYS
}

fn default_bucket_prefix() -> String {
    DEFAULT_BUCKET_PREFIX.to_string()
}

impl Default for DefaultSettings {
    fn default() -> Self {
        Self {
            days: default_days(),
            bucket_prefix: default_bucket_prefix(),
        }
    }
}

/// Scan-time rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Glob patterns matched against top-level entry names.
    #[serde(default)]
    pub ignore: Vec<String>,
}

impl UserSettings {
    /// Load settings, with fallback to defaults.
    ///
    /// Attempts to load settings in the following order:
    /// 1. If `settings_path` is provided, load from that file
    /// 2. Look for `cloud-archiver/config.toml` in the user config directory
    /// 3. Fall back to default settings
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file is explicitly provided but cannot be
    /// read, or if any settings file that is found fails to parse.
    pub fn load(settings_path: Option<&Path>) -> ArchiverResult<Self> {
        if let Some(path) = settings_path {
            return Self::load_from_file(path);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_settings = config_dir.join("cloud-archiver").join("config.toml");
            if user_settings.exists() {
                return Self::load_from_file(&user_settings);
            }
        }

        Ok(Self::default())
    }

    fn load_from_file(path: &Path) -> ArchiverResult<Self> {
        let invalid = |reason: String| ArchiverError::SettingsInvalid {
            path: path.to_path_buf(),
            reason,
        };

        if !path.exists() {
            return Err(invalid("file not found".to_string()));
        }

        let content = fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        let settings: Self = toml::from_str(&content).map_err(|e| invalid(e.to_string()))?;
        if settings.defaults.days == 0 {
            return Err(invalid("defaults.days must be at least 1".to_string()));
        }
        debug!(path = %path.display(), "loaded user settings");
        Ok(settings)
    }

    /// Defaults for a new sidecar, optionally with a pre-supplied bucket.
    pub fn config_defaults(&self, bucket: Option<String>) -> ConfigDefaults {
        ConfigDefaults {
            days: self.defaults.days,
            bucket_prefix: self.defaults.bucket_prefix.clone(),
            bucket,
        }
    }

    /// Compile the ignore patterns for use by the scanner.
    ///
    /// # Errors
    ///
    /// Returns `SettingsInvalid` naming the first pattern that fails to parse.
    pub fn ignore_rules(&self) -> ArchiverResult<IgnoreRules> {
        let patterns = self
            .scan
            .ignore
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|e| ArchiverError::SettingsInvalid {
                    path: PathBuf::from("[scan].ignore"),
                    reason: format!("invalid glob pattern '{}': {}", pattern, e.msg),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(IgnoreRules { patterns })
    }
}

/// Names the scanner never treats as candidates.
///
/// The staging directory and the sidecar are always ignored; user patterns
/// add to that list.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    patterns: Vec<Pattern>,
}

impl IgnoreRules {
    pub fn is_ignored(&self, name: &str) -> bool {
        if name == STAGING_DIR_NAME || name == CONFIG_FILE_NAME {
            return true;
        }
        self.patterns.iter().any(|pattern| pattern.matches(name))
    }
}
