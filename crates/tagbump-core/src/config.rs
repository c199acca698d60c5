//! Configuration loading and discovery.
//!
//! This module provides configuration file discovery by:
//! 1. Walking up from the current directory to find project config
//! 2. Loading user config from XDG config directory
//! 3. Layering CI step inputs (`INPUT_*` environment variables) on top
//! 4. Merging with sensible defaults
//!
//! # Supported formats
//!
//! The following configuration file formats are supported:
//! - TOML (`.toml`)
//! - YAML (`.yaml`, `.yml`)
//! - JSON (`.json`)
//!
//! # Config sources (in order of precedence, highest first):
//! - `INPUT_<NAME>` environment variables (e.g. `INPUT_TAG-PREFIX`)
//! - explicit files added with [`ConfigLoader::with_file`]
//! - `.tagbump.<ext>` in current directory or any parent
//! - `tagbump.<ext>` in current directory or any parent
//! - `~/.config/tagbump/config.<ext>` (user config)
//!
//! Where `<ext>` is one of: `toml`, `yaml`, `yml`, `json`
//!
//! # Example
//! ```no_run
//! use camino::Utf8PathBuf;
//! use tagbump_core::config::{Config, ConfigLoader};
//!
//! let cwd = std::env::current_dir().unwrap();
//! let cwd = Utf8PathBuf::try_from(cwd).expect("current directory is not valid UTF-8");
//! let config = ConfigLoader::new()
//!     .with_project_search(&cwd)
//!     .load()
//!     .unwrap();
//! ```

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use figment::Figment;
use figment::providers::{Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Deserializer, Serialize};

use crate::classify::{BumpScope, KeywordPolicy, ReleaseAction};
use crate::error::{ConfigError, ConfigResult};
use crate::guard::DEFAULT_COMMIT_MESSAGE;
use crate::version::BumpLevel;

/// Default committer name for bump commits.
pub const DEFAULT_COMMITTER_NAME: &str = "Automated Version Bump";

/// Default committer email for bump commits.
pub const DEFAULT_COMMITTER_EMAIL: &str = "gh-action-bump-version@users.noreply.github.com";

/// The configuration for tagbump.
///
/// Keys match the CI step inputs with `-` replaced by `_`, so
/// `INPUT_TAG-PREFIX` and `tag_prefix = "v"` set the same value.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Log level for the application (e.g., "debug", "info", "warn", "error").
    pub log_level: LogLevel,
    /// Directory for JSONL log files (falls back to platform defaults if unset).
    pub log_dir: Option<Utf8PathBuf>,
    /// Release type that bypasses keyword classification.
    #[serde(deserialize_with = "opt_from_str")]
    pub version_type: Option<ReleaseAction>,
    /// Prefix for tags and versions in commit messages (e.g. `v`).
    #[serde(deserialize_with = "text")]
    pub tag_prefix: String,
    /// Bump commit message; `{{version}}` is replaced by the tag.
    #[serde(deserialize_with = "string_or_default_message")]
    pub commit_message: String,
    /// Which commits are scanned for a previous bump.
    #[serde(deserialize_with = "from_str_or_default")]
    pub bump_policy: BumpScope,
    /// Which commits are scanned for release keywords.
    #[serde(deserialize_with = "from_str_or_default")]
    pub keyword_scope: BumpScope,
    /// Phrases that request a custom version.
    pub set_custom_version_wording: Keywords,
    /// Phrases that request a major bump.
    pub major_wording: Keywords,
    /// Phrases that request a minor bump.
    pub minor_wording: Keywords,
    /// Phrases that request a patch bump (none by default).
    pub patch_wording: Option<Keywords>,
    /// Bump applied when no keyword matches (default: skip).
    #[serde(deserialize_with = "opt_from_str")]
    pub default_bump: Option<BumpLevel>,
    /// Branch to push to instead of the one derived from the event.
    #[serde(deserialize_with = "opt_non_empty")]
    pub target_branch: Option<String>,
    /// Do not create the bump commit.
    #[serde(deserialize_with = "flag")]
    pub skip_commit: bool,
    /// Do not create the tag.
    #[serde(deserialize_with = "flag")]
    pub skip_tag: bool,
    /// Do not push.
    #[serde(deserialize_with = "flag")]
    pub skip_push: bool,
    /// Committer name for the bump commit.
    #[serde(deserialize_with = "opt_non_empty")]
    pub committer_name: Option<String>,
    /// Committer email for the bump commit.
    #[serde(deserialize_with = "opt_non_empty")]
    pub committer_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let policy = KeywordPolicy::default();
        Self {
            log_level: LogLevel::default(),
            log_dir: None,
            version_type: None,
            tag_prefix: String::new(),
            commit_message: DEFAULT_COMMIT_MESSAGE.to_string(),
            bump_policy: BumpScope::All,
            keyword_scope: BumpScope::All,
            set_custom_version_wording: Keywords(policy.custom),
            major_wording: Keywords(policy.major),
            minor_wording: Keywords(policy.minor),
            patch_wording: None,
            default_bump: None,
            target_branch: None,
            skip_commit: false,
            skip_tag: false,
            skip_push: false,
            committer_name: None,
            committer_email: None,
        }
    }
}

impl Config {
    /// Keyword policy assembled from the wording settings.
    pub fn keyword_policy(&self) -> KeywordPolicy {
        KeywordPolicy {
            custom: self.set_custom_version_wording.0.clone(),
            major: self.major_wording.0.clone(),
            minor: self.minor_wording.0.clone(),
            patch: self
                .patch_wording
                .as_ref()
                .map(|k| k.0.clone())
                .filter(|words| !words.is_empty()),
            fallback: self.default_bump,
        }
    }
}

/// A list of trigger phrases.
///
/// Accepts either a list or one comma-separated string, the form CI inputs
/// arrive in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawKeywords")]
pub struct Keywords(pub Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawKeywords {
    List(Vec<Scalar>),
    Csv(Scalar),
}

impl From<RawKeywords> for Keywords {
    fn from(raw: RawKeywords) -> Self {
        let words: Vec<String> = match raw {
            RawKeywords::List(words) => words.into_iter().map(Scalar::into_text).collect(),
            RawKeywords::Csv(text) => text
                .into_text()
                .split(',')
                .map(String::from)
                .collect(),
        };
        Self(words.into_iter().filter(|w| !w.is_empty()).collect())
    }
}

/// Log level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose output for debugging and development.
    Debug,
    /// Standard operational information (default).
    #[default]
    Info,
    /// Warnings about potential issues.
    Warn,
    /// Errors that indicate failures.
    Error,
}

impl LogLevel {
    /// Returns the log level as a lowercase string slice.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

// CI runners pass every declared input, unset ones as empty strings, and
// booleans as "true"/"false" text. These helpers treat "" as unset.

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Text(s) => s.trim().to_string(),
        }
    }
}

fn text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<Scalar>::deserialize(d)?
        .map(Scalar::into_text)
        .unwrap_or_default())
}

fn opt_non_empty<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Scalar>::deserialize(d)?
        .map(Scalar::into_text)
        .filter(|s| !s.is_empty()))
}

fn opt_from_str<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    opt_non_empty(d)?
        .map(|s| s.parse().map_err(serde::de::Error::custom))
        .transpose()
}

fn from_str_or_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Default,
    T::Err: Display,
{
    Ok(opt_from_str(d)?.unwrap_or_default())
}

fn string_or_default_message<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(opt_non_empty(d)?.unwrap_or_else(|| DEFAULT_COMMIT_MESSAGE.to_string()))
}

fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    match Option::<Scalar>::deserialize(d)? {
        None => Ok(false),
        Some(Scalar::Bool(b)) => Ok(b),
        Some(other) => match other.into_text().to_ascii_lowercase().as_str() {
            "" | "false" | "0" | "no" => Ok(false),
            "true" | "1" | "yes" => Ok(true),
            text => Err(serde::de::Error::custom(format!(
                "expected a boolean, found `{text}`"
            ))),
        },
    }
}

/// Supported configuration file extensions (in order of preference).
const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// Application name for XDG directory lookup and config file names.
const APP_NAME: &str = "tagbump";

/// Prefix of CI step inputs in the environment.
const INPUT_ENV_PREFIX: &str = "INPUT_";

/// Builder for loading configuration from multiple sources.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Starting directory for project config search.
    project_search_root: Option<Utf8PathBuf>,
    /// Whether to include user config from XDG directory.
    include_user_config: bool,
    /// Whether to layer `INPUT_*` environment variables on top.
    include_env_inputs: bool,
    /// Stop searching when we hit a directory containing this file/dir.
    boundary_marker: Option<String>,
    /// Explicit config files to load (for testing or programmatic use).
    explicit_files: Vec<Utf8PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default settings.
    pub fn new() -> Self {
        Self {
            project_search_root: None,
            include_user_config: true,
            include_env_inputs: true,
            boundary_marker: Some(".git".to_string()),
            explicit_files: Vec::new(),
        }
    }

    /// Set the starting directory for project config search.
    ///
    /// The loader will walk up from this directory looking for config files.
    pub fn with_project_search<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.project_search_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set whether to include user config from `~/.config/tagbump/`.
    pub const fn with_user_config(mut self, include: bool) -> Self {
        self.include_user_config = include;
        self
    }

    /// Set whether `INPUT_*` environment variables are read.
    pub const fn with_env_inputs(mut self, include: bool) -> Self {
        self.include_env_inputs = include;
        self
    }

    /// Set a boundary marker to stop directory traversal.
    ///
    /// When walking up directories, stop if we find a directory containing
    /// this file or directory name. Default is `.git`.
    pub fn with_boundary_marker<S: Into<String>>(mut self, marker: S) -> Self {
        self.boundary_marker = Some(marker.into());
        self
    }

    /// Disable boundary marker (search all the way to filesystem root).
    pub fn without_boundary_marker(mut self) -> Self {
        self.boundary_marker = None;
        self
    }

    /// Add an explicit config file to load.
    ///
    /// Files are loaded in order, with later files taking precedence.
    /// Explicit files are loaded after discovered files.
    pub fn with_file<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.explicit_files.push(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration, merging all discovered sources.
    ///
    /// Precedence (highest to lowest):
    /// 1. `INPUT_*` environment variables
    /// 2. Explicit files (in order added via `with_file`)
    /// 3. Project config (closest to search root)
    /// 4. User config (`~/.config/tagbump/config.<ext>`)
    /// 5. Default values
    #[tracing::instrument(skip(self), fields(search_root = ?self.project_search_root))]
    pub fn load(self) -> ConfigResult<Config> {
        tracing::debug!("loading configuration");
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Start with user config (lowest precedence of file sources)
        if self.include_user_config
            && let Some(user_config) = self.find_user_config()
        {
            figment = Self::merge_file(figment, &user_config);
        }

        // Add project config
        if let Some(ref root) = self.project_search_root
            && let Some(project_config) = self.find_project_config(root)
        {
            figment = Self::merge_file(figment, &project_config);
        }

        // Add explicit files
        for file in &self.explicit_files {
            figment = Self::merge_file(figment, file);
        }

        // CI step inputs win over files
        if self.include_env_inputs {
            figment = figment.merge(Serialized::defaults(step_inputs(std::env::vars())));
        }

        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::Deserialize(Box::new(e)))?;
        tracing::info!(
            log_level = config.log_level.as_str(),
            tag_prefix = %config.tag_prefix,
            bump_policy = %config.bump_policy,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Load configuration, returning an error if no config file is found.
    pub fn load_or_error(self) -> ConfigResult<Config> {
        let has_user = self.include_user_config && self.find_user_config().is_some();
        let has_project = self
            .project_search_root
            .as_ref()
            .and_then(|root| self.find_project_config(root))
            .is_some();
        let has_explicit = !self.explicit_files.is_empty();

        if !has_user && !has_project && !has_explicit {
            return Err(ConfigError::NotFound);
        }

        self.load()
    }

    /// Find project config by walking up from the given directory.
    fn find_project_config(&self, start: &Utf8Path) -> Option<Utf8PathBuf> {
        let mut current = Some(start.to_path_buf());

        while let Some(dir) = current {
            // Check for boundary marker
            if let Some(ref marker) = self.boundary_marker {
                let marker_path = dir.join(marker);
                if marker_path.exists() && dir != start {
                    // Found boundary in a parent dir, stop searching
                    break;
                }
            }

            // Check for config files in this directory (try each extension)
            for ext in CONFIG_EXTENSIONS {
                // Try dotfile first (.tagbump.toml)
                let dotfile = dir.join(format!(".{APP_NAME}.{ext}"));
                if dotfile.is_file() {
                    return Some(dotfile);
                }

                // Then try regular name (tagbump.toml)
                let regular = dir.join(format!("{APP_NAME}.{ext}"));
                if regular.is_file() {
                    return Some(regular);
                }
            }

            current = dir.parent().map(Utf8Path::to_path_buf);
        }

        None
    }

    /// Find user config in XDG config directory.
    fn find_user_config(&self) -> Option<Utf8PathBuf> {
        let proj_dirs = project_dirs()?;
        let config_dir = proj_dirs.config_dir();

        // Try each supported extension
        for ext in CONFIG_EXTENSIONS {
            let config_path = config_dir.join(format!("config.{ext}"));
            if config_path.is_file() {
                return Utf8PathBuf::from_path_buf(config_path).ok();
            }
        }

        None
    }

    /// Merge a config file into the figment, detecting format from extension.
    fn merge_file(figment: Figment, path: &Utf8Path) -> Figment {
        match path.extension() {
            Some("toml") => figment.merge(Toml::file_exact(path.as_str())),
            Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path.as_str())),
            Some("json") => figment.merge(Json::file_exact(path.as_str())),
            _ => figment.merge(Toml::file_exact(path.as_str())),
        }
    }
}

/// Find the project config file path without loading it.
///
/// Useful for commands that need to know where config is located.
pub fn find_project_config<P: AsRef<Utf8Path>>(start: P) -> Option<Utf8PathBuf> {
    ConfigLoader::new()
        .with_project_search(start.as_ref())
        .without_boundary_marker()
        .find_project_config(start.as_ref())
}

/// Config keys set by `INPUT_*` variables (`INPUT_TAG-PREFIX` -> `tag_prefix`).
///
/// Values stay text: `INPUT_TAG-PREFIX=1.0` is the prefix `1.0`, not a number.
/// Blank inputs are dropped so they never mask a file value.
fn step_inputs(vars: impl IntoIterator<Item = (String, String)>) -> BTreeMap<String, String> {
    vars.into_iter()
        .filter_map(|(key, value)| {
            let name = key.strip_prefix(INPUT_ENV_PREFIX)?;
            if value.trim().is_empty() {
                return None;
            }
            Some((name.replace('-', "_").to_ascii_lowercase(), value))
        })
        .collect()
}

/// Get the project directories for XDG-compliant path resolution.
///
/// Returns `None` if the home directory cannot be determined.
fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// Get the user config directory path.
///
/// Returns `~/.config/tagbump/` on Linux, `~/Library/Application Support/tagbump/`
/// on macOS, and equivalent on other platforms.
pub fn user_config_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.config_dir().to_path_buf()).ok()
}
