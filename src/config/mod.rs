//! Runner configuration.
//!
//! Settings are layered from lowest to highest precedence: built-in
//! defaults, the global `~/.vibe/config.json`, a project-local `.vibe.yaml`
//! found by walking up from the working directory, the `GITHUB_TOKEN`
//! environment variable, and finally command-line overrides applied by the
//! binary. The global file owns the token; the local file never sets it.
//! `vibe project select` writes the chosen board back to the global file.

use crate::task::adapters::claude::DEFAULT_BINARY;
use crate::task::adapters::github::{DEFAULT_GRAPHQL_URL, ProjectLocator};
use crate::task::domain::StatusNames;
use crate::task::ports::DEFAULT_TIMEOUT;
use crate::task::services::DEFAULT_WATCH_INTERVAL;
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Directory under the home directory holding the global file.
pub const GLOBAL_DIR: &str = ".vibe";
/// Name of the global configuration file.
pub const GLOBAL_FILE: &str = "config.json";
/// Name of the project-local configuration file.
pub const LOCAL_FILE: &str = ".vibe.yaml";
/// Environment variable consulted for the GitHub token.
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

const PROJECT_URL_PATTERN: &str = r"^https://github\.com/(?:users|orgs)/([^/]+)/projects/(\d+)(?:/|$)";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File that failed.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The global JSON file is malformed.
    #[error("invalid JSON in {path}: {source}")]
    Json {
        /// File that failed.
        path: Utf8PathBuf,
        /// Parser error.
        source: serde_json::Error,
    },

    /// The local YAML file is malformed.
    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        /// File that failed.
        path: Utf8PathBuf,
        /// Parser error.
        source: serde_yaml::Error,
    },

    /// The global file could not be written.
    #[error("failed to write {path}: {source}")]
    Write {
        /// File that failed.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The configuration could not be encoded as JSON.
    #[error("failed to encode configuration: {0}")]
    Encode(#[source] serde_json::Error),

    /// No home directory is available for the global file.
    #[error("cannot locate the home directory for ~/{GLOBAL_DIR}/{GLOBAL_FILE}")]
    NoHomeDir,

    /// A path could not be represented as UTF-8.
    #[error("path is not valid UTF-8: {0}")]
    NonUtf8Path(String),

    /// The working directory could not be determined.
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    /// A project URL did not name a user or organisation project.
    #[error("invalid project URL: {0}")]
    InvalidProjectUrl(String),

    /// No token was configured anywhere.
    #[error("github_token is required (set {TOKEN_ENV} or add it to ~/{GLOBAL_DIR}/{GLOBAL_FILE})")]
    MissingToken,

    /// No project owner and number were configured.
    #[error(
        "project is not configured (run `vibe project select <owner> <number>` or set project.url in {LOCAL_FILE})"
    )]
    ProjectNotSelected,

    /// The per-task timeout is zero, so every run would be rejected.
    #[error("executor.timeout_secs must be greater than zero")]
    ZeroTimeout,
}

/// Subprocess settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSettings {
    /// Per-task timeout in seconds.
    pub timeout_secs: u64,
    /// Arguments inserted after `--print`.
    pub extra_args: Vec<String>,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            extra_args: Vec::new(),
        }
    }
}

/// Watch mode settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSettings {
    /// Seconds between polls.
    pub interval_secs: u64,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_WATCH_INTERVAL.as_secs(),
        }
    }
}

/// Effective runner configuration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Token used for every board request.
    pub github_token: String,
    /// User or organisation owning the project.
    pub project_owner: String,
    /// Project number; zero means unset.
    pub project_number: u64,
    /// Path or name of the `claude` binary.
    pub claude_path: String,
    /// GraphQL endpoint.
    pub graphql_url: String,
    /// Board option names for each status.
    pub status_names: StatusNames,
    /// Subprocess settings.
    pub executor: ExecutorSettings,
    /// Watch mode settings.
    pub watch: WatchSettings,
    /// Whether desktop notifications are sent.
    pub notifications: bool,
    /// Whether summary comments are posted to linked issues.
    pub post_comments: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            github_token: String::new(),
            project_owner: String::new(),
            project_number: 0,
            claude_path: DEFAULT_BINARY.to_owned(),
            graphql_url: DEFAULT_GRAPHQL_URL.to_owned(),
            status_names: StatusNames::default(),
            executor: ExecutorSettings::default(),
            watch: WatchSettings::default(),
            notifications: true,
            post_comments: true,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = if self.github_token.is_empty() {
            ""
        } else {
            "<redacted>"
        };
        f.debug_struct("Config")
            .field("github_token", &token)
            .field("project_owner", &self.project_owner)
            .field("project_number", &self.project_number)
            .field("claude_path", &self.claude_path)
            .field("graphql_url", &self.graphql_url)
            .field("status_names", &self.status_names)
            .field("executor", &self.executor)
            .field("watch", &self.watch)
            .field("notifications", &self.notifications)
            .field("post_comments", &self.post_comments)
            .finish()
    }
}

/// `project` mapping of the local file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LocalProject {
    /// Full project URL; preferred over `owner` and `number`.
    pub url: Option<String>,
    /// Project owner.
    pub owner: Option<String>,
    /// Project number.
    pub number: Option<u64>,
}

/// Project-local overrides read from `.vibe.yaml`.
///
/// Every key is optional. The token cannot be set here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Project selection.
    pub project: LocalProject,
    /// Binary override.
    pub claude_path: Option<String>,
    /// Status name profile.
    pub status_names: Option<StatusNames>,
    /// Subprocess settings.
    pub executor: Option<ExecutorSettings>,
    /// Watch mode settings.
    pub watch: Option<WatchSettings>,
    /// Notification toggle.
    pub notifications: Option<bool>,
    /// Comment toggle.
    pub post_comments: Option<bool>,
}

impl Config {
    /// Loads configuration from the standard locations.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the working directory is unavailable or
    /// a file exists but cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir().map_err(ConfigError::CurrentDir)?;
        let cwd = utf8_path(cwd)?;
        let home = dirs::home_dir().map(utf8_path).transpose()?;
        let env_token = std::env::var(TOKEN_ENV).ok();
        Self::load_from(home.as_deref(), &cwd, env_token)
    }

    /// Loads configuration using explicit locations.
    ///
    /// `home` holds the `.vibe/config.json` global file; the local file is
    /// searched for from `start_dir` upwards.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a file exists but cannot be read or
    /// parsed, or when the local project URL is invalid.
    pub fn load_from(
        home: Option<&Utf8Path>,
        start_dir: &Utf8Path,
        env_token: Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = match home {
            Some(home_dir) => Self::read_global(&home_dir.join(GLOBAL_DIR).join(GLOBAL_FILE))?,
            None => Self::default(),
        };
        if let Some(local_path) = find_local_config(start_dir)? {
            let local = LocalConfig::read(&local_path)?;
            config.merge_local(local)?;
        }
        if let Some(token) = env_token.filter(|token| !token.trim().is_empty()) {
            config.github_token = token;
        }
        Ok(config)
    }

    /// Reads the global JSON file, falling back to defaults when absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file exists but is unreadable or
    /// malformed.
    pub fn read_global(path: &Utf8Path) -> Result<Self, ConfigError> {
        let Some(contents) = read_optional(path)? else {
            return Ok(Self::default());
        };
        serde_json::from_str(&contents).map_err(|source| ConfigError::Json {
            path: path.to_owned(),
            source,
        })
    }

    /// Applies project-local overrides. The token is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidProjectUrl`] when `project.url` does
    /// not name a GitHub project.
    pub fn merge_local(&mut self, local: LocalConfig) -> Result<(), ConfigError> {
        if let Some(url) = local.project.url.filter(|url| !url.trim().is_empty()) {
            let (owner, number) = parse_project_url(&url)?;
            self.project_owner = owner;
            self.project_number = number;
        } else {
            if let Some(owner) = local.project.owner.filter(|owner| !owner.is_empty()) {
                self.project_owner = owner;
            }
            if let Some(number) = local.project.number.filter(|number| *number > 0) {
                self.project_number = number;
            }
        }
        if let Some(path) = local.claude_path.filter(|path| !path.is_empty()) {
            self.claude_path = path;
        }
        if let Some(names) = local.status_names {
            self.status_names = names;
        }
        if let Some(executor) = local.executor {
            self.executor = executor;
        }
        if let Some(watch) = local.watch {
            self.watch = watch;
        }
        if let Some(enabled) = local.notifications {
            self.notifications = enabled;
        }
        if let Some(enabled) = local.post_comments {
            self.post_comments = enabled;
        }
        Ok(())
    }

    /// Checks that the board can be reached.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingToken`],
    /// [`ConfigError::ProjectNotSelected`] or [`ConfigError::ZeroTimeout`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.github_token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }
        if !self.has_project() {
            return Err(ConfigError::ProjectNotSelected);
        }
        if self.executor.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// Records `locator` as the selected board in the global file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoHomeDir`] without a home directory, or any
    /// error from [`Config::select_project_in`].
    pub fn select_project(locator: &ProjectLocator) -> Result<Self, ConfigError> {
        let home = dirs::home_dir()
            .ok_or(ConfigError::NoHomeDir)
            .and_then(utf8_path)?;
        Self::select_project_in(&home, locator)
    }

    /// Records `locator` in `home`'s global file and returns its new contents.
    ///
    /// Only the global file is read and rewritten, so local overrides and the
    /// environment token never leak into it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, parsed or
    /// written.
    pub fn select_project_in(home: &Utf8Path, locator: &ProjectLocator) -> Result<Self, ConfigError> {
        let path = home.join(GLOBAL_DIR).join(GLOBAL_FILE);
        let mut global = Self::read_global(&path)?;
        global.project_owner.clone_from(&locator.owner);
        global.project_number = locator.number;
        global.write_global(&path)?;
        info!(path = %path, owner = %locator.owner, number = locator.number, "saved project selection");
        Ok(global)
    }

    /// Writes this configuration as pretty JSON, creating parent directories.
    ///
    /// On Unix the file mode is set to `0600`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Encode`] or [`ConfigError::Write`].
    pub fn write_global(&self, path: &Utf8Path) -> Result<(), ConfigError> {
        let write_err = |source: io::Error| ConfigError::Write {
            path: path.to_owned(),
            source,
        };
        let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
            return Err(write_err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "path has no file name",
            )));
        };
        let mut contents = serde_json::to_string_pretty(self).map_err(ConfigError::Encode)?;
        contents.push('\n');

        Dir::create_ambient_dir_all(parent, ambient_authority()).map_err(write_err)?;
        let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(write_err)?;
        dir.write(name, contents).map_err(write_err)?;
        #[cfg(unix)]
        {
            use cap_std::fs::{Permissions, PermissionsExt};
            dir.set_permissions(name, Permissions::from_mode(0o600))
                .map_err(write_err)?;
        }
        Ok(())
    }

    /// Returns `true` when an owner and a non-zero number are set.
    #[must_use]
    pub fn has_project(&self) -> bool {
        !self.project_owner.is_empty() && self.project_number > 0
    }

    /// Returns the project locator for the board adapter.
    #[must_use]
    pub fn project(&self) -> ProjectLocator {
        ProjectLocator {
            owner: self.project_owner.clone(),
            number: self.project_number,
        }
    }

    /// Per-task timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.executor.timeout_secs)
    }

    /// Watch poll interval.
    #[must_use]
    pub const fn watch_interval(&self) -> Duration {
        Duration::from_secs(self.watch.interval_secs)
    }
}

impl LocalConfig {
    /// Reads and parses a local YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file is unreadable or malformed. A
    /// missing or empty file yields the empty configuration.
    pub fn read(path: &Utf8Path) -> Result<Self, ConfigError> {
        let Some(contents) = read_optional(path)? else {
            return Ok(Self::default());
        };
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Yaml {
            path: path.to_owned(),
            source,
        })
    }
}

/// Extracts the owner and number from a GitHub project URL.
///
/// Accepts `https://github.com/users/{owner}/projects/{n}` and the `orgs`
/// form, with any trailing path such as `/views/1`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidProjectUrl`] for anything else.
pub fn parse_project_url(url: &str) -> Result<(String, u64), ConfigError> {
    let invalid = || ConfigError::InvalidProjectUrl(url.to_owned());
    let pattern = Regex::new(PROJECT_URL_PATTERN).map_err(|_| invalid())?;
    let captures = pattern.captures(url.trim()).ok_or_else(invalid)?;
    let owner = captures.get(1).ok_or_else(invalid)?.as_str();
    let number = captures
        .get(2)
        .ok_or_else(invalid)?
        .as_str()
        .parse::<u64>()
        .map_err(|_| invalid())?;
    if number == 0 {
        return Err(invalid());
    }
    Ok((owner.to_owned(), number))
}

/// Finds the nearest `.vibe.yaml`, walking up from `start_dir`.
///
/// # Errors
///
/// Returns [`ConfigError::Read`] when a directory on the way up fails to
/// open for a reason other than being missing or unreadable.
pub fn find_local_config(start_dir: &Utf8Path) -> Result<Option<Utf8PathBuf>, ConfigError> {
    for dir in start_dir.ancestors() {
        let candidate = dir.join(LOCAL_FILE);
        let found = match Dir::open_ambient_dir(dir, ambient_authority()) {
            Ok(handle) => handle.is_file(LOCAL_FILE),
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
                ) =>
            {
                false
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: candidate,
                    source,
                });
            }
        };
        if found {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

fn read_optional(path: &Utf8Path) -> Result<Option<String>, ConfigError> {
    let read_err = |source: io::Error| ConfigError::Read {
        path: path.to_owned(),
        source,
    };
    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return Err(read_err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "path has no file name",
        )));
    };
    let parent = if parent.as_str().is_empty() {
        Utf8Path::new(".")
    } else {
        parent
    };
    let dir = match Dir::open_ambient_dir(parent, ambient_authority()) {
        Ok(dir) => dir,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(read_err(err)),
    };
    match dir.read_to_string(name) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(read_err(err)),
    }
}

fn utf8_path(path: std::path::PathBuf) -> Result<Utf8PathBuf, ConfigError> {
    Utf8PathBuf::from_path_buf(path)
        .map_err(|raw| ConfigError::NonUtf8Path(raw.display().to_string()))
}
