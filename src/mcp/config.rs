//! Configuration resolution for the remote tools.
//!
//! Every knob uses a three-tier priority system:
//!
//! 1. **Parameter** - Explicitly provided value (highest priority)
//! 2. **Environment Variable** - Value from environment variable
//! 3. **Default** - Built-in default value (lowest priority)
//!
//! Unparsable environment values fall back to the default. The resolved
//! [`RemoteConfig`] is built once at startup and shared read-only.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `REMOTE_HOST` | required | `host` or `host:port` |
//! | `REMOTE_USER` | required | Login user |
//! | `REMOTE_PASSWORD` | - | Password credential |
//! | `REMOTE_KEY` | - | Private key path (`~` expanded) |
//! | `REMOTE_WORK_DIR` | `/home/<user>/work` | Remote root for sync and relative paths |
//! | `LOCAL_WORK_DIR` | cwd | Local root for sync and relative paths |
//! | `REMOTE_ENV_LABEL` | - | Environment name shown in output |
//! | `REMOTE_BOOTSTRAP_COMMAND` | `module load <label>` | Activation text |
//! | `REMOTE_PTY_WIDTH` | 220 | Terminal columns |
//! | `REMOTE_PTY_HEIGHT` | 50 | Terminal rows |
//! | `REMOTE_CONNECT_TIMEOUT` | 30s | Connect and authenticate |
//! | `REMOTE_BANNER_SETTLE_MS` | 2000ms | Banner drain window |
//! | `REMOTE_BOOTSTRAP_TIMEOUT` | 90s | Bootstrap marker deadline |
//! | `REMOTE_COMMAND_TIMEOUT` | 300s | Command marker deadline |
//! | `REMOTE_EXEC_TIMEOUT` | 30s | One-shot command deadline |
//! | `REMOTE_POLL_INTERVAL_MS` | 100ms | Framer wait slice |
//! | `SYNC_INCLUDE_EXTENSIONS` | `.v,.sv,.tcl,.sdc,.txt,.md` | Synced extensions |
//! | `SYNC_EXCLUDE_NAMES` | `config.py,.env,.gitkeep` | Never-synced file names |
//! | `SYNC_EXCLUDE_DIRS` | `.git,__pycache__,results,.claude,target` | Pruned directories |

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use super::error::RemoteError;
use super::pty::SessionPlan;
use super::transfer::SyncFilter;
use super::transport::{Credentials, RemoteTarget, TerminalGeometry, parse_address};

/// Default connect and authenticate timeout in seconds
pub(crate) const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default banner settle time in milliseconds
pub(crate) const DEFAULT_BANNER_SETTLE_MS: u64 = 2000;

/// Default bootstrap marker timeout in seconds
pub(crate) const DEFAULT_BOOTSTRAP_TIMEOUT_SECS: u64 = 90;

/// Default command marker timeout in seconds
pub(crate) const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 300;

/// Default one-shot command timeout in seconds
pub(crate) const DEFAULT_EXEC_TIMEOUT_SECS: u64 = 30;

/// Default framer poll interval in milliseconds
pub(crate) const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

pub(crate) const HOST_ENV_VAR: &str = "REMOTE_HOST";
pub(crate) const USER_ENV_VAR: &str = "REMOTE_USER";
pub(crate) const PASSWORD_ENV_VAR: &str = "REMOTE_PASSWORD";
pub(crate) const KEY_ENV_VAR: &str = "REMOTE_KEY";
pub(crate) const REMOTE_WORK_DIR_ENV_VAR: &str = "REMOTE_WORK_DIR";
pub(crate) const LOCAL_WORK_DIR_ENV_VAR: &str = "LOCAL_WORK_DIR";
pub(crate) const ENV_LABEL_ENV_VAR: &str = "REMOTE_ENV_LABEL";
pub(crate) const BOOTSTRAP_COMMAND_ENV_VAR: &str = "REMOTE_BOOTSTRAP_COMMAND";
pub(crate) const PTY_WIDTH_ENV_VAR: &str = "REMOTE_PTY_WIDTH";
pub(crate) const PTY_HEIGHT_ENV_VAR: &str = "REMOTE_PTY_HEIGHT";
pub(crate) const CONNECT_TIMEOUT_ENV_VAR: &str = "REMOTE_CONNECT_TIMEOUT";
pub(crate) const BANNER_SETTLE_ENV_VAR: &str = "REMOTE_BANNER_SETTLE_MS";
pub(crate) const BOOTSTRAP_TIMEOUT_ENV_VAR: &str = "REMOTE_BOOTSTRAP_TIMEOUT";
pub(crate) const COMMAND_TIMEOUT_ENV_VAR: &str = "REMOTE_COMMAND_TIMEOUT";
pub(crate) const EXEC_TIMEOUT_ENV_VAR: &str = "REMOTE_EXEC_TIMEOUT";
pub(crate) const POLL_INTERVAL_ENV_VAR: &str = "REMOTE_POLL_INTERVAL_MS";
pub(crate) const SYNC_INCLUDE_ENV_VAR: &str = "SYNC_INCLUDE_EXTENSIONS";
pub(crate) const SYNC_EXCLUDE_NAMES_ENV_VAR: &str = "SYNC_EXCLUDE_NAMES";
pub(crate) const SYNC_EXCLUDE_DIRS_ENV_VAR: &str = "SYNC_EXCLUDE_DIRS";

/// Resolve a parsed value with priority: parameter -> env var -> default
pub(crate) fn resolve<T: FromStr>(param: Option<T>, env_var: &str, default: T) -> T {
    // Priority 1: Use parameter if provided
    if let Some(value) = param {
        return value;
    }

    // Priority 2: Use environment variable if set and parsable
    if let Ok(raw) = env::var(env_var)
        && let Ok(value) = raw.trim().parse::<T>()
    {
        return value;
    }

    // Priority 3: Default value
    default
}

/// Resolve an optional string with priority: parameter -> env var. Blank
/// values count as unset.
pub(crate) fn resolve_text(param: Option<String>, env_var: &str) -> Option<String> {
    param
        .or_else(|| env::var(env_var).ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Resolve a comma-separated list with priority: env var -> default.
pub(crate) fn resolve_list(env_var: &str, default: &[&str]) -> Vec<String> {
    match resolve_text(None, env_var) {
        Some(raw) => parse_list(&raw),
        None => default.iter().map(|s| s.to_string()).collect(),
    }
}

/// Split a comma-separated list, dropping blanks.
pub(crate) fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Expand a leading `~` to `$HOME`.
pub(crate) fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Ok(home) = env::var("HOME")
    {
        return PathBuf::from(home).join(rest);
    }
    if path == "~"
        && let Ok(home) = env::var("HOME")
    {
        return PathBuf::from(home);
    }
    PathBuf::from(path)
}

/// Deadlines and pacing for one interactive session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimeouts {
    pub connect: Duration,
    pub banner_settle: Duration,
    pub bootstrap: Duration,
    pub command: Duration,
    pub exec: Duration,
    pub poll_interval: Duration,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            banner_settle: Duration::from_millis(DEFAULT_BANNER_SETTLE_MS),
            bootstrap: Duration::from_secs(DEFAULT_BOOTSTRAP_TIMEOUT_SECS),
            command: Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
            exec: Duration::from_secs(DEFAULT_EXEC_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl SessionTimeouts {
    /// Resolve every timeout from the environment.
    pub fn from_env() -> Self {
        Self {
            connect: Duration::from_secs(resolve(
                None,
                CONNECT_TIMEOUT_ENV_VAR,
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )),
            banner_settle: Duration::from_millis(resolve(
                None,
                BANNER_SETTLE_ENV_VAR,
                DEFAULT_BANNER_SETTLE_MS,
            )),
            bootstrap: Duration::from_secs(resolve(
                None,
                BOOTSTRAP_TIMEOUT_ENV_VAR,
                DEFAULT_BOOTSTRAP_TIMEOUT_SECS,
            )),
            command: Duration::from_secs(resolve(
                None,
                COMMAND_TIMEOUT_ENV_VAR,
                DEFAULT_COMMAND_TIMEOUT_SECS,
            )),
            exec: Duration::from_secs(resolve(None, EXEC_TIMEOUT_ENV_VAR, DEFAULT_EXEC_TIMEOUT_SECS)),
            poll_interval: Duration::from_millis(resolve(
                None,
                POLL_INTERVAL_ENV_VAR,
                DEFAULT_POLL_INTERVAL_MS,
            )),
        }
        .with_dominant_command()
    }

    /// Raise the command timeout above the bootstrap timeout if needed.
    pub fn with_dominant_command(mut self) -> Self {
        if self.command <= self.bootstrap {
            let raised = self.bootstrap + Duration::from_secs(1);
            warn!(
                "Command timeout {}s does not exceed bootstrap timeout {}s; using {}s",
                self.command.as_secs(),
                self.bootstrap.as_secs(),
                raised.as_secs()
            );
            self.command = raised;
        }
        self
    }
}

/// Process-wide configuration. Never mutated after startup.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// `host` or `host:port`
    pub host: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub key_path: Option<PathBuf>,
    pub remote_work_dir: String,
    pub local_work_dir: PathBuf,
    pub env_label: Option<String>,
    pub bootstrap_command: Option<String>,
    pub geometry: TerminalGeometry,
    pub timeouts: SessionTimeouts,
    pub sync_filter: SyncFilter,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: None,
            user: None,
            password: None,
            key_path: None,
            remote_work_dir: "work".to_string(),
            local_work_dir: PathBuf::from("."),
            env_label: None,
            bootstrap_command: None,
            geometry: TerminalGeometry::default(),
            timeouts: SessionTimeouts::default(),
            sync_filter: SyncFilter::default(),
        }
    }
}

impl RemoteConfig {
    /// Resolve the full configuration from the process environment.
    ///
    /// Missing host or user is not an error here; it surfaces from
    /// [`RemoteConfig::target`] when a tool actually needs the connection.
    pub fn from_env() -> Self {
        let host = resolve_text(None, HOST_ENV_VAR);
        let user = resolve_text(None, USER_ENV_VAR);

        let remote_work_dir = resolve_text(None, REMOTE_WORK_DIR_ENV_VAR).unwrap_or_else(|| {
            match &user {
                Some(user) => format!("/home/{}/work", user),
                None => "work".to_string(),
            }
        });

        let local_work_dir = resolve_text(None, LOCAL_WORK_DIR_ENV_VAR)
            .map(|dir| expand_home(&dir))
            .or_else(|| env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        let env_label = resolve_text(None, ENV_LABEL_ENV_VAR);
        let bootstrap_command = resolve_text(None, BOOTSTRAP_COMMAND_ENV_VAR)
            .or_else(|| env_label.as_ref().map(|label| format!("module load {}", label)));

        let defaults = TerminalGeometry::default();
        let geometry = TerminalGeometry {
            width: Some(resolve(None, PTY_WIDTH_ENV_VAR, defaults.width))
                .filter(|w| *w > 0)
                .unwrap_or(defaults.width),
            height: Some(resolve(None, PTY_HEIGHT_ENV_VAR, defaults.height))
                .filter(|h| *h > 0)
                .unwrap_or(defaults.height),
        };

        let defaults = SyncFilter::default();
        let sync_filter = SyncFilter::new(
            resolve_list(SYNC_INCLUDE_ENV_VAR, &as_strs(&defaults.include_extensions)),
            resolve_list(SYNC_EXCLUDE_NAMES_ENV_VAR, &as_strs(&defaults.exclude_names)),
            resolve_list(SYNC_EXCLUDE_DIRS_ENV_VAR, &as_strs(&defaults.exclude_dirs)),
        );

        Self {
            host,
            user,
            password: resolve_text(None, PASSWORD_ENV_VAR),
            key_path: resolve_text(None, KEY_ENV_VAR).map(|key| expand_home(&key)),
            remote_work_dir,
            local_work_dir,
            env_label,
            bootstrap_command,
            geometry,
            timeouts: SessionTimeouts::from_env(),
            sync_filter,
        }
    }

    /// Validated connection parameters. Fails before any network attempt.
    pub fn target(&self) -> Result<RemoteTarget, RemoteError> {
        let address = self.host.as_deref().ok_or_else(|| {
            RemoteError::Configuration(format!("{} is not set", HOST_ENV_VAR))
        })?;
        let user = self.user.as_deref().ok_or_else(|| {
            RemoteError::Configuration(format!("{} is not set", USER_ENV_VAR))
        })?;
        let (host, port) = parse_address(address)
            .map_err(|e| RemoteError::Configuration(format!("{}: {}", HOST_ENV_VAR, e)))?;
        if host.is_empty() {
            return Err(RemoteError::Configuration(format!(
                "{} has an empty host name",
                HOST_ENV_VAR
            )));
        }

        Ok(RemoteTarget {
            host,
            port,
            user: user.to_string(),
            credentials: Credentials {
                password: self.password.clone(),
                key_path: self.key_path.clone(),
            },
        })
    }

    /// Session plan for `command` with this configuration's environment,
    /// geometry and deadlines.
    pub fn session_plan(&self, command: &str) -> SessionPlan {
        let timeouts = self.timeouts.with_dominant_command();
        let mut plan = SessionPlan::new(command);
        plan.activation = self.bootstrap_command.clone();
        plan.label = self.env_label.clone();
        plan.geometry = self.geometry;
        plan.connect_timeout = timeouts.connect;
        plan.banner_settle = timeouts.banner_settle;
        plan.bootstrap_timeout = timeouts.bootstrap;
        plan.command_timeout = timeouts.command;
        plan.poll_interval = timeouts.poll_interval;
        plan
    }
}

fn as_strs(items: &[String]) -> Vec<&str> {
    items.iter().map(String::as_str).collect()
}
