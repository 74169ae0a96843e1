//! Config for the server behaviors
//!
//! This module provides configuration options for where the server listens, where it writes
//! logs, and how client ids are shared between processes.
//!
//! Configuration can be created programmatically using [`Configuration::new()`] or by reading
//! environment variables using [`Configuration::from_env()`].
//!
//! # Environment Variables
//!
//! All values are optional. Unset or unparsable values keep the default.
//!
//! - `PLAYMAKER_HOST`: Address to listen on (default: `0.0.0.0`)
//! - `PLAYMAKER_RPC_PORT`: Port to listen on (default: `50051`)
//! - `PLAYMAKER_LOG_DIR`: Directory for per-agent debug logs (default: none)
//! - `PLAYMAKER_COUNTER_FILE`: Shared counter state file for multi-process setups (default: none)
//! - `PLAYMAKER_LOG_FILE`: Set to `"true"` to also write the service log to a file (default: `false`)

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use tracing::warn;

/// Port agents connect to unless told otherwise.
pub const DEFAULT_RPC_PORT: u16 = 50051;

/// Configuration for server behaviors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    pub(crate) host: IpAddr,
    pub(crate) rpc_port: u16,
    pub(crate) log_dir: Option<PathBuf>,
    pub(crate) counter_file: Option<PathBuf>,
    pub(crate) log_file: bool,
}

impl Configuration {
    /// Create a new configuration with default parameters.
    ///
    /// By default:
    /// - The server listens on all interfaces, port [`DEFAULT_RPC_PORT`].
    /// - Per-agent debug logs are disabled.
    /// - Client ids come from an in-process counter.
    /// - The service log goes to stdout only.
    pub fn new() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            rpc_port: DEFAULT_RPC_PORT,
            log_dir: None,
            counter_file: None,
            log_file: false,
        }
    }

    /// Create configuration from environment variables (see module documentation).
    ///
    /// Unparsable values are logged and ignored. Use [`Configuration::from_env_with_warnings`]
    /// when no subscriber is installed yet.
    pub fn from_env() -> Self {
        let (config, warnings) = Self::from_env_with_warnings();
        for warning in warnings {
            warn!("{warning}");
        }
        config
    }

    /// Like [`Configuration::from_env`], but hands back one message per ignored variable
    /// instead of logging it.
    pub fn from_env_with_warnings() -> (Self, Vec<String>) {
        fn get_env_parsed<T: std::str::FromStr>(var: &str, warnings: &mut Vec<String>) -> Option<T> {
            let raw = std::env::var(var).ok()?;
            match raw.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warnings.push(format!("ignoring {var}={raw:?}: not a valid value"));
                    None
                }
            }
        }

        fn get_env_flag(var: &str, default: bool) -> bool {
            match std::env::var(var) {
                Ok(val) => val.eq_ignore_ascii_case("true"),
                Err(_) => default,
            }
        }

        let defaults = Self::new();
        let mut warnings = Vec::new();
        let config = Self {
            host: get_env_parsed("PLAYMAKER_HOST", &mut warnings).unwrap_or(defaults.host),
            rpc_port: get_env_parsed("PLAYMAKER_RPC_PORT", &mut warnings).unwrap_or(defaults.rpc_port),
            log_dir: std::env::var_os("PLAYMAKER_LOG_DIR").map(PathBuf::from),
            counter_file: std::env::var_os("PLAYMAKER_COUNTER_FILE").map(PathBuf::from),
            log_file: get_env_flag("PLAYMAKER_LOG_FILE", defaults.log_file),
        };
        (config, warnings)
    }

    /// Address to listen on.
    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    /// Port to listen on. `0` picks a free port.
    pub fn with_rpc_port(mut self, port: u16) -> Self {
        self.rpc_port = port;
        self
    }

    /// Directory receiving one debug log per agent. `None` disables them.
    pub fn with_log_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.log_dir = dir;
        self
    }

    /// Share client ids with other server processes through this state file.
    ///
    /// `None` keeps the counter in-process.
    pub fn with_counter_file(mut self, path: Option<PathBuf>) -> Self {
        self.counter_file = path;
        self
    }

    /// Enable or disable writing the service log to a timestamped file in the log directory
    /// (or the working directory when no log directory is set).
    pub fn with_log_file(mut self, value: bool) -> Self {
        self.log_file = value;
        self
    }

    /// Socket address the listener binds to.
    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.rpc_port)
    }

    /// Directory of per-agent debug logs, if enabled.
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }

    /// Whether the service log also goes to a file.
    pub fn log_file(&self) -> bool {
        self.log_file
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}
