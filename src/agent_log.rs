use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::world::{AgentType, ClientIdentity};

/// Append-only debug log of one agent, one file per identity.
///
/// Every record is `Cycle <n> : <message>` followed by an empty line. Write failures are
/// reported once through `tracing` and then the sink goes quiet: losing a debug line must
/// never fail an RPC.
#[derive(Debug, Default)]
pub struct AgentLog {
    path: Option<PathBuf>,
    file: Option<File>,
}

impl AgentLog {
    /// A sink that drops everything.
    pub fn disabled() -> AgentLog {
        AgentLog::default()
    }

    /// Open (or create) the log file of `identity` in `dir`.
    pub fn open(dir: &Path, identity: &ClientIdentity) -> AgentLog {
        let path = dir.join(Self::file_name(identity));
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => AgentLog {
                path: Some(path),
                file: Some(file),
            },
            Err(e) => {
                warn!("agent log {} unavailable, disabling it: {e}", path.display());
                AgentLog::disabled()
            }
        }
    }

    /// `<team>_player_<unum>.log`, `<team>_coach.log` or `<team>_trainer.log`.
    ///
    /// Bytes of the team name outside `[A-Za-z0-9-]` are written as `%XX`, so two different
    /// teams never share a file.
    pub fn file_name(identity: &ClientIdentity) -> String {
        let mut team = String::with_capacity(identity.team_name.len());
        for byte in identity.team_name.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                team.push(char::from(byte));
            } else {
                team.push_str(&format!("%{byte:02X}"));
            }
        }
        match identity.agent_type {
            AgentType::Player => format!("{team}_player_{}.log", identity.uniform_number),
            other => format!("{team}_{other}.log"),
        }
    }

    /// Whether records still reach a file.
    pub fn is_enabled(&self) -> bool {
        self.file.is_some()
    }

    /// Path of the underlying file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one record. Never fails.
    pub fn record(&mut self, cycle: i64, message: impl Display) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        if let Err(e) = write!(file, "Cycle {cycle} : {message}\n\n") {
            let path = self.path.as_deref().unwrap_or(Path::new("?"));
            warn!("writing agent log {} failed, disabling it: {e}", path.display());
            self.file = None;
        }
    }
}
