//! Client registration and the shared connection counter.
//!
//! Every successful [`ClientRegistry::register`] bumps the counter exactly once while holding
//! its lock and hands the new value out as the client id. Ids are never reused: a bye only
//! records a departure.
//!
//! Two counter backends are provided:
//! - [`InProcessCounter`] for a single server process (the default),
//! - [`SharedFileCounter`] for several server processes sharing one id space. The lock is an
//!   exclusive advisory lock on a file next to a small state file.

use std::ffi::OsString;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use fd_lock::RwLock;
use tracing::{debug, instrument, trace};

use crate::error::{BrokerError, BrokerResult};
use crate::world::{AgentType, ClientIdentity, RegisterRequest};

/// Highest uniform number a field player can wear.
pub const MAX_UNIFORM_NUMBER: u32 = 11;

/// Counter values as seen under the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterTally {
    /// Ids handed out so far. Also the last issued id.
    pub issued: u64,
    /// Bye commands acknowledged so far.
    pub departed: u64,
}

impl CounterTally {
    /// Agents registered and not yet gone.
    pub fn connected(&self) -> u64 {
        self.issued.saturating_sub(self.departed)
    }
}

/// A counter guarded by a lock shared by every serving thread (and process, if the backend
/// supports it).
pub trait ConnectionCounter: Send + Sync + fmt::Debug {
    /// Increment under the lock and return the post-increment value.
    fn increment(&self) -> BrokerResult<u64>;

    /// Record a bye under the same lock.
    fn record_departure(&self) -> BrokerResult<()>;

    /// Read the current values under the lock.
    fn tally(&self) -> BrokerResult<CounterTally>;
}

/// Mutex-backed counter for a single process.
#[derive(Debug, Default)]
pub struct InProcessCounter {
    state: Mutex<CounterTally>,
}

impl InProcessCounter {
    /// A counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_lock<R>(&self, f: impl FnOnce(&mut CounterTally) -> R) -> R {
        // every update is a single field write, a poisoned guard still holds a valid tally
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl ConnectionCounter for InProcessCounter {
    fn increment(&self) -> BrokerResult<u64> {
        Ok(self.with_lock(|tally| {
            tally.issued += 1;
            tally.issued
        }))
    }

    fn record_departure(&self) -> BrokerResult<()> {
        self.with_lock(|tally| tally.departed += 1);
        Ok(())
    }

    fn tally(&self) -> BrokerResult<CounterTally> {
        Ok(self.with_lock(|tally| *tally))
    }
}

/// Counter shared between processes through the file system.
///
/// The state file holds `"<issued> <departed>"`. Mutations happen only while holding an
/// exclusive advisory lock on `<state file>.lock`. The lock belongs to the open file, so the
/// kernel releases it when the holder exits, killed or not. The lock file itself is never
/// removed.
#[derive(Debug, Clone)]
pub struct SharedFileCounter {
    state_path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
}

impl SharedFileCounter {
    const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);
    const RETRY_DELAY: Duration = Duration::from_millis(1);

    /// Use `state_path` as the shared state file. The file is created on first increment.
    pub fn new(state_path: impl AsRef<Path>) -> Self {
        let state_path = state_path.as_ref().to_path_buf();
        let lock_path = with_suffix(&state_path, ".lock");
        Self {
            state_path,
            lock_path,
            lock_timeout: Self::DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// How long to wait for another process to release the lock.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Path of the shared state file.
    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    fn with_lock<R>(&self, f: impl FnOnce(&mut CounterTally) -> R) -> BrokerResult<R> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(|e| {
                BrokerError::Registry(format!(
                    "could not open lock file {}: {e}",
                    self.lock_path.display()
                ))
            })?;
        let mut lock = RwLock::new(file);
        let deadline = Instant::now() + self.lock_timeout;
        loop {
            match lock.try_write() {
                Ok(_guard) => return self.update(f),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(BrokerError::Registry(format!(
                            "timed out after {:?} waiting for {}",
                            self.lock_timeout,
                            self.lock_path.display()
                        )));
                    }
                    thread::sleep(Self::RETRY_DELAY);
                }
                Err(e) => {
                    return Err(BrokerError::Registry(format!(
                        "could not lock {}: {e}",
                        self.lock_path.display()
                    )))
                }
            }
        }
    }

    /// Read-modify-write of the state file. Caller holds the lock.
    fn update<R>(&self, f: impl FnOnce(&mut CounterTally) -> R) -> BrokerResult<R> {
        let mut tally = self.read_state()?;
        let before = tally;
        let result = f(&mut tally);
        if tally != before {
            self.write_state(tally)?;
        }
        Ok(result)
    }

    fn read_state(&self) -> BrokerResult<CounterTally> {
        let content = match fs::read_to_string(&self.state_path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(CounterTally::default()),
            Err(e) => {
                return Err(BrokerError::Registry(format!(
                    "could not read {}: {e}",
                    self.state_path.display()
                )))
            }
        };
        parse_tally(&content).ok_or_else(|| {
            BrokerError::Registry(format!(
                "corrupted counter state in {}: {content:?}",
                self.state_path.display()
            ))
        })
    }

    fn write_state(&self, tally: CounterTally) -> BrokerResult<()> {
        let tmp = with_suffix(&self.state_path, ".tmp");
        fs::write(&tmp, format!("{} {}\n", tally.issued, tally.departed))
            .and_then(|()| fs::rename(&tmp, &self.state_path))
            .map_err(|e| {
                BrokerError::Registry(format!(
                    "could not write {}: {e}",
                    self.state_path.display()
                ))
            })
    }
}

impl ConnectionCounter for SharedFileCounter {
    fn increment(&self) -> BrokerResult<u64> {
        self.with_lock(|tally| {
            tally.issued += 1;
            tally.issued
        })
    }

    fn record_departure(&self) -> BrokerResult<()> {
        self.with_lock(|tally| tally.departed += 1)
    }

    fn tally(&self) -> BrokerResult<CounterTally> {
        self.with_lock(|tally| *tally)
    }
}

fn parse_tally(content: &str) -> Option<CounterTally> {
    let mut fields = content.split_whitespace();
    let issued = fields.next()?.parse().ok()?;
    let departed = fields.next().map_or(Some(0), |d| d.parse().ok())?;
    Some(CounterTally { issued, departed })
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Hands out client identities. Cheap to clone; clones share the counter.
#[derive(Debug, Clone)]
pub struct ClientRegistry {
    counter: Arc<dyn ConnectionCounter>,
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::in_process()
    }
}

impl ClientRegistry {
    /// Registry over an arbitrary counter backend.
    pub fn new(counter: Arc<dyn ConnectionCounter>) -> Self {
        Self { counter }
    }

    /// Registry with a fresh [`InProcessCounter`].
    pub fn in_process() -> Self {
        Self::new(Arc::new(InProcessCounter::new()))
    }

    /// Registry over a [`SharedFileCounter`] at `state_path`.
    pub fn shared_file(state_path: impl AsRef<Path>) -> Self {
        Self::new(Arc::new(SharedFileCounter::new(state_path)))
    }

    /// Validate `request` and issue a new identity.
    ///
    /// # Errors
    /// [`BrokerError::Protocol`] for a malformed request, in which case the counter is not
    /// touched, and [`BrokerError::Registry`] if the counter backend fails.
    #[instrument(skip_all, fields(team = %request.team_name, unum = request.uniform_number, agent = %request.agent_type))]
    pub fn register(&self, request: &RegisterRequest) -> BrokerResult<ClientIdentity> {
        validate_registration(request)?;
        let client_id = self.counter.increment()?;
        debug!(client_id, "registered");
        Ok(ClientIdentity {
            client_id,
            team_name: request.team_name.clone(),
            uniform_number: request.uniform_number,
            agent_type: request.agent_type,
        })
    }

    /// Acknowledge a bye. The id stays retired.
    pub fn unregister(&self, identity: &ClientIdentity) -> BrokerResult<()> {
        self.counter.record_departure()?;
        trace!(%identity, "departed");
        Ok(())
    }

    /// Current counter values.
    pub fn tally(&self) -> BrokerResult<CounterTally> {
        self.counter.tally()
    }
}

fn validate_registration(request: &RegisterRequest) -> BrokerResult<()> {
    if request.team_name.trim().is_empty() {
        return Err(BrokerError::protocol("team name must not be empty"));
    }
    if request.agent_type == AgentType::Player
        && !(1..=MAX_UNIFORM_NUMBER).contains(&request.uniform_number)
    {
        return Err(BrokerError::protocol(format!(
            "player uniform number must be in 1..={MAX_UNIFORM_NUMBER}, got {}",
            request.uniform_number
        )));
    }
    Ok(())
}
