//! Connection acceptor and per-agent session threads.
//!
//! This module defines the [`Server`] type, which owns the listening socket. Its
//! responsibilities include:
//!
//! - Binding the RPC port (the only fatal failure once configuration is loaded)
//! - Accepting connections until shut down, one dedicated thread per agent
//! - Handing every thread its own [`Session`] over the shared [`ClientRegistry`]
//!
//! A slow or stalled agent only ever blocks its own thread. Within a connection, replies go
//! out in request order; across connections nothing is ordered.
//!
//! # Example
//!
//! ```no_run
//! use playmaker_server::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Configuration::new().with_rpc_port(50051);
//!     let handle = Server::new(config).start()?;
//!     println!("listening on {}", handle.local_addr());
//!     handle.wait();
//!     Ok(())
//! }
//! ```

use std::io::{self, BufReader, BufWriter};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, info, instrument, warn};

use crate::configuration::Configuration;
use crate::policy::{BasePolicy, DecisionPolicy};
use crate::protocol::{self, Reply};
use crate::registry::ClientRegistry;
use crate::session::Session;

/// Accepts agent connections and serves them with a [`DecisionPolicy`].
///
/// # Type Parameters
/// - `P`: The decision policy shared by all sessions, [`BasePolicy`] by default
pub struct Server<P: DecisionPolicy = BasePolicy> {
    config: Configuration,
    registry: ClientRegistry,
    policy: Arc<P>,
}

impl Server<BasePolicy> {
    /// Create a [`Server`] with the stock decision policy.
    pub fn new(config: Configuration) -> Server<BasePolicy> {
        Server::with_policy(config, BasePolicy::default())
    }
}

impl<P: DecisionPolicy> Server<P> {
    const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(20);
    const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(200);

    /// Create a [`Server`] answering with `policy`.
    ///
    /// The registry counter is in-process unless the configuration names a counter file.
    pub fn with_policy(config: Configuration, policy: P) -> Server<P> {
        let registry = match &config.counter_file {
            Some(path) => ClientRegistry::shared_file(path),
            None => ClientRegistry::in_process(),
        };
        Server {
            config,
            registry,
            policy: Arc::new(policy),
        }
    }

    /// Replace the registry, e.g. to share one counter between several servers in a process.
    pub fn with_registry(mut self, registry: ClientRegistry) -> Server<P> {
        self.registry = registry;
        self
    }

    /// The registry sessions will register against.
    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// Bind the listener and start accepting connections on a background thread.
    ///
    /// # Errors
    /// Returns an error if the address cannot be bound (e.g. the port is already in use).
    #[instrument(skip_all, fields(addr = %self.config.bind_address()))]
    pub fn start(self) -> anyhow::Result<ServerHandle> {
        let address = self.config.bind_address();
        let listener = TcpListener::bind(address)
            .with_context(|| format!("could not bind rpc port on {address}"))?;
        listener
            .set_nonblocking(true)
            .context("server error: setting non-blocking on listener")?;
        let local_addr = listener.local_addr()?;

        let stop = Arc::new(AtomicBool::new(false));
        let acceptor = {
            let stop = Arc::clone(&stop);
            let registry = self.registry.clone();
            let policy = Arc::clone(&self.policy);
            let log_dir = self.config.log_dir.clone();
            thread::Builder::new()
                .name("acceptor".to_owned())
                .spawn(move || accept_loop(listener, &stop, registry, policy, log_dir))
                .context("could not spawn acceptor thread")?
        };

        info!(%local_addr, "server listening");
        Ok(ServerHandle {
            local_addr,
            stop,
            acceptor: Some(acceptor),
            registry: self.registry,
        })
    }
}

/// Cloneable trigger that stops a running server's acceptor, e.g. from a signal handler.
#[derive(Debug, Clone)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    /// Ask the acceptor to stop. Sessions already running finish on their own.
    pub fn trigger(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// A running server. Dropping it stops the acceptor.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    stop: Arc<AtomicBool>,
    acceptor: Option<JoinHandle<()>>,
    registry: ClientRegistry,
}

impl ServerHandle {
    /// Address actually bound, useful with port `0`.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The registry shared by this server's sessions.
    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// A trigger for [`ServerHandle::wait`] to return.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        ShutdownSignal(Arc::clone(&self.stop))
    }

    /// Stop accepting connections and wait for the acceptor to exit.
    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::Release);
        self.join_acceptor();
    }

    /// Block until a [`ShutdownSignal`] fires.
    pub fn wait(mut self) {
        self.join_acceptor();
    }

    fn join_acceptor(&mut self) {
        if let Some(acceptor) = self.acceptor.take() {
            if acceptor.join().is_err() {
                warn!("acceptor thread panicked");
            }
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        self.join_acceptor();
    }
}

fn accept_loop<P: DecisionPolicy>(
    listener: TcpListener,
    stop: &AtomicBool,
    registry: ClientRegistry,
    policy: Arc<P>,
    log_dir: Option<PathBuf>,
) {
    while !stop.load(Ordering::Acquire) {
        match listener.accept() {
            Ok((stream, addr)) => {
                debug!(%addr, "agent connected");
                let session = Session::new(registry.clone(), Arc::clone(&policy), log_dir.clone());
                let spawned = thread::Builder::new()
                    .name(format!("session-{addr}"))
                    .spawn(move || serve_connection(stream, addr, session));
                if let Err(e) = spawned {
                    warn!(%addr, "could not spawn session thread, dropping connection: {e}");
                }
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(Server::<P>::ACCEPT_POLL_INTERVAL);
            }
            Err(e) => {
                warn!("error accepting agent connection: {e}");
                thread::sleep(Server::<P>::ACCEPT_ERROR_BACKOFF);
            }
        }
    }
    info!("acceptor stopped");
}

fn serve_connection<P: DecisionPolicy>(stream: TcpStream, addr: SocketAddr, mut session: Session<P>) {
    match run_session(stream, &mut session) {
        Ok(()) => debug!(%addr, "connection closed"),
        Err(e) => match session.identity() {
            Some(identity) => info!(%addr, %identity, "connection lost: {e}"),
            None => debug!(%addr, "connection lost before registration: {e}"),
        },
    }
}

/// Serve requests until bye, clean close, or a transport error.
fn run_session<P: DecisionPolicy>(stream: TcpStream, session: &mut Session<P>) -> io::Result<()> {
    // accepted sockets may inherit the listener's non-blocking flag
    stream.set_nonblocking(false)?;
    if let Err(e) = stream.set_nodelay(true) {
        debug!("could not set TCP_NODELAY: {e}");
    }
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = BufWriter::new(stream);

    while let Some(payload) = protocol::read_frame(&mut reader)? {
        let reply = match protocol::decode_request(&payload) {
            Ok(request) => session.handle(request),
            Err(e) => Reply::from(e),
        };
        protocol::send(&mut writer, &reply)?;
        if session.is_closed() {
            break;
        }
    }
    Ok(())
}
