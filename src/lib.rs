//! # Playmaker Server
//!
//! A decision broker for simulated-soccer agents. Player, coach and trainer processes connect
//! over TCP, register once, then ask every simulation cycle for a list of candidate behaviors
//! that their own runtime will execute.
//!
//! It provides:
//! - Client registration with process-wide unique ids (`ClientRegistry`), optionally shared
//!   between several server processes through a counter file
//! - Rule-based decisions for players, the coach and a scripted trainer drill (`BasePolicy`)
//! - Best-candidate selection over planner entries scored on the agent side
//! - Per-agent debug logs and a tracing-based service log
//!
//! Each agent connection is served by its own thread, so a stalled agent never delays the
//! others. The only state shared between connections is the registration counter.
//!
//! # Documentation Overview
//!
//! - For the listening socket and connection lifecycle, see the [`server`] module.
//! - For the request state machine of one connection, see [`session`].
//! - For the wire format, see [`protocol`].
//! - For configuring ports and log locations, see
//!   [`Configuration`](crate::configuration::Configuration).
//! - To change what agents are told to do, implement the
//!   [`DecisionPolicy`](crate::policy::DecisionPolicy) trait.
//!
//! # Usage Example
//!
//! ```no_run
//! use playmaker_server::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Configuration::from_env().with_rpc_port(50051);
//!     let handle = Server::new(config).start()?;
//!
//!     let mut agent = AgentClient::connect(handle.local_addr())?;
//!     let me = agent.register("CLS", 7, AgentType::Player)?;
//!     println!("registered as {me}");
//!
//!     let world = WorldSnapshot {
//!         cycle: 1,
//!         ..Default::default()
//!     };
//!     for action in agent.player_actions(world)?.actions {
//!         println!("{action:?}");
//!     }
//!     agent.bye()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Custom decisions
//!
//! ```no_run
//! use playmaker_server::prelude::*;
//!
//! struct AlwaysShoot {
//!     base: BasePolicy,
//! }
//!
//! impl DecisionPolicy for AlwaysShoot {
//!     fn player_actions(&self, _world: &WorldSnapshot) -> PlayerActions {
//!         PlayerActions {
//!             actions: vec![PlayerAction::ShootBehavior],
//!         }
//!     }
//!
//!     fn coach_actions(&self, world: &WorldSnapshot) -> CoachActions {
//!         self.base.coach_actions(world)
//!     }
//!
//!     fn trainer_actions(&self, world: &WorldSnapshot) -> TrainerActions {
//!         self.base.trainer_actions(world)
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     let policy = AlwaysShoot {
//!         base: BasePolicy::default(),
//!     };
//!     Server::with_policy(Configuration::new(), policy).start()?.wait();
//!     Ok(())
//! }
//! ```
#![warn(missing_docs)]

pub use anyhow;

pub mod actions;
/// Per-agent debug log files.
pub mod agent_log;
/// Blocking client used by agents (and tests) to talk to a server.
pub mod client;
pub mod configuration;
pub mod dispatcher;
pub mod error;
/// Service log setup and log directory rotation.
pub mod logger;
pub mod params;
pub mod planner;
pub mod policy;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod trainer;
pub mod world;

/// Commonly used types and traits for quick access.
///
/// Import this prelude to get started easily:
/// ```rust
/// use playmaker_server::prelude::*;
/// ```
///
/// Includes:
/// - [`Configuration`](crate::configuration::Configuration)
/// - [`Server`](crate::server::Server) and its [`ServerHandle`](crate::server::ServerHandle)
/// - [`DecisionPolicy`](crate::policy::DecisionPolicy) and [`BasePolicy`](crate::policy::BasePolicy)
/// - [`AgentClient`](crate::client::AgentClient)
/// - the world and action types exchanged with agents
pub mod prelude {
    pub use crate::actions::*;
    pub use crate::client::AgentClient;
    pub use crate::configuration::Configuration;
    pub use crate::error::{BrokerError, ErrorKind};
    pub use crate::planner::{BestPlannerAction, CandidateAction, PlannerEntry, PredictedState};
    pub use crate::policy::{BasePolicy, DecisionPolicy};
    pub use crate::protocol::{ErrorReply, Reply, Request};
    pub use crate::registry::ClientRegistry;
    pub use crate::server::{Server, ServerHandle, ShutdownSignal};
    pub use crate::trainer::TrainerCadence;
    pub use crate::world::*;
}
