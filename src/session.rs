//! One agent connection, seen as a state machine over requests.
//!
//! ```text
//! Connected --Register--> Registered --(decision calls)*--> Registered --SendByeCommand--> Closed
//! ```
//!
//! A [`Session`] is owned by the thread serving its connection; nothing in it is shared with
//! other sessions except the registry counter.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, instrument, trace, warn};

use crate::agent_log::AgentLog;
use crate::error::{BrokerError, BrokerResult};
use crate::params::ParamStore;
use crate::planner::{self, BestPlannerActionRequest};
use crate::policy::DecisionPolicy;
use crate::protocol::{Reply, Request};
use crate::registry::ClientRegistry;
use crate::world::{AgentType, ClientIdentity, RegisterRequest, State, WorldSnapshot};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no identity yet. Only registration and parameter pushes are accepted.
    Connected,
    /// Registered under the given identity.
    Registered(ClientIdentity),
    /// The agent said bye. The connection is about to close.
    Closed,
}

/// Per-connection request handler.
#[derive(Debug)]
pub struct Session<P: DecisionPolicy> {
    registry: ClientRegistry,
    policy: Arc<P>,
    log_dir: Option<PathBuf>,
    state: SessionState,
    params: ParamStore,
    agent_log: AgentLog,
    last_cycle: Option<i64>,
}

impl<P: DecisionPolicy> Session<P> {
    /// Fresh session in the [`SessionState::Connected`] state.
    ///
    /// With a `log_dir`, the agent gets its own debug log there once registered.
    pub fn new(registry: ClientRegistry, policy: Arc<P>, log_dir: Option<PathBuf>) -> Self {
        Session {
            registry,
            policy,
            log_dir,
            state: SessionState::Connected,
            params: ParamStore::default(),
            agent_log: AgentLog::disabled(),
            last_cycle: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Identity of the agent, once registered.
    pub fn identity(&self) -> Option<&ClientIdentity> {
        match &self.state {
            SessionState::Registered(identity) => Some(identity),
            _ => None,
        }
    }

    /// True after a bye.
    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Parameters pushed by the agent so far.
    pub fn params(&self) -> &ParamStore {
        &self.params
    }

    /// Answer one request. Failures become [`Reply::Error`]; the session stays usable.
    #[instrument(skip_all, fields(method = request.method()))]
    pub fn handle(&mut self, request: Request) -> Reply {
        let result = self.dispatch(request);
        if let Err(err) = &result {
            match err {
                BrokerError::Registry(_) | BrokerError::Transport(_) => warn!("{err}"),
                _ => debug!("{err}"),
            }
        }
        Reply::from(result)
    }

    fn dispatch(&mut self, request: Request) -> BrokerResult<Reply> {
        if self.is_closed() {
            return Err(BrokerError::protocol("session already closed by bye command"));
        }
        match request {
            Request::Register(request) => self.register(request),
            Request::SendByeCommand(identity) => self.bye(&identity),
            Request::GetPlayerActions(state) => {
                let snapshot = self.decision_snapshot(&state, AgentType::Player)?;
                debug!(
                    cycle = snapshot.cycle,
                    mode = ?snapshot.game_mode_type,
                    goalie = snapshot.myself.is_goalie,
                    kickable = snapshot.myself.is_kickable,
                    "player decision"
                );
                let actions = self.policy.player_actions(snapshot);
                trace!(?actions);
                self.agent_log
                    .record(snapshot.cycle, format_args!("GetPlayerActions -> {:?}", actions.actions));
                Ok(Reply::PlayerActions(actions))
            }
            Request::GetCoachActions(state) => {
                let snapshot = self.decision_snapshot(&state, AgentType::Coach)?;
                debug!(cycle = snapshot.cycle, "coach decision");
                let actions = self.policy.coach_actions(snapshot);
                trace!(?actions);
                self.agent_log
                    .record(snapshot.cycle, format_args!("GetCoachActions -> {:?}", actions.actions));
                Ok(Reply::CoachActions(actions))
            }
            Request::GetTrainerActions(state) => {
                let snapshot = self.decision_snapshot(&state, AgentType::Trainer)?;
                debug!(cycle = snapshot.cycle, "trainer decision");
                let actions = self.policy.trainer_actions(snapshot);
                if !actions.is_empty() {
                    debug!(cycle = snapshot.cycle, ?actions, "trainer drill");
                }
                self.agent_log
                    .record(snapshot.cycle, format_args!("GetTrainerActions -> {:?}", actions.actions));
                Ok(Reply::TrainerActions(actions))
            }
            Request::SendServerParams(params) => {
                debug!(unum = params.register_response.uniform_number, "server params received");
                self.params.set_server_params(params);
                Ok(Reply::Empty)
            }
            Request::SendPlayerParams(params) => {
                debug!(unum = params.register_response.uniform_number, "player params received");
                self.params.set_player_params(params);
                Ok(Reply::Empty)
            }
            Request::SendPlayerType(player_type) => {
                debug!(
                    unum = player_type.register_response.uniform_number,
                    id = player_type.id,
                    "player type received"
                );
                self.params.set_player_type(player_type);
                Ok(Reply::Empty)
            }
            Request::SendInitMessage(message) => {
                debug!(
                    unum = message.register_response.uniform_number,
                    debug_mode = message.debug_mode,
                    "init message received"
                );
                self.params.set_init_message(message);
                Ok(Reply::Empty)
            }
            Request::GetBestPlannerAction(request) => self.best_planner_action(&request),
        }
    }

    fn register(&mut self, request: RegisterRequest) -> BrokerResult<Reply> {
        if let Some(identity) = self.identity() {
            return Err(BrokerError::protocol(format!(
                "connection already registered as {identity}"
            )));
        }
        let identity = self.registry.register(&request)?;
        info!(%identity, "agent registered");
        if let Some(dir) = &self.log_dir {
            self.agent_log = AgentLog::open(dir, &identity);
        }
        self.state = SessionState::Registered(identity.clone());
        Ok(Reply::Registered(identity))
    }

    fn bye(&mut self, identity: &ClientIdentity) -> BrokerResult<Reply> {
        self.require_identity("SendByeCommand", identity)?;
        self.registry.unregister(identity)?;
        info!(%identity, "agent said bye");
        self.state = SessionState::Closed;
        Ok(Reply::Empty)
    }

    fn best_planner_action(&mut self, request: &BestPlannerActionRequest) -> BrokerResult<Reply> {
        self.require_identity("GetBestPlannerAction", &request.register_response)?;
        self.check_cycle(request.state.cycle)?;
        let best = planner::best_planner_action(&request.pairs)?;
        self.last_cycle = Some(request.state.cycle);
        self.agent_log.record(
            request.state.cycle,
            format_args!(
                "GetBestPlannerAction over {} entries -> {}",
                request.pairs.len(),
                best.index
            ),
        );
        Ok(Reply::BestPlannerAction(best))
    }

    /// Check that the session is registered under `claimed`.
    fn require_identity(&self, method: &str, claimed: &ClientIdentity) -> BrokerResult<()> {
        let identity = self
            .identity()
            .ok_or_else(|| BrokerError::protocol(format!("{method} before Register")))?;
        if identity.client_id != claimed.client_id {
            return Err(BrokerError::protocol(format!(
                "{method} for client {} on the connection of {identity}",
                claimed.client_id
            )));
        }
        Ok(())
    }

    /// Run the precondition checks shared by decision calls and return the snapshot.
    fn decision_snapshot<'s>(
        &mut self,
        state: &'s State,
        role: AgentType,
    ) -> BrokerResult<&'s WorldSnapshot> {
        let method = match role {
            AgentType::Player => "GetPlayerActions",
            AgentType::Coach => "GetCoachActions",
            AgentType::Trainer => "GetTrainerActions",
        };
        self.require_identity(method, &state.register_response)?;
        if let Some(identity) = self.identity() {
            if identity.agent_type != role {
                return Err(BrokerError::protocol(format!(
                    "{method} is reserved to {role} agents, this connection is {identity}"
                )));
            }
        }

        let snapshot = &state.world_model;
        self.check_cycle(snapshot.cycle)?;
        self.last_cycle = Some(snapshot.cycle);
        Ok(snapshot)
    }

    /// A cycle must be present, non-negative and not older than the last one served.
    fn check_cycle(&self, cycle: i64) -> BrokerResult<()> {
        if cycle < 0 {
            return Err(BrokerError::validation(format!(
                "cycle {cycle} is negative or absent"
            )));
        }
        match self.last_cycle {
            Some(last) if cycle < last => Err(BrokerError::validation(format!(
                "cycle went backwards from {last} to {cycle}"
            ))),
            _ => Ok(()),
        }
    }
}
