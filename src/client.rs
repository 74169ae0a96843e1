use std::collections::BTreeMap;
use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use tracing::instrument;

use crate::actions::{CoachActions, PlayerActions, TrainerActions};
use crate::planner::{BestPlannerAction, BestPlannerActionRequest, PlannerEntry};
use crate::protocol::{self, Reply, Request};
use crate::world::{AgentType, ClientIdentity, RegisterRequest, State, WorldSnapshot};

/// Blocking agent-side connection, one request in flight at a time.
///
/// Error replies from the server surface as an [`anyhow::Error`] wrapping a
/// [`protocol::ErrorReply`], so callers can `downcast_ref` it to inspect the kind.
#[derive(Debug)]
pub struct AgentClient {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    identity: Option<ClientIdentity>,
}

impl AgentClient {
    const RESPONSE_TIMEOUT_DURATION: Duration = Duration::from_secs(5);

    /// Connect to a running server.
    pub fn connect(addr: impl ToSocketAddrs) -> anyhow::Result<AgentClient> {
        let stream = TcpStream::connect(addr).context("could not connect to server")?;
        stream
            .set_read_timeout(Some(Self::RESPONSE_TIMEOUT_DURATION))
            .context("setting read timeout")?;
        stream.set_nodelay(true).context("setting TCP_NODELAY")?;
        Ok(AgentClient {
            reader: BufReader::new(stream.try_clone().context("cloning stream")?),
            writer: BufWriter::new(stream),
            identity: None,
        })
    }

    /// Identity returned by the last successful [`AgentClient::register`].
    pub fn identity(&self) -> Option<&ClientIdentity> {
        self.identity.as_ref()
    }

    /// Send one request and wait for its reply, whatever it is.
    #[instrument(skip_all, fields(method = request.method()))]
    pub fn call(&mut self, request: &Request) -> anyhow::Result<Reply> {
        protocol::send(&mut self.writer, request).context("I/O error while sending request")?;
        protocol::receive(&mut self.reader)
            .context("error while reading reply")?
            .ok_or_else(|| anyhow!("connection closed by server"))
    }

    /// Register and remember the identity for later calls.
    pub fn register(
        &mut self,
        team_name: &str,
        uniform_number: u32,
        agent_type: AgentType,
    ) -> anyhow::Result<ClientIdentity> {
        let request = Request::Register(RegisterRequest {
            team_name: team_name.to_owned(),
            uniform_number,
            agent_type,
        });
        match self.call(&request)? {
            Reply::Registered(identity) => {
                self.identity = Some(identity.clone());
                Ok(identity)
            }
            other => Err(unexpected(other)),
        }
    }

    /// Ask for player candidates for `world`.
    pub fn player_actions(&mut self, world: WorldSnapshot) -> anyhow::Result<PlayerActions> {
        let request = Request::GetPlayerActions(self.state(world)?);
        match self.call(&request)? {
            Reply::PlayerActions(actions) => Ok(actions),
            other => Err(unexpected(other)),
        }
    }

    /// Ask for coach candidates for `world`.
    pub fn coach_actions(&mut self, world: WorldSnapshot) -> anyhow::Result<CoachActions> {
        let request = Request::GetCoachActions(self.state(world)?);
        match self.call(&request)? {
            Reply::CoachActions(actions) => Ok(actions),
            other => Err(unexpected(other)),
        }
    }

    /// Ask for trainer commands for `world`.
    pub fn trainer_actions(&mut self, world: WorldSnapshot) -> anyhow::Result<TrainerActions> {
        let request = Request::GetTrainerActions(self.state(world)?);
        match self.call(&request)? {
            Reply::TrainerActions(actions) => Ok(actions),
            other => Err(unexpected(other)),
        }
    }

    /// Let the server pick among scored planner entries.
    pub fn best_planner_action(
        &mut self,
        pairs: BTreeMap<i32, PlannerEntry>,
        world: WorldSnapshot,
    ) -> anyhow::Result<BestPlannerAction> {
        let State {
            register_response,
            world_model,
        } = self.state(world)?;
        let request = Request::GetBestPlannerAction(BestPlannerActionRequest {
            register_response,
            pairs,
            state: world_model,
        });
        match self.call(&request)? {
            Reply::BestPlannerAction(best) => Ok(best),
            other => Err(unexpected(other)),
        }
    }

    /// Say bye. The server closes the connection afterwards.
    pub fn bye(mut self) -> anyhow::Result<()> {
        let identity = self.identity.clone().context("bye before register")?;
        match self.call(&Request::SendByeCommand(identity))? {
            Reply::Empty => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    fn state(&self, world: WorldSnapshot) -> anyhow::Result<State> {
        let Some(identity) = self.identity.clone() else {
            bail!("not registered yet");
        };
        Ok(State {
            register_response: identity,
            world_model: world,
        })
    }
}

fn unexpected(reply: Reply) -> anyhow::Error {
    match reply {
        Reply::Error(e) => anyhow::Error::new(e),
        other => anyhow!("unexpected reply {other:?}"),
    }
}
