//! Per-cycle world snapshots and client identities.
//!
//! Everything in this module is plain data exchanged with agents. A [`WorldSnapshot`] is
//! produced by the agent's own world model and is only ever read by the service.

use std::fmt;
use std::ops::Add;

use serde::{Deserialize, Serialize};

/// A point or vector on the pitch.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector2D {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Vector2D {
    /// Create a vector from its coordinates.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// The null vector.
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl Add for Vector2D {
    type Output = Vector2D;

    fn add(self, rhs: Vector2D) -> Vector2D {
        Vector2D::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl fmt::Display for Vector2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

/// Referee play modes. Everything except [`GameModeType::PlayOn`] is a stoppage.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GameModeType {
    #[default]
    BeforeKickOff,
    TimeOver,
    PlayOn,
    KickOff,
    KickIn,
    FreeKick,
    CornerKick,
    GoalKick,
    AfterGoal,
    OffSide,
    PenaltyKick,
    FirstHalfOver,
    Pause,
    Human,
    FoulCharge,
    FoulPush,
    FoulMultipleAttacker,
    FoulBallOut,
    BackPass,
    FreeKickFault,
    CatchFault,
    IndFreeKick,
    PenaltySetup,
    PenaltyReady,
    PenaltyTaken,
    PenaltyMiss,
    PenaltyScore,
    IllegalDefense,
    PenaltyOnfield,
    PenaltyFoul,
    GoalieCatch,
    ExtendHalf,
}

impl GameModeType {
    /// True while the ball is in open play.
    pub fn is_play_on(self) -> bool {
        self == GameModeType::PlayOn
    }
}

/// The agent's view of itself.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SelfState {
    pub position: Vector2D,
    pub uniform_number: u32,
    pub is_goalie: bool,
    pub is_kickable: bool,
    pub body_direction: f64,
}

/// Any other player on the pitch.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerState {
    pub position: Vector2D,
    pub uniform_number: u32,
    pub is_goalie: bool,
}

/// Ball as seen by the agent.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BallState {
    pub position: Vector2D,
    pub velocity: Vector2D,
}

/// Which half of the field the agent's team defends.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Side {
    #[default]
    Unknown,
    Left,
    Right,
}

/// Immutable per-cycle view supplied by an agent.
///
/// `teammates` keeps the order the agent sent it in; index 0 has no meaning beyond that.
/// A snapshot without a `cycle` decodes with [`WorldSnapshot::ABSENT_CYCLE`], which sessions
/// reject like any other negative cycle.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldSnapshot {
    #[serde(default = "WorldSnapshot::absent_cycle")]
    pub cycle: i64,
    pub stopped_cycle: i64,
    pub game_mode_type: GameModeType,
    pub our_side: Side,
    pub myself: SelfState,
    pub ball: BallState,
    pub teammates: Vec<PlayerState>,
    pub opponents: Vec<PlayerState>,
}

impl WorldSnapshot {
    /// Cycle value of a snapshot that did not carry one.
    pub const ABSENT_CYCLE: i64 = -1;

    fn absent_cycle() -> i64 {
        Self::ABSENT_CYCLE
    }

    /// Stand-in for a snapshot the agent did not send at all.
    pub(crate) fn absent() -> Self {
        WorldSnapshot {
            cycle: Self::ABSENT_CYCLE,
            ..Default::default()
        }
    }
}

/// Role of a connected client.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentType {
    Player,
    Coach,
    Trainer,
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AgentType::Player => "player",
            AgentType::Coach => "coach",
            AgentType::Trainer => "trainer",
        };
        f.write_str(name)
    }
}

/// What an agent sends to register.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub team_name: String,
    pub uniform_number: u32,
    pub agent_type: AgentType,
}

/// Identity handed out by a successful registration.
///
/// `client_id` is unique over the lifetime of the service process group.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientIdentity {
    pub client_id: u64,
    pub team_name: String,
    pub uniform_number: u32,
    pub agent_type: AgentType,
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.agent_type {
            AgentType::Player => write!(
                f,
                "#{} {} player {}",
                self.client_id, self.team_name, self.uniform_number
            ),
            other => write!(f, "#{} {} {}", self.client_id, self.team_name, other),
        }
    }
}

/// A decision request: the caller's identity and its current snapshot.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub register_response: ClientIdentity,
    pub world_model: WorldSnapshot,
}
