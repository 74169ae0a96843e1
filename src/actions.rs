//! Candidate actions returned to agents, one closed set per role.
//!
//! The service never executes these; the agent-side proxy picks or combines them.

use serde::{Deserialize, Serialize};

use crate::world::{GameModeType, Vector2D};

/// Capabilities the offensive planner is allowed to try.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OffensivePlannerFlags {
    pub lead_pass: bool,
    pub direct_pass: bool,
    pub through_pass: bool,
    pub simple_pass: bool,
    pub short_dribble: bool,
    pub long_dribble: bool,
    pub simple_shoot: bool,
    pub simple_dribble: bool,
    pub cross: bool,
    pub server_side_decision: bool,
}

impl OffensivePlannerFlags {
    /// Every capability switched on.
    pub const fn all() -> Self {
        Self {
            lead_pass: true,
            direct_pass: true,
            through_pass: true,
            simple_pass: true,
            short_dribble: true,
            long_dribble: true,
            simple_shoot: true,
            simple_dribble: true,
            cross: true,
            server_side_decision: true,
        }
    }
}

/// One candidate behavior for a player.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlayerAction {
    GoalieBehavior,
    OffensivePlannerBehavior(OffensivePlannerFlags),
    ShootBehavior,
    BasicMoveBehavior,
    SetPlayBehavior,
}

/// Candidate behaviors for the coach.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CoachAction {
    SubstituteBehavior,
}

/// Scripted simulator overrides issued by the trainer.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrainerAction {
    MoveBall {
        position: Vector2D,
        velocity: Vector2D,
    },
    MovePlayer {
        our_side: bool,
        uniform_number: u32,
        position: Vector2D,
        body_direction: f64,
    },
    ChangeMode {
        game_mode_type: GameModeType,
    },
}

/// Ordered player candidates; downstream picks among them.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlayerActions {
    pub actions: Vec<PlayerAction>,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CoachActions {
    pub actions: Vec<CoachAction>,
}

/// Ordered trainer commands. Order is significant.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrainerActions {
    pub actions: Vec<TrainerAction>,
}

impl TrainerActions {
    /// True when the trainer should do nothing this cycle.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
