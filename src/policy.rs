//! Trait an embedder implements to plug its own decisions into the server.
//!
//! The server only needs three role-specific decision functions. [`BasePolicy`] provides the
//! stock behavior; a custom policy can wrap it and override one role.

use crate::actions::{CoachActions, PlayerActions, TrainerActions};
use crate::dispatcher;
use crate::trainer::TrainerCadence;
use crate::world::WorldSnapshot;

/// Decision functions called once per cycle per agent.
///
/// Implementations are shared by every session thread and must not block on other agents.
pub trait DecisionPolicy: Send + Sync + 'static {
    /// Candidates for a player.
    fn player_actions(&self, snapshot: &WorldSnapshot) -> PlayerActions;

    /// Candidates for the coach.
    fn coach_actions(&self, snapshot: &WorldSnapshot) -> CoachActions;

    /// Commands for the trainer. An empty bundle means "leave the simulation alone".
    fn trainer_actions(&self, snapshot: &WorldSnapshot) -> TrainerActions;
}

/// Stock policy: the mode/flag dispatch for players, a fixed substitution for the coach and
/// the periodic drill for the trainer.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasePolicy {
    /// Trainer drill settings.
    pub trainer: TrainerCadence,
}

impl DecisionPolicy for BasePolicy {
    fn player_actions(&self, snapshot: &WorldSnapshot) -> PlayerActions {
        dispatcher::player_actions(snapshot)
    }

    fn coach_actions(&self, snapshot: &WorldSnapshot) -> CoachActions {
        dispatcher::coach_actions(snapshot)
    }

    fn trainer_actions(&self, snapshot: &WorldSnapshot) -> TrainerActions {
        self.trainer.actions(snapshot)
    }
}
