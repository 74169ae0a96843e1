//! Per-cycle decisions for players and the coach.

use crate::actions::{CoachAction, CoachActions, OffensivePlannerFlags, PlayerAction, PlayerActions};
use crate::world::WorldSnapshot;

/// Candidate actions for a player.
///
/// Depends only on the play mode and the goalie/kickable flags, checked in that order:
///
/// | mode       | goalie | kickable | candidates                              |
/// |------------|--------|----------|-----------------------------------------|
/// | PlayOn     | yes    | any      | `GoalieBehavior`                        |
/// | PlayOn     | no     | yes      | `OffensivePlannerBehavior`, `ShootBehavior` |
/// | PlayOn     | no     | no       | `BasicMoveBehavior`                     |
/// | stoppage   | any    | any      | `SetPlayBehavior`                       |
pub fn player_actions(snapshot: &WorldSnapshot) -> PlayerActions {
    let me = &snapshot.myself;
    let actions = match (snapshot.game_mode_type.is_play_on(), me.is_goalie, me.is_kickable) {
        (true, true, _) => vec![PlayerAction::GoalieBehavior],
        (true, false, true) => vec![
            PlayerAction::OffensivePlannerBehavior(OffensivePlannerFlags::all()),
            PlayerAction::ShootBehavior,
        ],
        (true, false, false) => vec![PlayerAction::BasicMoveBehavior],
        (false, _, _) => vec![PlayerAction::SetPlayBehavior],
    };
    PlayerActions { actions }
}

/// The coach always gets a single substitution candidate.
pub fn coach_actions(_snapshot: &WorldSnapshot) -> CoachActions {
    CoachActions {
        actions: vec![CoachAction::SubstituteBehavior],
    }
}
