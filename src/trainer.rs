//! Scripted trainer drill: every hundred cycles, put the ball in front of a teammate and
//! restart play.

use crate::actions::{TrainerAction, TrainerActions};
use crate::world::{GameModeType, Vector2D, WorldSnapshot};

/// Fires on a fixed cycle cadence and resets the ball next to the first teammate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainerCadence {
    /// Length of one drill period, in cycles.
    pub period: i64,
    /// Cycle within the period on which the drill fires.
    pub phase: i64,
    /// Where the ball goes, relative to the chosen teammate.
    pub offset: Vector2D,
}

impl Default for TrainerCadence {
    fn default() -> Self {
        Self {
            period: 100,
            phase: 99,
            offset: Vector2D::new(10.0, 10.0),
        }
    }
}

impl TrainerCadence {
    /// True on the cycles the drill fires.
    pub fn triggers_on(&self, cycle: i64) -> bool {
        self.period > 0 && cycle.rem_euclid(self.period) == self.phase
    }

    /// Trainer commands for this snapshot.
    ///
    /// Off-cadence cycles and an empty teammate list both give an empty bundle. Otherwise the
    /// bundle is, in this order: move the ball, move the teammate, switch to play-on.
    pub fn actions(&self, snapshot: &WorldSnapshot) -> TrainerActions {
        if !self.triggers_on(snapshot.cycle) {
            return TrainerActions::default();
        }
        let Some(player) = snapshot.teammates.first() else {
            return TrainerActions::default();
        };
        let target = player.position + self.offset;
        TrainerActions {
            actions: vec![
                TrainerAction::MoveBall {
                    position: target,
                    velocity: Vector2D::zero(),
                },
                TrainerAction::MovePlayer {
                    our_side: true,
                    uniform_number: player.uniform_number,
                    position: target,
                    body_direction: 0.0,
                },
                TrainerAction::ChangeMode {
                    game_mode_type: GameModeType::PlayOn,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::PlayerState;

    fn snapshot(cycle: i64, teammates: Vec<PlayerState>) -> WorldSnapshot {
        WorldSnapshot {
            cycle,
            game_mode_type: GameModeType::PlayOn,
            teammates,
            ..Default::default()
        }
    }

    fn mate(unum: u32, x: f64, y: f64) -> PlayerState {
        PlayerState {
            position: Vector2D::new(x, y),
            uniform_number: unum,
            is_goalie: false,
        }
    }

    #[test]
    fn fires_only_on_phase() {
        let trainer = TrainerCadence::default();
        let team = vec![mate(5, 0.0, 0.0)];
        for cycle in [0, 1, 98, 100, 150, 198, 1000] {
            assert!(trainer.actions(&snapshot(cycle, team.clone())).is_empty(), "{cycle}");
        }
        for cycle in [99, 199, 5999] {
            assert_eq!(trainer.actions(&snapshot(cycle, team.clone())).actions.len(), 3);
        }
    }

    #[test]
    fn empty_team_is_not_an_error() {
        let trainer = TrainerCadence::default();
        assert!(trainer.actions(&snapshot(99, vec![])).is_empty());
    }

    #[test]
    fn drill_targets_first_teammate() {
        let trainer = TrainerCadence::default();
        let out = trainer.actions(&snapshot(299, vec![mate(9, -20.0, 5.5), mate(2, 30.0, 30.0)]));
        let target = Vector2D::new(-10.0, 15.5);
        assert_eq!(
            out.actions,
            vec![
                TrainerAction::MoveBall {
                    position: target,
                    velocity: Vector2D::zero(),
                },
                TrainerAction::MovePlayer {
                    our_side: true,
                    uniform_number: 9,
                    position: target,
                    body_direction: 0.0,
                },
                TrainerAction::ChangeMode {
                    game_mode_type: GameModeType::PlayOn,
                },
            ]
        );
    }
}
