//! Best-candidate selection over externally scored planner entries.
//!
//! Entries are ranked by the predicted ball x coordinate. Continuation actions (whose parent
//! is another candidate) are pushed down to [`NON_ROOT_RANK`] so a root action always beats
//! them. Entries are scanned by ascending index and only a strictly better rank replaces the
//! current best, so equal ranks resolve to the lowest index.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BrokerError, BrokerResult};
use crate::world::{ClientIdentity, Vector2D, WorldSnapshot};

/// `parent_index` of an action that does not continue another one.
pub const ROOT_PARENT: i32 = -1;

/// Rank given to every non-root action.
pub const NON_ROOT_RANK: f64 = -1000.0;

/// The candidate action a planner entry describes.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateAction {
    pub index: i32,
    pub parent_index: i32,
    pub description: String,
    pub category: String,
    pub target_uniform_number: u32,
    pub target_point: Vector2D,
    pub duration_step: i64,
}

impl Default for CandidateAction {
    fn default() -> Self {
        Self {
            index: 0,
            parent_index: ROOT_PARENT,
            description: String::new(),
            category: String::new(),
            target_uniform_number: 0,
            target_point: Vector2D::zero(),
            duration_step: 0,
        }
    }
}

impl CandidateAction {
    /// True when the action is not a continuation of another candidate.
    pub fn is_root(&self) -> bool {
        self.parent_index == ROOT_PARENT
    }
}

/// World state the evaluator predicts after the action.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictedState {
    pub ball_position: Vector2D,
    pub ball_velocity: Vector2D,
    pub self_position: Vector2D,
    pub ball_holder_uniform_number: u32,
    pub spend_time: i64,
}

/// One pre-scored candidate.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerEntry {
    pub index: i32,
    pub candidate_action: CandidateAction,
    pub predicted_state: PredictedState,
    pub evaluation: f64,
}

impl PlannerEntry {
    /// Ranking key: the predicted ball x for root actions, [`NON_ROOT_RANK`] otherwise.
    ///
    /// A NaN coordinate ranks below everything, disqualified entries included.
    pub fn rank(&self) -> f64 {
        if !self.candidate_action.is_root() {
            return NON_ROOT_RANK;
        }
        let x = self.predicted_state.ball_position.x;
        if x.is_nan() {
            f64::NEG_INFINITY
        } else {
            x
        }
    }
}

/// Request body of `GetBestPlannerAction`. The map key is the authoritative entry index.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestPlannerActionRequest {
    pub register_response: ClientIdentity,
    pub pairs: BTreeMap<i32, PlannerEntry>,
    #[serde(default = "WorldSnapshot::absent")]
    pub state: WorldSnapshot,
}

/// Index of the selected entry. The caller looks the action up on its side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestPlannerAction {
    /// Key of the winning entry.
    pub index: i32,
}

/// Pick the best entry.
///
/// # Errors
/// [`BrokerError::Validation`] when `entries` is empty.
pub fn best_planner_action(entries: &BTreeMap<i32, PlannerEntry>) -> BrokerResult<BestPlannerAction> {
    let mut ranked = entries.iter().map(|(&index, entry)| (index, entry.rank()));
    let first = ranked
        .next()
        .ok_or_else(|| BrokerError::validation("planner entry set must not be empty"))?;
    let (index, rank) = ranked.fold(first, |best, candidate| {
        if candidate.1 > best.1 {
            candidate
        } else {
            best
        }
    });
    debug!(index, rank, candidates = entries.len(), "selected planner action");
    Ok(BestPlannerAction { index })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(parent_index: i32, ball_x: f64, evaluation: f64) -> PlannerEntry {
        PlannerEntry {
            candidate_action: CandidateAction {
                parent_index,
                ..Default::default()
            },
            predicted_state: PredictedState {
                ball_position: Vector2D::new(ball_x, 0.0),
                ..Default::default()
            },
            evaluation,
            ..Default::default()
        }
    }

    fn select(entries: Vec<(i32, PlannerEntry)>) -> BrokerResult<i32> {
        best_planner_action(&entries.into_iter().collect()).map(|best| best.index)
    }

    #[test]
    fn empty_set_is_rejected() {
        assert!(matches!(select(vec![]), Err(BrokerError::Validation(_))));
    }

    #[test]
    fn non_root_loses_despite_higher_evaluation() {
        let winner = select(vec![
            (0, entry(-1, 12.0, 5.0)),
            (1, entry(2, 50.0, 9.0)),
            (2, entry(-1, 30.0, 3.0)),
        ]);
        assert_eq!(winner.unwrap(), 2);
    }

    #[test]
    fn ranks_by_ball_x_not_evaluation() {
        let winner = select(vec![(3, entry(-1, -5.0, 100.0)), (8, entry(-1, 4.0, -1.0))]);
        assert_eq!(winner.unwrap(), 8);
    }

    #[test]
    fn root_below_disqualification_constant_still_wins() {
        let winner = select(vec![(0, entry(4, 0.0, 0.0)), (1, entry(-1, -2000.0, 0.0))]);
        assert_eq!(winner.unwrap(), 0);
        let winner = select(vec![(0, entry(4, 0.0, 0.0)), (1, entry(-1, -999.0, 0.0))]);
        assert_eq!(winner.unwrap(), 1);
    }

    #[test]
    fn ties_go_to_lowest_index() {
        let winner = select(vec![(7, entry(-1, 10.0, 0.0)), (2, entry(-1, 10.0, 0.0))]);
        assert_eq!(winner.unwrap(), 2);

        let all_disqualified = select(vec![
            (5, entry(1, 40.0, 0.0)),
            (3, entry(0, 20.0, 0.0)),
            (9, entry(2, 60.0, 0.0)),
        ]);
        assert_eq!(all_disqualified.unwrap(), 3);
    }

    #[test]
    fn nan_ball_position_never_wins() {
        let winner = select(vec![(0, entry(-1, f64::NAN, 0.0)), (1, entry(6, 0.0, 0.0))]);
        assert_eq!(winner.unwrap(), 1);
    }

    #[test]
    fn integer_keys_survive_json() {
        let request = BestPlannerActionRequest {
            register_response: ClientIdentity {
                client_id: 1,
                team_name: "CLS".to_owned(),
                uniform_number: 10,
                agent_type: crate::world::AgentType::Player,
            },
            pairs: [(-3, entry(-1, 1.0, 0.0)), (4, entry(-1, 2.0, 0.0))]
                .into_iter()
                .collect(),
            state: WorldSnapshot::default(),
        };
        let json = serde_json::to_string(&request).unwrap();
        let back: BestPlannerActionRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.pairs.keys().copied().collect::<Vec<_>>(), vec![-3, 4]);
    }
}
