//! Simulator parameters pushed by agents.
//!
//! The service keeps the latest copy of each blob for the session that sent it and does not
//! interpret the contents beyond a few fields it needs for bookkeeping.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::world::ClientIdentity;

/// Soccer-server parameters.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerParam {
    pub register_response: ClientIdentity,
    #[serde(flatten)]
    pub values: Map<String, Value>,
}

/// Heterogeneous-player generation parameters.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerParam {
    pub register_response: ClientIdentity,
    #[serde(flatten)]
    pub values: Map<String, Value>,
}

/// One heterogeneous player type.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerType {
    pub register_response: ClientIdentity,
    pub id: i32,
    #[serde(flatten)]
    pub values: Map<String, Value>,
}

/// First message of an agent after registering.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitMessage {
    pub register_response: ClientIdentity,
    #[serde(default)]
    pub debug_mode: bool,
    #[serde(flatten)]
    pub values: Map<String, Value>,
}

/// Last-write-wins store of everything an agent pushed.
#[derive(Debug, Default)]
pub struct ParamStore {
    server_params: Option<ServerParam>,
    player_params: Option<PlayerParam>,
    player_types: HashMap<i32, PlayerType>,
    debug_mode: bool,
}

impl ParamStore {
    #[allow(missing_docs)]
    pub fn set_server_params(&mut self, params: ServerParam) {
        self.server_params = Some(params);
    }

    #[allow(missing_docs)]
    pub fn set_player_params(&mut self, params: PlayerParam) {
        self.player_params = Some(params);
    }

    /// Replaces any type previously stored under the same id.
    pub fn set_player_type(&mut self, player_type: PlayerType) {
        self.player_types.insert(player_type.id, player_type);
    }

    #[allow(missing_docs)]
    pub fn set_init_message(&mut self, message: InitMessage) {
        self.debug_mode = message.debug_mode;
    }

    #[allow(missing_docs)]
    pub fn server_params(&self) -> Option<&ServerParam> {
        self.server_params.as_ref()
    }

    #[allow(missing_docs)]
    pub fn player_params(&self) -> Option<&PlayerParam> {
        self.player_params.as_ref()
    }

    #[allow(missing_docs)]
    pub fn player_type(&self, id: i32) -> Option<&PlayerType> {
        self.player_types.get(&id)
    }

    /// Number of distinct player types received.
    pub fn player_type_count(&self) -> usize {
        self.player_types.len()
    }

    /// Whether the agent asked for debug mode in its init message.
    pub fn debug_mode(&self) -> bool {
        self.debug_mode
    }
}
