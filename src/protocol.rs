//! Wire format between agents and the server.
//!
//! Every message is one frame: a little-endian `u32` byte length followed by a JSON body.
//! Requests are adjacently tagged (`{"method": "...", "params": ...}`), replies carry a
//! `"type"` tag. One reply is written per request, in request order.

use std::io::{self, Read, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::actions::{CoachActions, PlayerActions, TrainerActions};
use crate::error::{BrokerError, BrokerResult, ErrorKind};
use crate::params::{InitMessage, PlayerParam, PlayerType, ServerParam};
use crate::planner::{BestPlannerAction, BestPlannerActionRequest};
use crate::world::{ClientIdentity, RegisterRequest, State};

/// Frames above this size are refused and the connection is dropped.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// An RPC call from an agent.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum Request {
    Register(RegisterRequest),
    SendByeCommand(ClientIdentity),
    GetPlayerActions(State),
    GetCoachActions(State),
    GetTrainerActions(State),
    SendServerParams(ServerParam),
    SendPlayerParams(PlayerParam),
    SendPlayerType(PlayerType),
    SendInitMessage(InitMessage),
    GetBestPlannerAction(BestPlannerActionRequest),
}

impl Request {
    /// RPC method name, for logs.
    pub fn method(&self) -> &'static str {
        match self {
            Request::Register(_) => "Register",
            Request::SendByeCommand(_) => "SendByeCommand",
            Request::GetPlayerActions(_) => "GetPlayerActions",
            Request::GetCoachActions(_) => "GetCoachActions",
            Request::GetTrainerActions(_) => "GetTrainerActions",
            Request::SendServerParams(_) => "SendServerParams",
            Request::SendPlayerParams(_) => "SendPlayerParams",
            Request::SendPlayerType(_) => "SendPlayerType",
            Request::SendInitMessage(_) => "SendInitMessage",
            Request::GetBestPlannerAction(_) => "GetBestPlannerAction",
        }
    }
}

/// Failure reported to the agent.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct ErrorReply {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&BrokerError> for ErrorReply {
    fn from(err: &BrokerError) -> Self {
        ErrorReply {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Server answer to one [`Request`].
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Reply {
    Registered(ClientIdentity),
    Empty,
    PlayerActions(PlayerActions),
    CoachActions(CoachActions),
    TrainerActions(TrainerActions),
    BestPlannerAction(BestPlannerAction),
    Error(ErrorReply),
}

impl From<BrokerError> for Reply {
    fn from(err: BrokerError) -> Self {
        Reply::Error(ErrorReply::from(&err))
    }
}

impl From<BrokerResult<Reply>> for Reply {
    fn from(result: BrokerResult<Reply>) -> Self {
        result.unwrap_or_else(Reply::from)
    }
}

/// Write `payload` as one frame.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("frame of {} bytes exceeds {MAX_FRAME_LEN}", payload.len()),
        ));
    }
    let len = payload.len() as u32;
    let mut buffer = Vec::with_capacity(4 + payload.len());
    buffer.extend_from_slice(&len.to_le_bytes());
    buffer.extend_from_slice(payload);
    writer.write_all(&buffer)?;
    writer.flush()
}

/// Read one frame. `Ok(None)` means the peer closed the connection between frames.
pub fn read_frame<R: Read>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut header = [0u8; 4];
    let mut filled = 0;
    while filled < header.len() {
        match reader.read(&mut header[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed inside a frame header",
                ))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    let len = u32::from_le_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("incoming frame of {len} bytes exceeds {MAX_FRAME_LEN}"),
        ));
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    Ok(Some(payload))
}

/// Serialize `message` and write it as one frame.
pub fn send<W: Write, T: Serialize>(writer: &mut W, message: &T) -> io::Result<()> {
    let payload = serde_json::to_vec(message)?;
    write_frame(writer, &payload)
}

/// Read and decode one frame. `Ok(None)` on a clean close.
pub fn receive<R: Read, T: DeserializeOwned>(reader: &mut R) -> io::Result<Option<T>> {
    match read_frame(reader)? {
        Some(payload) => Ok(Some(serde_json::from_slice(&payload)?)),
        None => Ok(None),
    }
}

/// Decode a request body. A body that is not a valid request is a protocol error; the
/// connection itself is still usable.
pub fn decode_request(payload: &[u8]) -> BrokerResult<Request> {
    serde_json::from_slice(payload)
        .map_err(|e| BrokerError::protocol(format!("malformed request: {e}")))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::world::AgentType;

    #[test]
    fn frames_are_length_prefixed() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"{}").unwrap();
        assert_eq!(buf, vec![2, 0, 0, 0, b'{', b'}']);

        let mut cursor = Cursor::new(buf);
        assert_eq!(read_frame(&mut cursor).unwrap().unwrap(), b"{}");
        assert!(read_frame(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn truncated_frame_is_an_error() {
        let mut cursor = Cursor::new(vec![10, 0, 0, 0, b'x']);
        let err = read_frame(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        let mut cursor = Cursor::new(vec![1, 0]);
        assert_eq!(read_frame(&mut cursor).unwrap_err().kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn oversized_frame_is_refused() {
        let header = ((MAX_FRAME_LEN + 1) as u32).to_le_bytes().to_vec();
        let err = read_frame(&mut Cursor::new(header)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn request_wire_shape() {
        let request: Request = serde_json::from_str(
            r#"{"method":"Register","params":{"team_name":"CLS","uniform_number":3,"agent_type":"Player"}}"#,
        )
        .unwrap();
        assert_eq!(
            request,
            Request::Register(RegisterRequest {
                team_name: "CLS".to_owned(),
                uniform_number: 3,
                agent_type: AgentType::Player,
            })
        );
        assert_eq!(request.method(), "Register");
    }

    #[test]
    fn garbage_is_a_protocol_error() {
        let err = decode_request(br#"{"method":"Teleport","params":{}}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        let err = decode_request(b"not json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn error_results_become_error_replies() {
        let reply = Reply::from(BrokerResult::<Reply>::Err(BrokerError::validation("empty")));
        match reply {
            Reply::Error(e) => {
                assert_eq!(e.kind, ErrorKind::Validation);
                assert_eq!(e.message, "validation error: empty");
            }
            other => panic!("unexpected {other:?}"),
        }
        let json = serde_json::to_string(&Reply::Empty).unwrap();
        assert_eq!(json, r#"{"type":"Empty"}"#);
    }
}
