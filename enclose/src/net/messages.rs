use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::{ProtocolError, Result};
use crate::game::{GameState, Seat};

/// A message from the server to one participant.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage<'a> {
    /// Sent once, right after a successful admission.
    #[serde(rename = "connection", rename_all = "camelCase")]
    Connection {
        game_id: &'a str,
        player_id: &'a str,
        player_number: Seat,
    },
    /// Sent once when admission is refused; the connection closes after it.
    #[serde(rename = "error")]
    Error { message: &'a str },
    /// Full state snapshot, sent after every state change.
    #[serde(rename = "gameState")]
    GameState { state: &'a GameState },
}

impl ServerMessage<'_> {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Inbound command as it appears on the wire.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum WireCommand {
    Move {
        x: f64,
        y: f64,
    },
    Ready,
    Reset,
    #[serde(other)]
    Unknown,
}

/// A command from a participant.
///
/// Identity always comes from the connection; any `playerId` carried in the
/// frame is ignored.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(from = "WireCommand")]
pub enum ClientMessage {
    /// Claim a cell. Fractional coordinates are truncated toward zero.
    Move { x: i64, y: i64 },
    Ready,
    Reset,
    /// A well-formed object with an unrecognized `type`.
    Unknown,
}

impl From<WireCommand> for ClientMessage {
    fn from(command: WireCommand) -> Self {
        match command {
            // Float to int casts saturate, so huge values land off the board.
            WireCommand::Move { x, y } => Self::Move {
                x: x.trunc() as i64,
                y: y.trunc() as i64,
            },
            WireCommand::Ready => Self::Ready,
            WireCommand::Reset => Self::Reset,
            WireCommand::Unknown => Self::Unknown,
        }
    }
}

/// A decoded inbound frame before its command is interpreted.
///
/// Decoding happens in two steps so that any well-formed JSON object counts
/// as activity from the sender, even if its command turns out to be unusable.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope(Map<String, Value>);

impl Envelope {
    /// Parse a text frame. Anything but a JSON object is rejected.
    pub fn parse(text: &str) -> Result<Self> {
        match serde_json::from_str(text)? {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(ProtocolError::NotAnObject),
        }
    }

    /// Interpret the object as a command.
    pub fn into_command(self) -> Result<ClientMessage> {
        serde_json::from_value(Value::Object(self.0))
            .map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn command(text: &str) -> Result<ClientMessage> {
        Envelope::parse(text)?.into_command()
    }

    #[test]
    fn test_commands_decode() {
        assert_eq!(
            command(r#"{"type":"move","x":3,"y":4}"#).unwrap(),
            ClientMessage::Move { x: 3, y: 4 }
        );
        assert_eq!(command(r#"{"type":"ready"}"#).unwrap(), ClientMessage::Ready);
        assert_eq!(command(r#"{"type":"reset"}"#).unwrap(), ClientMessage::Reset);
        assert_eq!(command(r#"{"type":"chat","text":"hi"}"#).unwrap(), ClientMessage::Unknown);
    }

    #[test]
    fn test_coordinates_truncate() {
        assert_eq!(
            command(r#"{"type":"move","x":5.9,"y":0.2}"#).unwrap(),
            ClientMessage::Move { x: 5, y: 0 }
        );
        assert_eq!(
            command(r#"{"type":"move","x":-0.5,"y":1e300}"#).unwrap(),
            ClientMessage::Move { x: 0, y: i64::MAX }
        );
    }

    #[test]
    fn test_in_band_player_id_ignored() {
        assert_eq!(
            command(r#"{"type":"ready","playerId":"player-someone-else"}"#).unwrap(),
            ClientMessage::Ready
        );
        assert_eq!(
            command(r#"{"type":"move","x":1,"y":2,"playerId":"x"}"#).unwrap(),
            ClientMessage::Move { x: 1, y: 2 }
        );
    }

    #[test]
    fn test_malformed_moves_rejected() {
        assert!(matches!(
            command(r#"{"type":"move","x":1}"#),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            command(r#"{"type":"move","x":"1","y":2}"#),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(command(r#"{"x":1,"y":2}"#), Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn test_non_objects_rejected() {
        assert!(matches!(Envelope::parse("not json"), Err(ProtocolError::Json(_))));
        assert!(matches!(Envelope::parse("[1,2]"), Err(ProtocolError::NotAnObject)));
        assert!(matches!(Envelope::parse("\"ready\""), Err(ProtocolError::NotAnObject)));
    }

    #[test]
    fn test_outbound_shapes() {
        let connection = ServerMessage::Connection {
            game_id: "game-1",
            player_id: "player-1",
            player_number: Seat::Two,
        };
        let value: Value = serde_json::from_str(&connection.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type": "connection", "gameId": "game-1", "playerId": "player-1", "playerNumber": 2})
        );

        let error = ServerMessage::Error { message: "Game is full" };
        let value: Value = serde_json::from_str(&error.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"type": "error", "message": "Game is full"}));

        let state = GameState::new(2);
        let snapshot = ServerMessage::GameState { state: &state };
        let value: Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "gameState");
        assert_eq!(value["state"]["currentTurn"], 1);
        assert_eq!(value["state"]["lastMoveAt"], Value::Null);
        assert_eq!(value["state"]["grid"][1][0], json!({"x": 0, "y": 1, "owner": 0, "sealed": false}));
    }
}
