// Copyright 2020 Zachary Stewart
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Messages exchanged over the streaming connection.
//!
//! Every frame is a JSON object `{ "type": ..., "payload": ... }`. Inbound frames are
//! validated here, at the boundary: anything that doesn't fit the expected shape
//! becomes a [`MalformedEvent`] and never reaches the state machine. Tags this client
//! doesn't know decode to [`ServerEvent::Unknown`] so newer servers keep working.

use std::collections::BTreeMap;

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::phase::MatchPhase;

pub use self::fleet::{
    CannotPlaceReason, Coord, Fleet, Orientation, ShipKind, ShipPlacement, BOARD_SIZE,
};

mod fleet;

/// A frame that could not be decoded into a [`ServerEvent`].
#[derive(Debug, Error)]
#[error("malformed {} event: {source}", kind.as_deref().unwrap_or("untagged"))]
pub struct MalformedEvent {
    kind: Option<String>,
    #[source]
    source: serde_json::Error,
}

impl MalformedEvent {
    /// The `type` tag of the frame, if it got that far.
    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }
}

/// One inbound message from the game server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// The second participant connected to the game.
    OpponentJoined(OpponentJoined),
    /// Snapshot of the game, carrying the current [`MatchPhase`] as its status.
    GameState(GameState),
    /// A shot was resolved.
    ShotResult(ShotResult),
    /// The turn moved to another player.
    TurnChanged(TurnChanged),
    /// A winner was decided.
    GameFinished(GameFinished),
    /// The server rejected something this client sent.
    Error(ServerError),
    /// A tag this client doesn't handle. Holds the tag.
    Unknown(String),
}

impl ServerEvent {
    /// Decode a text frame.
    pub fn parse(text: &str) -> Result<Self, MalformedEvent> {
        #[derive(Deserialize)]
        struct Envelope {
            #[serde(rename = "type")]
            kind: String,
            #[serde(default)]
            payload: Value,
        }

        let envelope: Envelope = serde_json::from_str(text)
            .map_err(|source| MalformedEvent { kind: None, source })?;
        let Envelope { kind, payload } = envelope;
        let event = match kind.as_str() {
            // Only the occurrence matters, so an odd payload is not an error.
            "opponent_joined" => {
                ServerEvent::OpponentJoined(serde_json::from_value(payload).unwrap_or_default())
            }
            "game_state" => ServerEvent::GameState(decode(&kind, payload)?),
            "shot_result" => ServerEvent::ShotResult(decode(&kind, payload)?),
            "turn_changed" => ServerEvent::TurnChanged(decode(&kind, payload)?),
            "game_finished" => ServerEvent::GameFinished(decode(&kind, payload)?),
            "error" => ServerEvent::Error(decode(&kind, payload)?),
            _ => ServerEvent::Unknown(kind),
        };
        Ok(event)
    }

    /// The tag this event was sent with.
    pub fn kind(&self) -> &str {
        match self {
            ServerEvent::OpponentJoined(_) => "opponent_joined",
            ServerEvent::GameState(_) => "game_state",
            ServerEvent::ShotResult(_) => "shot_result",
            ServerEvent::TurnChanged(_) => "turn_changed",
            ServerEvent::GameFinished(_) => "game_finished",
            ServerEvent::Error(_) => "error",
            ServerEvent::Unknown(kind) => kind,
        }
    }
}

fn decode<T: DeserializeOwned>(kind: &str, payload: Value) -> Result<T, MalformedEvent> {
    serde_json::from_value(payload).map_err(|source| MalformedEvent {
        kind: Some(kind.to_owned()),
        source,
    })
}

/// Payload of `opponent_joined`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OpponentJoined {
    #[serde(default)]
    pub game_id: Option<String>,
    #[serde(default)]
    pub player: Option<String>,
}

/// Payload of `game_state`. Only `status` is required; every other field falls back to
/// its default when it is missing, `null`, or not of the expected shape.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GameState {
    /// Raw status string. Kept as sent so statuses this client doesn't know survive.
    pub status: String,
    #[serde(default, deserialize_with = "lenient")]
    pub game_id: String,
    /// Player whose turn it is; empty before the match starts.
    #[serde(default, deserialize_with = "lenient")]
    pub turn: String,
    /// Winning player; empty until the match is over.
    #[serde(default, deserialize_with = "lenient")]
    pub winner: String,
    /// Shots fired so far, keyed by cell.
    #[serde(default, deserialize_with = "lenient")]
    pub shots: BTreeMap<String, String>,
    /// This player's ships, keyed by ship type, as lists of `[row, col]` cells.
    #[serde(default, deserialize_with = "lenient")]
    pub ships: BTreeMap<String, Vec<Vec<i32>>>,
}

/// Decode a field, replacing `null` or a value of the wrong shape with the default.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

impl GameState {
    /// The phase named by `status`, or `None` if this client doesn't recognize it.
    pub fn phase(&self) -> Option<MatchPhase> {
        MatchPhase::from_status(&self.status)
    }
}

/// Result of a single shot.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShotOutcome {
    Miss,
    Hit,
    Sunk,
}

/// Payload of `shot_result`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ShotResult {
    #[serde(default)]
    pub game_id: String,
    pub coord: Coord,
    pub outcome: ShotOutcome,
    /// Type of the ship hit, empty on a miss.
    #[serde(default)]
    pub ship: String,
}

/// Payload of `turn_changed`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TurnChanged {
    #[serde(default)]
    pub game_id: String,
    pub turn: String,
}

/// Payload of `game_finished`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GameFinished {
    #[serde(default)]
    pub game_id: String,
    pub winner: String,
}

/// Payload of `error`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerError {
    pub message: String,
}

/// Outbound message to the game server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Submit the full fleet layout.
    PlaceShips {
        game_id: String,
        ships: Vec<ShipPlacement>,
    },
    /// Fire at a cell on the opponent's board.
    Fire { game_id: String, coord: Coord },
}

impl ClientMessage {
    pub(crate) fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn opponent_joined_without_payload() {
        let event = ServerEvent::parse(r#"{"type":"opponent_joined"}"#).unwrap();
        assert_eq!(event, ServerEvent::OpponentJoined(OpponentJoined::default()));
    }

    #[test]
    fn opponent_joined_ignores_payload_shape() {
        let event = ServerEvent::parse(r#"{"type":"opponent_joined","payload":[1,2]}"#).unwrap();
        assert_eq!(event.kind(), "opponent_joined");
    }

    #[test]
    fn game_state_keeps_unknown_status() {
        let event =
            ServerEvent::parse(r#"{"type":"game_state","payload":{"status":"bogus"}}"#).unwrap();
        match event {
            ServerEvent::GameState(state) => {
                assert_eq!(state.status, "bogus");
                assert_eq!(state.phase(), None);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn game_state_full_payload() {
        let text = json!({
            "type": "game_state",
            "payload": {
                "game_id": "g1",
                "turn": "p1",
                "status": "active",
                "winner": "",
                "shots": {"3,4": "hit"},
                "ships": {"destroyer": [[0, 0], [0, 1]]},
            }
        })
        .to_string();
        match ServerEvent::parse(&text).unwrap() {
            ServerEvent::GameState(state) => {
                assert_eq!(state.phase(), Some(MatchPhase::Active));
                assert_eq!(state.turn, "p1");
                assert_eq!(state.shots["3,4"], "hit");
                assert_eq!(state.ships["destroyer"], vec![vec![0, 0], vec![0, 1]]);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn game_state_side_fields_fall_back_to_defaults() {
        let text = json!({
            "type": "game_state",
            "payload": {
                "status": "active",
                "turn": "p2",
                "winner": null,
                "shots": "none",
                "ships": {"destroyer": [[0.5, 1]]},
            }
        })
        .to_string();
        match ServerEvent::parse(&text).unwrap() {
            ServerEvent::GameState(state) => {
                assert_eq!(state.phase(), Some(MatchPhase::Active));
                assert_eq!(state.turn, "p2");
                assert_eq!(state.winner, "");
                assert!(state.shots.is_empty());
                assert!(state.ships.is_empty());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn game_state_without_status_is_malformed() {
        let err = ServerEvent::parse(r#"{"type":"game_state","payload":{}}"#).unwrap_err();
        assert_eq!(err.kind(), Some("game_state"));
        let err = ServerEvent::parse(r#"{"type":"game_state"}"#).unwrap_err();
        assert_eq!(err.kind(), Some("game_state"));
    }

    #[test]
    fn non_json_and_untagged_frames_are_malformed() {
        assert_eq!(ServerEvent::parse("hello").unwrap_err().kind(), None);
        assert_eq!(
            ServerEvent::parse(r#"{"payload":{"status":"active"}}"#)
                .unwrap_err()
                .kind(),
            None
        );
    }

    #[test]
    fn unknown_tags_are_kept() {
        let event = ServerEvent::parse(r#"{"type":"radar_ping","payload":{"x":1}}"#).unwrap();
        assert_eq!(event, ServerEvent::Unknown("radar_ping".into()));
    }

    #[test]
    fn shot_result_and_turn() {
        let shot = ServerEvent::parse(
            r#"{"type":"shot_result","payload":{"game_id":"g","coord":{"row":1,"col":2},"outcome":"sunk","ship":"destroyer"}}"#,
        )
        .unwrap();
        assert_eq!(
            shot,
            ServerEvent::ShotResult(ShotResult {
                game_id: "g".into(),
                coord: Coord::new(1, 2),
                outcome: ShotOutcome::Sunk,
                ship: "destroyer".into(),
            })
        );
        let turn =
            ServerEvent::parse(r#"{"type":"turn_changed","payload":{"turn":"p2"}}"#).unwrap();
        assert_eq!(turn.kind(), "turn_changed");
    }

    #[test]
    fn client_messages_use_type_and_payload() {
        let fire = ClientMessage::Fire {
            game_id: "g1".into(),
            coord: Coord::new(3, 7),
        };
        let value: Value = serde_json::from_str(&fire.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type": "fire", "payload": {"game_id": "g1", "coord": {"row": 3, "col": 7}}})
        );

        let place = ClientMessage::PlaceShips {
            game_id: "g1".into(),
            ships: vec![ShipPlacement::line(
                ShipKind::Destroyer,
                Coord::new(0, 0),
                Orientation::Right,
            )],
        };
        let value: Value = serde_json::from_str(&place.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type": "place_ships", "payload": {"game_id": "g1", "ships": [
                {"type": "destroyer", "cells": [{"row": 0, "col": 0}, {"row": 0, "col": 1}]}
            ]}})
        );
    }
}
