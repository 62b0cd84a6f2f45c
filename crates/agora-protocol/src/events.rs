//! Turn stream events.
//!
//! `POST /game/turn` answers with a chunked `text/event-stream` body made of
//! blank-line-delimited records (`event: <name>` + `data: <json>`). This
//! module maps a named record and its already-parsed JSON payload to a typed
//! event. Unknown names decode to `None` so the stream keeps draining.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::game::{Outcome, WireMessage};

/// One semantic event decoded from the turn stream.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    /// Incremental text fragment for the in-progress message.
    Delta(String),

    /// The in-progress message committed with its final author and content.
    Message(WireMessage),

    /// The game reached a terminal state mid-stream.
    GameEnded(Outcome),

    /// Server-side failure for this turn; the stream itself continues.
    Error(String),
}

/// Payload of a `message_delta` record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeltaPayload {
    #[serde(default)]
    pub delta: Option<String>,
}

/// Payload of a `message` record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessagePayload {
    #[serde(default)]
    pub message: Option<WireMessage>,
}

/// Payload of an `error` record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub message: Option<String>,
}

const GENERIC_TURN_ERROR: &str = "turn failed";

impl TurnEvent {
    /// Decode a named record payload.
    ///
    /// Returns `Ok(None)` for unrecognized event names and for a
    /// `message_delta` with no delta (both are no-ops, not errors). A payload
    /// that does not match the expected shape yields `Err`, which callers
    /// drop without aborting the stream.
    pub fn decode(name: &str, payload: Value) -> Result<Option<Self>, serde_json::Error> {
        match name {
            "message_delta" => {
                let p: DeltaPayload = serde_json::from_value(payload)?;
                Ok(p.delta.map(TurnEvent::Delta))
            }
            "message" => {
                let p: MessagePayload = serde_json::from_value(payload)?;
                Ok(Some(TurnEvent::Message(p.message.unwrap_or_default())))
            }
            "game_ended" => {
                let outcome: Outcome = serde_json::from_value(payload)?;
                Ok(Some(TurnEvent::GameEnded(outcome)))
            }
            "error" => {
                let p: ErrorPayload = serde_json::from_value(payload)?;
                Ok(Some(TurnEvent::Error(
                    p.message.unwrap_or_else(|| GENERIC_TURN_ERROR.to_string()),
                )))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_delta() {
        let ev = TurnEvent::decode("message_delta", json!({"delta": "Ho"})).unwrap();
        assert_eq!(ev, Some(TurnEvent::Delta("Ho".to_string())));
    }

    #[test]
    fn test_decode_delta_without_fragment_is_noop() {
        let ev = TurnEvent::decode("message_delta", json!({})).unwrap();
        assert_eq!(ev, None);
    }

    #[test]
    fn test_decode_message_defaults_missing_fields() {
        let ev = TurnEvent::decode("message", json!({"message": {"author": "Isabel"}}))
            .unwrap()
            .unwrap();
        match ev {
            TurnEvent::Message(m) => {
                assert_eq!(m.author, "Isabel");
                assert_eq!(m.content, "");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_decode_game_ended() {
        let ev = TurnEvent::decode(
            "game_ended",
            json!({"reason": "victory", "mission_evaluation": {"achieved": true}}),
        )
        .unwrap()
        .unwrap();
        match ev {
            TurnEvent::GameEnded(outcome) => {
                assert_eq!(outcome.reason, "victory");
                assert!(outcome.mission_evaluation.is_some());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_decode_error_falls_back_to_generic_message() {
        let ev = TurnEvent::decode("error", json!({})).unwrap().unwrap();
        assert_eq!(ev, TurnEvent::Error("turn failed".to_string()));
    }

    #[test]
    fn test_decode_unknown_event_is_ignored() {
        let ev = TurnEvent::decode("keep_alive", json!({"anything": 1})).unwrap();
        assert_eq!(ev, None);
    }
}
