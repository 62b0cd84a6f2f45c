//! Game session types.
//!
//! Field names follow the server's JSON exactly, including the Spanish
//! `narrativa_inicial` key inherited from the game engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Authoritative per-session status as returned by `GET /game/status`.
///
/// The committed message list here is canonical chat order; the client
/// replaces its local list wholesale with this one on every poll.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnStatus {
    /// Current turn counter, `0 ..= turn_max`.
    #[serde(default)]
    pub turn_current: u32,

    /// Turn budget for the session.
    #[serde(default = "default_turn_max")]
    pub turn_max: u32,

    /// Who the engine expects to speak next.
    #[serde(default)]
    pub current_speaker: String,

    /// Whether the player input line is open.
    #[serde(default)]
    pub player_can_write: bool,

    /// Whether the session reached a terminal state.
    #[serde(default)]
    pub game_finished: bool,

    /// Terminal outcome, set once when the game ends.
    #[serde(default)]
    pub result: Option<Outcome>,

    /// Committed messages in canonical chat order.
    #[serde(default)]
    pub messages: Vec<WireMessage>,
}

fn default_turn_max() -> u32 {
    10
}

/// One chat message as serialized by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(default)]
    pub author: String,

    #[serde(default)]
    pub content: String,

    /// ISO timestamp; older engine versions omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    /// Turn the message belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn: Option<u32>,
}

/// Terminal result of a finished session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// Why the game ended ("victory", "turn limit", ...).
    #[serde(default)]
    pub reason: String,

    /// Structured evaluation of the player mission, when the engine ran one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mission_evaluation: Option<Value>,
}

/// Read-only scenario snapshot from `GET /game/context`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameContext {
    #[serde(default)]
    pub player_mission: String,

    #[serde(default)]
    pub characters: Vec<CharacterInfo>,

    /// Opening narration shown before the first turn.
    #[serde(default)]
    pub narrativa_inicial: String,
}

/// A non-player character in the scenario.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CharacterInfo {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,
}

/// Body of `POST /game/turn`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRequest {
    pub session_id: String,
    pub text: String,
}

/// Optional seed for `POST /game/new`. Empty seed means server defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewGameRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_actors: Option<u8>,
}

/// Response of `POST /game/new`: the fresh session plus its initial setup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewGameResponse {
    pub session_id: String,

    #[serde(default)]
    pub narrativa_inicial: String,

    #[serde(default)]
    pub player_mission: String,

    #[serde(default)]
    pub characters: Vec<CharacterInfo>,

    #[serde(default)]
    pub turn_current: u32,

    #[serde(default = "default_turn_max")]
    pub turn_max: u32,

    #[serde(default)]
    pub player_can_write: bool,
}

/// Body of `POST /game/resume`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeRequest {
    pub session_id: String,
}

/// Response of `POST /game/resume`. The server may echo a normalized id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResumeResponse {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Response of `GET /game/list`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GamesList {
    #[serde(default)]
    pub games: Vec<GameSummary>,
}

/// One saved game in the listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameSummary {
    #[serde(default)]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}
