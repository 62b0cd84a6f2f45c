//! Canonical wire types for the Agora game API.
//!
//! These types mirror the JSON bodies exchanged with the game server:
//! the `/game/*` and `/auth/*` endpoints plus the payloads of the
//! `event:`/`data:` records streamed by `POST /game/turn`. They carry no
//! I/O; the client crate owns transport and state.

pub mod auth;
pub mod events;
pub mod game;

pub use auth::{AuthResponse, Credentials, UserInfo};
pub use events::TurnEvent;
pub use game::{
    CharacterInfo, GameContext, GameSummary, GamesList, NewGameRequest, NewGameResponse, Outcome,
    ResumeRequest, ResumeResponse, TurnRequest, TurnStatus, WireMessage,
};
