//! Turn-streaming and session-synchronization client for the Agora game
//! server.
//!
//! The client submits a turn, incrementally parses the chunked
//! `event:`/`data:` response into semantic events, keeps a locally visible
//! in-progress message, and after every stream termination reconciles
//! optimistic state against the polled status and context endpoints. All
//! requests go through a transport guard that uniformly classifies session
//! expiry and missing sessions.

pub mod client;
pub mod config;
pub mod error;
pub mod session;
pub mod sse;
pub mod transport;

pub use client::{GameClient, RefreshReport, TurnUpdate};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use session::{
    CommittedMessage, MessageView, Phase, Speaker, TentativeMessage, TurnSession,
};
pub use transport::{AuthState, SharedAuth, Transport};

pub use agora_protocol as protocol;
