//! Client errors.

use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the Agora client.
///
/// Malformed stream records are deliberately not represented here: they are
/// dropped, counted, and logged while the stream keeps draining. An `error`
/// record received mid-stream reaches the caller through the turn observer,
/// not as a `ClientError`.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server rejected the session cookie (401). Local auth state has
    /// already been invalidated by the transport guard.
    #[error("session expired, sign in again")]
    SessionExpired,

    /// The requested game session does not exist server-side (404).
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Any other non-2xx response.
    #[error("request failed with status {status}: {detail}")]
    RequestFailed { status: u16, detail: String },

    /// Connection, read, or protocol failure below HTTP semantics.
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// A 2xx body did not match the expected wire shape.
    #[error("unexpected response body: {0}")]
    Json(#[from] serde_json::Error),

    /// An operation that needs a session was called without one.
    #[error("no active game session")]
    NoActiveSession,

    /// Turn text was empty after trimming; nothing was sent.
    #[error("turn text is empty")]
    EmptyTurn,

    /// New-game seed failed client-side validation.
    #[error("invalid game seed: {0}")]
    InvalidSeed(String),

    /// The configured server URL could not be parsed.
    #[error("invalid server url: {0}")]
    InvalidBaseUrl(String),

    /// Configuration file or environment could not be read.
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
}
