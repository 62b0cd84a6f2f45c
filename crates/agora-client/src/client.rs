//! Client façade: turn submission, reconciliation, auth, game management.
//!
//! [`GameClient`] owns the turn session state and drives the full loop:
//! submit a turn, drain the streamed records into state transitions, then
//! reconcile against the authoritative status and context endpoints. Only
//! one turn submission may be in flight per session; `send_turn` takes
//! `&mut self`, which enforces that for a single client handle. Callers
//! cloning state elsewhere must not overlap submissions themselves.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use log::{debug, info, warn};

use agora_protocol::{
    Credentials, GameContext, GameSummary, GamesList, NewGameRequest, NewGameResponse, Outcome,
    ResumeRequest, ResumeResponse, TurnEvent, TurnRequest, TurnStatus, UserInfo,
};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::session::{CommittedMessage, Phase, TurnSession};
use crate::sse::{EventDecoder, FrameParser};
use crate::transport::{AuthState, SharedAuth, Transport};

/// Longest accepted seed theme, matching the original form validation.
const MAX_SEED_THEME_CHARS: usize = 200;

/// Accepted range for the seeded character count.
const SEED_ACTOR_RANGE: std::ops::RangeInclusive<u8> = 1..=5;

/// Display notification emitted while a turn submission drains.
#[derive(Debug, Clone)]
pub enum TurnUpdate {
    /// The streaming message grew; carries its full content so far.
    StreamContent(String),
    /// A message was committed to the log.
    Committed(CommittedMessage),
    /// The game reached a terminal state mid-stream (optimistic until the
    /// next poll confirms it).
    GameEnded(Outcome),
    /// A user-visible, non-fatal error: an `error` stream record or a
    /// reconciliation fetch that failed.
    Error(String),
}

/// Outcome of one reconciliation pass. Both fetches always run; each
/// failure is reported here without blocking the other.
#[derive(Debug, Default)]
pub struct RefreshReport {
    pub status_error: Option<ClientError>,
    pub context_error: Option<ClientError>,
}

impl RefreshReport {
    pub fn is_clean(&self) -> bool {
        self.status_error.is_none() && self.context_error.is_none()
    }

    pub fn errors(&self) -> impl Iterator<Item = &ClientError> {
        self.status_error.iter().chain(self.context_error.iter())
    }
}

/// Client for one Agora game server.
pub struct GameClient {
    transport: Transport,
    auth: SharedAuth,
    session: TurnSession,
}

impl GameClient {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let auth: SharedAuth = Arc::new(tokio::sync::RwLock::new(AuthState::default()));
        let transport = Transport::new(
            &config.server_url,
            Duration::from_secs(config.connect_timeout_secs),
            Arc::clone(&auth),
        )?;
        Ok(Self {
            transport,
            auth,
            session: TurnSession::new(),
        })
    }

    /// The local session state. Reads between operations are always
    /// consistent: streamed transitions and reconciliation both land here.
    pub fn session(&self) -> &TurnSession {
        &self.session
    }

    pub async fn session_id(&self) -> Option<String> {
        self.auth.read().await.session_id.clone()
    }

    pub async fn current_user(&self) -> Option<UserInfo> {
        self.auth.read().await.user.clone()
    }

    // ========================================================================
    // Authentication
    // ========================================================================

    /// Check whether the stored cookie still authenticates, caching the user.
    /// Any failure, including a transport one, counts as not authenticated
    /// and clears the cached user.
    pub async fn check_auth(&mut self) -> bool {
        let outcome = match self.transport.get_json("/auth/me", &[]).await {
            Ok(body) => serde_json::from_value::<UserInfo>(body).map_err(ClientError::from),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(user) => {
                self.auth.write().await.user = Some(user);
                true
            }
            Err(e) => {
                debug!("auth check failed: {e}");
                self.auth.write().await.user = None;
                false
            }
        }
    }

    pub async fn login(&mut self, username: &str, password: &str) -> ClientResult<UserInfo> {
        self.authenticate("/auth/login", username, password).await
    }

    pub async fn register(&mut self, username: &str, password: &str) -> ClientResult<UserInfo> {
        self.authenticate("/auth/register", username, password)
            .await
    }

    async fn authenticate(
        &mut self,
        path: &str,
        username: &str,
        password: &str,
    ) -> ClientResult<UserInfo> {
        let body = Credentials {
            username: username.to_string(),
            password: password.to_string(),
        };
        let value = self.transport.post_json(path, &body).await?;
        let response: agora_protocol::AuthResponse = serde_json::from_value(value)?;
        let user = response.user.unwrap_or(UserInfo {
            username: username.to_string(),
        });
        self.auth.write().await.user = Some(user.clone());
        info!("authenticated as {}", user.username);
        Ok(user)
    }

    /// Log out: the server call is best-effort, the local reset is not.
    pub async fn logout(&mut self) {
        if let Err(e) = self
            .transport
            .post_json("/auth/logout", &serde_json::json!({}))
            .await
        {
            debug!("logout request failed, resetting locally anyway: {e}");
        }
        let mut auth = self.auth.write().await;
        auth.user = None;
        auth.session_id = None;
        drop(auth);
        self.session.reset();
    }

    // ========================================================================
    // Game management
    // ========================================================================

    /// Start a new game. The seed is validated client-side before any
    /// network call; on success the fresh session is adopted and reconciled.
    pub async fn new_game(&mut self, seed: NewGameRequest) -> ClientResult<String> {
        validate_seed(&seed)?;

        let value = self.transport.post_json("/game/new", &seed).await?;
        let created: NewGameResponse = serde_json::from_value(value)?;

        self.adopt_session(created.session_id.clone()).await;
        self.session.apply_context(GameContext {
            player_mission: created.player_mission,
            characters: created.characters,
            narrativa_inicial: created.narrativa_inicial,
        });
        self.session.turn_current = created.turn_current;
        self.session.turn_max = created.turn_max;

        let report = self.refresh().await;
        log_refresh_errors("new game", &report);
        Ok(created.session_id)
    }

    /// Resume a saved game by id, then reconcile.
    pub async fn resume_game(&mut self, session_id: &str) -> ClientResult<()> {
        let body = ResumeRequest {
            session_id: session_id.to_string(),
        };
        let value = self.transport.post_json("/game/resume", &body).await?;
        let resumed: ResumeResponse = serde_json::from_value(value)?;

        let adopted = resumed.session_id.unwrap_or_else(|| session_id.to_string());
        self.adopt_session(adopted).await;

        let report = self.refresh().await;
        log_refresh_errors("resume", &report);
        Ok(())
    }

    pub async fn list_games(&self) -> ClientResult<Vec<GameSummary>> {
        let value = self.transport.get_json("/game/list", &[]).await?;
        let list: GamesList = serde_json::from_value(value)?;
        Ok(list.games)
    }

    async fn adopt_session(&mut self, session_id: String) {
        self.auth.write().await.session_id = Some(session_id);
        self.session.reset();
        self.session.set_phase(Phase::AwaitingTurn);
    }

    // ========================================================================
    // Turn submission
    // ========================================================================

    /// Submit one turn and drain its streamed response.
    ///
    /// Preconditions (checked before any network effect): an active session
    /// and non-empty trimmed text. The observer is called for every delta,
    /// commit, terminal outcome, and non-fatal error. Whatever way the
    /// stream ends — cleanly, via an `error` record, or on a transport
    /// failure — the streaming message is discarded and a single
    /// reconciliation pass runs before this returns. There is no client-side
    /// timeout: a stalled connection blocks the turn.
    pub async fn send_turn<F>(&mut self, text: &str, mut on_update: F) -> ClientResult<()>
    where
        F: FnMut(TurnUpdate),
    {
        let session_id = self
            .session_id()
            .await
            .ok_or(ClientError::NoActiveSession)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(ClientError::EmptyTurn);
        }

        let current_user = self.current_username().await;

        // Optimistic local append, then the open streaming message.
        self.session
            .push_player_message(text, current_user.as_deref());
        self.session.open_tentative();
        self.session.set_phase(Phase::Streaming);

        let streamed = self
            .stream_turn(&session_id, text, current_user.as_deref(), &mut on_update)
            .await;

        // Single source of truth: reconcile exactly once per termination,
        // success or failure, so displayed state never stays optimistic.
        self.session.clear_tentative();
        let report = self.refresh().await;
        for e in report.errors() {
            on_update(TurnUpdate::Error(e.to_string()));
        }

        streamed
    }

    async fn stream_turn<F>(
        &mut self,
        session_id: &str,
        text: &str,
        current_user: Option<&str>,
        on_update: &mut F,
    ) -> ClientResult<()>
    where
        F: FnMut(TurnUpdate),
    {
        let body = TurnRequest {
            session_id: session_id.to_string(),
            text: text.to_string(),
        };
        let response = self.transport.post_stream("/game/turn", &body).await?;

        let mut stream = response.bytes_stream();
        let mut parser = FrameParser::new();
        let mut decoder = EventDecoder::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            for block in parser.push(&chunk) {
                self.dispatch_block(&mut decoder, &block, current_user, on_update);
            }
        }
        if let Some(last) = parser.finish() {
            self.dispatch_block(&mut decoder, &last, current_user, on_update);
        }

        if decoder.dropped() > 0 {
            warn!(
                "turn stream finished with {} malformed record(s) dropped",
                decoder.dropped()
            );
        }
        Ok(())
    }

    /// Interpret one event block: mutate session state, then notify.
    fn dispatch_block<F>(
        &mut self,
        decoder: &mut EventDecoder,
        block: &str,
        current_user: Option<&str>,
        on_update: &mut F,
    ) where
        F: FnMut(TurnUpdate),
    {
        let Some(event) = decoder.decode_block(block) else {
            return;
        };

        let ended = match &event {
            TurnEvent::GameEnded(outcome) => Some(outcome.clone()),
            _ => None,
        };
        let committed = matches!(event, TurnEvent::Message(_));

        if let Some(error_text) = self.session.apply_event(event, current_user) {
            on_update(TurnUpdate::Error(error_text));
            return;
        }

        if let Some(outcome) = ended {
            on_update(TurnUpdate::GameEnded(outcome));
        } else if committed {
            if let Some(message) = self.session.committed_messages().last() {
                on_update(TurnUpdate::Committed(message.clone()));
            }
        } else if let Some(streaming) = self.session.streaming_message() {
            on_update(TurnUpdate::StreamContent(streaming.content.clone()));
        }
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Re-fetch context and status, replacing local state with server truth.
    ///
    /// The two fetches are independent; a failure of one is reported in the
    /// returned [`RefreshReport`] and does not stop the other. A 404 means
    /// the session no longer exists: the session identifier is cleared
    /// (authentication is preserved). A 401 has already cleared auth state
    /// via the transport guard; the local session state is dropped too.
    pub async fn refresh(&mut self) -> RefreshReport {
        let mut report = RefreshReport::default();
        let Some(session_id) = self.session_id().await else {
            // The id may have been invalidated mid-turn (401 cascade); any
            // leftover local state belongs to a session that no longer exists.
            if self.session.phase() != Phase::NoSession {
                self.session.reset();
            }
            return report;
        };
        let current_user = self.current_username().await;
        self.session.set_phase(Phase::Reconciling);

        match self.fetch_context(&session_id).await {
            Ok(context) => self.session.apply_context(context),
            Err(e) => report.context_error = Some(e),
        }

        match self.fetch_status(&session_id).await {
            Ok(status) => {
                self.session.apply_status(status, current_user.as_deref());
                self.session.set_phase(Phase::AwaitingTurn);
            }
            Err(e) => {
                match &e {
                    ClientError::SessionNotFound(detail) => {
                        warn!("session {session_id} no longer exists: {detail}");
                        self.auth.write().await.session_id = None;
                        self.session.reset();
                    }
                    ClientError::SessionExpired => {
                        self.session.reset();
                    }
                    _ => {
                        // Transient failure: keep the session id, try again
                        // on the next reconcile.
                        self.session.set_phase(Phase::AwaitingTurn);
                    }
                }
                report.status_error = Some(e);
            }
        }

        report
    }

    async fn fetch_status(&self, session_id: &str) -> ClientResult<TurnStatus> {
        let value = self
            .transport
            .get_json("/game/status", &[("session_id", session_id)])
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn fetch_context(&self, session_id: &str) -> ClientResult<GameContext> {
        let value = self
            .transport
            .get_json("/game/context", &[("session_id", session_id)])
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn current_username(&self) -> Option<String> {
        self.auth
            .read()
            .await
            .user
            .as_ref()
            .map(|u| u.username.clone())
    }
}

fn validate_seed(seed: &NewGameRequest) -> ClientResult<()> {
    if let Some(theme) = &seed.theme {
        if theme.chars().count() > MAX_SEED_THEME_CHARS {
            return Err(ClientError::InvalidSeed(format!(
                "theme exceeds {MAX_SEED_THEME_CHARS} characters"
            )));
        }
    }
    if let Some(n) = seed.num_actors {
        if !SEED_ACTOR_RANGE.contains(&n) {
            return Err(ClientError::InvalidSeed(format!(
                "num_actors must be between {} and {}",
                SEED_ACTOR_RANGE.start(),
                SEED_ACTOR_RANGE.end()
            )));
        }
    }
    Ok(())
}

fn log_refresh_errors(operation: &str, report: &RefreshReport) {
    for e in report.errors() {
        warn!("{operation}: reconciliation fetch failed: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_validation() {
        assert!(validate_seed(&NewGameRequest::default()).is_ok());

        let long = NewGameRequest {
            theme: Some("x".repeat(MAX_SEED_THEME_CHARS + 1)),
            num_actors: None,
        };
        assert!(matches!(
            validate_seed(&long),
            Err(ClientError::InvalidSeed(_))
        ));

        for bad in [0u8, 6] {
            let seed = NewGameRequest {
                theme: None,
                num_actors: Some(bad),
            };
            assert!(matches!(
                validate_seed(&seed),
                Err(ClientError::InvalidSeed(_))
            ));
        }

        let ok = NewGameRequest {
            theme: Some("Guerra fría".to_string()),
            num_actors: Some(3),
        };
        assert!(validate_seed(&ok).is_ok());
    }
}
