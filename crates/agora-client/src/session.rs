//! Turn session state.
//!
//! The in-memory model of the active game session: turn counters, speaker,
//! write permission, the committed message log, and the single in-progress
//! streaming message. Committed and streaming messages are distinct types:
//! the committed log is append-only and replaced wholesale by reconciliation,
//! while the tentative message is mutated in place by stream deltas and never
//! joins the log.

use agora_protocol::{GameContext, Outcome, TurnEvent, TurnStatus};

/// Authors the engine uses for system narration.
const SYSTEM_AUTHORS: [&str; 2] = ["Sistema", "system"];

/// Author the engine uses for the player when no username is known.
const PLAYER_SENTINEL: &str = "Usuario";

/// Presentation tag for a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    System,
    Player,
    Agent,
}

impl Speaker {
    /// Tag an author name against the known sentinels and the current user.
    pub fn classify(author: &str, current_user: Option<&str>) -> Self {
        if SYSTEM_AUTHORS.contains(&author) {
            Speaker::System
        } else if author == PLAYER_SENTINEL || Some(author) == current_user {
            Speaker::Player
        } else {
            Speaker::Agent
        }
    }
}

/// A message in the committed log. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedMessage {
    pub author: String,
    pub content: String,
    pub speaker: Speaker,
}

/// The one in-progress message owned by the active turn submission.
///
/// Its content grows by delta events and is discarded (never committed)
/// when a `message` record, a terminal event, an `error` record, or the end
/// of the stream arrives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TentativeMessage {
    pub author: String,
    pub content: String,
}

/// One entry of the rendered chat: the committed log followed by the
/// tentative message, if one is open.
#[derive(Debug, Clone, Copy)]
pub enum MessageView<'a> {
    Committed(&'a CommittedMessage),
    Streaming(&'a TentativeMessage),
}

/// Where the session currently is in the turn loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    NoSession,
    AwaitingTurn,
    Streaming,
    Reconciling,
}

/// The active session's local state.
#[derive(Debug, Default)]
pub struct TurnSession {
    phase: Phase,
    pub turn_current: u32,
    pub turn_max: u32,
    pub current_speaker: String,
    player_can_write: bool,
    pub game_finished: bool,
    pub result: Option<Outcome>,
    pub context: GameContext,
    committed: Vec<CommittedMessage>,
    tentative: Option<TentativeMessage>,
}

impl TurnSession {
    pub fn new() -> Self {
        Self {
            turn_max: 10,
            ..Self::default()
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    /// Whether the player input line is open. Forced closed while the game
    /// is finished, regardless of what the server echoed.
    pub fn player_can_write(&self) -> bool {
        self.player_can_write && !self.game_finished
    }

    pub fn committed_messages(&self) -> &[CommittedMessage] {
        &self.committed
    }

    pub fn streaming_message(&self) -> Option<&TentativeMessage> {
        self.tentative.as_ref()
    }

    /// The chat as it should be rendered: committed log, then the streaming
    /// message if one is open.
    pub fn visible_messages(&self) -> Vec<MessageView<'_>> {
        let mut views: Vec<MessageView<'_>> =
            self.committed.iter().map(MessageView::Committed).collect();
        if let Some(t) = &self.tentative {
            views.push(MessageView::Streaming(t));
        }
        views
    }

    /// Append the player's own text optimistically, before any network
    /// round-trip. The next reconciliation replaces it with server truth.
    pub(crate) fn push_player_message(&mut self, content: &str, current_user: Option<&str>) {
        let author = current_user.unwrap_or(PLAYER_SENTINEL).to_string();
        self.committed.push(CommittedMessage {
            author,
            content: content.to_string(),
            speaker: Speaker::Player,
        });
    }

    /// Open an empty streaming message for the submission about to start.
    pub(crate) fn open_tentative(&mut self) {
        self.tentative = Some(TentativeMessage::default());
    }

    /// Discard the streaming message, if any.
    pub(crate) fn clear_tentative(&mut self) {
        self.tentative = None;
    }

    /// Apply one decoded stream event.
    ///
    /// Returns the user-visible error text when the event was an `error`
    /// record; every other event returns `None`.
    pub(crate) fn apply_event(
        &mut self,
        event: TurnEvent,
        current_user: Option<&str>,
    ) -> Option<String> {
        match event {
            TurnEvent::Delta(fragment) => {
                if let Some(t) = self.tentative.as_mut() {
                    t.content.push_str(&fragment);
                }
                None
            }
            TurnEvent::Message(m) => {
                let speaker = Speaker::classify(&m.author, current_user);
                self.committed.push(CommittedMessage {
                    author: m.author,
                    content: m.content,
                    speaker,
                });
                self.tentative = None;
                None
            }
            TurnEvent::GameEnded(outcome) => {
                // Optimistic: the next status poll is authoritative and may
                // still disagree.
                self.game_finished = true;
                self.result = Some(outcome);
                self.tentative = None;
                None
            }
            TurnEvent::Error(message) => {
                self.tentative = None;
                Some(message)
            }
        }
    }

    /// Replace the status snapshot and committed log with a fresh poll.
    ///
    /// The poll wins over anything set optimistically during streaming,
    /// including a `game_ended` the server no longer reports.
    pub(crate) fn apply_status(&mut self, status: TurnStatus, current_user: Option<&str>) {
        self.turn_current = status.turn_current;
        self.turn_max = status.turn_max;
        self.current_speaker = status.current_speaker;
        self.player_can_write = status.player_can_write;
        self.game_finished = status.game_finished;
        self.result = status.result;
        self.committed = status
            .messages
            .into_iter()
            .map(|m| {
                let speaker = Speaker::classify(&m.author, current_user);
                CommittedMessage {
                    author: m.author,
                    content: m.content,
                    speaker,
                }
            })
            .collect();
    }

    pub(crate) fn apply_context(&mut self, context: GameContext) {
        self.context = context;
    }

    /// Drop all session-local state (new game, resume, or invalidation).
    pub(crate) fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_protocol::WireMessage;

    fn delta(s: &str) -> TurnEvent {
        TurnEvent::Delta(s.to_string())
    }

    #[test]
    fn test_speaker_classification() {
        assert_eq!(Speaker::classify("Sistema", Some("ana")), Speaker::System);
        assert_eq!(Speaker::classify("system", None), Speaker::System);
        assert_eq!(Speaker::classify("Usuario", None), Speaker::Player);
        assert_eq!(Speaker::classify("ana", Some("ana")), Speaker::Player);
        assert_eq!(Speaker::classify("Isabel", Some("ana")), Speaker::Agent);
    }

    #[test]
    fn test_deltas_then_commit_leave_one_message_and_no_streaming() {
        let mut session = TurnSession::new();
        session.open_tentative();

        session.apply_event(delta("He"), None);
        session.apply_event(delta("llo"), None);
        assert_eq!(session.streaming_message().unwrap().content, "Hello");

        session.apply_event(
            TurnEvent::Message(WireMessage {
                author: "X".to_string(),
                content: "Hello".to_string(),
                ..WireMessage::default()
            }),
            None,
        );

        assert_eq!(session.committed_messages().len(), 1);
        assert_eq!(session.committed_messages()[0].content, "Hello");
        assert!(session.streaming_message().is_none());
    }

    #[test]
    fn test_delta_without_open_tentative_is_a_noop() {
        let mut session = TurnSession::new();
        session.apply_event(delta("lost"), None);
        assert!(session.streaming_message().is_none());
        assert!(session.committed_messages().is_empty());
    }

    #[test]
    fn test_game_ended_clamps_write_permission() {
        let mut session = TurnSession::new();
        session.apply_status(
            TurnStatus {
                player_can_write: true,
                ..TurnStatus::default()
            },
            None,
        );
        assert!(session.player_can_write());

        session.open_tentative();
        session.apply_event(
            TurnEvent::GameEnded(Outcome {
                reason: "victory".to_string(),
                mission_evaluation: None,
            }),
            None,
        );

        assert!(session.game_finished);
        assert!(!session.player_can_write());
        assert!(session.streaming_message().is_none());
        assert_eq!(session.result.as_ref().unwrap().reason, "victory");
    }

    #[test]
    fn test_status_poll_overrides_optimistic_game_ended() {
        let mut session = TurnSession::new();
        session.apply_event(TurnEvent::GameEnded(Outcome::default()), None);
        assert!(session.game_finished);

        // The authoritative poll disagrees; it wins.
        session.apply_status(
            TurnStatus {
                game_finished: false,
                player_can_write: true,
                ..TurnStatus::default()
            },
            None,
        );

        assert!(!session.game_finished);
        assert!(session.player_can_write());
        assert!(session.result.is_none());
    }

    #[test]
    fn test_status_replaces_committed_log_wholesale() {
        let mut session = TurnSession::new();
        session.push_player_message("optimistic", Some("ana"));
        assert_eq!(session.committed_messages().len(), 1);

        session.apply_status(
            TurnStatus {
                messages: vec![
                    WireMessage {
                        author: "Sistema".to_string(),
                        content: "start".to_string(),
                        ..WireMessage::default()
                    },
                    WireMessage {
                        author: "ana".to_string(),
                        content: "optimistic".to_string(),
                        ..WireMessage::default()
                    },
                ],
                ..TurnStatus::default()
            },
            Some("ana"),
        );

        let log = session.committed_messages();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].speaker, Speaker::System);
        assert_eq!(log[1].speaker, Speaker::Player);
    }

    #[test]
    fn test_error_event_discards_streaming_and_surfaces_text() {
        let mut session = TurnSession::new();
        session.open_tentative();
        session.apply_event(delta("half"), None);

        let surfaced = session.apply_event(TurnEvent::Error("engine busy".to_string()), None);

        assert_eq!(surfaced.as_deref(), Some("engine busy"));
        assert!(session.streaming_message().is_none());
    }

    #[test]
    fn test_visible_messages_append_streaming_after_committed() {
        let mut session = TurnSession::new();
        session.push_player_message("hi", None);
        session.open_tentative();
        session.apply_event(delta("thinking"), None);

        let views = session.visible_messages();
        assert_eq!(views.len(), 2);
        assert!(matches!(views[0], MessageView::Committed(_)));
        match views[1] {
            MessageView::Streaming(t) => assert_eq!(t.content, "thinking"),
            _ => panic!("expected streaming view last"),
        }
    }
}
