//! Conversation session: two independent per-category logs, each with its
//! own idle / awaiting-reply turn state, plus focus, admin, and playback
//! state.
//!
//! The logs never mix: switching the active category swaps which log the
//! next turn lands in, and each log keeps its own pending-turn gate so a
//! reply in flight on one tab does not block the other.

use crate::engine::{relevant_sources, AnswerEngine};
use crate::models::{Category, Message};
use crate::phrases;
use crate::speech::Playback;
use crate::store::SourceStore;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    /// The submitted text was empty or whitespace-only.
    #[error("message is empty")]
    EmptyMessage,
    /// The active log already has a turn awaiting its reply.
    #[error("a reply is still pending")]
    ReplyPending,
    /// The referenced source does not exist.
    #[error("unknown source: {0}")]
    UnknownSource(String),
}

/// Turn gate of one conversation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    #[default]
    Idle,
    AwaitingReply,
}

/// One category's message log with its turn gate.
pub struct ConversationLog {
    messages: Vec<Message>,
    state: TurnState,
    welcome: &'static str,
}

impl ConversationLog {
    fn new(welcome: &'static str) -> Self {
        Self {
            messages: vec![Message::assistant(welcome)],
            state: TurnState::Idle,
            welcome,
        }
    }

    fn reset(&mut self) {
        self.messages = vec![Message::assistant(self.welcome)];
        self.state = TurnState::Idle;
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn state(&self) -> TurnState {
        self.state
    }
}

/// Per-user conversation state across both categories.
pub struct ChatSession {
    advisor: ConversationLog,
    repository: ConversationLog,
    active: Category,
    focused_source: Option<String>,
    auto_speak: bool,
    is_admin: bool,
    pub playback: Playback,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            advisor: ConversationLog::new(phrases::WELCOME_ADVISOR),
            repository: ConversationLog::new(phrases::WELCOME_REPOSITORY),
            active: Category::Advisor,
            focused_source: None,
            auto_speak: false,
            is_admin: false,
            playback: Playback::default(),
        }
    }

    pub fn log(&self, category: Category) -> &ConversationLog {
        match category {
            Category::Advisor => &self.advisor,
            Category::Repository => &self.repository,
        }
    }

    fn log_mut(&mut self, category: Category) -> &mut ConversationLog {
        match category {
            Category::Advisor => &mut self.advisor,
            Category::Repository => &mut self.repository,
        }
    }

    pub fn active_category(&self) -> Category {
        self.active
    }

    pub fn set_active(&mut self, category: Category) {
        self.active = category;
    }

    pub fn focused_source(&self) -> Option<&str> {
        self.focused_source.as_deref()
    }

    pub fn auto_speak(&self) -> bool {
        self.auto_speak
    }

    pub fn set_auto_speak(&mut self, on: bool) {
        self.auto_speak = on;
        if !on {
            self.playback.stop_all();
        }
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    /// Plaintext passphrase comparison; success flips the admin flag on.
    pub fn login(&mut self, passphrase: &str, expected: &str) -> bool {
        if passphrase == expected {
            self.is_admin = true;
        }
        self.is_admin
    }

    pub fn logout(&mut self) {
        self.is_admin = false;
    }

    /// Open a turn in the active log: validate, append the user message,
    /// and arm the awaiting-reply gate.
    pub fn begin_turn(&mut self, text: &str) -> Result<Message, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        let log = self.log_mut(self.active);
        if log.state == TurnState::AwaitingReply {
            return Err(SessionError::ReplyPending);
        }
        let message = Message::user(text);
        log.messages.push(message.clone());
        log.state = TurnState::AwaitingReply;
        Ok(message)
    }

    /// Close the open turn with the assistant's reply and return it.
    pub fn complete_turn(&mut self, text: impl Into<String>) -> Message {
        let log = self.log_mut(self.active);
        let message = Message::assistant(text);
        log.messages.push(message.clone());
        log.state = TurnState::Idle;
        message
    }

    /// Run a full turn: append the user message, answer against the
    /// participating sources, and append the reply. History handed to the
    /// engine excludes the message being asked. The focused source only
    /// applies to repository turns; advisor turns always answer from the
    /// category rules.
    pub async fn send(
        &mut self,
        engine: &AnswerEngine,
        store: &SourceStore,
        text: &str,
    ) -> Result<Message, SessionError> {
        let history: Vec<Message> = self.log(self.active).messages.to_vec();
        self.begin_turn(text)?;

        let focused = match self.active {
            Category::Repository => self.focused_source(),
            Category::Advisor => None,
        };
        let sources = relevant_sources(self.active, focused, store.all());
        let answer = engine.answer(text.trim(), &sources, &history).await;
        Ok(self.complete_turn(answer))
    }

    /// Focus one source for repository Q&A and announce it in the
    /// repository log.
    pub fn focus_source(&mut self, store: &SourceStore, id: &str) -> Result<(), SessionError> {
        let source = store
            .get(id)
            .ok_or_else(|| SessionError::UnknownSource(id.to_string()))?;
        let announcement = phrases::source_activated(&source.name);
        self.focused_source = Some(id.to_string());
        self.repository
            .messages
            .push(Message::assistant(announcement));
        Ok(())
    }

    pub fn clear_focus(&mut self) {
        self.focused_source = None;
    }

    /// Reset both logs to their welcome message, drop focus and playback,
    /// and empty the store.
    pub fn clear_all(&mut self, store: &mut SourceStore) {
        self.advisor.reset();
        self.repository.reset();
        self.focused_source = None;
        self.playback.stop_all();
        store.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, SourceDraft, SourceKind, SourcePayload};

    fn store_with_policy_text() -> SourceStore {
        let mut store = SourceStore::in_memory();
        store.add(SourceDraft {
            name: "سياسات".to_string(),
            kind: SourceKind::Text,
            category: Category::Advisor,
            payload: SourcePayload::Text {
                content: "بدل السكن 25% من الراتب الأساسي".to_string(),
            },
        });
        store
    }

    #[test]
    fn each_log_starts_with_its_welcome() {
        let session = ChatSession::new();
        assert_eq!(
            session.log(Category::Advisor).messages()[0].text,
            phrases::WELCOME_ADVISOR
        );
        assert_eq!(
            session.log(Category::Repository).messages()[0].text,
            phrases::WELCOME_REPOSITORY
        );
    }

    #[test]
    fn empty_message_is_rejected_before_any_state_change() {
        let mut session = ChatSession::new();
        assert_eq!(session.begin_turn("   "), Err(SessionError::EmptyMessage));
        assert_eq!(session.log(Category::Advisor).messages().len(), 1);
        assert_eq!(session.log(Category::Advisor).state(), TurnState::Idle);
    }

    #[test]
    fn second_message_while_awaiting_is_rejected() {
        let mut session = ChatSession::new();
        session.begin_turn("سؤال أول").unwrap();
        assert_eq!(
            session.begin_turn("سؤال ثاني"),
            Err(SessionError::ReplyPending)
        );
    }

    #[test]
    fn turn_gates_are_independent_per_category() {
        let mut session = ChatSession::new();
        session.begin_turn("سؤال في المستشار").unwrap();

        session.set_active(Category::Repository);
        // The advisor log is awaiting; the repository log is not.
        session.begin_turn("سؤال في المستودع").unwrap();

        assert_eq!(
            session.log(Category::Advisor).state(),
            TurnState::AwaitingReply
        );
        assert_eq!(
            session.log(Category::Repository).state(),
            TurnState::AwaitingReply
        );
        assert_eq!(session.log(Category::Advisor).messages().len(), 2);
        assert_eq!(session.log(Category::Repository).messages().len(), 2);
    }

    #[test]
    fn switching_category_and_back_preserves_log_order() {
        let mut session = ChatSession::new();
        session.begin_turn("سؤال أول").unwrap();
        session.complete_turn("جواب أول");

        session.set_active(Category::Repository);
        session.begin_turn("سؤال المستودع").unwrap();
        session.complete_turn("جواب المستودع");
        session.set_active(Category::Advisor);

        let texts: Vec<&str> = session
            .log(Category::Advisor)
            .messages()
            .iter()
            .map(|m| m.text.as_str())
            .collect();
        assert_eq!(
            texts,
            vec![phrases::WELCOME_ADVISOR, "سؤال أول", "جواب أول"]
        );
    }

    #[test]
    fn complete_turn_reopens_the_gate() {
        let mut session = ChatSession::new();
        session.begin_turn("سؤال").unwrap();
        session.complete_turn("جواب");
        assert_eq!(session.log(Category::Advisor).state(), TurnState::Idle);
        session.begin_turn("سؤال آخر").unwrap();
    }

    #[tokio::test]
    async fn send_appends_user_then_assistant() {
        let mut session = ChatSession::new();
        let store = store_with_policy_text();
        let engine = AnswerEngine::new(None);

        let reply = session.send(&engine, &store, "كم بدل السكن؟").await.unwrap();
        assert_eq!(reply.role, Role::Assistant);
        assert!(reply.text.contains("بدل السكن 25%"));

        let log = session.log(Category::Advisor).messages();
        assert_eq!(log.len(), 3); // welcome, user, assistant
        assert_eq!(log[1].role, Role::User);
        assert_eq!(log[1].text, "كم بدل السكن؟");
        assert_eq!(session.log(Category::Advisor).state(), TurnState::Idle);
    }

    #[tokio::test]
    async fn send_with_empty_store_gets_no_sources_phrase() {
        let mut session = ChatSession::new();
        let store = SourceStore::in_memory();
        let engine = AnswerEngine::new(None);

        let reply = session.send(&engine, &store, "كم بدل السكن؟").await.unwrap();
        assert_eq!(reply.text, phrases::NO_SOURCES);
    }

    #[tokio::test]
    async fn focused_repository_source_does_not_ground_advisor_turns() {
        let mut session = ChatSession::new();
        let mut store = SourceStore::in_memory();
        store.add(SourceDraft {
            name: "الإجازات".to_string(),
            kind: SourceKind::Text,
            category: Category::Advisor,
            payload: SourcePayload::Text {
                content: "الإجازة السنوية ثلاثون يوماً".to_string(),
            },
        });
        let repo_id = store
            .add(SourceDraft {
                name: "البدلات".to_string(),
                kind: SourceKind::Text,
                category: Category::Repository,
                payload: SourcePayload::Text {
                    content: "بدل السكن 25% من الراتب الأساسي".to_string(),
                },
            })
            .id
            .clone();
        session.focus_source(&store, &repo_id).unwrap();
        let engine = AnswerEngine::new(None);

        // Advisor turns answer from the advisor source, not the focused
        // repository document.
        let reply = session.send(&engine, &store, "كم الإجازة السنوية؟").await.unwrap();
        assert!(reply.text.contains("ثلاثون يوماً"));

        let reply = session.send(&engine, &store, "كم بدل السكن؟").await.unwrap();
        assert_eq!(reply.text, phrases::OUT_OF_SCOPE);

        // The repository tab still honors the focus.
        session.set_active(Category::Repository);
        let reply = session.send(&engine, &store, "كم بدل السكن؟").await.unwrap();
        assert!(reply.text.contains("بدل السكن 25%"));
    }

    #[test]
    fn focusing_a_source_announces_it_in_repository_log() {
        let mut session = ChatSession::new();
        let store = store_with_policy_text();
        let id = store.all()[0].id.clone();

        session.focus_source(&store, &id).unwrap();
        assert_eq!(session.focused_source(), Some(id.as_str()));

        let last = session.log(Category::Repository).messages().last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert!(last.text.contains("سياسات"));
    }

    #[test]
    fn focusing_unknown_source_fails() {
        let mut session = ChatSession::new();
        let store = SourceStore::in_memory();
        assert!(matches!(
            session.focus_source(&store, "missing"),
            Err(SessionError::UnknownSource(_))
        ));
        assert!(session.focused_source().is_none());
    }

    #[test]
    fn clear_all_resets_logs_focus_and_store() {
        let mut session = ChatSession::new();
        let mut store = store_with_policy_text();
        let id = store.all()[0].id.clone();
        session.focus_source(&store, &id).unwrap();
        session.begin_turn("سؤال").unwrap();
        session.complete_turn("جواب");

        session.clear_all(&mut store);

        assert!(store.is_empty());
        assert!(session.focused_source().is_none());
        assert_eq!(session.log(Category::Advisor).messages().len(), 1);
        assert_eq!(
            session.log(Category::Repository).messages()[0].text,
            phrases::WELCOME_REPOSITORY
        );
        assert_eq!(session.log(Category::Advisor).state(), TurnState::Idle);
    }

    #[test]
    fn login_requires_exact_passphrase() {
        let mut session = ChatSession::new();
        assert!(!session.login("wrong", "murshid2025"));
        assert!(!session.is_admin());
        assert!(session.login("murshid2025", "murshid2025"));
        assert!(session.is_admin());
        session.logout();
        assert!(!session.is_admin());
    }

    #[test]
    fn disabling_auto_speak_stops_playback() {
        let mut session = ChatSession::new();
        session.set_auto_speak(true);
        session.playback.toggle("m1");
        session.set_auto_speak(false);
        assert!(session.playback.active().is_none());
    }
}
