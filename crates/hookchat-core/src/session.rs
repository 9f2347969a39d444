use crate::error::Result;
use crate::exchange::{ExchangeResult, ReplyService};
use crate::model::{Message, Sender};
use crate::projector::{self, HistoryEntry};
use crate::repository::ConversationRepository;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Substitute agent reply shown (and persisted) when an exchange fails.
pub const FAILURE_REPLY: &str = "Sorry, something went wrong.";

/// Policy for overlapping in-flight exchanges. `Interleave` matches the
/// legacy behavior: replies land in resolution order, even out of send order.
/// `Serialize` allows one outstanding exchange per conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangePolicy {
    #[default]
    Interleave,
    Serialize,
}

/// Renders one conversation's transcript, including the transient
/// "agent is responding" marker.
pub trait TranscriptView {
    fn render(&mut self, messages: &[Message]);
    fn show_pending(&mut self);
    fn clear_pending(&mut self);
}

/// Renders the history list.
pub trait HistoryView {
    fn render(&mut self, entries: &[HistoryEntry]);
}

/// Yes/no confirmation, asked before destructive operations. The mutating
/// operation must never proceed on a "no" answer.
pub trait ConfirmDialog {
    fn confirm(&mut self, title: &str, text: &str) -> bool;
}

/// A user message that has been appended and persisted but whose exchange has
/// not resolved yet. Captures the target conversation so a late reply can be
/// delivered (or discarded) no matter what the user navigated to meanwhile.
#[derive(Debug, Clone)]
pub struct PendingSend {
    pub conversation_id: String,
    pub body: String,
}

#[derive(Debug)]
pub enum SendOutcome {
    Accepted(PendingSend),
    /// Blank message body; nothing happened.
    Rejected,
    /// An exchange is already in flight for this conversation and the policy
    /// is `Serialize`; nothing happened.
    Busy,
}

/// What became of a resolved exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The endpoint answered without producing a reply; the pending marker
    /// was cleared and nothing was appended.
    NoReply,
    /// The target conversation was deleted while the exchange was in flight;
    /// the reply was dropped on purpose.
    Discarded,
}

/// Ties the repository, the reply service, and the view collaborators
/// together. All repository mutations run to completion between suspension
/// points; the only await is the exchange itself.
pub struct ChatSession {
    repo: ConversationRepository,
    exchange: Arc<dyn ReplyService>,
    transcript: Box<dyn TranscriptView>,
    history: Box<dyn HistoryView>,
    dialog: Box<dyn ConfirmDialog>,
    policy: ExchangePolicy,
    in_flight: HashSet<String>,
}

impl ChatSession {
    pub fn new(
        repo: ConversationRepository,
        exchange: Arc<dyn ReplyService>,
        transcript: Box<dyn TranscriptView>,
        history: Box<dyn HistoryView>,
        dialog: Box<dyn ConfirmDialog>,
        policy: ExchangePolicy,
    ) -> Self {
        Self {
            repo,
            exchange,
            transcript,
            history,
            dialog,
            policy,
            in_flight: HashSet::new(),
        }
    }

    pub fn repository(&self) -> &ConversationRepository {
        &self.repo
    }

    /// Render whatever is hydrated: the active transcript and the history
    /// list. Called once on startup.
    pub fn refresh(&mut self) {
        self.render_active();
        self.refresh_history();
    }

    fn render_active(&mut self) {
        match self.repo.active_conversation() {
            Some(conv) => self.transcript.render(&conv.messages),
            None => self.transcript.render(&[]),
        }
    }

    fn refresh_history(&mut self) {
        let entries = self.repo.history_entries();
        self.history.render(&entries);
    }

    /// Append and persist the user message, then await the exchange and
    /// deliver its result. Returns `None` for a blank body or a `Busy`
    /// refusal.
    pub async fn send_message(&mut self, body: &str) -> Result<Option<Delivery>> {
        let pending = match self.begin_send(body)? {
            SendOutcome::Accepted(pending) => pending,
            SendOutcome::Rejected | SendOutcome::Busy => return Ok(None),
        };
        let result = self
            .exchange
            .send(&pending.body, &pending.conversation_id)
            .await;
        self.complete_send(pending, result).map(Some)
    }

    /// First half of a send: validation, conversation setup, user-message
    /// append (persisted before any network activity), pending marker.
    /// Split from [`complete_send`] so callers may run several exchanges
    /// concurrently and resolve them in any order.
    pub fn begin_send(&mut self, body: &str) -> Result<SendOutcome> {
        if body.trim().is_empty() {
            return Ok(SendOutcome::Rejected);
        }

        let conversation_id = match self.repo.active_id().map(str::to_string) {
            Some(id) => id,
            None => self.repo.create_conversation()?,
        };

        if self.policy == ExchangePolicy::Serialize && self.in_flight.contains(&conversation_id) {
            tracing::debug!(
                "refusing overlapping exchange for conversation {}",
                conversation_id
            );
            return Ok(SendOutcome::Busy);
        }

        self.repo
            .append_message(&conversation_id, Sender::User, body)?;
        self.in_flight.insert(conversation_id.clone());
        self.render_active();
        self.transcript.show_pending();
        self.refresh_history();

        Ok(SendOutcome::Accepted(PendingSend {
            conversation_id,
            body: body.to_string(),
        }))
    }

    /// Second half of a send: append the reply (or the failure substitute) to
    /// the conversation the send targeted. An answer that produced no reply
    /// text only clears the pending marker; a reply whose conversation has
    /// been deleted meanwhile is discarded explicitly.
    pub fn complete_send(
        &mut self,
        pending: PendingSend,
        result: ExchangeResult,
    ) -> Result<Delivery> {
        self.in_flight.remove(&pending.conversation_id);
        self.transcript.clear_pending();

        let reply = match result {
            ExchangeResult::Reply(reply) => reply,
            // The endpoint answered but had nothing to say: no message.
            ExchangeResult::NoReply => return Ok(Delivery::NoReply),
            ExchangeResult::Failed => FAILURE_REPLY.to_string(),
        };

        if !self.repo.contains(&pending.conversation_id) {
            tracing::info!(
                "discarding reply for deleted conversation {}",
                pending.conversation_id
            );
            return Ok(Delivery::Discarded);
        }

        self.repo
            .append_message(&pending.conversation_id, Sender::Agent, reply)?;

        if self.repo.active_id() == Some(pending.conversation_id.as_str()) {
            self.render_active();
        }
        self.refresh_history();
        Ok(Delivery::Delivered)
    }

    /// Start a fresh conversation and make it the rendered one.
    pub fn new_chat(&mut self) -> Result<String> {
        let id = self.repo.create_conversation()?;
        self.render_active();
        self.refresh_history();
        Ok(id)
    }

    /// Switch the active conversation. Unknown ids leave everything as it
    /// was.
    pub fn open(&mut self, conversation_id: &str) -> bool {
        if !self.repo.set_active(conversation_id) {
            return false;
        }
        self.render_active();
        self.refresh_history();
        true
    }

    /// Edit a user message of the active conversation by sequence number,
    /// then re-render the full transcript.
    pub fn edit_message(&mut self, seq: u64, new_body: &str) -> Result<bool> {
        let Some(id) = self.repo.active_id().map(str::to_string) else {
            return Ok(false);
        };
        if !self.repo.edit_message(&id, seq, new_body)? {
            return Ok(false);
        }
        self.render_active();
        self.refresh_history();
        Ok(true)
    }

    /// Empty the active conversation.
    pub fn clear_active(&mut self) -> Result<bool> {
        let Some(id) = self.repo.active_id().map(str::to_string) else {
            return Ok(false);
        };
        let cleared = self.repo.clear_conversation(&id)?;
        if cleared {
            self.render_active();
            self.refresh_history();
        }
        Ok(cleared)
    }

    pub fn rename(&mut self, conversation_id: &str, new_title: &str) -> Result<bool> {
        let renamed = self.repo.rename_conversation(conversation_id, new_title)?;
        if renamed {
            self.refresh_history();
        }
        Ok(renamed)
    }

    /// Delete one conversation, after confirmation. Returns `false` when the
    /// user declined or the id was unknown.
    pub fn delete(&mut self, conversation_id: &str) -> Result<bool> {
        if !self
            .dialog
            .confirm("Delete Chat?", "Are you sure you want to delete this chat?")
        {
            return Ok(false);
        }
        let removed = self.repo.remove_conversation(conversation_id)?;
        if removed {
            self.render_active();
            self.refresh_history();
        }
        Ok(removed)
    }

    /// Drop every conversation, after confirmation.
    pub fn delete_all(&mut self) -> Result<bool> {
        if !self
            .dialog
            .confirm("Delete All History?", "This action cannot be undone.")
        {
            return Ok(false);
        }
        self.repo.delete_all()?;
        self.render_active();
        self.refresh_history();
        Ok(true)
    }

    /// History entries matching a case-insensitive query, for search-as-you-
    /// type filtering. Leaves the repository untouched.
    pub fn search(&self, query: &str) -> Vec<HistoryEntry> {
        let entries = self.repo.history_entries();
        projector::filter(&entries, query)
            .into_iter()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StateStore};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedReply {
        results: Mutex<VecDeque<ExchangeResult>>,
    }

    impl ScriptedReply {
        fn new(results: Vec<ExchangeResult>) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results.into()),
            })
        }
    }

    #[async_trait::async_trait]
    impl ReplyService for ScriptedReply {
        async fn send(&self, _body: &str, _session_id: &str) -> ExchangeResult {
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(ExchangeResult::Failed)
        }
    }

    #[derive(Default)]
    struct ViewState {
        last_transcript: Vec<Message>,
        last_history: Vec<HistoryEntry>,
        pending_shown: usize,
        pending_cleared: usize,
    }

    #[derive(Clone, Default)]
    struct SharedView(Arc<Mutex<ViewState>>);

    impl TranscriptView for SharedView {
        fn render(&mut self, messages: &[Message]) {
            self.0.lock().unwrap().last_transcript = messages.to_vec();
        }
        fn show_pending(&mut self) {
            self.0.lock().unwrap().pending_shown += 1;
        }
        fn clear_pending(&mut self) {
            self.0.lock().unwrap().pending_cleared += 1;
        }
    }

    impl HistoryView for SharedView {
        fn render(&mut self, entries: &[HistoryEntry]) {
            self.0.lock().unwrap().last_history = entries.to_vec();
        }
    }

    struct FixedConfirm(bool);

    impl ConfirmDialog for FixedConfirm {
        fn confirm(&mut self, _title: &str, _text: &str) -> bool {
            self.0
        }
    }

    fn session(
        replies: Vec<ExchangeResult>,
        confirm: bool,
        policy: ExchangePolicy,
    ) -> (ChatSession, SharedView) {
        let repo =
            ConversationRepository::hydrate(StateStore::new(Arc::new(MemoryStore::new())))
                .unwrap();
        let view = SharedView::default();
        let session = ChatSession::new(
            repo,
            ScriptedReply::new(replies),
            Box::new(view.clone()),
            Box::new(view.clone()),
            Box::new(FixedConfirm(confirm)),
            policy,
        );
        (session, view)
    }

    #[tokio::test]
    async fn test_send_appends_user_then_reply() {
        let (mut session, view) = session(
            vec![ExchangeResult::Reply("hi there".to_string())],
            true,
            ExchangePolicy::Interleave,
        );

        let delivery = session.send_message("hello").await.unwrap();
        assert_eq!(delivery, Some(Delivery::Delivered));

        let repo = session.repository();
        let conv = repo.active_conversation().unwrap();
        assert_eq!(conv.messages.len(), 2);
        assert_eq!(conv.messages[0].sender, Sender::User);
        assert_eq!(conv.messages[0].body, "hello");
        assert_eq!(conv.messages[1].sender, Sender::Agent);
        assert_eq!(conv.messages[1].body, "hi there");

        let state = view.0.lock().unwrap();
        assert_eq!(state.last_history.len(), 1);
        assert_eq!(state.last_history[0].label, "hello");
        assert!(state.last_history[0].is_active);
        assert_eq!(state.pending_shown, 1);
        assert_eq!(state.pending_cleared, 1);
        assert_eq!(state.last_transcript.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_exchange_appends_substitute() {
        let (mut session, _) = session(
            vec![ExchangeResult::Failed],
            true,
            ExchangePolicy::Interleave,
        );

        session.send_message("hello").await.unwrap();

        let conv = session.repository().active_conversation().unwrap();
        assert_eq!(conv.messages[1].sender, Sender::Agent);
        assert_eq!(conv.messages[1].body, FAILURE_REPLY);
    }

    #[tokio::test]
    async fn test_no_reply_clears_pending_without_appending() {
        let (mut session, view) = session(
            vec![ExchangeResult::NoReply],
            true,
            ExchangePolicy::Interleave,
        );

        let delivery = session.send_message("hello").await.unwrap();
        assert_eq!(delivery, Some(Delivery::NoReply));

        // Only the user message exists; no substitute was persisted.
        let conv = session.repository().active_conversation().unwrap();
        assert_eq!(conv.messages.len(), 1);
        assert_eq!(conv.messages[0].sender, Sender::User);

        let state = view.0.lock().unwrap();
        assert_eq!(state.pending_shown, 1);
        assert_eq!(state.pending_cleared, 1);
    }

    #[tokio::test]
    async fn test_blank_body_is_rejected() {
        let (mut session, view) = session(vec![], true, ExchangePolicy::Interleave);

        let delivery = session.send_message("   ").await.unwrap();
        assert_eq!(delivery, None);
        assert!(session.repository().conversations().is_empty());
        assert_eq!(view.0.lock().unwrap().pending_shown, 0);
    }

    #[test]
    fn test_reply_for_deleted_conversation_is_discarded() {
        let (mut session, _) = session(vec![], true, ExchangePolicy::Interleave);

        let outcome = session.begin_send("hello").unwrap();
        let pending = match outcome {
            SendOutcome::Accepted(p) => p,
            other => panic!("unexpected outcome: {:?}", other),
        };

        // The conversation disappears while the exchange is in flight.
        assert!(session.delete(&pending.conversation_id).unwrap());

        let delivery = session
            .complete_send(pending, ExchangeResult::Reply("too late".to_string()))
            .unwrap();
        assert_eq!(delivery, Delivery::Discarded);

        // The replacement conversation never sees the orphaned reply.
        for conv in session.repository().conversations() {
            assert!(conv.messages.iter().all(|m| m.body != "too late"));
        }
    }

    #[test]
    fn test_reply_to_background_conversation_still_lands() {
        let (mut session, view) = session(vec![], true, ExchangePolicy::Interleave);

        let pending = match session.begin_send("first question").unwrap() {
            SendOutcome::Accepted(p) => p,
            other => panic!("unexpected outcome: {:?}", other),
        };

        // User starts a new chat before the reply arrives.
        session.new_chat().unwrap();

        let delivery = session
            .complete_send(pending.clone(), ExchangeResult::Reply("late answer".to_string()))
            .unwrap();
        assert_eq!(delivery, Delivery::Delivered);

        let original = session
            .repository()
            .conversation(&pending.conversation_id)
            .unwrap();
        assert_eq!(original.messages.last().unwrap().body, "late answer");

        // The rendered transcript is still the (empty) new chat.
        assert!(view.0.lock().unwrap().last_transcript.is_empty());
    }

    #[test]
    fn test_serialize_policy_refuses_overlap() {
        let (mut session, _) = session(vec![], true, ExchangePolicy::Serialize);

        let first = session.begin_send("one").unwrap();
        assert!(matches!(first, SendOutcome::Accepted(_)));

        let second = session.begin_send("two").unwrap();
        assert!(matches!(second, SendOutcome::Busy));

        // Only the accepted message reached the conversation.
        let conv = session.repository().active_conversation().unwrap();
        assert_eq!(conv.messages.len(), 1);
    }

    #[test]
    fn test_interleave_policy_resolves_in_completion_order() {
        let (mut session, _) = session(vec![], true, ExchangePolicy::Interleave);

        let first = match session.begin_send("one").unwrap() {
            SendOutcome::Accepted(p) => p,
            other => panic!("unexpected outcome: {:?}", other),
        };
        let second = match session.begin_send("two").unwrap() {
            SendOutcome::Accepted(p) => p,
            other => panic!("unexpected outcome: {:?}", other),
        };

        // The second exchange resolves before the first.
        session
            .complete_send(second, ExchangeResult::Reply("reply two".to_string()))
            .unwrap();
        session
            .complete_send(first, ExchangeResult::Reply("reply one".to_string()))
            .unwrap();

        let bodies: Vec<&str> = session
            .repository()
            .active_conversation()
            .unwrap()
            .messages
            .iter()
            .map(|m| m.body.as_str())
            .collect();
        assert_eq!(bodies, vec!["one", "two", "reply two", "reply one"]);
    }

    #[test]
    fn test_declined_confirmation_never_mutates() {
        let (mut session, _) = session(vec![], false, ExchangePolicy::Interleave);

        let id = session.new_chat().unwrap();
        let before: Vec<_> = session.repository().conversations().to_vec();

        assert!(!session.delete(&id).unwrap());
        assert!(!session.delete_all().unwrap());

        assert_eq!(session.repository().conversations(), before.as_slice());
        assert_eq!(session.repository().active_id(), Some(id.as_str()));
    }

    #[test]
    fn test_edit_message_rerenders_transcript() {
        let (mut session, view) = session(vec![], true, ExchangePolicy::Interleave);

        session.new_chat().unwrap();
        let pending = match session.begin_send("helo").unwrap() {
            SendOutcome::Accepted(p) => p,
            other => panic!("unexpected outcome: {:?}", other),
        };
        session
            .complete_send(pending, ExchangeResult::Reply("hi".to_string()))
            .unwrap();

        assert!(session.edit_message(0, "hello").unwrap());

        let state = view.0.lock().unwrap();
        assert_eq!(state.last_transcript[0].body, "hello");
        assert_eq!(state.last_transcript.len(), 2);
        // The history label follows the edited first message.
        assert_eq!(state.last_history[0].label, "hello");
    }

    #[test]
    fn test_search_filters_without_mutation() {
        let (mut session, _) = session(vec![], true, ExchangePolicy::Interleave);

        let a = session.new_chat().unwrap();
        session.rename(&a, "Rust questions").unwrap();
        let b = session.new_chat().unwrap();
        session.rename(&b, "dinner ideas").unwrap();

        let hits = session.search("rust");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, a);
        assert_eq!(session.repository().conversations().len(), 2);
    }
}
