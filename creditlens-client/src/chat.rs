//! Tuple-scoped chat transcript.

use creditlens_core::{ChatTurn, FetchResult, Fingerprint};
use uuid::Uuid;

/// Turn appended when a chat request fails.
pub const CHAT_ERROR_MESSAGE: &str = "Error — please try again.";

/// An outstanding chat question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTicket {
    pub fingerprint: Fingerprint,
    pub request_id: Uuid,
    pub question: String,
    /// Turns preceding the question.
    pub history: Vec<ChatTurn>,
}

/// Append-only question/answer log for one selection.
///
/// Moving to another selection discards the log and any outstanding
/// question. At most one question is outstanding at a time.
#[derive(Debug, Default)]
pub struct ChatTranscript {
    scope: Option<Fingerprint>,
    turns: Vec<ChatTurn>,
    pending: Option<Uuid>,
}

impl ChatTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new empty transcript if `fingerprint` differs from the
    /// current scope. Returns whether the transcript was reset.
    pub fn scope_to(&mut self, fingerprint: Fingerprint) -> bool {
        if self.scope == Some(fingerprint) {
            return false;
        }
        if !self.turns.is_empty() || self.pending.is_some() {
            tracing::debug!(
                turns = self.turns.len(),
                fingerprint = %fingerprint.short(),
                "Discarding chat transcript"
            );
        }
        self.scope = Some(fingerprint);
        self.turns.clear();
        self.pending = None;
        true
    }

    /// Record the user's question and return the ticket for the request.
    ///
    /// Blank questions and questions asked while another is outstanding are
    /// ignored.
    pub fn begin(&mut self, question: &str, fingerprint: Fingerprint) -> Option<ChatTicket> {
        let question = question.trim();
        if question.is_empty() || self.pending.is_some() {
            return None;
        }
        self.scope_to(fingerprint);

        let history = self.turns.clone();
        let request_id = Uuid::now_v7();
        self.turns.push(ChatTurn::user(question));
        self.pending = Some(request_id);
        Some(ChatTicket {
            fingerprint,
            request_id,
            question: question.to_string(),
            history,
        })
    }

    /// Append the reply for `ticket`. Replies for a superseded selection or
    /// an abandoned question are dropped.
    pub fn complete(
        &mut self,
        ticket: &ChatTicket,
        result: FetchResult<String>,
        current: Fingerprint,
    ) -> bool {
        let owned = self.pending == Some(ticket.request_id);
        if ticket.fingerprint != current || self.scope != Some(current) || !owned {
            tracing::debug!(request_id = %ticket.request_id, "Dropping stale chat reply");
            return false;
        }
        self.pending = None;
        match result {
            Ok(answer) => self.turns.push(ChatTurn::assistant(answer)),
            Err(error) => {
                tracing::warn!(error = %error, "Chat request failed");
                self.turns.push(ChatTurn::error(CHAT_ERROR_MESSAGE));
            }
        }
        true
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn is_waiting(&self) -> bool {
        self.pending.is_some()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.scope = None;
        self.turns.clear();
        self.pending = None;
    }
}
