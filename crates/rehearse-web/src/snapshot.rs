//! Serializable projection of an [`InterviewSession`] for the REST API.
//!
//! The session keeps the system prompt in its transcript and has no public
//! fields. [`SessionSnapshot`] is what the browser sees: the visible
//! messages, the performance summary, cost, and how much of the request
//! budget is left.

use rehearse::api::UsageTotals;
use rehearse::guard::GuardConfig;
use rehearse::score::{Evaluation, Performance};
use rehearse::session::{InterviewSession, InterviewSettings, Stage};
use rehearse::Message;
use serde::Serialize;

/// Serializable view of one session.
#[derive(Debug, Serialize)]
pub struct SessionSnapshot {
    pub id: String,
    /// RFC 3339 creation time.
    pub created_at: String,

    // ── Flow ──
    pub stage: Stage,
    pub strategy: Option<String>,
    pub settings: InterviewSettings,
    pub settings_locked: bool,

    // ── Conversation ──
    pub messages: Vec<Message>,
    pub scores: Vec<u8>,
    pub performance: Performance,
    pub evaluations: Vec<Evaluation>,
    pub filtered_replies: u32,

    // ── Budget ──
    pub usage: UsageTotals,
    pub request_count: u32,
    pub remaining_requests: u32,
}

impl SessionSnapshot {
    pub fn from_session(session: &InterviewSession, guard: &GuardConfig) -> Self {
        Self {
            id: session.id().to_string(),
            created_at: session.created_at().to_rfc3339(),
            stage: session.stage(),
            strategy: session.strategy().map(str::to_string),
            settings: session.settings(),
            settings_locked: session.settings_locked(),
            messages: session.visible_messages().cloned().collect(),
            scores: session.scores().to_vec(),
            performance: session.performance(),
            evaluations: session.evaluations().to_vec(),
            filtered_replies: session.filtered_replies(),
            usage: *session.usage(),
            request_count: session.request_count(),
            remaining_requests: guard
                .max_requests_per_session
                .saturating_sub(session.request_count()),
        }
    }
}
