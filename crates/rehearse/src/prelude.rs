//! Convenience re-exports for common `rehearse` types.
//!
//! ```ignore
//! use rehearse::prelude::*;
//! ```
//!
//! Covers what a front end needs to run interviews: the client and backend
//! seam, configuration, the session model and the interviewer. Prompt
//! templates and retry internals stay in their modules.

// ── Provider ────────────────────────────────────────────────────────
pub use crate::backend::{LlmBackend, LlmFuture, ScriptedBackend};
pub use crate::{
    ChatCompletion, ChatRequest, Message, MessageRole, OpenAiClient, UsageInfo, api_key_from_env,
};

// ── Configuration ───────────────────────────────────────────────────
pub use crate::api::{ModelPricing, RetryConfig, UsageTotals};
pub use crate::config::{AppConfig, Theme};
pub use crate::guard::{FILTERED_REPLY_NOTICE, GuardConfig, InputGuard, Rejection};

// ── Interview ───────────────────────────────────────────────────────
pub use crate::interview::{InterviewError, Interviewer, TurnOutcome};
pub use crate::score::{Evaluation, Performance, extract_score};
pub use crate::session::{Difficulty, InterviewSession, InterviewSettings, Persona, Role, Stage};

// ── Telemetry ───────────────────────────────────────────────────────
pub use crate::telemetry::{ActivityLog, LogLevel, LogLine, init_tracing};
