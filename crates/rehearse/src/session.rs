//! Per-user interview session state.
//!
//! An [`InterviewSession`] holds everything one candidate's browser session
//! (or terminal run) accumulates: the analysed strategy, the locked
//! [`InterviewSettings`], the transcript, scores, usage counters and the
//! guard's request counter. It moves through three [`Stage`]s and only
//! [`reset`](InterviewSession::reset) goes back.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::pricing::{ModelPricing, UsageTotals};
use crate::score::{Evaluation, MAX_SCORE, Performance};
use crate::{Message, MessageRole, UsageInfo};

// ── Settings ───────────────────────────────────────────────────────

/// How deep the interviewer's questions go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

/// The interviewer's tone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Persona {
    Friendly,
    #[default]
    Neutral,
    Strict,
}

impl Persona {
    pub const ALL: [Persona; 3] = [Persona::Friendly, Persona::Neutral, Persona::Strict];

    pub fn label(self) -> &'static str {
        match self {
            Persona::Friendly => "Friendly",
            Persona::Neutral => "Neutral",
            Persona::Strict => "Strict",
        }
    }
}

/// Interviewer specialism. `General` relies on the analysed job description
/// alone; the others add a subject-matter preset to the system prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[default]
    General,
    AiMl,
    Python,
    JavaScript,
    Java,
    PromptEngineer,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::General,
        Role::AiMl,
        Role::Python,
        Role::JavaScript,
        Role::Java,
        Role::PromptEngineer,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Role::General => "General",
            Role::AiMl => "AI/ML",
            Role::Python => "Python",
            Role::JavaScript => "JavaScript",
            Role::Java => "Java",
            Role::PromptEngineer => "Prompt Engineer",
        }
    }
}

macro_rules! label_enum_impls {
    ($ty:ident) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $ty::ALL
                    .into_iter()
                    .find(|v| v.label().eq_ignore_ascii_case(s.trim()))
                    .ok_or_else(|| {
                        let options: Vec<&str> = $ty::ALL.iter().map(|v| v.label()).collect();
                        format!("unknown {}: {s} (expected one of {})", stringify!($ty).to_lowercase(), options.join(", "))
                    })
            }
        }
    };
}

label_enum_impls!(Difficulty);
label_enum_impls!(Persona);
label_enum_impls!(Role);

/// Settings chosen before the interview starts and locked afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewSettings {
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub persona: Persona,
    #[serde(default)]
    pub role: Role,
}

// ── Session ────────────────────────────────────────────────────────

/// Where a session is in the interview flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// No analysed job description yet. Starting now uses the general
    /// strategy.
    AwaitingJobDescription,
    /// Strategy available; settings can still be changed.
    ReadyToStart,
    /// Interview running; settings are locked.
    InProgress,
}

/// State of one candidate's interview.
#[derive(Debug, Clone)]
pub struct InterviewSession {
    id: String,
    created_at: DateTime<Utc>,
    stage: Stage,
    strategy: Option<String>,
    settings: InterviewSettings,
    transcript: Vec<Message>,
    scores: Vec<u8>,
    evaluations: Vec<Evaluation>,
    usage: UsageTotals,
    request_count: u32,
    filtered_replies: u32,
}

impl Default for InterviewSession {
    fn default() -> Self {
        Self::new()
    }
}

impl InterviewSession {
    /// Fresh session with a random UUID.
    pub fn new() -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            stage: Stage::AwaitingJobDescription,
            strategy: None,
            settings: InterviewSettings::default(),
            transcript: Vec::new(),
            scores: Vec::new(),
            evaluations: Vec::new(),
            usage: UsageTotals::default(),
            request_count: 0,
            filtered_replies: 0,
        }
    }

    /// Start a new interview: every field returns to its default. The id is
    /// kept so the browser session stays attached.
    pub fn reset(&mut self) {
        *self = Self::with_id(std::mem::take(&mut self.id));
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn strategy(&self) -> Option<&str> {
        self.strategy.as_deref()
    }

    pub fn settings(&self) -> InterviewSettings {
        self.settings
    }

    /// Whether settings can no longer change.
    pub fn settings_locked(&self) -> bool {
        self.stage == Stage::InProgress
    }

    /// Full transcript, system prompt included.
    pub fn messages(&self) -> &[Message] {
        &self.transcript
    }

    /// Transcript as shown to the candidate (no system prompt).
    pub fn visible_messages(&self) -> impl Iterator<Item = &Message> {
        self.transcript
            .iter()
            .filter(|m| m.role != MessageRole::System)
    }

    pub fn scores(&self) -> &[u8] {
        &self.scores
    }

    pub fn evaluations(&self) -> &[Evaluation] {
        &self.evaluations
    }

    pub fn usage(&self) -> &UsageTotals {
        &self.usage
    }

    /// Answers that passed the guard so far.
    pub fn request_count(&self) -> u32 {
        self.request_count
    }

    /// Interviewer replies replaced by the output moderation notice.
    pub fn filtered_replies(&self) -> u32 {
        self.filtered_replies
    }

    /// Number of candidate answers in the transcript.
    pub fn turn_count(&self) -> usize {
        self.transcript
            .iter()
            .filter(|m| m.role == MessageRole::User)
            .count()
    }

    pub fn performance(&self) -> Performance {
        Performance::from_scores(&self.scores)
    }

    /// Most recent interviewer question together with the answer given to it.
    pub fn last_exchange(&self) -> Option<(&str, &str)> {
        let answer_idx = self
            .transcript
            .iter()
            .rposition(|m| m.role == MessageRole::User)?;
        let question = self.transcript[..answer_idx]
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant)?;
        Some((&question.content, &self.transcript[answer_idx].content))
    }

    /// Add usage reported by a provider call to the running totals.
    pub fn record_usage(&mut self, usage: Option<&UsageInfo>, pricing: &ModelPricing) {
        if let Some(usage) = usage {
            self.usage.record(usage, pricing);
        }
    }

    // ── Transitions (driven by the interviewer) ────────────────────

    pub(crate) fn set_strategy(&mut self, strategy: String) {
        self.strategy = Some(strategy);
        self.stage = Stage::ReadyToStart;
    }

    /// Lock settings and seed the transcript with the system prompt and the
    /// first question.
    pub(crate) fn begin(
        &mut self,
        settings: InterviewSettings,
        system_prompt: String,
        first_question: String,
    ) {
        self.settings = settings;
        self.transcript = vec![
            Message::system(system_prompt),
            Message::assistant(first_question),
        ];
        self.stage = Stage::InProgress;
    }

    pub(crate) fn request_counter(&mut self) -> &mut u32 {
        &mut self.request_count
    }

    pub(crate) fn push_message(&mut self, message: Message) {
        self.transcript.push(message);
    }

    /// Drop a trailing candidate answer whose reply never arrived.
    pub(crate) fn pop_unanswered(&mut self) -> Option<Message> {
        if self
            .transcript
            .last()
            .is_some_and(|m| m.role == MessageRole::User)
        {
            self.transcript.pop()
        } else {
            None
        }
    }

    pub(crate) fn push_score(&mut self, score: u8) {
        if score <= MAX_SCORE {
            self.scores.push(score);
        }
    }

    pub(crate) fn push_evaluation(&mut self, evaluation: Evaluation) {
        self.evaluations.push(evaluation);
    }

    pub(crate) fn note_filtered_reply(&mut self) {
        self.filtered_replies += 1;
    }
}
