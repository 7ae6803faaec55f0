//! Input-safety guard pipeline.
//!
//! Every candidate answer passes these checks, in order, before it reaches
//! the interviewer model:
//!
//! 1. [`check_rate_limit`](InputGuard::check_rate_limit): per-session request cap.
//! 2. [`check_length`](InputGuard::check_length): character limit.
//! 3. [`classify_intent`](InputGuard::classify_intent): LLM classifier that
//!    answers `VALID` for genuine interview answers and `INVALID` for prompt
//!    injection, misuse or unrelated requests.
//! 4. [`moderate_input`](InputGuard::moderate_input): provider moderation.
//!
//! The interviewer's reply then goes through
//! [`moderate_output`](InputGuard::moderate_output) before it is shown.
//!
//! The first failing check short-circuits with a [`Rejection`] carrying a
//! user-facing message. Provider failures are not rejections: they surface
//! as [`GuardFailure::Provider`].

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::LlmBackend;
use crate::prompts::INPUT_GUARD_PROMPT;
use crate::{ChatRequest, Message, UsageInfo};

/// Notice shown in place of an interviewer reply that failed moderation.
pub const FILTERED_REPLY_NOTICE: &str = "⚠️ Response filtered for safety. Let's continue.";

/// Thresholds for the local guard checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Longest accepted answer, in characters.
    pub max_input_chars: usize,
    /// Answers accepted per session before the rate limit kicks in.
    pub max_requests_per_session: u32,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_input_chars: 800,
            max_requests_per_session: 30,
        }
    }
}

/// Why an answer was turned away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    /// Nothing but whitespace was submitted.
    Empty,
    /// The session used up its request budget.
    RateLimited { limit: u32 },
    /// The answer is longer than the configured limit.
    TooLong { chars: usize, max: usize },
    /// The intent classifier did not see a genuine interview answer.
    OffTopic,
    /// The provider moderation endpoint flagged the answer.
    UnsafeInput { categories: Vec<String> },
}

impl Rejection {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::Empty => "empty",
            Rejection::RateLimited { .. } => "rate_limited",
            Rejection::TooLong { .. } => "too_long",
            Rejection::OffTopic => "off_topic",
            Rejection::UnsafeInput { .. } => "unsafe_input",
        }
    }

    /// Message shown to the candidate.
    pub fn user_message(&self) -> String {
        match self {
            Rejection::Empty => "Please type an answer.".to_string(),
            Rejection::RateLimited { .. } => "🚫 Request limit reached.".to_string(),
            Rejection::TooLong { max, .. } => {
                format!("Answer too long. Please keep it to at most {max} characters.")
            }
            Rejection::OffTopic => {
                "Input rejected. Please answer the interview question.".to_string()
            }
            Rejection::UnsafeInput { .. } => "Input violates safety policy.".to_string(),
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.user_message())
    }
}

/// A guard check that did not let the input through.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardFailure {
    Rejected(Rejection),
    Provider(String),
}

impl From<Rejection> for GuardFailure {
    fn from(r: Rejection) -> Self {
        GuardFailure::Rejected(r)
    }
}

/// Result of running the full input pipeline.
#[derive(Debug)]
pub struct ScreenReport {
    pub result: Result<(), GuardFailure>,
    /// Usage of the intent classification call, when it ran.
    pub usage: Option<UsageInfo>,
}

/// Outcome of the intent classification call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntentVerdict {
    pub accepted: bool,
    pub usage: Option<UsageInfo>,
}

/// Interviewer reply after output moderation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeratedReply {
    pub text: String,
    pub filtered: bool,
}

/// Whether the classifier's raw reply accepts the input.
pub fn is_valid_verdict(reply: &str) -> bool {
    reply.trim().starts_with("VALID")
}

/// Runs the guard checks against one backend.
pub struct InputGuard<'a> {
    backend: &'a dyn LlmBackend,
    config: GuardConfig,
    model: &'a str,
    temperature: f32,
}

impl<'a> InputGuard<'a> {
    /// `model` and `temperature` are used for the intent classification call.
    pub fn new(backend: &'a dyn LlmBackend, config: GuardConfig, model: &'a str) -> Self {
        Self {
            backend,
            config,
            model,
            temperature: 0.0,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Reject once `request_count` has reached the session limit.
    pub fn check_rate_limit(&self, request_count: u32) -> Result<(), Rejection> {
        if request_count >= self.config.max_requests_per_session {
            return Err(Rejection::RateLimited {
                limit: self.config.max_requests_per_session,
            });
        }
        Ok(())
    }

    /// Reject blank answers and answers longer than the limit.
    pub fn check_length(&self, text: &str) -> Result<(), Rejection> {
        if text.trim().is_empty() {
            return Err(Rejection::Empty);
        }
        let chars = text.chars().count();
        if chars > self.config.max_input_chars {
            return Err(Rejection::TooLong {
                chars,
                max: self.config.max_input_chars,
            });
        }
        Ok(())
    }

    /// Ask the classifier whether `text` is a genuine interview answer.
    pub async fn classify_intent(&self, text: &str) -> Result<IntentVerdict, String> {
        let request = ChatRequest::new(
            self.model,
            vec![Message::system(INPUT_GUARD_PROMPT), Message::user(text)],
            self.temperature,
        );
        let completion = self.backend.chat(&request).await?;

        let verdict = completion.content_str();
        debug!("Intent classifier verdict: {:?}", verdict.trim());
        Ok(IntentVerdict {
            accepted: is_valid_verdict(verdict),
            usage: completion.usage,
        })
    }

    /// Reject input the provider's moderation model flags.
    pub async fn moderate_input(&self, text: &str) -> Result<(), GuardFailure> {
        let result = self
            .backend
            .moderate(text)
            .await
            .map_err(GuardFailure::Provider)?;
        if result.flagged {
            return Err(Rejection::UnsafeInput {
                categories: result.categories,
            }
            .into());
        }
        Ok(())
    }

    /// Replace a flagged interviewer reply with [`FILTERED_REPLY_NOTICE`].
    pub async fn moderate_output(&self, reply: String) -> Result<ModeratedReply, String> {
        let result = self.backend.moderate(&reply).await?;
        if result.flagged {
            warn!(
                categories = ?result.categories,
                "Interviewer reply filtered by moderation"
            );
            return Ok(ModeratedReply {
                text: FILTERED_REPLY_NOTICE.to_string(),
                filtered: true,
            });
        }
        Ok(ModeratedReply {
            text: reply,
            filtered: false,
        })
    }

    /// Run the input checks in order, stopping at the first failure.
    ///
    /// `request_count` is incremented once the rate-limit check passes, so
    /// every answer that reaches the later checks counts against the budget,
    /// whether or not it is accepted. Blank input is turned away before the
    /// counter moves.
    pub async fn screen(&self, request_count: &mut u32, text: &str) -> ScreenReport {
        let mut usage = None;
        let result = self.run_checks(request_count, text, &mut usage).await;
        if let Err(GuardFailure::Rejected(ref rejection)) = result {
            warn!(
                reason = rejection.code(),
                request_count = *request_count,
                "Answer rejected by guard"
            );
        }
        ScreenReport { result, usage }
    }

    async fn run_checks(
        &self,
        request_count: &mut u32,
        text: &str,
        usage: &mut Option<UsageInfo>,
    ) -> Result<(), GuardFailure> {
        if text.trim().is_empty() {
            return Err(Rejection::Empty.into());
        }
        self.check_rate_limit(*request_count)?;
        *request_count += 1;

        self.check_length(text)?;

        let verdict = self
            .classify_intent(text)
            .await
            .map_err(GuardFailure::Provider)?;
        *usage = verdict.usage;
        if !verdict.accepted {
            return Err(Rejection::OffTopic.into());
        }

        self.moderate_input(text).await
    }
}
