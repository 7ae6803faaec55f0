//! Provider plumbing shared by every LLM call.
//!
//! - [`retry`]: transient error detection (429, 5xx, network timeouts) with
//!   configurable exponential backoff. Off by default; never retries 400/401.
//! - [`pricing`]: per-token pricing and the cumulative [`UsageTotals`]
//!   counter each interview session carries.

pub mod pricing;
pub mod retry;

pub use pricing::{ModelPricing, UsageTotals};
pub use retry::RetryConfig;
