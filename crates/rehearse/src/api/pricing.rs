//! Token pricing and cumulative usage counters.

use serde::{Deserialize, Serialize};

use crate::UsageInfo;

/// Pricing for cost estimation (USD per 1M tokens).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelPricing {
    /// Price per 1M input tokens.
    pub input_per_million: f64,
    /// Price per 1M output tokens.
    pub output_per_million: f64,
}

impl ModelPricing {
    /// Estimate cost for given token counts.
    pub fn estimate_cost(&self, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        (prompt_tokens as f64 / 1_000_000.0) * self.input_per_million
            + (completion_tokens as f64 / 1_000_000.0) * self.output_per_million
    }
}

impl Default for ModelPricing {
    fn default() -> Self {
        Self {
            input_per_million: 0.05,
            output_per_million: 0.40,
        }
    }
}

/// Cumulative token and cost counters for one interview session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageTotals {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cost_usd: f64,
}

impl UsageTotals {
    /// Record the usage reported for one provider call.
    pub fn record(&mut self, usage: &UsageInfo, pricing: &ModelPricing) {
        self.prompt_tokens += u64::from(usage.prompt_tokens);
        self.completion_tokens += u64::from(usage.completion_tokens);
        self.cost_usd += pricing.estimate_cost(usage.prompt_tokens, usage.completion_tokens);
    }

    /// Total tokens consumed.
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    /// Format as a short summary string.
    pub fn summary(&self) -> String {
        format!(
            "tokens: {} prompt + {} completion = {} total, est. cost: ${:.6}",
            self.prompt_tokens,
            self.completion_tokens,
            self.total_tokens(),
            self.cost_usd,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_estimation() {
        let pricing = ModelPricing {
            input_per_million: 3.0,
            output_per_million: 15.0,
        };
        let cost = pricing.estimate_cost(1_000_000, 100_000);
        assert!((cost - 4.5).abs() < 0.01);
    }

    #[test]
    fn default_pricing_matches_mini_rates() {
        let cost = ModelPricing::default().estimate_cost(1_000_000, 1_000_000);
        assert!((cost - 0.45).abs() < 1e-9);
    }

    #[test]
    fn totals_accumulate() {
        let mut totals = UsageTotals::default();
        let pricing = ModelPricing::default();
        totals.record(&UsageInfo::new(1000, 500), &pricing);
        totals.record(&UsageInfo::new(2000, 1000), &pricing);
        assert_eq!(totals.prompt_tokens, 3000);
        assert_eq!(totals.completion_tokens, 1500);
        assert_eq!(totals.total_tokens(), 4500);
        assert!(totals.cost_usd > 0.0);
    }

    #[test]
    fn summary_format() {
        let mut totals = UsageTotals::default();
        totals.record(&UsageInfo::new(10, 5), &ModelPricing::default());
        let summary = totals.summary();
        assert!(summary.contains("tokens: 10 prompt + 5 completion = 15 total"));
        assert!(summary.contains("cost: $"));
    }
}
