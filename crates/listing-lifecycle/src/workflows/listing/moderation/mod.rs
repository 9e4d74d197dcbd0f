mod config;
mod rules;

pub use config::{ModerationConfig, PriceRange, DEFAULT_MAX_PRICE, DEFAULT_MIN_PRICE};
pub use rules::{ForbiddenTermsRule, PriceRangeRule};

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use super::domain::Listing;

/// Outcome of a single rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    Accepted,
    Rejected(String),
}

/// One accept/reject predicate evaluated during moderation.
pub trait ValidationRule: Debug + Send + Sync {
    fn name(&self) -> &str;
    fn check(&self, listing: &Listing) -> RuleOutcome;
}

/// Rejection surfaced by the pipeline, naming the rule that stopped it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub rule: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(Rejection),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

/// Ordered, short-circuiting composition of rules.
#[derive(Debug, Default)]
pub struct ValidationPipeline {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl ValidationPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forbidden terms first, then the price range.
    pub fn from_config(config: &ModerationConfig) -> Self {
        Self::new()
            .with_rule(ForbiddenTermsRule::new(config.forbidden_terms.iter().cloned()))
            .with_rule(PriceRangeRule::new(config.price_range))
    }

    pub fn with_rule<R>(mut self, rule: R) -> Self
    where
        R: ValidationRule + 'static,
    {
        self.push(Box::new(rule));
        self
    }

    pub fn push(&mut self, rule: Box<dyn ValidationRule>) {
        self.rules.push(rule);
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    pub fn evaluate(&self, listing: &Listing) -> Verdict {
        self.rules
            .iter()
            .find_map(|rule| match rule.check(listing) {
                RuleOutcome::Accepted => None,
                RuleOutcome::Rejected(reason) => Some(Rejection {
                    rule: rule.name().to_string(),
                    reason,
                }),
            })
            .map_or(Verdict::Accepted, Verdict::Rejected)
    }
}
