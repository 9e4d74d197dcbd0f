use serde::{Deserialize, Serialize};

pub const DEFAULT_MIN_PRICE: u64 = 1_000;
pub const DEFAULT_MAX_PRICE: u64 = 2_000_000;

/// Inclusive price bounds accepted by moderation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: u64,
    pub max: u64,
}

impl PriceRange {
    pub fn contains(&self, price: u64) -> bool {
        (self.min..=self.max).contains(&price)
    }
}

impl Default for PriceRange {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_PRICE,
            max: DEFAULT_MAX_PRICE,
        }
    }
}

/// Business data consumed by the moderation pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationConfig {
    pub forbidden_terms: Vec<String>,
    pub price_range: PriceRange,
}
