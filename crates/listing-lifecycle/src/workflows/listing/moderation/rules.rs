use super::config::PriceRange;
use super::{RuleOutcome, ValidationRule};
use crate::workflows::listing::domain::Listing;

/// Rejects descriptions containing a denylisted term, case-insensitively.
#[derive(Debug, Clone)]
pub struct ForbiddenTermsRule {
    terms: Vec<String>,
}

impl ForbiddenTermsRule {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let terms = terms
            .into_iter()
            .map(Into::into)
            .filter(|term: &String| !term.trim().is_empty())
            .collect();
        Self { terms }
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }
}

impl ValidationRule for ForbiddenTermsRule {
    fn name(&self) -> &str {
        "forbidden_terms"
    }

    fn check(&self, listing: &Listing) -> RuleOutcome {
        let Some(description) = listing.description() else {
            return RuleOutcome::Accepted;
        };
        let haystack = description.to_lowercase();

        // First term in configured order wins.
        match self
            .terms
            .iter()
            .find(|term| haystack.contains(&term.trim().to_lowercase()))
        {
            Some(term) => {
                RuleOutcome::Rejected(format!("description contains forbidden term '{term}'"))
            }
            None => RuleOutcome::Accepted,
        }
    }
}

/// Rejects prices outside an inclusive range.
#[derive(Debug, Clone, Copy)]
pub struct PriceRangeRule {
    range: PriceRange,
}

impl PriceRangeRule {
    pub fn new(range: PriceRange) -> Self {
        Self { range }
    }
}

impl ValidationRule for PriceRangeRule {
    fn name(&self) -> &str {
        "price_range"
    }

    fn check(&self, listing: &Listing) -> RuleOutcome {
        let price = listing.price();
        if self.range.contains(price) {
            RuleOutcome::Accepted
        } else {
            RuleOutcome::Rejected(format!(
                "price {price} outside allowed range {}..={}",
                self.range.min, self.range.max
            ))
        }
    }
}
