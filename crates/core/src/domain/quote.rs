use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuoteId(pub String);

impl fmt::Display for QuoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of quote experience that was presented to the customer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteExperience {
    Instant,
    Tiered,
    Assessment,
    /// Recorded value that this build does not recognise.
    Other(String),
}

impl QuoteExperience {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "instant" | "fixed" | "fixed_price" => Self::Instant,
            "tiered" | "tiers" | "multi_tier" => Self::Tiered,
            "assessment" | "consultation" | "site_visit" => Self::Assessment,
            _ => Self::Other(value.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Instant => "instant",
            Self::Tiered => "tiered",
            Self::Assessment => "assessment",
            Self::Other(raw) => raw,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteSummary {
    pub id: QuoteId,
    pub experience: QuoteExperience,
    #[serde(default)]
    pub total: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::QuoteExperience;

    #[test]
    fn parse_recognises_aliases() {
        assert_eq!(QuoteExperience::parse("fixed-price"), QuoteExperience::Instant);
        assert_eq!(QuoteExperience::parse(" Multi_Tier "), QuoteExperience::Tiered);
        assert_eq!(QuoteExperience::parse("consultation"), QuoteExperience::Assessment);
    }

    #[test]
    fn parse_keeps_unrecognised_values() {
        let parsed = QuoteExperience::parse("bespoke");
        assert_eq!(parsed, QuoteExperience::Other("bespoke".to_string()));
        assert_eq!(parsed.as_str(), "bespoke");
    }
}
