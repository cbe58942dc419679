use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::quote::{QuoteExperience, QuoteSummary};

/// Routing lane, derived from the quote experience a lead was given.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    Instant,
    Tiered,
    Assessment,
    NoQuote,
}

impl Lane {
    pub const ALL: [Lane; 4] = [Lane::Instant, Lane::Tiered, Lane::Assessment, Lane::NoQuote];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Instant => "instant",
            Self::Tiered => "tiered",
            Self::Assessment => "assessment",
            Self::NoQuote => "no_quote",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Instant => "Instant Quote",
            Self::Tiered => "Tiered Quote",
            Self::Assessment => "Assessment",
            Self::NoQuote => "No Quote Yet",
        }
    }

    pub fn position(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown experience types land in `no_quote` rather than failing the board.
pub fn classify_lane(quote: Option<&QuoteSummary>) -> Lane {
    match quote.map(|quote| &quote.experience) {
        Some(QuoteExperience::Instant) => Lane::Instant,
        Some(QuoteExperience::Tiered) => Lane::Tiered,
        Some(QuoteExperience::Assessment) => Lane::Assessment,
        Some(QuoteExperience::Other(_)) | None => Lane::NoQuote,
    }
}

#[cfg(test)]
mod tests {
    use super::{classify_lane, Lane};
    use crate::domain::quote::{QuoteExperience, QuoteId, QuoteSummary};

    fn quote(experience: QuoteExperience) -> QuoteSummary {
        QuoteSummary { id: QuoteId("Q-1".to_string()), experience, total: None }
    }

    #[test]
    fn missing_quote_is_no_quote() {
        assert_eq!(classify_lane(None), Lane::NoQuote);
    }

    #[test]
    fn known_experiences_map_to_their_lane() {
        assert_eq!(classify_lane(Some(&quote(QuoteExperience::Instant))), Lane::Instant);
        assert_eq!(classify_lane(Some(&quote(QuoteExperience::Tiered))), Lane::Tiered);
        assert_eq!(classify_lane(Some(&quote(QuoteExperience::Assessment))), Lane::Assessment);
    }

    #[test]
    fn unrecognised_experience_degrades_to_no_quote() {
        let lane = classify_lane(Some(&quote(QuoteExperience::Other("bespoke".to_string()))));
        assert_eq!(lane, Lane::NoQuote);

        let parsed = QuoteExperience::parse("");
        assert_eq!(classify_lane(Some(&quote(parsed))), Lane::NoQuote);
    }

    #[test]
    fn every_classification_is_a_defined_lane() {
        let inputs = ["instant", "tiered", "assessment", "site_visit", "??", "", "FIXED"];
        for raw in inputs {
            let lane = classify_lane(Some(&quote(QuoteExperience::parse(raw))));
            assert!(Lane::ALL.contains(&lane), "{raw} produced an out-of-set lane");
        }
    }
}
