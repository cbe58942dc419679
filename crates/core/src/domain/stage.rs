use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Lifecycle stage of a lead. Declaration order is the canonical column order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    NewLead,
    Contacted,
    AwaitingVideo,
    QuoteSent,
    QuoteViewed,
    AwaitingPayment,
    Booked,
    InProgress,
    Completed,
    Lost,
    Expired,
    Declined,
}

impl Stage {
    pub const ALL: [Stage; 12] = [
        Stage::NewLead,
        Stage::Contacted,
        Stage::AwaitingVideo,
        Stage::QuoteSent,
        Stage::QuoteViewed,
        Stage::AwaitingPayment,
        Stage::Booked,
        Stage::InProgress,
        Stage::Completed,
        Stage::Lost,
        Stage::Expired,
        Stage::Declined,
    ];

    pub const TERMINAL: [Stage; 4] =
        [Stage::Completed, Stage::Lost, Stage::Expired, Stage::Declined];

    /// Stages in canonical layout order.
    pub fn ordered() -> &'static [Stage] {
        &Self::ALL
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Lost | Self::Expired | Self::Declined)
    }

    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Column index in the canonical ordering.
    pub fn position(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NewLead => "new_lead",
            Self::Contacted => "contacted",
            Self::AwaitingVideo => "awaiting_video",
            Self::QuoteSent => "quote_sent",
            Self::QuoteViewed => "quote_viewed",
            Self::AwaitingPayment => "awaiting_payment",
            Self::Booked => "booked",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Lost => "lost",
            Self::Expired => "expired",
            Self::Declined => "declined",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::NewLead => "New Lead",
            Self::Contacted => "Contacted",
            Self::AwaitingVideo => "Awaiting Video",
            Self::QuoteSent => "Quote Sent",
            Self::QuoteViewed => "Quote Viewed",
            Self::AwaitingPayment => "Awaiting Payment",
            Self::Booked => "Booked",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
            Self::Lost => "Lost",
            Self::Expired => "Expired",
            Self::Declined => "Declined",
        }
    }

    /// Lenient parse of stored or user supplied stage names.
    ///
    /// Accepts the canonical snake_case form as well as labels and
    /// hyphen/space separated variants (`"Quote Sent"`, `"quote-sent"`).
    pub fn parse(value: &str) -> Option<Self> {
        let normalized: String = value
            .trim()
            .chars()
            .map(|ch| if ch == '-' || ch == ' ' { '_' } else { ch.to_ascii_lowercase() })
            .collect();

        Self::ALL.into_iter().find(|stage| stage.as_str() == normalized)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| DomainError::UnknownStage(value.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::Stage;

    #[test]
    fn canonical_order_matches_lifecycle() {
        let names: Vec<&str> = Stage::ordered().iter().map(|stage| stage.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "new_lead",
                "contacted",
                "awaiting_video",
                "quote_sent",
                "quote_viewed",
                "awaiting_payment",
                "booked",
                "in_progress",
                "completed",
                "lost",
                "expired",
                "declined",
            ]
        );
        for (index, stage) in Stage::ordered().iter().enumerate() {
            assert_eq!(stage.position(), index);
        }
    }

    #[test]
    fn active_and_terminal_partition_the_registry() {
        let active = Stage::ALL.iter().filter(|stage| stage.is_active()).count();
        let terminal = Stage::ALL.iter().filter(|stage| stage.is_terminal()).count();

        assert_eq!(active, 8);
        assert_eq!(terminal, 4);
        assert!(Stage::InProgress.is_active());
        assert!(Stage::TERMINAL.iter().all(|stage| stage.is_terminal()));
    }

    #[test]
    fn labels_are_human_readable() {
        assert_eq!(Stage::NewLead.label(), "New Lead");
        assert_eq!(Stage::AwaitingPayment.label(), "Awaiting Payment");
    }

    #[test]
    fn parse_accepts_label_and_separator_variants() {
        assert_eq!(Stage::parse("quote_sent"), Some(Stage::QuoteSent));
        assert_eq!(Stage::parse("Quote Sent"), Some(Stage::QuoteSent));
        assert_eq!(Stage::parse(" quote-sent "), Some(Stage::QuoteSent));
        assert_eq!(Stage::parse("archived"), None);
        assert_eq!(Stage::parse(""), None);
    }

    #[test]
    fn from_str_reports_unknown_stage() {
        let error = "archived".parse::<Stage>().expect_err("unknown stage");
        assert_eq!(error.to_string(), "unknown stage `archived`");
    }

    #[test]
    fn serde_uses_snake_case_wire_names() {
        let encoded = serde_json::to_string(&Stage::AwaitingVideo).expect("encode");
        assert_eq!(encoded, "\"awaiting_video\"");
        let decoded: Stage = serde_json::from_str("\"in_progress\"").expect("decode");
        assert_eq!(decoded, Stage::InProgress);
    }
}
