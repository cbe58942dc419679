use chrono::Duration;

use crate::domain::quote::QuoteId;
use crate::domain::stage::Stage;
use crate::pipeline::projection::NavigationLinks;
use crate::pipeline::sla::SlaStatus;

/// Base URLs for the outbound navigation targets attached to each item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkSettings {
    pub messaging_base_url: String,
    pub quote_viewer_base_url: String,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            messaging_base_url: "https://wa.me/".to_string(),
            quote_viewer_base_url: "/quote".to_string(),
        }
    }
}

impl LinkSettings {
    pub fn links_for(&self, phone: &str, quote_id: Option<&QuoteId>) -> NavigationLinks {
        let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
        let (call, message) = if digits.is_empty() {
            (None, None)
        } else {
            let international = phone.trim_start().starts_with('+');
            let dial = if international { format!("+{digits}") } else { digits.clone() };
            (
                Some(format!("tel:{dial}")),
                Some(format!("{}/{digits}", self.messaging_base_url.trim_end_matches('/'))),
            )
        };
        let quote = quote_id.map(|id| {
            let base = self.quote_viewer_base_url.trim_end_matches('/');
            format!("{base}/{}", encode_path_segment(&id.0))
        });

        NavigationLinks { call, message, quote }
    }
}

/// Percent-encodes everything outside `[A-Za-z0-9*._-]`.
///
/// `byte_serialize` writes spaces as `+` and a literal `+` as `%2B`, so every `+` in
/// its output stands for a space.
fn encode_path_segment(segment: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(segment.as_bytes()).collect();
    encoded.replace('+', "%20")
}

/// Compact human readable duration: `just now`, `45m`, `3h 20m`, `2d 4h`.
pub fn format_time_in_stage(elapsed: Duration) -> String {
    let minutes = elapsed.num_minutes().max(0);
    if minutes < 1 {
        return "just now".to_string();
    }
    if minutes < 60 {
        return format!("{minutes}m");
    }

    let hours = minutes / 60;
    if hours < 24 {
        let rest = minutes % 60;
        return if rest == 0 { format!("{hours}h") } else { format!("{hours}h {rest}m") };
    }

    let days = hours / 24;
    let rest = hours % 24;
    if rest == 0 {
        format!("{days}d")
    } else {
        format!("{days}d {rest}h")
    }
}

pub fn next_action(stage: Stage, sla: SlaStatus) -> String {
    let hint = match stage {
        Stage::NewLead => "Call to qualify the lead",
        Stage::Contacted => "Request a job video",
        Stage::AwaitingVideo => "Chase the customer for their video",
        Stage::QuoteSent => "Follow up on the quote",
        Stage::QuoteViewed => "Call to answer questions and close",
        Stage::AwaitingPayment => "Chase the deposit payment",
        Stage::Booked => "Confirm the job date",
        Stage::InProgress => "Check in on job progress",
        Stage::Completed => "Ask for a review",
        Stage::Expired => "Offer a refreshed quote",
        Stage::Lost | Stage::Declined => "No action needed",
    };

    if sla == SlaStatus::Overdue && stage.is_active() {
        format!("Overdue: {hint}")
    } else {
        hint.to_string()
    }
}
