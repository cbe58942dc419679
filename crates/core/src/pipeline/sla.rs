use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::stage::Stage;

/// Urgency of a lead relative to how long it has sat in its current stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaStatus {
    Ok,
    Warning,
    Overdue,
}

impl SlaStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warning => "warning",
            Self::Overdue => "overdue",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlaThreshold {
    pub warning_after: Duration,
    pub overdue_after: Duration,
}

impl SlaThreshold {
    /// `overdue_after` is raised to `warning_after` when given out of order.
    pub fn new(warning_after: Duration, overdue_after: Duration) -> Self {
        let warning_after = warning_after.max(Duration::zero());
        Self { warning_after, overdue_after: overdue_after.max(warning_after) }
    }

    pub fn minutes(warning_after: i64, overdue_after: i64) -> Self {
        Self::new(Duration::minutes(warning_after), Duration::minutes(overdue_after))
    }

    pub fn hours(warning_after: i64, overdue_after: i64) -> Self {
        Self::new(Duration::hours(warning_after), Duration::hours(overdue_after))
    }

    pub fn classify(&self, elapsed: Duration) -> SlaStatus {
        let elapsed = elapsed.max(Duration::zero());
        if elapsed < self.warning_after {
            SlaStatus::Ok
        } else if elapsed < self.overdue_after {
            SlaStatus::Warning
        } else {
            SlaStatus::Overdue
        }
    }
}

/// Per-stage SLA thresholds with a fallback for stages that have none.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlaPolicy {
    thresholds: BTreeMap<Stage, SlaThreshold>,
    fallback: SlaThreshold,
}

impl SlaPolicy {
    pub fn new(fallback: SlaThreshold) -> Self {
        Self { thresholds: BTreeMap::new(), fallback }
    }

    pub fn with_threshold(mut self, stage: Stage, threshold: SlaThreshold) -> Self {
        self.thresholds.insert(stage, threshold);
        self
    }

    pub fn set_threshold(&mut self, stage: Stage, threshold: SlaThreshold) {
        self.thresholds.insert(stage, threshold);
    }

    pub fn threshold_for(&self, stage: Stage) -> SlaThreshold {
        self.thresholds.get(&stage).copied().unwrap_or(self.fallback)
    }

    pub fn fallback(&self) -> SlaThreshold {
        self.fallback
    }

    /// Explicitly configured stages, in canonical stage order.
    pub fn thresholds(&self) -> impl Iterator<Item = (Stage, SlaThreshold)> + '_ {
        self.thresholds.iter().map(|(stage, threshold)| (*stage, *threshold))
    }

    /// Negative `elapsed` (clock skew, caller bug) is treated as zero.
    pub fn classify(&self, stage: Stage, elapsed: Duration) -> SlaStatus {
        self.threshold_for(stage).classify(elapsed)
    }

    pub fn classify_at(
        &self,
        stage: Stage,
        stage_entered_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> SlaStatus {
        self.classify(stage, now - stage_entered_at)
    }
}

impl Default for SlaPolicy {
    fn default() -> Self {
        Self::new(SlaThreshold::hours(24, 72))
            .with_threshold(Stage::NewLead, SlaThreshold::minutes(15, 60))
            .with_threshold(Stage::Contacted, SlaThreshold::hours(4, 24))
            .with_threshold(Stage::AwaitingVideo, SlaThreshold::hours(24, 72))
            .with_threshold(Stage::QuoteSent, SlaThreshold::hours(1, 4))
            .with_threshold(Stage::QuoteViewed, SlaThreshold::hours(2, 24))
            .with_threshold(Stage::AwaitingPayment, SlaThreshold::hours(24, 72))
            .with_threshold(Stage::Booked, SlaThreshold::hours(72, 14 * 24))
            .with_threshold(Stage::InProgress, SlaThreshold::hours(72, 7 * 24))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{SlaPolicy, SlaStatus, SlaThreshold};
    use crate::domain::stage::Stage;

    #[test]
    fn quote_sent_ten_minutes_in_is_ok() {
        let policy = SlaPolicy::default();
        assert_eq!(policy.classify(Stage::QuoteSent, Duration::minutes(10)), SlaStatus::Ok);
    }

    #[test]
    fn quote_sent_five_hours_in_is_overdue() {
        let policy = SlaPolicy::default();
        assert_eq!(policy.classify(Stage::QuoteSent, Duration::hours(5)), SlaStatus::Overdue);
    }

    #[test]
    fn band_boundaries_belong_to_the_upper_band() {
        let threshold = SlaThreshold::hours(1, 4);

        assert_eq!(threshold.classify(Duration::hours(1) - Duration::seconds(1)), SlaStatus::Ok);
        assert_eq!(threshold.classify(Duration::hours(1)), SlaStatus::Warning);
        assert_eq!(
            threshold.classify(Duration::hours(4) - Duration::seconds(1)),
            SlaStatus::Warning
        );
        assert_eq!(threshold.classify(Duration::hours(4)), SlaStatus::Overdue);
    }

    #[test]
    fn bands_partition_elapsed_time_for_every_stage() {
        let policy = SlaPolicy::default();

        for stage in Stage::ordered() {
            let threshold = policy.threshold_for(*stage);
            let mut previous = SlaStatus::Ok;
            for minutes in 0..=(21 * 24 * 60) {
                let elapsed = Duration::minutes(minutes);
                let status = policy.classify(*stage, elapsed);

                let in_ok = elapsed < threshold.warning_after;
                let in_warning =
                    elapsed >= threshold.warning_after && elapsed < threshold.overdue_after;
                let in_overdue = elapsed >= threshold.overdue_after;
                assert_eq!(
                    [in_ok, in_warning, in_overdue].iter().filter(|hit| **hit).count(),
                    1,
                    "bands must not overlap or leave gaps for {stage} at {minutes}m"
                );
                let expected = if in_ok {
                    SlaStatus::Ok
                } else if in_warning {
                    SlaStatus::Warning
                } else {
                    SlaStatus::Overdue
                };
                assert_eq!(status, expected, "{stage} at {minutes}m");
                assert!(status >= previous, "urgency never decreases as time passes");
                previous = status;
            }
        }
    }

    #[test]
    fn negative_elapsed_is_clamped_to_zero() {
        let policy = SlaPolicy::default();
        assert_eq!(policy.classify(Stage::NewLead, Duration::hours(-3)), SlaStatus::Ok);

        let zero_warning = SlaPolicy::new(SlaThreshold::minutes(0, 10));
        assert_eq!(zero_warning.classify(Stage::Booked, Duration::minutes(-5)), SlaStatus::Warning);
    }

    #[test]
    fn unmapped_stages_use_fallback() {
        let policy = SlaPolicy::new(SlaThreshold::hours(2, 6))
            .with_threshold(Stage::QuoteSent, SlaThreshold::hours(1, 4));

        assert_eq!(policy.threshold_for(Stage::Lost), SlaThreshold::hours(2, 6));
        assert_eq!(policy.classify(Stage::Contacted, Duration::hours(3)), SlaStatus::Warning);
        assert_eq!(policy.classify(Stage::QuoteSent, Duration::hours(3)), SlaStatus::Warning);
        assert_eq!(policy.classify(Stage::Contacted, Duration::hours(6)), SlaStatus::Overdue);
    }

    #[test]
    fn out_of_order_thresholds_collapse_the_warning_band() {
        let threshold = SlaThreshold::hours(4, 1);
        assert_eq!(threshold.overdue_after, Duration::hours(4));
        assert_eq!(threshold.classify(Duration::hours(3)), SlaStatus::Ok);
        assert_eq!(threshold.classify(Duration::hours(4)), SlaStatus::Overdue);
    }

    #[test]
    fn classify_at_uses_stage_entry_time() {
        let policy = SlaPolicy::default();
        let entered = Utc.with_ymd_and_hms(2026, 4, 1, 8, 0, 0).unwrap();
        let now = entered + Duration::minutes(90);

        assert_eq!(policy.classify_at(Stage::QuoteSent, entered, now), SlaStatus::Warning);
        assert_eq!(policy.classify_at(Stage::QuoteSent, now, entered), SlaStatus::Ok);
    }
}
