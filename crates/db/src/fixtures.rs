use chrono::{DateTime, Duration, Utc};

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Deterministic demo board: every lane and most stages have at least one lead.
const SEED_LEADS: &[SeedLeadContract] = &[
    SeedLeadContract {
        id: "L1",
        name: "Priya Shah",
        phone: "+447700900101",
        job_description: "Replace combi boiler",
        source: Some("google"),
        stage: "new_lead",
        minutes_in_stage: 5,
        quote: None,
    },
    SeedLeadContract {
        id: "L2",
        name: "Tom Hughes",
        phone: "+447700900102",
        job_description: "Garden fence, 12m",
        source: Some("referral"),
        stage: "new_lead",
        minutes_in_stage: 90,
        quote: None,
    },
    SeedLeadContract {
        id: "L3",
        name: "Amara Okafor",
        phone: "+447700900103",
        job_description: "Bathroom refit",
        source: Some("facebook"),
        stage: "quote_sent",
        minutes_in_stage: 10,
        quote: Some(SeedQuote { id: "Q3", experience: "instant", total: "1850.00" }),
    },
    SeedLeadContract {
        id: "L4",
        name: "Rhys Morgan",
        phone: "+447700900104",
        job_description: "Loft insulation",
        source: None,
        stage: "quote_sent",
        minutes_in_stage: 300,
        quote: Some(SeedQuote { id: "Q4", experience: "instant", total: "950.00" }),
    },
    SeedLeadContract {
        id: "L5",
        name: "Chloe Martin",
        phone: "+447700900105",
        job_description: "Kitchen extension",
        source: Some("google"),
        stage: "quote_viewed",
        minutes_in_stage: 180,
        quote: Some(SeedQuote { id: "Q5", experience: "tiered", total: "24500.00" }),
    },
    SeedLeadContract {
        id: "L6",
        name: "Sam Patel",
        phone: "+447700900106",
        job_description: "Driveway resurfacing",
        source: Some("flyer"),
        stage: "awaiting_payment",
        minutes_in_stage: 60 * 30,
        quote: Some(SeedQuote { id: "Q6", experience: "tiered", total: "6200.00" }),
    },
    SeedLeadContract {
        id: "L7",
        name: "Jordan Ellis",
        phone: "+447700900107",
        job_description: "Roof survey and repair",
        source: Some("referral"),
        stage: "contacted",
        minutes_in_stage: 120,
        quote: Some(SeedQuote { id: "Q7", experience: "assessment", total: "0" }),
    },
    SeedLeadContract {
        id: "L8",
        name: "Nia Williams",
        phone: "+447700900108",
        job_description: "Damp survey",
        source: None,
        stage: "awaiting_video",
        minutes_in_stage: 60 * 80,
        quote: Some(SeedQuote { id: "Q8", experience: "assessment", total: "150.00" }),
    },
    SeedLeadContract {
        id: "L9",
        name: "Owen Price",
        phone: "+447700900109",
        job_description: "Boiler service",
        source: Some("google"),
        stage: "booked",
        minutes_in_stage: 60 * 24,
        quote: Some(SeedQuote { id: "Q9", experience: "instant", total: "120.00" }),
    },
    SeedLeadContract {
        id: "L10",
        name: "Grace Evans",
        phone: "+447700900110",
        job_description: "Rewire two-bed flat",
        source: Some("referral"),
        stage: "in_progress",
        minutes_in_stage: 60 * 48,
        quote: Some(SeedQuote { id: "Q10", experience: "tiered", total: "4800.00" }),
    },
    SeedLeadContract {
        id: "L11",
        name: "Ben Carter",
        phone: "+447700900111",
        job_description: "Window replacement",
        source: None,
        stage: "completed",
        minutes_in_stage: 60 * 24 * 3,
        quote: Some(SeedQuote { id: "Q11", experience: "instant", total: "3100.00" }),
    },
    SeedLeadContract {
        id: "L12",
        name: "Lucy Adams",
        phone: "+447700900112",
        job_description: "Conservatory roof",
        source: Some("facebook"),
        stage: "lost",
        minutes_in_stage: 60 * 24 * 5,
        quote: Some(SeedQuote { id: "Q12", experience: "tiered", total: "7400.00" }),
    },
    SeedLeadContract {
        id: "L13",
        name: "Harry Boyd",
        phone: "+447700900113",
        job_description: "Shed base",
        source: None,
        stage: "lost",
        minutes_in_stage: 60 * 24,
        quote: None,
    },
];

pub struct DemoSeedDataset;

impl DemoSeedDataset {
    /// Upserts the demo leads relative to `now`. Re-running resets their stages.
    pub async fn load(pool: &DbPool, now: DateTime<Utc>) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;

        for seed in SEED_LEADS {
            let stage_entered_at = now - Duration::minutes(seed.minutes_in_stage);
            let created_at = stage_entered_at - Duration::days(1);

            if let Some(quote) = &seed.quote {
                sqlx::query(
                    "INSERT INTO quote (id, experience_type, total, created_at)
                     VALUES (?, ?, ?, ?)
                     ON CONFLICT(id) DO UPDATE SET
                        experience_type = excluded.experience_type,
                        total = excluded.total",
                )
                .bind(quote.id)
                .bind(quote.experience)
                .bind(quote.total)
                .bind(created_at.to_rfc3339())
                .execute(&mut *tx)
                .await?;
            }

            sqlx::query(
                "INSERT INTO lead (
                    id, name, phone, job_description, source, segment, quote_id,
                    stage, stage_entered_at, created_at, updated_at
                 ) VALUES (?, ?, ?, ?, ?, 'residential', ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    phone = excluded.phone,
                    job_description = excluded.job_description,
                    source = excluded.source,
                    quote_id = excluded.quote_id,
                    stage = excluded.stage,
                    stage_entered_at = excluded.stage_entered_at,
                    updated_at = excluded.updated_at",
            )
            .bind(seed.id)
            .bind(seed.name)
            .bind(seed.phone)
            .bind(seed.job_description)
            .bind(seed.source)
            .bind(seed.quote.as_ref().map(|quote| quote.id))
            .bind(seed.stage)
            .bind(stage_entered_at.to_rfc3339())
            .bind(created_at.to_rfc3339())
            .bind(now.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(SeedResult {
            leads_seeded: SEED_LEADS.len(),
            quotes_seeded: SEED_LEADS.iter().filter(|seed| seed.quote.is_some()).count(),
        })
    }

    /// Checks that every demo lead is present with a quote row when one is expected.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::with_capacity(SEED_LEADS.len());

        for seed in SEED_LEADS {
            let present: i64 = match seed.quote {
                Some(quote) => sqlx::query_scalar(
                    "SELECT EXISTS(
                        SELECT 1 FROM lead JOIN quote ON quote.id = lead.quote_id
                        WHERE lead.id = ?1 AND quote.id = ?2
                     )",
                )
                .bind(seed.id)
                .bind(quote.id)
                .fetch_one(pool)
                .await?,
                None => sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM lead WHERE id = ?1)")
                    .bind(seed.id)
                    .fetch_one(pool)
                    .await?,
            };
            checks.push((seed.id, present == 1));
        }

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }

    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        for seed in SEED_LEADS {
            sqlx::query("DELETE FROM lead WHERE id = ?").bind(seed.id).execute(&mut *tx).await?;
            if let Some(quote) = seed.quote {
                sqlx::query("DELETE FROM quote WHERE id = ?")
                    .bind(quote.id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedLeadContract {
    id: &'static str,
    name: &'static str,
    phone: &'static str,
    job_description: &'static str,
    source: Option<&'static str>,
    stage: &'static str,
    minutes_in_stage: i64,
    quote: Option<SeedQuote>,
}

#[derive(Debug, Clone, Copy)]
struct SeedQuote {
    id: &'static str,
    experience: &'static str,
    total: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub leads_seeded: usize,
    pub quotes_seeded: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
