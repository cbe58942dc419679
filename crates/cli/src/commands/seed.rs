use chrono::Utc;
use serde_json::json;

use crate::commands::{prepare, CommandResult};
use leadboard_db::{connection::connect_with_config, migrations, DemoSeedDataset};

pub fn run(clean: bool) -> CommandResult {
    let (config, runtime) = match prepare("seed") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let run_result = if clean { clean_demo(&pool).await } else { load_demo(&pool).await };

        pool.close().await;
        run_result
    });

    match result {
        Ok(success) => success,
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

type SeedFailure = (&'static str, String, u8);

async fn load_demo(pool: &leadboard_db::DbPool) -> Result<CommandResult, SeedFailure> {
    let seeded = DemoSeedDataset::load(pool, Utc::now())
        .await
        .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

    let verification = DemoSeedDataset::verify(pool)
        .await
        .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;
    if !verification.all_present {
        let failed = verification
            .checks
            .iter()
            .filter_map(|(lead_id, present)| (!present).then_some(*lead_id))
            .collect::<Vec<_>>();
        return Err(("seed_verification", verification_message(&failed), 6u8));
    }

    Ok(CommandResult::success_with(
        "seed",
        format!("loaded {} demo leads ({} with quotes)", seeded.leads_seeded, seeded.quotes_seeded),
        Some(json!({
            "leadsSeeded": seeded.leads_seeded,
            "quotesSeeded": seeded.quotes_seeded,
        })),
    ))
}

async fn clean_demo(pool: &leadboard_db::DbPool) -> Result<CommandResult, SeedFailure> {
    DemoSeedDataset::clean(pool)
        .await
        .map_err(|error| ("seed_clean", error.to_string(), 5u8))?;
    Ok(CommandResult::success("seed", "removed demo leads"))
}

fn verification_message(failed: &[&str]) -> String {
    if failed.is_empty() {
        "some demo leads failed to load".to_string()
    } else {
        format!("demo leads missing after load: {}", failed.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::verification_message;

    #[test]
    fn verification_message_names_missing_leads() {
        assert_eq!(verification_message(&["L3", "L9"]), "demo leads missing after load: L3, L9");
    }

    #[test]
    fn verification_message_falls_back_to_generic_when_no_labels() {
        assert_eq!(verification_message(&[]), "some demo leads failed to load");
    }
}
