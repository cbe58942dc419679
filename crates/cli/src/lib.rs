pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "leadboard",
    about = "Leadboard operator CLI",
    long_about = "Operate the lead pipeline: migrations, demo data, config inspection, \
                  board snapshots and stage moves.",
    after_help = "Examples:\n  leadboard board\n  leadboard move L7 booked\n  \
                  leadboard watch --ticks 3"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo lead set into the configured database")]
    Seed {
        #[arg(long, help = "Remove the demo leads instead of loading them")]
        clean: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Fetch the pipeline from the server and summarise every lane")]
    Board,
    #[command(about = "Move a lead to another stage through the mutation coordinator")]
    Move {
        lead_id: String,
        stage: String,
        #[arg(long, help = "Bypass the terminal-stage rule (needs the admin token if set)")]
        force: bool,
    },
    #[command(about = "Poll the board on the configured interval and print board events")]
    Watch {
        #[arg(long, help = "Stop after this many successful refreshes")]
        ticks: Option<usize>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed { clean } => commands::seed::run(clean),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Board => commands::board::run(),
        Command::Move { lead_id, stage, force } => {
            commands::move_lead::run(&lead_id, &stage, force)
        }
        Command::Watch { ticks } => commands::watch::run(ticks),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
