use std::process::ExitCode;

fn main() -> ExitCode {
    leadboard_cli::run()
}
