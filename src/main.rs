use std::process::ExitCode;

use clap::Parser;
use user_registry::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Validate(args) => cli::validate::run(args).await,
        Command::Register(args) => cli::register::run(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(cli::exit_status(&err))
        }
    }
}
