pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "sendmoney",
    about = "Send-money agent operator CLI",
    long_about = "Inspect configuration, check readiness, apply session-store migrations and drive single chat turns.",
    after_help = "Examples:\n  sendmoney doctor --json\n  sendmoney config\n  sendmoney chat --session demo \"Send 100 EUR to Mexico\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending session-store migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, model client readiness, and session store connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Send one message through the agent and print the structured reply")]
    Chat {
        #[arg(long, help = "Session to continue; a new id is generated when omitted")]
        session: Option<String>,
        #[arg(help = "The user's message")]
        message: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Chat { session, message } => commands::chat::run(session, message),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn chat_accepts_optional_session() {
        let cli = Cli::try_parse_from(["sendmoney", "chat", "--session", "s-1", "Send to Brazil"])
            .expect("parse");
        assert!(matches!(
            cli.command,
            Command::Chat { session: Some(ref id), ref message } if id == "s-1" && message == "Send to Brazil"
        ));

        let cli = Cli::try_parse_from(["sendmoney", "chat", "hello"]).expect("parse");
        assert!(matches!(cli.command, Command::Chat { session: None, .. }));
    }

    #[test]
    fn chat_requires_a_message() {
        assert!(Cli::try_parse_from(["sendmoney", "chat"]).is_err());
    }
}
