//! lottery - command-line client for the lottery service.
//!
//! Signs in, shows the current profile and signs out. The refresh token is
//! kept between runs; each run starts without an access token and gets one
//! through the refresh endpoint on its first call.

mod app;

use std::io;

use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;
use lottery_core::Config;

/// Directory for an additional log file; unset means stderr only.
const ENV_LOG_DIR: &str = "LOTTERY_LOG_DIR";

const LOG_FILE_PREFIX: &str = "lottery.log";

const USAGE: &str = "\
Usage: lottery <command>

Commands:
  login [username]      Sign in and store the session
  register [username]   Create an account and sign in
  profile               Show the signed-in user
  logout                Forget the stored session
  status                Show whether a session is stored
  help                  Show this message";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Login { username: Option<String> },
    Register { username: Option<String> },
    Profile,
    Logout,
    Status,
    Help,
}

impl Command {
    /// Parse the arguments after the program name.
    fn parse(args: &[String]) -> Result<Self, String> {
        let mut args = args.iter().map(String::as_str);
        let command = match args.next() {
            None | Some("help") | Some("-h") | Some("--help") => Command::Help,
            Some("login") => Command::Login { username: args.next().map(str::to_string) },
            Some("register") => Command::Register { username: args.next().map(str::to_string) },
            Some("profile") => Command::Profile,
            Some("logout") => Command::Logout,
            Some("status") => Command::Status,
            Some(other) => return Err(format!("Unknown command '{}'", other)),
        };
        if let Some(extra) = args.next() {
            return Err(format!("Unexpected argument '{}'", extra));
        }
        Ok(command)
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(ENV_LOG_DIR) {
        Ok(dir) if !dir.trim().is_empty() => {
            let appender = tracing_appender::rolling::daily(dir.trim(), LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false).with_target(true);
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _log_guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("Error: {}\n\n{}", message, USAGE);
            std::process::exit(2);
        }
    };

    if let Err(e) = run(command).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(command: Command) -> Result<()> {
    if command == Command::Help {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = Config::load()?;
    info!(api_url = %config.api_url, ?command, "lottery starting");

    let mut app = App::new(config)?;
    match command {
        Command::Login { username } => app.login(username).await,
        Command::Register { username } => app.register(username).await,
        Command::Profile => app.profile().await,
        Command::Logout => app.logout(),
        Command::Status => app.status(),
        Command::Help => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse(&args(&[])), Ok(Command::Help));
        assert_eq!(Command::parse(&args(&["--help"])), Ok(Command::Help));
        assert_eq!(Command::parse(&args(&["login"])), Ok(Command::Login { username: None }));
        assert_eq!(
            Command::parse(&args(&["login", "lan"])),
            Ok(Command::Login { username: Some("lan".into()) })
        );
        assert_eq!(
            Command::parse(&args(&["register", "new"])),
            Ok(Command::Register { username: Some("new".into()) })
        );
        assert_eq!(Command::parse(&args(&["profile"])), Ok(Command::Profile));
        assert_eq!(Command::parse(&args(&["logout"])), Ok(Command::Logout));
        assert_eq!(Command::parse(&args(&["status"])), Ok(Command::Status));
    }

    #[test]
    fn test_parse_rejects_unknown_and_extra_arguments() {
        assert!(Command::parse(&args(&["draw"])).is_err());
        assert!(Command::parse(&args(&["profile", "extra"])).is_err());
        assert!(Command::parse(&args(&["login", "lan", "hunter2"])).is_err());
    }
}
