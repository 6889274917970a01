//! Stockroom CLI - database migrations and account management.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! stockroom migrate
//!
//! # Create an administrator
//! stockroom user create -e ops@shop.example -p 'long-password' \
//!     --first-name Ada --last-name Byrne -r admin
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `user create` - Create an account with any role

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use secrecy::SecretString;

mod commands;

#[derive(Parser)]
#[command(name = "stockroom")]
#[command(author, version, about = "Stockroom CLI tools")]
struct Cli {
    /// `PostgreSQL` connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage user accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new user account
    Create {
        /// Login email address
        #[arg(short, long)]
        email: String,

        /// Initial password (min 8 characters)
        #[arg(short, long, env = "STOCKROOM_USER_PASSWORD", hide_env_values = true)]
        password: String,

        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        /// Account role (`user`, `admin`)
        #[arg(short, long, default_value = "admin")]
        role: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    // Load .env before clap reads env-backed arguments
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let database_url = SecretString::from(cli.database_url);
    match cli.command {
        Commands::Migrate => commands::migrate::run(&database_url).await?,
        Commands::User { action } => match action {
            UserAction::Create {
                email,
                password,
                first_name,
                last_name,
                role,
            } => {
                let account = commands::user::NewAccount {
                    email: &email,
                    password: &password,
                    first_name: &first_name,
                    last_name: &last_name,
                    role: &role,
                };
                commands::user::create(&database_url, &account).await?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
