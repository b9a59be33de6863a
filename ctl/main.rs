#![forbid(unsafe_code)]

//! `goat-notify-ctl`: operator CLI working directly on the store.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use goat_notify::config::GlobalConfig;
use goat_notify::models::user::UserRole;
use goat_notify::persistence::db;
use goat_notify::persistence::user_repo::UserRepo;
use goat_notify::{AppError, Result};

#[derive(Debug, Parser)]
#[command(
    name = "goat-notify-ctl",
    about = "Operator CLI for goat-notify",
    version,
    long_about = None
)]
struct Cli {
    /// Path to the TOML configuration file (for `db_path`).
    #[arg(long)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Manage user roles.
    Role {
        #[command(subcommand)]
        action: RoleAction,
    },
}

#[derive(Debug, Subcommand)]
enum RoleAction {
    /// Assign a role (USER, ADMIN, TRUSTED; case-insensitive).
    Set {
        /// Login name of the user.
        username: String,
        /// Role to assign.
        role: String,
    },
    /// Reset a user's role to USER.
    Unset {
        /// Login name of the user.
        username: String,
    },
}

fn main() {
    let args = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Error: failed to build tokio runtime: {err}");
            std::process::exit(1);
        }
    };

    match runtime.block_on(run(args)) {
        Ok(message) => println!("{message}"),
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    }
}

async fn run(args: Cli) -> Result<String> {
    let config = GlobalConfig::load_from_path(&args.config)?;

    let (username, role) = match args.command {
        Command::Role {
            action: RoleAction::Set { username, role },
        } => {
            let role = role.parse::<UserRole>()?;
            (username, role)
        }
        Command::Role {
            action: RoleAction::Unset { username },
        } => (username, UserRole::User),
    };

    let pool = Arc::new(db::connect(&config.db_path).await?);
    let result = UserRepo::new(Arc::clone(&pool)).set_role(&username, role).await;
    pool.close().await;

    match result {
        Ok(user) => Ok(format!("User '{}' now has role {}.", user.username, user.role)),
        Err(AppError::NotFound(_)) => Err(AppError::NotFound(format!(
            "user '{username}' does not exist"
        ))),
        Err(err) => Err(err),
    }
}
