//! Ventas CLI - database migrations and operational tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply pending migrations
//! ventas migrate
//!
//! # Create an administrator
//! ventas admin create --name "Ada Admin" --username ada --email ada@example.com --password '...'
//!
//! # Load categories and products
//! ventas seed --file catalog.yaml
//!
//! # Create (or find) the fallback category for VENTAS_DEFAULT_CATEGORY_ID
//! ventas category ensure-default
//! ```
//!
//! The database URL comes from `--database-url`, then `VENTAS_DATABASE_URL`,
//! then `DATABASE_URL`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "ventas")]
#[command(author, version, about = "Ventas CLI tools")]
struct Cli {
    /// `PostgreSQL` connection string (overrides the environment)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage administrator accounts
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Load categories and products from a YAML file
    Seed {
        /// Path to the YAML catalog
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Manage categories
    Category {
        #[command(subcommand)]
        action: CategoryAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a new ADMIN user
    Create {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// Unique login name
        #[arg(short, long)]
        username: String,

        /// Email address
        #[arg(short, long)]
        email: String,

        /// Initial password (at least 8 characters)
        #[arg(short, long)]
        password: String,
    },
}

#[derive(Subcommand)]
enum CategoryAction {
    /// Create or reactivate the fallback category and print its id
    EnsureDefault {
        /// Category name
        #[arg(short, long, default_value = "Default")]
        name: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ventas_cli=info,ventas_server=info".into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    let pool = commands::connect(cli.database_url).await?;

    match cli.command {
        Commands::Migrate => commands::migrate::run(&pool).await?,
        Commands::Admin { action } => match action {
            AdminAction::Create {
                name,
                username,
                email,
                password,
            } => {
                commands::admin::create_user(&pool, name, username, email, password).await?;
            }
        },
        Commands::Seed { file } => commands::seed::catalog(&pool, &file).await?,
        Commands::Category { action } => match action {
            CategoryAction::EnsureDefault { name } => {
                commands::category::ensure_default(&pool, &name).await?;
            }
        },
    }
    Ok(())
}
