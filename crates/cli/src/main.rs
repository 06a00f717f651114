//! Star CLI - command-line front-end for the Star Admin panel.
//!
//! # Usage
//!
//! ```bash
//! # List products
//! star-cli products list
//!
//! # Add a product (an image is required)
//! star-cli products add -n "Velvet Sofa" -d "Three-seater" -p 450000 -i sofa.png
//!
//! # Delete without the confirmation prompt
//! star-cli products delete 7 --yes
//!
//! # Live chat with a customer
//! star-cli chat open 6f1c2a4e-0b7d-4c55-9a43-2f6f0e8b1d11
//!
//! # Try everything offline against seeded demo data
//! star-cli --in-memory chat conversations
//! ```
//!
//! # Commands
//!
//! - `products` - List, add, update and delete products
//! - `users list` - Show registered accounts
//! - `chat` - List conversations or open an interactive session

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use star_admin_core::{ProductId, UserId};

mod commands;

use commands::{Backend, CliError};

#[derive(Parser)]
#[command(name = "star-cli")]
#[command(author, version, about = "Star Admin command-line tools")]
struct Cli {
    /// Use an in-memory backend seeded with demo data instead of Supabase
    #[arg(long, global = true)]
    in_memory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage products
    Products {
        #[command(subcommand)]
        action: ProductsAction,
    },
    /// Browse registered users
    Users {
        #[command(subcommand)]
        action: UsersAction,
    },
    /// Chat with customers
    Chat {
        #[command(subcommand)]
        action: ChatAction,
    },
}

#[derive(Subcommand)]
enum ProductsAction {
    /// List products, newest first
    List,
    /// Add a new product
    Add {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        description: String,

        /// Price in Naira
        #[arg(short, long)]
        price: String,

        /// Product image file
        #[arg(short, long)]
        image: Option<PathBuf>,
    },
    /// Update a product; omitted fields keep their current value
    Update {
        id: ProductId,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(short, long)]
        price: Option<String>,

        /// Replacement image file
        #[arg(short, long)]
        image: Option<PathBuf>,
    },
    /// Delete a product
    Delete {
        id: ProductId,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum UsersAction {
    /// List registered users
    List,
}

#[derive(Subcommand)]
enum ChatAction {
    /// List conversations, most recent first
    Conversations,
    /// Open an interactive session with a customer
    Open { user_id: UserId },
}

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (must be done before any TLS operations)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Log to stderr so command output on stdout stays clean
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "warn".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let backend = Backend::connect(cli.in_memory)?;

    match cli.command {
        Commands::Products { action } => match action {
            ProductsAction::List => commands::products::list(&backend).await?,
            ProductsAction::Add {
                name,
                description,
                price,
                image,
            } => {
                commands::products::add(&backend, name, description, price, image.as_deref())
                    .await?;
            }
            ProductsAction::Update {
                id,
                name,
                description,
                price,
                image,
            } => {
                let changes = commands::products::Changes {
                    name,
                    description,
                    price,
                };
                commands::products::update(&backend, id, changes, image.as_deref()).await?;
            }
            ProductsAction::Delete { id, yes } => {
                commands::products::delete(&backend, id, yes).await?;
            }
        },
        Commands::Users { action } => match action {
            UsersAction::List => commands::users::list(&backend).await?,
        },
        Commands::Chat { action } => match action {
            ChatAction::Conversations => commands::chat::conversations(&backend).await?,
            ChatAction::Open { user_id } => commands::chat::open(&backend, user_id).await?,
        },
    }
    Ok(())
}
