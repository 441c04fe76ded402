use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::bail;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use folio::config::ServerConfig;
use folio::server::{AppState, cors_layer, create_router};
use folio::store::{SqliteStore, Store};
use folio::types::{Organization, User};

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "A workspace content store for folders, pages and revisions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and its schema
    Init {
        /// Database file or sqlite: URL
        #[arg(long, env = "DATABASE_URL", default_value = "./data/folio.db")]
        database: String,
    },

    /// Start the server
    Serve {
        /// TOML configuration file
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Host to bind to
        #[arg(long, env = "FOLIO_HOST")]
        host: Option<String>,

        /// Port to bind to
        #[arg(long, short, env = "FOLIO_PORT")]
        port: Option<u16>,

        /// Database file or sqlite: URL
        #[arg(long, env = "DATABASE_URL")]
        database: Option<String>,

        /// Allowed browser origin (repeatable)
        #[arg(long = "cors-origin")]
        cors_origins: Vec<String>,
    },

    /// Identity sync commands
    Admin {
        /// Database file or sqlite: URL
        #[arg(long, env = "DATABASE_URL", default_value = "./data/folio.db", global = true)]
        database: String,

        #[command(subcommand)]
        command: AdminCommands,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Register an organization (no-op if it exists)
    AddOrg {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        slug: Option<String>,
    },

    /// Delete an organization and all of its content
    RemoveOrg { id: String },

    /// Register a user (no-op if it exists)
    AddUser {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },

    /// Delete a user; content they touched is kept without attribution
    RemoveUser { id: String },
}

fn database_path(url: String) -> PathBuf {
    ServerConfig {
        database_url: url,
        ..ServerConfig::default()
    }
    .database_path()
}

fn open_store(db_path: &Path) -> anyhow::Result<SqliteStore> {
    if !db_path.exists() {
        bail!(
            "Database not found at {}. Run 'folio init' first.",
            db_path.display()
        );
    }
    let store = SqliteStore::new(db_path)?;
    store.initialize()?;
    Ok(store)
}

fn run_init(database: String) -> anyhow::Result<()> {
    let db_path = database_path(database);
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let store = SqliteStore::new(&db_path)?;
    store.initialize()?;

    println!("Initialized database at {}", db_path.display());
    Ok(())
}

fn run_admin(database: String, command: AdminCommands) -> anyhow::Result<()> {
    let store = open_store(&database_path(database))?;

    match command {
        AdminCommands::AddOrg { id, name, slug } => {
            store.register_organization(&Organization {
                id: id.clone(),
                name,
                slug,
                created_at: Utc::now(),
            })?;
            println!("Registered organization '{id}'");
        }
        AdminCommands::RemoveOrg { id } => {
            if !store.delete_organization(&id)? {
                bail!("Organization '{id}' not found");
            }
            println!("Deleted organization '{id}'");
        }
        AdminCommands::AddUser { id, name, email } => {
            store.register_user(&User {
                id: id.clone(),
                name,
                email,
                created_at: Utc::now(),
            })?;
            println!("Registered user '{id}'");
        }
        AdminCommands::RemoveUser { id } => {
            if !store.delete_user(&id)? {
                bail!("User '{id}' not found");
            }
            println!("Deleted user '{id}'");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("folio=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { database } => run_init(database)?,
        Commands::Admin { database, command } => run_admin(database, command)?,
        Commands::Serve {
            config,
            host,
            port,
            database,
            cors_origins,
        } => {
            let mut config = match config {
                Some(path) => ServerConfig::load(&path)?,
                None => ServerConfig::default(),
            };
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(database) = database {
                config.database_url = database;
            }
            if !cors_origins.is_empty() {
                config.cors.allowed_origins = cors_origins;
            }

            let store = open_store(&config.database_path())?;
            info!("Using database {}", config.database_path().display());

            let state = Arc::new(AppState::new(Arc::new(store)));
            let app = create_router(state, cors_layer(&config.cors)?);
            let addr = config.socket_addr()?;

            info!("Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
