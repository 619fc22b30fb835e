use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use foxden::auth::{TokenHasher, create_admin_token, create_user_with_token};
use foxden::config::ServerConfig;
use foxden::server::{AppState, create_router};
use foxden::store::{SqliteStore, Store, UserStore};

const ADMIN_TOKEN_FILE: &str = ".admin_token";

#[cfg(unix)]
fn set_restrictive_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to set permissions on {}: {e}", path.display());
    }
}

#[derive(Parser)]
#[command(name = "foxden")]
#[command(about = "A content registry with fine-grained authorization", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// TOML file with host, port and data_dir
        #[arg(long)]
        config: Option<PathBuf>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long, short)]
        port: Option<u16>,

        /// Data directory for the database
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the server (create database and admin token)
    Init {
        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },

    /// Create a user and print its token
    CreateUser {
        /// Unique user name
        name: String,

        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },
}

fn open_store(data_dir: &Path) -> anyhow::Result<SqliteStore> {
    let store = SqliteStore::new(data_dir.join("foxden.db"))
        .with_context(|| format!("failed to open database in {}", data_dir.display()))?;
    store.initialize()?;
    Ok(store)
}

fn print_token(heading: &str, raw_token: &str) {
    println!();
    println!("========================================");
    println!("{heading}");
    println!();
    println!("  {raw_token}");
    println!();
    println!("========================================");
    println!();
}

fn run_init(data_dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(data_dir)?;
    let store = open_store(data_dir)?;
    let token_file = data_dir.join(ADMIN_TOKEN_FILE);

    let Some(raw_token) = create_admin_token(&store, &TokenHasher::new())? else {
        bail!(
            "Server already initialized. Admin token exists at: {}",
            token_file.display()
        );
    };

    let raw_token = raw_token.to_string();
    fs::write(&token_file, &raw_token)?;

    #[cfg(unix)]
    set_restrictive_permissions(&token_file);

    print_token("Admin token (save this, it won't be shown again):", &raw_token);
    println!("Token also written to: {}", token_file.display());
    Ok(())
}

fn run_create_user(data_dir: &Path, name: &str) -> anyhow::Result<()> {
    let store = open_store(data_dir)?;
    let (user, raw_token) = create_user_with_token(&store, &TokenHasher::new(), name)
        .with_context(|| format!("failed to create user '{name}'"))?;

    print_token(
        &format!("Created user '{name}' ({}) with token:", user.id),
        &raw_token.to_string(),
    );
    Ok(())
}

fn load_config(
    path: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    data_dir: Option<PathBuf>,
) -> anyhow::Result<ServerConfig> {
    let mut config = match path {
        Some(path) => ServerConfig::load(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ServerConfig::default(),
    };

    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(data_dir) = data_dir {
        config.data_dir = data_dir;
    }
    Ok(config)
}

async fn run_serve(config: ServerConfig) -> anyhow::Result<()> {
    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;
    if !store.has_admin_token()? {
        bail!(
            "Server not initialized. Run 'foxden admin init' first to create the database and admin token."
        );
    }

    let state = Arc::new(AppState::new(Arc::new(store)));
    let app = create_router(state);
    let addr = config.socket_addr()?;

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("foxden=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init { data_dir } => run_init(&data_dir)?,
            AdminCommands::CreateUser { name, data_dir } => run_create_user(&data_dir, &name)?,
        },
        Commands::Serve {
            config,
            host,
            port,
            data_dir,
        } => {
            let config = load_config(config, host, port, data_dir)?;
            run_serve(config).await?;
        }
    }

    Ok(())
}
