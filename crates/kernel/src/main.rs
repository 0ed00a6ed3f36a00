//! Trellis Kernel
//!
//! HTTP server exposing plugin endpoints, plus a few operator commands.

use std::io::BufRead;
use std::net::SocketAddr;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use trellis_kernel::app::app;
use trellis_kernel::auth::password::hash_password;
use trellis_kernel::bundled::bundled_plugins;
use trellis_kernel::config::{Config, parse_grants};
use trellis_kernel::state::AppState;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default).
    Serve,

    /// Print the composed route table and exit.
    Routes,

    /// Mint a bearer token signed with JWT_SECRET.
    Token {
        /// Principal the token is issued to.
        #[arg(long)]
        user: String,

        /// Capability to grant, as RESOURCE:PERMISSION, or `*` for all.
        #[arg(long = "grant")]
        grants: Vec<String>,

        /// Lifetime in minutes; defaults to JWT_EXPIRE_MINUTES.
        #[arg(long)]
        minutes: Option<i64>,
    },

    /// Read a password from stdin and print its argon2 hash for the auth file.
    HashPassword,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("failed to load configuration")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Routes => print_routes(config),
        Command::Token {
            user,
            grants,
            minutes,
        } => mint_token(&config, &user, &grants, minutes),
        Command::HashPassword => print_password_hash(),
    }
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting Trellis kernel");
    info!(port = config.port, "Configuration loaded");

    let port = config.port;
    let state = AppState::new(config).context("failed to initialize application state")?;
    let started = state
        .start_plugins(bundled_plugins())
        .context("failed to start plugins")?;
    info!(
        plugins = ?started,
        keys = state.identity().key_count(),
        "Plugins loaded"
    );

    let router = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind to address")?;

    info!(%addr, "Server listening");

    axum::serve(listener, router).await.context("server error")?;

    Ok(())
}

fn print_routes(config: Config) -> Result<()> {
    let state = AppState::new(config).context("failed to initialize application state")?;
    state
        .start_plugins(bundled_plugins())
        .context("failed to start plugins")?;

    for route in state.registry().core_routes() {
        println!("{:<7} {:<32} core", route.method.as_str(), route.path);
    }
    for descriptor in state.registry().snapshot().descriptors() {
        let requirement = descriptor
            .requirement
            .map(|c| c.to_string())
            .unwrap_or_else(|| "public".to_string());
        println!(
            "{:<7} {:<32} {} [{}] {}",
            descriptor.method.as_str(),
            descriptor.full_path,
            descriptor.owner,
            descriptor.tag,
            requirement
        );
    }
    Ok(())
}

fn mint_token(config: &Config, user: &str, grants: &[String], minutes: Option<i64>) -> Result<()> {
    if config.jwt_secret.is_none() {
        bail!("JWT_SECRET must be set; a server with a random secret would reject the token");
    }
    let grants = parse_grants(grants)?;
    let codec = config.token_codec();
    let minutes = minutes.unwrap_or(config.jwt_expire_minutes);
    let issued = codec
        .issue_with_lifetime(user, grants, minutes * 60)
        .context("failed to sign token")?;
    println!("{}", issued.access_token);
    Ok(())
}

fn print_password_hash() -> Result<()> {
    let mut password = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut password)
        .context("failed to read password from stdin")?;
    let password = password.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        bail!("empty password");
    }
    println!("{}", hash_password(password)?);
    Ok(())
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
