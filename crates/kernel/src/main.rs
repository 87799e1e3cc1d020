//! Arquitectos CMS Kernel
//!
//! HTTP server and maintenance commands.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method, header};
use clap::{Parser, Subcommand};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use arquitectos_kernel::config::Config;
use arquitectos_kernel::content::BlockLibrary;
use arquitectos_kernel::models::CreateUser;
use arquitectos_kernel::routes::api::schema_document;
use arquitectos_kernel::state::AppState;
use arquitectos_kernel::{build_router, db};

#[derive(Debug, Parser)]
#[command(name = "arquitectos", version, about = "Arquitectos CMS server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Apply pending database migrations and exit.
    Migrate,
    /// Print page types and block schemas as JSON.
    Schema,
    /// Create a user and print a new API token for it.
    CreateUser {
        username: String,
        #[arg(long, default_value = "")]
        email: String,
        /// Grant access to the admin surface.
        #[arg(long)]
        staff: bool,
        /// Grant every permission.
        #[arg(long)]
        superuser: bool,
    },
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
        Command::Migrate => migrate(&config).await,
        Command::Schema => {
            let blocks = BlockLibrary::with_standard_blocks(&config.author_choices)
                .context("failed to build the block library")?;
            let doc = serde_json::to_string_pretty(&schema_document(&blocks))
                .context("failed to serialize schema")?;
            println!("{doc}");
            Ok(())
        }
        Command::CreateUser {
            username,
            email,
            staff,
            superuser,
        } => {
            let state = AppState::new(&config)
                .await
                .context("failed to initialize application state")?;
            let input = CreateUser {
                username,
                email,
                is_staff: staff || superuser,
                is_superuser: superuser,
                ..Default::default()
            };
            let (user, token) = state
                .create_user(input, "cli")
                .await
                .context("failed to create user")?;
            info!(user_id = %user.id, "user created");
            println!("{token}");
            Ok(())
        }
    }
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting Arquitectos CMS kernel");
    info!(
        port = config.port,
        debug = config.debug,
        admin_prefix = %config.admin_prefix,
        "Configuration loaded"
    );

    let state = AppState::new(&config)
        .await
        .context("failed to initialize application state")?;

    let cors = build_cors_layer(&config);

    // Middleware layers (last added = first executed in request flow):
    // TraceLayer → CORS → auth → routes
    let app = build_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind to address")?;

    info!(%addr, "Server listening");

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

async fn migrate(config: &Config) -> Result<()> {
    let url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL is required to run migrations")?;
    let pool = db::create_pool(url, config.database_max_connections).await?;
    db::run_migrations(&pool).await?;
    info!("Migrations complete");
    Ok(())
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];

    if config.cors_allowed_origins.len() == 1 && config.cors_allowed_origins[0] == "*" {
        CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(methods)
            .allow_headers(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
