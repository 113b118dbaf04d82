pub mod api;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod models;
pub mod services;
pub mod store;

use clap::Parser;
use tokio::signal;

use cli::{Cli, Commands, CreateAdminArgs};
pub use config::Config;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load()?;
    config.validate()?;

    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let fmt_layer = tracing_subscriber::fmt::layer();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        None | Some(Commands::Serve) => run_server(config).await,
        Some(Commands::Init) => cli::cmd_init(&config),
        Some(Commands::CreateAdmin {
            email,
            password,
            name,
            surname,
            dob,
            phone,
        }) => {
            cli::cmd_create_admin(
                &config,
                CreateAdminArgs {
                    email: &email,
                    password: &password,
                    name: &name,
                    surname: &surname,
                    dob: &dob,
                    phone: &phone,
                },
            )
            .await
        }
    }
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    info!("Kartoteka v{} starting...", env!("CARGO_PKG_VERSION"));

    let port = config.server.port;
    let state = api::create_app_state(config);
    let app = api::router(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let server_handle = tokio::spawn(async move {
        info!("Web server running at http://0.0.0.0:{port}");
        if let Err(e) = axum::serve(listener, app).await {
            error!("Web server error: {}", e);
        }
    });

    info!("Service running. Press Ctrl+C to stop.");

    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Error listening for shutdown: {}", e),
    }

    server_handle.abort();
    info!("Service stopped");

    Ok(())
}
