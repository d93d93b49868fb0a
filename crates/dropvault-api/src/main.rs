use dropvault_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize the application (telemetry, stores, lifecycle manager, routes)
    let (state, router) = dropvault_api::setup::initialize_app(config.clone()).await?;

    // Serve until a shutdown signal, then drain pending burns
    dropvault_api::setup::server::start_server(&config, router, state).await?;

    Ok(())
}
