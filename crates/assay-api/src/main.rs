use assay_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize the application (storage, orchestrator, routes)
    let (_state, router) = assay_api::setup::initialize_app(config.clone()).await?;

    // Start the server
    assay_api::setup::server::start_server(&config, router).await?;

    Ok(())
}
