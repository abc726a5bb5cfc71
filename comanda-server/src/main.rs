use comanda_server::{Config, Server, ServerState, setup_environment};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment (dotenv, logging)
    setup_environment()?;

    tracing::info!("Comanda print server starting...");

    // 2. Configuration
    let config = Config::from_env();

    // 3. State (job store, dispatcher, service)
    let state = ServerState::initialize(&config)?;

    // 4. HTTP server (also starts the worker pool and the stale sweeper)
    let server = Server::with_state(config, state);

    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        return Err(e);
    }

    Ok(())
}
