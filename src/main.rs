use httpc::config::Config;
use httpc::server::{Server, signal};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cfg = match std::env::args_os().nth(1) {
        Some(path) => Config::from_file(path)?,
        None => Config::load(),
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .init();

    let mut server = Server::bind(&cfg)?;
    signal::install_signal_handler(server.shutdown_handle())?;

    if let Err(e) = server.run() {
        tracing::error!("Server stopped: {:#}", e);
        return Err(e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
