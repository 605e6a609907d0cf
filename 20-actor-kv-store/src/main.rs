use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

use actor_kv_store::{
    cli::{Cli, Mode, ServeArgs},
    client,
    server::Server,
};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

/// Binds the listener and serves until ctrl-c.
///
/// The banner's last token is the bound address; the end-to-end test reads it.
async fn serve(args: ServeArgs) -> Result<()> {
    let listener = TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;
    let server = Server::new(listener);
    let addr = server.local_addr()?;
    info!("key-value store accepting GET/SET/DEL/INCR on {addr}");

    server.run_until_ctrl_c().await.inspect_err(|err| {
        error!("store server stopped: {err:?}");
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    match Cli::parse().mode {
        Mode::Serve(args) => serve(args).await,
        Mode::Client(args) => client::run(args).await,
    }
}
