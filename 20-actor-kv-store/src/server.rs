use std::{future::Future, net::SocketAddr};

use anyhow::{Result, anyhow};
use tokio::{
    io::BufReader,
    net::{TcpListener, TcpStream},
    select,
};
use tracing::{debug, error, info, warn};

use crate::{
    connection::{ConnectionError, handle_connection},
    owner::{self, StoreHandle},
};

pub struct Server {
    listener: TcpListener,
}

impl Server {
    pub fn new(listener: TcpListener) -> Self {
        Self { listener }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until `shutdown` resolves.
    ///
    /// Spawns the store task first; if it ever stops while the server is
    /// still accepting, this returns an error instead of continuing without a
    /// store.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let Server { listener } = self;
        let (store, mut store_task) = owner::spawn();
        tokio::pin!(shutdown);

        loop {
            select! {
                _ = &mut shutdown => {
                    info!("server shutting down");
                    break;
                }
                finished = &mut store_task => {
                    let outcome = finished.map(|store| store.len());
                    error!(?outcome, "store task stopped unexpectedly");
                    return Err(anyhow!("store task stopped while accepting connections"));
                }
                accept_result = listener.accept() => {
                    handle_accept_result(accept_result, &store);
                }
            }
        }

        Ok(())
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}

fn handle_accept_result(result: std::io::Result<(TcpStream, SocketAddr)>, store: &StoreHandle) {
    match result {
        Ok((stream, peer)) => spawn_connection_handler(stream, peer, store),
        Err(err) => warn!(error = ?err, "failed to accept connection"),
    }
}

fn spawn_connection_handler(stream: TcpStream, peer: SocketAddr, store: &StoreHandle) {
    let store = store.clone();
    tokio::spawn(async move {
        debug!(peer = %peer, "client connected");
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        match handle_connection(&mut reader, &mut writer, &store).await {
            Ok(()) => debug!(peer = %peer, "client disconnected"),
            Err(err) => match err.downcast_ref::<ConnectionError>() {
                Some(rejected) => info!(peer = %peer, reason = %rejected, "client input rejected"),
                None => warn!(peer = %peer, error = ?err, "client connection closed with error"),
            },
        }
    });
}
