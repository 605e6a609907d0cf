use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand};

/// In-memory key-value store speaking a line protocol over TCP.
///
/// Requests are `GET <key>`, `SET <key> <value>`, `DEL <key>`, `INCR <key>`
/// and `QUIT`/`STOP`, one per line.
#[derive(Parser, Debug)]
#[command(author, version)]
pub struct Cli {
    #[command(subcommand)]
    pub mode: Mode,
}

#[derive(Subcommand, Debug)]
pub enum Mode {
    /// Serve the store; every connection shares the same keys.
    Serve(ServeArgs),
    /// Open an interactive session: stdin lines are sent as requests and
    /// replies are printed.
    Client(ClientArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to accept client connections on. Port 0 picks a free port.
    #[arg(long, default_value = "127.0.0.1:3000")]
    pub listen: SocketAddr,
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Address of the store server.
    #[arg(long, default_value = "127.0.0.1:3000")]
    pub server: SocketAddr,
}
