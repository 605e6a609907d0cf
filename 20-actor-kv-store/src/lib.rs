//! Line-oriented, in-memory key-value server.
//!
//! Clients send one command per line (`GET`, `SET`, `DEL`, `INCR`, `QUIT`)
//! and receive one reply line per command. Each module focuses on a concrete
//! responsibility:
//!
//! - [`store`] is the plain key-value map and the semantics of each command.
//! - [`command`] turns a protocol line into a [`command::Command`].
//! - [`owner`] runs the single task that owns the store and serializes every
//!   operation through an MPSC inbox with oneshot replies.
//! - [`connection`] drives one client socket: read, parse, submit, reply.
//! - [`server`] accepts TCP connections and spawns a handler for each.
//! - [`cli`] and [`client`] provide the command-line entry points.
//!
//! Integration tests use this crate directly to run a server on an ephemeral
//! port and talk to it over TCP.

pub mod cli;
pub mod client;
pub mod command;
pub mod connection;
pub mod owner;
pub mod server;
pub mod store;
