//! The store task and the handle used to reach it.
//!
//! Exactly one task owns the [`Store`]. Connection handlers never see the
//! store; they send an [`Envelope`] (a command plus a oneshot reply channel)
//! through an unbounded MPSC inbox and await the reply. The task applies
//! envelopes strictly in the order they arrive, so every operation is atomic
//! and all operations form a single total order without any locks.
//!
//! ```text
//! handler ─┐
//! handler ─┼─ mpsc (inbox) ─▶ store task ─▶ Store
//! handler ─┘        ▲               │
//!                   └── oneshot ◀───┘
//! ```

use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, trace};

use crate::{
    command::Command,
    store::{Store, StoreError},
};

/// Reply line for every successful `SET`.
pub const OK_REPLY: &str = "OK";

/// Reply line for verbs the server does not recognise.
pub const UNKNOWN_REPLY: &str = "N/A";

/// Errors raised when the store task cannot be reached.
///
/// Either one means the store task is gone while handlers are still running,
/// which the rest of the server treats as fatal.
#[derive(Debug, Error)]
pub enum OwnerError {
    #[error("store task inbox is closed")]
    Closed,
    #[error("store task dropped the reply channel")]
    Dropped,
}

/// A command paired with the channel its reply goes back on.
#[derive(Debug)]
pub struct Envelope {
    pub command: Command,
    pub reply: oneshot::Sender<Option<String>>,
}

/// Cloneable handle for submitting commands to the store task.
///
/// The task keeps running for as long as at least one handle exists.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    inbox: mpsc::UnboundedSender<Envelope>,
}

impl StoreHandle {
    /// Enqueues a command and waits for the store task to answer it.
    ///
    /// `None` means the reply line is empty (no value, or a malformed
    /// request).
    pub async fn submit(&self, command: Command) -> Result<Option<String>, OwnerError> {
        let (reply, response) = oneshot::channel();
        self.inbox
            .send(Envelope { command, reply })
            .map_err(|_| OwnerError::Closed)?;
        response.await.map_err(|_| OwnerError::Dropped)
    }
}

/// Spawns the store task with an empty store.
///
/// The returned join handle resolves to the final store once every
/// [`StoreHandle`] has been dropped.
pub fn spawn() -> (StoreHandle, JoinHandle<Store>) {
    let (inbox, receiver) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(receiver, Store::new()));
    (StoreHandle { inbox }, task)
}

async fn run(mut inbox: mpsc::UnboundedReceiver<Envelope>, mut store: Store) -> Store {
    debug!("store task started");

    while let Some(Envelope { command, reply }) = inbox.recv().await {
        trace!(?command, "applying command");
        let outcome = apply(&mut store, command);
        if reply.send(outcome).is_err() {
            // The requesting connection went away while its command was queued.
            trace!("reply receiver dropped");
        }
    }

    debug!(keys = store.len(), "store task stopped");
    store
}

/// Applies one command to the store and renders its reply line.
pub fn apply(store: &mut Store, command: Command) -> Option<String> {
    match command {
        Command::Get { key } => store.get(&key),
        Command::Set { key, value } => {
            store.set(key, value);
            Some(OK_REPLY.to_string())
        }
        Command::Del { key } => Some(store.del(&key).to_string()),
        Command::Incr { key } => match store.incr(&key) {
            Ok(value) => Some(value),
            Err(err @ StoreError::NotAnInteger) => Some(format!("ERR {err}")),
        },
        Command::MissingArgument(_) => None,
        Command::Unknown(_) => Some(UNKNOWN_REPLY.to_string()),
        Command::Quit => {
            debug_assert!(false, "quit must be handled by the connection, not submitted");
            None
        }
    }
}
