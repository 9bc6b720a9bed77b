//! Actor-owned concurrent map
//!
//! A `HashMap` owned by a single worker task. Callers talk to it by sending a
//! command over an mpsc channel, each carrying a oneshot reply channel, and
//! await the reply. The worker handles one command at a time in arrival
//! order, so every caller observes a single FIFO serialization of all
//! operations without any lock around the map.
//!
//! Handles are cheap to clone. The worker stops when `shutdown` is called or
//! when the last handle is dropped; after that every operation returns
//! `ActorMapError::Closed`.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use tokio::sync::{mpsc, oneshot};

/// Queue depth of the command channel
const COMMAND_CHANNEL_DEPTH: usize = 64;

/// Error returned when the map's worker is no longer running
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ActorMapError {
    #[error("Actor map worker has shut down")]
    Closed,
}

pub type ActorMapResult<T> = Result<T, ActorMapError>;

enum Command<K, V> {
    Get {
        key: K,
        reply: oneshot::Sender<Option<V>>,
    },
    Exists {
        key: K,
        reply: oneshot::Sender<bool>,
    },
    Set {
        key: K,
        value: V,
        reply: oneshot::Sender<()>,
    },
    Delete {
        key: K,
        reply: oneshot::Sender<Option<V>>,
    },
    GetAll {
        reply: oneshot::Sender<HashMap<K, V>>,
    },
    Len {
        reply: oneshot::Sender<usize>,
    },
    Shutdown,
}

/// Handle to an actor-owned map
pub struct ActorMap<K, V> {
    sender: mpsc::Sender<Command<K, V>>,
}

impl<K, V> Clone for ActorMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<K, V> fmt::Debug for ActorMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorMap")
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

impl<K, V> ActorMap<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    /// Spawn a worker over an empty map.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new() -> Self {
        Self::from_map(HashMap::new())
    }

    /// Spawn a worker over a fully built map
    pub fn from_map(map: HashMap<K, V>) -> Self {
        let (sender, receiver) = mpsc::channel(COMMAND_CHANNEL_DEPTH);
        tokio::spawn(run_worker(map, receiver));
        Self { sender }
    }

    /// Get a copy of the value stored under `key`
    pub async fn get(&self, key: &K) -> ActorMapResult<Option<V>> {
        let (reply, rx) = oneshot::channel();
        self.request(
            Command::Get {
                key: key.clone(),
                reply,
            },
            rx,
        )
        .await
    }

    /// Whether `key` is present
    pub async fn exists(&self, key: &K) -> ActorMapResult<bool> {
        let (reply, rx) = oneshot::channel();
        self.request(
            Command::Exists {
                key: key.clone(),
                reply,
            },
            rx,
        )
        .await
    }

    /// Insert or overwrite `key`
    pub async fn set(&self, key: K, value: V) -> ActorMapResult<()> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Set { key, value, reply }, rx).await
    }

    /// Remove `key`, returning the previous value
    pub async fn delete(&self, key: &K) -> ActorMapResult<Option<V>> {
        let (reply, rx) = oneshot::channel();
        self.request(
            Command::Delete {
                key: key.clone(),
                reply,
            },
            rx,
        )
        .await
    }

    /// Copy of the whole map. Mutating the copy never touches the live map.
    pub async fn get_all(&self) -> ActorMapResult<HashMap<K, V>> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::GetAll { reply }, rx).await
    }

    /// Number of entries
    pub async fn len(&self) -> ActorMapResult<usize> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Len { reply }, rx).await
    }

    /// Stop the worker once the commands already queued have been served.
    ///
    /// Affects every clone of this handle.
    pub async fn shutdown(&self) {
        let _ = self.sender.send(Command::Shutdown).await;
    }

    /// Whether the worker has stopped
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn request<T>(
        &self,
        command: Command<K, V>,
        rx: oneshot::Receiver<T>,
    ) -> ActorMapResult<T> {
        self.sender
            .send(command)
            .await
            .map_err(|_| ActorMapError::Closed)?;
        rx.await.map_err(|_| ActorMapError::Closed)
    }
}

impl<K, V> Default for ActorMap<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

async fn run_worker<K, V>(mut map: HashMap<K, V>, mut receiver: mpsc::Receiver<Command<K, V>>)
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    while let Some(command) = receiver.recv().await {
        // A dropped reply receiver only means the caller went away.
        match command {
            Command::Get { key, reply } => {
                let _ = reply.send(map.get(&key).cloned());
            }
            Command::Exists { key, reply } => {
                let _ = reply.send(map.contains_key(&key));
            }
            Command::Set { key, value, reply } => {
                map.insert(key, value);
                let _ = reply.send(());
            }
            Command::Delete { key, reply } => {
                let _ = reply.send(map.remove(&key));
            }
            Command::GetAll { reply } => {
                let _ = reply.send(map.clone());
            }
            Command::Len { reply } => {
                let _ = reply.send(map.len());
            }
            Command::Shutdown => break,
        }
    }
    receiver.close();
    tracing::debug!(entries = map.len(), "Actor map worker stopped");
}
