use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, info_span, warn, Instrument};

pub use self::digests::Digests;
pub use self::error::Error;
pub use self::fingerprint::{fingerprint, to_hex, Digest};
pub use self::request::{Request, Response};
pub use self::source::{Dir, Source};
pub use self::worker::Worker;

mod digests;
mod error;
mod fingerprint;
mod request;
mod source;
mod worker;

/// Digests are SHA-256.
pub const HASH_LENGTH: usize = 32;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_CAPACITY: usize = 5;

/// Pause after a failed accept, so running out of descriptors doesn't spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct Server {
    local_addr: SocketAddr,
    digests: Arc<Digests>,
    actor_sender: mpsc::Sender<ActorMessage>,
    actor_handle: JoinHandle<()>,
}

pub struct Opts {
    /// Listening address (default: 0.0.0.0:8080)
    pub addr: SocketAddr,
    /// Number of digests kept in memory (default: 5)
    pub capacity: usize,
    /// Directory request paths are resolved against (default: current directory)
    pub root: PathBuf,
}

impl Default for Opts {
    fn default() -> Self {
        Opts {
            addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            capacity: DEFAULT_CAPACITY,
            root: PathBuf::from("."),
        }
    }
}

impl Server {
    /// Binds the listener and starts accepting connections in the background.
    pub async fn new(opts: Opts) -> Result<Self> {
        let source = Arc::new(Dir::new(opts.root.clone()));
        Self::with_source(opts, source).await
    }

    /// Like [`Server::new`], but files come from `source` instead of `opts.root`.
    pub async fn with_source(opts: Opts, source: Arc<dyn Source>) -> Result<Self> {
        let digests = Arc::new(Digests::new(opts.capacity).context("invalid cache capacity")?);

        let listener = TcpListener::bind(opts.addr)
            .await
            .with_context(|| format!("failed to bind {}", opts.addr))?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, capacity = opts.capacity, "listening");

        let (actor_sender, actor_receiver) = mpsc::channel(1);
        let actor = Actor {
            listener,
            worker: Worker::new(digests.clone(), source),
            connections: 0,
        };

        let actor_handle = tokio::task::spawn(async move {
            actor.run(actor_receiver).await;
        });

        Ok(Server {
            local_addr,
            digests,
            actor_sender,
            actor_handle,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The cache shared by every connection.
    pub fn digests(&self) -> &Arc<Digests> {
        &self.digests
    }

    /// Stops accepting. Connections already handed out run to completion.
    pub async fn shutdown(self) -> Result<()> {
        self.actor_sender.send(ActorMessage::Shutdown).await.ok();
        self.actor_handle.await?;
        Ok(())
    }
}

enum ActorMessage {
    Shutdown,
}

struct Actor {
    listener: TcpListener,
    worker: Worker,
    connections: u64,
}

impl Actor {
    async fn run(mut self, mut actor_receiver: mpsc::Receiver<ActorMessage>) {
        loop {
            tokio::select! {
                biased;

                msg = actor_receiver.recv() => {
                    match msg {
                        // a dropped `Server` stops the loop too
                        Some(ActorMessage::Shutdown) | None => {
                            break;
                        }
                    }
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => self.dispatch(stream, peer),
                        Err(err) => {
                            warn!(%err, "accept failed");
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                        }
                    }
                }
            }
        }
        info!("stopped accepting connections");
    }

    fn dispatch(&mut self, stream: TcpStream, peer: SocketAddr) {
        self.connections += 1;
        let span = info_span!("conn", id = self.connections, %peer);
        let worker = self.worker.clone();

        tokio::task::spawn(async move { worker.serve(stream).await }.instrument(span));
    }
}
