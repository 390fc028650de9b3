//! Remote dispatch
//!
//! The coordinator side of remote mode:
//! - Binds a listener and accepts one connection per worker node
//! - Binds each connection to exactly one chunk
//! - Runs every session on its own task so a stalled peer cannot delay the others
//! - Fans in all outcomes, in target order, once every session is terminal

use crate::config::NetworkConfig;
use crate::distributed::protocol::Framing;
use crate::distributed::session::{Session, SessionFailure, SessionOutcome, SessionState};
use crate::error::SessionError;
use crate::partition::Chunk;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

/// An accepted worker connection, not yet bound to a chunk
#[derive(Debug)]
pub struct RemoteTarget {
    /// Target index (accept order); receives the chunk with the same index
    pub index: usize,

    pub peer: SocketAddr,

    pub stream: TcpStream,
}

/// Listener that collects remote targets for a round
pub struct RemoteCoordinator {
    listener: TcpListener,
    accept_timeout: Option<Duration>,
}

impl RemoteCoordinator {
    /// Bind to the configured `host:port`
    pub async fn bind(config: &NetworkConfig) -> Result<Self> {
        let address = config.address();
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("Failed to bind {}", address))?;

        info!("Listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            accept_timeout: config.accept_timeout(),
        })
    }

    /// Wrap an already-bound listener
    pub fn from_listener(listener: TcpListener, accept_timeout: Option<Duration>) -> Self {
        Self {
            listener,
            accept_timeout,
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().context("Failed to read listener address")
    }

    /// Accept exactly `count` worker connections
    ///
    /// Targets are indexed in accept order. With an accept timeout configured,
    /// waiting longer than that for any single connection fails.
    pub async fn accept_targets(&self, count: usize) -> Result<Vec<RemoteTarget>> {
        let mut targets = Vec::with_capacity(count);

        while targets.len() < count {
            let accepted = match self.accept_timeout {
                Some(after) => tokio::time::timeout(after, self.listener.accept())
                    .await
                    .with_context(|| {
                        format!(
                            "Timed out after {:?} waiting for worker {} of {}",
                            after,
                            targets.len() + 1,
                            count
                        )
                    })?,
                None => self.listener.accept().await,
            };
            let (stream, peer) = accepted.context("Failed to accept worker connection")?;
            stream.set_nodelay(true).context("Failed to set TCP_NODELAY")?;

            let index = targets.len();
            info!("Worker {} connected from {}", index, peer);
            targets.push(RemoteTarget { index, peer, stream });
        }

        Ok(targets)
    }
}

/// Run one session per target, chunk `i` going to target `i`
///
/// Returns one outcome per target, in target order. Callers must pass as
/// many chunks as targets.
pub async fn dispatch(targets: Vec<RemoteTarget>, chunks: Vec<Chunk>, framing: Framing) -> Vec<SessionOutcome> {
    debug_assert_eq!(targets.len(), chunks.len());

    let handles: Vec<_> = targets
        .into_iter()
        .zip(chunks)
        .map(|(target, chunk)| {
            let index = target.index;
            let peer = target.peer;
            let chunk_index = chunk.index();
            let session = Session::new(index, target.stream, framing).with_peer(peer);
            let handle = tokio::spawn(session.run(chunk));
            (index, peer, chunk_index, handle)
        })
        .collect();

    debug!(sessions = handles.len(), "Sessions dispatched");

    let mut outcomes = Vec::with_capacity(handles.len());
    for (index, peer, chunk_index, handle) in handles {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => Err(SessionFailure {
                target: index,
                chunk_index,
                peer: Some(peer),
                state: SessionState::Failed,
                error: SessionError::Aborted(e.to_string()),
            }),
        };
        outcomes.push(outcome);
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributed::protocol;

    async fn loopback() -> RemoteCoordinator {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        RemoteCoordinator::from_listener(listener, Some(Duration::from_secs(5)))
    }

    #[tokio::test]
    async fn test_accept_targets_in_order() {
        let coordinator = loopback().await;
        let addr = coordinator.local_addr().unwrap();

        let clients = tokio::spawn(async move {
            let a = TcpStream::connect(addr).await.unwrap();
            let b = TcpStream::connect(addr).await.unwrap();
            (a, b)
        });

        let targets = coordinator.accept_targets(2).await.unwrap();
        let _clients = clients.await.unwrap();

        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].index, 0);
        assert_eq!(targets[1].index, 1);
    }

    #[tokio::test]
    async fn test_accept_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let coordinator = RemoteCoordinator::from_listener(listener, Some(Duration::from_millis(50)));

        let err = coordinator.accept_targets(1).await.unwrap_err();
        assert!(err.to_string().contains("Timed out"));
    }

    #[tokio::test]
    async fn test_dispatch_isolates_failures() {
        let coordinator = loopback().await;
        let addr = coordinator.local_addr().unwrap();
        let framing = Framing::default();

        // Worker 0 answers correctly, worker 1 hangs up right after connecting
        let good = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            let size = protocol::read_size_header(&mut stream, &framing).await.unwrap();
            protocol::send_ack(&mut stream, &framing).await.unwrap();
            let payload = protocol::read_payload(&mut stream, size, &framing).await.unwrap();
            let values = protocol::decode_payload_bytes(&payload).unwrap();
            let count = crate::worker::predicate::count_primes(&values);
            protocol::send_result(&mut stream, count, Duration::from_millis(250), &framing).await.unwrap();
        });
        let targets_fut = coordinator.accept_targets(2);
        let bad = async {
            // Connect after the good worker so accept order is deterministic
            tokio::time::sleep(Duration::from_millis(100)).await;
            let stream = TcpStream::connect(addr).await.unwrap();
            drop(stream);
        };
        let (targets, ()) = tokio::join!(targets_fut, bad);
        let targets = targets.unwrap();

        let chunks = vec![Chunk::new(0, vec![2, 3, 4]), Chunk::new(1, vec![5, 6, 7])];
        let outcomes = dispatch(targets, chunks, framing).await;
        good.await.unwrap();

        assert_eq!(outcomes.len(), 2);
        let ok = outcomes[0].as_ref().unwrap();
        assert_eq!(ok.prime_count, 2);
        let failure = outcomes[1].as_ref().unwrap_err();
        assert_eq!(failure.target, 1);
        assert_eq!(failure.chunk_index, 1);
        assert!(failure.error.is_transport());
    }
}
