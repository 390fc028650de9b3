//! Worker node service
//!
//! Runs on each worker machine in remote mode. The node service:
//! - Connects to the coordinator
//! - Reads the size header and acknowledges it
//! - Reads exactly that many payload bytes
//! - Counts primes with its own local worker pool
//! - Sends `<count>,<seconds>` back and closes the connection
//!
//! One connection serves exactly one chunk; there is no connection reuse.

use crate::config::Config;
use crate::distributed::protocol::{self, Framing};
use crate::partition::{partition, Chunk};
use crate::worker::LocalWorkerPool;
use anyhow::{Context, Result};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info};

/// What a node did with the chunk it was sent
#[derive(Debug, Clone, PartialEq)]
pub struct NodeReport {
    /// Node identifier (hostname)
    pub node_id: String,

    /// Integers received
    pub values: usize,

    /// Primes found
    pub prime_count: u64,

    /// Time spent counting (what was reported to the coordinator)
    pub elapsed: Duration,
}

/// Node service
///
/// Serves one chunk for a coordinator using a local pool of execution units.
pub struct NodeService {
    /// Coordinator address (host:port)
    coordinator_addr: String,

    framing: Framing,

    /// Pool used to count the received chunk
    pool: LocalWorkerPool,

    /// Node identifier (hostname)
    node_id: String,
}

impl NodeService {
    /// Create a node service from configuration
    ///
    /// The local pool uses `workers.node_units` units with the configured backend.
    pub fn new(config: &Config) -> Result<Self> {
        let pool = LocalWorkerPool::new(config.workers.node_units(), config.workers.backend)
            .context("Invalid node worker pool")?
            .with_threads_per_process(config.workers.threads_per_process);

        Ok(Self::with_pool(config.network.address(), config.network.framing(), pool))
    }

    /// Create a node service with an explicit pool
    pub fn with_pool(coordinator_addr: String, framing: Framing, pool: LocalWorkerPool) -> Self {
        Self {
            coordinator_addr,
            framing,
            pool,
            node_id: get_node_id(),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Connect to the coordinator and serve one chunk
    pub async fn run(&self) -> Result<NodeReport> {
        info!(node_id = %self.node_id, "Connecting to coordinator at {}", self.coordinator_addr);

        let stream = TcpStream::connect(&self.coordinator_addr)
            .await
            .with_context(|| format!("Failed to connect to {}", self.coordinator_addr))?;
        stream.set_nodelay(true).context("Failed to set TCP_NODELAY")?;

        info!("Connected to coordinator");
        self.serve(stream).await
    }

    /// Serve one chunk on an already-connected stream
    pub async fn serve<S>(&self, mut stream: S) -> Result<NodeReport>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let size = protocol::read_size_header(&mut stream, &self.framing)
            .await
            .context("Failed to read size header")?;
        debug!(size, "Received size header");

        protocol::send_ack(&mut stream, &self.framing).await.context("Failed to send ACK")?;

        let payload = protocol::read_payload(&mut stream, size, &self.framing)
            .await
            .context("Failed to read payload")?;
        let values = protocol::decode_payload_bytes(&payload).context("Failed to decode payload")?;
        info!("Received {} numbers to process", values.len());

        let value_count = values.len();
        let (prime_count, elapsed) = self.count(values).await?;

        protocol::send_result(&mut stream, prime_count, elapsed, &self.framing)
            .await
            .context("Failed to send result")?;

        info!(
            "Found {} prime numbers in {:.2} seconds",
            prime_count,
            elapsed.as_secs_f64()
        );

        Ok(NodeReport {
            node_id: self.node_id.clone(),
            values: value_count,
            prime_count,
            elapsed,
        })
    }

    /// Count on the local pool without blocking the runtime
    async fn count(&self, values: Vec<i64>) -> Result<(u64, Duration)> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || count_with_pool(&pool, values))
            .await
            .context("Counting task failed")?
    }
}

/// Split `values` over the pool's units and sum the counts
pub fn count_with_pool(pool: &LocalWorkerPool, values: Vec<i64>) -> Result<(u64, Duration)> {
    let start = Instant::now();

    let chunks: Vec<Chunk> = partition(&values, pool.units())?;
    let results = pool.process_all(chunks)?;
    let prime_count = results.iter().map(|r| r.prime_count).sum();

    Ok((prime_count, start.elapsed()))
}

/// Get node identifier (hostname, falling back to "unknown")
fn get_node_id() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}
