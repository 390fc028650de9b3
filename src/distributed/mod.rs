//! Remote mode implementation
//!
//! Counting is distributed across machines reached over TCP.
//!
//! # Architecture
//!
//! primeshard remote mode uses a coordinator-node architecture:
//!
//! - **Coordinator**: Listens, accepts one connection per node, sends each node one chunk, aggregates results
//! - **Node Service**: Runs on nodes, receives its chunk, counts it with a local worker pool, reports back
//! - **Session**: One connection carrying one chunk round-trip
//!
//! # Modules
//!
//! - `protocol`: Wire formats and framed reads/writes
//! - `session`: Coordinator-side protocol state machine
//! - `node_service`: Node-side receiver
//! - `coordinator`: Listener and concurrent session dispatch

pub mod coordinator;
pub mod node_service;
pub mod protocol;
pub mod session;

pub use coordinator::{dispatch, RemoteCoordinator, RemoteTarget};
pub use node_service::{NodeReport, NodeService};
pub use protocol::Framing;
pub use session::{Session, SessionFailure, SessionOutcome, SessionState};
