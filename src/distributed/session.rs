//! Coordinator-side session
//!
//! A session binds one connection to one chunk for its whole lifetime and
//! walks the sender half of the exchange protocol:
//!
//! ```text
//! Connected -> SizeSent -> AckAwaited -> PayloadSent -> ResultAwaited -> Done
//!     \___________\____________\_____________\_______________\-------> Failed
//! ```
//!
//! Failures never escape the session: [`Session::run`] always returns a
//! [`SessionOutcome`], so one broken peer cannot take its siblings down.

use crate::distributed::protocol::{self, Framing};
use crate::error::{ProtocolError, SessionError};
use crate::partition::Chunk;
use crate::stats::WorkerResult;
use std::fmt;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

/// Sender-side protocol state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport connected, nothing exchanged yet
    Connected,
    /// Writing the size header
    SizeSent,
    /// Blocked on the receiver's acknowledgment
    AckAwaited,
    /// Writing the payload; left only once every byte is written
    PayloadSent,
    /// Blocked on the result message
    ResultAwaited,
    /// Result received and validated
    Done,
    /// Session aborted
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Done | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Connected => "connected",
            SessionState::SizeSent => "size-sent",
            SessionState::AckAwaited => "ack-awaited",
            SessionState::PayloadSent => "payload-sent",
            SessionState::ResultAwaited => "result-awaited",
            SessionState::Done => "done",
            SessionState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// A session that ended in `Failed`
#[derive(Debug)]
pub struct SessionFailure {
    /// Target (connection) index
    pub target: usize,

    /// Chunk the session was carrying
    pub chunk_index: usize,

    /// Remote address, if known
    pub peer: Option<SocketAddr>,

    /// State whose step was in progress when the session failed
    pub state: SessionState,

    pub error: SessionError,
}

impl fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.peer {
            Some(peer) => write!(f, "worker {} ({}) failed in state {}: {}", self.target, peer, self.state, self.error),
            None => write!(f, "worker {} failed in state {}: {}", self.target, self.state, self.error),
        }
    }
}

/// Terminal outcome of one session
pub type SessionOutcome = Result<WorkerResult, SessionFailure>;

/// One connection carrying exactly one chunk
pub struct Session<S> {
    target: usize,
    peer: Option<SocketAddr>,
    stream: S,
    state: SessionState,
    framing: Framing,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already-connected stream
    pub fn new(target: usize, stream: S, framing: Framing) -> Self {
        Self {
            target,
            peer: None,
            stream,
            state: SessionState::Connected,
            framing,
        }
    }

    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Send `chunk`, wait for its result, and close the connection
    pub async fn run(mut self, chunk: Chunk) -> SessionOutcome {
        let chunk_index = chunk.index();

        match self.exchange(&chunk).await {
            Ok(result) => {
                self.transition(SessionState::Done);
                Ok(result)
            }
            Err(error) => {
                let state = self.state;
                self.transition(SessionState::Failed);
                warn!(
                    target_index = self.target,
                    chunk = chunk_index,
                    %state,
                    family = error.family(),
                    "Session failed: {}",
                    error
                );
                Err(SessionFailure {
                    target: self.target,
                    chunk_index,
                    peer: self.peer,
                    state,
                    error,
                })
            }
        }
    }

    async fn exchange(&mut self, chunk: &Chunk) -> Result<WorkerResult, SessionError> {
        let payload = protocol::encode_payload(chunk.values());

        // Each state is entered before its blocking step, so a failure is
        // attributed to the step that was in progress.
        self.transition(SessionState::SizeSent);
        protocol::send_size_header(&mut self.stream, payload.len(), &self.framing).await?;

        self.transition(SessionState::AckAwaited);
        protocol::await_ack(&mut self.stream, &self.framing).await?;

        self.transition(SessionState::PayloadSent);
        protocol::send_payload(&mut self.stream, payload.as_bytes(), &self.framing).await?;

        self.transition(SessionState::ResultAwaited);
        let (prime_count, elapsed) = protocol::read_result(&mut self.stream, &self.framing).await?;

        if prime_count > chunk.len() as u64 {
            return Err(ProtocolError::CountExceedsChunk {
                count: prime_count,
                len: chunk.len(),
            }
            .into());
        }

        Ok(WorkerResult::new(chunk.index(), prime_count, elapsed))
    }

    fn transition(&mut self, next: SessionState) {
        debug!(target_index = self.target, from = %self.state, to = %next, "Session transition");
        self.state = next;
    }
}
