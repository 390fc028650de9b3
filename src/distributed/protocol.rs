//! Chunk exchange protocol
//!
//! Application-level framing between the coordinator ("sender") and a remote
//! worker ("receiver") over an ordered, reliable byte stream. One connection
//! carries exactly one chunk and one result.
//!
//! # Message Flow
//!
//! ```text
//! Coordinator                     Worker
//!     |                              |
//!     |------- SIZE ("1234") ------->|
//!     |                              |
//!     |<------ ACK ------------------|
//!     |                              |
//!     |------- PAYLOAD ------------->|   exactly SIZE bytes, may arrive fragmented
//!     |                              |
//!     |<------ RESULT ("5,0.012") ---|
//!     |                              X   worker closes
//! ```
//!
//! # Message Formats
//!
//! - Size header: ASCII decimal byte length of the payload, no fixed width,
//!   written as its own message. The sender writes nothing else until the ACK
//!   arrives, so the header is alone on the wire.
//! - Acknowledgment: any non-empty token (we send `ACK`); content is not checked.
//! - Payload: ASCII comma-separated decimal integers, no trailing delimiter.
//! - Result: ASCII `<count>,<seconds>`, followed by the receiver closing.
//!
//! # Timeouts
//!
//! Every blocking step, read or write, is bounded by the configured timeout.
//! A peer that stops reading stalls the sender's writes just as a silent peer
//! stalls its reads. For payload reads the timeout applies to each read call,
//! so a large payload only fails when the stream stalls. A timeout fails the
//! session; nothing is retried.

use crate::error::{ProtocolError, SessionError, TransportError};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Acknowledgment token sent by the receiver after the size header
pub const ACK: &[u8] = b"ACK";

/// Longest size header accepted (digits of `u64::MAX`)
pub const MAX_SIZE_HEADER_LEN: usize = 20;

/// Longest result message accepted
pub const MAX_RESULT_LEN: usize = 128;

/// Protocol message a failure is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    SizeHeader,
    Ack,
    Payload,
    Result,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::SizeHeader => write!(f, "size header"),
            Step::Ack => write!(f, "acknowledgment"),
            Step::Payload => write!(f, "payload"),
            Step::Result => write!(f, "result"),
        }
    }
}

/// Framing limits shared by both ends of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Framing {
    /// Bytes requested per payload read
    pub buffer_size: usize,

    /// Timeout per blocking read or write (None waits forever)
    pub timeout: Option<Duration>,

    /// Largest payload a receiver accepts
    pub max_payload_bytes: usize,
}

impl Default for Framing {
    fn default() -> Self {
        Self {
            buffer_size: 65536,
            timeout: Some(Duration::from_secs(300)),
            max_payload_bytes: 1 << 30,
        }
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Encode the size header for a payload of `len` bytes
pub fn encode_size_header(len: usize) -> String {
    len.to_string()
}

/// Decode a size header
///
/// Surrounding ASCII whitespace is tolerated; anything else that is not a
/// decimal digit is rejected.
pub fn decode_size_header(bytes: &[u8]) -> Result<usize, ProtocolError> {
    let bad = || ProtocolError::BadSizeHeader(String::from_utf8_lossy(bytes).into_owned());

    let text = std::str::from_utf8(bytes).map_err(|_| bad())?.trim();
    if text.is_empty() || text.len() > MAX_SIZE_HEADER_LEN || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    text.parse().map_err(|_| bad())
}

/// Encode a chunk as comma-separated decimal integers
///
/// # Examples
///
/// ```
/// use primeshard::distributed::protocol::encode_payload;
///
/// assert_eq!(encode_payload(&[2, -3, 10]), "2,-3,10");
/// assert_eq!(encode_payload(&[]), "");
/// ```
pub fn encode_payload(values: &[i64]) -> String {
    let mut out = String::with_capacity(values.len() * 8);
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&value.to_string());
    }
    out
}

/// Decode a payload back into integers
///
/// An empty payload is an empty chunk. Surrounding whitespace and a single
/// trailing delimiter are tolerated; any other empty or non-numeric token is a
/// protocol failure.
pub fn decode_payload(text: &str) -> Result<Vec<i64>, ProtocolError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }
    let text = text.strip_suffix(',').unwrap_or(text);

    text.split(',')
        .map(|token| {
            token.trim().parse::<i64>().map_err(|_| ProtocolError::BadToken {
                token: token.to_string(),
            })
        })
        .collect()
}

/// Decode raw payload bytes
pub fn decode_payload_bytes(bytes: &[u8]) -> Result<Vec<i64>, ProtocolError> {
    let text = std::str::from_utf8(bytes).map_err(|_| ProtocolError::NotUtf8)?;
    decode_payload(text)
}

/// Encode a result message
pub fn encode_result(count: u64, elapsed: Duration) -> String {
    format!("{},{}", count, elapsed.as_secs_f64())
}

/// Decode a result message into `(count, elapsed)`
///
/// # Examples
///
/// ```
/// use primeshard::distributed::protocol::decode_result;
/// use std::time::Duration;
///
/// let (count, elapsed) = decode_result("5,0.25").unwrap();
/// assert_eq!(count, 5);
/// assert_eq!(elapsed, Duration::from_millis(250));
/// ```
pub fn decode_result(text: &str) -> Result<(u64, Duration), ProtocolError> {
    let bad = || ProtocolError::BadResult(text.to_string());

    let (count, seconds) = text.trim().split_once(',').ok_or_else(bad)?;
    let count: u64 = count.trim().parse().map_err(|_| bad())?;
    let seconds: f64 = seconds.trim().parse().map_err(|_| bad())?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(bad());
    }
    let elapsed = Duration::try_from_secs_f64(seconds).map_err(|_| bad())?;

    Ok((count, elapsed))
}

// ---------------------------------------------------------------------------
// Stream I/O
// ---------------------------------------------------------------------------

fn io_error(step: Step, source: std::io::Error) -> SessionError {
    match source.kind() {
        std::io::ErrorKind::UnexpectedEof => TransportError::Closed { step }.into(),
        _ => TransportError::Io { step, source }.into(),
    }
}

/// Run one blocking step under the I/O timeout
async fn with_timeout<T, F>(step: Step, timeout: Option<Duration>, fut: F) -> Result<T, SessionError>
where
    F: Future<Output = Result<T, SessionError>>,
{
    match timeout {
        Some(after) => match tokio::time::timeout(after, fut).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout { step, after }.into()),
        },
        None => fut.await,
    }
}

/// Write one message and flush it, failing if the peer stops draining the stream
async fn write_message<S>(stream: &mut S, step: Step, bytes: &[u8], framing: &Framing) -> Result<(), SessionError>
where
    S: AsyncWrite + Unpin,
{
    with_timeout(step, framing.timeout, async {
        stream.write_all(bytes).await.map_err(|e| io_error(step, e))?;
        stream.flush().await.map_err(|e| io_error(step, e))
    })
    .await
}

/// Sender: write the size header
pub async fn send_size_header<S>(stream: &mut S, payload_len: usize, framing: &Framing) -> Result<(), SessionError>
where
    S: AsyncWrite + Unpin,
{
    write_message(stream, Step::SizeHeader, encode_size_header(payload_len).as_bytes(), framing).await
}

/// Sender: block until the receiver acknowledges the size header
pub async fn await_ack<S>(stream: &mut S, framing: &Framing) -> Result<(), SessionError>
where
    S: AsyncRead + Unpin,
{
    with_timeout(Step::Ack, framing.timeout, async {
        let mut buf = [0u8; 16];
        let n = stream.read(&mut buf).await.map_err(|e| io_error(Step::Ack, e))?;
        if n == 0 {
            return Err(TransportError::Closed { step: Step::Ack }.into());
        }
        Ok(())
    })
    .await
}

/// Sender: write the whole payload
///
/// Returns only once every byte has been handed to the transport.
pub async fn send_payload<S>(stream: &mut S, payload: &[u8], framing: &Framing) -> Result<(), SessionError>
where
    S: AsyncWrite + Unpin,
{
    write_message(stream, Step::Payload, payload, framing).await
}

/// Sender: read the result message up to the receiver closing the stream
pub async fn read_result<S>(stream: &mut S, framing: &Framing) -> Result<(u64, Duration), SessionError>
where
    S: AsyncRead + Unpin,
{
    let bytes = with_timeout(Step::Result, framing.timeout, async {
        let mut bytes = Vec::with_capacity(32);
        let mut limited = (&mut *stream).take(MAX_RESULT_LEN as u64 + 1);
        limited
            .read_to_end(&mut bytes)
            .await
            .map_err(|e| io_error(Step::Result, e))?;
        Ok(bytes)
    })
    .await?;

    if bytes.is_empty() {
        return Err(TransportError::Closed { step: Step::Result }.into());
    }
    let text = String::from_utf8_lossy(&bytes);
    if bytes.len() > MAX_RESULT_LEN {
        return Err(ProtocolError::BadResult(text.into_owned()).into());
    }
    Ok(decode_result(&text)?)
}

/// Receiver: read the size header as a single message
pub async fn read_size_header<S>(stream: &mut S, framing: &Framing) -> Result<usize, SessionError>
where
    S: AsyncRead + Unpin,
{
    let bytes = with_timeout(Step::SizeHeader, framing.timeout, async {
        let mut buf = [0u8; MAX_SIZE_HEADER_LEN + 12];
        let n = stream
            .read(&mut buf)
            .await
            .map_err(|e| io_error(Step::SizeHeader, e))?;
        if n == 0 {
            return Err(TransportError::Closed { step: Step::SizeHeader }.into());
        }
        Ok(buf[..n].to_vec())
    })
    .await?;

    let size = decode_size_header(&bytes)?;
    if size > framing.max_payload_bytes {
        return Err(ProtocolError::PayloadTooLarge {
            size,
            max: framing.max_payload_bytes,
        }
        .into());
    }
    Ok(size)
}

/// Receiver: acknowledge the size header
pub async fn send_ack<S>(stream: &mut S, framing: &Framing) -> Result<(), SessionError>
where
    S: AsyncWrite + Unpin,
{
    write_message(stream, Step::Ack, ACK, framing).await
}

/// Receiver: read exactly `size` payload bytes
///
/// A single read may return any fraction of the payload, so this loops until
/// the declared size is reached. End of stream before that is a short read.
/// The buffer grows with the bytes actually received, not the declared size.
pub async fn read_payload<S>(stream: &mut S, size: usize, framing: &Framing) -> Result<Vec<u8>, SessionError>
where
    S: AsyncRead + Unpin,
{
    let step_len = framing.buffer_size.max(1);
    let mut payload = Vec::with_capacity(size.min(step_len));

    while payload.len() < size {
        let want = (size - payload.len()).min(step_len);
        let n = with_timeout(Step::Payload, framing.timeout, async {
            (&mut *stream)
                .take(want as u64)
                .read_buf(&mut payload)
                .await
                .map_err(|e| io_error(Step::Payload, e))
        })
        .await?;

        if n == 0 {
            return Err(TransportError::ShortRead {
                expected: size,
                received: payload.len(),
            }
            .into());
        }
    }

    Ok(payload)
}

/// Receiver: send the result and close the write side
pub async fn send_result<S>(
    stream: &mut S,
    count: u64,
    elapsed: Duration,
    framing: &Framing,
) -> Result<(), SessionError>
where
    S: AsyncWrite + Unpin,
{
    write_message(stream, Step::Result, encode_result(count, elapsed).as_bytes(), framing).await?;
    with_timeout(Step::Result, framing.timeout, async {
        stream.shutdown().await.map_err(|e| io_error(Step::Result, e))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_header() {
        assert_eq!(encode_size_header(0), "0");
        assert_eq!(encode_size_header(65536), "65536");
        assert_eq!(decode_size_header(b"1234").unwrap(), 1234);
        assert_eq!(decode_size_header(b" 42\n").unwrap(), 42);
    }

    #[test]
    fn test_size_header_rejects_garbage() {
        assert!(decode_size_header(b"").is_err());
        assert!(decode_size_header(b"-5").is_err());
        assert!(decode_size_header(b"12a").is_err());
        assert!(decode_size_header(b"99999999999999999999999").is_err());
        assert!(decode_size_header(&[0xff, 0xfe]).is_err());
    }

    #[test]
    fn test_payload_round_trip() {
        let cases: Vec<Vec<i64>> = vec![
            vec![],
            vec![7],
            vec![-17, 0, 1, 2, 1_000_000_007, i64::MIN, i64::MAX],
            (0..1000).collect(),
        ];
        for values in cases {
            let encoded = encode_payload(&values);
            assert_eq!(decode_payload(&encoded).unwrap(), values);
        }
    }

    #[test]
    fn test_payload_tolerates_trailing_delimiter_and_newline() {
        assert_eq!(decode_payload("1,2,3,\n").unwrap(), vec![1, 2, 3]);
        assert_eq!(decode_payload(" 4, 5 ").unwrap(), vec![4, 5]);
    }

    #[test]
    fn test_payload_rejects_bad_tokens() {
        assert_eq!(
            decode_payload("1,x,3"),
            Err(ProtocolError::BadToken { token: "x".to_string() })
        );
        assert!(decode_payload("1,,3").is_err());
        assert!(decode_payload("1.5").is_err());
        assert_eq!(decode_payload_bytes(&[0x31, 0xff]), Err(ProtocolError::NotUtf8));
    }

    #[test]
    fn test_result_round_trip() {
        let encoded = encode_result(5, Duration::from_millis(1500));
        assert_eq!(encoded, "5,1.5");
        assert_eq!(decode_result(&encoded).unwrap(), (5, Duration::from_millis(1500)));

        let (count, elapsed) = decode_result("0,0").unwrap();
        assert_eq!(count, 0);
        assert_eq!(elapsed, Duration::ZERO);
    }

    #[test]
    fn test_result_rejects_malformed() {
        for bad in ["", "5", "5;0.1", "x,0.1", "5,abc", "5,-1", "5,inf", "5,NaN", "-1,0.1"] {
            assert!(decode_result(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[tokio::test]
    async fn test_full_exchange_over_duplex() {
        let framing = Framing {
            buffer_size: 7,
            ..Framing::default()
        };
        let (mut sender, mut receiver) = tokio::io::duplex(16);
        let values: Vec<i64> = (0..200).collect();

        let receiver_task = tokio::spawn(async move {
            let size = read_size_header(&mut receiver, &framing).await?;
            send_ack(&mut receiver, &framing).await?;
            let payload = read_payload(&mut receiver, size, &framing).await?;
            let values = decode_payload_bytes(&payload)?;
            send_result(&mut receiver, values.len() as u64, Duration::from_millis(250), &framing).await?;
            Ok::<Vec<i64>, SessionError>(values)
        });

        let payload = encode_payload(&values);
        send_size_header(&mut sender, payload.len(), &framing).await.unwrap();
        await_ack(&mut sender, &framing).await.unwrap();
        send_payload(&mut sender, payload.as_bytes(), &framing).await.unwrap();
        let (count, elapsed) = read_result(&mut sender, &framing).await.unwrap();

        assert_eq!(count, 200);
        assert_eq!(elapsed, Duration::from_millis(250));
        assert_eq!(receiver_task.await.unwrap().unwrap(), values);
    }

    #[tokio::test]
    async fn test_short_read_is_transport_failure() {
        let framing = Framing::default();
        let (mut sender, mut receiver) = tokio::io::duplex(64);

        sender.write_all(b"1,2,3").await.unwrap();
        drop(sender);

        let err = read_payload(&mut receiver, 10, &framing).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Transport(TransportError::ShortRead { expected: 10, received: 5 })
        ));
    }

    #[tokio::test]
    async fn test_ack_on_closed_stream() {
        let framing = Framing::default();
        let (mut sender, receiver) = tokio::io::duplex(64);
        drop(receiver);

        let err = await_ack(&mut sender, &framing).await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_ack_timeout() {
        let framing = Framing {
            timeout: Some(Duration::from_millis(50)),
            ..Framing::default()
        };
        let (mut sender, _receiver) = tokio::io::duplex(64);

        let err = await_ack(&mut sender, &framing).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Transport(TransportError::Timeout { step: Step::Ack, .. })
        ));
    }

    #[tokio::test]
    async fn test_payload_write_timeout() {
        let framing = Framing {
            timeout: Some(Duration::from_millis(50)),
            ..Framing::default()
        };
        let (mut sender, _receiver) = tokio::io::duplex(8);

        let err = send_payload(&mut sender, &[b'7'; 64], &framing).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Transport(TransportError::Timeout { step: Step::Payload, .. })
        ));
    }

    #[tokio::test]
    async fn test_payload_buffer_follows_received_bytes() {
        let framing = Framing {
            buffer_size: 4,
            ..Framing::default()
        };
        let (mut sender, mut receiver) = tokio::io::duplex(64);

        sender.write_all(b"2,3,5").await.unwrap();
        drop(sender);

        // Declares far more than arrives; only what was received is buffered
        let err = read_payload(&mut receiver, 1 << 30, &framing).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Transport(TransportError::ShortRead { received: 5, .. })
        ));
    }

    #[tokio::test]
    async fn test_malformed_result_is_protocol_failure() {
        let framing = Framing::default();
        let (mut sender, mut receiver) = tokio::io::duplex(64);

        receiver.write_all(b"lots of primes").await.unwrap();
        drop(receiver);

        let err = read_result(&mut sender, &framing).await.unwrap_err();
        assert!(err.is_protocol());
    }

    #[tokio::test]
    async fn test_oversized_header_rejected() {
        let framing = Framing {
            max_payload_bytes: 100,
            ..Framing::default()
        };
        let (mut sender, mut receiver) = tokio::io::duplex(64);
        send_size_header(&mut sender, 101, &framing).await.unwrap();

        let err = read_size_header(&mut receiver, &framing).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Protocol(ProtocolError::PayloadTooLarge { size: 101, max: 100 })
        ));
    }

    #[tokio::test]
    async fn test_empty_payload_needs_no_read() {
        let framing = Framing::default();
        let (_sender, mut receiver) = tokio::io::duplex(64);

        let payload = read_payload(&mut receiver, 0, &framing).await.unwrap();
        assert!(payload.is_empty());
    }
}
