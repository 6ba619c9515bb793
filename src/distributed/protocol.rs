//! Distributed mode protocol
//!
//! This module defines the protocol for communication between the coordinator
//! and node services. Messages are serialized with MessagePack (rmp-serde).
//!
//! # Protocol Version
//!
//! Current version: 1
//!
//! # Message Flow
//!
//! ```text
//! Coordinator                     Node Service
//!     |                              |
//!     |-------- ASSIGN(tasks) ------>|
//!     |                              |
//!     |<------- ACCEPTED ------------|
//!     |                              |
//!     |<------- RESULT(worker k) ----|   one per task,
//!     |<------- RESULT(worker j) ----|   completion order
//!     |                              |
//!     |<------- DONE ----------------|
//! ```
//!
//! A node may send ERROR at any point instead; the coordinator then fails
//! the whole search. Result order on the wire carries no meaning: every
//! RESULT names its worker id and the coordinator merges by id.
//!
//! # Message Framing
//!
//! Each message is prefixed with a 4-byte length field (little-endian u32):
//!
//! ```text
//! [4 bytes: message length][N bytes: MessagePack-serialized message]
//! ```

use crate::coordinator::gather::PartialResult;
use crate::partition::{ScanTask, WorkerId};
use crate::scanner::ScannerKind;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Protocol version
///
/// Increment this when making breaking changes to the protocol.
/// Coordinator and nodes must have matching protocol versions.
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest accepted message body
pub const MAX_MESSAGE_LEN: usize = 100 * 1024 * 1024;

/// Protocol message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Ranges to scan (Coordinator → Node)
    Assign(AssignMessage),

    /// Node has started scanning (Node → Coordinator)
    Accepted(AcceptedMessage),

    /// One finished range (Node → Coordinator)
    Result(PartialResult),

    /// All assigned ranges reported (Node → Coordinator)
    Done(DoneMessage),

    /// Node could not do its work (Node → Coordinator)
    Error(ErrorMessage),
}

impl Message {
    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Assign(_) => "ASSIGN",
            Message::Accepted(_) => "ACCEPTED",
            Message::Result(_) => "RESULT",
            Message::Done(_) => "DONE",
            Message::Error(_) => "ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignMessage {
    pub protocol_version: u32,
    /// Name the coordinator uses for this node in logs
    pub node_id: String,
    pub scanner: ScannerKind,
    /// Rayon pool size on the node (None = one thread per task)
    pub threads: Option<usize>,
    pub tasks: Vec<ScanTask>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedMessage {
    pub protocol_version: u32,
    /// Host name of the node
    pub node_id: String,
    pub num_tasks: usize,
    pub threads: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoneMessage {
    pub node_id: String,
    /// Time from ACCEPTED to the last RESULT
    pub duration_ns: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub node_id: String,
    /// Worker the error is about, if it is about one
    pub worker_id: Option<WorkerId>,
    pub error: String,
}

/// Serialize a message with its length prefix
pub fn serialize_message(msg: &Message) -> Result<Vec<u8>> {
    let msg_bytes = rmp_serde::to_vec(msg)
        .context("Failed to serialize message")?;

    if msg_bytes.len() > MAX_MESSAGE_LEN {
        anyhow::bail!("Message too large: {} bytes (max 100MB)", msg_bytes.len());
    }

    // Prepend length field
    let msg_len = msg_bytes.len() as u32;
    let mut framed = Vec::with_capacity(4 + msg_bytes.len());
    framed.extend_from_slice(&msg_len.to_le_bytes());
    framed.extend_from_slice(&msg_bytes);

    Ok(framed)
}

/// Deserialize a message from bytes
///
/// Expects a 4-byte length prefix followed by MessagePack-serialized message.
///
/// # Returns
///
/// Returns (message, bytes_consumed) where bytes_consumed includes the length prefix.
pub fn deserialize_message(buf: &[u8]) -> Result<(Message, usize)> {
    // Need at least 4 bytes for length
    if buf.len() < 4 {
        anyhow::bail!("Buffer too small for message length (need 4 bytes, got {})", buf.len());
    }

    let msg_len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;

    if msg_len > MAX_MESSAGE_LEN {
        anyhow::bail!("Message too large: {} bytes (max 100MB)", msg_len);
    }

    // Check if we have the complete message
    if buf.len() < 4 + msg_len {
        anyhow::bail!("Incomplete message (need {} bytes, got {})", 4 + msg_len, buf.len());
    }

    let msg = rmp_serde::from_slice(&buf[4..4 + msg_len])
        .context("Failed to deserialize message")?;

    Ok((msg, 4 + msg_len))
}

/// Read a complete message from a stream
///
/// Reads the length prefix, then the message body.
pub async fn read_message<R: AsyncRead + Unpin>(stream: &mut R) -> Result<Message> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await
        .context("Failed to read message length")?;

    let msg_len = u32::from_le_bytes(len_buf) as usize;

    // Sanity check before allocating
    if msg_len > MAX_MESSAGE_LEN {
        anyhow::bail!("Message too large: {} bytes (max 100MB)", msg_len);
    }

    let mut msg_buf = vec![0u8; msg_len];
    stream.read_exact(&mut msg_buf).await
        .context("Failed to read message body")?;

    let msg = rmp_serde::from_slice(&msg_buf)
        .context("Failed to deserialize message")?;

    Ok(msg)
}

/// Write a message to a stream
///
/// Serializes the message with length prefix and flushes.
pub async fn write_message<W: AsyncWrite + Unpin>(stream: &mut W, msg: &Message) -> Result<()> {
    let framed = serialize_message(msg)?;

    stream.write_all(&framed).await
        .context("Failed to write message")?;

    // Flush to ensure message is sent immediately
    stream.flush().await
        .context("Failed to flush stream")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::Range;

    fn roundtrip(msg: &Message) -> Message {
        let bytes = serialize_message(msg).unwrap();
        let (deserialized, consumed) = deserialize_message(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        deserialized
    }

    #[test]
    fn test_serialize_deserialize_assign() {
        let msg = Message::Assign(AssignMessage {
            protocol_version: PROTOCOL_VERSION,
            node_id: "10.0.1.10:9999".to_string(),
            scanner: ScannerKind::SegmentedSieve,
            threads: Some(4),
            tasks: vec![
                ScanTask { worker_id: 0, range: Range::new(0, 10) },
                ScanTask { worker_id: 2, range: Range::new(20, 30) },
            ],
        });

        match roundtrip(&msg) {
            Message::Assign(assign) => {
                assert_eq!(assign.protocol_version, PROTOCOL_VERSION);
                assert_eq!(assign.scanner, ScannerKind::SegmentedSieve);
                assert_eq!(assign.threads, Some(4));
                assert_eq!(assign.tasks.len(), 2);
                assert_eq!(assign.tasks[1].worker_id, 2);
                assert_eq!(assign.tasks[1].range, Range::new(20, 30));
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_serialize_deserialize_result_keeps_order() {
        let partial = PartialResult::new(3, Range::new(30, 40), vec![31, 37]);
        let msg = Message::Result(partial.clone());

        match roundtrip(&msg) {
            Message::Result(result) => assert_eq!(result, partial),
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_serialize_deserialize_error() {
        let msg = Message::Error(ErrorMessage {
            node_id: "node-a".to_string(),
            worker_id: Some(5),
            error: "scan panicked".to_string(),
        });
        assert_eq!(roundtrip(&msg), msg);
        assert_eq!(msg.kind(), "ERROR");
    }

    #[test]
    fn test_deserialize_multiple_messages() {
        let first = Message::Done(DoneMessage { node_id: "a".to_string(), duration_ns: 10 });
        let second = Message::Accepted(AcceptedMessage {
            protocol_version: PROTOCOL_VERSION,
            node_id: "b".to_string(),
            num_tasks: 2,
            threads: 2,
        });

        let mut buf = serialize_message(&first).unwrap();
        buf.extend(serialize_message(&second).unwrap());

        let (msg, consumed) = deserialize_message(&buf).unwrap();
        assert_eq!(msg, first);
        let (msg, _) = deserialize_message(&buf[consumed..]).unwrap();
        assert_eq!(msg, second);
    }

    #[test]
    fn test_deserialize_incomplete_message() {
        let bytes = serialize_message(&Message::Done(DoneMessage {
            node_id: "a".to_string(),
            duration_ns: 1,
        }))
        .unwrap();

        assert!(deserialize_message(&bytes[..3]).is_err());
        assert!(deserialize_message(&bytes[..bytes.len() - 1]).is_err());
    }

    #[tokio::test]
    async fn test_read_write_over_stream() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let msg = Message::Result(PartialResult::new(0, Range::new(0, 10), vec![2, 3, 5, 7]));

        write_message(&mut client, &msg).await.unwrap();
        assert_eq!(read_message(&mut server).await.unwrap(), msg);
    }

    #[tokio::test]
    async fn test_read_rejects_oversized_length() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let len = (MAX_MESSAGE_LEN as u32 + 1).to_le_bytes();
        client.write_all(&len).await.unwrap();

        let err = read_message(&mut server).await.unwrap_err();
        assert!(err.to_string().contains("Message too large"));
    }

    #[tokio::test]
    async fn test_read_closed_stream() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);
        assert!(read_message(&mut server).await.is_err());
    }
}
