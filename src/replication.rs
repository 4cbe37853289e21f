//! Replication: replica descriptors, write fan-out, WAIT barriers, and the
//! replica-side handshake.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::BytesMut;
use regex::Regex;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use crate::resp::{Frame, RespError, RespValue, split_first_frame};
use crate::server::ServerContext;

/// The primary's record of one downstream replica: where to write propagated
/// commands, and the last offset the replica acknowledged.
pub struct ReplicaHandle {
    pub writer: Arc<Mutex<OwnedWriteHalf>>,
    pub acked_offset: i64,
}

/// One WAIT invocation's ack counter. Barriers are per-invocation so
/// overlapping WAIT calls cannot clobber each other; every inbound ACK
/// advances all live barriers.
pub struct AckBarrier {
    required: usize,
    pub acks: usize,
    waker: mpsc::Sender<usize>,
}

#[derive(Default)]
pub struct ReplicationState {
    replicas: HashMap<String, ReplicaHandle>,
    barriers: HashMap<u64, AckBarrier>,
    next_barrier_id: u64,
}

impl ReplicationState {
    pub fn new() -> Self {
        ReplicationState::default()
    }

    /// Records a connection as a replica feed. Called when PSYNC arrives.
    pub fn register_replica(&mut self, address: String, writer: Arc<Mutex<OwnedWriteHalf>>) {
        self.replicas.insert(
            address,
            ReplicaHandle {
                writer,
                acked_offset: 0,
            },
        );
    }

    pub fn remove_replica(&mut self, address: &str) {
        self.replicas.remove(address);
    }

    pub fn replica_count(&self) -> usize {
        self.replicas.len()
    }

    pub fn register_barrier(&mut self, required: usize, waker: mpsc::Sender<usize>) -> u64 {
        let id = self.next_barrier_id;
        self.next_barrier_id += 1;

        self.barriers.insert(
            id,
            AckBarrier {
                required,
                acks: 0,
                waker,
            },
        );

        id
    }

    pub fn remove_barrier(&mut self, id: u64) -> Option<AckBarrier> {
        self.barriers.remove(&id)
    }

    /// Handles a `REPLCONF ACK <offset>` from a replica: updates the
    /// descriptor and advances every live barrier, waking those that reach
    /// their threshold.
    pub fn record_ack(&mut self, address: &str, offset: i64) {
        if let Some(replica) = self.replicas.get_mut(address) {
            replica.acked_offset = offset;
        }

        for barrier in self.barriers.values_mut() {
            barrier.acks += 1;
            if barrier.acks >= barrier.required {
                let _ = barrier.waker.try_send(barrier.acks);
            }
        }
    }

    fn writers(&self) -> Vec<(String, Arc<Mutex<OwnedWriteHalf>>)> {
        self.replicas
            .iter()
            .map(|(address, replica)| (address.clone(), Arc::clone(&replica.writer)))
            .collect()
    }
}

/// Spawns the single background task that drains the fan-out queue. Routing
/// every payload through one queue keeps per-replica FIFO intact — writes
/// reach each replica in the exact order the primary executed them — while
/// the client reply never waits on a slow replica.
pub fn spawn_fanout_worker(
    replication: Arc<Mutex<ReplicationState>>,
) -> mpsc::UnboundedSender<Vec<u8>> {
    let (sender, mut receiver) = mpsc::unbounded_channel::<Vec<u8>>();

    tokio::spawn(async move {
        while let Some(payload) = receiver.recv().await {
            propagate(Arc::clone(&replication), payload).await;
        }
    });

    sender
}

/// Writes `payload` to every registered replica. A replica whose socket
/// write fails is dropped from the set; the others, and the client that
/// triggered the write, are unaffected.
async fn propagate(replication: Arc<Mutex<ReplicationState>>, payload: Vec<u8>) {
    let writers = {
        let replication_guard = replication.lock().await;
        replication_guard.writers()
    };

    let mut failed = Vec::new();

    for (address, writer) in writers {
        let mut writer_guard = writer.lock().await;

        let outcome = async {
            writer_guard.write_all(&payload).await?;
            writer_guard.flush().await
        }
        .await;

        if let Err(e) = outcome {
            warn!(replica = %address, error = %e, "dropping replica after failed write");
            failed.push(address);
        }
    }

    if !failed.is_empty() {
        let mut replication_guard = replication.lock().await;
        for address in failed {
            replication_guard.remove_replica(&address);
        }
    }
}

pub fn getack_payload() -> Vec<u8> {
    RespValue::command(&["REPLCONF", "GETACK", "*"])
        .encode()
        .into_bytes()
}

#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("I/O error: {0}")]
    Io(#[from] tokio::io::Error),
    #[error("connection closed by master")]
    ConnectionClosed,
    #[error("RESP parse error: {0}")]
    Resp(#[from] RespError),
    #[error("unexpected response from master: {0}")]
    UnexpectedResponse(String),
}

/// Runs the replica side of the replication handshake over `stream`:
///
/// 1. `PING`
/// 2. `REPLCONF listening-port <port>`
/// 3. `REPLCONF capa psync2`
/// 4. `PSYNC ? -1`
///
/// waiting for a reply between sends. The master's FULLRESYNC reply carries
/// the replication id, which is validated and recorded. Bytes arriving after
/// FULLRESYNC (the snapshot, early propagated commands) stay in `buffer` for
/// the upstream handler.
pub async fn perform_handshake(
    stream: &mut TcpStream,
    buffer: &mut BytesMut,
    context: &ServerContext,
) -> Result<(), HandshakeError> {
    let listening_port = {
        let server_guard = context.server.read().await;
        server_guard.config.port
    };

    let response = exchange(stream, buffer, RespValue::command(&["PING"])).await?;
    expect_simple(&response, "PONG")?;

    let response = exchange(
        stream,
        buffer,
        RespValue::command(&["REPLCONF", "listening-port", &listening_port.to_string()]),
    )
    .await?;
    expect_simple(&response, "OK")?;

    let response = exchange(
        stream,
        buffer,
        RespValue::command(&["REPLCONF", "capa", "psync2"]),
    )
    .await?;
    expect_simple(&response, "OK")?;

    let response = exchange(stream, buffer, RespValue::command(&["PSYNC", "?", "-1"])).await?;
    let repl_id = parse_fullresync(&response)?;

    {
        let mut server_guard = context.server.write().await;
        server_guard.repl_id = repl_id;
    }

    Ok(())
}

async fn exchange(
    stream: &mut TcpStream,
    buffer: &mut BytesMut,
    command: RespValue,
) -> Result<RespValue, HandshakeError> {
    stream.write_all(command.encode().as_bytes()).await?;
    stream.flush().await?;

    read_resp_frame(stream, buffer).await
}

async fn read_resp_frame(
    stream: &mut TcpStream,
    buffer: &mut BytesMut,
) -> Result<RespValue, HandshakeError> {
    let mut chunk = [0u8; 4096];

    loop {
        match split_first_frame(buffer)? {
            Some(Frame::Resp { value, .. }) => return Ok(value),
            Some(Frame::Rdb(snapshot)) => {
                debug!(length = snapshot.len(), "snapshot arrived mid-handshake");
                continue;
            }
            None => {}
        }

        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            return Err(HandshakeError::ConnectionClosed);
        }

        buffer.extend_from_slice(&chunk[..read]);
    }
}

fn expect_simple(response: &RespValue, expected: &str) -> Result<(), HandshakeError> {
    if *response != RespValue::SimpleString(expected.to_string()) {
        return Err(HandshakeError::UnexpectedResponse(format!(
            "{:?}",
            response
        )));
    }

    Ok(())
}

fn parse_fullresync(response: &RespValue) -> Result<String, HandshakeError> {
    let RespValue::SimpleString(content) = response else {
        return Err(HandshakeError::UnexpectedResponse(format!(
            "{:?}",
            response
        )));
    };

    let parts = content.split_whitespace().collect::<Vec<&str>>();

    if parts.len() != 3 || parts[0] != "FULLRESYNC" || !is_valid_repl_id(parts[1]) {
        return Err(HandshakeError::UnexpectedResponse(content.clone()));
    }

    Ok(parts[1].to_string())
}

fn is_valid_repl_id(repl_id: &str) -> bool {
    Regex::new(r"^[a-zA-Z0-9]{40}$")
        .map(|re| re.is_match(repl_id))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::{ReplicationState, is_valid_repl_id, parse_fullresync};
    use crate::resp::RespValue;

    #[test]
    fn test_is_valid_repl_id() {
        let test_cases = vec![
            ("8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb", true),
            ("8371b4fb1155b71f4a04d3e1bc3e18c4a990aee", false),
            ("8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb1", false),
            ("8371b4fb1155b71f4a04d3e1bc3e18c4a990aee!", false),
            ("", false),
        ];

        for (input, expected) in test_cases {
            assert_eq!(is_valid_repl_id(input), expected, "checking {:?}", input);
        }
    }

    #[test]
    fn test_parse_fullresync() {
        let valid = RespValue::SimpleString(
            "FULLRESYNC 8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb 0".to_string(),
        );
        assert_eq!(
            parse_fullresync(&valid).unwrap(),
            "8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb"
        );

        let invalid_cases = vec![
            RespValue::SimpleString("FULLRESYNC short 0".to_string()),
            RespValue::SimpleString("RESYNC 8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb 0".to_string()),
            RespValue::SimpleString("FULLRESYNC".to_string()),
            RespValue::Integer(0),
        ];

        for input in invalid_cases {
            assert!(
                parse_fullresync(&input).is_err(),
                "should reject {:?}",
                input
            );
        }
    }

    #[tokio::test]
    async fn test_barrier_wakes_at_threshold() {
        let mut state = ReplicationState::new();
        let (waker, mut wake_receiver) = mpsc::channel(1);

        let id = state.register_barrier(2, waker);

        state.record_ack("replica-1", 10);
        assert!(wake_receiver.try_recv().is_err());

        state.record_ack("replica-2", 10);
        assert_eq!(wake_receiver.try_recv().unwrap(), 2);

        let barrier = state.remove_barrier(id).unwrap();
        assert_eq!(barrier.acks, 2);
    }

    #[tokio::test]
    async fn test_overlapping_barriers_count_independently() {
        let mut state = ReplicationState::new();
        let (waker_a, mut receiver_a) = mpsc::channel(1);
        let (waker_b, mut receiver_b) = mpsc::channel(1);

        state.register_barrier(1, waker_a);
        let id_b = state.register_barrier(3, waker_b);

        state.record_ack("replica-1", 5);

        assert_eq!(receiver_a.try_recv().unwrap(), 1);
        assert!(receiver_b.try_recv().is_err());

        let barrier_b = state.remove_barrier(id_b).unwrap();
        assert_eq!(barrier_b.acks, 1);
    }
}
