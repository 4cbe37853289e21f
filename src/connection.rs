//! Per-connection read loops: client connections on the listener side, and
//! the upstream master link on a replica.

use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::commands::{CommandHandler, CommandResult, is_write_command};
use crate::resp::{Frame, split_frames};
use crate::server::ServerContext;

const READ_CHUNK_SIZE: usize = 4096;

/// Handles one accepted client connection until it closes. Commands execute
/// strictly in arrival order. If the connection registered itself as a
/// replica via PSYNC, its descriptor is dropped on the way out.
pub async fn handle_client_connection(
    stream: TcpStream,
    context: ServerContext,
    client_address: String,
) {
    let (mut reader, writer) = stream.into_split();
    let writer = Arc::new(Mutex::new(writer));
    let mut buffer = BytesMut::with_capacity(READ_CHUNK_SIZE);
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        let read = match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(read) => read,
            Err(e) => {
                debug!(client = %client_address, error = %e, "read failed");
                break;
            }
        };

        buffer.extend_from_slice(&chunk[..read]);

        let frames = match split_frames(&mut buffer) {
            Ok(frames) => frames,
            Err(e) => {
                warn!(client = %client_address, error = %e, "protocol error");
                let _ = write_to_stream(&writer, e.as_string().as_bytes()).await;
                buffer.clear();
                continue;
            }
        };

        for frame in frames {
            let Frame::Resp { value, raw } = frame else {
                // clients have no business sending snapshots
                debug!(client = %client_address, "ignoring snapshot frame from client");
                continue;
            };

            let handler = match CommandHandler::new(value, raw) {
                Ok(handler) => handler,
                Err(e) => {
                    let _ = write_to_stream(&writer, e.as_string().as_bytes()).await;
                    continue;
                }
            };

            process_client_command(&handler, &context, &client_address, &writer).await;
        }
    }

    let mut replication_guard = context.replication.lock().await;
    replication_guard.remove_replica(&client_address);
}

async fn process_client_command(
    handler: &CommandHandler,
    context: &ServerContext,
    client_address: &str,
    writer: &Arc<Mutex<OwnedWriteHalf>>,
) {
    let result = match handler.execute(context, client_address).await {
        Ok(result) => result,
        Err(e) => {
            let _ = write_to_stream(writer, e.as_string().as_bytes()).await;
            return;
        }
    };

    match result {
        CommandResult::NoResponse => {}
        CommandResult::Response(response) => {
            if let Err(e) = write_to_stream(writer, response.as_bytes()).await {
                debug!(client = %client_address, error = %e, "failed to write reply");
                return;
            }
        }
        CommandResult::Sync(payload) => {
            if let Err(e) = write_to_stream(writer, &payload).await {
                debug!(client = %client_address, error = %e, "failed to write sync payload");
                return;
            }

            // From here on this connection is a replica's command feed.
            let mut replication_guard = context.replication.lock().await;
            replication_guard.register_replica(client_address.to_string(), Arc::clone(writer));
        }
    }

    let is_master = {
        let server_guard = context.server.read().await;
        server_guard.is_master()
    };

    if is_master && is_write_command(&handler.name) {
        {
            let mut server_guard = context.server.write().await;
            server_guard.repl_offset += handler.raw.len() as u64;
        }

        // The queue's background writer does the actual socket work, so a
        // slow replica cannot hold up the client's reply.
        let _ = context.fanout.send(handler.raw.clone());
    }
}

/// Handles the inbound command stream a replica receives from its master.
/// Commands execute silently; only REPLCONF GETACK answers flow back
/// upstream. After each executed command the processed-byte offset advances
/// by that command's exact wire length.
pub async fn handle_upstream_connection(
    mut stream: TcpStream,
    mut buffer: BytesMut,
    context: ServerContext,
    master_address: &str,
) {
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        let frames = match split_frames(&mut buffer) {
            Ok(frames) => frames,
            Err(e) => {
                warn!(master = %master_address, error = %e, "protocol error on upstream link");
                buffer.clear();
                Vec::new()
            }
        };

        for frame in frames {
            match frame {
                Frame::Rdb(snapshot) => {
                    debug!(length = snapshot.len(), "received snapshot from master");
                }
                Frame::Resp { value, raw } => {
                    let handler = match CommandHandler::new(value, raw) {
                        Ok(handler) => handler,
                        // simple-string control frames (FULLRESYNC, stray
                        // +OK) are not commands
                        Err(_) => continue,
                    };

                    let frame_length = handler.raw.len() as u64;

                    match handler.execute(&context, master_address).await {
                        Ok(CommandResult::Response(response)) => {
                            if let Err(e) = stream.write_all(response.as_bytes()).await {
                                error!(master = %master_address, error = %e, "failed to answer master");
                                return;
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            debug!(master = %master_address, error = %e, "failed command from master");
                        }
                    }

                    let mut server_guard = context.server.write().await;
                    server_guard.repl_offset += frame_length;
                }
            }
        }

        let read = match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(read) => read,
            Err(e) => {
                error!(master = %master_address, error = %e, "upstream read failed");
                break;
            }
        };

        buffer.extend_from_slice(&chunk[..read]);
    }

    warn!(master = %master_address, "upstream connection closed");
}

pub async fn write_to_stream(
    writer: &Arc<Mutex<OwnedWriteHalf>>,
    response: &[u8],
) -> tokio::io::Result<()> {
    let mut writer_guard = writer.lock().await;
    writer_guard.write_all(response).await?;
    writer_guard.flush().await?;

    Ok(())
}
