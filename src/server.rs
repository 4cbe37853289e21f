//! Server configuration, role handling, and the accept loop.

use std::sync::Arc;
use std::time::Duration;

use rand::distr::{Alphanumeric, SampleString};
use regex::Regex;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info};

use crate::connection::{handle_client_connection, handle_upstream_connection};
use crate::key_value_store::KeyValueStore;
use crate::replication::{ReplicationState, perform_handshake, spawn_fanout_worker};
use crate::stream_store::StreamStore;

pub const DEFAULT_PORT: u32 = 6379;
pub const DEFAULT_DIR: &str = ".";
pub const DEFAULT_DBFILENAME: &str = "dump.rdb";
/// Hard safety ceiling on XREAD BLOCK waits. Undocumented by the protocol but
/// kept for compatibility; override with `--xread-block-ceiling-ms`.
pub const DEFAULT_XREAD_BLOCK_CEILING_MS: u64 = 70_000;

const REPL_ID_LENGTH: usize = 40;

/// Errors that can occur during command-line argument parsing.
#[derive(Error, Debug, PartialEq, Clone)]
pub enum CliError {
    #[error("Invalid command line flag")]
    InvalidCommandLineFlag,
    #[error("Invalid port flag value")]
    InvalidPortFlagValue,
    #[error("Invalid master address")]
    InvalidMasterAddress,
    #[error("Invalid master port")]
    InvalidMasterPort,
    #[error("Invalid block ceiling value")]
    InvalidBlockCeilingValue,
}

/// The role a server instance runs in. A master accepts writes and fans them
/// out; a replica receives the command stream from its upstream master and
/// serves reads.
#[derive(Debug, PartialEq, Clone)]
pub enum Role {
    Master,
    Replica { host: String, port: u32 },
}

impl Role {
    /// The protocol-mandated role name served by INFO.
    pub fn as_str(&self) -> &str {
        match self {
            Role::Master => "master",
            Role::Replica { .. } => "slave",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u32,
    pub role: Role,
    pub dir: String,
    pub dbfilename: String,
    pub xread_block_ceiling: Duration,
}

impl ServerConfig {
    /// Parses configuration from command-line arguments.
    ///
    /// Supported flags:
    ///
    /// * `--port <p>` — listener port (default 6379)
    /// * `--replicaof <host> <port>` — run as a replica of the given master
    /// * `--dir <path>` — directory holding the snapshot file (default `.`)
    /// * `--dbfilename <name>` — snapshot file name (default `dump.rdb`)
    /// * `--xread-block-ceiling-ms <n>` — XREAD BLOCK safety ceiling
    pub fn new<I: IntoIterator<Item = String>>(command_line_args: I) -> Result<Self, CliError> {
        let mut iter = command_line_args.into_iter().skip(1);
        let mut port: Option<u32> = None;
        let mut role: Option<Role> = None;
        let mut dir: Option<String> = None;
        let mut dbfilename: Option<String> = None;
        let mut xread_block_ceiling: Option<Duration> = None;

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--port" => {
                    let Some(port_str) = iter.next() else {
                        return Err(CliError::InvalidCommandLineFlag);
                    };

                    port = Some(validate_port_flag(&port_str)?);
                }
                "--replicaof" => {
                    let Some(host) = iter.next() else {
                        return Err(CliError::InvalidCommandLineFlag);
                    };
                    let Some(master_port) = iter.next() else {
                        return Err(CliError::InvalidCommandLineFlag);
                    };

                    validate_master_host(&host)?;

                    role = Some(Role::Replica {
                        host,
                        port: validate_master_port(&master_port)?,
                    });
                }
                "--dir" => {
                    let Some(path) = iter.next() else {
                        return Err(CliError::InvalidCommandLineFlag);
                    };

                    dir = Some(path);
                }
                "--dbfilename" => {
                    let Some(name) = iter.next() else {
                        return Err(CliError::InvalidCommandLineFlag);
                    };

                    dbfilename = Some(name);
                }
                "--xread-block-ceiling-ms" => {
                    let Some(ceiling) = iter.next() else {
                        return Err(CliError::InvalidCommandLineFlag);
                    };

                    let milliseconds = ceiling
                        .parse::<u64>()
                        .map_err(|_| CliError::InvalidBlockCeilingValue)?;
                    xread_block_ceiling = Some(Duration::from_millis(milliseconds));
                }
                _ => return Err(CliError::InvalidCommandLineFlag),
            }
        }

        Ok(ServerConfig {
            port: port.unwrap_or(DEFAULT_PORT),
            role: role.unwrap_or(Role::Master),
            dir: dir.unwrap_or_else(|| DEFAULT_DIR.to_string()),
            dbfilename: dbfilename.unwrap_or_else(|| DEFAULT_DBFILENAME.to_string()),
            xread_block_ceiling: xread_block_ceiling
                .unwrap_or(Duration::from_millis(DEFAULT_XREAD_BLOCK_CEILING_MS)),
        })
    }
}

/// Runtime descriptor for a server instance: its configuration plus the
/// replication identity and offsets.
#[derive(Debug, Clone)]
pub struct RedisServer {
    pub config: ServerConfig,
    /// 40 alphanumeric characters. Generated at startup on a master; learned
    /// from FULLRESYNC on a replica.
    pub repl_id: String,
    /// On a master: bytes of write commands fanned out so far. On a replica:
    /// bytes of commands executed from the upstream connection.
    pub repl_offset: u64,
}

impl RedisServer {
    pub fn new(config: ServerConfig) -> Self {
        let repl_id = match config.role {
            Role::Master => Alphanumeric.sample_string(&mut rand::rng(), REPL_ID_LENGTH),
            Role::Replica { .. } => String::new(),
        };

        RedisServer {
            config,
            repl_id,
            repl_offset: 0,
        }
    }

    pub fn is_master(&self) -> bool {
        self.config.role == Role::Master
    }
}

/// The shared handles every connection task works against. Each store sits
/// behind its own lock; all operations under a lock are short.
#[derive(Clone)]
pub struct ServerContext {
    pub server: Arc<RwLock<RedisServer>>,
    pub kv: Arc<Mutex<KeyValueStore>>,
    pub streams: Arc<Mutex<StreamStore>>,
    pub replication: Arc<Mutex<ReplicationState>>,
    /// Ordered fan-out queue: payloads sent here reach every replica in
    /// enqueue order via a single background writer.
    pub fanout: tokio::sync::mpsc::UnboundedSender<Vec<u8>>,
}

impl ServerContext {
    /// Must be called from within a Tokio runtime: the fan-out worker is
    /// spawned here.
    pub fn new(server: RedisServer, kv: KeyValueStore) -> Self {
        let replication = Arc::new(Mutex::new(ReplicationState::new()));
        let fanout = spawn_fanout_worker(Arc::clone(&replication));

        ServerContext {
            server: Arc::new(RwLock::new(server)),
            kv: Arc::new(Mutex::new(kv)),
            streams: Arc::new(Mutex::new(StreamStore::new())),
            replication,
            fanout,
        }
    }
}

/// Runs the server: connects to the upstream master first when configured as
/// a replica, then accepts client connections until the listener fails.
pub async fn run(context: ServerContext) -> tokio::io::Result<()> {
    let (port, role) = {
        let server_guard = context.server.read().await;
        (server_guard.config.port, server_guard.config.role.clone())
    };

    if let Role::Replica {
        host,
        port: master_port,
    } = role
    {
        connect_to_upstream(context.clone(), host, master_port).await;
    }

    let listener = TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    info!(port, "listening");

    loop {
        let (stream, client_address) = listener.accept().await?;
        let connection_context = context.clone();

        tokio::spawn(async move {
            handle_client_connection(stream, connection_context, client_address.to_string()).await;
        });
    }
}

/// Dials the master, runs the handshake, and leaves the connection behind as
/// the inbound replication stream. A failure here is logged but does not take
/// the server down; it still serves reads from whatever state it has.
async fn connect_to_upstream(context: ServerContext, host: String, port: u32) {
    let master_address = format!("{}:{}", host, port);

    let mut stream = match TcpStream::connect(&master_address).await {
        Ok(stream) => stream,
        Err(e) => {
            error!(%master_address, error = %e, "failed to connect to master");
            return;
        }
    };

    let mut buffer = bytes::BytesMut::with_capacity(4096);

    if let Err(e) = perform_handshake(&mut stream, &mut buffer, &context).await {
        error!(%master_address, error = %e, "replication handshake failed");
        return;
    }

    info!(%master_address, "replication handshake complete");

    tokio::spawn(async move {
        handle_upstream_connection(stream, buffer, context, &master_address).await;
    });
}

fn validate_port_flag(port: &str) -> Result<u32, CliError> {
    validate_port_with_error(port, CliError::InvalidPortFlagValue)
}

fn validate_master_port(port: &str) -> Result<u32, CliError> {
    validate_port_with_error(port, CliError::InvalidMasterPort)
}

fn validate_port_with_error(port: &str, error: CliError) -> Result<u32, CliError> {
    let port_number = port.parse::<u32>().map_err(|_| error.clone())?;

    if port_number < 1 || port_number > 65535 {
        return Err(error);
    }

    Ok(port_number)
}

/// Accepts IPv4 addresses with valid octets, or hostnames made of letters,
/// digits, dots, and dashes.
fn validate_master_host(host: &str) -> Result<(), CliError> {
    let ipv4_regex = Regex::new(r"^(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})$")
        .map_err(|_| CliError::InvalidMasterAddress)?;
    let hostname_regex =
        Regex::new(r"^[a-zA-Z0-9\-\.]+$").map_err(|_| CliError::InvalidMasterAddress)?;

    let valid = if let Some(caps) = ipv4_regex.captures(host) {
        caps.iter().skip(1).all(|octet| {
            octet
                .map(|m| m.as_str().parse::<u16>().map(|v| v <= 255).unwrap_or(false))
                .unwrap_or(false)
        })
    } else {
        hostname_regex.is_match(host)
    };

    if !valid {
        return Err(CliError::InvalidMasterAddress);
    }

    Ok(())
}
