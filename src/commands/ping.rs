use std::sync::Arc;

use tokio::sync::RwLock;

use crate::commands::{CommandError, CommandResult};
use crate::resp::RespValue;
use crate::server::RedisServer;

pub struct PingArguments;

impl PingArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if !arguments.is_empty() {
            return Err(CommandError::InvalidPingCommand);
        }

        Ok(PingArguments)
    }
}

/// Replies PONG on a master. A replica stays silent: the command stream from
/// its master contains PINGs that must not produce traffic back upstream.
pub async fn ping(
    server: Arc<RwLock<RedisServer>>,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    PingArguments::parse(arguments)?;

    let server_guard = server.read().await;
    if !server_guard.is_master() {
        return Ok(CommandResult::NoResponse);
    }

    Ok(CommandResult::Response(
        RespValue::SimpleString("PONG".to_string()).encode(),
    ))
}
