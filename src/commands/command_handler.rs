use std::sync::Arc;

use crate::commands::{
    command_error::CommandError,
    config_get::config_get,
    echo::echo,
    get::get,
    info::info,
    keys::keys,
    ping::ping,
    psync::psync,
    replconf::replconf,
    set::set,
    type_command::type_command,
    wait::wait,
    xadd::xadd,
    xrange::xrange,
    xread::xread,
};
use crate::resp::RespValue;
use crate::server::ServerContext;

/// What a command execution hands back to the connection runtime. Modeled as
/// a value type because commands emit anywhere from zero frames (replica
/// silence) to two (PSYNC's FULLRESYNC line plus the snapshot).
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    NoResponse,
    Response(String),
    /// Pre-encoded FULLRESYNC header plus length-framed snapshot bytes. The
    /// connection that receives this becomes a replica feed.
    Sync(Vec<u8>),
}

/// A parsed command: its uppercased name, its arguments, and the exact wire
/// bytes it arrived as. The raw bytes are fanned out to replicas verbatim and
/// drive the replica's processed-byte offset.
#[derive(Debug, PartialEq, Clone)]
pub struct CommandHandler {
    pub name: String,
    pub arguments: Vec<String>,
    pub raw: Vec<u8>,
}

impl CommandHandler {
    /// Builds a handler from a decoded RESP array of bulk strings. The first
    /// element is the command name; the rest are its arguments.
    pub fn new(input: RespValue, raw: Vec<u8>) -> Result<Self, CommandError> {
        let RespValue::Array(elements) = &input else {
            return Err(CommandError::InvalidCommand);
        };

        let name = match elements.first() {
            Some(RespValue::BulkString(s)) => Ok(s.to_uppercase()),
            _ => Err(CommandError::InvalidCommandArgument),
        }?;

        let mut arguments: Vec<String> = Vec::with_capacity(elements.len().saturating_sub(1));

        for element in elements[1..].iter() {
            let arg = match element {
                RespValue::BulkString(s) => Ok(s.to_string()),
                _ => Err(CommandError::InvalidCommand),
            }?;
            arguments.push(arg);
        }

        Ok(Self {
            name,
            arguments,
            raw,
        })
    }

    /// Executes the command against the shared stores. `client_address`
    /// identifies the connection for replica ack bookkeeping.
    pub async fn execute(
        &self,
        context: &ServerContext,
        client_address: &str,
    ) -> Result<CommandResult, CommandError> {
        match self.name.as_str() {
            "PING" => ping(Arc::clone(&context.server), self.arguments.clone()).await,
            "ECHO" => echo(self.arguments.clone()),
            "GET" => get(Arc::clone(&context.kv), self.arguments.clone()).await,
            "SET" => {
                set(
                    Arc::clone(&context.server),
                    Arc::clone(&context.kv),
                    self.arguments.clone(),
                )
                .await
            }
            "TYPE" => {
                type_command(
                    Arc::clone(&context.kv),
                    Arc::clone(&context.streams),
                    self.arguments.clone(),
                )
                .await
            }
            "KEYS" => keys(Arc::clone(&context.kv), self.arguments.clone()).await,
            "INFO" => info(Arc::clone(&context.server), self.arguments.clone()).await,
            "CONFIG" => config_get(Arc::clone(&context.server), self.arguments.clone()).await,
            "REPLCONF" => replconf(context, client_address, self.arguments.clone()).await,
            "PSYNC" => psync(Arc::clone(&context.server), self.arguments.clone()).await,
            "WAIT" => wait(context, self.arguments.clone()).await,
            "XADD" => xadd(Arc::clone(&context.streams), self.arguments.clone()).await,
            "XRANGE" => xrange(Arc::clone(&context.streams), self.arguments.clone()).await,
            "XREAD" => xread(context, self.arguments.clone()).await,
            // control frame a master sends down the replication link
            "FULLRESYNC" => Ok(CommandResult::NoResponse),
            _ => Err(CommandError::UnknownCommand),
        }
    }
}

/// Write commands are the ones a primary fans out to its replicas.
pub fn is_write_command(name: &str) -> bool {
    matches!(name, "SET")
}
