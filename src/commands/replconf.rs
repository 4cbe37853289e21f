use crate::commands::{CommandError, CommandResult};
use crate::resp::RespValue;
use crate::server::ServerContext;

pub struct ReplconfArguments {
    subcommand: String,
    rest: Vec<String>,
}

impl ReplconfArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.is_empty() {
            return Err(CommandError::InvalidReplconfCommand);
        }

        Ok(ReplconfArguments {
            subcommand: arguments[0].to_uppercase(),
            rest: arguments[1..].to_vec(),
        })
    }
}

/// REPLCONF wears three hats:
///
/// - handshake configuration (`listening-port`, `capa`) — a plain OK;
/// - `GETACK *` from a master — a replica answers with its processed-byte
///   offset;
/// - `ACK <offset>` from a replica — a master records it and wakes any WAIT
///   barriers that reach their threshold.
pub async fn replconf(
    context: &ServerContext,
    client_address: &str,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let replconf_arguments = ReplconfArguments::parse(arguments)?;

    match replconf_arguments.subcommand.as_str() {
        "GETACK" => {
            let server_guard = context.server.read().await;
            if server_guard.is_master() {
                return Ok(CommandResult::NoResponse);
            }

            let offset = server_guard.repl_offset.to_string();

            Ok(CommandResult::Response(
                RespValue::command(&["REPLCONF", "ACK", &offset]).encode(),
            ))
        }
        "ACK" => {
            {
                let server_guard = context.server.read().await;
                if !server_guard.is_master() {
                    return Ok(CommandResult::NoResponse);
                }
            }

            let offset = replconf_arguments
                .rest
                .first()
                .and_then(|raw| raw.parse::<i64>().ok())
                .ok_or(CommandError::InvalidReplconfOffset)?;

            let mut replication_guard = context.replication.lock().await;
            replication_guard.record_ack(client_address, offset);

            Ok(CommandResult::NoResponse)
        }
        _ => Ok(CommandResult::Response(
            RespValue::SimpleString("OK".to_string()).encode(),
        )),
    }
}
