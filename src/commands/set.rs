use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::commands::{CommandError, CommandResult};
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;
use crate::server::RedisServer;

pub struct SetArguments {
    key: String,
    value: String,
    expire_ms: i64,
}

impl SetArguments {
    /// `SET key value` or `SET key value PX <milliseconds>`.
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 2 && arguments.len() != 4 {
            return Err(CommandError::InvalidSetCommand);
        }

        let mut expire_ms: i64 = 0;

        if arguments.len() == 4 {
            if arguments[2].to_lowercase() != "px" {
                return Err(CommandError::InvalidSetCommandArgument);
            }

            expire_ms = arguments[3]
                .parse::<i64>()
                .map_err(|_| CommandError::InvalidSetCommandExpiration)?;
        }

        Ok(SetArguments {
            key: arguments[0].clone(),
            value: arguments[1].clone(),
            expire_ms,
        })
    }
}

/// Stores the value, overwriting any previous record. A master replies OK; a
/// replica applies the write silently, whether it came from a client or from
/// the upstream command stream.
pub async fn set(
    server: Arc<RwLock<RedisServer>>,
    kv: Arc<Mutex<KeyValueStore>>,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let set_arguments = SetArguments::parse(arguments)?;

    {
        let mut kv_guard = kv.lock().await;
        kv_guard.set(
            set_arguments.key,
            set_arguments.value,
            set_arguments.expire_ms,
        );
    }

    let server_guard = server.read().await;
    if !server_guard.is_master() {
        return Ok(CommandResult::NoResponse);
    }

    Ok(CommandResult::Response(
        RespValue::SimpleString("OK".to_string()).encode(),
    ))
}
