use std::sync::Arc;

use tokio::sync::Mutex;

use crate::commands::{CommandError, CommandResult};
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;

pub struct GetArguments {
    key: String,
}

impl GetArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::InvalidGetCommand);
        }

        Ok(GetArguments {
            key: arguments[0].clone(),
        })
    }
}

/// An expired or missing key is a Null bulk reply, not an error.
pub async fn get(
    kv: Arc<Mutex<KeyValueStore>>,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let get_arguments = GetArguments::parse(arguments)?;

    let mut kv_guard = kv.lock().await;

    let reply = match kv_guard.get(&get_arguments.key) {
        Some(value) => RespValue::BulkString(value),
        None => RespValue::NullBulkString,
    };

    Ok(CommandResult::Response(reply.encode()))
}
