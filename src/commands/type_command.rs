use std::sync::Arc;

use tokio::sync::Mutex;

use crate::commands::{CommandError, CommandResult};
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;
use crate::stream_store::StreamStore;

pub struct TypeArguments {
    key: String,
}

impl TypeArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::InvalidTypeCommand);
        }

        Ok(TypeArguments {
            key: arguments[0].clone(),
        })
    }
}

/// `string` for a live KV hit, `stream` for a stream hit, `none` otherwise.
/// The KV probe is a real read, so an expired record counts as absent.
pub async fn type_command(
    kv: Arc<Mutex<KeyValueStore>>,
    streams: Arc<Mutex<StreamStore>>,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let type_arguments = TypeArguments::parse(arguments)?;

    let key_type = {
        let mut kv_guard = kv.lock().await;
        if kv_guard.contains(&type_arguments.key) {
            "string"
        } else {
            let streams_guard = streams.lock().await;
            if streams_guard.contains(&type_arguments.key) {
                "stream"
            } else {
                "none"
            }
        }
    };

    Ok(CommandResult::Response(
        RespValue::SimpleString(key_type.to_string()).encode(),
    ))
}
