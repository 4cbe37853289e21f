use std::sync::Arc;

use globset::Glob;
use tokio::sync::Mutex;

use crate::commands::{CommandError, CommandResult};
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;

pub struct KeysArguments {
    pattern: String,
}

impl KeysArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::InvalidKeysCommand);
        }

        Ok(KeysArguments {
            pattern: arguments[0].clone(),
        })
    }
}

/// Lists non-expired keys matching the glob pattern, in unspecified order.
pub async fn keys(
    kv: Arc<Mutex<KeyValueStore>>,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let keys_arguments = KeysArguments::parse(arguments)?;

    let matcher = Glob::new(&keys_arguments.pattern)
        .map_err(|e| CommandError::InvalidGlobPattern(e.to_string()))?
        .compile_matcher();

    let mut kv_guard = kv.lock().await;

    let matching = kv_guard
        .keys()
        .into_iter()
        .filter(|key| matcher.is_match(key))
        .map(RespValue::BulkString)
        .collect::<Vec<RespValue>>();

    Ok(CommandResult::Response(RespValue::Array(matching).encode()))
}
