use std::sync::Arc;

use tokio::sync::Mutex;

use crate::commands::{CommandError, CommandResult};
use crate::entry_id::EntryIdError;
use crate::resp::RespValue;
use crate::stream_store::StreamStore;

const ID_TOO_SMALL: &str =
    "The ID specified in XADD is equal or smaller than the target stream top item";
const ID_ZERO: &str = "The ID specified in XADD must be greater than 0-0";

pub struct XaddArguments {
    stream: String,
    entry_id: String,
    /// Field pairs in the order they appeared on the wire.
    fields: Vec<(String, String)>,
}

impl XaddArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() < 4 || arguments[2..].len() % 2 != 0 {
            return Err(CommandError::InvalidXAddCommand);
        }

        Ok(XaddArguments {
            stream: arguments[0].clone(),
            entry_id: arguments[1].clone(),
            fields: arguments[2..]
                .chunks(2)
                .map(|pair| (pair[0].clone(), pair[1].clone()))
                .collect(),
        })
    }
}

/// Appends an entry and replies with the id actually stored. The literal
/// `0-0` gets its own error text before the store is consulted.
pub async fn xadd(
    streams: Arc<Mutex<StreamStore>>,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let xadd_arguments = XaddArguments::parse(arguments)?;

    if xadd_arguments.entry_id == "0-0" {
        return Err(CommandError::InvalidStreamId(ID_ZERO.to_string()));
    }

    let mut streams_guard = streams.lock().await;

    let stored_id = streams_guard
        .add(
            &xadd_arguments.stream,
            &xadd_arguments.entry_id,
            xadd_arguments.fields,
        )
        .map_err(|error| match error {
            EntryIdError::NotMonotonic => {
                CommandError::InvalidStreamId(ID_TOO_SMALL.to_string())
            }
            EntryIdError::InvalidFormat => CommandError::InvalidStreamId(ID_ZERO.to_string()),
        })?;

    Ok(CommandResult::Response(
        RespValue::BulkString(stored_id.to_string()).encode(),
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::Mutex;

    use super::{ID_TOO_SMALL, ID_ZERO, xadd};
    use crate::commands::{CommandError, CommandResult};
    use crate::stream_store::StreamStore;

    fn arguments(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[tokio::test]
    async fn test_xadd_auto_sequence() {
        let streams = Arc::new(Mutex::new(StreamStore::new()));

        assert_eq!(
            xadd(
                Arc::clone(&streams),
                arguments(&["strawberry", "0-*", "foo", "bar"])
            )
            .await,
            Ok(CommandResult::Response("$3\r\n0-1\r\n".to_string()))
        );
        assert_eq!(
            xadd(
                Arc::clone(&streams),
                arguments(&["strawberry", "1-*", "foo", "bar"])
            )
            .await,
            Ok(CommandResult::Response("$3\r\n1-0\r\n".to_string()))
        );
    }

    #[tokio::test]
    async fn test_xadd_rejects_zero_zero() {
        let streams = Arc::new(Mutex::new(StreamStore::new()));

        assert_eq!(
            xadd(streams, arguments(&["strawberry", "0-0", "foo", "bar"])).await,
            Err(CommandError::InvalidStreamId(ID_ZERO.to_string()))
        );
    }

    #[tokio::test]
    async fn test_xadd_rejects_stale_id() {
        let streams = Arc::new(Mutex::new(StreamStore::new()));

        xadd(Arc::clone(&streams), arguments(&["s", "5-5", "foo", "bar"]))
            .await
            .unwrap();

        assert_eq!(
            xadd(streams, arguments(&["s", "5-4", "foo", "bar"])).await,
            Err(CommandError::InvalidStreamId(ID_TOO_SMALL.to_string()))
        );
    }

    #[tokio::test]
    async fn test_xadd_arity() {
        let streams = Arc::new(Mutex::new(StreamStore::new()));

        let error_cases = vec![
            arguments(&["s"]),
            arguments(&["s", "1-1"]),
            arguments(&["s", "1-1", "orphan-field"]),
            arguments(&["s", "1-1", "a", "1", "b"]),
        ];

        for input in error_cases {
            assert_eq!(
                xadd(Arc::clone(&streams), input.clone()).await,
                Err(CommandError::InvalidXAddCommand),
                "arguments {:?}",
                input
            );
        }
    }
}
