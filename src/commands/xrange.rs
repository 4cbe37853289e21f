use std::sync::Arc;

use tokio::sync::Mutex;

use crate::commands::stream_reply::entries_array;
use crate::commands::{CommandError, CommandResult};
use crate::stream_store::StreamStore;

pub struct XrangeArguments {
    stream: String,
    lo: String,
    hi: String,
}

impl XrangeArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 3 {
            return Err(CommandError::InvalidXRangeCommand);
        }

        Ok(XrangeArguments {
            stream: arguments[0].clone(),
            lo: arguments[1].clone(),
            hi: arguments[2].clone(),
        })
    }
}

/// Entries with ids in `[lo, hi]` inclusive. `-` and `+` select the ends of
/// the stream.
pub async fn xrange(
    streams: Arc<Mutex<StreamStore>>,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let xrange_arguments = XrangeArguments::parse(arguments)?;

    let streams_guard = streams.lock().await;

    let entries = streams_guard
        .range(
            &xrange_arguments.stream,
            &xrange_arguments.lo,
            &xrange_arguments.hi,
        )
        .map_err(|error| CommandError::InvalidStreamId(error.to_string()))?;

    Ok(CommandResult::Response(entries_array(&entries).encode()))
}
