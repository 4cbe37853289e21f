use std::time::Duration;

use tokio::time::Instant;

use crate::commands::stream_reply::entries_array;
use crate::commands::{CommandError, CommandResult};
use crate::entry_id::{self, EntryId};
use crate::resp::RespValue;
use crate::server::ServerContext;

/// Cadence of the BLOCK 0 poll loop.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct XreadArguments {
    /// `Some(0)` blocks until data arrives; `Some(t)` sleeps `t` ms and
    /// evaluates once; `None` evaluates immediately.
    block: Option<u64>,
    key_id_pairs: Vec<(String, String)>,
}

impl XreadArguments {
    /// `XREAD [BLOCK ms] STREAMS key... id...` — the keys and ids are two
    /// parallel halves of the tail arguments.
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() < 3 {
            return Err(CommandError::InvalidXReadCommand);
        }

        let (block, streams_keyword_index) = match arguments[0].to_lowercase().as_str() {
            "block" => {
                let ms = arguments[1]
                    .parse::<u64>()
                    .map_err(|_| CommandError::InvalidXReadBlockDuration)?;
                (Some(ms), 2)
            }
            _ => (None, 0),
        };

        if arguments
            .get(streams_keyword_index)
            .map(|keyword| keyword.to_lowercase())
            .as_deref()
            != Some("streams")
        {
            return Err(CommandError::InvalidXReadOption);
        }

        let data = &arguments[streams_keyword_index + 1..];
        if data.is_empty() || data.len() % 2 != 0 {
            return Err(CommandError::InvalidXReadCommand);
        }

        let half = data.len() / 2;
        let key_id_pairs = (0..half)
            .map(|i| (data[i].clone(), data[half + i].clone()))
            .collect();

        Ok(XreadArguments {
            block,
            key_id_pairs,
        })
    }
}

/// Reads entries strictly newer than the given ids. Without BLOCK the answer
/// is immediate, Null when nothing matched. With BLOCK the reply waits for
/// data as described in [`block_until_data`]; a hard ceiling from the server
/// configuration bounds every wait.
pub async fn xread(
    context: &ServerContext,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let xread_arguments = XreadArguments::parse(arguments)?;

    let watches = resolve_after_ids(
        context,
        &xread_arguments.key_id_pairs,
        xread_arguments.block.is_some(),
    )
    .await?;

    let value = match xread_arguments.block {
        None => read_watched_streams(context, &watches).await,
        Some(block_ms) => {
            let ceiling = {
                let server_guard = context.server.read().await;
                server_guard.config.xread_block_ceiling
            };
            block_until_data(context, &watches, block_ms, ceiling).await
        }
    };

    let reply = match value {
        Some(value) => value,
        None => RespValue::NullBulkString,
    };

    Ok(CommandResult::Response(reply.encode()))
}

/// Turns each requested id into a concrete watermark. The `$` sentinel means
/// "whatever the stream's tail is right now" and only exists in BLOCK mode,
/// where it is snapshotted at arm time.
async fn resolve_after_ids(
    context: &ServerContext,
    key_id_pairs: &[(String, String)],
    blocking: bool,
) -> Result<Vec<(String, EntryId)>, CommandError> {
    let streams_guard = context.streams.lock().await;

    key_id_pairs
        .iter()
        .map(|(key, id)| {
            let after = if blocking && id == "$" {
                streams_guard.tail_id(key)
            } else {
                entry_id::parse(id)
                    .map_err(|error| CommandError::InvalidStreamId(error.to_string()))?
            };

            Ok((key.clone(), after))
        })
        .collect()
}

/// One evaluation pass: streams with entries past their watermark make it
/// into the reply; streams without hits are left out entirely. `None` when no
/// stream had anything.
async fn read_watched_streams(
    context: &ServerContext,
    watches: &[(String, EntryId)],
) -> Option<RespValue> {
    let streams_guard = context.streams.lock().await;
    let mut hits = Vec::new();

    for (key, after) in watches {
        let entries = streams_guard.read_after(key, *after);
        if !entries.is_empty() {
            hits.push(RespValue::Array(vec![
                RespValue::BulkString(key.clone()),
                entries_array(&entries),
            ]));
        }
    }

    if hits.is_empty() { None } else { Some(RespValue::Array(hits)) }
}

/// BLOCK 0 polls on a 10 ms cadence until a watched stream has data; BLOCK
/// t > 0 sleeps for `t` ms and evaluates once. Either way the wait never
/// outlives `ceiling`.
async fn block_until_data(
    context: &ServerContext,
    watches: &[(String, EntryId)],
    block_ms: u64,
    ceiling: Duration,
) -> Option<RespValue> {
    if block_ms == 0 {
        let armed_at = Instant::now();

        loop {
            if let Some(value) = read_watched_streams(context, watches).await {
                return Some(value);
            }
            if armed_at.elapsed() >= ceiling {
                return None;
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    let requested = Duration::from_millis(block_ms);
    if requested >= ceiling {
        tokio::time::sleep(ceiling).await;
        return None;
    }

    tokio::time::sleep(requested).await;
    read_watched_streams(context, watches).await
}
