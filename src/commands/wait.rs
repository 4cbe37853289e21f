use std::time::Duration;

use tokio::sync::mpsc;

use crate::commands::{CommandError, CommandResult};
use crate::replication::getack_payload;
use crate::resp::RespValue;
use crate::server::ServerContext;

pub struct WaitArguments {
    pub number_of_replicas: usize,
    /// `None` when the caller passed 0: wait for the threshold without a
    /// timer.
    pub timeout: Option<Duration>,
}

impl WaitArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 2 {
            return Err(CommandError::InvalidWaitCommand);
        }

        let number_of_replicas = arguments[0]
            .parse::<usize>()
            .map_err(|_| CommandError::InvalidWaitCommandArgument)?;

        let timeout_ms = arguments[1]
            .parse::<u64>()
            .map_err(|_| CommandError::InvalidWaitCommandArgument)?;

        let timeout = match timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };

        Ok(WaitArguments {
            number_of_replicas,
            timeout,
        })
    }
}

/// Blocks until `number_of_replicas` replicas have acknowledged, or the
/// timeout fires. Each invocation gets its own barrier, so overlapping WAIT
/// calls count independently. A timeout with zero acks replies with the
/// number of currently registered replicas — the pragmatic assumption that a
/// replica which never answered GETACK is still caught up.
pub async fn wait(
    context: &ServerContext,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let wait_arguments = WaitArguments::parse(arguments)?;

    if wait_arguments.number_of_replicas == 0 {
        return Ok(CommandResult::Response(RespValue::Integer(0).encode()));
    }

    let (waker, mut wake_receiver) = mpsc::channel(1);

    let barrier_id = {
        let mut replication_guard = context.replication.lock().await;
        replication_guard.register_barrier(wait_arguments.number_of_replicas, waker)
    };

    // The solicitation goes through the fan-out queue so it reaches each
    // replica after every write that preceded this WAIT.
    let _ = context.fanout.send(getack_payload());

    let wake = match wait_arguments.timeout {
        Some(duration) => tokio::time::timeout(duration, wake_receiver.recv())
            .await
            .ok()
            .flatten(),
        None => wake_receiver.recv().await,
    };

    let mut replication_guard = context.replication.lock().await;
    let barrier = replication_guard.remove_barrier(barrier_id);

    let count = match wake {
        Some(acks) => acks,
        None => {
            let acks = barrier.map(|barrier| barrier.acks).unwrap_or(0);
            if acks == 0 {
                replication_guard.replica_count()
            } else {
                acks
            }
        }
    };

    Ok(CommandResult::Response(
        RespValue::Integer(count as i64).encode(),
    ))
}
