use std::sync::Arc;

use tokio::sync::RwLock;

use crate::commands::{CommandError, CommandResult};
use crate::rdb::empty_snapshot;
use crate::server::RedisServer;

pub struct PsyncArguments {
    repl_id: String,
}

impl PsyncArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 2 {
            return Err(CommandError::InvalidPsyncCommand);
        }

        // the offset is either -1 (fresh sync) or a previous position; both
        // are integers
        arguments[1]
            .parse::<i64>()
            .map_err(|_| CommandError::InvalidPsyncOffset)?;

        Ok(PsyncArguments {
            repl_id: arguments[0].clone(),
        })
    }
}

/// Replies with two frames in one payload: the FULLRESYNC line, then the
/// fixed empty snapshot framed by its length with no trailing CRLF. The
/// connection this arrives on becomes a replica feed.
pub async fn psync(
    server: Arc<RwLock<RedisServer>>,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let psync_arguments = PsyncArguments::parse(arguments)?;

    let server_guard = server.read().await;

    if psync_arguments.repl_id != "?" && psync_arguments.repl_id != server_guard.repl_id {
        return Err(CommandError::InvalidPsyncReplicationId);
    }

    let snapshot = empty_snapshot();

    let mut payload = Vec::with_capacity(snapshot.len() + 64);
    payload.extend_from_slice(format!("+FULLRESYNC {} 0\r\n", server_guard.repl_id).as_bytes());
    payload.extend_from_slice(format!("${}\r\n", snapshot.len()).as_bytes());
    payload.extend_from_slice(&snapshot);

    Ok(CommandResult::Sync(payload))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::RwLock;

    use super::psync;
    use crate::commands::{CommandError, CommandResult};
    use crate::server::{RedisServer, ServerConfig};

    fn master_with_repl_id(repl_id: &str) -> Arc<RwLock<RedisServer>> {
        let config = ServerConfig::new(vec!["coral".to_string()]).unwrap();
        let mut server = RedisServer::new(config);
        server.repl_id = repl_id.to_string();

        Arc::new(RwLock::new(server))
    }

    #[tokio::test]
    async fn test_psync_emits_fullresync_and_snapshot() {
        let repl_id = "8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb";
        let server = master_with_repl_id(repl_id);

        let result = psync(server, vec!["?".to_string(), "-1".to_string()])
            .await
            .unwrap();

        let CommandResult::Sync(payload) = result else {
            panic!("expected a sync payload");
        };

        let header = format!("+FULLRESYNC {} 0\r\n$88\r\n", repl_id);
        assert!(payload.starts_with(header.as_bytes()));
        // 88 snapshot bytes and no trailing CRLF
        assert_eq!(payload.len(), header.len() + 88);
        assert!(!payload.ends_with(b"\r\n"));
    }

    #[tokio::test]
    async fn test_psync_rejects_foreign_repl_id() {
        let server = master_with_repl_id("8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb");

        assert_eq!(
            psync(
                server,
                vec![
                    "0000000000000000000000000000000000000000".to_string(),
                    "0".to_string()
                ]
            )
            .await,
            Err(CommandError::InvalidPsyncReplicationId)
        );
    }

    #[tokio::test]
    async fn test_psync_argument_errors() {
        let server = master_with_repl_id("8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb");

        assert_eq!(
            psync(Arc::clone(&server), vec!["?".to_string()]).await,
            Err(CommandError::InvalidPsyncCommand)
        );
        assert_eq!(
            psync(server, vec!["?".to_string(), "later".to_string()]).await,
            Err(CommandError::InvalidPsyncOffset)
        );
    }
}
