use std::sync::Arc;

use tokio::sync::RwLock;

use crate::commands::{CommandError, CommandResult};
use crate::resp::RespValue;
use crate::server::RedisServer;

pub struct ConfigGetArguments {
    parameter: String,
}

impl ConfigGetArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 2 || arguments[0].to_uppercase() != "GET" {
            return Err(CommandError::InvalidConfigGetCommand);
        }

        Ok(ConfigGetArguments {
            parameter: arguments[1].to_lowercase(),
        })
    }
}

/// `CONFIG GET dir` and `CONFIG GET dbfilename` reply `[name, value]`; any
/// other parameter gets no reply at all.
pub async fn config_get(
    server: Arc<RwLock<RedisServer>>,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let config_arguments = ConfigGetArguments::parse(arguments)?;

    let server_guard = server.read().await;

    let value = match config_arguments.parameter.as_str() {
        "dir" => server_guard.config.dir.clone(),
        "dbfilename" => server_guard.config.dbfilename.clone(),
        _ => return Ok(CommandResult::NoResponse),
    };

    Ok(CommandResult::Response(
        RespValue::Array(vec![
            RespValue::BulkString(config_arguments.parameter),
            RespValue::BulkString(value),
        ])
        .encode(),
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::RwLock;

    use super::config_get;
    use crate::commands::{CommandError, CommandResult};
    use crate::server::{RedisServer, ServerConfig};

    fn server() -> Arc<RwLock<RedisServer>> {
        let config = ServerConfig::new(
            ["coral", "--dir", "/tmp/redis-files", "--dbfilename", "dump.rdb"]
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>(),
        )
        .unwrap();

        Arc::new(RwLock::new(RedisServer::new(config)))
    }

    #[tokio::test]
    async fn test_config_get() {
        let test_cases = vec![
            (
                vec!["GET".to_string(), "dir".to_string()],
                Ok(CommandResult::Response(
                    "*2\r\n$3\r\ndir\r\n$16\r\n/tmp/redis-files\r\n".to_string(),
                )),
            ),
            (
                vec!["get".to_string(), "dbfilename".to_string()],
                Ok(CommandResult::Response(
                    "*2\r\n$10\r\ndbfilename\r\n$8\r\ndump.rdb\r\n".to_string(),
                )),
            ),
            (
                vec!["GET".to_string(), "maxmemory".to_string()],
                Ok(CommandResult::NoResponse),
            ),
            (
                vec!["SET".to_string(), "dir".to_string()],
                Err(CommandError::InvalidConfigGetCommand),
            ),
            (vec![], Err(CommandError::InvalidConfigGetCommand)),
        ];

        for (arguments, expected) in test_cases {
            assert_eq!(
                config_get(server(), arguments.clone()).await,
                expected,
                "arguments {:?}",
                arguments
            );
        }
    }
}
