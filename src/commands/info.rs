use std::sync::Arc;

use tokio::sync::RwLock;

use crate::commands::{CommandError, CommandResult};
use crate::resp::RespValue;
use crate::server::RedisServer;

enum InfoSection {
    Default,
    Replication,
}

pub struct InfoArguments {
    section: InfoSection,
}

impl InfoArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() > 1 {
            return Err(CommandError::InvalidInfoCommand);
        }

        let section = match arguments.first().map(|s| s.to_lowercase()) {
            None => InfoSection::Default,
            Some(section) if section == "replication" => InfoSection::Replication,
            Some(_) => return Err(CommandError::InvalidInfoSection),
        };

        Ok(InfoArguments { section })
    }
}

/// One bulk string of `field:value` lines joined with `\n`. Only the
/// replication section exists; the default section serves the same fields.
pub async fn info(
    server: Arc<RwLock<RedisServer>>,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let info_arguments = InfoArguments::parse(arguments)?;

    let server_guard = server.read().await;

    let lines = match info_arguments.section {
        InfoSection::Default | InfoSection::Replication => vec![
            format!("role:{}", server_guard.config.role.as_str()),
            format!("master_replid:{}", server_guard.repl_id),
            format!("master_repl_offset:{}", server_guard.repl_offset),
        ],
    };

    Ok(CommandResult::Response(
        RespValue::bulk_from_parts(&lines).encode(),
    ))
}
