use thiserror::Error;

use crate::resp::RespValue;

#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("invalid command")]
    InvalidCommand,
    #[error("unknown command")]
    UnknownCommand,
    #[error("invalid command argument")]
    InvalidCommandArgument,
    #[error("invalid PING command")]
    InvalidPingCommand,
    #[error("invalid ECHO command")]
    InvalidEchoCommand,
    #[error("invalid GET command")]
    InvalidGetCommand,
    #[error("invalid SET command")]
    InvalidSetCommand,
    #[error("invalid SET command argument")]
    InvalidSetCommandArgument,
    #[error("invalid SET command expiration")]
    InvalidSetCommandExpiration,
    #[error("invalid TYPE command")]
    InvalidTypeCommand,
    #[error("invalid KEYS command")]
    InvalidKeysCommand,
    #[error("{0}")]
    InvalidGlobPattern(String),
    #[error("invalid INFO command")]
    InvalidInfoCommand,
    #[error("invalid INFO section")]
    InvalidInfoSection,
    #[error("invalid CONFIG GET command")]
    InvalidConfigGetCommand,
    #[error("invalid REPLCONF command")]
    InvalidReplconfCommand,
    #[error("invalid REPLCONF offset")]
    InvalidReplconfOffset,
    #[error("invalid PSYNC command")]
    InvalidPsyncCommand,
    #[error("invalid PSYNC replication ID")]
    InvalidPsyncReplicationId,
    #[error("invalid PSYNC offset")]
    InvalidPsyncOffset,
    #[error("invalid WAIT command")]
    InvalidWaitCommand,
    #[error("invalid WAIT command argument")]
    InvalidWaitCommandArgument,
    #[error("invalid XADD command")]
    InvalidXAddCommand,
    #[error("{0}")]
    InvalidStreamId(String),
    #[error("invalid XRANGE command")]
    InvalidXRangeCommand,
    #[error("invalid XREAD command")]
    InvalidXReadCommand,
    #[error("invalid XREAD command option")]
    InvalidXReadOption,
    #[error("invalid XREAD block duration")]
    InvalidXReadBlockDuration,
}

impl CommandError {
    /// The wire form of this error. Unknown commands reply Null bulk and the
    /// connection stays open; everything else is an `-ERR` reply.
    pub fn as_string(&self) -> String {
        match self {
            CommandError::UnknownCommand => RespValue::NullBulkString.encode(),
            other => RespValue::Error(format!("ERR {}", other)).encode(),
        }
    }
}
