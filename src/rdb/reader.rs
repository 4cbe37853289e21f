//! RDB snapshot reader for the initial load.
//!
//! Only plain string values (type `0x00`) are supported; any other value
//! type is logged and skipped. A missing file means an empty store, not an
//! error.

use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::warn;

use crate::key_value_store::{KeyValueStore, KvRecord};

const OP_AUX: u8 = 0xFA;
const OP_EXPIRE_TIME_MS: u8 = 0xFC;
const OP_EXPIRE_TIME: u8 = 0xFD;
const OP_SELECT_DB: u8 = 0xFE;
const OP_EOF: u8 = 0xFF;

#[derive(Error, Debug, PartialEq)]
enum SnapshotError {
    #[error("unexpected end of snapshot")]
    UnexpectedEof,
    #[error("unsupported length encoding: 0x{0:02x}")]
    UnsupportedEncoding(u8),
}

/// Loads `<dir>/<dbfilename>` into a fresh key-value store.
pub fn load_snapshot(dir: &str, dbfilename: &str) -> KeyValueStore {
    let path = Path::new(dir).join(dbfilename);

    let buffer = match fs::read(&path) {
        Ok(buffer) => buffer,
        Err(_) => return KeyValueStore::new(),
    };

    parse_snapshot(&buffer)
}

/// Parses a snapshot buffer. Malformed data past the header yields whatever
/// was readable up to that point, logged but not fatal.
pub fn parse_snapshot(buffer: &[u8]) -> KeyValueStore {
    match parse(buffer) {
        Ok(store) => store,
        Err(error) => {
            warn!(%error, "stopped parsing snapshot early");
            KeyValueStore::new()
        }
    }
}

fn parse(buffer: &[u8]) -> Result<KeyValueStore, SnapshotError> {
    let mut store = KeyValueStore::new();

    // Everything before the first Select-DB opcode is header and auxiliary
    // metadata; skip straight to the database section.
    let Some(start) = buffer.iter().position(|byte| *byte == OP_SELECT_DB) else {
        return Ok(store);
    };

    let mut cursor = Cursor {
        buffer,
        position: start,
    };

    loop {
        let Ok(opcode) = cursor.take_byte() else {
            break;
        };

        let (expires_at_unix_ms, value_type) = match opcode {
            OP_EOF => break,
            OP_SELECT_DB => {
                // database index byte plus the resize-db marker, then the two
                // hash-table sizes
                cursor.skip(2)?;
                read_length_encoded_integer(&mut cursor)?;
                read_length_encoded_integer(&mut cursor)?;
                continue;
            }
            OP_AUX => {
                read_string(&mut cursor)?;
                read_string(&mut cursor)?;
                continue;
            }
            OP_EXPIRE_TIME => {
                let seconds = u32::from_le_bytes(cursor.take_array::<4>()?) as i64;
                (Some(seconds * 1000), cursor.take_byte()?)
            }
            OP_EXPIRE_TIME_MS => {
                let milliseconds = u64::from_le_bytes(cursor.take_array::<8>()?) as i64;
                (Some(milliseconds), cursor.take_byte()?)
            }
            other => (None, other),
        };

        if value_type != 0x00 {
            warn!(value_type, "skipping unsupported value type in snapshot");
            continue;
        }

        let key = read_string(&mut cursor)?;
        let value = read_string(&mut cursor)?;

        store.insert_record(
            key,
            KvRecord {
                value,
                expires_at_unix_ms,
            },
        );
    }

    Ok(store)
}

struct Cursor<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, count: usize) -> Result<&'a [u8], SnapshotError> {
        let end = self.position + count;
        if end > self.buffer.len() {
            return Err(SnapshotError::UnexpectedEof);
        }

        let slice = &self.buffer[self.position..end];
        self.position = end;

        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], SnapshotError> {
        Ok(self
            .take(N)?
            .try_into()
            .expect("slice length matches array length"))
    }

    fn take_byte(&mut self) -> Result<u8, SnapshotError> {
        Ok(self.take(1)?[0])
    }

    fn skip(&mut self, count: usize) -> Result<(), SnapshotError> {
        self.take(count).map(|_| ())
    }
}

/// How the byte after a length prefix is to be read. The top two bits of the
/// prefix select the shape; `11` means the "string" is an integer of the
/// given width.
enum LengthEncoding {
    Length(usize),
    Int8,
    Int16,
    Int32,
}

fn read_length_encoding(cursor: &mut Cursor) -> Result<LengthEncoding, SnapshotError> {
    let first = cursor.take_byte()?;

    match first >> 6 {
        0b00 => Ok(LengthEncoding::Length((first & 0x3F) as usize)),
        0b01 => {
            let second = cursor.take_byte()?;
            Ok(LengthEncoding::Length(
                (((first & 0x3F) as usize) << 8) | second as usize,
            ))
        }
        0b10 => {
            let length = u32::from_be_bytes(cursor.take_array::<4>()?);
            Ok(LengthEncoding::Length(length as usize))
        }
        _ => match first & 0x3F {
            0 => Ok(LengthEncoding::Int8),
            1 => Ok(LengthEncoding::Int16),
            2 => Ok(LengthEncoding::Int32),
            _ => Err(SnapshotError::UnsupportedEncoding(first)),
        },
    }
}

fn read_length_encoded_integer(cursor: &mut Cursor) -> Result<u64, SnapshotError> {
    match read_length_encoding(cursor)? {
        LengthEncoding::Length(value) => Ok(value as u64),
        LengthEncoding::Int8 => Ok(cursor.take_byte()? as u64),
        LengthEncoding::Int16 => Ok(u16::from_le_bytes(cursor.take_array::<2>()?) as u64),
        LengthEncoding::Int32 => Ok(u32::from_le_bytes(cursor.take_array::<4>()?) as u64),
    }
}

fn read_string(cursor: &mut Cursor) -> Result<String, SnapshotError> {
    match read_length_encoding(cursor)? {
        LengthEncoding::Length(length) => {
            Ok(String::from_utf8_lossy(cursor.take(length)?).to_string())
        }
        LengthEncoding::Int8 => Ok(cursor.take_byte()?.to_string()),
        LengthEncoding::Int16 => Ok(u16::from_le_bytes(cursor.take_array::<2>()?).to_string()),
        LengthEncoding::Int32 => Ok(u32::from_le_bytes(cursor.take_array::<4>()?).to_string()),
    }
}
