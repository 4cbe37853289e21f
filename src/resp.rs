//! RESP wire codec: value encoding and the byte-stream frame splitter.
//!
//! The splitter has to cope with one non-RESP shape: during replication a
//! primary sends an RDB snapshot framed only by its declared length, with no
//! trailing CRLF. Everything else is standard RESP with a leading sigil.

use bytes::{Buf, BytesMut};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum RespError {
    #[error("invalid UTF-8 sequence")]
    InvalidUtf8,
    #[error("unknown RESP type byte: 0x{0:02x}")]
    UnknownRespType(u8),
    #[error("failed to parse integer")]
    FailedToParseInteger,
    #[error("invalid bulk string")]
    InvalidBulkString,
    #[error("invalid array")]
    InvalidArray,
}

impl RespError {
    pub fn as_string(&self) -> String {
        RespValue::Error(format!("ERR {}", self)).encode()
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum RespValue {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(String),
    NullBulkString,
    Array(Vec<RespValue>),
}

impl RespValue {
    pub fn encode(&self) -> String {
        match self {
            RespValue::SimpleString(content) => format!("+{}\r\n", content),
            RespValue::Error(message) => format!("-{}\r\n", message),
            RespValue::Integer(value) => format!(":{}\r\n", value),
            RespValue::BulkString(content) => format!("${}\r\n{}\r\n", content.len(), content),
            RespValue::NullBulkString => "$-1\r\n".to_string(),
            RespValue::Array(elements) => {
                let mut encoded = format!("*{}\r\n", elements.len());
                for element in elements {
                    encoded.push_str(&element.encode());
                }
                encoded
            }
        }
    }

    /// Builds a single bulk string out of multiple parts joined with `\n`
    /// (newline, not CRLF). INFO replies use this shape.
    pub fn bulk_from_parts(parts: &[String]) -> RespValue {
        RespValue::BulkString(parts.join("\n"))
    }

    /// The array-of-bulk-strings form every client command takes on the wire.
    pub fn command(parts: &[&str]) -> RespValue {
        RespValue::Array(
            parts
                .iter()
                .map(|part| RespValue::BulkString(part.to_string()))
                .collect(),
        )
    }
}

/// One independent unit cut out of the inbound byte stream.
#[derive(Debug, PartialEq, Clone)]
pub enum Frame {
    /// A decoded RESP value together with its exact wire bytes. The raw bytes
    /// are what a primary fans out to replicas and what a replica adds to its
    /// processed-byte offset.
    Resp { value: RespValue, raw: Vec<u8> },
    /// An RDB snapshot body (the `$<len>\r\n` header already consumed).
    Rdb(Vec<u8>),
}

/// Splits every complete frame off the front of `buffer`, leaving an
/// incomplete tail in place for the next socket read.
pub fn split_frames(buffer: &mut BytesMut) -> Result<Vec<Frame>, RespError> {
    let mut frames = Vec::new();

    while let Some(frame) = split_first_frame(buffer)? {
        frames.push(frame);
    }

    Ok(frames)
}

/// Splits exactly one complete frame off the front of `buffer`, or `None`
/// when no complete frame has arrived yet.
pub fn split_first_frame(buffer: &mut BytesMut) -> Result<Option<Frame>, RespError> {
    match try_frame(&buffer[..])? {
        Some((frame, consumed)) => {
            buffer.advance(consumed);
            Ok(Some(frame))
        }
        None => Ok(None),
    }
}

fn try_frame(buf: &[u8]) -> Result<Option<(Frame, usize)>, RespError> {
    let Some(first) = buf.first() else {
        return Ok(None);
    };

    match first {
        b'+' | b'-' | b':' | b'*' => match try_value(buf, 0)? {
            Some((value, consumed)) => Ok(Some((
                Frame::Resp {
                    value,
                    raw: buf[..consumed].to_vec(),
                },
                consumed,
            ))),
            None => Ok(None),
        },
        b'$' => try_bulk_or_snapshot(buf),
        other => Err(RespError::UnknownRespType(*other)),
    }
}

/// A top-level `$` frame is either an ordinary CRLF-terminated bulk string or
/// an RDB snapshot whose only framing is the declared length. The two bytes
/// after the body decide which shape this is; a body opening with the `REDIS`
/// magic is a snapshot even when the buffer ends exactly at the declared
/// length.
fn try_bulk_or_snapshot(buf: &[u8]) -> Result<Option<(Frame, usize)>, RespError> {
    let Some((header, body_start)) = find_line(buf, 0) else {
        return Ok(None);
    };

    let declared = parse_line_integer(&header[1..]).map_err(|_| RespError::InvalidBulkString)?;

    if declared < 0 {
        return Ok(Some((
            Frame::Resp {
                value: RespValue::NullBulkString,
                raw: buf[..body_start].to_vec(),
            },
            body_start,
        )));
    }

    let Some(body_end) = body_start.checked_add(declared as usize) else {
        return Err(RespError::InvalidBulkString);
    };
    if buf.len() < body_end {
        return Ok(None);
    }

    let body = &buf[body_start..body_end];
    let trailing = &buf[body_end..];

    if trailing.starts_with(b"\r\n") {
        let content = str::from_utf8(body).map_err(|_| RespError::InvalidUtf8)?;
        let consumed = body_end + 2;

        return Ok(Some((
            Frame::Resp {
                value: RespValue::BulkString(content.to_string()),
                raw: buf[..consumed].to_vec(),
            },
            consumed,
        )));
    }

    let definitely_snapshot = trailing.len() >= 2 || (trailing.len() == 1 && trailing[0] != b'\r');

    if definitely_snapshot || body.starts_with(b"REDIS") {
        return Ok(Some((Frame::Rdb(body.to_vec()), body_end)));
    }

    // Could still be a bulk string whose trailing CRLF has not arrived yet.
    Ok(None)
}

fn try_value(buf: &[u8], pos: usize) -> Result<Option<(RespValue, usize)>, RespError> {
    let Some(first) = buf.get(pos) else {
        return Ok(None);
    };

    match first {
        b'+' => Ok(find_line(buf, pos).map(|(line, next)| {
            (
                RespValue::SimpleString(String::from_utf8_lossy(&line[1..]).to_string()),
                next,
            )
        })),
        b'-' => Ok(find_line(buf, pos).map(|(line, next)| {
            (
                RespValue::Error(String::from_utf8_lossy(&line[1..]).to_string()),
                next,
            )
        })),
        b':' => {
            let Some((line, next)) = find_line(buf, pos) else {
                return Ok(None);
            };
            let value = parse_line_integer(&line[1..])?;

            Ok(Some((RespValue::Integer(value), next)))
        }
        b'$' => {
            let Some((header, body_start)) = find_line(buf, pos) else {
                return Ok(None);
            };
            let declared =
                parse_line_integer(&header[1..]).map_err(|_| RespError::InvalidBulkString)?;
            if declared < 0 {
                return Ok(Some((RespValue::NullBulkString, body_start)));
            }

            let Some(body_end) = body_start.checked_add(declared as usize) else {
                return Err(RespError::InvalidBulkString);
            };
            if buf.len() < body_end + 2 {
                return Ok(None);
            }
            if &buf[body_end..body_end + 2] != b"\r\n" {
                return Err(RespError::InvalidBulkString);
            }

            let content =
                str::from_utf8(&buf[body_start..body_end]).map_err(|_| RespError::InvalidUtf8)?;

            Ok(Some((RespValue::BulkString(content.to_string()), body_end + 2)))
        }
        b'*' => {
            let Some((header, mut cursor)) = find_line(buf, pos) else {
                return Ok(None);
            };
            let count = parse_line_integer(&header[1..]).map_err(|_| RespError::InvalidArray)?;
            if count < 0 {
                return Err(RespError::InvalidArray);
            }

            // the count is untrusted input; let the buffer run dry instead
            // of pre-allocating for it
            let mut elements = Vec::new();
            for _ in 0..count {
                match try_value(buf, cursor)? {
                    Some((value, next)) => {
                        elements.push(value);
                        cursor = next;
                    }
                    None => return Ok(None),
                }
            }

            Ok(Some((RespValue::Array(elements), cursor)))
        }
        other => Err(RespError::UnknownRespType(*other)),
    }
}

/// Returns the line starting at `start` without its CRLF, plus the position
/// just past the CRLF. `None` when no full line has arrived yet.
fn find_line(buf: &[u8], start: usize) -> Option<(&[u8], usize)> {
    let relative = buf[start..].windows(2).position(|window| window == b"\r\n")?;

    Some((&buf[start..start + relative], start + relative + 2))
}

fn parse_line_integer(digits: &[u8]) -> Result<i64, RespError> {
    str::from_utf8(digits)
        .map_err(|_| RespError::InvalidUtf8)?
        .parse::<i64>()
        .map_err(|_| RespError::FailedToParseInteger)
}
