//! Stream entry identifiers and the arithmetic behind XADD auto-generation.

use std::fmt;

use jiff::Timestamp;
use thiserror::Error;

/// Sentinel for a half that the caller asked the server to generate.
pub const AUTO: u64 = u64::MAX;

#[derive(Error, Debug, PartialEq)]
pub enum EntryIdError {
    #[error("invalid entry ID format")]
    InvalidFormat,
    #[error("entry ID is equal or smaller than the stream top item")]
    NotMonotonic,
}

/// A stream entry identifier: a millisecond timestamp plus a sequence number,
/// rendered as `<ms>-<seq>`. Ordering is lexicographic on `(ms, seq)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId {
    pub ms: u64,
    pub seq: u64,
}

impl EntryId {
    /// The never-stored `0-0` id, used as the tail sentinel of an empty
    /// stream.
    pub const ZERO: EntryId = EntryId { ms: 0, seq: 0 };

    pub fn new(ms: u64, seq: u64) -> Self {
        EntryId { ms, seq }
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

/// Parses an entry id in any of its input forms:
///
/// - `*` — both halves auto-generated, `(AUTO, AUTO)`
/// - `<ms>` — `(ms, 0)`, except bare `0` which means `(0, 1)` since `0-0` is
///   never a valid id
/// - `<ms>-*` — sequence auto-generated, `(ms, AUTO)`
/// - `<ms>-<seq>` — taken literally
pub fn parse(input: &str) -> Result<EntryId, EntryIdError> {
    if input == "*" {
        return Ok(EntryId::new(AUTO, AUTO));
    }

    let parts = input.split('-').collect::<Vec<&str>>();

    match parts.as_slice() {
        [ms] => {
            let ms = ms.parse::<u64>().map_err(|_| EntryIdError::InvalidFormat)?;
            if ms == 0 {
                Ok(EntryId::new(0, 1))
            } else {
                Ok(EntryId::new(ms, 0))
            }
        }
        [ms, seq] => {
            let ms = ms.parse::<u64>().map_err(|_| EntryIdError::InvalidFormat)?;
            if *seq == "*" {
                Ok(EntryId::new(ms, AUTO))
            } else {
                let seq = seq.parse::<u64>().map_err(|_| EntryIdError::InvalidFormat)?;
                Ok(EntryId::new(ms, seq))
            }
        }
        _ => Err(EntryIdError::InvalidFormat),
    }
}

/// Accepts `current` as the next id after `previous`. The first entry of a
/// stream is always accepted; after that ids must strictly increase under
/// `(ms, seq)` ordering.
pub fn validate(previous: Option<EntryId>, current: EntryId) -> Result<(), EntryIdError> {
    let Some(previous) = previous else {
        return Ok(());
    };

    if current.ms < previous.ms || (current.ms == previous.ms && current.seq <= previous.seq) {
        return Err(EntryIdError::NotMonotonic);
    }

    Ok(())
}

/// Resolves the `AUTO` halves of a requested id against the stream's last
/// stored id. Fully explicit ids pass through unchanged.
pub fn auto_fill(previous: Option<EntryId>, current: EntryId) -> EntryId {
    if current.ms == AUTO && current.seq == AUTO {
        return EntryId::new(now_unix_ms(), 0);
    }

    if current.ms == 0 && current.seq == AUTO {
        return EntryId::new(0, 1);
    }

    match previous {
        None if current.seq == AUTO => EntryId::new(current.ms, 0),
        Some(previous) if current.ms == previous.ms && current.seq == AUTO => {
            EntryId::new(current.ms, previous.seq + 1)
        }
        Some(previous) if current.ms > previous.ms && current.seq == AUTO => {
            EntryId::new(current.ms, 0)
        }
        _ => current,
    }
}

fn now_unix_ms() -> u64 {
    Timestamp::now().as_millisecond() as u64
}

#[cfg(test)]
mod tests {
    use super::{AUTO, EntryId, EntryIdError, auto_fill, now_unix_ms, parse, validate};

    #[test]
    fn test_parse() {
        let test_cases = vec![
            ("*", Ok(EntryId::new(AUTO, AUTO))),
            ("5", Ok(EntryId::new(5, 0))),
            ("0", Ok(EntryId::new(0, 1))),
            ("1526919030474", Ok(EntryId::new(1526919030474, 0))),
            ("5-*", Ok(EntryId::new(5, AUTO))),
            ("0-*", Ok(EntryId::new(0, AUTO))),
            ("5-3", Ok(EntryId::new(5, 3))),
            ("0-0", Ok(EntryId::new(0, 0))),
            ("1526919030474-12", Ok(EntryId::new(1526919030474, 12))),
            ("abc", Err(EntryIdError::InvalidFormat)),
            ("5-abc", Err(EntryIdError::InvalidFormat)),
            ("abc-5", Err(EntryIdError::InvalidFormat)),
            ("1-2-3", Err(EntryIdError::InvalidFormat)),
            ("", Err(EntryIdError::InvalidFormat)),
            ("-5", Err(EntryIdError::InvalidFormat)),
        ];

        for (input, expected) in test_cases {
            assert_eq!(parse(input), expected, "parsing {:?}", input);
        }
    }

    #[test]
    fn test_display_round_trips() {
        let id = EntryId::new(1526919030474, 7);
        assert_eq!(parse(&id.to_string()), Ok(id));
        assert_eq!(EntryId::ZERO.to_string(), "0-0");
    }

    #[test]
    fn test_validate() {
        let test_cases = vec![
            (None, EntryId::new(1, 1), Ok(())),
            (None, EntryId::new(0, 1), Ok(())),
            (
                Some(EntryId::new(5, 3)),
                EntryId::new(5, 3),
                Err(EntryIdError::NotMonotonic),
            ),
            (Some(EntryId::new(5, 3)), EntryId::new(5, 4), Ok(())),
            (Some(EntryId::new(5, 3)), EntryId::new(6, 0), Ok(())),
            (
                Some(EntryId::new(5, 3)),
                EntryId::new(5, 2),
                Err(EntryIdError::NotMonotonic),
            ),
            (
                Some(EntryId::new(5, 3)),
                EntryId::new(4, 9),
                Err(EntryIdError::NotMonotonic),
            ),
        ];

        for (previous, current, expected) in test_cases {
            assert_eq!(
                validate(previous, current),
                expected,
                "validating {:?} after {:?}",
                current,
                previous
            );
        }
    }

    #[test]
    fn test_auto_fill() {
        let test_cases = vec![
            // 0-* always resolves to 0-1
            (None, EntryId::new(0, AUTO), EntryId::new(0, 1)),
            (
                Some(EntryId::new(0, 0)),
                EntryId::new(0, AUTO),
                EntryId::new(0, 1),
            ),
            // first entry with an explicit timestamp
            (None, EntryId::new(5, AUTO), EntryId::new(5, 0)),
            // same timestamp continues the sequence
            (
                Some(EntryId::new(5, 3)),
                EntryId::new(5, AUTO),
                EntryId::new(5, 4),
            ),
            // newer timestamp restarts the sequence
            (
                Some(EntryId::new(5, 3)),
                EntryId::new(7, AUTO),
                EntryId::new(7, 0),
            ),
            // explicit ids pass through untouched
            (
                Some(EntryId::new(5, 3)),
                EntryId::new(5, 9),
                EntryId::new(5, 9),
            ),
            (None, EntryId::new(4, 2), EntryId::new(4, 2)),
            // an older timestamp with an auto sequence is left for validate
            // to reject
            (
                Some(EntryId::new(5, 3)),
                EntryId::new(3, AUTO),
                EntryId::new(3, AUTO),
            ),
        ];

        for (previous, current, expected) in test_cases {
            assert_eq!(
                auto_fill(previous, current),
                expected,
                "filling {:?} after {:?}",
                current,
                previous
            );
        }
    }

    #[test]
    fn test_auto_fill_wildcard_uses_wall_clock() {
        let before = now_unix_ms();
        let filled = auto_fill(None, EntryId::new(AUTO, AUTO));
        let after = now_unix_ms();

        assert!(filled.ms >= before && filled.ms <= after);
        assert_eq!(filled.seq, 0);
    }
}
