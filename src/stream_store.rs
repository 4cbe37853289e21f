//! Append-only stream store keyed by stream name.

use std::collections::HashMap;

use crate::entry_id::{self, EntryId, EntryIdError};

#[derive(Debug, Clone, PartialEq)]
pub struct StreamEntry {
    pub id: EntryId,
    /// Field pairs in insertion order, names not deduplicated.
    pub fields: Vec<(String, String)>,
}

#[derive(Debug, Default)]
pub struct StreamStore {
    streams: HashMap<String, Vec<StreamEntry>>,
}

impl StreamStore {
    pub fn new() -> Self {
        StreamStore {
            streams: HashMap::new(),
        }
    }

    /// Appends an entry under `stream`, resolving auto-generated id halves
    /// against the stream's last stored id and enforcing strict monotonicity.
    /// Returns the id actually stored.
    pub fn add(
        &mut self,
        stream: &str,
        requested_id: &str,
        fields: Vec<(String, String)>,
    ) -> Result<EntryId, EntryIdError> {
        let requested = entry_id::parse(requested_id)?;

        let previous = self
            .streams
            .get(stream)
            .and_then(|entries| entries.last())
            .map(|entry| entry.id);

        let id = entry_id::auto_fill(previous, requested);
        entry_id::validate(previous, id)?;

        self.streams
            .entry(stream.to_string())
            .or_default()
            .push(StreamEntry { id, fields });

        Ok(id)
    }

    /// Entries with ids in `[lo, hi]` inclusive, in storage order. `-` is the
    /// lowest possible id and `+` is above any real id.
    pub fn range(
        &self,
        stream: &str,
        lo: &str,
        hi: &str,
    ) -> Result<Vec<&StreamEntry>, EntryIdError> {
        let lo = match lo {
            "-" => EntryId::new(0, 1),
            other => entry_id::parse(other)?,
        };
        let hi = match hi {
            "+" => EntryId::new(u64::MAX, u64::MAX),
            other => entry_id::parse(other)?,
        };

        Ok(self
            .streams
            .get(stream)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|entry| entry.id >= lo && entry.id <= hi)
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Entries with ids strictly greater than `after`, in storage order.
    pub fn read_after(&self, stream: &str, after: EntryId) -> Vec<&StreamEntry> {
        self.streams
            .get(stream)
            .map(|entries| entries.iter().filter(|entry| entry.id > after).collect())
            .unwrap_or_default()
    }

    /// The id of the last stored entry, or `0-0` for an empty or missing
    /// stream.
    pub fn tail_id(&self, stream: &str) -> EntryId {
        self.streams
            .get(stream)
            .and_then(|entries| entries.last())
            .map(|entry| entry.id)
            .unwrap_or(EntryId::ZERO)
    }

    pub fn contains(&self, stream: &str) -> bool {
        self.streams.contains_key(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::StreamStore;
    use crate::entry_id::{EntryId, EntryIdError};

    fn fields() -> Vec<(String, String)> {
        vec![("foo".to_string(), "bar".to_string())]
    }

    #[test]
    fn test_add_auto_sequence() {
        let mut store = StreamStore::new();

        assert_eq!(
            store.add("strawberry", "0-*", fields()),
            Ok(EntryId::new(0, 1))
        );
        assert_eq!(
            store.add("strawberry", "1-*", fields()),
            Ok(EntryId::new(1, 0))
        );
        assert_eq!(
            store.add("strawberry", "1-*", fields()),
            Ok(EntryId::new(1, 1))
        );
    }

    #[test]
    fn test_add_rejects_non_monotonic_ids() {
        let mut store = StreamStore::new();

        store.add("s", "5-3", fields()).unwrap();

        let test_cases = vec![
            ("5-3", Err(EntryIdError::NotMonotonic)),
            ("5-2", Err(EntryIdError::NotMonotonic)),
            ("4-9", Err(EntryIdError::NotMonotonic)),
            ("5-4", Ok(EntryId::new(5, 4))),
            ("6-0", Ok(EntryId::new(6, 0))),
        ];

        for (requested, expected) in test_cases {
            assert_eq!(store.add("s", requested, fields()), expected, "adding {}", requested);
        }
    }

    #[test]
    fn test_storage_order_is_strictly_increasing() {
        let mut store = StreamStore::new();

        for requested in ["1-1", "1-2", "3-*", "3-*", "10-0"] {
            store.add("s", requested, fields()).unwrap();
        }

        let ids: Vec<EntryId> = store
            .range("s", "-", "+")
            .unwrap()
            .iter()
            .map(|entry| entry.id)
            .collect();

        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn test_range_is_inclusive() {
        let mut store = StreamStore::new();

        for seq in 1..=4 {
            store.add("strawberry", &format!("0-{}", seq), fields()).unwrap();
        }

        let entries = store.range("strawberry", "0", "0-2").unwrap();
        let ids: Vec<String> = entries.iter().map(|entry| entry.id.to_string()).collect();

        assert_eq!(ids, vec!["0-1", "0-2"]);
    }

    #[test]
    fn test_range_sentinels() {
        let mut store = StreamStore::new();

        store.add("s", "1-1", fields()).unwrap();
        store.add("s", "2-1", fields()).unwrap();
        store.add("s", "3-1", fields()).unwrap();

        let all = store.range("s", "-", "+").unwrap();
        assert_eq!(all.len(), 3);

        let upper_open = store.range("s", "2-0", "+").unwrap();
        assert_eq!(upper_open.len(), 2);

        let lower_open = store.range("s", "-", "2-1").unwrap();
        assert_eq!(lower_open.len(), 2);
    }

    #[test]
    fn test_range_missing_stream_is_empty() {
        let store = StreamStore::new();

        assert_eq!(store.range("nope", "-", "+"), Ok(vec![]));
    }

    #[test]
    fn test_read_after_is_strict() {
        let mut store = StreamStore::new();

        store.add("s", "1-1", fields()).unwrap();
        store.add("s", "1-2", fields()).unwrap();
        store.add("s", "2-0", fields()).unwrap();

        let after = store.read_after("s", EntryId::new(1, 1));
        let ids: Vec<String> = after.iter().map(|entry| entry.id.to_string()).collect();

        assert_eq!(ids, vec!["1-2", "2-0"]);
        assert!(store.read_after("s", EntryId::new(2, 0)).is_empty());
    }

    #[test]
    fn test_tail_id() {
        let mut store = StreamStore::new();

        assert_eq!(store.tail_id("s"), EntryId::ZERO);

        store.add("s", "4-7", fields()).unwrap();
        assert_eq!(store.tail_id("s"), EntryId::new(4, 7));
    }
}
