//! String key-value store with millisecond expiry and lazy eviction.

use std::collections::HashMap;

use jiff::Timestamp;

#[derive(Debug, Clone, PartialEq)]
pub struct KvRecord {
    pub value: String,
    /// Absolute expiry deadline in unix milliseconds; `None` means the record
    /// never expires.
    pub expires_at_unix_ms: Option<i64>,
}

/// No background sweeper runs: expired records are removed the first time a
/// read observes them past their deadline.
#[derive(Debug, Default)]
pub struct KeyValueStore {
    records: HashMap<String, KvRecord>,
}

impl KeyValueStore {
    pub fn new() -> Self {
        KeyValueStore {
            records: HashMap::new(),
        }
    }

    /// Stores `value` under `key`, overwriting any previous record. An
    /// `expire_ms` of zero or less means no expiry.
    pub fn set(&mut self, key: String, value: String, expire_ms: i64) {
        let expires_at_unix_ms = (expire_ms > 0).then(|| now_unix_ms() + expire_ms);

        self.records.insert(
            key,
            KvRecord {
                value,
                expires_at_unix_ms,
            },
        );
    }

    /// Inserts a record with a precomputed deadline, used by the snapshot
    /// loader.
    pub fn insert_record(&mut self, key: String, record: KvRecord) {
        self.records.insert(key, record);
    }

    /// Returns the live value for `key`. A read past the deadline removes the
    /// record and reports absence.
    pub fn get(&mut self, key: &str) -> Option<String> {
        let expired = match self.records.get(key) {
            Some(record) => record
                .expires_at_unix_ms
                .is_some_and(|deadline| now_unix_ms() > deadline),
            None => return None,
        };

        if expired {
            self.records.remove(key);
            return None;
        }

        self.records.get(key).map(|record| record.value.clone())
    }

    /// All non-expired keys, in unspecified order. Expired records found on
    /// the way out are dropped.
    pub fn keys(&mut self) -> Vec<String> {
        let now = now_unix_ms();
        self.records
            .retain(|_, record| record.expires_at_unix_ms.map_or(true, |deadline| now <= deadline));

        self.records.keys().cloned().collect()
    }

    pub fn contains(&mut self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

fn now_unix_ms() -> i64 {
    Timestamp::now().as_millisecond()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{KeyValueStore, KvRecord, now_unix_ms};

    #[test]
    fn test_set_and_get() {
        let mut store = KeyValueStore::new();

        store.set("mango".to_string(), "raspberry".to_string(), 0);

        assert_eq!(store.get("mango"), Some("raspberry".to_string()));
        assert_eq!(store.get("missing"), None);
    }

    #[test]
    fn test_set_overwrites() {
        let mut store = KeyValueStore::new();

        store.set("fruit".to_string(), "apple".to_string(), 0);
        store.set("fruit".to_string(), "pear".to_string(), 0);

        assert_eq!(store.get("fruit"), Some("pear".to_string()));
    }

    #[test]
    fn test_non_positive_expiry_means_never() {
        let mut store = KeyValueStore::new();

        store.set("a".to_string(), "1".to_string(), 0);
        store.set("b".to_string(), "2".to_string(), -100);

        assert_eq!(store.get("a"), Some("1".to_string()));
        assert_eq!(store.get("b"), Some("2".to_string()));
    }

    #[tokio::test]
    async fn test_expired_read_evicts() {
        let mut store = KeyValueStore::new();

        store.set("mango".to_string(), "raspberry".to_string(), 30);
        assert_eq!(store.get("mango"), Some("raspberry".to_string()));

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(store.get("mango"), None);
        // the record was removed, not just hidden
        assert_eq!(store.keys(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_keys_skips_expired() {
        let mut store = KeyValueStore::new();

        store.set("keeper".to_string(), "1".to_string(), 0);
        store.set("goner".to_string(), "2".to_string(), 10);

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(store.keys(), vec!["keeper".to_string()]);
    }

    #[test]
    fn test_insert_record_with_past_deadline_reads_absent() {
        let mut store = KeyValueStore::new();

        store.insert_record(
            "stale".to_string(),
            KvRecord {
                value: "x".to_string(),
                expires_at_unix_ms: Some(now_unix_ms() - 1000),
            },
        );

        assert_eq!(store.get("stale"), None);
    }
}
