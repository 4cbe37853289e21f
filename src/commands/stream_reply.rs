//! Shared RESP shaping for stream entries.

use crate::resp::RespValue;
use crate::stream_store::StreamEntry;

/// Encodes entries the way XRANGE and XREAD present them: an array where each
/// entry is `[id, [field, value, field, value, ...]]`.
pub fn entries_array(entries: &[&StreamEntry]) -> RespValue {
    RespValue::Array(
        entries
            .iter()
            .map(|entry| {
                let mut fields = Vec::with_capacity(entry.fields.len() * 2);
                for (name, value) in &entry.fields {
                    fields.push(RespValue::BulkString(name.clone()));
                    fields.push(RespValue::BulkString(value.clone()));
                }

                RespValue::Array(vec![
                    RespValue::BulkString(entry.id.to_string()),
                    RespValue::Array(fields),
                ])
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::entries_array;
    use crate::entry_id::EntryId;
    use crate::stream_store::StreamEntry;

    #[test]
    fn test_entries_array_shape() {
        let entry = StreamEntry {
            id: EntryId::new(1526919030474, 0),
            fields: vec![("temperature".to_string(), "36".to_string())],
        };

        assert_eq!(
            entries_array(&[&entry]).encode(),
            "*1\r\n*2\r\n$15\r\n1526919030474-0\r\n*2\r\n$11\r\ntemperature\r\n$2\r\n36\r\n"
        );
    }

    #[test]
    fn test_fields_keep_insertion_order() {
        let entry = StreamEntry {
            id: EntryId::new(1, 1),
            fields: vec![
                ("zebra".to_string(), "1".to_string()),
                ("apple".to_string(), "2".to_string()),
                ("zebra".to_string(), "3".to_string()),
            ],
        };

        assert_eq!(
            entries_array(&[&entry]).encode(),
            "*1\r\n*2\r\n$3\r\n1-1\r\n*6\r\n$5\r\nzebra\r\n$1\r\n1\r\n$5\r\napple\r\n$1\r\n2\r\n$5\r\nzebra\r\n$1\r\n3\r\n"
        );
    }

    #[test]
    fn test_empty() {
        assert_eq!(entries_array(&[]).encode(), "*0\r\n");
    }
}
