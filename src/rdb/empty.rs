use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// The fixed empty snapshot a primary serves in response to PSYNC. The RDB
/// writer is out of scope, so this is the only snapshot the server ever
/// produces.
const EMPTY_SNAPSHOT_BASE64: &str = "UkVESVMwMDEx+glyZWRpcy12ZXIFNy4yLjD6CnJlZGlzLWJpdHPAQPoFY3RpbWXCbQi8ZfoIdXNlZC1tZW3CsMQQAPoIYW9mLWJhc2XAAP/wbjv+wP9aog==";

pub fn empty_snapshot() -> Vec<u8> {
    STANDARD
        .decode(EMPTY_SNAPSHOT_BASE64)
        .expect("embedded snapshot constant decodes")
}

#[cfg(test)]
mod tests {
    use super::empty_snapshot;

    #[test]
    fn test_empty_snapshot_shape() {
        let snapshot = empty_snapshot();

        assert_eq!(snapshot.len(), 88);
        assert!(snapshot.starts_with(b"REDIS0011"));
    }
}
