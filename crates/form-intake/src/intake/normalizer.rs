use chrono::{DateTime, Utc};
use rand::Rng;
use serde_json::{Map, Value};

use super::domain::{Record, RecordId, SubmissionKind};

const SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 9;

/// Mint `{PREFIX}_{epochMillis}_{suffix}`. Unique with overwhelming probability only.
pub fn mint_id(prefix: &str, now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect();
    format!("{prefix}_{}_{suffix}", now.timestamp_millis())
}

/// Wrap an inbound body into a pending record. Never fails: no business validation here.
pub fn normalize(kind: SubmissionKind, body: Value) -> Record {
    normalize_at(kind, body, Utc::now())
}

pub fn normalize_at(kind: SubmissionKind, body: Value, now: DateTime<Utc>) -> Record {
    let payload = match body {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    };

    Record {
        id: RecordId(mint_id(kind.id_prefix(), now)),
        kind,
        timestamp: now,
        source: kind.source_tag().to_string(),
        processed: false,
        processed_at: None,
        payload,
    }
}
