// ── Counter snapshot decoding ──
//
// The feed's `data` field carries `{ "app": { "<id>": { "count": n } } }`.
// Only the entries of tracked ids are read; everything else in the payload,
// whatever its shape, is ignored.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::CoreError;

#[derive(Debug, Deserialize)]
struct Payload {
    app: HashMap<String, Value>,
}

/// Point-in-time counts of the tracked entities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    counts: HashMap<String, u64>,
}

impl CounterSnapshot {
    /// Decode a frame's `data` field, keeping the counts of `tracked` ids.
    ///
    /// Fails with [`CoreError::MalformedPayload`] when the text is not JSON,
    /// lacks the `app` object, or a tracked entry is not an object whose
    /// `count` is a non-negative integer. A tracked entry without `count`
    /// (or with `null`) counts as 0. Untracked entries are never inspected.
    pub fn decode<'a>(
        data: &str,
        tracked: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, CoreError> {
        let malformed = |reason: String| CoreError::MalformedPayload {
            reason,
            payload: data.to_owned(),
        };

        let payload: Payload = serde_json::from_str(data).map_err(|e| malformed(e.to_string()))?;

        let mut counts = HashMap::new();
        for id in tracked {
            let Some(entry) = payload.app.get(id) else {
                continue;
            };
            let count = entry_count(entry)
                .map_err(|reason| malformed(format!("app.{id}: {reason}")))?;
            counts.insert(id.to_owned(), count);
        }

        Ok(Self { counts })
    }

    /// Count for `id`, 0 when the snapshot does not mention it.
    pub fn count(&self, id: &str) -> u64 {
        self.counts.get(id).copied().unwrap_or(0)
    }
}

fn entry_count(entry: &Value) -> Result<u64, String> {
    let Value::Object(fields) = entry else {
        return Err(format!("expected an object, got {entry}"));
    };
    match fields.get("count") {
        None | Some(Value::Null) => Ok(0),
        Some(count) => count
            .as_u64()
            .ok_or_else(|| format!("count {count} is not a non-negative integer")),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const TRACKED: [&str; 3] = ["a", "b", "c"];

    #[test]
    fn decodes_counts_and_defaults_missing_to_zero() {
        let snap = CounterSnapshot::decode(
            r#"{"app":{"a":{"count":3},"b":{"count":null},"c":{"name":"x"}},"ts":1}"#,
            TRACKED,
        )
        .unwrap();

        assert_eq!(snap.count("a"), 3);
        assert_eq!(snap.count("b"), 0);
        assert_eq!(snap.count("c"), 0);
        assert_eq!(snap.count("unknown"), 0);
    }

    #[test]
    fn empty_app_object_is_a_valid_snapshot() {
        let snap = CounterSnapshot::decode(r#"{"app":{}}"#, TRACKED).unwrap();
        assert_eq!(snap, CounterSnapshot::default());
    }

    #[test]
    fn untracked_entries_of_any_shape_are_ignored() {
        let snap = CounterSnapshot::decode(
            r#"{"app":{"a":{"count":3},"zz":7,"yy":{"count":-4},"xx":{"count":"many"}}}"#,
            TRACKED,
        )
        .unwrap();

        assert_eq!(snap.count("a"), 3);
        assert_eq!(snap.count("zz"), 0);
    }

    #[test]
    fn invalid_json_is_malformed() {
        let err = CounterSnapshot::decode("{not json", TRACKED).unwrap_err();
        match err {
            CoreError::MalformedPayload { payload, .. } => assert_eq!(payload, "{not json"),
            other => panic!("expected MalformedPayload, got {other:?}"),
        }
    }

    #[test]
    fn missing_app_object_is_malformed() {
        assert!(matches!(
            CounterSnapshot::decode(r#"{"apps":{}}"#, TRACKED),
            Err(CoreError::MalformedPayload { .. })
        ));
        assert!(matches!(
            CounterSnapshot::decode("[1,2,3]", TRACKED),
            Err(CoreError::MalformedPayload { .. })
        ));
    }

    #[test]
    fn tracked_entry_with_bad_count_is_malformed() {
        assert!(CounterSnapshot::decode(r#"{"app":{"a":{"count":-1}}}"#, TRACKED).is_err());
        assert!(CounterSnapshot::decode(r#"{"app":{"a":{"count":1.5}}}"#, TRACKED).is_err());

        let err = CounterSnapshot::decode(r#"{"app":{"a":7}}"#, TRACKED).unwrap_err();
        let CoreError::MalformedPayload { reason, .. } = err else {
            panic!("expected MalformedPayload");
        };
        assert!(reason.starts_with("app.a:"), "{reason}");
    }
}
