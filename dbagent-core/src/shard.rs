//! Shard metadata carried in response headers.
//!
//! The data agent reports the shard that served a request through three
//! headers, each holding a JSON-encoded value:
//!
//! ```text
//! {prefix}shard-current
//! {prefix}shard-next
//! {prefix}shard-fields
//! ```
//!
//! Extraction is best-effort: absent or malformed headers are skipped and never
//! fail a call.

use http::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default header prefix.
pub const DEFAULT_SHARD_HEADER_PREFIX: &str = "x-acid-";

/// One of the three shard entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShardEntry {
    Current,
    Next,
    Fields,
}

impl ShardEntry {
    /// All entries, in header order.
    pub const ALL: [ShardEntry; 3] = [ShardEntry::Current, ShardEntry::Next, ShardEntry::Fields];

    /// Get the session key of this entry (e.g. `shard_current`).
    pub fn as_str(&self) -> &'static str {
        match self {
            ShardEntry::Current => "shard_current",
            ShardEntry::Next => "shard_next",
            ShardEntry::Fields => "shard_fields",
        }
    }

    /// Get the header suffix of this entry (e.g. `shard-current`).
    pub fn header_suffix(&self) -> &'static str {
        match self {
            ShardEntry::Current => "shard-current",
            ShardEntry::Next => "shard-next",
            ShardEntry::Fields => "shard-fields",
        }
    }

    /// Get the full header name for `prefix`.
    pub fn header_name(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self.header_suffix())
    }
}

/// Decoded shard metadata. Each entry is independently present or absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ShardState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard_current: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard_next: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard_fields: Option<Value>,
}

impl ShardState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the shard headers of one response.
    ///
    /// Headers that are absent, not valid UTF-8, or not valid JSON leave the
    /// corresponding entry empty.
    pub fn from_headers(headers: &HeaderMap, prefix: &str) -> Self {
        let mut state = Self::new();
        for entry in ShardEntry::ALL {
            let name = entry.header_name(prefix);
            let Some(raw) = headers.get(name.as_str()) else {
                continue;
            };
            match serde_json::from_slice::<Value>(raw.as_bytes()) {
                Ok(value) => *state.slot_mut(entry) = Some(value),
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(header = %name, error = %_e, "skipping malformed shard header");
                }
            }
        }
        state
    }

    /// Get an entry.
    pub fn get(&self, entry: ShardEntry) -> Option<&Value> {
        match entry {
            ShardEntry::Current => self.shard_current.as_ref(),
            ShardEntry::Next => self.shard_next.as_ref(),
            ShardEntry::Fields => self.shard_fields.as_ref(),
        }
    }

    /// Returns true if no entry is present.
    pub fn is_empty(&self) -> bool {
        ShardEntry::ALL.iter().all(|e| self.get(*e).is_none())
    }

    /// Overwrite entries present in `update`; entries absent from `update`
    /// keep their current value.
    pub fn merge(&mut self, update: ShardState) {
        let ShardState {
            shard_current,
            shard_next,
            shard_fields,
        } = update;
        for (entry, value) in [
            (ShardEntry::Current, shard_current),
            (ShardEntry::Next, shard_next),
            (ShardEntry::Fields, shard_fields),
        ] {
            if let Some(value) = value {
                *self.slot_mut(entry) = Some(value);
            }
        }
    }

    fn slot_mut(&mut self, entry: ShardEntry) -> &mut Option<Value> {
        match entry {
            ShardEntry::Current => &mut self.shard_current,
            ShardEntry::Next => &mut self.shard_next,
            ShardEntry::Fields => &mut self.shard_fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use serde_json::json;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_header_names() {
        assert_eq!(
            ShardEntry::Current.header_name(DEFAULT_SHARD_HEADER_PREFIX),
            "x-acid-shard-current"
        );
        assert_eq!(ShardEntry::Fields.header_name("x-db-"), "x-db-shard-fields");
    }

    #[test]
    fn test_entry_names_match_serialized_keys() {
        let state = ShardState {
            shard_current: Some(json!(1)),
            shard_next: Some(json!(2)),
            shard_fields: Some(json!(3)),
        };
        let Value::Object(map) = serde_json::to_value(&state).unwrap() else {
            panic!("state must serialize to an object");
        };

        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        let mut names: Vec<&str> = ShardEntry::ALL.iter().map(ShardEntry::as_str).collect();
        names.sort();
        assert_eq!(keys, names);
        assert_eq!(map[ShardEntry::Next.as_str()], json!(2));
    }

    #[test]
    fn test_from_headers_decodes_json() {
        let map = headers(&[
            ("x-acid-shard-current", r#"["a", 1]"#),
            ("x-acid-shard-next", r#"["b", 2]"#),
            ("x-acid-shard-fields", r#"["id"]"#),
        ]);
        let state = ShardState::from_headers(&map, DEFAULT_SHARD_HEADER_PREFIX);

        assert_eq!(state.shard_current, Some(json!(["a", 1])));
        assert_eq!(state.shard_next, Some(json!(["b", 2])));
        assert_eq!(state.shard_fields, Some(json!(["id"])));
    }

    #[test]
    fn test_from_headers_skips_absent_and_malformed() {
        let map = headers(&[
            ("x-acid-shard-current", "not json"),
            ("x-acid-shard-fields", r#"["id"]"#),
        ]);
        let state = ShardState::from_headers(&map, DEFAULT_SHARD_HEADER_PREFIX);

        assert_eq!(state.shard_current, None);
        assert_eq!(state.shard_next, None);
        assert_eq!(state.shard_fields, Some(json!(["id"])));
    }

    #[test]
    fn test_from_headers_custom_prefix() {
        let map = headers(&[("x-acid-shard-current", "1"), ("x-db-shard-current", "2")]);
        let state = ShardState::from_headers(&map, "x-db-");
        assert_eq!(state.get(ShardEntry::Current), Some(&json!(2)));
    }

    #[test]
    fn test_merge_is_last_write_wins_per_entry() {
        let mut session = ShardState::new();
        assert!(session.is_empty());

        session.merge(ShardState {
            shard_current: Some(json!(1)),
            shard_next: Some(json!(2)),
            shard_fields: None,
        });
        session.merge(ShardState {
            shard_current: Some(json!(10)),
            shard_next: None,
            shard_fields: Some(json!(["k"])),
        });

        assert_eq!(session.shard_current, Some(json!(10)));
        assert_eq!(session.shard_next, Some(json!(2)));
        assert_eq!(session.shard_fields, Some(json!(["k"])));
    }

    #[test]
    fn test_malformed_update_keeps_prior_state() {
        let mut session = ShardState::new();
        session.merge(ShardState::from_headers(
            &headers(&[("x-acid-shard-current", r#"{"shard": 1}"#)]),
            DEFAULT_SHARD_HEADER_PREFIX,
        ));
        session.merge(ShardState::from_headers(
            &headers(&[("x-acid-shard-current", "{broken")]),
            DEFAULT_SHARD_HEADER_PREFIX,
        ));

        assert_eq!(session.shard_current, Some(json!({"shard": 1})));
    }
}
