//! Shareable navigation address.
//!
//! A compact `key=value&...` string (form-urlencoded) holding the part of the
//! navigation state that survives restarts and can be handed to a colleague:
//!
//! ```text
//! tab=pgs&view=time&filter=vacuum&timestamp=1739000000
//! ```
//!
//! Keys at their default value are omitted, so the empty string is the
//! default address. Decoding is total: unknown keys, unknown tabs and
//! malformed numbers are ignored.

use std::fmt;

use crate::model::CollectionKey;

/// Key the timestamp is written under. `pos` is the older spelling; an
/// address that used it keeps it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimestampKey {
    #[default]
    Timestamp,
    Pos,
}

impl TimestampKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimestampKey::Timestamp => "timestamp",
            TimestampKey::Pos => "pos",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavAddress {
    pub tab: CollectionKey,
    pub view: Option<String>,
    pub filter: Option<String>,
    /// Paused (live) or current (history) snapshot timestamp.
    pub timestamp: Option<i64>,
    pub timestamp_key: TimestampKey,
}

impl NavAddress {
    pub fn new(tab: CollectionKey) -> Self {
        Self {
            tab,
            ..Default::default()
        }
    }

    pub fn decode(input: &str) -> Self {
        let mut addr = NavAddress::default();
        let input = input.trim();
        let input = input.strip_prefix('?').unwrap_or(input);

        for (key, value) in form_urlencoded::parse(input.as_bytes()) {
            match key.as_ref() {
                "tab" => {
                    // An unknown tab is treated as absent.
                    addr.tab = CollectionKey::parse(&value).unwrap_or_default();
                }
                "view" => addr.view = non_empty(&value),
                "filter" => addr.filter = non_empty(&value),
                "timestamp" | "pos" => {
                    addr.timestamp = value.parse::<i64>().ok().filter(|ts| *ts != 0);
                    addr.timestamp_key = if key == "pos" {
                        TimestampKey::Pos
                    } else {
                        TimestampKey::Timestamp
                    };
                }
                _ => {}
            }
        }
        addr
    }

    /// Canonical encoding: keys in `tab, view, filter, timestamp` order,
    /// defaults omitted.
    pub fn encode(&self) -> String {
        let mut out = form_urlencoded::Serializer::new(String::new());
        if self.tab != CollectionKey::default() {
            out.append_pair("tab", self.tab.as_str());
        }
        if let Some(view) = self.view.as_deref().filter(|v| !v.is_empty()) {
            out.append_pair("view", view);
        }
        if let Some(filter) = self.filter.as_deref().filter(|f| !f.is_empty()) {
            out.append_pair("filter", filter);
        }
        if let Some(ts) = self.timestamp.filter(|ts| *ts != 0) {
            out.append_pair(self.timestamp_key.as_str(), &ts.to_string());
        }
        out.finish()
    }

    pub fn is_default(&self) -> bool {
        self.encode().is_empty()
    }
}

impl fmt::Display for NavAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() { None } else { Some(s.to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_address_is_default() {
        let addr = NavAddress::decode("");
        assert_eq!(addr, NavAddress::default());
        assert_eq!(addr.encode(), "");
        assert!(addr.is_default());
    }

    #[test]
    fn canonical_addresses_roundtrip() {
        for addr in [
            "tab=pgs",
            "tab=pga&view=waits",
            "tab=pgt&view=io&filter=orders",
            "filter=select+now%28%29",
            "tab=pgl&timestamp=1739000000",
            "view=time&timestamp=-5",
            "tab=pge&view=errors&filter=deadlock+detected&timestamp=1001",
            "tab=pgs&filter=a*b",
            "tab=pgs&filter=%7Ehome&pos=1739000000",
        ] {
            assert_eq!(NavAddress::decode(addr).encode(), addr, "address {addr}");
        }
    }

    #[test]
    fn defaults_are_omitted() {
        let addr = NavAddress::decode("tab=prc&view=&filter=&timestamp=0");
        assert_eq!(addr, NavAddress::default());
        assert_eq!(addr.encode(), "");
    }

    #[test]
    fn keys_are_written_in_canonical_order() {
        let addr = NavAddress::decode("?timestamp=7&filter=x&view=v&tab=pgi");
        assert_eq!(addr.encode(), "tab=pgi&view=v&filter=x&timestamp=7");
    }

    #[test]
    fn pos_key_is_kept_on_reencode() {
        let addr = NavAddress::decode("tab=pga&pos=1000");
        assert_eq!(addr.timestamp, Some(1000));
        assert_eq!(addr.timestamp_key, TimestampKey::Pos);
        assert_eq!(addr.encode(), "tab=pga&pos=1000");

        let addr = NavAddress::decode("pos=5&timestamp=1000");
        assert_eq!(addr.encode(), "timestamp=1000");
    }

    #[test]
    fn unknown_and_malformed_input_is_ignored() {
        let addr = NavAddress::decode("tab=sessions&sort=cpu&timestamp=soon&&=x&view");
        assert_eq!(addr.tab, CollectionKey::Prc);
        assert_eq!(addr.timestamp, None);
        assert_eq!(addr.view, None);
    }

    #[test]
    fn percent_encoding_handles_unicode_and_reserved_characters() {
        let addr = NavAddress {
            tab: CollectionKey::Pgs,
            filter: Some("a&b=c ü%".into()),
            ..Default::default()
        };
        let encoded = addr.encode();
        assert_eq!(encoded, "tab=pgs&filter=a%26b%3Dc+%C3%BC%25");
        assert_eq!(NavAddress::decode(&encoded), addr);
        assert_eq!(NavAddress::decode("filter=a%20b").filter.as_deref(), Some("a b"));
    }

    #[test]
    fn broken_escape_is_kept_literally() {
        assert_eq!(NavAddress::decode("filter=100%").filter.as_deref(), Some("100%"));
        assert_eq!(NavAddress::decode("filter=%zz").filter.as_deref(), Some("%zz"));
    }
}
