//! Sensor frame parser
//!
//! Wire format: comma-separated `key:value` pairs, one of which is
//! `ID:<deviceId>`, e.g. `ID:Device5, Max_A:2.50, Temp:25.5, Humidity:65.0`.

use std::collections::HashSet;

use crate::error::ParseError;

/// Key carrying the device identifier
pub const ID_KEY: &str = "ID";

/// One parsed frame; pairs are kept in wire order, `ID` included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFrame {
    pairs: Vec<(String, String)>,
}

impl ParsedFrame {
    /// Value of the `ID` pair
    pub fn device_id(&self) -> &str {
        // parse() guarantees the ID pair exists
        self.get(ID_KEY).unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// All pairs in wire order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Pairs other than `ID`
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter(|(k, _)| *k != ID_KEY)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Parse one raw frame
pub fn parse(raw_frame: &str) -> Result<ParsedFrame, ParseError> {
    let body = raw_frame.trim();
    if body.is_empty() {
        return Err(ParseError::malformed(raw_frame, "empty frame"));
    }

    let mut pairs = Vec::new();
    let mut seen = HashSet::new();

    for segment in body.split(',') {
        let (key, value) = segment.split_once(':').ok_or_else(|| {
            ParseError::malformed(raw_frame, format!("segment {:?} has no ':'", segment.trim()))
        })?;
        let key = key.trim();
        let value = value.trim();

        if key.is_empty() {
            return Err(ParseError::malformed(
                raw_frame,
                format!("segment {:?} has an empty key", segment.trim()),
            ));
        }
        if !seen.insert(key) {
            return Err(ParseError::malformed(
                raw_frame,
                format!("duplicate key {:?}", key),
            ));
        }

        pairs.push((key.to_string(), value.to_string()));
    }

    match pairs.iter().find(|(k, _)| k == ID_KEY) {
        None => Err(ParseError::malformed(raw_frame, "missing ID pair")),
        Some((_, id)) if id.is_empty() => Err(ParseError::malformed(raw_frame, "empty device ID")),
        Some(_) => Ok(ParsedFrame { pairs }),
    }
}
