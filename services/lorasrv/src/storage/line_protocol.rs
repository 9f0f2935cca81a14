//! InfluxDB line protocol builder

use crate::storage::traits::Point;

/// Line protocol builder for float-valued points
#[derive(Debug)]
pub struct LineProtocolBuilder {
    measurement: String,
    tags: Vec<(String, String)>,
    fields: Vec<(String, f64)>,
    timestamp: Option<i64>,
}

impl LineProtocolBuilder {
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: Vec::new(),
            fields: Vec::new(),
            timestamp: None,
        }
    }

    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn field(mut self, key: impl Into<String>, value: f64) -> Self {
        self.fields.push((key.into(), value));
        self
    }

    /// Timestamp in nanoseconds
    #[must_use]
    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Render one line; `None` when no fields were added
    pub fn build(self) -> Option<String> {
        if self.fields.is_empty() {
            return None;
        }

        let mut result = escape_measurement(&self.measurement);

        for (key, value) in &self.tags {
            result.push(',');
            result.push_str(&escape_key(key));
            result.push('=');
            result.push_str(&escape_key(value));
        }

        let mut buffer = ryu::Buffer::new();
        for (idx, (key, value)) in self.fields.iter().enumerate() {
            result.push(if idx == 0 { ' ' } else { ',' });
            result.push_str(&escape_key(key));
            result.push('=');
            result.push_str(buffer.format(*value));
        }

        if let Some(ts) = self.timestamp {
            result.push(' ');
            result.push_str(&ts.to_string());
        }

        Some(result)
    }
}

/// Render a point with a nanosecond timestamp
pub fn point_to_line(point: &Point) -> Option<String> {
    let mut builder = LineProtocolBuilder::new(point.measurement.as_str());
    for (key, value) in &point.tags {
        builder = builder.tag(key.as_str(), value.as_str());
    }
    for (key, value) in &point.fields {
        builder = builder.field(key.as_str(), *value);
    }
    if let Some(ns) = point.timestamp.timestamp_nanos_opt() {
        builder = builder.timestamp(ns);
    }
    builder.build()
}

fn escape_measurement(s: &str) -> String {
    s.replace(',', "\\,").replace(' ', "\\ ")
}

// tag keys, tag values and field keys share the same rules
fn escape_key(s: &str) -> String {
    s.replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}
