//! Validated sensor readings

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::RejectionReason;
use crate::processing::fields::FieldTable;
use crate::processing::parser::ParsedFrame;
use crate::processing::validator::validate;

/// Timestamp format used in the append-only log
pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// One fully validated reading; only `ReadingBuilder` can create it
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    device_id: String,
    timestamp: DateTime<Utc>,
    fields: Vec<(String, f64)>,
}

impl Reading {
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Mapped fields in wire order
    pub fn fields(&self) -> &[(String, f64)] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// Render as `[timestamp] ID:<device>, name:value, ...`
    pub fn to_log_line(&self) -> String {
        let mut line = format!(
            "[{}] ID:{}",
            self.timestamp.format(LOG_TIMESTAMP_FORMAT),
            self.device_id
        );
        let mut buffer = ryu::Buffer::new();
        for (name, value) in &self.fields {
            line.push_str(", ");
            line.push_str(name);
            line.push(':');
            line.push_str(buffer.format_finite(*value));
        }
        line
    }

    /// Field statistics for the per-message log line
    pub fn summary(&self) -> ReadingSummary {
        ReadingSummary {
            device_id: self.device_id.clone(),
            field_count: self.fields.len(),
            field_names: self.fields.iter().map(|(n, _)| n.clone()).collect(),
        }
    }
}

/// Statistics about one reading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingSummary {
    pub device_id: String,
    pub field_count: usize,
    pub field_names: Vec<String>,
}

impl std::fmt::Display for ReadingSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} fields [{}]",
            self.device_id,
            self.field_count,
            self.field_names.join(", ")
        )
    }
}

/// Maps and validates parsed frames against the field table
#[derive(Debug, Clone)]
pub struct ReadingBuilder {
    table: Arc<FieldTable>,
}

impl ReadingBuilder {
    pub fn new(table: Arc<FieldTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &FieldTable {
        &self.table
    }

    /// Build a reading; any invalid field rejects the whole frame
    ///
    /// Keys without a field spec (and the `ID` pair) are dropped.
    pub fn build(
        &self,
        device_id: &str,
        parsed: &ParsedFrame,
        timestamp: DateTime<Utc>,
    ) -> Result<Reading, RejectionReason> {
        if let Some(missing) = self
            .table
            .required()
            .find(|spec| !parsed.contains_key(&spec.raw))
        {
            return Err(RejectionReason::MissingField {
                name: missing.raw.clone(),
            });
        }

        let fields = parsed
            .fields()
            .filter_map(|(raw, value)| self.table.get(raw).map(|spec| (raw, value, spec)))
            .map(|(raw, value, spec)| validate(raw, value, spec).map(|v| (spec.name.clone(), v)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Reading {
            device_id: device_id.to_string(),
            timestamp,
            fields,
        })
    }
}
