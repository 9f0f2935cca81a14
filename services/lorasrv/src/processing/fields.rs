//! Field mapping table
//!
//! Built once from configuration at startup and shared read-only afterwards.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{LoraSrvError, Result};

/// Mapping and validation rule for one wire field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Key as sent by the node (e.g. `Temp`)
    pub raw: String,
    /// Name the value is stored under (e.g. `temperature_C`)
    pub name: String,
    /// Inclusive lower bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Inclusive upper bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Reject frames that do not carry this field
    #[serde(default)]
    pub required: bool,
}

impl FieldSpec {
    pub fn new(raw: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            name: name.into(),
            min: None,
            max: None,
            required: false,
        }
    }

    #[must_use]
    pub fn with_bounds(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// True when at least one bound is configured
    pub fn has_bounds(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }
}

/// Validated raw-name lookup over the configured field specs
#[derive(Debug, Clone, Default)]
pub struct FieldTable {
    specs: Vec<FieldSpec>,
    by_raw: HashMap<String, usize>,
}

impl FieldTable {
    /// Build the table, rejecting ambiguous or impossible rules
    pub fn new(specs: Vec<FieldSpec>) -> Result<Self> {
        let mut by_raw = HashMap::with_capacity(specs.len());
        let mut mapped_names = HashSet::with_capacity(specs.len());

        for (idx, spec) in specs.iter().enumerate() {
            let raw = spec.raw.trim();
            let name = spec.name.trim();

            if raw.is_empty() || name.is_empty() {
                return Err(LoraSrvError::FieldTable(format!(
                    "field #{} has an empty raw or mapped name",
                    idx + 1
                )));
            }
            if raw != spec.raw || name != spec.name {
                return Err(LoraSrvError::FieldTable(format!(
                    "field '{}' has surrounding whitespace in its names",
                    spec.raw
                )));
            }
            if raw.eq_ignore_ascii_case("ID") {
                return Err(LoraSrvError::FieldTable(
                    "'ID' is reserved for the device identifier".to_string(),
                ));
            }
            if by_raw.insert(raw.to_string(), idx).is_some() {
                return Err(LoraSrvError::FieldTable(format!(
                    "duplicate raw field '{}'",
                    raw
                )));
            }
            if !mapped_names.insert(name) {
                return Err(LoraSrvError::FieldTable(format!(
                    "duplicate mapped name '{}'",
                    name
                )));
            }

            for bound in [spec.min, spec.max].into_iter().flatten() {
                if !bound.is_finite() {
                    return Err(LoraSrvError::FieldTable(format!(
                        "field '{}' has a non-finite bound",
                        raw
                    )));
                }
            }
            if let (Some(min), Some(max)) = (spec.min, spec.max) {
                if min > max {
                    return Err(LoraSrvError::FieldTable(format!(
                        "field '{}' has min {} greater than max {}",
                        raw, min, max
                    )));
                }
            }
        }

        Ok(Self { specs, by_raw })
    }

    /// Look up the spec for a wire key
    pub fn get(&self, raw: &str) -> Option<&FieldSpec> {
        self.by_raw.get(raw).map(|&idx| &self.specs[idx])
    }

    /// Specs in configuration order
    pub fn iter(&self) -> impl Iterator<Item = &FieldSpec> {
        self.specs.iter()
    }

    /// Specs that every frame must carry
    pub fn required(&self) -> impl Iterator<Item = &FieldSpec> {
        self.specs.iter().filter(|spec| spec.required)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
