//! List filters and attribute projection for digital identity reads.

use serde_json::{Map, Value};

use crate::digital_identity::{DigitalIdentity, IdentityStatus};
use crate::error::CoreError;

/// Attributes always present in a projected record.
const ALWAYS_INCLUDED: [&str; 2] = ["id", "href"];

// ---------------------------------------------------------------------------
// ListFilter
// ---------------------------------------------------------------------------

/// Criteria a record must meet to appear in a list response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListFilter {
    pub status: Option<IdentityStatus>,
    /// Matches when any credential carries this trust level.
    pub trust_level: Option<String>,
}

impl ListFilter {
    /// Build a filter from raw query-string values.
    pub fn parse(status: Option<&str>, trust_level: Option<&str>) -> Result<Self, CoreError> {
        let status = status
            .filter(|s| !s.is_empty())
            .map(IdentityStatus::from_str)
            .transpose()?;
        let trust_level = trust_level
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Ok(Self { status, trust_level })
    }

    pub fn matches(&self, record: &DigitalIdentity) -> bool {
        if let Some(status) = self.status {
            if record.status != status {
                return false;
            }
        }
        if let Some(level) = &self.trust_level {
            if !record.has_trust_level(level) {
                return false;
            }
        }
        true
    }
}

// ---------------------------------------------------------------------------
// FieldSelection
// ---------------------------------------------------------------------------

/// A `fields=a,b,c` projection. `None` keeps every attribute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSelection(Option<Vec<String>>);

impl FieldSelection {
    pub fn parse(fields: Option<&str>) -> Self {
        let selected: Vec<String> = fields
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if selected.is_empty() {
            Self(None)
        } else {
            Self(Some(selected))
        }
    }

    /// Reduce a serialized record to the selected top-level attributes.
    pub fn project(&self, record: Value) -> Value {
        let Some(selected) = &self.0 else {
            return record;
        };
        let Value::Object(map) = record else {
            return record;
        };

        let projected: Map<String, Value> = map
            .into_iter()
            .filter(|(k, _)| {
                ALWAYS_INCLUDED.contains(&k.as_str()) || selected.iter().any(|s| s == k)
            })
            .collect();
        Value::Object(projected)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
