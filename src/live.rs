use crate::cost_calculator::{CostEstimate, compute_fields};
use crate::error::CalculatorError;
use crate::reading_inputs::field;
use std::collections::BTreeMap;

/// Keeps the current field snapshot and recomputes the whole estimate on every change.
///
/// There is no incremental update: each committed field triggers one complete
/// computation over the full snapshot, and the result replaces the previous one.
pub struct LiveCalculator {
    fields: BTreeMap<String, String>,
    latest: Result<CostEstimate, CalculatorError>,
}

impl LiveCalculator {
    pub fn new(fields: BTreeMap<String, String>) -> Self {
        let latest = compute_fields(&fields);
        Self { fields, latest }
    }

    /// Commit one field and recompute.
    ///
    /// Unknown field names are rejected without touching the snapshot or the latest result.
    pub fn set(
        &mut self,
        name: &str,
        value: impl Into<String>,
    ) -> Result<&Result<CostEstimate, CalculatorError>, CalculatorError> {
        if !field::is_known(name) {
            return Err(CalculatorError::validation(name));
        }
        self.fields.insert(name.to_string(), value.into());
        self.latest = compute_fields(&self.fields);
        tracing::trace!(field = name, ok = self.latest.is_ok(), "recomputed");
        Ok(&self.latest)
    }

    /// Apply a `field=value` line.
    pub fn apply_line(
        &mut self,
        line: &str,
    ) -> Result<&Result<CostEstimate, CalculatorError>, CalculatorError> {
        let (name, value) = line
            .split_once('=')
            .ok_or_else(|| CalculatorError::validation(line.trim()))?;
        self.set(name.trim(), value.trim())
    }

    pub fn latest(&self) -> &Result<CostEstimate, CalculatorError> {
        &self.latest
    }

    #[cfg(test)]
    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }
}
