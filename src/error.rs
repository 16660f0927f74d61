/// Errors raised while turning a field snapshot into a cost estimate.
///
/// Every variant names the input field that caused it, so a form can point the
/// user straight at the offending value.
#[derive(Debug, thiserror::Error)]
pub enum CalculatorError {
    /// A required field is missing, empty, non-numeric, or not a known field.
    #[error("invalid value for `{field}`")]
    Validation { field: String },

    /// A date field could not be read as a calendar date.
    #[error("could not parse `{field}` as a date")]
    Parse {
        field: String,
        #[source]
        source: jiff::Error,
    },

    /// A divisor field is zero.
    #[error("`{field}` must not be zero")]
    DivisionByZero { field: String },
}

impl CalculatorError {
    pub fn validation(field: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
        }
    }

    /// Name of the field this error refers to.
    pub fn field(&self) -> &str {
        match self {
            Self::Validation { field }
            | Self::Parse { field, .. }
            | Self::DivisionByZero { field } => field,
        }
    }
}
