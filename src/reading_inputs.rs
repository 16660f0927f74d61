use crate::error::CalculatorError;
use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive};
use csv::StringRecord;
use jiff::ToSpan;
use jiff::civil::Date;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

/// Names of the recognized input fields, as they appear in a form, a CSV header,
/// or a `field=value` line.
pub mod field {
    pub const PREVIOUS_READING: &str = "previousReading";
    pub const CURRENT_READING: &str = "currentReading";
    pub const VCF: &str = "vcf";
    pub const KWCF: &str = "kwcf";
    pub const DAILY_STANDING_CHARGE: &str = "dailyStandingCharge";
    pub const START_DATE: &str = "startDate";
    pub const END_DATE: &str = "endDate";
    pub const COST_PER_KW: &str = "costPerKW";

    pub const ALL: [&str; 8] = [
        PREVIOUS_READING,
        CURRENT_READING,
        VCF,
        KWCF,
        DAILY_STANDING_CHARGE,
        START_DATE,
        END_DATE,
        COST_PER_KW,
    ];

    pub fn is_known(name: &str) -> bool {
        ALL.contains(&name)
    }
}

pub const DEFAULT_PREVIOUS_READING: i64 = 9170;
pub const DEFAULT_CURRENT_READING: i64 = 9227;
pub const DEFAULT_VCF: &str = "1.02264";
pub const DEFAULT_KWCF: &str = "3.6";
pub const DEFAULT_DAILY_STANDING_CHARGE: &str = "0.160912";
pub const DEFAULT_COST_PER_KW: &str = "0.133153";

/// Largest decimal exponent, either way, accepted in a numeric field.
/// Anything beyond it would make the exact arithmetic build enormous integers.
pub const MAX_DECIMAL_EXPONENT: i64 = 32;

/// Anything that can hand out a raw value for a named field.
pub trait FieldSource {
    fn field(&self, name: &str) -> Option<&str>;
}

impl FieldSource for HashMap<String, String> {
    fn field(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl FieldSource for BTreeMap<String, String> {
    fn field(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

/// A CSV record viewed through its header row.
pub struct RecordFields<'a> {
    pub headers: &'a StringRecord,
    pub record: &'a StringRecord,
}

impl FieldSource for RecordFields<'_> {
    fn field(&self, name: &str) -> Option<&str> {
        let index = self.headers.iter().position(|header| header.trim() == name)?;
        self.record.get(index)
    }
}

/// One snapshot of everything needed to estimate a gas bill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingInputs {
    pub previous_reading: i64,
    pub current_reading: i64,
    /// Volume correction factor.
    pub vcf: BigDecimal,
    /// Kilowatt conversion factor, used as a divisor.
    pub kwcf: BigDecimal,
    pub daily_standing_charge: BigDecimal,
    pub start_date: Date,
    pub end_date: Date,
    pub cost_per_kw: BigDecimal,
}

impl ReadingInputs {
    pub fn from_fields(source: &impl FieldSource) -> Result<Self, CalculatorError> {
        Ok(Self {
            previous_reading: read_reading(source, field::PREVIOUS_READING)?,
            current_reading: read_reading(source, field::CURRENT_READING)?,
            vcf: read_decimal(source, field::VCF)?,
            kwcf: read_decimal(source, field::KWCF)?,
            daily_standing_charge: read_decimal(source, field::DAILY_STANDING_CHARGE)?,
            start_date: read_date(source, field::START_DATE)?,
            end_date: read_date(source, field::END_DATE)?,
            cost_per_kw: read_decimal(source, field::COST_PER_KW)?,
        })
    }

    /// The suggested starting values: last month's bill with typical UK constants.
    pub fn defaults(today: Date) -> Self {
        let (start_date, end_date) = default_period(today);
        Self {
            previous_reading: DEFAULT_PREVIOUS_READING,
            current_reading: DEFAULT_CURRENT_READING,
            vcf: decimal_constant(DEFAULT_VCF),
            kwcf: decimal_constant(DEFAULT_KWCF),
            daily_standing_charge: decimal_constant(DEFAULT_DAILY_STANDING_CHARGE),
            start_date,
            end_date,
            cost_per_kw: decimal_constant(DEFAULT_COST_PER_KW),
        }
    }

    /// Render back into the raw field vocabulary.
    pub fn to_fields(&self) -> BTreeMap<String, String> {
        [
            (field::PREVIOUS_READING, self.previous_reading.to_string()),
            (field::CURRENT_READING, self.current_reading.to_string()),
            (field::VCF, self.vcf.to_string()),
            (field::KWCF, self.kwcf.to_string()),
            (field::DAILY_STANDING_CHARGE, self.daily_standing_charge.to_string()),
            (field::START_DATE, self.start_date.to_string()),
            (field::END_DATE, self.end_date.to_string()),
            (field::COST_PER_KW, self.cost_per_kw.to_string()),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
    }
}

/// First day of the previous calendar month up to the first day of this one.
pub fn default_period(today: Date) -> (Date, Date) {
    let end = today.first_of_month();
    (end.saturating_sub(1.month()), end)
}

fn decimal_constant(literal: &str) -> BigDecimal {
    BigDecimal::from_str(literal).unwrap_or_else(|_| panic!("bad decimal constant: {literal}"))
}

fn read_raw<'a>(source: &'a impl FieldSource, name: &str) -> Result<&'a str, CalculatorError> {
    source
        .field(name)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| CalculatorError::validation(name))
}

/// Meter readings are whole units; a fractional value is truncated toward zero.
fn read_reading(source: &impl FieldSource, name: &str) -> Result<i64, CalculatorError> {
    let raw = read_raw(source, name)?;
    if let Ok(reading) = raw.parse::<i64>() {
        return Ok(reading);
    }
    parse_decimal(raw, name)?
        .with_scale_round(0, RoundingMode::Down)
        .to_i64()
        .ok_or_else(|| CalculatorError::validation(name))
}

fn read_decimal(source: &impl FieldSource, name: &str) -> Result<BigDecimal, CalculatorError> {
    parse_decimal(read_raw(source, name)?, name)
}

fn parse_decimal(raw: &str, name: &str) -> Result<BigDecimal, CalculatorError> {
    let value = BigDecimal::from_str(raw).map_err(|_| CalculatorError::validation(name))?;
    let (_, scale) = value.normalized().as_bigint_and_exponent();
    if scale.abs() > MAX_DECIMAL_EXPONENT {
        return Err(CalculatorError::validation(name));
    }
    Ok(value)
}

fn read_date(source: &impl FieldSource, name: &str) -> Result<Date, CalculatorError> {
    Date::from_str(read_raw(source, name)?).map_err(|source| CalculatorError::Parse {
        field: name.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use jiff::civil::date;

    use super::*;

    fn sample() -> HashMap<String, String> {
        [
            ("previousReading", "9170"),
            ("currentReading", "9227"),
            ("vcf", "1.02264"),
            ("kwcf", "3.6"),
            ("dailyStandingCharge", "0.160912"),
            ("startDate", "2024-01-01"),
            ("endDate", "2024-02-01"),
            ("costPerKW", "0.133153"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_from_fields() {
        let inputs = ReadingInputs::from_fields(&sample()).unwrap();
        assert_eq!(inputs.previous_reading, 9170);
        assert_eq!(inputs.current_reading, 9227);
        assert_eq!(inputs.kwcf, BigDecimal::from_str("3.6").unwrap());
        assert_eq!(inputs.start_date, date(2024, 1, 1));
        assert_eq!(inputs.end_date, date(2024, 2, 1));
    }

    #[test]
    fn test_fractional_reading_is_truncated() {
        let mut fields = sample();
        fields.insert("currentReading".into(), " 9227.9 ".into());
        let inputs = ReadingInputs::from_fields(&fields).unwrap();
        assert_eq!(inputs.current_reading, 9227);
    }

    #[test]
    fn test_missing_field() {
        let mut fields = sample();
        fields.remove("costPerKW");
        let error = ReadingInputs::from_fields(&fields).unwrap_err();
        assert!(matches!(error, CalculatorError::Validation { .. }));
        assert_eq!(error.field(), "costPerKW");
    }

    #[test]
    fn test_empty_field_is_missing() {
        let mut fields = sample();
        fields.insert("vcf".into(), "  ".into());
        let error = ReadingInputs::from_fields(&fields).unwrap_err();
        assert_eq!(error.field(), "vcf");
    }

    #[test]
    fn test_non_numeric_field() {
        let mut fields = sample();
        fields.insert("previousReading".into(), "lots".into());
        let error = ReadingInputs::from_fields(&fields).unwrap_err();
        assert!(matches!(error, CalculatorError::Validation { .. }));
        assert_eq!(error.field(), "previousReading");
    }

    #[test]
    fn test_extreme_exponents_are_rejected() {
        for (name, value) in [
            ("dailyStandingCharge", "1e-50000000"),
            ("costPerKW", "1e50000000"),
            ("previousReading", "1e50000000"),
        ] {
            let mut fields = sample();
            fields.insert(name.into(), value.into());
            let error = ReadingInputs::from_fields(&fields).unwrap_err();
            assert!(matches!(error, CalculatorError::Validation { .. }));
            assert_eq!(error.field(), name);
        }
    }

    #[test]
    fn test_exponent_notation_within_bounds() {
        let mut fields = sample();
        fields.insert("costPerKW".into(), "1.33153e-1".into());
        fields.insert("vcf".into(), "1.0226400000000000000000000000000000000000".into());
        let inputs = ReadingInputs::from_fields(&fields).unwrap();
        assert_eq!(inputs.cost_per_kw, BigDecimal::from_str("0.133153").unwrap());
        assert_eq!(inputs.vcf, BigDecimal::from_str("1.02264").unwrap());
    }

    #[test]
    fn test_bad_date() {
        let mut fields = sample();
        fields.insert("endDate".into(), "01/02/2024".into());
        let error = ReadingInputs::from_fields(&fields).unwrap_err();
        assert!(matches!(error, CalculatorError::Parse { .. }));
        assert_eq!(error.field(), "endDate");
    }

    #[test]
    fn test_default_period() {
        assert_eq!(
            default_period(date(2024, 3, 15)),
            (date(2024, 2, 1), date(2024, 3, 1))
        );
        assert_eq!(
            default_period(date(2025, 1, 1)),
            (date(2024, 12, 1), date(2025, 1, 1))
        );
    }

    #[test]
    fn test_defaults_round_trip_through_fields() {
        let defaults = ReadingInputs::defaults(date(2024, 2, 10));
        assert_eq!(defaults.start_date, date(2024, 1, 1));
        let parsed = ReadingInputs::from_fields(&defaults.to_fields()).unwrap();
        assert_eq!(parsed, defaults);
    }

    #[test]
    fn test_record_fields() {
        let headers = StringRecord::from(vec!["startDate", " vcf "]);
        let record = StringRecord::from(vec!["2024-01-01", "1.02264"]);
        let fields = RecordFields {
            headers: &headers,
            record: &record,
        };
        assert_eq!(fields.field("vcf"), Some("1.02264"));
        assert_eq!(fields.field("kwcf"), None);
    }
}
