use crate::error::CalculatorError;
use crate::reading_inputs::{FieldSource, ReadingInputs, field};
use bigdecimal::{BigDecimal, RoundingMode, Zero};
use jiff::civil::Date;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::LazyLock;

/// Converts corrected meter volume into energy before the kWh divisor is applied.
pub static CALORIFIC_CONVERSION: LazyLock<BigDecimal> =
    LazyLock::new(|| BigDecimal::from_str("40.16824").unwrap());

const DISPLAY_DATE_FORMAT: &str = "%d/%m/%Y";

/// Estimated bill for one reading period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    /// Total cost with thousands separators and exactly two decimal places.
    pub gas_cost: String,
    pub standard_charge: BigDecimal,
    pub gas_used: i64,
    pub gas_kwh_used: BigDecimal,
    pub days: u32,
    pub previous_reading_date: String,
    pub current_reading_date: String,
    pub previous_reading: i64,
    pub current_reading: i64,
}

impl Display for CostEstimate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Readings: {} ({}) -> {} ({})",
            self.previous_reading,
            self.previous_reading_date,
            self.current_reading,
            self.current_reading_date,
        )?;
        writeln!(f, "Gas used: {} units, {:.2} kWh", self.gas_used, self.gas_kwh_used)?;
        writeln!(f, "Standing charge: £{:.2} over {} days", self.standard_charge, self.days)?;
        write!(f, "Cost estimate: £{}", self.gas_cost)
    }
}

/// Parse a raw field snapshot and estimate its cost.
pub fn compute_fields(source: &impl FieldSource) -> Result<CostEstimate, CalculatorError> {
    compute(&ReadingInputs::from_fields(source)?)
}

pub fn compute(inputs: &ReadingInputs) -> Result<CostEstimate, CalculatorError> {
    if inputs.kwcf.is_zero() {
        return Err(CalculatorError::DivisionByZero {
            field: field::KWCF.to_string(),
        });
    }

    let gas_used = inputs
        .current_reading
        .checked_sub(inputs.previous_reading)
        .ok_or_else(|| CalculatorError::validation(field::CURRENT_READING))?;
    let gas_kwh_used =
        BigDecimal::from(gas_used) * &inputs.vcf * &*CALORIFIC_CONVERSION / &inputs.kwcf;
    let days = days_between(inputs.start_date, inputs.end_date);
    let standard_charge = &inputs.daily_standing_charge * BigDecimal::from(days);
    let cost = &gas_kwh_used * &inputs.cost_per_kw + &standard_charge;
    let gas_cost = format_money(&cost);
    tracing::debug!(gas_used, days, %gas_kwh_used, %gas_cost, "computed estimate");

    Ok(CostEstimate {
        gas_cost,
        standard_charge,
        gas_used,
        gas_kwh_used,
        days,
        previous_reading_date: inputs.start_date.strftime(DISPLAY_DATE_FORMAT).to_string(),
        current_reading_date: inputs.end_date.strftime(DISPLAY_DATE_FORMAT).to_string(),
        previous_reading: inputs.previous_reading,
        current_reading: inputs.current_reading,
    })
}

/// Whole calendar days between two dates, whichever comes first.
pub fn days_between(start: Date, end: Date) -> u32 {
    (end - start).get_days().unsigned_abs()
}

/// Two decimal places, halves rounded away from zero, thousands grouped with commas.
pub fn format_money(amount: &BigDecimal) -> String {
    let plain = format!("{:.2}", amount.with_scale_round(2, RoundingMode::HalfUp));
    let (sign, unsigned) = match plain.strip_prefix('-') {
        Some(unsigned) => ("-", unsigned),
        None => ("", plain.as_str()),
    };
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, "00"));
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    format!("{sign}{grouped}.{fraction}")
}
