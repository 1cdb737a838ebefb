//! Carbon equivalency (spec.md §4.8, component C9): aggregates the
//! `carbon_footprint` sustainability metric across a result set and
//! translates the total into a human-readable equivalency string.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::cost::CostResult;

const PRIMARY_KEY: &str = "carbon_footprint";
/// Metric name used by plugins predating the `carbon_footprint` key;
/// still honored for backward compatibility.
const DEPRECATED_KEY: &str = "carbonFootprintKg";

// EPA greenhouse-gas equivalency factors: ~404 g CO2e/mile driven,
// ~8.22 g CO2e per smartphone charge.
const DRIVING_MILES_PER_KG: Decimal = dec!(2.48);
const SMARTPHONE_CHARGES_PER_KG: Decimal = dec!(121.7);
const MILLIONS_THRESHOLD: Decimal = dec!(1000000);

fn unit_to_kg(unit: &str, value: Decimal) -> Option<Decimal> {
    match unit.to_lowercase().as_str() {
        "kg" => Some(value),
        "g" => Some(value / dec!(1000)),
        "t" | "tonne" | "tonnes" => Some(value * dec!(1000)),
        _ => None,
    }
}

/// Sum of `carbon_footprint` (or its deprecated alias) across every result,
/// normalized to kilograms. Unrecognized units are skipped rather than
/// corrupting the total.
pub fn total_kg(results: &[CostResult]) -> Decimal {
    results
        .iter()
        .filter_map(|r| r.sustainability.get(PRIMARY_KEY).or_else(|| r.sustainability.get(DEPRECATED_KEY)))
        .filter_map(|m| unit_to_kg(&m.unit, m.value))
        .sum()
}

/// Locale-independent thousands-separated integer rendering (spec.md §4.8
/// "Locale-independent numeric formatting").
fn format_thousands(value: Decimal) -> String {
    let digits = value.trunc().abs().to_string();
    let mut grouped: Vec<char> = Vec::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let grouped: String = grouped.into_iter().rev().collect();
    if value.is_sign_negative() {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// Human-readable equivalency string, or `None` when the aggregated total is
/// below 1 kg (spec.md §4.8 "Values below 1 kg total are dropped").
pub fn equivalency(results: &[CostResult]) -> Option<String> {
    let total = total_kg(results);
    if total < Decimal::ONE {
        return None;
    }

    let miles = total * DRIVING_MILES_PER_KG;
    let charges = total * SMARTPHONE_CHARGES_PER_KG;
    let mut text = format!(
        "{} kg CO2e \u{2248} {} miles driven or {} smartphones charged",
        format_thousands(total),
        format_thousands(miles),
        format_thousands(charges),
    );
    if total >= MILLIONS_THRESHOLD {
        let millions = total / MILLIONS_THRESHOLD;
        text.push_str(&format!(" ({millions:.1}M kg total)"));
    }
    Some(text)
}
