//! Weight extraction: find the most plausible kilogram value in OCR text.
//!
//! ## Why two tiers?
//!
//! Label text is noisy — OCR output mixes the weight with lot numbers,
//! dates, and percentages. A number sitting next to a weight unit or a
//! `peso:`/`weight:` label is far more likely to be the box weight than a
//! bare number, so unit/label-anchored patterns are exhausted first and the
//! bare-number scan only runs when none of them produced a plausible value.
//!
//! Every candidate, from either tier, passes through the plausible-range
//! gate before it is accepted. An out-of-range candidate is discarded and
//! the search continues; if nothing survives the parser returns `None`,
//! which is an expected outcome, not an error.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

/// Anchored patterns, tried in this fixed order. The first match of the
/// first pattern that yields an in-range value wins. The bool marks
/// gram-denominated patterns whose value is divided by 1000.
static ANCHORED_PATTERNS: Lazy<Vec<(Regex, bool)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"(\d+\.?\d*)\s*kg").unwrap(), false),
        (Regex::new(r"(\d+\.?\d*)\s*k").unwrap(), false),
        (Regex::new(r"(\d+\.?\d*)\s*g").unwrap(), true),
        (Regex::new(r"peso\s*:?\s*(\d+\.?\d*)").unwrap(), false),
        (Regex::new(r"weight\s*:?\s*(\d+\.?\d*)").unwrap(), false),
    ]
});

/// Fallback: any standalone number, scanned left to right.
static STANDALONE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d+\.?\d*)\b").unwrap());

/// Extracts a plausible kilogram value from free-form recognised text.
///
/// The accepted range is configuration, not an invariant — it defaults to
/// the meat-box assumption of 0.1–50.0 kg but callers with a different
/// domain set their own bounds through
/// [`crate::config::ProcessingConfigBuilder`].
#[derive(Debug, Clone, Copy)]
pub struct WeightParser {
    min_kg: f64,
    max_kg: f64,
}

impl WeightParser {
    pub fn new(min_kg: f64, max_kg: f64) -> Self {
        Self { min_kg, max_kg }
    }

    /// Find the most plausible weight in `text`, in kilograms.
    ///
    /// Case-insensitive; decimal commas are normalised to periods before
    /// matching so `"2,5 kg"` parses as 2.5.
    pub fn parse(&self, text: &str) -> Option<f64> {
        let text = text.to_lowercase().replace(',', ".");

        // Tier 1: unit/label-anchored patterns, first in-range match wins.
        for (pattern, grams) in ANCHORED_PATTERNS.iter() {
            if let Some(caps) = pattern.captures(&text) {
                if let Ok(mut value) = caps[1].parse::<f64>() {
                    if *grams {
                        value /= 1000.0;
                    }
                    if self.in_range(value) {
                        return Some(value);
                    }
                }
            }
        }

        // Tier 2: bare numbers, left to right, first in-range one.
        for caps in STANDALONE_NUMBER.captures_iter(&text) {
            if let Ok(value) = caps[1].parse::<f64>() {
                if self.in_range(value) {
                    return Some(value);
                }
            }
        }

        None
    }

    /// Re-validate an already-extracted weight against the plausible range.
    ///
    /// Used by the orchestrator just before returning, since injected
    /// engines are not required to range-gate what they parse. Accepted
    /// values are rounded to 2 decimals.
    pub fn validate(&self, weight: f64) -> Option<f64> {
        if self.in_range(weight) {
            return Some((weight * 100.0).round() / 100.0);
        }
        warn!(
            weight,
            min = self.min_kg,
            max = self.max_kg,
            "extracted weight outside plausible range, discarding"
        );
        None
    }

    fn in_range(&self, value: f64) -> bool {
        value >= self.min_kg && value <= self.max_kg
    }
}

impl Default for WeightParser {
    fn default() -> Self {
        // Meat-box plausible range: 100 g to 50 kg.
        Self::new(0.1, 50.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> WeightParser {
        WeightParser::default()
    }

    #[test]
    fn peso_label_with_unit() {
        assert_eq!(parser().parse("peso: 2.5 kg"), Some(2.5));
        assert_eq!(parser().parse("PESO: 2.5 kg"), Some(2.5));
    }

    #[test]
    fn decimal_comma_normalised() {
        assert_eq!(parser().parse("2,5 kg"), Some(2.5));
    }

    #[test]
    fn grams_converted_to_kilograms() {
        assert_eq!(parser().parse("2500 g"), Some(2.5));
        assert_eq!(parser().parse("750g"), Some(0.75));
    }

    #[test]
    fn bare_k_unit() {
        assert_eq!(parser().parse("12.3 K"), Some(12.3));
    }

    #[test]
    fn weight_label_english() {
        assert_eq!(parser().parse("weight: 4.75"), Some(4.75));
        assert_eq!(parser().parse("Weight 3"), Some(3.0));
    }

    #[test]
    fn out_of_range_candidate_skipped_search_continues() {
        // 500 fails the gate in every tier; the fallback scan then finds 2.
        assert_eq!(parser().parse("lote 500 caja 2"), Some(2.0));
    }

    #[test]
    fn out_of_range_only_yields_none() {
        assert_eq!(parser().parse("500 kg"), None);
        assert_eq!(parser().parse("0.05 kg"), None);
    }

    #[test]
    fn fallback_picks_first_in_range_number() {
        assert_eq!(parser().parse("9999 12.5 3.1"), Some(12.5));
    }

    #[test]
    fn no_numeric_content_is_none_not_error() {
        assert_eq!(parser().parse("sin etiqueta legible"), None);
        assert_eq!(parser().parse(""), None);
    }

    #[test]
    fn anchored_beats_earlier_bare_number() {
        // 3 appears first but 2.5 is unit-anchored.
        assert_eq!(parser().parse("caja 3 peso 2.5 kg"), Some(2.5));
    }

    #[test]
    fn validate_rounds_to_two_decimals() {
        assert_eq!(parser().validate(2.456), Some(2.46));
        assert_eq!(parser().validate(0.1), Some(0.1));
    }

    #[test]
    fn validate_rejects_out_of_range() {
        assert_eq!(parser().validate(80.0), None);
        assert_eq!(parser().validate(0.01), None);
    }

    #[test]
    fn custom_range_is_honoured() {
        let p = WeightParser::new(1.0, 5.0);
        assert_eq!(p.parse("0.5 kg y 3 kg"), Some(3.0));
        assert_eq!(p.validate(0.5), None);
    }
}
