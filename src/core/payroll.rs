//! Payroll withholding.
//!
//! Flat-rate model: Social Security, Medicare, one state percentage and a
//! federal percentage chosen per period, all applied to the same gross.
//! Overtime is folded into gross and taxed at the same rates.

use crate::core::{money::finite_or_zero, rates::PayrollRates};
use serde::{Deserialize, Serialize};

/// Withholding breakdown for a gross amount.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TaxBreakdown {
    /// Pre-tax earnings
    pub gross: f64,
    /// Federal withholding
    pub federal: f64,
    /// State withholding
    pub state_tax: f64,
    /// Social Security
    pub ss: f64,
    /// Medicare
    pub medicare: f64,
    /// `ss + medicare + state_tax + federal`
    pub taxes: f64,
    /// `gross − taxes`, not clamped
    pub net: f64,
}

/// Inputs for a single regular-time computation.
#[derive(Debug, Clone, PartialEq)]
pub struct PayrollInput {
    /// Hours worked
    pub hours: f64,
    /// Hourly rate
    pub rate: f64,
    /// Two-letter state code
    pub state: String,
    /// Federal withholding fraction; the rate book default when `None`
    pub federal_pct: Option<f64>,
}

/// Inputs for a pay period including overtime.
#[derive(Debug, Clone, PartialEq)]
pub struct PayPeriodInput {
    /// Regular hours
    pub hours: f64,
    /// Regular rate
    pub rate: f64,
    /// Overtime hours
    pub overtime_hours: f64,
    /// Overtime rate
    pub overtime_rate: f64,
    /// Two-letter state code
    pub state: String,
    /// Federal withholding fraction; the rate book default when `None`
    pub federal_pct: Option<f64>,
}

impl PayPeriodInput {
    /// `hours × rate`
    #[must_use]
    pub fn regular_gross(&self) -> f64 {
        finite_or_zero(self.hours) * finite_or_zero(self.rate)
    }

    /// `overtime_hours × overtime_rate`
    #[must_use]
    pub fn overtime_gross(&self) -> f64 {
        finite_or_zero(self.overtime_hours) * finite_or_zero(self.overtime_rate)
    }
}

/// Withholding on `hours × rate`.
#[must_use]
pub fn compute_taxes(rates: &PayrollRates, input: &PayrollInput) -> TaxBreakdown {
    let gross = finite_or_zero(input.hours) * finite_or_zero(input.rate);
    taxes_on_gross(rates, gross, &input.state, input.federal_pct)
}

/// Withholding on regular plus overtime gross.
#[must_use]
pub fn compute_pay_period(rates: &PayrollRates, input: &PayPeriodInput) -> TaxBreakdown {
    let gross = input.regular_gross() + input.overtime_gross();
    taxes_on_gross(rates, gross, &input.state, input.federal_pct)
}

/// Withholding on an already-known gross.
#[must_use]
pub fn taxes_on_gross(
    rates: &PayrollRates,
    gross: f64,
    state: &str,
    federal_pct: Option<f64>,
) -> TaxBreakdown {
    let gross = finite_or_zero(gross);
    let federal_pct = finite_or_zero(federal_pct.unwrap_or(rates.default_federal_pct));

    let ss = gross * rates.social_security_pct;
    let medicare = gross * rates.medicare_pct;
    let state_tax = gross * rates.state_pct(state);
    let federal = gross * federal_pct;
    let taxes = ss + medicare + state_tax + federal;

    TaxBreakdown {
        gross,
        federal,
        state_tax,
        ss,
        medicare,
        taxes,
        net: gross - taxes,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn input(hours: f64, rate: f64, state: &str, federal_pct: Option<f64>) -> PayrollInput {
        PayrollInput {
            hours,
            rate,
            state: state.to_string(),
            federal_pct,
        }
    }

    #[test]
    fn test_formula_components() {
        let rates = PayrollRates::default();
        for (hours, rate, pct) in [(40.0, 25.0, 0.12), (0.0, 30.0, 0.2), (37.5, 18.4, 0.0), (80.0, 55.55, 1.0)] {
            let t = compute_taxes(&rates, &input(hours, rate, "CO", Some(pct)));
            assert!(close(t.gross, hours * rate));
            assert!(close(t.ss, 0.062 * t.gross));
            assert!(close(t.medicare, 0.0145 * t.gross));
            assert!(close(t.state_tax, 0.044 * t.gross));
            assert!(close(t.federal, pct * t.gross));
            assert!(close(t.taxes, t.ss + t.medicare + t.state_tax + t.federal));
            assert!(close(t.net, t.gross - t.taxes));
        }
    }

    #[test]
    fn test_known_values() {
        let t = compute_taxes(&PayrollRates::default(), &input(40.0, 25.0, "CO", None));
        assert_eq!(t.gross, 1000.0);
        assert!(close(t.ss, 62.0));
        assert!(close(t.medicare, 14.5));
        assert!(close(t.state_tax, 44.0));
        assert!(close(t.federal, 120.0));
        assert!(close(t.taxes, 240.5));
        assert!(close(t.net, 759.5));
    }

    #[test]
    fn test_unknown_state_and_bad_numbers() {
        let rates = PayrollRates::default();
        let t = compute_taxes(&rates, &input(10.0, 10.0, "ZZ", Some(0.1)));
        assert_eq!(t.state_tax, 0.0);

        let t = compute_taxes(&rates, &input(f64::NAN, 10.0, "CO", Some(f64::NAN)));
        assert_eq!(t, TaxBreakdown::default());
    }

    #[test]
    fn test_overtime_is_taxed_at_same_rates() {
        let rates = PayrollRates::default();
        let period = PayPeriodInput {
            hours: 40.0,
            rate: 20.0,
            overtime_hours: 5.0,
            overtime_rate: 30.0,
            state: "TX".to_string(),
            federal_pct: Some(0.1),
        };
        let t = compute_pay_period(&rates, &period);
        assert_eq!(t.gross, 950.0);
        assert_eq!(t, taxes_on_gross(&rates, 950.0, "TX", Some(0.1)));
    }

    #[test]
    fn test_pathological_federal_pct_goes_negative() {
        let t = compute_taxes(&PayrollRates::default(), &input(10.0, 10.0, "TX", Some(1.5)));
        assert!(t.net < 0.0);
    }
}
