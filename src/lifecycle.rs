//! Investment lifecycle and annuitisation arithmetic.
//!
//! Capacity built in a period stays installed while its lifetime overlaps
//! later periods; its capital cost enters the objective as an annuity
//! collected over the years the asset can actually operate within the
//! horizon. All functions here are pure.
use std::ops::RangeInclusive;

/// Periods whose builds are still alive in `period`.
///
/// The window starts at `ceil(period + 1 - lifetime/step)`, clamped to the
/// first period. A lifetime shorter than one step still keeps the build
/// alive in its own period.
pub fn lifetime_window(period: u32, lifetime_years: f64, step_years: u32) -> RangeInclusive<u32> {
    let start = (f64::from(period) + 1.0 - lifetime_years / f64::from(step_years)).ceil();
    (start.max(1.0) as u32)..=period
}

/// Installed capacity implied by a build history and committed initial
/// capacity; the assembly encodes this as an equality row and reporting
/// recomputes it as a cross-check
pub fn installed_from_history(
    period: u32,
    lifetime_years: f64,
    step_years: u32,
    built: &dyn Fn(u32) -> f64,
    initial: f64,
) -> f64 {
    lifetime_window(period, lifetime_years, step_years)
        .map(built)
        .sum::<f64>()
        + initial
}

/// Annualised capital plus fixed O&M cost of one unit of capacity,
/// EUR per MW per year
pub fn yearly_cost(capital_cost: f64, fixed_om_cost: f64, lifetime_years: f64, wacc: f64) -> f64 {
    wacc / (1.0 - (1.0 + wacc).powf(1.0 - lifetime_years)) * capital_cost + fixed_om_cost
}

/// Present value of collecting `yearly` over the years the asset operates
/// within the horizon: `min(lifetime, remaining_years)` payments discounted
/// at the social rate
pub fn annuitised_cost(
    yearly: f64,
    lifetime_years: f64,
    remaining_years: u32,
    discount_rate: f64,
) -> f64 {
    let n = lifetime_years.min(f64::from(remaining_years));
    yearly * (1.0 - (1.0 + discount_rate).powf(-n)) / (1.0 - 1.0 / (1.0 + discount_rate))
}

/// Discounting of period `p` costs back to the start of the horizon
pub fn discount_multiplier(discount_rate: f64, step_years: u32, period: u32) -> f64 {
    (1.0 + discount_rate).powf(-f64::from(step_years * (period - 1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    #[case(1, 20.0, 1..=1)]
    #[case(4, 20.0, 1..=4)]
    #[case(8, 20.0, 5..=8)]
    #[case(8, 3.0, 8..=8)]
    #[case(5, 60.0, 1..=5)]
    fn test_lifetime_window(
        #[case] period: u32,
        #[case] lifetime: f64,
        #[case] expected: RangeInclusive<u32>,
    ) {
        assert_eq!(lifetime_window(period, lifetime, 5), expected);
    }

    #[test]
    fn test_installed_recomputation_is_idempotent() {
        let built = |p: u32| f64::from(p) * 10.0;
        let installed = installed_from_history(6, 20.0, 5, &built, 100.0);
        // window is 3..=6
        assert_approx_eq!(f64, installed, (30.0 + 40.0 + 50.0 + 60.0) + 100.0);
        assert_approx_eq!(
            f64,
            installed,
            installed_from_history(6, 20.0, 5, &built, 100.0)
        );
    }

    #[test]
    fn test_annuity_against_explicit_sum() {
        // wacc = r = 5 %, 1 MEUR capex, 20-year asset, full horizon left
        let yearly = yearly_cost(1e6, 0.0, 20.0, 0.05);
        // the annuity factor must equal the explicit geometric sum
        let explicit: f64 = (0..20).map(|t| yearly * 1.05f64.powi(-t)).sum();
        assert_approx_eq!(
            f64,
            annuitised_cost(yearly, 20.0, 40, 0.05),
            explicit,
            epsilon = 1e-6
        );
        // the per-year cost repays the capital over lifetime - 1 payments
        let repaid: f64 = (1..=19).map(|t| yearly * 1.05f64.powi(-t)).sum();
        assert_approx_eq!(f64, repaid, 1e6, epsilon = 1e-3);
    }

    #[test]
    fn test_truncated_horizon_shortens_the_annuity() {
        let yearly = yearly_cost(1e6, 0.0, 20.0, 0.05);
        let full = annuitised_cost(yearly, 20.0, 40, 0.05);
        let cut = annuitised_cost(yearly, 20.0, 5, 0.05);
        assert!(cut < full);
        let explicit: f64 = (0..5).map(|t| yearly * 1.05f64.powi(-t)).sum();
        assert_approx_eq!(f64, cut, explicit, epsilon = 1e-6);
    }

    #[test]
    fn test_discount_multiplier() {
        assert_approx_eq!(f64, discount_multiplier(0.05, 5, 1), 1.0);
        assert_approx_eq!(f64, discount_multiplier(0.05, 5, 3), 1.05f64.powi(-10));
    }
}
