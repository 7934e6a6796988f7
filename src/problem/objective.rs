//! Objective coefficient weighting.
//!
//! Investment terms are annuitised present values discounted to the start
//! of their period. Operational terms are weighted by the season scale (so
//! sampled hours stand in for the full year), the scenario probability and
//! the same period discount.
use super::{COST_SCALE, EMISSION_SCALE, POWER_SCALE};
use crate::lifecycle::discount_multiplier;
use crate::model::Model;
use anyhow::Result;

/// Coefficient for a built-capacity column, MEUR/GW, from an annuitised
/// EUR/MW cost
pub fn investment_cost_coefficient(model: &Model, period: u32, annuitised: f64) -> f64 {
    discount_multiplier(
        model.economics.discount_rate,
        model.temporal.period_step_years,
        period,
    ) * annuitised
        * COST_SCALE
        / POWER_SCALE
}

/// Expected-value weight of one sampled hour
pub fn operational_weight(model: &Model, period: u32, hour: u32) -> Result<f64> {
    let season = model.temporal.season_of_hour(hour)?;
    Ok(season.scale
        * model.temporal.scenario_probability()
        * discount_multiplier(
            model.economics.discount_rate,
            model.temporal.period_step_years,
            period,
        ))
}

/// Coefficient for an hourly power column, MEUR/GWh, from an EUR/MWh cost
pub fn operational_cost_coefficient(
    model: &Model,
    period: u32,
    hour: u32,
    cost_per_mwh: f64,
) -> Result<f64> {
    Ok(operational_weight(model, period, hour)? * cost_per_mwh * COST_SCALE / POWER_SCALE)
}

/// Coefficient for an hourly tonnage column, MEUR/kt, from an EUR/t cost
pub fn emission_cost_coefficient(
    model: &Model,
    period: u32,
    hour: u32,
    cost_per_tonne: f64,
) -> Result<f64> {
    Ok(operational_weight(model, period, hour)? * cost_per_tonne * COST_SCALE / EMISSION_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::toy_model;
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_first_period_is_undiscounted() {
        let model = toy_model();
        let season = model.temporal.season_of_hour(1).unwrap();
        let weight = operational_weight(&model, 1, 1).unwrap();
        assert_approx_eq!(f64, weight, season.scale);
    }

    #[test]
    fn test_later_periods_discount_by_step_years() {
        let model = toy_model();
        let first = operational_weight(&model, 1, 1).unwrap();
        let second = operational_weight(&model, 2, 1).unwrap();
        let step = model.temporal.period_step_years;
        assert_approx_eq!(f64, second / first, 1.05_f64.powi(-(step as i32)));
    }

    #[test]
    fn test_investment_coefficient_scales_eur_per_mw_to_meur_per_gw() {
        let model = toy_model();
        // 1 EUR/MW is 1e-6 MEUR per 1e-3 GW
        assert_approx_eq!(
            f64,
            investment_cost_coefficient(&model, 1, 1.0),
            COST_SCALE / POWER_SCALE
        );
    }

    #[test]
    fn test_hour_outside_horizon_is_an_error() {
        let model = toy_model();
        assert!(operational_weight(&model, 1, 9999).is_err());
    }
}
