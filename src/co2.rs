//! CO2 transport and sequestration parameters.
//!
//! Captured CO2 moves over dedicated pipelines between onshore nodes and is
//! injected at sequestration sites whose capacity is both rate-limited
//! (installed injection capacity) and volume-limited (cumulative storage).
use crate::id::NodeID;
use crate::input::{read_tab_vec, read_tab_vec_optional};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// CO2 module parameter tables
#[derive(Clone, Debug, Default)]
pub struct Co2 {
    /// Pipeline capital cost per km, EUR/(t/h)/km
    pub pipeline_capital_cost: HashMap<u32, f64>,
    /// Pipeline fixed O&M cost per km, EUR/(t/h)/km/yr
    pub pipeline_om_cost: HashMap<u32, f64>,
    /// Pump electricity per unit flow and distance, MWh el / t / km
    pub pipeline_power_use: f64,
    /// Pipeline lifetime, years
    pub pipeline_lifetime: f64,
    /// Injection capacity capital cost, EUR/(t/h)
    pub site_capital_cost: HashMap<u32, f64>,
    /// Injection capacity fixed O&M cost, EUR/(t/h)/yr
    pub site_fixed_om_cost: HashMap<u32, f64>,
    /// Sequestration site lifetime, years
    pub site_lifetime: f64,
    /// Cumulative storage volume per sequestration node, t
    pub max_sequestration: HashMap<NodeID, f64>,
}

#[derive(Deserialize)]
struct PeriodRow {
    #[serde(rename = "Period")]
    period: u32,
    #[serde(rename = "Value")]
    value: f64,
}

#[derive(Deserialize)]
struct NodeRow {
    #[serde(rename = "Node")]
    node: NodeID,
    #[serde(rename = "Value")]
    value: f64,
}

fn period_param(rows: Vec<PeriodRow>) -> HashMap<u32, f64> {
    rows.into_iter().map(|r| (r.period, r.value)).collect()
}

fn scalar(rows: Vec<PeriodRow>, name: &str) -> Result<f64> {
    Ok(rows
        .first()
        .with_context(|| format!("Table {name} must contain one value"))?
        .value)
}

/// Read the CO2 module tables from `model_dir`
pub fn read_co2(model_dir: &Path) -> Result<Co2> {
    let max_seq_rows: Vec<NodeRow> =
        read_tab_vec_optional(&model_dir.join("CO2_MaxSequestration.tab"))?;

    Ok(Co2 {
        pipeline_capital_cost: period_param(read_tab_vec(
            &model_dir.join("CO2_PipelineCapitalCost.tab"),
        )?),
        pipeline_om_cost: period_param(read_tab_vec(&model_dir.join("CO2_PipelineOMCost.tab"))?),
        pipeline_power_use: scalar(
            read_tab_vec(&model_dir.join("CO2_PipelinePowerUse.tab"))?,
            "CO2_PipelinePowerUse.tab",
        )?,
        pipeline_lifetime: scalar(
            read_tab_vec(&model_dir.join("CO2_PipelineLifetime.tab"))?,
            "CO2_PipelineLifetime.tab",
        )?,
        site_capital_cost: period_param(read_tab_vec(
            &model_dir.join("CO2_SiteCapitalCost.tab"),
        )?),
        site_fixed_om_cost: period_param(read_tab_vec(
            &model_dir.join("CO2_SiteFixedOMCost.tab"),
        )?),
        site_lifetime: scalar(
            read_tab_vec(&model_dir.join("CO2_SiteLifetime.tab"))?,
            "CO2_SiteLifetime.tab",
        )?,
        max_sequestration: max_seq_rows.into_iter().map(|r| (r.node, r.value)).collect(),
    })
}

impl Co2 {
    /// Pipeline capital cost for a corridor of `length_km`, EUR/(t/h)
    pub fn pipeline_capital_cost(&self, length_km: f64, period: u32) -> Result<f64> {
        let per_km = self
            .pipeline_capital_cost
            .get(&period)
            .with_context(|| format!("No CO2 pipeline capital cost for period {period}"))?;
        Ok(per_km * length_km)
    }

    /// Pump draw for flow over a corridor of `length_km`, MWh el per t
    pub fn pump_power_use(&self, length_km: f64) -> f64 {
        self.pipeline_power_use * length_km
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_pipeline_costs_scale_with_length() {
        let mut co2 = Co2::default();
        co2.pipeline_capital_cost.insert(3, 120.0);
        co2.pipeline_power_use = 1e-4;
        assert_approx_eq!(f64, co2.pipeline_capital_cost(80.0, 3).unwrap(), 9600.0);
        assert_approx_eq!(f64, co2.pump_power_use(80.0), 8e-3);
        assert!(co2.pipeline_capital_cost(80.0, 4).is_err());
    }
}
