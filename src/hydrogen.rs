//! Hydrogen supply-chain parameters.
//!
//! Covers electrolyzers (electricity to hydrogen), reformers (natural gas to
//! hydrogen, with optional carbon capture), hydrogen storage and hydrogen
//! pipelines. All of it is only read when the hydrogen module is enabled.
use crate::id::{NodeID, PlantID};
use crate::input::{read_tab_vec, read_tab_vec_optional};
use anyhow::{ensure, Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// One reformer plant design in the catalog
#[derive(Clone, Debug, Deserialize)]
pub struct Reformer {
    /// Plant identifier
    #[serde(rename = "Plant")]
    pub id: PlantID,
}

/// Map of a per-period parameter
pub type PeriodParam = HashMap<u32, f64>;
/// Map of a per-(plant, period) parameter
pub type PlantPeriodParam = HashMap<(PlantID, u32), f64>;

/// Hydrogen module parameter tables
#[derive(Clone, Debug, Default)]
pub struct Hydrogen {
    /// Electrolyzer capital cost (plant plus stack folded together), EUR/MW
    pub electrolyzer_capital_cost: PeriodParam,
    /// Electrolyzer fixed O&M cost, EUR/MW/yr
    pub electrolyzer_fixed_om_cost: PeriodParam,
    /// Electricity drawn per unit of hydrogen produced, MWh el / MWh H2
    pub electrolyzer_power_use: PeriodParam,
    /// Electrolyzer lifetime, years
    pub electrolyzer_lifetime: f64,
    /// Reformer catalog
    pub reformers: IndexMap<PlantID, Reformer>,
    /// Reformer capital cost, EUR/MW H2 output
    pub reformer_capital_cost: PlantPeriodParam,
    /// Reformer fixed O&M cost, EUR/MW/yr
    pub reformer_fixed_om_cost: PlantPeriodParam,
    /// Reformer variable O&M cost, EUR/MWh H2
    pub reformer_variable_om_cost: PlantPeriodParam,
    /// Natural gas burned per unit hydrogen output, MWh gas / MWh H2
    pub reformer_gas_use: HashMap<PlantID, f64>,
    /// Electricity drawn per unit hydrogen output, MWh el / MWh H2
    pub reformer_power_use: HashMap<PlantID, f64>,
    /// CO2 emitted to atmosphere per unit hydrogen output, t / MWh H2
    pub reformer_co2_emitted: HashMap<PlantID, f64>,
    /// CO2 captured per unit hydrogen output, t / MWh H2
    pub reformer_co2_captured: HashMap<PlantID, f64>,
    /// Reformer lifetime, years
    pub reformer_lifetime: HashMap<PlantID, f64>,
    /// Hydrogen storage capital cost, EUR/MWh
    pub storage_capital_cost: PeriodParam,
    /// Upper bound on storage energy capacity per node, MWh
    pub storage_max_capacity: HashMap<NodeID, f64>,
    /// Hydrogen storage lifetime, years
    pub storage_lifetime: f64,
    /// Pipeline capital cost per km, EUR/MW/km
    pub pipeline_capital_cost: PeriodParam,
    /// Pipeline fixed O&M cost per km, EUR/MW/km/yr
    pub pipeline_om_cost: PeriodParam,
    /// Compressor electricity per unit flow and distance, MWh el / MWh H2 / km
    pub pipeline_compressor_power_use: f64,
    /// Pipeline lifetime, years
    pub pipeline_lifetime: f64,
}

#[derive(Deserialize)]
struct PeriodRow {
    #[serde(rename = "Period")]
    period: u32,
    #[serde(rename = "Value")]
    value: f64,
}

#[derive(Deserialize)]
struct PlantRow {
    #[serde(rename = "Plant")]
    plant: PlantID,
    #[serde(rename = "Value")]
    value: f64,
}

#[derive(Deserialize)]
struct PlantPeriodRow {
    #[serde(rename = "Plant")]
    plant: PlantID,
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

fn period_param(rows: Vec<PeriodRow>) -> PeriodParam {
    rows.into_iter().map(|r| (r.period, r.value)).collect()
}

fn plant_param(rows: Vec<PlantRow>) -> HashMap<PlantID, f64> {
    rows.into_iter().map(|r| (r.plant, r.value)).collect()
}

fn plant_period_param(rows: Vec<PlantPeriodRow>) -> PlantPeriodParam {
    rows.into_iter()
        .map(|r| ((r.plant, r.period), r.value))
        .collect()
}

fn scalar(rows: Vec<PeriodRow>, name: &str) -> Result<f64> {
    Ok(rows
        .first()
        .with_context(|| format!("Table {name} must contain one value"))?
        .value)
}

/// Read the hydrogen module tables from `model_dir`
pub fn read_hydrogen(model_dir: &Path) -> Result<Hydrogen> {
    let reformer_rows: Vec<Reformer> = read_tab_vec(&model_dir.join("Sets_ReformerPlants.tab"))?;
    let mut reformers = IndexMap::new();
    for entry in reformer_rows {
        ensure!(
            reformers.insert(entry.id.clone(), entry.clone()).is_none(),
            "Duplicate reformer plant {} in catalog",
            entry.id
        );
    }

    let read_period =
        |name: &str| -> Result<PeriodParam> { Ok(period_param(read_tab_vec(&model_dir.join(name))?)) };
    let read_plant =
        |name: &str| -> Result<HashMap<PlantID, f64>> { Ok(plant_param(read_tab_vec(&model_dir.join(name))?)) };
    let read_plant_period = |name: &str| -> Result<PlantPeriodParam> {
        Ok(plant_period_param(read_tab_vec(&model_dir.join(name))?))
    };
    let read_scalar = |name: &str| -> Result<f64> {
        scalar(read_tab_vec(&model_dir.join(name))?, name)
    };

    let storage_max_rows: Vec<NodeRow> =
        read_tab_vec_optional(&model_dir.join("Hydrogen_StorageMaxCapacity.tab"))?;

    let hydrogen = Hydrogen {
        electrolyzer_capital_cost: read_period("Hydrogen_ElectrolyzerCapitalCost.tab")?,
        electrolyzer_fixed_om_cost: read_period("Hydrogen_ElectrolyzerFixedOMCost.tab")?,
        electrolyzer_power_use: read_period("Hydrogen_ElectrolyzerPowerUse.tab")?,
        electrolyzer_lifetime: read_scalar("Hydrogen_ElectrolyzerLifetime.tab")?,
        reformer_capital_cost: read_plant_period("Hydrogen_ReformerCapitalCost.tab")?,
        reformer_fixed_om_cost: read_plant_period("Hydrogen_ReformerFixedOMCost.tab")?,
        reformer_variable_om_cost: read_plant_period("Hydrogen_ReformerVariableOMCost.tab")?,
        reformer_gas_use: read_plant("Hydrogen_ReformerGasUse.tab")?,
        reformer_power_use: read_plant("Hydrogen_ReformerPowerUse.tab")?,
        reformer_co2_emitted: read_plant("Hydrogen_ReformerCO2Emitted.tab")?,
        reformer_co2_captured: read_plant("Hydrogen_ReformerCO2Captured.tab")?,
        reformer_lifetime: read_plant("Hydrogen_ReformerLifetime.tab")?,
        storage_capital_cost: read_period("Hydrogen_StorageCapitalCost.tab")?,
        storage_max_capacity: storage_max_rows
            .into_iter()
            .map(|r| (r.node, r.value))
            .collect(),
        storage_lifetime: read_scalar("Hydrogen_StorageLifetime.tab")?,
        pipeline_capital_cost: read_period("Hydrogen_PipelineCapitalCost.tab")?,
        pipeline_om_cost: read_period("Hydrogen_PipelineOMCost.tab")?,
        pipeline_compressor_power_use: read_scalar("Hydrogen_PipelineCompressorPowerUse.tab")?,
        pipeline_lifetime: read_scalar("Hydrogen_PipelineLifetime.tab")?,
        reformers,
    };
    hydrogen.validate()?;
    Ok(hydrogen)
}

impl Hydrogen {
    /// Cross-check that each reformer has the parameters it needs
    pub fn validate(&self) -> Result<()> {
        for id in self.reformers.keys() {
            for (name, table) in [
                ("gas use", &self.reformer_gas_use),
                ("power use", &self.reformer_power_use),
                ("CO2 emission factor", &self.reformer_co2_emitted),
                ("CO2 capture factor", &self.reformer_co2_captured),
                ("lifetime", &self.reformer_lifetime),
            ] {
                table
                    .get(id)
                    .with_context(|| format!("No {name} given for reformer plant {id}"))?;
            }
        }
        Ok(())
    }

    /// Pipeline capital cost for a corridor of `length_km`, EUR/MW
    pub fn pipeline_capital_cost(&self, length_km: f64, period: u32) -> Result<f64> {
        let per_km = self
            .pipeline_capital_cost
            .get(&period)
            .with_context(|| format!("No hydrogen pipeline capital cost for period {period}"))?;
        Ok(per_km * length_km)
    }

    /// Compressor draw for flow over a corridor of `length_km`, MWh el per MWh H2
    pub fn compressor_power_use(&self, length_km: f64) -> f64 {
        self.pipeline_compressor_power_use * length_km
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_reformer_validation_requires_factors() {
        let mut hydrogen = Hydrogen::default();
        let id: PlantID = "SMR".into();
        hydrogen
            .reformers
            .insert(id.clone(), Reformer { id: id.clone() });
        assert!(hydrogen.validate().is_err());
        hydrogen.reformer_gas_use.insert(id.clone(), 1.3);
        hydrogen.reformer_power_use.insert(id.clone(), 0.02);
        hydrogen.reformer_co2_emitted.insert(id.clone(), 0.25);
        hydrogen.reformer_co2_captured.insert(id.clone(), 0.0);
        hydrogen.reformer_lifetime.insert(id, 25.0);
        assert!(hydrogen.validate().is_ok());
    }

    #[test]
    fn test_pipeline_costs_scale_with_length() {
        let mut hydrogen = Hydrogen::default();
        hydrogen.pipeline_capital_cost.insert(1, 500.0);
        hydrogen.pipeline_compressor_power_use = 2e-5;
        assert_approx_eq!(
            f64,
            hydrogen.pipeline_capital_cost(100.0, 1).unwrap(),
            50_000.0
        );
        assert_approx_eq!(f64, hydrogen.compressor_power_use(100.0), 2e-3);
        assert!(hydrogen.pipeline_capital_cost(100.0, 2).is_err());
    }
}
