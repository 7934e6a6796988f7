//! Industrial sector parameters.
//!
//! Steel, cement and ammonia plants are capacity variables whose operation
//! pulls feedstock from the carrier balances through typed per-unit
//! consumption coefficients. Oil refining and transport are exogenous
//! demand schedules that enter the balances as constants.
use crate::id::{NodeID, PlantID};
use crate::input::{read_tab_vec, read_tab_vec_optional};
use anyhow::{ensure, Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Industrial sector a plant design belongs to
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Sector {
    /// Primary and secondary steelmaking
    Steel,
    /// Cement clinker production
    Cement,
    /// Ammonia synthesis
    Ammonia,
}

/// One plant design in the industry catalog
#[derive(Clone, Debug, Deserialize)]
pub struct Plant {
    /// Plant identifier
    #[serde(rename = "Plant")]
    pub id: PlantID,
    /// Sector tag
    #[serde(rename = "Sector")]
    pub sector: Sector,
}

/// Per-unit feedstock draws of a plant design, per tonne of product
#[derive(Clone, Copy, Debug, Default)]
pub struct Consumption {
    /// Electricity, MWh/t
    pub power: f64,
    /// Natural gas, MWh/t
    pub gas: f64,
    /// Hydrogen, MWh/t
    pub hydrogen: f64,
    /// Coal, MWh/t
    pub coal: f64,
    /// Bio feedstock, MWh/t
    pub bio: f64,
    /// Oil products, MWh/t
    pub oil: f64,
}

/// Map of a per-(plant, period) parameter
pub type PlantPeriodParam = HashMap<(PlantID, u32), f64>;
/// Map of a per-(node, period) demand schedule
pub type NodePeriodParam = HashMap<(NodeID, u32), f64>;

/// Industry catalog and parameter tables
#[derive(Clone, Debug, Default)]
pub struct Industry {
    /// Plant catalog
    pub plants: IndexMap<PlantID, Plant>,
    /// Feedstock coefficients per plant design
    pub consumption: HashMap<PlantID, Consumption>,
    /// CO2 emitted to atmosphere, t/t product
    pub co2_emitted: HashMap<PlantID, f64>,
    /// CO2 captured, t/t product
    pub co2_captured: HashMap<PlantID, f64>,
    /// Capital cost, EUR/(t/h)
    pub capital_cost: PlantPeriodParam,
    /// Fixed O&M cost, EUR/(t/h)/yr
    pub fixed_om_cost: PlantPeriodParam,
    /// Variable O&M cost, EUR/t
    pub variable_om_cost: PlantPeriodParam,
    /// Plant lifetime, years
    pub lifetime: HashMap<PlantID, f64>,
    /// Pre-existing production capacity, t/h
    pub initial_capacity: HashMap<(NodeID, PlantID, u32), f64>,
    /// Required yearly output per sector, node and period, t/yr
    pub yearly_production: HashMap<(Sector, NodeID, u32), f64>,
    /// Refinery hydrogen draw, MWh/yr
    pub refinery_hydrogen_use: NodePeriodParam,
    /// Refinery electricity draw, MWh/yr
    pub refinery_power_use: NodePeriodParam,
    /// Transport electricity demand, MWh/yr
    pub transport_electricity_demand: NodePeriodParam,
    /// Transport hydrogen demand, MWh/yr
    pub transport_hydrogen_demand: NodePeriodParam,
    /// Transport natural-gas demand, MWh/yr
    pub transport_gas_demand: NodePeriodParam,
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
struct NodePlantPeriodRow {
    #[serde(rename = "Node")]
    node: NodeID,
    #[serde(rename = "Plant")]
    plant: PlantID,
    #[serde(rename = "Period")]
    period: u32,
    #[serde(rename = "Value")]
    value: f64,
}

#[derive(Deserialize)]
struct SectorNodePeriodRow {
    #[serde(rename = "Sector")]
    sector: Sector,
    #[serde(rename = "Node")]
    node: NodeID,
    #[serde(rename = "Period")]
    period: u32,
    #[serde(rename = "Value")]
    value: f64,
}

#[derive(Deserialize)]
struct NodePeriodRow {
    #[serde(rename = "Node")]
    node: NodeID,
    #[serde(rename = "Period")]
    period: u32,
    #[serde(rename = "Value")]
    value: f64,
}

#[derive(Deserialize)]
struct ConsumptionRow {
    #[serde(rename = "Plant")]
    plant: PlantID,
    #[serde(rename = "Power")]
    power: f64,
    #[serde(rename = "Gas")]
    gas: f64,
    #[serde(rename = "Hydrogen")]
    hydrogen: f64,
    #[serde(rename = "Coal")]
    coal: f64,
    #[serde(rename = "Bio")]
    bio: f64,
    #[serde(rename = "Oil")]
    oil: f64,
}

fn plant_param(rows: Vec<PlantRow>) -> HashMap<PlantID, f64> {
    rows.into_iter().map(|r| (r.plant, r.value)).collect()
}

fn plant_period_param(rows: Vec<PlantPeriodRow>) -> PlantPeriodParam {
    rows.into_iter()
        .map(|r| ((r.plant, r.period), r.value))
        .collect()
}

fn node_period_param(rows: Vec<NodePeriodRow>) -> NodePeriodParam {
    rows.into_iter()
        .map(|r| ((r.node, r.period), r.value))
        .collect()
}

/// Read the industry tables from `model_dir`
pub fn read_industry(model_dir: &Path) -> Result<Industry> {
    let plant_rows: Vec<Plant> = read_tab_vec(&model_dir.join("Sets_IndustryPlants.tab"))?;
    let mut plants = IndexMap::new();
    for entry in plant_rows {
        ensure!(
            plants.insert(entry.id.clone(), entry.clone()).is_none(),
            "Duplicate industry plant {} in catalog",
            entry.id
        );
    }

    let consumption_rows: Vec<ConsumptionRow> =
        read_tab_vec(&model_dir.join("Industry_Consumption.tab"))?;
    let consumption = consumption_rows
        .into_iter()
        .map(|r| {
            (
                r.plant,
                Consumption {
                    power: r.power,
                    gas: r.gas,
                    hydrogen: r.hydrogen,
                    coal: r.coal,
                    bio: r.bio,
                    oil: r.oil,
                },
            )
        })
        .collect();

    let initial_rows: Vec<NodePlantPeriodRow> =
        read_tab_vec_optional(&model_dir.join("Industry_InitialCapacity.tab"))?;
    let production_rows: Vec<SectorNodePeriodRow> =
        read_tab_vec(&model_dir.join("Industry_YearlyProduction.tab"))?;

    let read_node_period = |name: &str| -> Result<NodePeriodParam> {
        Ok(node_period_param(read_tab_vec_optional(
            &model_dir.join(name),
        )?))
    };

    let industry = Industry {
        consumption,
        co2_emitted: plant_param(read_tab_vec(&model_dir.join("Industry_CO2Emitted.tab"))?),
        co2_captured: plant_param(read_tab_vec(&model_dir.join("Industry_CO2Captured.tab"))?),
        capital_cost: plant_period_param(read_tab_vec(
            &model_dir.join("Industry_CapitalCost.tab"),
        )?),
        fixed_om_cost: plant_period_param(read_tab_vec(
            &model_dir.join("Industry_FixedOMCost.tab"),
        )?),
        variable_om_cost: plant_period_param(read_tab_vec(
            &model_dir.join("Industry_VariableOMCost.tab"),
        )?),
        lifetime: plant_param(read_tab_vec(&model_dir.join("Industry_Lifetime.tab"))?),
        initial_capacity: initial_rows
            .into_iter()
            .map(|r| ((r.node, r.plant, r.period), r.value))
            .collect(),
        yearly_production: production_rows
            .into_iter()
            .map(|r| ((r.sector, r.node, r.period), r.value))
            .collect(),
        refinery_hydrogen_use: read_node_period("Industry_RefineryHydrogenUse.tab")?,
        refinery_power_use: read_node_period("Industry_RefineryPowerUse.tab")?,
        transport_electricity_demand: read_node_period("Transport_ElectricityDemand.tab")?,
        transport_hydrogen_demand: read_node_period("Transport_HydrogenDemand.tab")?,
        transport_gas_demand: read_node_period("Transport_GasDemand.tab")?,
        plants,
    };
    industry.validate()?;
    Ok(industry)
}

impl Industry {
    /// Cross-check that every plant design has the parameters it needs
    pub fn validate(&self) -> Result<()> {
        for id in self.plants.keys() {
            for (name, present) in [
                ("consumption coefficients", self.consumption.contains_key(id)),
                ("CO2 emission factor", self.co2_emitted.contains_key(id)),
                ("CO2 capture factor", self.co2_captured.contains_key(id)),
                ("lifetime", self.lifetime.contains_key(id)),
            ] {
                ensure!(present, "No {name} given for industry plant {id}");
            }
        }
        Ok(())
    }

    /// Plant designs belonging to `sector`
    pub fn plants_in(&self, sector: Sector) -> impl Iterator<Item = &Plant> {
        self.plants.values().filter(move |p| p.sector == sector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_plant(sector: Sector) -> Industry {
        let mut industry = Industry::default();
        let id: PlantID = "EAF".into();
        industry.plants.insert(
            id.clone(),
            Plant {
                id: id.clone(),
                sector,
            },
        );
        industry.consumption.insert(
            id.clone(),
            Consumption {
                power: 0.6,
                ..Consumption::default()
            },
        );
        industry.co2_emitted.insert(id.clone(), 0.05);
        industry.co2_captured.insert(id.clone(), 0.0);
        industry.lifetime.insert(id, 25.0);
        industry
    }

    #[test]
    fn test_validate_wants_all_factors() {
        let mut industry = with_plant(Sector::Steel);
        assert!(industry.validate().is_ok());
        industry.lifetime.clear();
        assert!(industry.validate().is_err());
    }

    #[test]
    fn test_plants_in_filters_by_sector() {
        let industry = with_plant(Sector::Steel);
        assert_eq!(industry.plants_in(Sector::Steel).count(), 1);
        assert_eq!(industry.plants_in(Sector::Cement).count(), 0);
    }
}
