//! The static model: every catalog and parameter table loaded and
//! cross-checked, ready for sampling and problem assembly.
use crate::co2::{read_co2, Co2};
use crate::generator::{read_generators, Generators};
use crate::heat::{read_heat, Heat};
use crate::hydrogen::{read_hydrogen, Hydrogen};
use crate::id::NodeID;
use crate::industry::{read_industry, Industry};
use crate::input::read_tab_vec;
use crate::natural_gas::{read_natural_gas, NaturalGas};
use crate::storage::{read_storages, Storages};
use crate::time::{Temporal, TemporalSpec};
use crate::topology::{read_topology, Topology};
use crate::transmission::{read_transmission, Transmission};
use anyhow::{ensure, Context, Result};
use log::info;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Which optional modules to load and assemble
#[derive(Clone, Copy, Debug, Default)]
pub struct ModuleToggles {
    /// Heat balance, heat generators/storages and converters
    pub heat: bool,
    /// Hydrogen, natural gas, CO2 and industry together
    pub supply_chain: bool,
}

/// System-wide economic parameters
#[derive(Clone, Debug, Default)]
pub struct Economics {
    /// Weighted average cost of capital used in annuitisation
    pub wacc: f64,
    /// Social discount rate between periods
    pub discount_rate: f64,
    /// System-wide emission cap per period, t (empty when uncapped)
    pub co2_cap: HashMap<u32, f64>,
    /// CO2 price per period, EUR/t (applied when uncapped)
    pub co2_price: HashMap<u32, f64>,
    /// Cumulative bio feedstock available per period, MWh
    pub available_bio_energy: HashMap<u32, f64>,
}

/// The hydrogen supply chain and its coupled carriers, loaded as one unit
#[derive(Clone, Debug)]
pub struct SupplyChain {
    /// Hydrogen production, storage and pipelines
    pub hydrogen: Hydrogen,
    /// Gas terminals, reserves and pipelines
    pub natural_gas: NaturalGas,
    /// CO2 pipelines and sequestration
    pub co2: Co2,
    /// Industrial plants and exogenous demands
    pub industry: Industry,
}

/// Everything read from the model directory
#[derive(Clone, Debug)]
pub struct Model {
    /// Directory the tables were read from
    pub model_dir: PathBuf,
    /// Temporal index sets
    pub temporal: Temporal,
    /// Nodes, links and canonical arcs
    pub topology: Topology,
    /// Generator catalog and parameters
    pub generators: Generators,
    /// Storage catalog and parameters
    pub storages: Storages,
    /// Transmission cost and limit tables
    pub transmission: Transmission,
    /// Economic parameters
    pub economics: Economics,
    /// Annual electric demand, MWh/yr
    pub electric_annual_demand: HashMap<(NodeID, u32), f64>,
    /// Value of lost electric load, EUR/MWh
    pub lost_load_cost: HashMap<(NodeID, u32), f64>,
    /// Annual energy budget of regulated hydro per node, MWh/yr
    pub hydro_max_annual_production: HashMap<NodeID, f64>,
    /// Heat module tables, when enabled
    pub heat: Option<Heat>,
    /// Supply-chain module tables, when enabled
    pub supply_chain: Option<SupplyChain>,
}

#[derive(Deserialize)]
struct SeasonScaleRow {
    #[serde(rename = "Season")]
    season: String,
    #[serde(rename = "Value")]
    value: f64,
}

#[derive(Deserialize)]
struct ValueRow {
    #[serde(rename = "Value")]
    value: f64,
}

#[derive(Deserialize)]
struct PeriodRow {
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
struct NodeRow {
    #[serde(rename = "Node")]
    node: NodeID,
    #[serde(rename = "Value")]
    value: f64,
}

fn read_scalar(model_dir: &Path, name: &str) -> Result<f64> {
    let rows: Vec<ValueRow> = read_tab_vec(&model_dir.join(name))?;
    ensure!(rows.len() == 1, "Table {name} must contain exactly one value");
    Ok(rows[0].value)
}

fn read_period_param(model_dir: &Path, name: &str) -> Result<HashMap<u32, f64>> {
    let rows: Vec<PeriodRow> = crate::input::read_tab_vec_optional(&model_dir.join(name))?;
    Ok(rows.into_iter().map(|r| (r.period, r.value)).collect())
}

fn read_node_period_param(model_dir: &Path, name: &str) -> Result<HashMap<(NodeID, u32), f64>> {
    let rows: Vec<NodePeriodRow> = read_tab_vec(&model_dir.join(name))?;
    Ok(rows
        .into_iter()
        .map(|r| ((r.node, r.period), r.value))
        .collect())
}

/// Read the season repetition factors
fn read_season_scale(model_dir: &Path) -> Result<HashMap<Rc<str>, f64>> {
    let rows: Vec<SeasonScaleRow> = read_tab_vec(&model_dir.join("General_SeasonScale.tab"))?;
    Ok(rows
        .into_iter()
        .map(|r| (Rc::from(r.season.as_str()), r.value))
        .collect())
}

impl Model {
    /// Read and cross-check the full model from `model_dir`
    pub fn from_path(
        model_dir: &Path,
        spec: &TemporalSpec,
        toggles: &ModuleToggles,
    ) -> Result<Model> {
        let season_scale = read_season_scale(model_dir)?;
        let temporal = Temporal::build(spec, &season_scale)
            .context("Failed to build the temporal structure")?;

        let topology = read_topology(model_dir).context("Failed to read the topology tables")?;
        let node_ids = topology.nodes.keys().cloned().collect();
        let generators = read_generators(model_dir, &node_ids)
            .context("Failed to read the generator tables")?;
        let storages = read_storages(model_dir).context("Failed to read the storage tables")?;
        let transmission =
            read_transmission(model_dir).context("Failed to read the transmission tables")?;

        let economics = Economics {
            wacc: read_scalar(model_dir, "General_WACC.tab")?,
            discount_rate: read_scalar(model_dir, "General_DiscountRate.tab")?,
            co2_cap: read_period_param(model_dir, "General_CO2Cap.tab")?,
            co2_price: read_period_param(model_dir, "General_CO2Price.tab")?,
            available_bio_energy: read_period_param(model_dir, "General_AvailableBioEnergy.tab")?,
        };
        ensure!(
            economics.wacc > 0.0 && economics.discount_rate > 0.0,
            "WACC and discount rate must be positive"
        );

        let electric_annual_demand =
            read_node_period_param(model_dir, "Node_ElectricAnnualDemand.tab")?;
        let lost_load_cost = read_node_period_param(model_dir, "Node_LostLoadCost.tab")?;
        let hydro_rows: Vec<NodeRow> = crate::input::read_tab_vec_optional(
            &model_dir.join("Node_HydroGenMaxAnnualProduction.tab"),
        )?;
        let hydro_max_annual_production =
            hydro_rows.into_iter().map(|r| (r.node, r.value)).collect();

        let heat = toggles
            .heat
            .then(|| read_heat(model_dir).context("Failed to read the heat tables"))
            .transpose()?;
        let supply_chain = toggles
            .supply_chain
            .then(|| -> Result<SupplyChain> {
                Ok(SupplyChain {
                    hydrogen: read_hydrogen(model_dir)
                        .context("Failed to read the hydrogen tables")?,
                    natural_gas: read_natural_gas(model_dir)
                        .context("Failed to read the natural-gas tables")?,
                    co2: read_co2(model_dir).context("Failed to read the CO2 tables")?,
                    industry: read_industry(model_dir)
                        .context("Failed to read the industry tables")?,
                })
            })
            .transpose()?;

        let model = Model {
            model_dir: model_dir.to_path_buf(),
            temporal,
            topology,
            generators,
            storages,
            transmission,
            economics,
            electric_annual_demand,
            lost_load_cost,
            hydro_max_annual_production,
            heat,
            supply_chain,
        };
        model.validate()?;
        info!(
            "Loaded model with {} nodes, {} generators, {} storages over {} periods",
            model.topology.nodes.len(),
            model.generators.catalog.len(),
            model.storages.catalog.len(),
            model.temporal.periods.len()
        );
        Ok(model)
    }

    /// Cross-table checks that no single reader can perform
    pub fn validate(&self) -> Result<()> {
        for (node, _) in self.generators.of_node.iter() {
            ensure!(
                self.topology.nodes.contains_key(node),
                "Generator placement names unknown node {node}"
            );
        }
        for (node, _) in self.storages.of_node.iter() {
            ensure!(
                self.topology.nodes.contains_key(node),
                "Storage placement names unknown node {node}"
            );
        }
        for node in self.topology.nodes.values().filter(|n| n.is_onshore()) {
            for period in &self.temporal.periods {
                ensure!(
                    self.electric_annual_demand
                        .contains_key(&(node.id.clone(), *period)),
                    "No annual electric demand for node {} in period {period}",
                    node.id
                );
                ensure!(
                    self.lost_load_cost.contains_key(&(node.id.clone(), *period)),
                    "No lost-load cost for node {} in period {period}",
                    node.id
                );
            }
        }
        if let Some(chain) = &self.supply_chain {
            for terminal in chain.natural_gas.terminals.values() {
                let node = self
                    .topology
                    .nodes
                    .get(&terminal.node)
                    .with_context(|| {
                        format!("Gas terminal {} sits at unknown node {}", terminal.id, terminal.node)
                    })?;
                ensure!(
                    node.tags.natural_gas,
                    "Gas terminal {} sits at non-gas node {}",
                    terminal.id,
                    node.id
                );
            }
        }
        Ok(())
    }

    /// Whether the system-wide emission cap rows should be assembled
    pub fn has_emission_cap(&self) -> bool {
        !self.economics.co2_cap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::Generators;
    use crate::storage::Storages;
    use crate::time::N_PEAK_SEASONS;

    fn toy_temporal() -> Temporal {
        let spec = TemporalSpec {
            n_periods: 2,
            period_step_years: 5,
            n_scenarios: 1,
            regular_season_hours: 24,
            peak_season_hours: 2,
        };
        let scales = [
            (Rc::from("winter"), 13.0),
            (Rc::from("spring"), 13.0),
            (Rc::from("summer"), 13.0),
            (Rc::from("fall"), 13.0),
        ]
        .into_iter()
        .collect();
        Temporal::build(&spec, &scales).unwrap()
    }

    #[test]
    fn test_toy_temporal_shape() {
        let temporal = toy_temporal();
        assert_eq!(temporal.seasons.len(), 4 + N_PEAK_SEASONS);
        assert_eq!(temporal.n_hours, 4 * 24 + 2 * 2);
    }

    #[test]
    fn test_validate_wants_demand_for_onshore_nodes() {
        let mut topology = crate::topology::Topology::default();
        let id: NodeID = "NO1".into();
        topology.nodes.insert(
            id.clone(),
            crate::topology::Node {
                id: id.clone(),
                tags: Default::default(),
                latitude: 60.0,
                longitude: 10.0,
            },
        );
        let model = Model {
            model_dir: PathBuf::new(),
            temporal: toy_temporal(),
            topology,
            generators: Generators::default(),
            storages: Storages::default(),
            transmission: Transmission::default(),
            economics: Economics::default(),
            electric_annual_demand: HashMap::new(),
            lost_load_cost: HashMap::new(),
            hydro_max_annual_production: HashMap::new(),
            heat: None,
            supply_chain: None,
        };
        assert!(model.validate().is_err());
    }
}
