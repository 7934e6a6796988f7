//! The generator catalog and its parameter tables.
//!
//! Generators are classified by explicit typed tags on the catalog entry
//! (fuel, dispatch kind, output carrier, CHP flag) assigned at ingestion
//! time. Carrier-specific generator subsets (hydrogen-fuelled, gas-fuelled,
//! bio-fuelled, ...) are derived from these tags, never from the generator
//! name.
use crate::id::{GeneratorID, NodeID, TechnologyID};
use crate::input::{read_tab_vec, read_tab_vec_optional};
use anyhow::{ensure, Context, Result};
use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Fuel burned by a generator, if any
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Fuel {
    /// Hard coal or lignite
    Coal,
    /// Natural gas, drawn from the gas balance
    Gas,
    /// Fuel oil
    Oil,
    /// Biomass, bounded by the cumulative bio-energy budget
    Bio,
    /// Uranium
    Nuclear,
    /// Hydrogen, drawn from the hydrogen balance
    Hydrogen,
    /// No fuel (wind, solar, hydro)
    None,
}

/// Dispatch behaviour of a generator
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorKind {
    /// Output is free up to installed capacity, subject to ramping
    Dispatchable,
    /// Output is bounded by the sampled hourly availability profile
    Intermittent,
    /// Reservoir hydro, bounded by seasonal and annual energy budgets
    HydroRegulated,
    /// Run-of-river hydro, bounded by the sampled hourly profile
    HydroRunOfRiver,
}

/// The carrier a generator produces
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputCarrier {
    /// Electric power
    Electricity,
    /// District or process heat (heat module only)
    Heat,
}

/// Which sampled hourly series bounds a profile-driven generator
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    /// Solar PV capacity factors
    Solar,
    /// Onshore wind capacity factors
    WindOnshore,
    /// Offshore wind capacity factors
    WindOffshore,
    /// Run-of-river hydro inflow factors
    HydroRunOfRiver,
}

/// One catalog entry
#[derive(Clone, Debug, Deserialize)]
pub struct Generator {
    /// Generator identifier
    #[serde(rename = "Generator")]
    pub id: GeneratorID,
    /// The technology the generator belongs to
    #[serde(rename = "Technology")]
    pub technology: TechnologyID,
    /// Fuel tag
    #[serde(rename = "Fuel")]
    pub fuel: Fuel,
    /// Dispatch kind tag
    #[serde(rename = "Kind")]
    pub kind: GeneratorKind,
    /// Output carrier tag
    #[serde(rename = "Carrier")]
    pub carrier: OutputCarrier,
    /// Whether the unit co-generates electricity alongside heat
    #[serde(rename = "CHP")]
    pub chp: bool,
    /// Sampled series bounding output, for intermittent and run-of-river units
    #[serde(rename = "Profile", default)]
    pub profile: Option<ProfileKind>,
}

/// Map of a per-generator scalar parameter
pub type GenParam = HashMap<GeneratorID, f64>;
/// Map of a per-(generator, period) parameter
pub type GenPeriodParam = HashMap<(GeneratorID, u32), f64>;
/// Map of a per-(node, generator, period) parameter
pub type NodeGenPeriodParam = HashMap<(NodeID, GeneratorID, u32), f64>;

/// The generator catalog plus every raw generator parameter table
#[derive(Clone, Debug, Default)]
pub struct Generators {
    /// Catalog entries keyed by ID
    pub catalog: IndexMap<GeneratorID, Generator>,
    /// All technologies referenced by the catalog
    pub technologies: IndexSet<TechnologyID>,
    /// Which generators are installable at which node
    pub of_node: IndexMap<NodeID, Vec<GeneratorID>>,
    /// Capital cost, EUR/MW
    pub capital_cost: GenPeriodParam,
    /// Fixed O&M cost, EUR/MW/yr
    pub fixed_om_cost: GenPeriodParam,
    /// Variable O&M cost, EUR/MWh
    pub variable_om_cost: GenParam,
    /// Fuel cost, EUR/MWh fuel
    pub fuel_cost: GenPeriodParam,
    /// CCS transport-and-storage cost, EUR/tCO2 captured
    pub ccs_cost: GenParam,
    /// Fuel-to-output efficiency
    pub efficiency: GenPeriodParam,
    /// Heat-to-electricity co-generation efficiency for CHP units
    pub chp_efficiency: GenPeriodParam,
    /// Reference existing capacity per node, MW
    pub ref_initial_capacity: HashMap<(NodeID, GeneratorID), f64>,
    /// Retirement scale factor per period for pre-horizon capacity
    pub scale_factor_initial_capacity: GenPeriodParam,
    /// Directly supplied initial capacity, MW (overrides the decay rule)
    pub initial_capacity: NodeGenPeriodParam,
    /// Upper bound on capacity built per period, MW
    pub max_built_capacity: NodeGenPeriodParam,
    /// Upper bound on installed capacity, MW
    pub max_installed_capacity: HashMap<(NodeID, GeneratorID), f64>,
    /// Hourly ramp limit as a share of installed capacity
    pub ramp_rate: GenParam,
    /// Deterministic availability factor of the generator type
    pub type_availability: GenParam,
    /// Emissions per unit fuel, tCO2/MWh fuel
    pub co2_content: GenParam,
    /// Captured share of emissions for CCS units, tCO2/MWh fuel
    pub co2_captured: GenParam,
    /// Physical lifetime, years
    pub lifetime: GenParam,
}

#[derive(Deserialize)]
struct GenRow {
    #[serde(rename = "Generator")]
    generator: GeneratorID,
    #[serde(rename = "Value")]
    value: f64,
}

#[derive(Deserialize)]
struct GenPeriodRow {
    #[serde(rename = "Generator")]
    generator: GeneratorID,
    #[serde(rename = "Period")]
    period: u32,
    #[serde(rename = "Value")]
    value: f64,
}

#[derive(Deserialize)]
struct NodeGenRow {
    #[serde(rename = "Node")]
    node: NodeID,
    #[serde(rename = "Generator")]
    generator: GeneratorID,
    #[serde(rename = "Value")]
    value: f64,
}

#[derive(Deserialize)]
struct NodeGenPeriodRow {
    #[serde(rename = "Node")]
    node: NodeID,
    #[serde(rename = "Generator")]
    generator: GeneratorID,
    #[serde(rename = "Period")]
    period: u32,
    #[serde(rename = "Value")]
    value: f64,
}

#[derive(Deserialize)]
struct GeneratorsOfNodeRow {
    #[serde(rename = "Node")]
    node: NodeID,
    #[serde(rename = "Generator")]
    generator: GeneratorID,
}

fn gen_param(rows: Vec<GenRow>) -> GenParam {
    rows.into_iter().map(|r| (r.generator, r.value)).collect()
}

fn gen_period_param(rows: Vec<GenPeriodRow>) -> GenPeriodParam {
    rows.into_iter()
        .map(|r| ((r.generator, r.period), r.value))
        .collect()
}

fn node_gen_period_param(rows: Vec<NodeGenPeriodRow>) -> NodeGenPeriodParam {
    rows.into_iter()
        .map(|r| ((r.node, r.generator, r.period), r.value))
        .collect()
}

/// Read the generator catalog and parameter tables from `model_dir`.
///
/// `node_ids` is used to validate the `GeneratorsOfNode` table.
pub fn read_generators(model_dir: &Path, node_ids: &IndexSet<NodeID>) -> Result<Generators> {
    let catalog_rows: Vec<Generator> = read_tab_vec(&model_dir.join("Sets_Generators.tab"))?;
    let mut catalog = IndexMap::new();
    for entry in catalog_rows {
        ensure!(
            catalog.insert(entry.id.clone(), entry.clone()).is_none(),
            "Duplicate generator {} in catalog",
            entry.id
        );
    }
    let technologies: IndexSet<TechnologyID> =
        catalog.values().map(|g| g.technology.clone()).collect();

    let of_node_rows: Vec<GeneratorsOfNodeRow> =
        read_tab_vec(&model_dir.join("Sets_GeneratorsOfNode.tab"))?;
    let mut of_node: IndexMap<NodeID, Vec<GeneratorID>> = IndexMap::new();
    for row in of_node_rows {
        ensure!(
            node_ids.contains(&row.node),
            "GeneratorsOfNode names unknown node {}",
            row.node
        );
        ensure!(
            catalog.contains_key(&row.generator),
            "GeneratorsOfNode names unknown generator {}",
            row.generator
        );
        of_node.entry(row.node).or_default().push(row.generator);
    }

    let read_gen = |name: &str| -> Result<GenParam> {
        Ok(gen_param(read_tab_vec(&model_dir.join(name))?))
    };
    let read_gen_opt = |name: &str| -> Result<GenParam> {
        Ok(gen_param(read_tab_vec_optional(&model_dir.join(name))?))
    };
    let read_gen_period = |name: &str| -> Result<GenPeriodParam> {
        Ok(gen_period_param(read_tab_vec(&model_dir.join(name))?))
    };
    let read_gen_period_opt = |name: &str| -> Result<GenPeriodParam> {
        Ok(gen_period_param(read_tab_vec_optional(&model_dir.join(name))?))
    };

    let ref_initial_capacity: Vec<NodeGenRow> =
        read_tab_vec_optional(&model_dir.join("Generator_RefInitialCap.tab"))?;
    let max_installed: Vec<NodeGenRow> =
        read_tab_vec(&model_dir.join("Generator_MaxInstalledCapacity.tab"))?;

    let generators = Generators {
        capital_cost: read_gen_period("Generator_CapitalCosts.tab")?,
        fixed_om_cost: read_gen_period("Generator_FixedOMCosts.tab")?,
        variable_om_cost: read_gen("Generator_VariableOMCosts.tab")?,
        fuel_cost: read_gen_period_opt("Generator_FuelCosts.tab")?,
        ccs_cost: read_gen_opt("Generator_CCSCostTSVariable.tab")?,
        efficiency: read_gen_period("Generator_Efficiency.tab")?,
        chp_efficiency: read_gen_period_opt("Generator_CHPEfficiency.tab")?,
        ref_initial_capacity: ref_initial_capacity
            .into_iter()
            .map(|r| ((r.node, r.generator), r.value))
            .collect(),
        scale_factor_initial_capacity: read_gen_period_opt(
            "Generator_ScaleFactorInitialCap.tab",
        )?,
        initial_capacity: node_gen_period_param(read_tab_vec_optional(
            &model_dir.join("Generator_InitialCapacity.tab"),
        )?),
        max_built_capacity: node_gen_period_param(read_tab_vec(
            &model_dir.join("Generator_MaxBuiltCapacity.tab"),
        )?),
        max_installed_capacity: max_installed
            .into_iter()
            .map(|r| ((r.node, r.generator), r.value))
            .collect(),
        ramp_rate: read_gen_opt("Generator_RampRate.tab")?,
        type_availability: read_gen("Generator_GeneratorTypeAvailability.tab")?,
        co2_content: read_gen("Generator_CO2Content.tab")?,
        co2_captured: read_gen_opt("Generator_CO2Captured.tab")?,
        lifetime: read_gen("Generator_Lifetime.tab")?,
        catalog,
        technologies,
        of_node,
    };
    generators.validate()?;
    Ok(generators)
}

impl Generators {
    /// Cross-check that each catalog entry has the parameters it needs
    pub fn validate(&self) -> Result<()> {
        for gen in self.catalog.values() {
            self.lifetime
                .get(&gen.id)
                .with_context(|| format!("No lifetime given for generator {}", gen.id))?;
            if gen.chp {
                ensure!(
                    self.chp_efficiency.keys().any(|(id, _)| *id == gen.id),
                    "CHP generator {} has no CHP efficiency entries",
                    gen.id
                );
            }
            if self.is_profile_bounded(&gen.id) {
                ensure!(
                    gen.profile.is_some(),
                    "Profile-driven generator {} names no profile series",
                    gen.id
                );
            }
            if gen.fuel != Fuel::None {
                ensure!(
                    self.fuel_cost.keys().any(|(id, _)| *id == gen.id),
                    "Fuelled generator {} has no fuel cost entries",
                    gen.id
                );
            } else {
                // emission terms divide by efficiency, which only fuelled
                // generators are guaranteed to carry
                ensure!(
                    self.co2_content.get(&gen.id).copied().unwrap_or(0.0) == 0.0,
                    "Unfuelled generator {} declares a CO2 content",
                    gen.id
                );
            }
        }
        Ok(())
    }

    /// Generators installable at `node`
    pub fn at_node(&self, node: &NodeID) -> &[GeneratorID] {
        self.of_node.get(node).map_or(&[], Vec::as_slice)
    }

    /// Catalog entries carrying a given fuel tag
    pub fn with_fuel(&self, fuel: Fuel) -> impl Iterator<Item = &Generator> {
        self.catalog.values().filter(move |g| g.fuel == fuel)
    }

    /// Whether output is bounded by the sampled stochastic profile
    pub fn is_profile_bounded(&self, id: &GeneratorID) -> bool {
        matches!(
            self.catalog[id].kind,
            GeneratorKind::Intermittent | GeneratorKind::HydroRunOfRiver
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, fuel: Fuel, kind: GeneratorKind) -> Generator {
        Generator {
            id: id.into(),
            technology: "tech".into(),
            fuel,
            kind,
            carrier: OutputCarrier::Electricity,
            chp: false,
            profile: matches!(kind, GeneratorKind::Intermittent)
                .then_some(ProfileKind::WindOnshore),
        }
    }

    fn minimal() -> Generators {
        let mut generators = Generators::default();
        for gen in [
            entry("CCGT", Fuel::Gas, GeneratorKind::Dispatchable),
            entry("Wind", Fuel::None, GeneratorKind::Intermittent),
        ] {
            generators.lifetime.insert(gen.id.clone(), 25.0);
            generators.catalog.insert(gen.id.clone(), gen);
        }
        generators
            .fuel_cost
            .insert(("CCGT".into(), 1), 30.0);
        generators
    }

    #[test]
    fn test_validate_requires_fuel_cost() {
        let mut generators = minimal();
        assert!(generators.validate().is_ok());
        generators.fuel_cost.clear();
        assert!(generators.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_co2_content_without_fuel() {
        let mut generators = minimal();
        generators.co2_content.insert("Wind".into(), 0.2);
        assert!(generators.validate().is_err());
    }

    #[test]
    fn test_typed_subsets() {
        let generators = minimal();
        let gas: Vec<_> = generators.with_fuel(Fuel::Gas).collect();
        assert_eq!(gas.len(), 1);
        assert_eq!(gas[0].id, "CCGT".into());
        assert!(generators.is_profile_bounded(&"Wind".into()));
        assert!(!generators.is_profile_bounded(&"CCGT".into()));
    }
}
