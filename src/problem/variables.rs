//! Decision variables and the ordered column map.
//!
//! Every column is identified by a [`VarKey`]. Investment variables come in
//! built/installed pairs per asset class; operational variables carry the
//! (period, scenario, hour) index. Objective coefficients are attached at
//! column creation, so there is no separate objective pass.
use super::objective::{
    emission_cost_coefficient, investment_cost_coefficient, operational_cost_coefficient,
};
use super::{BuildContext, ProblemBuilder, POWER_SCALE};
use crate::id::{ConverterID, GeneratorID, NodeID, PlantID, StorageID, TerminalID};
use crate::industry::Sector;
use crate::lifecycle::{annuitised_cost, yearly_cost};
use crate::topology::Node;
use anyhow::{ensure, Context, Result};
use highs::Col;
use indexmap::IndexMap;
use itertools::iproduct;

/// The carrier a flow or shed variable belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Carrier {
    /// Electric power
    Electricity,
    /// Heat
    Heat,
    /// Hydrogen
    Hydrogen,
    /// Natural gas
    NaturalGas,
    /// Captured CO2
    Co2,
}

/// Identifies one column of the program
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum VarKey {
    GenBuilt { node: NodeID, gen: GeneratorID, period: u32 },
    GenInstalled { node: NodeID, gen: GeneratorID, period: u32 },
    StorPowerBuilt { node: NodeID, storage: StorageID, period: u32 },
    StorPowerInstalled { node: NodeID, storage: StorageID, period: u32 },
    StorEnergyBuilt { node: NodeID, storage: StorageID, period: u32 },
    StorEnergyInstalled { node: NodeID, storage: StorageID, period: u32 },
    TransBuilt { from: NodeID, to: NodeID, period: u32 },
    TransInstalled { from: NodeID, to: NodeID, period: u32 },
    OffshoreConverterBuilt { node: NodeID, period: u32 },
    OffshoreConverterInstalled { node: NodeID, period: u32 },
    ConverterBuilt { node: NodeID, converter: ConverterID, period: u32 },
    ConverterInstalled { node: NodeID, converter: ConverterID, period: u32 },
    ElectrolyzerBuilt { node: NodeID, period: u32 },
    ElectrolyzerInstalled { node: NodeID, period: u32 },
    ReformerBuilt { node: NodeID, plant: PlantID, period: u32 },
    ReformerInstalled { node: NodeID, plant: PlantID, period: u32 },
    H2StorageBuilt { node: NodeID, period: u32 },
    H2StorageInstalled { node: NodeID, period: u32 },
    PipelineBuilt { carrier: Carrier, from: NodeID, to: NodeID, period: u32 },
    PipelineInstalled { carrier: Carrier, from: NodeID, to: NodeID, period: u32 },
    Co2SiteBuilt { node: NodeID, period: u32 },
    Co2SiteInstalled { node: NodeID, period: u32 },
    PlantBuilt { node: NodeID, plant: PlantID, period: u32 },
    PlantInstalled { node: NodeID, plant: PlantID, period: u32 },
    Generation { node: NodeID, gen: GeneratorID, period: u32, scenario: u32, hour: u32 },
    Charge { node: NodeID, storage: StorageID, period: u32, scenario: u32, hour: u32 },
    Discharge { node: NodeID, storage: StorageID, period: u32, scenario: u32, hour: u32 },
    Level { node: NodeID, storage: StorageID, period: u32, scenario: u32, hour: u32 },
    Flow { carrier: Carrier, from: NodeID, to: NodeID, period: u32, scenario: u32, hour: u32 },
    Shed { carrier: Carrier, node: NodeID, period: u32, scenario: u32, hour: u32 },
    ConverterUse { node: NodeID, converter: ConverterID, period: u32, scenario: u32, hour: u32 },
    ElectrolyzerOutput { node: NodeID, period: u32, scenario: u32, hour: u32 },
    ReformerOutput { node: NodeID, plant: PlantID, period: u32, scenario: u32, hour: u32 },
    H2Charge { node: NodeID, period: u32, scenario: u32, hour: u32 },
    H2Discharge { node: NodeID, period: u32, scenario: u32, hour: u32 },
    H2Level { node: NodeID, period: u32, scenario: u32, hour: u32 },
    TerminalImport { terminal: TerminalID, period: u32, scenario: u32, hour: u32 },
    GasExtraction { node: NodeID, period: u32, scenario: u32, hour: u32 },
    Sequestered { node: NodeID, period: u32, scenario: u32, hour: u32 },
    PlantProduction { node: NodeID, plant: PlantID, period: u32, scenario: u32, hour: u32 },
    IndustryShortfall { sector: Sector, node: NodeID, period: u32, scenario: u32 },
}

/// One recorded column
#[derive(Clone, Copy, Debug)]
pub struct ColumnRecord {
    /// The HiGHS column handle
    pub col: Col,
    /// Objective coefficient
    pub cost: f64,
    /// Upper bound, when finite
    pub upper: Option<f64>,
}

/// Insertion-ordered map from key to column
#[derive(Default)]
pub struct VariableMap(IndexMap<VarKey, ColumnRecord>);

impl VariableMap {
    /// Record a new column; a duplicate key is a bug in the assembly
    pub fn insert(&mut self, key: VarKey, record: ColumnRecord) -> Result<()> {
        ensure!(
            self.0.insert(key.clone(), record).is_none(),
            "Duplicate column {key:?}"
        );
        Ok(())
    }

    /// The HiGHS handle for a key
    pub fn get(&self, key: &VarKey) -> Result<Col> {
        Ok(self
            .0
            .get(key)
            .with_context(|| format!("No column {key:?}"))?
            .col)
    }

    /// Whether the key has a column
    pub fn contains(&self, key: &VarKey) -> bool {
        self.0.contains_key(key)
    }

    /// Position of a key in insertion order
    pub fn ordinal(&self, key: &VarKey) -> Result<usize> {
        self.0
            .get_index_of(key)
            .with_context(|| format!("No column {key:?}"))
    }

    /// Key and record at one insertion position
    pub fn by_ordinal(&self, ordinal: usize) -> (&VarKey, &ColumnRecord) {
        self.0.get_index(ordinal).expect("Column ordinal in range")
    }

    /// Iterate columns in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&VarKey, &ColumnRecord)> {
        self.0.iter()
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Add every column of the program
pub fn add_all(builder: &mut ProblemBuilder, ctx: &BuildContext) -> Result<()> {
    add_generator_investments(builder, ctx)?;
    add_storage_investments(builder, ctx)?;
    add_transmission_investments(builder, ctx)?;
    if ctx.model.heat.is_some() {
        add_converter_investments(builder, ctx)?;
    }
    if ctx.model.supply_chain.is_some() {
        add_supply_chain_investments(builder, ctx)?;
    }
    add_operations(builder, ctx)?;
    Ok(())
}

fn psh(ctx: &BuildContext) -> impl Iterator<Item = (u32, u32, u32)> {
    let temporal = &ctx.model.temporal;
    iproduct!(
        temporal.periods.clone(),
        temporal.scenarios.clone(),
        temporal.hours()
    )
}

fn scaled(bound: Option<f64>) -> Option<f64> {
    bound.map(|b| b * POWER_SCALE)
}

fn add_generator_investments(builder: &mut ProblemBuilder, ctx: &BuildContext) -> Result<()> {
    let model = ctx.model;
    for (node, gens) in &model.generators.of_node {
        for gen in gens {
            for &period in &model.temporal.periods {
                let annuity = *ctx
                    .derived
                    .gen_invest_cost
                    .get(&(gen.clone(), period))
                    .with_context(|| format!("No investment cost for {gen} in period {period}"))?;
                let cost = investment_cost_coefficient(model, period, annuity);
                let max_built = model
                    .generators
                    .max_built_capacity
                    .get(&(node.clone(), gen.clone(), period))
                    .copied();
                builder.add_variable(
                    VarKey::GenBuilt {
                        node: node.clone(),
                        gen: gen.clone(),
                        period,
                    },
                    cost,
                    scaled(max_built),
                )?;
                let ceiling = ctx
                    .derived
                    .gen_max_installed
                    .get(&(node.clone(), gen.clone()))
                    .copied();
                builder.add_variable(
                    VarKey::GenInstalled {
                        node: node.clone(),
                        gen: gen.clone(),
                        period,
                    },
                    0.0,
                    scaled(ceiling),
                )?;
            }
        }
    }
    Ok(())
}

/// Annuitised, discounted cost coefficient computed from raw cost tables
fn invest_cost(
    ctx: &BuildContext,
    period: u32,
    capital: f64,
    fixed_om: f64,
    lifetime: f64,
) -> f64 {
    let model = ctx.model;
    let yearly = yearly_cost(capital, fixed_om, lifetime, model.economics.wacc);
    let annuity = annuitised_cost(
        yearly,
        lifetime,
        model.temporal.remaining_years(period),
        model.economics.discount_rate,
    );
    investment_cost_coefficient(model, period, annuity)
}

fn add_storage_investments(builder: &mut ProblemBuilder, ctx: &BuildContext) -> Result<()> {
    let model = ctx.model;
    let storages = &model.storages;
    for (node, ids) in &storages.of_node {
        for storage in ids {
            let lifetime = storages.lifetime[storage];
            for &period in &model.temporal.periods {
                let power_cost = invest_cost(
                    ctx,
                    period,
                    *storages
                        .power_capital_cost
                        .get(&(storage.clone(), period))
                        .with_context(|| format!("No power capital cost for {storage}"))?,
                    *storages
                        .power_fixed_om_cost
                        .get(&(storage.clone(), period))
                        .unwrap_or(&0.0),
                    lifetime,
                );
                let energy_cost = invest_cost(
                    ctx,
                    period,
                    *storages
                        .energy_capital_cost
                        .get(&(storage.clone(), period))
                        .with_context(|| format!("No energy capital cost for {storage}"))?,
                    *storages
                        .energy_fixed_om_cost
                        .get(&(storage.clone(), period))
                        .unwrap_or(&0.0),
                    lifetime,
                );
                let key = (node.clone(), storage.clone(), period);
                builder.add_variable(
                    VarKey::StorPowerBuilt {
                        node: node.clone(),
                        storage: storage.clone(),
                        period,
                    },
                    power_cost,
                    scaled(storages.power_max_built_capacity.get(&key).copied()),
                )?;
                builder.add_variable(
                    VarKey::StorPowerInstalled {
                        node: node.clone(),
                        storage: storage.clone(),
                        period,
                    },
                    0.0,
                    scaled(
                        storages
                            .power_max_installed_capacity
                            .get(&(node.clone(), storage.clone()))
                            .copied(),
                    ),
                )?;
                builder.add_variable(
                    VarKey::StorEnergyBuilt {
                        node: node.clone(),
                        storage: storage.clone(),
                        period,
                    },
                    energy_cost,
                    scaled(storages.energy_max_built_capacity.get(&key).copied()),
                )?;
                builder.add_variable(
                    VarKey::StorEnergyInstalled {
                        node: node.clone(),
                        storage: storage.clone(),
                        period,
                    },
                    0.0,
                    scaled(
                        storages
                            .energy_max_installed_capacity
                            .get(&(node.clone(), storage.clone()))
                            .copied(),
                    ),
                )?;
            }
        }
    }
    Ok(())
}

fn add_transmission_investments(builder: &mut ProblemBuilder, ctx: &BuildContext) -> Result<()> {
    let model = ctx.model;
    for arc in &model.topology.arcs {
        let lifetime = *model
            .transmission
            .lifetime
            .get(&arc.line_type)
            .with_context(|| format!("No lifetime for line type {}", arc.line_type))?;
        for &period in &model.temporal.periods {
            let capital = model
                .transmission
                .capital_cost(&arc.line_type, arc.length, period)?;
            let fixed_om = model
                .transmission
                .fixed_om_cost(&arc.line_type, arc.length, period)?;
            let cost = invest_cost(ctx, period, capital, fixed_om, lifetime);
            let max_built = model
                .transmission
                .max_built_between(&arc.from, &arc.to, period);
            let max_installed = model
                .transmission
                .max_installed_between(&arc.from, &arc.to);
            builder.add_variable(
                VarKey::TransBuilt {
                    from: arc.from.clone(),
                    to: arc.to.clone(),
                    period,
                },
                cost,
                scaled(max_built),
            )?;
            builder.add_variable(
                VarKey::TransInstalled {
                    from: arc.from.clone(),
                    to: arc.to.clone(),
                    period,
                },
                0.0,
                scaled(max_installed),
            )?;
        }
    }
    for node in offshore_hubs(ctx) {
        for &period in &model.temporal.periods {
            let capital = model
                .transmission
                .converter_capital_cost
                .get(&period)
                .copied()
                .unwrap_or(0.0);
            let fixed_om = model
                .transmission
                .converter_fixed_om_cost
                .get(&period)
                .copied()
                .unwrap_or(0.0);
            let cost = invest_cost(
                ctx,
                period,
                capital,
                fixed_om,
                model.transmission.converter_lifetime,
            );
            builder.add_variable(
                VarKey::OffshoreConverterBuilt {
                    node: node.id.clone(),
                    period,
                },
                cost,
                None,
            )?;
            builder.add_variable(
                VarKey::OffshoreConverterInstalled {
                    node: node.id.clone(),
                    period,
                },
                0.0,
                None,
            )?;
        }
    }
    Ok(())
}

fn add_converter_investments(builder: &mut ProblemBuilder, ctx: &BuildContext) -> Result<()> {
    let model = ctx.model;
    let heat = model.heat.as_ref().expect("Heat module loaded");
    for (node, converters) in &heat.of_node {
        for converter in converters {
            let lifetime = heat.converter_lifetime[converter];
            for &period in &model.temporal.periods {
                let capital = *heat
                    .converter_capital_cost
                    .get(&(converter.clone(), period))
                    .with_context(|| format!("No capital cost for converter {converter}"))?;
                let fixed_om = heat
                    .converter_fixed_om_cost
                    .get(&(converter.clone(), period))
                    .copied()
                    .unwrap_or(0.0);
                let cost = invest_cost(ctx, period, capital, fixed_om, lifetime);
                builder.add_variable(
                    VarKey::ConverterBuilt {
                        node: node.clone(),
                        converter: converter.clone(),
                        period,
                    },
                    cost,
                    None,
                )?;
                builder.add_variable(
                    VarKey::ConverterInstalled {
                        node: node.clone(),
                        converter: converter.clone(),
                        period,
                    },
                    0.0,
                    None,
                )?;
            }
        }
    }
    Ok(())
}

fn add_supply_chain_investments(builder: &mut ProblemBuilder, ctx: &BuildContext) -> Result<()> {
    let model = ctx.model;
    let chain = model.supply_chain.as_ref().expect("Supply chain loaded");
    let hydrogen = &chain.hydrogen;

    for node in hydrogen_nodes(ctx) {
        for &period in &model.temporal.periods {
            let cost = invest_cost(
                ctx,
                period,
                *hydrogen
                    .electrolyzer_capital_cost
                    .get(&period)
                    .with_context(|| format!("No electrolyzer capital cost for period {period}"))?,
                hydrogen
                    .electrolyzer_fixed_om_cost
                    .get(&period)
                    .copied()
                    .unwrap_or(0.0),
                hydrogen.electrolyzer_lifetime,
            );
            builder.add_variable(
                VarKey::ElectrolyzerBuilt {
                    node: node.id.clone(),
                    period,
                },
                cost,
                None,
            )?;
            builder.add_variable(
                VarKey::ElectrolyzerInstalled {
                    node: node.id.clone(),
                    period,
                },
                0.0,
                None,
            )?;

            for plant in hydrogen.reformers.keys() {
                let cost = invest_cost(
                    ctx,
                    period,
                    *hydrogen
                        .reformer_capital_cost
                        .get(&(plant.clone(), period))
                        .with_context(|| format!("No capital cost for reformer {plant}"))?,
                    hydrogen
                        .reformer_fixed_om_cost
                        .get(&(plant.clone(), period))
                        .copied()
                        .unwrap_or(0.0),
                    hydrogen.reformer_lifetime[plant],
                );
                builder.add_variable(
                    VarKey::ReformerBuilt {
                        node: node.id.clone(),
                        plant: plant.clone(),
                        period,
                    },
                    cost,
                    None,
                )?;
                builder.add_variable(
                    VarKey::ReformerInstalled {
                        node: node.id.clone(),
                        plant: plant.clone(),
                        period,
                    },
                    0.0,
                    None,
                )?;
            }

            let cost = invest_cost(
                ctx,
                period,
                *hydrogen
                    .storage_capital_cost
                    .get(&period)
                    .with_context(|| format!("No H2 storage capital cost for period {period}"))?,
                0.0,
                hydrogen.storage_lifetime,
            );
            builder.add_variable(
                VarKey::H2StorageBuilt {
                    node: node.id.clone(),
                    period,
                },
                cost,
                None,
            )?;
            builder.add_variable(
                VarKey::H2StorageInstalled {
                    node: node.id.clone(),
                    period,
                },
                0.0,
                scaled(hydrogen.storage_max_capacity.get(&node.id).copied()),
            )?;
        }
    }

    for arc in ctx.model.topology.hydrogen_arcs() {
        for &period in &model.temporal.periods {
            let capital = hydrogen.pipeline_capital_cost(arc.length, period)?;
            let fixed_om = hydrogen.pipeline_om_cost.get(&period).copied().unwrap_or(0.0)
                * arc.length;
            let cost = invest_cost(ctx, period, capital, fixed_om, hydrogen.pipeline_lifetime);
            add_pipeline_pair(builder, Carrier::Hydrogen, arc.from.clone(), arc.to.clone(), period, cost)?;
        }
    }
    for arc in ctx.model.topology.co2_arcs() {
        for &period in &model.temporal.periods {
            let capital = chain.co2.pipeline_capital_cost(arc.length, period)?;
            let fixed_om =
                chain.co2.pipeline_om_cost.get(&period).copied().unwrap_or(0.0) * arc.length;
            let cost = invest_cost(ctx, period, capital, fixed_om, chain.co2.pipeline_lifetime);
            add_pipeline_pair(builder, Carrier::Co2, arc.from.clone(), arc.to.clone(), period, cost)?;
        }
    }
    for arc in ctx.model.topology.natural_gas_arcs() {
        for &period in &model.temporal.periods {
            let capital = chain.natural_gas.pipeline_capital_cost(arc.length, period)?;
            let cost = invest_cost(ctx, period, capital, 0.0, chain.natural_gas.pipeline_lifetime);
            add_pipeline_pair(
                builder,
                Carrier::NaturalGas,
                arc.from.clone(),
                arc.to.clone(),
                period,
                cost,
            )?;
        }
    }

    for node in sequestration_nodes(ctx) {
        for &period in &model.temporal.periods {
            let cost = invest_cost(
                ctx,
                period,
                *chain
                    .co2
                    .site_capital_cost
                    .get(&period)
                    .with_context(|| format!("No CO2 site capital cost for period {period}"))?,
                chain
                    .co2
                    .site_fixed_om_cost
                    .get(&period)
                    .copied()
                    .unwrap_or(0.0),
                chain.co2.site_lifetime,
            );
            builder.add_variable(
                VarKey::Co2SiteBuilt {
                    node: node.id.clone(),
                    period,
                },
                cost,
                None,
            )?;
            builder.add_variable(
                VarKey::Co2SiteInstalled {
                    node: node.id.clone(),
                    period,
                },
                0.0,
                None,
            )?;
        }
    }

    for (sector, node) in sector_placements(ctx) {
        for plant in chain.industry.plants_in(sector) {
            for &period in &model.temporal.periods {
                let cost = invest_cost(
                    ctx,
                    period,
                    *chain
                        .industry
                        .capital_cost
                        .get(&(plant.id.clone(), period))
                        .with_context(|| format!("No capital cost for plant {}", plant.id))?,
                    chain
                        .industry
                        .fixed_om_cost
                        .get(&(plant.id.clone(), period))
                        .copied()
                        .unwrap_or(0.0),
                    chain.industry.lifetime[&plant.id],
                );
                builder.add_variable(
                    VarKey::PlantBuilt {
                        node: node.clone(),
                        plant: plant.id.clone(),
                        period,
                    },
                    cost,
                    None,
                )?;
                builder.add_variable(
                    VarKey::PlantInstalled {
                        node: node.clone(),
                        plant: plant.id.clone(),
                        period,
                    },
                    0.0,
                    None,
                )?;
            }
        }
    }
    Ok(())
}

fn add_pipeline_pair(
    builder: &mut ProblemBuilder,
    carrier: Carrier,
    from: NodeID,
    to: NodeID,
    period: u32,
    cost: f64,
) -> Result<()> {
    builder.add_variable(
        VarKey::PipelineBuilt {
            carrier,
            from: from.clone(),
            to: to.clone(),
            period,
        },
        cost,
        None,
    )?;
    builder.add_variable(
        VarKey::PipelineInstalled {
            carrier,
            from,
            to,
            period,
        },
        0.0,
        None,
    )
}

fn add_operations(builder: &mut ProblemBuilder, ctx: &BuildContext) -> Result<()> {
    let model = ctx.model;
    for (period, scenario, hour) in psh(ctx) {
        for (node, gens) in &model.generators.of_node {
            for gen in gens {
                let marginal = ctx.derived.gen_marginal_cost[&(gen.clone(), period)];
                builder.add_variable(
                    VarKey::Generation {
                        node: node.clone(),
                        gen: gen.clone(),
                        period,
                        scenario,
                        hour,
                    },
                    operational_cost_coefficient(model, period, hour, marginal)?,
                    None,
                )?;
            }
        }
        for (node, storages) in &model.storages.of_node {
            for storage in storages {
                for key in [
                    VarKey::Charge {
                        node: node.clone(),
                        storage: storage.clone(),
                        period,
                        scenario,
                        hour,
                    },
                    VarKey::Discharge {
                        node: node.clone(),
                        storage: storage.clone(),
                        period,
                        scenario,
                        hour,
                    },
                    VarKey::Level {
                        node: node.clone(),
                        storage: storage.clone(),
                        period,
                        scenario,
                        hour,
                    },
                ] {
                    builder.add_variable(key, 0.0, None)?;
                }
            }
        }
        for (_, from, to) in model.topology.directed_flows() {
            builder.add_variable(
                VarKey::Flow {
                    carrier: Carrier::Electricity,
                    from: from.clone(),
                    to: to.clone(),
                    period,
                    scenario,
                    hour,
                },
                0.0,
                None,
            )?;
        }
        for node in model.topology.nodes.values().filter(|n| n.is_onshore()) {
            let lost_load = model.lost_load_cost[&(node.id.clone(), period)];
            builder.add_variable(
                VarKey::Shed {
                    carrier: Carrier::Electricity,
                    node: node.id.clone(),
                    period,
                    scenario,
                    hour,
                },
                operational_cost_coefficient(model, period, hour, lost_load)?,
                None,
            )?;
        }

        if let Some(heat) = &model.heat {
            for (node, converters) in &heat.of_node {
                for converter in converters {
                    builder.add_variable(
                        VarKey::ConverterUse {
                            node: node.clone(),
                            converter: converter.clone(),
                            period,
                            scenario,
                            hour,
                        },
                        0.0,
                        None,
                    )?;
                }
            }
            for node in model.topology.nodes.values().filter(|n| n.is_onshore()) {
                builder.add_variable(
                    VarKey::Shed {
                        carrier: Carrier::Heat,
                        node: node.id.clone(),
                        period,
                        scenario,
                        hour,
                    },
                    operational_cost_coefficient(model, period, hour, ctx.penalties.heat_shed)?,
                    None,
                )?;
            }
        }

        if model.supply_chain.is_some() {
            add_supply_chain_operations(builder, ctx, period, scenario, hour)?;
        }
    }

    if model.supply_chain.is_some() && ctx.flexible_industry {
        for (sector, node) in sector_placements(ctx) {
            for (&period, &scenario) in
                iproduct!(&model.temporal.periods, &model.temporal.scenarios)
            {
                builder.add_variable(
                    VarKey::IndustryShortfall {
                        sector,
                        node: node.clone(),
                        period,
                        scenario,
                    },
                    operational_shortfall_cost(ctx, period),
                    None,
                )?;
            }
        }
    }
    Ok(())
}

/// Shortfall on a yearly production equality is weighted by discount and
/// scenario probability only, there is no season weight on a yearly row
fn operational_shortfall_cost(ctx: &BuildContext, period: u32) -> f64 {
    use crate::lifecycle::discount_multiplier;
    let model = ctx.model;
    discount_multiplier(
        model.economics.discount_rate,
        model.temporal.period_step_years,
        period,
    ) * model.temporal.scenario_probability()
        * ctx.penalties.industry_shortfall
        * super::COST_SCALE
        / super::EMISSION_SCALE
}

fn add_supply_chain_operations(
    builder: &mut ProblemBuilder,
    ctx: &BuildContext,
    period: u32,
    scenario: u32,
    hour: u32,
) -> Result<()> {
    let model = ctx.model;
    let chain = model.supply_chain.as_ref().expect("Supply chain loaded");

    for node in hydrogen_nodes(ctx) {
        builder.add_variable(
            VarKey::ElectrolyzerOutput {
                node: node.id.clone(),
                period,
                scenario,
                hour,
            },
            0.0,
            None,
        )?;
        for plant in chain.hydrogen.reformers.keys() {
            let variable_om = chain
                .hydrogen
                .reformer_variable_om_cost
                .get(&(plant.clone(), period))
                .copied()
                .unwrap_or(0.0);
            builder.add_variable(
                VarKey::ReformerOutput {
                    node: node.id.clone(),
                    plant: plant.clone(),
                    period,
                    scenario,
                    hour,
                },
                operational_cost_coefficient(model, period, hour, variable_om)?,
                None,
            )?;
        }
        for key in [
            VarKey::H2Charge {
                node: node.id.clone(),
                period,
                scenario,
                hour,
            },
            VarKey::H2Discharge {
                node: node.id.clone(),
                period,
                scenario,
                hour,
            },
            VarKey::H2Level {
                node: node.id.clone(),
                period,
                scenario,
                hour,
            },
        ] {
            builder.add_variable(key, 0.0, None)?;
        }
        builder.add_variable(
            VarKey::Shed {
                carrier: Carrier::Hydrogen,
                node: node.id.clone(),
                period,
                scenario,
                hour,
            },
            operational_cost_coefficient(model, period, hour, ctx.penalties.hydrogen_shed)?,
            None,
        )?;
    }
    for arc in model.topology.hydrogen_arcs() {
        add_flow_pair(builder, Carrier::Hydrogen, arc.from.clone(), arc.to.clone(), period, scenario, hour)?;
    }
    for arc in model.topology.co2_arcs() {
        add_flow_pair(builder, Carrier::Co2, arc.from.clone(), arc.to.clone(), period, scenario, hour)?;
    }
    for arc in model.topology.natural_gas_arcs() {
        add_flow_pair(builder, Carrier::NaturalGas, arc.from.clone(), arc.to.clone(), period, scenario, hour)?;
    }

    for terminal in chain.natural_gas.terminals.values() {
        let import_cost = chain
            .natural_gas
            .terminal_import_cost
            .get(&(terminal.id.clone(), period))
            .copied()
            .unwrap_or(0.0);
        let capacity = chain
            .natural_gas
            .terminal_capacity
            .get(&(terminal.id.clone(), period))
            .copied();
        builder.add_variable(
            VarKey::TerminalImport {
                terminal: terminal.id.clone(),
                period,
                scenario,
                hour,
            },
            operational_cost_coefficient(model, period, hour, import_cost)?,
            scaled(capacity),
        )?;
    }
    for node in gas_nodes(ctx) {
        if chain.natural_gas.reserves.contains_key(&node.id) {
            builder.add_variable(
                VarKey::GasExtraction {
                    node: node.id.clone(),
                    period,
                    scenario,
                    hour,
                },
                0.0,
                None,
            )?;
        }
        builder.add_variable(
            VarKey::Shed {
                carrier: Carrier::NaturalGas,
                node: node.id.clone(),
                period,
                scenario,
                hour,
            },
            operational_cost_coefficient(model, period, hour, ctx.penalties.gas_shed)?,
            None,
        )?;
    }

    for node in sequestration_nodes(ctx) {
        builder.add_variable(
            VarKey::Sequestered {
                node: node.id.clone(),
                period,
                scenario,
                hour,
            },
            0.0,
            None,
        )?;
    }
    for node in model.topology.nodes.values().filter(|n| n.is_onshore()) {
        builder.add_variable(
            VarKey::Shed {
                carrier: Carrier::Co2,
                node: node.id.clone(),
                period,
                scenario,
                hour,
            },
            emission_cost_coefficient(model, period, hour, ctx.penalties.co2_vent)?,
            None,
        )?;
    }

    for (sector, node) in sector_placements(ctx) {
        for plant in chain.industry.plants_in(sector) {
            let variable_om = chain
                .industry
                .variable_om_cost
                .get(&(plant.id.clone(), period))
                .copied()
                .unwrap_or(0.0);
            builder.add_variable(
                VarKey::PlantProduction {
                    node: node.clone(),
                    plant: plant.id.clone(),
                    period,
                    scenario,
                    hour,
                },
                emission_cost_coefficient(model, period, hour, variable_om)?,
                None,
            )?;
        }
    }
    Ok(())
}

fn add_flow_pair(
    builder: &mut ProblemBuilder,
    carrier: Carrier,
    from: NodeID,
    to: NodeID,
    period: u32,
    scenario: u32,
    hour: u32,
) -> Result<()> {
    for (a, b) in [(from.clone(), to.clone()), (to, from)] {
        builder.add_variable(
            VarKey::Flow {
                carrier,
                from: a,
                to: b,
                period,
                scenario,
                hour,
            },
            0.0,
            None,
        )?;
    }
    Ok(())
}

/// Offshore hub nodes
pub fn offshore_hubs<'a>(ctx: &'a BuildContext) -> impl Iterator<Item = &'a Node> {
    ctx.model.topology.nodes_with(|n| n.tags.offshore_hub)
}

/// Hydrogen-production nodes
pub fn hydrogen_nodes<'a>(ctx: &'a BuildContext) -> impl Iterator<Item = &'a Node> {
    ctx.model.topology.nodes_with(|n| n.tags.hydrogen_production)
}

/// Natural-gas nodes
pub fn gas_nodes<'a>(ctx: &'a BuildContext) -> impl Iterator<Item = &'a Node> {
    ctx.model.topology.nodes_with(|n| n.tags.natural_gas)
}

/// CO2 sequestration nodes
pub fn sequestration_nodes<'a>(ctx: &'a BuildContext) -> impl Iterator<Item = &'a Node> {
    ctx.model.topology.nodes_with(|n| n.tags.co2_sequestration)
}

/// Which nodes host which industrial sector
pub fn sector_placements(ctx: &BuildContext) -> Vec<(Sector, NodeID)> {
    let mut placements = Vec::new();
    for node in ctx.model.topology.nodes.values() {
        for (sector, tagged) in [
            (Sector::Steel, node.tags.steel_producer),
            (Sector::Cement, node.tags.cement_producer),
            (Sector::Ammonia, node.tags.ammonia_producer),
        ] {
            if tagged {
                placements.push((sector, node.id.clone()));
            }
        }
    }
    placements
}
