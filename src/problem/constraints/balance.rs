//! Hourly carrier balance equalities.
//!
//! One equality per node, carrier and sampled hour. Every balance carries a
//! penalised shed column rather than a hard bound, so an infeasible input
//! surfaces as a priced slack instead of a solver failure. Quantities enter
//! in GW / GWh (power, heat, hydrogen, gas) and kt (CO2); annual side
//! demands are spread over the season-weighted hour count of the year.
use super::ConstraintKey;
use crate::generator::{Fuel, OutputCarrier};
use crate::id::NodeID;
use crate::model::Model;
use crate::problem::variables::{
    gas_nodes, hydrogen_nodes, sequestration_nodes, Carrier, VarKey,
};
use crate::problem::{BuildContext, ProblemBuilder, POWER_SCALE};
use crate::storage::StorageCarrier;
use anyhow::{Context, Result};
use itertools::iproduct;

pub fn add_all(builder: &mut ProblemBuilder, ctx: &BuildContext) -> Result<()> {
    let temporal = &ctx.model.temporal;
    for (&period, &scenario) in iproduct!(&temporal.periods, &temporal.scenarios) {
        for hour in temporal.hours() {
            electricity(builder, ctx, period, scenario, hour)?;
            if ctx.model.heat.is_some() {
                heat(builder, ctx, period, scenario, hour)?;
            }
            if ctx.model.supply_chain.is_some() {
                hydrogen(builder, ctx, period, scenario, hour)?;
                gas(builder, ctx, period, scenario, hour)?;
                co2(builder, ctx, period, scenario, hour)?;
            }
        }
    }
    Ok(())
}

/// Annual energy spread evenly over the weighted model year, in GW
fn hourly(model: &Model, annual_mwh: f64) -> f64 {
    annual_mwh / model.temporal.weighted_hours() * POWER_SCALE
}

fn storage_terms(
    ctx: &BuildContext,
    node: &NodeID,
    carrier: StorageCarrier,
    period: u32,
    scenario: u32,
    hour: u32,
    terms: &mut Vec<(VarKey, f64)>,
) {
    let storages = &ctx.model.storages;
    for storage in storages.at_node(node) {
        if storages.catalog[storage].carrier != carrier {
            continue;
        }
        let discharge_efficiency = storages.discharge_efficiency[storage];
        terms.push((
            VarKey::Discharge {
                node: node.clone(),
                storage: storage.clone(),
                period,
                scenario,
                hour,
            },
            discharge_efficiency,
        ));
        terms.push((
            VarKey::Charge {
                node: node.clone(),
                storage: storage.clone(),
                period,
                scenario,
                hour,
            },
            -1.0,
        ));
    }
}

fn electricity(
    builder: &mut ProblemBuilder,
    ctx: &BuildContext,
    period: u32,
    scenario: u32,
    hour: u32,
) -> Result<()> {
    let model = ctx.model;
    for node in model.topology.nodes.values() {
        let mut terms: Vec<(VarKey, f64)> = Vec::new();
        for gen in model.generators.at_node(&node.id) {
            if model.generators.catalog[gen].carrier == OutputCarrier::Electricity {
                terms.push((
                    VarKey::Generation {
                        node: node.id.clone(),
                        gen: gen.clone(),
                        period,
                        scenario,
                        hour,
                    },
                    1.0,
                ));
            }
        }
        storage_terms(
            ctx,
            &node.id,
            StorageCarrier::Electricity,
            period,
            scenario,
            hour,
            &mut terms,
        );
        for arc in model.topology.arcs.iter().filter(|a| a.touches(&node.id)) {
            let other = arc.other_end(&node.id).clone();
            terms.push((
                VarKey::Flow {
                    carrier: Carrier::Electricity,
                    from: other.clone(),
                    to: node.id.clone(),
                    period,
                    scenario,
                    hour,
                },
                arc.efficiency,
            ));
            terms.push((
                VarKey::Flow {
                    carrier: Carrier::Electricity,
                    from: node.id.clone(),
                    to: other,
                    period,
                    scenario,
                    hour,
                },
                -1.0,
            ));
        }
        if node.is_onshore() {
            terms.push((
                VarKey::Shed {
                    carrier: Carrier::Electricity,
                    node: node.id.clone(),
                    period,
                    scenario,
                    hour,
                },
                1.0,
            ));
        }
        if let Some(heat) = &model.heat {
            for converter in heat.at_node(&node.id) {
                terms.push((
                    VarKey::ConverterUse {
                        node: node.id.clone(),
                        converter: converter.clone(),
                        period,
                        scenario,
                        hour,
                    },
                    -1.0,
                ));
            }
        }

        let mut rhs = if node.is_onshore() {
            ctx.derived.net_electric_demand[&(node.id.clone(), period, scenario, hour)]
                * POWER_SCALE
        } else {
            0.0
        };

        if let Some(chain) = &model.supply_chain {
            if node.tags.hydrogen_production {
                let power_use = *chain
                    .hydrogen
                    .electrolyzer_power_use
                    .get(&period)
                    .with_context(|| {
                        format!("No electrolyzer power use for period {period}")
                    })?;
                terms.push((
                    VarKey::ElectrolyzerOutput {
                        node: node.id.clone(),
                        period,
                        scenario,
                        hour,
                    },
                    -power_use,
                ));
                for plant in chain.hydrogen.reformers.keys() {
                    terms.push((
                        VarKey::ReformerOutput {
                            node: node.id.clone(),
                            plant: plant.clone(),
                            period,
                            scenario,
                            hour,
                        },
                        -chain.hydrogen.reformer_power_use[plant],
                    ));
                }
                // compressor power for outbound hydrogen flows
                for arc in model.topology.hydrogen_arcs() {
                    if !arc.touches(&node.id) {
                        continue;
                    }
                    terms.push((
                        VarKey::Flow {
                            carrier: Carrier::Hydrogen,
                            from: node.id.clone(),
                            to: arc.other_end(&node.id).clone(),
                            period,
                            scenario,
                            hour,
                        },
                        -chain.hydrogen.compressor_power_use(arc.length),
                    ));
                }
            }
            if node.tags.natural_gas {
                for arc in model.topology.natural_gas_arcs() {
                    if !arc.touches(&node.id) {
                        continue;
                    }
                    terms.push((
                        VarKey::Flow {
                            carrier: Carrier::NaturalGas,
                            from: node.id.clone(),
                            to: arc.other_end(&node.id).clone(),
                            period,
                            scenario,
                            hour,
                        },
                        -chain.natural_gas.pipeline_power_use * arc.length,
                    ));
                }
            }
            if node.is_onshore() {
                for arc in model.topology.co2_arcs() {
                    if !arc.touches(&node.id) {
                        continue;
                    }
                    terms.push((
                        VarKey::Flow {
                            carrier: Carrier::Co2,
                            from: node.id.clone(),
                            to: arc.other_end(&node.id).clone(),
                            period,
                            scenario,
                            hour,
                        },
                        -chain.co2.pump_power_use(arc.length),
                    ));
                }
            }
            for plant in industry_plants_at(ctx, &node.id) {
                terms.push((
                    VarKey::PlantProduction {
                        node: node.id.clone(),
                        plant: plant.clone(),
                        period,
                        scenario,
                        hour,
                    },
                    -chain.industry.consumption[&plant].power,
                ));
            }
            let transport = chain
                .industry
                .transport_electricity_demand
                .get(&(node.id.clone(), period))
                .copied()
                .unwrap_or(0.0);
            let refinery = if node.tags.oil_producer {
                chain
                    .industry
                    .refinery_power_use
                    .get(&(node.id.clone(), period))
                    .copied()
                    .unwrap_or(0.0)
            } else {
                0.0
            };
            rhs += hourly(model, transport + refinery);
        }

        builder.add_eq(
            ConstraintKey::ElectricityBalance {
                node: node.id.clone(),
                period,
                scenario,
                hour,
            },
            rhs,
            &terms,
        )?;
    }
    Ok(())
}

fn heat(
    builder: &mut ProblemBuilder,
    ctx: &BuildContext,
    period: u32,
    scenario: u32,
    hour: u32,
) -> Result<()> {
    let model = ctx.model;
    let heat = model.heat.as_ref().expect("Heat module loaded");
    for node in model.topology.nodes.values().filter(|n| n.is_onshore()) {
        let mut terms: Vec<(VarKey, f64)> = Vec::new();
        for gen in model.generators.at_node(&node.id) {
            let entry = &model.generators.catalog[gen];
            let coefficient = if entry.carrier == OutputCarrier::Heat {
                Some(1.0)
            } else if entry.chp {
                Some(
                    *model
                        .generators
                        .chp_efficiency
                        .get(&(gen.clone(), period))
                        .with_context(|| {
                            format!("No CHP efficiency for {gen} in period {period}")
                        })?,
                )
            } else {
                None
            };
            if let Some(coefficient) = coefficient {
                terms.push((
                    VarKey::Generation {
                        node: node.id.clone(),
                        gen: gen.clone(),
                        period,
                        scenario,
                        hour,
                    },
                    coefficient,
                ));
            }
        }
        for converter in heat.at_node(&node.id) {
            let cop = if heat.converters[converter].tracks_cop {
                ctx.profiles
                    .cop
                    .get(&(node.id.clone(), period, scenario, hour))
                    .copied()
                    .with_context(|| {
                        format!("No COP sample for {} at hour {hour}", node.id)
                    })?
            } else {
                heat.converter_cop[converter]
            };
            terms.push((
                VarKey::ConverterUse {
                    node: node.id.clone(),
                    converter: converter.clone(),
                    period,
                    scenario,
                    hour,
                },
                cop,
            ));
        }
        storage_terms(
            ctx,
            &node.id,
            StorageCarrier::Heat,
            period,
            scenario,
            hour,
            &mut terms,
        );
        terms.push((
            VarKey::Shed {
                carrier: Carrier::Heat,
                node: node.id.clone(),
                period,
                scenario,
                hour,
            },
            1.0,
        ));
        let rhs = ctx.derived.heat_demand[&(node.id.clone(), period, scenario, hour)]
            * POWER_SCALE;
        builder.add_eq(
            ConstraintKey::HeatBalance {
                node: node.id.clone(),
                period,
                scenario,
                hour,
            },
            rhs,
            &terms,
        )?;
    }
    Ok(())
}

fn hydrogen(
    builder: &mut ProblemBuilder,
    ctx: &BuildContext,
    period: u32,
    scenario: u32,
    hour: u32,
) -> Result<()> {
    let model = ctx.model;
    let chain = model.supply_chain.as_ref().expect("Supply chain loaded");
    for node in hydrogen_nodes(ctx) {
        let mut terms: Vec<(VarKey, f64)> = vec![
            (
                VarKey::ElectrolyzerOutput {
                    node: node.id.clone(),
                    period,
                    scenario,
                    hour,
                },
                1.0,
            ),
            (
                VarKey::H2Discharge {
                    node: node.id.clone(),
                    period,
                    scenario,
                    hour,
                },
                1.0,
            ),
            (
                VarKey::H2Charge {
                    node: node.id.clone(),
                    period,
                    scenario,
                    hour,
                },
                -1.0,
            ),
            (
                VarKey::Shed {
                    carrier: Carrier::Hydrogen,
                    node: node.id.clone(),
                    period,
                    scenario,
                    hour,
                },
                1.0,
            ),
        ];
        for plant in chain.hydrogen.reformers.keys() {
            terms.push((
                VarKey::ReformerOutput {
                    node: node.id.clone(),
                    plant: plant.clone(),
                    period,
                    scenario,
                    hour,
                },
                1.0,
            ));
        }
        for arc in model.topology.hydrogen_arcs() {
            if !arc.touches(&node.id) {
                continue;
            }
            let other = arc.other_end(&node.id).clone();
            flow_pair_terms(Carrier::Hydrogen, &node.id, &other, period, scenario, hour, &mut terms);
        }
        for gen in model.generators.at_node(&node.id) {
            if model.generators.catalog[gen].fuel == Fuel::Hydrogen {
                let efficiency = model.generators.efficiency[&(gen.clone(), period)];
                terms.push((
                    VarKey::Generation {
                        node: node.id.clone(),
                        gen: gen.clone(),
                        period,
                        scenario,
                        hour,
                    },
                    -1.0 / efficiency,
                ));
            }
        }
        for plant in industry_plants_at(ctx, &node.id) {
            terms.push((
                VarKey::PlantProduction {
                    node: node.id.clone(),
                    plant: plant.clone(),
                    period,
                    scenario,
                    hour,
                },
                -chain.industry.consumption[&plant].hydrogen,
            ));
        }
        let transport = chain
            .industry
            .transport_hydrogen_demand
            .get(&(node.id.clone(), period))
            .copied()
            .unwrap_or(0.0);
        let refinery = if node.tags.oil_producer {
            chain
                .industry
                .refinery_hydrogen_use
                .get(&(node.id.clone(), period))
                .copied()
                .unwrap_or(0.0)
        } else {
            0.0
        };
        builder.add_eq(
            ConstraintKey::HydrogenBalance {
                node: node.id.clone(),
                period,
                scenario,
                hour,
            },
            hourly(model, transport + refinery),
            &terms,
        )?;
    }
    Ok(())
}

fn gas(
    builder: &mut ProblemBuilder,
    ctx: &BuildContext,
    period: u32,
    scenario: u32,
    hour: u32,
) -> Result<()> {
    let model = ctx.model;
    let chain = model.supply_chain.as_ref().expect("Supply chain loaded");
    for node in gas_nodes(ctx) {
        let mut terms: Vec<(VarKey, f64)> = vec![(
            VarKey::Shed {
                carrier: Carrier::NaturalGas,
                node: node.id.clone(),
                period,
                scenario,
                hour,
            },
            1.0,
        )];
        for terminal in chain.natural_gas.terminals_at(&node.id) {
            terms.push((
                VarKey::TerminalImport {
                    terminal: terminal.id.clone(),
                    period,
                    scenario,
                    hour,
                },
                1.0,
            ));
        }
        if chain.natural_gas.reserves.contains_key(&node.id) {
            terms.push((
                VarKey::GasExtraction {
                    node: node.id.clone(),
                    period,
                    scenario,
                    hour,
                },
                1.0,
            ));
        }
        for arc in model.topology.natural_gas_arcs() {
            if !arc.touches(&node.id) {
                continue;
            }
            let other = arc.other_end(&node.id).clone();
            flow_pair_terms(Carrier::NaturalGas, &node.id, &other, period, scenario, hour, &mut terms);
        }
        for gen in model.generators.at_node(&node.id) {
            if model.generators.catalog[gen].fuel == Fuel::Gas {
                let efficiency = model.generators.efficiency[&(gen.clone(), period)];
                terms.push((
                    VarKey::Generation {
                        node: node.id.clone(),
                        gen: gen.clone(),
                        period,
                        scenario,
                        hour,
                    },
                    -1.0 / efficiency,
                ));
            }
        }
        if node.tags.hydrogen_production {
            for plant in chain.hydrogen.reformers.keys() {
                terms.push((
                    VarKey::ReformerOutput {
                        node: node.id.clone(),
                        plant: plant.clone(),
                        period,
                        scenario,
                        hour,
                    },
                    -chain.hydrogen.reformer_gas_use[plant],
                ));
            }
        }
        for plant in industry_plants_at(ctx, &node.id) {
            terms.push((
                VarKey::PlantProduction {
                    node: node.id.clone(),
                    plant: plant.clone(),
                    period,
                    scenario,
                    hour,
                },
                -chain.industry.consumption[&plant].gas,
            ));
        }
        let transport = chain
            .industry
            .transport_gas_demand
            .get(&(node.id.clone(), period))
            .copied()
            .unwrap_or(0.0);
        builder.add_eq(
            ConstraintKey::GasBalance {
                node: node.id.clone(),
                period,
                scenario,
                hour,
            },
            hourly(model, transport),
            &terms,
        )?;
    }
    Ok(())
}

fn co2(
    builder: &mut ProblemBuilder,
    ctx: &BuildContext,
    period: u32,
    scenario: u32,
    hour: u32,
) -> Result<()> {
    let model = ctx.model;
    let chain = model.supply_chain.as_ref().expect("Supply chain loaded");
    let sequestration: Vec<NodeID> = sequestration_nodes(ctx)
        .map(|n| n.id.clone())
        .collect();
    for node in model.topology.nodes.values().filter(|n| n.is_onshore()) {
        let mut terms: Vec<(VarKey, f64)> = vec![(
            VarKey::Shed {
                carrier: Carrier::Co2,
                node: node.id.clone(),
                period,
                scenario,
                hour,
            },
            -1.0,
        )];
        for gen in model.generators.at_node(&node.id) {
            let captured = model
                .generators
                .co2_captured
                .get(gen)
                .copied()
                .unwrap_or(0.0);
            if captured == 0.0 {
                continue;
            }
            let efficiency = model.generators.efficiency[&(gen.clone(), period)];
            terms.push((
                VarKey::Generation {
                    node: node.id.clone(),
                    gen: gen.clone(),
                    period,
                    scenario,
                    hour,
                },
                captured / efficiency,
            ));
        }
        if node.tags.hydrogen_production {
            for plant in chain.hydrogen.reformers.keys() {
                terms.push((
                    VarKey::ReformerOutput {
                        node: node.id.clone(),
                        plant: plant.clone(),
                        period,
                        scenario,
                        hour,
                    },
                    chain.hydrogen.reformer_co2_captured[plant],
                ));
            }
        }
        for plant in industry_plants_at(ctx, &node.id) {
            let captured = chain
                .industry
                .co2_captured
                .get(&plant)
                .copied()
                .unwrap_or(0.0);
            if captured > 0.0 {
                terms.push((
                    VarKey::PlantProduction {
                        node: node.id.clone(),
                        plant: plant.clone(),
                        period,
                        scenario,
                        hour,
                    },
                    captured,
                ));
            }
        }
        for arc in model.topology.co2_arcs() {
            if !arc.touches(&node.id) {
                continue;
            }
            let other = arc.other_end(&node.id).clone();
            flow_pair_terms(Carrier::Co2, &node.id, &other, period, scenario, hour, &mut terms);
        }
        if sequestration.contains(&node.id) {
            terms.push((
                VarKey::Sequestered {
                    node: node.id.clone(),
                    period,
                    scenario,
                    hour,
                },
                -1.0,
            ));
        }
        builder.add_eq(
            ConstraintKey::Co2Balance {
                node: node.id.clone(),
                period,
                scenario,
                hour,
            },
            0.0,
            &terms,
        )?;
    }
    Ok(())
}

/// Inbound flow counts positive, outbound negative; pipelines are lossless
/// (their running power cost sits in the electricity balance)
fn flow_pair_terms(
    carrier: Carrier,
    node: &NodeID,
    other: &NodeID,
    period: u32,
    scenario: u32,
    hour: u32,
    terms: &mut Vec<(VarKey, f64)>,
) {
    terms.push((
        VarKey::Flow {
            carrier,
            from: other.clone(),
            to: node.clone(),
            period,
            scenario,
            hour,
        },
        1.0,
    ));
    terms.push((
        VarKey::Flow {
            carrier,
            from: node.clone(),
            to: other.clone(),
            period,
            scenario,
            hour,
        },
        -1.0,
    ));
}

/// Plants hosted at a node, across all sectors it is tagged for
fn industry_plants_at(ctx: &BuildContext, node: &NodeID) -> Vec<crate::id::PlantID> {
    let Some(chain) = &ctx.model.supply_chain else {
        return Vec::new();
    };
    let tags = &ctx.model.topology.nodes[node].tags;
    let mut plants = Vec::new();
    for (sector, tagged) in [
        (crate::industry::Sector::Steel, tags.steel_producer),
        (crate::industry::Sector::Cement, tags.cement_producer),
        (crate::industry::Sector::Ammonia, tags.ammonia_producer),
    ] {
        if tagged {
            plants.extend(chain.industry.plants_in(sector).map(|p| p.id.clone()));
        }
    }
    plants
}
