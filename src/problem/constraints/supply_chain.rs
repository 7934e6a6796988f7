//! Supply-chain operating bounds: pipeline and conversion capacity rows,
//! hydrogen storage dynamics, cumulative gas reserves, sequestration limits
//! and industrial production requirements.
use super::ConstraintKey;
use crate::problem::variables::{
    gas_nodes, hydrogen_nodes, sector_placements, sequestration_nodes, Carrier, VarKey,
};
use crate::problem::{BuildContext, ProblemBuilder, EMISSION_SCALE, POWER_SCALE};
use anyhow::{Context, Result};
use itertools::iproduct;

/// Hydrogen caverns start and close every season half full
const H2_STORAGE_INITIAL_FILL: f64 = 0.5;

pub fn add_all(builder: &mut ProblemBuilder, ctx: &BuildContext) -> Result<()> {
    hourly_capacity_rows(builder, ctx)?;
    h2_storage_dynamics(builder, ctx)?;
    gas_reserves(builder, ctx)?;
    sequestration_volumes(builder, ctx)?;
    industry_production(builder, ctx)?;
    Ok(())
}

fn hourly_capacity_rows(builder: &mut ProblemBuilder, ctx: &BuildContext) -> Result<()> {
    let model = ctx.model;
    let chain = model.supply_chain.as_ref().expect("Supply chain loaded");
    let pipelines = [
        (Carrier::Hydrogen, model.topology.hydrogen_arcs()),
        (Carrier::Co2, model.topology.co2_arcs()),
        (Carrier::NaturalGas, model.topology.natural_gas_arcs()),
    ];
    for (&period, &scenario) in iproduct!(&model.temporal.periods, &model.temporal.scenarios) {
        for hour in model.temporal.hours() {
            for (carrier, arcs) in &pipelines {
                for arc in arcs {
                    for (from, to) in [
                        (arc.from.clone(), arc.to.clone()),
                        (arc.to.clone(), arc.from.clone()),
                    ] {
                        builder.add_le(
                            ConstraintKey::FlowCap {
                                carrier: *carrier,
                                from: from.clone(),
                                to: to.clone(),
                                period,
                                scenario,
                                hour,
                            },
                            0.0,
                            &[
                                (
                                    VarKey::Flow {
                                        carrier: *carrier,
                                        from,
                                        to,
                                        period,
                                        scenario,
                                        hour,
                                    },
                                    1.0,
                                ),
                                (
                                    VarKey::PipelineInstalled {
                                        carrier: *carrier,
                                        from: arc.from.clone(),
                                        to: arc.to.clone(),
                                        period,
                                    },
                                    -1.0,
                                ),
                            ],
                        )?;
                    }
                }
            }

            for node in hydrogen_nodes(ctx) {
                let power_use = *chain
                    .hydrogen
                    .electrolyzer_power_use
                    .get(&period)
                    .with_context(|| {
                        format!("No electrolyzer power use for period {period}")
                    })?;
                builder.add_le(
                    ConstraintKey::ElectrolyzerCap {
                        node: node.id.clone(),
                        period,
                        scenario,
                        hour,
                    },
                    0.0,
                    &[
                        (
                            VarKey::ElectrolyzerOutput {
                                node: node.id.clone(),
                                period,
                                scenario,
                                hour,
                            },
                            power_use,
                        ),
                        (
                            VarKey::ElectrolyzerInstalled {
                                node: node.id.clone(),
                                period,
                            },
                            -1.0,
                        ),
                    ],
                )?;
                for plant in chain.hydrogen.reformers.keys() {
                    builder.add_le(
                        ConstraintKey::ReformerCap {
                            node: node.id.clone(),
                            plant: plant.clone(),
                            period,
                            scenario,
                            hour,
                        },
                        0.0,
                        &[
                            (
                                VarKey::ReformerOutput {
                                    node: node.id.clone(),
                                    plant: plant.clone(),
                                    period,
                                    scenario,
                                    hour,
                                },
                                1.0,
                            ),
                            (
                                VarKey::ReformerInstalled {
                                    node: node.id.clone(),
                                    plant: plant.clone(),
                                    period,
                                },
                                -1.0,
                            ),
                        ],
                    )?;
                }
            }

            for node in sequestration_nodes(ctx) {
                builder.add_le(
                    ConstraintKey::SequestrationRateCap {
                        node: node.id.clone(),
                        period,
                        scenario,
                        hour,
                    },
                    0.0,
                    &[
                        (
                            VarKey::Sequestered {
                                node: node.id.clone(),
                                period,
                                scenario,
                                hour,
                            },
                            1.0,
                        ),
                        (
                            VarKey::Co2SiteInstalled {
                                node: node.id.clone(),
                                period,
                            },
                            -1.0,
                        ),
                    ],
                )?;
            }

            for (sector, node) in sector_placements(ctx) {
                for plant in chain.industry.plants_in(sector) {
                    builder.add_le(
                        ConstraintKey::PlantCap {
                            node: node.clone(),
                            plant: plant.id.clone(),
                            period,
                            scenario,
                            hour,
                        },
                        0.0,
                        &[
                            (
                                VarKey::PlantProduction {
                                    node: node.clone(),
                                    plant: plant.id.clone(),
                                    period,
                                    scenario,
                                    hour,
                                },
                                1.0,
                            ),
                            (
                                VarKey::PlantInstalled {
                                    node: node.clone(),
                                    plant: plant.id.clone(),
                                    period,
                                },
                                -1.0,
                            ),
                        ],
                    )?;
                }
            }
        }
    }
    Ok(())
}

/// Lossless level recursion with the half-full seasonal seed and close
fn h2_storage_dynamics(builder: &mut ProblemBuilder, ctx: &BuildContext) -> Result<()> {
    let model = ctx.model;
    for node in hydrogen_nodes(ctx) {
        for (&period, &scenario) in iproduct!(&model.temporal.periods, &model.temporal.scenarios)
        {
            let installed = VarKey::H2StorageInstalled {
                node: node.id.clone(),
                period,
            };
            let level = |hour| VarKey::H2Level {
                node: node.id.clone(),
                period,
                scenario,
                hour,
            };
            for season in &model.temporal.seasons {
                for hour in season.hours() {
                    let mut terms = vec![
                        (level(hour), 1.0),
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
                            VarKey::H2Discharge {
                                node: node.id.clone(),
                                period,
                                scenario,
                                hour,
                            },
                            1.0,
                        ),
                    ];
                    if hour == season.first_hour {
                        terms.push((installed.clone(), -H2_STORAGE_INITIAL_FILL));
                    } else {
                        terms.push((level(hour - 1), -1.0));
                    }
                    builder.add_eq(
                        ConstraintKey::H2StorageDynamics {
                            node: node.id.clone(),
                            period,
                            scenario,
                            hour,
                        },
                        0.0,
                        &terms,
                    )?;
                    builder.add_le(
                        ConstraintKey::H2LevelCap {
                            node: node.id.clone(),
                            period,
                            scenario,
                            hour,
                        },
                        0.0,
                        &[(level(hour), 1.0), (installed.clone(), -1.0)],
                    )?;
                }
                builder.add_eq(
                    ConstraintKey::H2StorageCyclic {
                        node: node.id.clone(),
                        period,
                        scenario,
                        season: season.name.clone(),
                    },
                    0.0,
                    &[
                        (level(*season.hours().end()), 1.0),
                        (installed.clone(), -H2_STORAGE_INITIAL_FILL),
                    ],
                )?;
            }
        }
    }
    Ok(())
}

/// Weight turning one sampled hour into expected annual energy over the
/// period step
fn expected_step_weight(ctx: &BuildContext, scale: f64) -> f64 {
    ctx.model.temporal.scenario_probability()
        * scale
        * f64::from(ctx.model.temporal.period_step_years)
}

fn gas_reserves(builder: &mut ProblemBuilder, ctx: &BuildContext) -> Result<()> {
    let model = ctx.model;
    let chain = model.supply_chain.as_ref().expect("Supply chain loaded");
    for node in gas_nodes(ctx) {
        let Some(&reserve) = chain.natural_gas.reserves.get(&node.id) else {
            continue;
        };
        let mut terms = Vec::new();
        for (&period, &scenario) in iproduct!(&model.temporal.periods, &model.temporal.scenarios)
        {
            for season in &model.temporal.seasons {
                for hour in season.hours() {
                    terms.push((
                        VarKey::GasExtraction {
                            node: node.id.clone(),
                            period,
                            scenario,
                            hour,
                        },
                        expected_step_weight(ctx, season.scale),
                    ));
                }
            }
        }
        builder.add_le(
            ConstraintKey::GasReserve {
                node: node.id.clone(),
            },
            reserve * POWER_SCALE,
            &terms,
        )?;
    }
    Ok(())
}

fn sequestration_volumes(builder: &mut ProblemBuilder, ctx: &BuildContext) -> Result<()> {
    let model = ctx.model;
    let chain = model.supply_chain.as_ref().expect("Supply chain loaded");
    for node in sequestration_nodes(ctx) {
        let Some(&maximum) = chain.co2.max_sequestration.get(&node.id) else {
            continue;
        };
        let mut terms = Vec::new();
        for (&period, &scenario) in iproduct!(&model.temporal.periods, &model.temporal.scenarios)
        {
            for season in &model.temporal.seasons {
                for hour in season.hours() {
                    terms.push((
                        VarKey::Sequestered {
                            node: node.id.clone(),
                            period,
                            scenario,
                            hour,
                        },
                        expected_step_weight(ctx, season.scale),
                    ));
                }
            }
        }
        builder.add_le(
            ConstraintKey::SequestrationVolume {
                node: node.id.clone(),
            },
            maximum * EMISSION_SCALE,
            &terms,
        )?;
    }
    Ok(())
}

/// Yearly sector output per node: hourly equalities when production is
/// inflexible, one weighted yearly row with a penalised shortfall when it
/// may shift within the year
fn industry_production(builder: &mut ProblemBuilder, ctx: &BuildContext) -> Result<()> {
    let model = ctx.model;
    let chain = model.supply_chain.as_ref().expect("Supply chain loaded");
    for (sector, node) in sector_placements(ctx) {
        let plants: Vec<_> = chain.industry.plants_in(sector).map(|p| p.id.clone()).collect();
        if plants.is_empty() {
            continue;
        }
        for (&period, &scenario) in iproduct!(&model.temporal.periods, &model.temporal.scenarios)
        {
            let Some(&yearly) = chain
                .industry
                .yearly_production
                .get(&(sector, node.clone(), period))
            else {
                continue;
            };
            if ctx.flexible_industry {
                let mut terms: Vec<(VarKey, f64)> = vec![(
                    VarKey::IndustryShortfall {
                        sector,
                        node: node.clone(),
                        period,
                        scenario,
                    },
                    1.0,
                )];
                for season in &model.temporal.seasons {
                    for (plant, hour) in iproduct!(&plants, season.hours()) {
                        terms.push((
                            VarKey::PlantProduction {
                                node: node.clone(),
                                plant: plant.clone(),
                                period,
                                scenario,
                                hour,
                            },
                            season.scale,
                        ));
                    }
                }
                builder.add_eq(
                    ConstraintKey::IndustryYearlyProduction {
                        sector,
                        node: node.clone(),
                        period,
                        scenario,
                    },
                    yearly * EMISSION_SCALE,
                    &terms,
                )?;
            } else {
                let hourly = yearly / model.temporal.weighted_hours() * EMISSION_SCALE;
                for hour in model.temporal.hours() {
                    let terms: Vec<_> = plants
                        .iter()
                        .map(|plant| {
                            (
                                VarKey::PlantProduction {
                                    node: node.clone(),
                                    plant: plant.clone(),
                                    period,
                                    scenario,
                                    hour,
                                },
                                1.0,
                            )
                        })
                        .collect();
                    builder.add_eq(
                        ConstraintKey::IndustryHourlyProduction {
                            sector,
                            node: node.clone(),
                            period,
                            scenario,
                            hour,
                        },
                        hourly,
                        &terms,
                    )?;
                }
            }
        }
    }
    Ok(())
}
