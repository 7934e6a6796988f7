//! Generator operating bounds: availability, ramping, hydro energy budgets,
//! the cumulative bio-energy budget and the optional system emission cap.
use super::ConstraintKey;
use crate::generator::{Fuel, GeneratorKind};
use crate::problem::variables::{hydrogen_nodes, sector_placements, VarKey};
use crate::problem::{BuildContext, ProblemBuilder, EMISSION_SCALE, POWER_SCALE};
use anyhow::Result;
use itertools::iproduct;

pub fn add_all(builder: &mut ProblemBuilder, ctx: &BuildContext) -> Result<()> {
    availability(builder, ctx)?;
    ramping(builder, ctx)?;
    hydro_budgets(builder, ctx)?;
    bio_budget(builder, ctx)?;
    if ctx.model.has_emission_cap() {
        emission_cap(builder, ctx)?;
    }
    Ok(())
}

fn availability(builder: &mut ProblemBuilder, ctx: &BuildContext) -> Result<()> {
    let model = ctx.model;
    for (node, gens) in &model.generators.of_node {
        for gen in gens {
            for (&period, &scenario) in
                iproduct!(&model.temporal.periods, &model.temporal.scenarios)
            {
                for hour in model.temporal.hours() {
                    let avail = ctx.derived.gen_availability
                        [&(node.clone(), gen.clone(), period, scenario, hour)];
                    builder.add_le(
                        ConstraintKey::Availability {
                            node: node.clone(),
                            gen: gen.clone(),
                            period,
                            scenario,
                            hour,
                        },
                        0.0,
                        &[
                            (
                                VarKey::Generation {
                                    node: node.clone(),
                                    gen: gen.clone(),
                                    period,
                                    scenario,
                                    hour,
                                },
                                1.0,
                            ),
                            (
                                VarKey::GenInstalled {
                                    node: node.clone(),
                                    gen: gen.clone(),
                                    period,
                                },
                                -avail,
                            ),
                        ],
                    )?;
                }
            }
        }
    }
    Ok(())
}

/// Upward ramping on dispatchable units with a declared ramp rate; the
/// first hour of each season is unconstrained since the preceding hour
/// belongs to a different sampled window
fn ramping(builder: &mut ProblemBuilder, ctx: &BuildContext) -> Result<()> {
    let model = ctx.model;
    for (node, gens) in &model.generators.of_node {
        for gen in gens {
            if model.generators.catalog[gen].kind != GeneratorKind::Dispatchable {
                continue;
            }
            let Some(&ramp) = model.generators.ramp_rate.get(gen) else {
                continue;
            };
            for (&period, &scenario) in
                iproduct!(&model.temporal.periods, &model.temporal.scenarios)
            {
                for hour in model.temporal.hours() {
                    if model.temporal.is_first_hour_of_season(hour) {
                        continue;
                    }
                    builder.add_le(
                        ConstraintKey::Ramping {
                            node: node.clone(),
                            gen: gen.clone(),
                            period,
                            scenario,
                            hour,
                        },
                        0.0,
                        &[
                            (
                                VarKey::Generation {
                                    node: node.clone(),
                                    gen: gen.clone(),
                                    period,
                                    scenario,
                                    hour,
                                },
                                1.0,
                            ),
                            (
                                VarKey::Generation {
                                    node: node.clone(),
                                    gen: gen.clone(),
                                    period,
                                    scenario,
                                    hour: hour - 1,
                                },
                                -1.0,
                            ),
                            (
                                VarKey::GenInstalled {
                                    node: node.clone(),
                                    gen: gen.clone(),
                                    period,
                                },
                                -ramp,
                            ),
                        ],
                    )?;
                }
            }
        }
    }
    Ok(())
}

fn hydro_budgets(builder: &mut ProblemBuilder, ctx: &BuildContext) -> Result<()> {
    let model = ctx.model;
    for (node, gens) in &model.generators.of_node {
        let regulated: Vec<_> = gens
            .iter()
            .filter(|g| model.generators.catalog[*g].kind == GeneratorKind::HydroRegulated)
            .cloned()
            .collect();
        let any_hydro: Vec<_> = gens
            .iter()
            .filter(|g| {
                matches!(
                    model.generators.catalog[*g].kind,
                    GeneratorKind::HydroRegulated | GeneratorKind::HydroRunOfRiver
                )
            })
            .cloned()
            .collect();
        for (&period, &scenario) in iproduct!(&model.temporal.periods, &model.temporal.scenarios)
        {
            if !regulated.is_empty() {
                for season in model.temporal.regular_seasons() {
                    let Some(&budget) = ctx.profiles.seasonal_hydro_budget.get(&(
                        node.clone(),
                        season.name.clone(),
                        period,
                        scenario,
                    )) else {
                        continue;
                    };
                    let terms: Vec<_> = iproduct!(&regulated, season.hours())
                        .map(|(gen, hour)| {
                            (
                                VarKey::Generation {
                                    node: node.clone(),
                                    gen: gen.clone(),
                                    period,
                                    scenario,
                                    hour,
                                },
                                1.0,
                            )
                        })
                        .collect();
                    builder.add_le(
                        ConstraintKey::HydroSeasonalBudget {
                            node: node.clone(),
                            season: season.name.clone(),
                            period,
                            scenario,
                        },
                        budget * POWER_SCALE,
                        &terms,
                    )?;
                }
            }
            if let Some(&annual) = model.hydro_max_annual_production.get(node) {
                if any_hydro.is_empty() {
                    continue;
                }
                let mut terms = Vec::new();
                for season in &model.temporal.seasons {
                    for (gen, hour) in iproduct!(&any_hydro, season.hours()) {
                        terms.push((
                            VarKey::Generation {
                                node: node.clone(),
                                gen: gen.clone(),
                                period,
                                scenario,
                                hour,
                            },
                            season.scale,
                        ));
                    }
                }
                builder.add_le(
                    ConstraintKey::HydroAnnualBudget {
                        node: node.clone(),
                        period,
                        scenario,
                    },
                    annual * POWER_SCALE,
                    &terms,
                )?;
            }
        }
    }
    Ok(())
}

/// Expected annual bio fuel burn over the period step, against the
/// period's available bio energy
fn bio_budget(builder: &mut ProblemBuilder, ctx: &BuildContext) -> Result<()> {
    let model = ctx.model;
    let probability = model.temporal.scenario_probability();
    let step = f64::from(model.temporal.period_step_years);
    for &period in &model.temporal.periods {
        let Some(&available) = model.economics.available_bio_energy.get(&period) else {
            continue;
        };
        let mut terms = Vec::new();
        for (node, gens) in &model.generators.of_node {
            for gen in gens {
                if model.generators.catalog[gen].fuel != Fuel::Bio {
                    continue;
                }
                let efficiency = model.generators.efficiency[&(gen.clone(), period)];
                for &scenario in &model.temporal.scenarios {
                    for season in &model.temporal.seasons {
                        for hour in season.hours() {
                            terms.push((
                                VarKey::Generation {
                                    node: node.clone(),
                                    gen: gen.clone(),
                                    period,
                                    scenario,
                                    hour,
                                },
                                probability * season.scale * step / efficiency,
                            ));
                        }
                    }
                }
            }
        }
        if !terms.is_empty() {
            builder.add_le(
                ConstraintKey::BioBudget { period },
                available * POWER_SCALE,
                &terms,
            )?;
        }
    }
    Ok(())
}

/// Season-scaled net emissions per period and scenario against the cap
fn emission_cap(builder: &mut ProblemBuilder, ctx: &BuildContext) -> Result<()> {
    let model = ctx.model;
    for (&period, &scenario) in iproduct!(&model.temporal.periods, &model.temporal.scenarios) {
        let Some(&cap) = model.economics.co2_cap.get(&period) else {
            continue;
        };
        let mut terms = Vec::new();
        for season in &model.temporal.seasons {
            for hour in season.hours() {
                for (node, gens) in &model.generators.of_node {
                    for gen in gens {
                        let content =
                            model.generators.co2_content.get(gen).copied().unwrap_or(0.0);
                        let captured = model
                            .generators
                            .co2_captured
                            .get(gen)
                            .copied()
                            .unwrap_or(0.0);
                        let net = content - captured;
                        if net == 0.0 {
                            continue;
                        }
                        let efficiency = model.generators.efficiency[&(gen.clone(), period)];
                        terms.push((
                            VarKey::Generation {
                                node: node.clone(),
                                gen: gen.clone(),
                                period,
                                scenario,
                                hour,
                            },
                            season.scale * net / efficiency,
                        ));
                    }
                }
                if let Some(chain) = &model.supply_chain {
                    for node in hydrogen_nodes(ctx) {
                        for plant in chain.hydrogen.reformers.keys() {
                            terms.push((
                                VarKey::ReformerOutput {
                                    node: node.id.clone(),
                                    plant: plant.clone(),
                                    period,
                                    scenario,
                                    hour,
                                },
                                season.scale * chain.hydrogen.reformer_co2_emitted[plant],
                            ));
                        }
                    }
                    for (sector, node) in sector_placements(ctx) {
                        for plant in chain.industry.plants_in(sector) {
                            let emitted = chain
                                .industry
                                .co2_emitted
                                .get(&plant.id)
                                .copied()
                                .unwrap_or(0.0);
                            if emitted > 0.0 {
                                terms.push((
                                    VarKey::PlantProduction {
                                        node: node.clone(),
                                        plant: plant.id.clone(),
                                        period,
                                        scenario,
                                        hour,
                                    },
                                    season.scale * emitted,
                                ));
                            }
                        }
                    }
                }
            }
        }
        if !terms.is_empty() {
            builder.add_le(
                ConstraintKey::EmissionCap { period, scenario },
                cap * EMISSION_SCALE,
                &terms,
            )?;
        }
    }
    Ok(())
}
