//! Capacity lifecycle equalities.
//!
//! For every asset class, installed capacity in a period equals the builds
//! still inside their lifetime window plus the committed initial capacity.
//! Retirement is implicit: a build simply drops out of the window.
use super::ConstraintKey;
use crate::lifecycle::lifetime_window;
use crate::problem::variables::{
    hydrogen_nodes, offshore_hubs, sector_placements, sequestration_nodes, Carrier, VarKey,
};
use crate::problem::{BuildContext, ProblemBuilder, EMISSION_SCALE, POWER_SCALE};
use anyhow::Result;

pub fn add_all(builder: &mut ProblemBuilder, ctx: &BuildContext) -> Result<()> {
    let model = ctx.model;
    let step = model.temporal.period_step_years;

    let add = |builder: &mut ProblemBuilder,
                   key: ConstraintKey,
                   period: u32,
                   lifetime: f64,
                   installed: VarKey,
                   built: &dyn Fn(u32) -> VarKey,
                   initial: f64|
     -> Result<()> {
        let mut terms = vec![(installed, 1.0)];
        for q in lifetime_window(period, lifetime, step) {
            terms.push((built(q), -1.0));
        }
        builder.add_eq(key, initial, &terms)
    };

    for (node, gens) in &model.generators.of_node {
        for gen in gens {
            let lifetime = model.generators.lifetime[gen];
            for &period in &model.temporal.periods {
                let initial = ctx
                    .derived
                    .gen_initial_capacity
                    .get(&(node.clone(), gen.clone(), period))
                    .copied()
                    .unwrap_or(0.0);
                add(
                    builder,
                    ConstraintKey::GenLifecycle {
                        node: node.clone(),
                        gen: gen.clone(),
                        period,
                    },
                    period,
                    lifetime,
                    VarKey::GenInstalled {
                        node: node.clone(),
                        gen: gen.clone(),
                        period,
                    },
                    &|q| VarKey::GenBuilt {
                        node: node.clone(),
                        gen: gen.clone(),
                        period: q,
                    },
                    initial * POWER_SCALE,
                )?;
            }
        }
    }

    for (node, storages) in &model.storages.of_node {
        for storage in storages {
            let lifetime = model.storages.lifetime[storage];
            for &period in &model.temporal.periods {
                let key = (node.clone(), storage.clone(), period);
                let initial_power = model
                    .storages
                    .initial_power_capacity
                    .get(&key)
                    .copied()
                    .unwrap_or(0.0);
                let initial_energy = model
                    .storages
                    .initial_energy_capacity
                    .get(&key)
                    .copied()
                    .unwrap_or(0.0);
                add(
                    builder,
                    ConstraintKey::StorPowerLifecycle {
                        node: node.clone(),
                        storage: storage.clone(),
                        period,
                    },
                    period,
                    lifetime,
                    VarKey::StorPowerInstalled {
                        node: node.clone(),
                        storage: storage.clone(),
                        period,
                    },
                    &|q| VarKey::StorPowerBuilt {
                        node: node.clone(),
                        storage: storage.clone(),
                        period: q,
                    },
                    initial_power * POWER_SCALE,
                )?;
                add(
                    builder,
                    ConstraintKey::StorEnergyLifecycle {
                        node: node.clone(),
                        storage: storage.clone(),
                        period,
                    },
                    period,
                    lifetime,
                    VarKey::StorEnergyInstalled {
                        node: node.clone(),
                        storage: storage.clone(),
                        period,
                    },
                    &|q| VarKey::StorEnergyBuilt {
                        node: node.clone(),
                        storage: storage.clone(),
                        period: q,
                    },
                    initial_energy * POWER_SCALE,
                )?;
            }
        }
    }

    for arc in &model.topology.arcs {
        let lifetime = model.transmission.lifetime[&arc.line_type];
        for &period in &model.temporal.periods {
            let initial = model
                .transmission
                .initial_capacity_between(&arc.from, &arc.to, period);
            add(
                builder,
                ConstraintKey::TransLifecycle {
                    from: arc.from.clone(),
                    to: arc.to.clone(),
                    period,
                },
                period,
                lifetime,
                VarKey::TransInstalled {
                    from: arc.from.clone(),
                    to: arc.to.clone(),
                    period,
                },
                &|q| VarKey::TransBuilt {
                    from: arc.from.clone(),
                    to: arc.to.clone(),
                    period: q,
                },
                initial * POWER_SCALE,
            )?;
        }
    }
    for node in offshore_hubs(ctx) {
        for &period in &model.temporal.periods {
            add(
                builder,
                ConstraintKey::OffshoreConverterLifecycle {
                    node: node.id.clone(),
                    period,
                },
                period,
                model.transmission.converter_lifetime,
                VarKey::OffshoreConverterInstalled {
                    node: node.id.clone(),
                    period,
                },
                &|q| VarKey::OffshoreConverterBuilt {
                    node: node.id.clone(),
                    period: q,
                },
                0.0,
            )?;
        }
    }

    if let Some(heat) = &model.heat {
        for (node, converters) in &heat.of_node {
            for converter in converters {
                let lifetime = heat.converter_lifetime[converter];
                for &period in &model.temporal.periods {
                    let initial = heat
                        .converter_initial_capacity
                        .get(&(node.clone(), converter.clone(), period))
                        .copied()
                        .unwrap_or(0.0);
                    add(
                        builder,
                        ConstraintKey::ConverterLifecycle {
                            node: node.clone(),
                            converter: converter.clone(),
                            period,
                        },
                        period,
                        lifetime,
                        VarKey::ConverterInstalled {
                            node: node.clone(),
                            converter: converter.clone(),
                            period,
                        },
                        &|q| VarKey::ConverterBuilt {
                            node: node.clone(),
                            converter: converter.clone(),
                            period: q,
                        },
                        initial * POWER_SCALE,
                    )?;
                }
            }
        }
    }

    let Some(chain) = &model.supply_chain else {
        return Ok(());
    };

    for node in hydrogen_nodes(ctx) {
        for &period in &model.temporal.periods {
            add(
                builder,
                ConstraintKey::ElectrolyzerLifecycle {
                    node: node.id.clone(),
                    period,
                },
                period,
                chain.hydrogen.electrolyzer_lifetime,
                VarKey::ElectrolyzerInstalled {
                    node: node.id.clone(),
                    period,
                },
                &|q| VarKey::ElectrolyzerBuilt {
                    node: node.id.clone(),
                    period: q,
                },
                0.0,
            )?;
            for plant in chain.hydrogen.reformers.keys() {
                add(
                    builder,
                    ConstraintKey::ReformerLifecycle {
                        node: node.id.clone(),
                        plant: plant.clone(),
                        period,
                    },
                    period,
                    chain.hydrogen.reformer_lifetime[plant],
                    VarKey::ReformerInstalled {
                        node: node.id.clone(),
                        plant: plant.clone(),
                        period,
                    },
                    &|q| VarKey::ReformerBuilt {
                        node: node.id.clone(),
                        plant: plant.clone(),
                        period: q,
                    },
                    0.0,
                )?;
            }
            add(
                builder,
                ConstraintKey::H2StorageLifecycle {
                    node: node.id.clone(),
                    period,
                },
                period,
                chain.hydrogen.storage_lifetime,
                VarKey::H2StorageInstalled {
                    node: node.id.clone(),
                    period,
                },
                &|q| VarKey::H2StorageBuilt {
                    node: node.id.clone(),
                    period: q,
                },
                0.0,
            )?;
        }
    }

    let pipelines = [
        (Carrier::Hydrogen, model.topology.hydrogen_arcs(), chain.hydrogen.pipeline_lifetime),
        (Carrier::Co2, model.topology.co2_arcs(), chain.co2.pipeline_lifetime),
        (Carrier::NaturalGas, model.topology.natural_gas_arcs(), chain.natural_gas.pipeline_lifetime),
    ];
    for (carrier, arcs, lifetime) in pipelines {
        for arc in arcs {
            for &period in &model.temporal.periods {
                add(
                    builder,
                    ConstraintKey::PipelineLifecycle {
                        carrier,
                        from: arc.from.clone(),
                        to: arc.to.clone(),
                        period,
                    },
                    period,
                    lifetime,
                    VarKey::PipelineInstalled {
                        carrier,
                        from: arc.from.clone(),
                        to: arc.to.clone(),
                        period,
                    },
                    &|q| VarKey::PipelineBuilt {
                        carrier,
                        from: arc.from.clone(),
                        to: arc.to.clone(),
                        period: q,
                    },
                    0.0,
                )?;
            }
        }
    }

    for node in sequestration_nodes(ctx) {
        for &period in &model.temporal.periods {
            add(
                builder,
                ConstraintKey::Co2SiteLifecycle {
                    node: node.id.clone(),
                    period,
                },
                period,
                chain.co2.site_lifetime,
                VarKey::Co2SiteInstalled {
                    node: node.id.clone(),
                    period,
                },
                &|q| VarKey::Co2SiteBuilt {
                    node: node.id.clone(),
                    period: q,
                },
                0.0,
            )?;
        }
    }

    for (sector, node) in sector_placements(ctx) {
        for plant in chain.industry.plants_in(sector) {
            let lifetime = chain.industry.lifetime[&plant.id];
            for &period in &model.temporal.periods {
                let initial = chain
                    .industry
                    .initial_capacity
                    .get(&(node.clone(), plant.id.clone(), period))
                    .copied()
                    .unwrap_or(0.0);
                add(
                    builder,
                    ConstraintKey::PlantLifecycle {
                        node: node.clone(),
                        plant: plant.id.clone(),
                        period,
                    },
                    period,
                    lifetime,
                    VarKey::PlantInstalled {
                        node: node.clone(),
                        plant: plant.id.clone(),
                        period,
                    },
                    &|q| VarKey::PlantBuilt {
                        node: node.clone(),
                        plant: plant.id.clone(),
                        period: q,
                    },
                    initial * EMISSION_SCALE,
                )?;
            }
        }
    }

    Ok(())
}
