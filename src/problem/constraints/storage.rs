//! Storage dynamics and capacity coupling.
//!
//! The level recursion runs within each season and closes cyclically: the
//! first hour starts from the initial fill of installed energy capacity and
//! the last hour must return to it, so a sampled season never borrows
//! energy from outside its own window.
use super::ConstraintKey;
use crate::problem::variables::VarKey;
use crate::problem::{BuildContext, ProblemBuilder};
use anyhow::Result;
use itertools::iproduct;

pub fn add_all(builder: &mut ProblemBuilder, ctx: &BuildContext) -> Result<()> {
    let model = ctx.model;
    let storages = &model.storages;
    for (node, ids) in &storages.of_node {
        for storage in ids {
            let bleed = storages.bleed_efficiency[storage];
            let charge_efficiency = storages.charge_efficiency[storage];
            let initial_fraction = storages.initial_level_fraction[storage];
            for (&period, &scenario) in
                iproduct!(&model.temporal.periods, &model.temporal.scenarios)
            {
                let energy_installed = VarKey::StorEnergyInstalled {
                    node: node.clone(),
                    storage: storage.clone(),
                    period,
                };
                let power_installed = VarKey::StorPowerInstalled {
                    node: node.clone(),
                    storage: storage.clone(),
                    period,
                };
                let level = |hour| VarKey::Level {
                    node: node.clone(),
                    storage: storage.clone(),
                    period,
                    scenario,
                    hour,
                };
                let charge = |hour| VarKey::Charge {
                    node: node.clone(),
                    storage: storage.clone(),
                    period,
                    scenario,
                    hour,
                };
                let discharge = |hour| VarKey::Discharge {
                    node: node.clone(),
                    storage: storage.clone(),
                    period,
                    scenario,
                    hour,
                };

                for season in &model.temporal.seasons {
                    for hour in season.hours() {
                        let mut terms = vec![
                            (level(hour), 1.0),
                            (charge(hour), -charge_efficiency),
                            (discharge(hour), 1.0),
                        ];
                        if hour == season.first_hour {
                            terms.push((energy_installed.clone(), -initial_fraction));
                        } else {
                            terms.push((level(hour - 1), -bleed));
                        }
                        builder.add_eq(
                            ConstraintKey::StorageDynamics {
                                node: node.clone(),
                                storage: storage.clone(),
                                period,
                                scenario,
                                hour,
                            },
                            0.0,
                            &terms,
                        )?;
                    }
                    let last = *season.hours().end();
                    builder.add_eq(
                        ConstraintKey::StorageCyclic {
                            node: node.clone(),
                            storage: storage.clone(),
                            period,
                            scenario,
                            season: season.name.clone(),
                        },
                        0.0,
                        &[
                            (level(last), 1.0),
                            (energy_installed.clone(), -initial_fraction),
                        ],
                    )?;
                }

                for hour in model.temporal.hours() {
                    builder.add_le(
                        ConstraintKey::LevelCap {
                            node: node.clone(),
                            storage: storage.clone(),
                            period,
                            scenario,
                            hour,
                        },
                        0.0,
                        &[(level(hour), 1.0), (energy_installed.clone(), -1.0)],
                    )?;
                    builder.add_le(
                        ConstraintKey::ChargeCap {
                            node: node.clone(),
                            storage: storage.clone(),
                            period,
                            scenario,
                            hour,
                        },
                        0.0,
                        &[(charge(hour), 1.0), (power_installed.clone(), -1.0)],
                    )?;
                    builder.add_le(
                        ConstraintKey::DischargeCap {
                            node: node.clone(),
                            storage: storage.clone(),
                            period,
                            scenario,
                            hour,
                        },
                        0.0,
                        &[(discharge(hour), 1.0), (power_installed.clone(), -1.0)],
                    )?;
                }
            }

            if storages.is_dependent(storage) {
                let ratio = storages.pow_to_energy[storage];
                for &period in &model.temporal.periods {
                    builder.add_eq(
                        ConstraintKey::PowerEnergyRatio {
                            node: node.clone(),
                            storage: storage.clone(),
                            period,
                        },
                        0.0,
                        &[
                            (
                                VarKey::StorPowerInstalled {
                                    node: node.clone(),
                                    storage: storage.clone(),
                                    period,
                                },
                                1.0,
                            ),
                            (
                                VarKey::StorEnergyInstalled {
                                    node: node.clone(),
                                    storage: storage.clone(),
                                    period,
                                },
                                -ratio,
                            ),
                        ],
                    )?;
                }
            }
        }
    }
    Ok(())
}
