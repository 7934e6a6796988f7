//! Derived parameters, computed between input loading and problem assembly.
//!
//! Each step is a pure function of the model and the sampled profiles; the
//! steps run in a fixed order and write into their own tables, so no step
//! ever observes another step's partial state. Data-quality repairs
//! (demand flooring, limit widening) are logged at warn level with the full
//! index so a run can be audited afterwards.
use crate::generator::GeneratorKind;
use crate::id::{GeneratorID, NodeID};
use crate::lifecycle::{annuitised_cost, yearly_cost};
use crate::model::Model;
use crate::sampler::Profiles;
use anyhow::{Context, Result};
use log::warn;
use std::collections::HashMap;

/// Net demand is floored at this value so balance rows never carry an
/// exactly-zero or negative demand constant
pub const NET_DEMAND_FLOOR_MW: f64 = 1e-3;

/// All derived tables used by the assembly
#[derive(Clone, Debug, Default)]
pub struct DerivedParams {
    /// Annuitised generator investment cost, EUR/MW per build
    pub gen_invest_cost: HashMap<(GeneratorID, u32), f64>,
    /// Short-run marginal generation cost, EUR/MWh
    pub gen_marginal_cost: HashMap<(GeneratorID, u32), f64>,
    /// Committed generator capacity, MW
    pub gen_initial_capacity: HashMap<(NodeID, GeneratorID, u32), f64>,
    /// Installed-capacity ceiling after widening to committed capacity, MW
    pub gen_max_installed: HashMap<(NodeID, GeneratorID), f64>,
    /// Deterministic availability times the sampled profile
    pub gen_availability: HashMap<(NodeID, GeneratorID, u32, u32, u32), f64>,
    /// Electric demand after annual scaling, heat-share netting and
    /// flooring, MW per (node, period, scenario, hour)
    pub net_electric_demand: HashMap<(NodeID, u32, u32, u32), f64>,
    /// Heat demand after annual scaling, MW (empty when the module is off)
    pub heat_demand: HashMap<(NodeID, u32, u32, u32), f64>,
}

impl DerivedParams {
    /// Run every derivation step in order
    pub fn build(model: &Model, profiles: &Profiles) -> Result<DerivedParams> {
        let mut derived = DerivedParams {
            gen_invest_cost: gen_invest_costs(model)?,
            gen_marginal_cost: gen_marginal_costs(model)?,
            gen_initial_capacity: gen_initial_capacities(model),
            ..DerivedParams::default()
        };
        derived.gen_max_installed = gen_max_installed(model, &derived.gen_initial_capacity);
        derived.gen_availability = gen_availability(model, profiles);
        derived.net_electric_demand = net_electric_demand(model, profiles)?;
        if model.heat.is_some() {
            derived.heat_demand = heat_demand(model, profiles)?;
        }
        Ok(derived)
    }
}

/// Annuitised investment cost per generator and build period
fn gen_invest_costs(model: &Model) -> Result<HashMap<(GeneratorID, u32), f64>> {
    let mut costs = HashMap::new();
    for gen in model.generators.catalog.keys() {
        let lifetime = model.generators.lifetime[gen];
        for &period in &model.temporal.periods {
            let capital = *model
                .generators
                .capital_cost
                .get(&(gen.clone(), period))
                .with_context(|| format!("No capital cost for {gen} in period {period}"))?;
            let fixed_om = *model
                .generators
                .fixed_om_cost
                .get(&(gen.clone(), period))
                .unwrap_or(&0.0);
            let yearly = yearly_cost(capital, fixed_om, lifetime, model.economics.wacc);
            let cost = annuitised_cost(
                yearly,
                lifetime,
                model.temporal.remaining_years(period),
                model.economics.discount_rate,
            );
            costs.insert((gen.clone(), period), cost);
        }
    }
    Ok(costs)
}

/// Short-run marginal cost per generator and period.
///
/// The CO2 price term only applies when no emission cap is assembled;
/// capture cost always applies to the captured share.
fn gen_marginal_costs(model: &Model) -> Result<HashMap<(GeneratorID, u32), f64>> {
    let mut costs = HashMap::new();
    for (id, gen) in &model.generators.catalog {
        let variable_om = *model.generators.variable_om_cost.get(id).unwrap_or(&0.0);
        let ccs_cost = *model.generators.ccs_cost.get(id).unwrap_or(&0.0);
        let emissions = *model.generators.co2_content.get(id).unwrap_or(&0.0);
        let captured = *model.generators.co2_captured.get(id).unwrap_or(&0.0);
        for &period in &model.temporal.periods {
            let mut cost = variable_om + ccs_cost * captured;
            if gen.fuel != crate::generator::Fuel::None {
                let efficiency = *model
                    .generators
                    .efficiency
                    .get(&(id.clone(), period))
                    .with_context(|| format!("No efficiency for {id} in period {period}"))?;
                let fuel_cost = *model
                    .generators
                    .fuel_cost
                    .get(&(id.clone(), period))
                    .with_context(|| format!("No fuel cost for {id} in period {period}"))?;
                cost += fuel_cost / efficiency;
                if !model.has_emission_cap() {
                    let co2_price = *model.economics.co2_price.get(&period).unwrap_or(&0.0);
                    cost += co2_price * emissions / efficiency;
                }
            }
            costs.insert((id.clone(), period), cost);
        }
    }
    Ok(costs)
}

/// Committed capacity: the direct table wins; otherwise the reference
/// capacity decays by the per-period retirement factor
fn gen_initial_capacities(model: &Model) -> HashMap<(NodeID, GeneratorID, u32), f64> {
    let gens = &model.generators;
    let mut capacities = HashMap::new();
    for (node, ids) in &gens.of_node {
        for id in ids {
            for &period in &model.temporal.periods {
                let key = (node.clone(), id.clone(), period);
                let capacity = gens.initial_capacity.get(&key).copied().or_else(|| {
                    let reference = gens.ref_initial_capacity.get(&(node.clone(), id.clone()))?;
                    let retired = gens
                        .scale_factor_initial_capacity
                        .get(&(id.clone(), period))
                        .copied()
                        .unwrap_or(0.0);
                    Some(reference * (1.0 - retired))
                });
                if let Some(capacity) = capacity {
                    capacities.insert(key, capacity.max(0.0));
                }
            }
        }
    }
    capacities
}

/// Installed-capacity ceilings, widened so the committed capacity never
/// makes the lifecycle equality infeasible
fn gen_max_installed(
    model: &Model,
    initial: &HashMap<(NodeID, GeneratorID, u32), f64>,
) -> HashMap<(NodeID, GeneratorID), f64> {
    let mut ceilings = model.generators.max_installed_capacity.clone();
    for ((node, gen), ceiling) in &mut ceilings {
        for &period in &model.temporal.periods {
            let committed = initial
                .get(&(node.clone(), gen.clone(), period))
                .copied()
                .unwrap_or(0.0);
            if committed > *ceiling {
                warn!(
                    "Widening max installed capacity for {gen} at {node} from {ceiling} to \
                     committed {committed} MW (period {period})"
                );
                *ceiling = committed;
            }
        }
    }
    ceilings
}

/// Deterministic type availability times the sampled profile for
/// profile-bounded units; the type availability alone otherwise
fn gen_availability(
    model: &Model,
    profiles: &Profiles,
) -> HashMap<(NodeID, GeneratorID, u32, u32, u32), f64> {
    let mut merged = HashMap::new();
    for (node, ids) in &model.generators.of_node {
        for id in ids {
            let gen = &model.generators.catalog[id];
            let type_availability = *model.generators.type_availability.get(id).unwrap_or(&1.0);
            for &period in &model.temporal.periods {
                for &scenario in &model.temporal.scenarios {
                    for hour in model.temporal.hours() {
                        let profile = match gen.profile {
                            Some(kind) => profiles
                                .availability
                                .get(&(node.clone(), kind, period, scenario, hour))
                                .copied()
                                .unwrap_or(0.0),
                            None => 1.0,
                        };
                        merged.insert(
                            (node.clone(), id.clone(), period, scenario, hour),
                            type_availability * profile,
                        );
                    }
                }
            }
        }
    }
    merged
}

/// Weighted energy carried by a sampled load profile over one model year
fn profile_year_energy(
    model: &Model,
    profile: &HashMap<(NodeID, u32, u32, u32), f64>,
    node: &NodeID,
    period: u32,
    scenario: u32,
) -> f64 {
    model
        .temporal
        .seasons
        .iter()
        .map(|season| {
            season.scale
                * season
                    .hours()
                    .map(|hour| {
                        profile
                            .get(&(node.clone(), period, scenario, hour))
                            .copied()
                            .unwrap_or(0.0)
                    })
                    .sum::<f64>()
        })
        .sum()
}

/// Scale the sampled load to the annual demand, net out the electric share
/// of heat when the heat module is on, and floor the result
fn net_electric_demand(
    model: &Model,
    profiles: &Profiles,
) -> Result<HashMap<(NodeID, u32, u32, u32), f64>> {
    let mut demand = HashMap::new();
    let mut floored = 0u64;
    for node in model.topology.nodes.values().filter(|n| n.is_onshore()) {
        let heat_share = model
            .heat
            .as_ref()
            .and_then(|h| h.electric_heat_share.get(&node.id).copied())
            .unwrap_or(0.0);
        for &period in &model.temporal.periods {
            let annual = model.electric_annual_demand[&(node.id.clone(), period)];
            for &scenario in &model.temporal.scenarios {
                let energy = profile_year_energy(
                    model,
                    &profiles.electric_load,
                    &node.id,
                    period,
                    scenario,
                );
                if energy <= 0.0 && annual > 0.0 {
                    anyhow::bail!(
                        "Node {} has annual demand but a zero load profile (period {period}, \
                         scenario {scenario})",
                        node.id
                    );
                }
                for hour in model.temporal.hours() {
                    let load = profiles
                        .electric_load
                        .get(&(node.id.clone(), period, scenario, hour))
                        .copied()
                        .unwrap_or(0.0);
                    let scaled = if energy > 0.0 {
                        load * annual / energy * (1.0 - heat_share)
                    } else {
                        0.0
                    };
                    let value = if scaled < NET_DEMAND_FLOOR_MW {
                        floored += 1;
                        warn!(
                            "Flooring net electric demand at {} (period {period}, scenario \
                             {scenario}, hour {hour}): {scaled} -> {NET_DEMAND_FLOOR_MW} MW",
                            node.id
                        );
                        NET_DEMAND_FLOOR_MW
                    } else {
                        scaled
                    };
                    demand.insert((node.id.clone(), period, scenario, hour), value);
                }
            }
        }
    }
    if floored > 0 {
        warn!("Floored {floored} net electric demand values in total");
    }
    Ok(demand)
}

/// Scale the sampled heat load to the annual heat demand and add the
/// electric share netted out of the electric balance
fn heat_demand(
    model: &Model,
    profiles: &Profiles,
) -> Result<HashMap<(NodeID, u32, u32, u32), f64>> {
    let heat = model.heat.as_ref().context("Heat module is off")?;
    let mut demand = HashMap::new();
    for node in model.topology.nodes.values().filter(|n| n.is_onshore()) {
        let heat_share = heat
            .electric_heat_share
            .get(&node.id)
            .copied()
            .unwrap_or(0.0);
        for &period in &model.temporal.periods {
            let annual = heat
                .annual_demand
                .get(&(node.id.clone(), period))
                .copied()
                .unwrap_or(0.0);
            let electric_annual = model.electric_annual_demand[&(node.id.clone(), period)];
            for &scenario in &model.temporal.scenarios {
                let heat_energy =
                    profile_year_energy(model, &profiles.heat_load, &node.id, period, scenario);
                let electric_energy = profile_year_energy(
                    model,
                    &profiles.electric_load,
                    &node.id,
                    period,
                    scenario,
                );
                for hour in model.temporal.hours() {
                    let key = (node.id.clone(), period, scenario, hour);
                    let mut value = 0.0;
                    if heat_energy > 0.0 {
                        let load = profiles.heat_load.get(&key).copied().unwrap_or(0.0);
                        value += load * annual / heat_energy;
                    }
                    if electric_energy > 0.0 {
                        let load = profiles.electric_load.get(&key).copied().unwrap_or(0.0);
                        value += load * electric_annual / electric_energy * heat_share;
                    }
                    demand.insert(key, value);
                }
            }
        }
    }
    Ok(demand)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::toy_model;
    use crate::sampler::Profiles;
    use float_cmp::assert_approx_eq;

    fn toy_profiles(model: &Model) -> Profiles {
        let mut profiles = Profiles::default();
        for node in model.topology.nodes.keys() {
            for &period in &model.temporal.periods {
                for hour in model.temporal.hours() {
                    profiles
                        .electric_load
                        .insert((node.clone(), period, 1, hour), 50.0);
                }
            }
        }
        profiles
    }

    #[test]
    fn test_net_demand_scales_to_annual_energy() {
        let model = toy_model();
        let profiles = toy_profiles(&model);
        let derived = DerivedParams::build(&model, &profiles).unwrap();

        // flat profile: every hour carries annual / weighted-year-hours
        let weighted_hours: f64 = model
            .temporal
            .seasons
            .iter()
            .map(|s| s.scale * f64::from(s.length))
            .sum();
        let node = model.topology.nodes.keys().next().unwrap().clone();
        let annual = model.electric_annual_demand[&(node.clone(), 1)];
        let value = derived.net_electric_demand[&(node, 1, 1, 1)];
        assert_approx_eq!(f64, value, annual / weighted_hours, epsilon = 1e-9);
    }

    #[test]
    fn test_net_demand_is_floored() {
        let mut model = toy_model();
        for value in model.electric_annual_demand.values_mut() {
            *value = 0.0;
        }
        let profiles = toy_profiles(&model);
        let derived = DerivedParams::build(&model, &profiles).unwrap();
        for value in derived.net_electric_demand.values() {
            assert_approx_eq!(f64, *value, NET_DEMAND_FLOOR_MW);
        }
    }

    #[test]
    fn test_max_installed_widens_to_committed() {
        let mut model = toy_model();
        let node = model.topology.nodes.keys().next().unwrap().clone();
        let gen = model.generators.catalog.keys().next().unwrap().clone();
        model
            .generators
            .max_installed_capacity
            .insert((node.clone(), gen.clone()), 10.0);
        model
            .generators
            .initial_capacity
            .insert((node.clone(), gen.clone(), 1), 250.0);

        let profiles = toy_profiles(&model);
        let derived = DerivedParams::build(&model, &profiles).unwrap();
        assert_approx_eq!(f64, derived.gen_max_installed[&(node, gen)], 250.0);
    }

    #[test]
    fn test_initial_capacity_decays_from_reference() {
        let mut model = toy_model();
        let node = model.topology.nodes.keys().next().unwrap().clone();
        let gen = model.generators.catalog.keys().next().unwrap().clone();
        model.generators.initial_capacity.clear();
        model
            .generators
            .ref_initial_capacity
            .insert((node.clone(), gen.clone()), 100.0);
        model
            .generators
            .scale_factor_initial_capacity
            .insert((gen.clone(), 2), 0.4);

        let derived = gen_initial_capacities(&model);
        assert_approx_eq!(f64, derived[&(node.clone(), gen.clone(), 1)], 100.0);
        assert_approx_eq!(f64, derived[&(node, gen, 2)], 60.0);
    }

    #[test]
    fn test_marginal_cost_formula() {
        let model = toy_model();
        let gen = model.generators.catalog.keys().next().unwrap().clone();
        let derived = gen_marginal_costs(&model).unwrap();
        let fuel_cost = model.generators.fuel_cost[&(gen.clone(), 1)];
        let efficiency = model.generators.efficiency[&(gen.clone(), 1)];
        assert_approx_eq!(f64, derived[&(gen, 1)], fuel_cost / efficiency);
    }
}
