//! End-to-end assembly and solve of a small in-memory model: two linked
//! onshore nodes, one dispatchable gas generator, flat load.
use expanse::derive::DerivedParams;
use expanse::generator::{Fuel, Generator, GeneratorKind, Generators, OutputCarrier};
use expanse::id::{GeneratorID, NodeID};
use expanse::model::{Economics, Model};
use expanse::problem::objective::{investment_cost_coefficient, operational_cost_coefficient};
use expanse::problem::solve::{solve, SolverMethod};
use expanse::problem::variables::VarKey;
use expanse::problem::{BuildContext, ProblemBuilder, POWER_SCALE};
use expanse::sampler::Profiles;
use expanse::settings::Penalties;
use expanse::storage::Storages;
use expanse::time::{Temporal, TemporalSpec};
use expanse::topology::{Arc, DirectionalLink, Node, NodeTags, Topology};
use expanse::transmission::Transmission;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

const ANNUAL_DEMAND_MWH: f64 = 1_000_000.0;

fn toy_model() -> Model {
    let spec = TemporalSpec {
        n_periods: 2,
        period_step_years: 5,
        n_scenarios: 1,
        regular_season_hours: 24,
        peak_season_hours: 2,
    };
    let scales = ["winter", "spring", "summer", "fall"]
        .into_iter()
        .map(|name| (Rc::from(name), 13.0))
        .collect();
    let temporal = Temporal::build(&spec, &scales).unwrap();

    let mut topology = Topology::default();
    for name in ["NO1", "NO2"] {
        let id = NodeID::from(name);
        topology.nodes.insert(
            id.clone(),
            Node {
                id,
                tags: NodeTags::default(),
                latitude: 60.0,
                longitude: 10.0,
            },
        );
    }
    topology.line_types.insert("HVAC".into());
    topology.links.push(DirectionalLink {
        from: "NO1".into(),
        to: "NO2".into(),
        line_type: "HVAC".into(),
    });
    topology.arcs.push(Arc {
        from: "NO1".into(),
        to: "NO2".into(),
        line_type: "HVAC".into(),
        length: 100.0,
        efficiency: 0.97,
    });
    topology
        .nodes_linked
        .insert("NO1".into(), vec!["NO2".into()]);
    topology
        .nodes_linked
        .insert("NO2".into(), vec!["NO1".into()]);

    let mut generators = Generators::default();
    let gen: GeneratorID = "CCGT".into();
    generators.catalog.insert(
        gen.clone(),
        Generator {
            id: gen.clone(),
            technology: "gas_turbine".into(),
            fuel: Fuel::Gas,
            kind: GeneratorKind::Dispatchable,
            carrier: OutputCarrier::Electricity,
            chp: false,
            profile: None,
        },
    );
    for node in ["NO1", "NO2"] {
        generators.of_node.insert(node.into(), vec![gen.clone()]);
        generators
            .max_installed_capacity
            .insert((node.into(), gen.clone()), 2e4);
    }
    for period in [1, 2] {
        generators.capital_cost.insert((gen.clone(), period), 8e5);
        generators.fixed_om_cost.insert((gen.clone(), period), 2e4);
        generators.fuel_cost.insert((gen.clone(), period), 30.0);
        generators.efficiency.insert((gen.clone(), period), 0.6);
        for node in ["NO1", "NO2"] {
            generators
                .max_built_capacity
                .insert((node.into(), gen.clone(), period), 1e4);
        }
    }
    generators.lifetime.insert(gen, 25.0);

    let mut transmission = Transmission::default();
    for period in [1, 2] {
        transmission
            .type_capital_cost
            .insert(("HVAC".into(), period), 1000.0);
        transmission
            .type_fixed_om_cost
            .insert(("HVAC".into(), period), 20.0);
    }
    transmission.lifetime.insert("HVAC".into(), 40.0);
    transmission
        .max_installed_capacity
        .insert(("NO1".into(), "NO2".into()), 5000.0);

    let mut electric_annual_demand = HashMap::new();
    let mut lost_load_cost = HashMap::new();
    for node in ["NO1", "NO2"] {
        for &period in &temporal.periods {
            electric_annual_demand.insert((NodeID::from(node), period), ANNUAL_DEMAND_MWH);
            lost_load_cost.insert((NodeID::from(node), period), 3000.0);
        }
    }

    Model {
        model_dir: PathBuf::new(),
        temporal,
        topology,
        generators,
        storages: Storages::default(),
        transmission,
        economics: Economics {
            wacc: 0.05,
            discount_rate: 0.05,
            ..Economics::default()
        },
        electric_annual_demand,
        lost_load_cost,
        hydro_max_annual_production: HashMap::new(),
        heat: None,
        supply_chain: None,
    }
}

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
fn test_toy_model_solves_without_shedding() {
    let model = toy_model();
    let profiles = toy_profiles(&model);
    let derived = DerivedParams::build(&model, &profiles).unwrap();
    let penalties = Penalties::default();
    let ctx = BuildContext {
        model: &model,
        derived: &derived,
        profiles: &profiles,
        penalties: &penalties,
        flexible_industry: false,
    };
    let builder = ProblemBuilder::build(&ctx).unwrap();
    let solution = solve(builder, SolverMethod::Simplex, false).unwrap();

    assert!(solution.objective() > 0.0);

    // generation is far cheaper than the lost-load cost
    let total_shed: f64 = solution
        .values()
        .filter(|(key, _)| matches!(key, VarKey::Shed { .. }))
        .map(|(_, value)| value)
        .sum();
    assert!(total_shed < 1e-6, "unexpected shed: {total_shed}");

    // flat profile: every hour carries annual / weighted-year-hours
    let weighted_hours = model.temporal.weighted_hours();
    let hourly_demand = ANNUAL_DEMAND_MWH / weighted_hours;
    for node in model.topology.nodes.keys() {
        let installed = solution
            .value(&VarKey::GenInstalled {
                node: node.clone(),
                gen: "CCGT".into(),
                period: 1,
            })
            .unwrap();
        // each node can cover its own flat demand
        assert!(
            installed / POWER_SCALE >= hourly_demand - 1e-6,
            "installed {installed} below demand {hourly_demand} at {node}"
        );
    }

    // building locally and running flat is the unique optimum, so the
    // objective is the annuitised capacity cost plus the expected fuel cost
    let gen: GeneratorID = "CCGT".into();
    let mut expected = 0.0;
    for _node in model.topology.nodes.keys() {
        let annuitised = derived.gen_invest_cost[&(gen.clone(), 1)];
        expected +=
            investment_cost_coefficient(&model, 1, annuitised) * hourly_demand * POWER_SCALE;
        for &period in &model.temporal.periods {
            let marginal = derived.gen_marginal_cost[&(gen.clone(), period)];
            for hour in model.temporal.hours() {
                expected += operational_cost_coefficient(&model, period, hour, marginal).unwrap()
                    * hourly_demand
                    * POWER_SCALE;
            }
        }
    }
    let difference = (solution.objective() - expected).abs();
    assert!(
        difference <= 1e-6 * expected,
        "objective {} differs from analytic {expected}",
        solution.objective()
    );
}

#[test]
fn test_toy_model_with_barrier() {
    let model = toy_model();
    let profiles = toy_profiles(&model);
    let derived = DerivedParams::build(&model, &profiles).unwrap();
    let penalties = Penalties::default();
    let ctx = BuildContext {
        model: &model,
        derived: &derived,
        profiles: &profiles,
        penalties: &penalties,
        flexible_industry: false,
    };
    let builder = ProblemBuilder::build(&ctx).unwrap();
    let simplex = ProblemBuilder::build(&ctx).unwrap();

    let barrier = solve(builder, SolverMethod::Barrier, true).unwrap();
    let reference = solve(simplex, SolverMethod::Simplex, false).unwrap();
    let difference = (barrier.objective() - reference.objective()).abs();
    assert!(
        difference <= 1e-4 * reference.objective().abs(),
        "solver methods disagree: {difference}"
    );
}
