//! A small in-memory model shared across unit tests: two linked onshore
//! nodes, one dispatchable gas generator, two periods, one scenario and
//! short seasons.
use crate::co2::Co2;
use crate::generator::{Fuel, Generator, GeneratorKind, Generators, OutputCarrier};
use crate::heat::{Converter, Heat};
use crate::hydrogen::{Hydrogen, Reformer};
use crate::id::{ConverterID, GeneratorID, NodeID, PlantID, TerminalID};
use crate::industry::{Consumption, Industry, Plant, Sector};
use crate::model::{Economics, Model, SupplyChain};
use crate::natural_gas::{NaturalGas, Terminal};
use crate::storage::Storages;
use crate::time::{Temporal, TemporalSpec};
use crate::topology::{Arc, DirectionalLink, Node, NodeTags, Topology};
use crate::transmission::Transmission;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

/// Annual electric demand given to every toy node and period, MWh
pub const TOY_ANNUAL_DEMAND: f64 = 1_000_000.0;

/// Annual heat demand given to every toy node and period, MWh
pub const TOY_ANNUAL_HEAT_DEMAND: f64 = 200_000.0;

/// Yearly steel output required at NO2, t
pub const TOY_STEEL_PRODUCTION: f64 = 100_000.0;

fn toy_temporal() -> Temporal {
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
    Temporal::build(&spec, &scales).unwrap()
}

fn toy_topology() -> Topology {
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
    topology
}

fn toy_generators() -> Generators {
    let mut generators = Generators::default();
    let id: GeneratorID = "CCGT".into();
    generators.catalog.insert(
        id.clone(),
        Generator {
            id: id.clone(),
            technology: "gas_turbine".into(),
            fuel: Fuel::Gas,
            kind: GeneratorKind::Dispatchable,
            carrier: OutputCarrier::Electricity,
            chp: false,
            profile: None,
        },
    );
    for node in ["NO1", "NO2"] {
        generators
            .of_node
            .insert(node.into(), vec![id.clone()]);
    }
    for period in [1, 2] {
        generators.capital_cost.insert((id.clone(), period), 8e5);
        generators.fixed_om_cost.insert((id.clone(), period), 2e4);
        generators.fuel_cost.insert((id.clone(), period), 30.0);
        generators.efficiency.insert((id.clone(), period), 0.6);
        for node in ["NO1", "NO2"] {
            generators
                .max_built_capacity
                .insert((node.into(), id.clone(), period), 1e4);
        }
    }
    for node in ["NO1", "NO2"] {
        generators
            .max_installed_capacity
            .insert((node.into(), id.clone()), 2e4);
    }
    generators.ramp_rate.insert(id.clone(), 0.8);
    generators.lifetime.insert(id, 25.0);
    generators
}

fn toy_transmission() -> Transmission {
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
    transmission
}

/// Add an electric boiler at both nodes and a flat annual heat demand
pub fn with_heat(model: &mut Model) {
    let mut heat = Heat::default();
    let id: ConverterID = "ElectricBoiler".into();
    heat.converters.insert(
        id.clone(),
        Converter {
            id: id.clone(),
            tracks_cop: false,
        },
    );
    heat.converter_cop.insert(id.clone(), 0.98);
    heat.converter_lifetime.insert(id.clone(), 20.0);
    for node in ["NO1", "NO2"] {
        heat.of_node.insert(node.into(), vec![id.clone()]);
        for period in [1, 2] {
            heat.annual_demand
                .insert((node.into(), period), TOY_ANNUAL_HEAT_DEMAND);
        }
    }
    for period in [1, 2] {
        heat.converter_capital_cost.insert((id.clone(), period), 1e5);
        heat.converter_fixed_om_cost.insert((id.clone(), period), 1e3);
    }
    model.heat = Some(heat);
}

/// Tag the toy nodes for the coupled carriers and add a minimal chain: an
/// LNG terminal and extraction reserves, one reformer design, a steel
/// plant at NO2 and a sequestration site under it
pub fn with_supply_chain(model: &mut Model) {
    for name in ["NO1", "NO2"] {
        let tags = &mut model.topology.nodes.get_mut(&NodeID::from(name)).unwrap().tags;
        tags.natural_gas = true;
        tags.hydrogen_production = true;
    }
    let no2 = &mut model.topology.nodes.get_mut(&NodeID::from("NO2")).unwrap().tags;
    no2.co2_sequestration = true;
    no2.steel_producer = true;

    let mut hydrogen = Hydrogen {
        electrolyzer_lifetime: 20.0,
        storage_lifetime: 30.0,
        pipeline_compressor_power_use: 1e-4,
        pipeline_lifetime: 40.0,
        ..Hydrogen::default()
    };
    let smr: PlantID = "SMR".into();
    hydrogen.reformers.insert(smr.clone(), Reformer { id: smr.clone() });
    hydrogen.reformer_gas_use.insert(smr.clone(), 1.3);
    hydrogen.reformer_power_use.insert(smr.clone(), 0.02);
    hydrogen.reformer_co2_emitted.insert(smr.clone(), 0.03);
    hydrogen.reformer_co2_captured.insert(smr.clone(), 0.15);
    hydrogen.reformer_lifetime.insert(smr.clone(), 25.0);
    for period in [1, 2] {
        hydrogen.electrolyzer_capital_cost.insert(period, 5e5);
        hydrogen.electrolyzer_fixed_om_cost.insert(period, 1e4);
        hydrogen.electrolyzer_power_use.insert(period, 1.4);
        hydrogen.reformer_capital_cost.insert((smr.clone(), period), 4e5);
        hydrogen.reformer_fixed_om_cost.insert((smr.clone(), period), 1e4);
        hydrogen.reformer_variable_om_cost.insert((smr.clone(), period), 2.0);
        hydrogen.storage_capital_cost.insert(period, 1e4);
        hydrogen.pipeline_capital_cost.insert(period, 500.0);
        hydrogen.pipeline_om_cost.insert(period, 10.0);
    }

    let mut natural_gas = NaturalGas {
        pipeline_power_use: 1e-5,
        pipeline_lifetime: 40.0,
        ..NaturalGas::default()
    };
    let lng: TerminalID = "LNG1".into();
    natural_gas.terminals.insert(
        lng.clone(),
        Terminal {
            id: lng.clone(),
            node: "NO1".into(),
        },
    );
    natural_gas.reserves.insert("NO2".into(), 1e8);
    for period in [1, 2] {
        natural_gas.terminal_capacity.insert((lng.clone(), period), 5000.0);
        natural_gas.terminal_import_cost.insert((lng.clone(), period), 25.0);
        natural_gas.pipeline_capital_cost.insert(period, 400.0);
    }

    let mut co2 = Co2 {
        pipeline_power_use: 1e-4,
        pipeline_lifetime: 40.0,
        site_lifetime: 30.0,
        ..Co2::default()
    };
    co2.max_sequestration.insert("NO2".into(), 1e8);
    for period in [1, 2] {
        co2.pipeline_capital_cost.insert(period, 300.0);
        co2.pipeline_om_cost.insert(period, 5.0);
        co2.site_capital_cost.insert(period, 2e5);
        co2.site_fixed_om_cost.insert(period, 5e3);
    }

    let mut industry = Industry::default();
    let steel: PlantID = "EafSteel".into();
    industry.plants.insert(
        steel.clone(),
        Plant {
            id: steel.clone(),
            sector: Sector::Steel,
        },
    );
    industry.consumption.insert(
        steel.clone(),
        Consumption {
            power: 0.7,
            gas: 0.5,
            hydrogen: 0.4,
            ..Consumption::default()
        },
    );
    industry.co2_captured.insert(steel.clone(), 0.08);
    industry.lifetime.insert(steel.clone(), 25.0);
    for period in [1, 2] {
        industry.capital_cost.insert((steel.clone(), period), 1e6);
        industry.fixed_om_cost.insert((steel.clone(), period), 2e4);
        industry.variable_om_cost.insert((steel.clone(), period), 15.0);
        industry
            .yearly_production
            .insert((Sector::Steel, "NO2".into(), period), TOY_STEEL_PRODUCTION);
    }

    model.supply_chain = Some(SupplyChain {
        hydrogen,
        natural_gas,
        co2,
        industry,
    });
}

/// Build the toy model
pub fn toy_model() -> Model {
    let temporal = toy_temporal();
    let mut electric_annual_demand = HashMap::new();
    let mut lost_load_cost = HashMap::new();
    for node in ["NO1", "NO2"] {
        for &period in &temporal.periods {
            electric_annual_demand.insert((NodeID::from(node), period), TOY_ANNUAL_DEMAND);
            lost_load_cost.insert((NodeID::from(node), period), 3000.0);
        }
    }
    Model {
        model_dir: PathBuf::new(),
        temporal,
        topology: toy_topology(),
        generators: toy_generators(),
        storages: Storages::default(),
        transmission: toy_transmission(),
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
