//! The module responsible for writing result data to disk.
use crate::generator::OutputCarrier;
use crate::model::Model;
use crate::problem::constraints::ConstraintKey;
use crate::problem::objective::operational_weight;
use crate::problem::solve::Solution;
use crate::problem::variables::{Carrier, VarKey};
use crate::problem::{COST_SCALE, EMISSION_SCALE, POWER_SCALE};
use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "expanse_results";

/// The output file name for built and installed capacities
const CAPACITIES_FILE_NAME: &str = "capacities.csv";

/// The output file name for hourly operational values
const OPERATIONS_FILE_NAME: &str = "operations.csv";

/// The output file name for shed loads
const SHED_FILE_NAME: &str = "shed.csv";

/// The output file name for nodal electricity prices
const PRICES_FILE_NAME: &str = "prices.csv";

/// The output file name for nodal emission intensities
const EMISSION_INTENSITY_FILE_NAME: &str = "emission_intensity.csv";

/// Damping factor of the emission-intensity fixed point
const INTENSITY_DAMPING: f64 = 0.5;

/// Convergence tolerance of the emission-intensity fixed point, tCO2/MWh
const INTENSITY_TOLERANCE: f64 = 1e-6;

/// Iteration cap of the emission-intensity fixed point
const INTENSITY_MAX_ITERATIONS: usize = 200;

/// Get the output directory for the model at `model_dir`
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    let model_dir = model_dir
        .canonicalize()
        .context("Could not resolve path to model")?;
    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;
    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Create the output directory if it does not exist yet
pub fn create_output_directory(output_dir: &Path) -> Result<()> {
    if output_dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(output_dir)?;
    Ok(())
}

/// A row of the capacities CSV file; capacities are reported in MW (plants
/// in tonnes per hour)
#[derive(Serialize, Debug, PartialEq)]
struct CapacityRow {
    asset_class: &'static str,
    location: String,
    entity: String,
    period: u32,
    built: f64,
    installed: f64,
}

/// A row of the operations CSV file; power in MW, CO2 in tonnes
#[derive(Serialize, Debug, PartialEq)]
struct OperationRow {
    variable: &'static str,
    location: String,
    entity: String,
    period: u32,
    scenario: u32,
    hour: u32,
    value: f64,
}

/// A row of the shed CSV file, MW (CO2 venting in tonnes)
#[derive(Serialize, Debug, PartialEq)]
struct ShedRow {
    carrier: &'static str,
    node: String,
    period: u32,
    scenario: u32,
    hour: u32,
    value: f64,
}

/// A row of the prices CSV file, EUR/MWh
#[derive(Serialize, Debug, PartialEq)]
struct PriceRow {
    node: String,
    period: u32,
    scenario: u32,
    hour: u32,
    price: f64,
}

/// A row of the emission intensity CSV file, tCO2/MWh
#[derive(Serialize, Debug, PartialEq)]
struct EmissionIntensityRow {
    node: String,
    period: u32,
    scenario: u32,
    intensity: f64,
}

fn carrier_name(carrier: Carrier) -> &'static str {
    match carrier {
        Carrier::Electricity => "electricity",
        Carrier::Heat => "heat",
        Carrier::Hydrogen => "hydrogen",
        Carrier::NaturalGas => "natural_gas",
        Carrier::Co2 => "co2",
    }
}

/// Write every report for a solved run
pub fn write_results(output_dir: &Path, model: &Model, solution: &Solution) -> Result<()> {
    write_capacities(output_dir, solution)?;
    write_operations(output_dir, solution)?;
    write_shed(output_dir, solution)?;
    write_prices(output_dir, model, solution)?;
    write_emission_intensities(output_dir, model, solution)?;
    info!("Wrote results to {output_dir:?}");
    Ok(())
}

/// The (class, location, entity, unscale) triple of an investment column;
/// `None` for operational columns and for installed keys (which are folded
/// into their built row)
fn built_key_parts(key: &VarKey) -> Option<(&'static str, String, String, f64)> {
    let parts = match key {
        VarKey::GenBuilt { node, gen, .. } => {
            ("generator", node.to_string(), gen.to_string(), POWER_SCALE)
        }
        VarKey::StorPowerBuilt { node, storage, .. } => (
            "storage_power",
            node.to_string(),
            storage.to_string(),
            POWER_SCALE,
        ),
        VarKey::StorEnergyBuilt { node, storage, .. } => (
            "storage_energy",
            node.to_string(),
            storage.to_string(),
            POWER_SCALE,
        ),
        VarKey::TransBuilt { from, to, .. } => (
            "transmission",
            from.to_string(),
            to.to_string(),
            POWER_SCALE,
        ),
        VarKey::OffshoreConverterBuilt { node, .. } => (
            "offshore_converter",
            node.to_string(),
            String::new(),
            POWER_SCALE,
        ),
        VarKey::ConverterBuilt { node, converter, .. } => (
            "heat_converter",
            node.to_string(),
            converter.to_string(),
            POWER_SCALE,
        ),
        VarKey::ElectrolyzerBuilt { node, .. } => {
            ("electrolyzer", node.to_string(), String::new(), POWER_SCALE)
        }
        VarKey::ReformerBuilt { node, plant, .. } => {
            ("reformer", node.to_string(), plant.to_string(), POWER_SCALE)
        }
        VarKey::H2StorageBuilt { node, .. } => {
            ("hydrogen_storage", node.to_string(), String::new(), POWER_SCALE)
        }
        VarKey::PipelineBuilt { carrier, from, to, .. } => (
            match carrier {
                Carrier::Hydrogen => "hydrogen_pipeline",
                Carrier::Co2 => "co2_pipeline",
                _ => "gas_pipeline",
            },
            from.to_string(),
            to.to_string(),
            POWER_SCALE,
        ),
        VarKey::Co2SiteBuilt { node, .. } => (
            "sequestration_site",
            node.to_string(),
            String::new(),
            EMISSION_SCALE,
        ),
        VarKey::PlantBuilt { node, plant, .. } => (
            "industry_plant",
            node.to_string(),
            plant.to_string(),
            EMISSION_SCALE,
        ),
        _ => return None,
    };
    Some(parts)
}

/// The installed-capacity key paired with a built key
fn installed_key(key: &VarKey) -> Option<VarKey> {
    let installed = match key.clone() {
        VarKey::GenBuilt { node, gen, period } => VarKey::GenInstalled { node, gen, period },
        VarKey::StorPowerBuilt { node, storage, period } => {
            VarKey::StorPowerInstalled { node, storage, period }
        }
        VarKey::StorEnergyBuilt { node, storage, period } => {
            VarKey::StorEnergyInstalled { node, storage, period }
        }
        VarKey::TransBuilt { from, to, period } => VarKey::TransInstalled { from, to, period },
        VarKey::OffshoreConverterBuilt { node, period } => {
            VarKey::OffshoreConverterInstalled { node, period }
        }
        VarKey::ConverterBuilt { node, converter, period } => {
            VarKey::ConverterInstalled { node, converter, period }
        }
        VarKey::ElectrolyzerBuilt { node, period } => {
            VarKey::ElectrolyzerInstalled { node, period }
        }
        VarKey::ReformerBuilt { node, plant, period } => {
            VarKey::ReformerInstalled { node, plant, period }
        }
        VarKey::H2StorageBuilt { node, period } => VarKey::H2StorageInstalled { node, period },
        VarKey::PipelineBuilt { carrier, from, to, period } => {
            VarKey::PipelineInstalled { carrier, from, to, period }
        }
        VarKey::Co2SiteBuilt { node, period } => VarKey::Co2SiteInstalled { node, period },
        VarKey::PlantBuilt { node, plant, period } => {
            VarKey::PlantInstalled { node, plant, period }
        }
        _ => return None,
    };
    Some(installed)
}

fn investment_period(key: &VarKey) -> u32 {
    match key {
        VarKey::GenBuilt { period, .. }
        | VarKey::StorPowerBuilt { period, .. }
        | VarKey::StorEnergyBuilt { period, .. }
        | VarKey::TransBuilt { period, .. }
        | VarKey::OffshoreConverterBuilt { period, .. }
        | VarKey::ConverterBuilt { period, .. }
        | VarKey::ElectrolyzerBuilt { period, .. }
        | VarKey::ReformerBuilt { period, .. }
        | VarKey::H2StorageBuilt { period, .. }
        | VarKey::PipelineBuilt { period, .. }
        | VarKey::Co2SiteBuilt { period, .. }
        | VarKey::PlantBuilt { period, .. } => *period,
        _ => 0,
    }
}

fn write_capacities(output_dir: &Path, solution: &Solution) -> Result<()> {
    let mut writer = csv::Writer::from_path(output_dir.join(CAPACITIES_FILE_NAME))?;
    for (key, built) in solution.values() {
        let Some((asset_class, location, entity, scale)) = built_key_parts(key) else {
            continue;
        };
        let paired = installed_key(key).context("Built key without an installed pair")?;
        let installed = solution.value(&paired)?;
        writer.serialize(CapacityRow {
            asset_class,
            location,
            entity,
            period: investment_period(key),
            built: built / scale,
            installed: installed / scale,
        })?;
    }
    writer.flush()?;
    Ok(())
}

fn write_operations(output_dir: &Path, solution: &Solution) -> Result<()> {
    let mut writer = csv::Writer::from_path(output_dir.join(OPERATIONS_FILE_NAME))?;
    for (key, value) in solution.values() {
        let (variable, location, entity, period, scenario, hour, scale) = match key {
            VarKey::Generation { node, gen, period, scenario, hour } => (
                "generation",
                node.to_string(),
                gen.to_string(),
                *period,
                *scenario,
                *hour,
                POWER_SCALE,
            ),
            VarKey::Charge { node, storage, period, scenario, hour } => (
                "charge",
                node.to_string(),
                storage.to_string(),
                *period,
                *scenario,
                *hour,
                POWER_SCALE,
            ),
            VarKey::Discharge { node, storage, period, scenario, hour } => (
                "discharge",
                node.to_string(),
                storage.to_string(),
                *period,
                *scenario,
                *hour,
                POWER_SCALE,
            ),
            VarKey::Level { node, storage, period, scenario, hour } => (
                "storage_level",
                node.to_string(),
                storage.to_string(),
                *period,
                *scenario,
                *hour,
                POWER_SCALE,
            ),
            VarKey::Flow { carrier, from, to, period, scenario, hour } => (
                carrier_name(*carrier),
                from.to_string(),
                to.to_string(),
                *period,
                *scenario,
                *hour,
                if *carrier == Carrier::Co2 {
                    EMISSION_SCALE
                } else {
                    POWER_SCALE
                },
            ),
            VarKey::ConverterUse { node, converter, period, scenario, hour } => (
                "converter_use",
                node.to_string(),
                converter.to_string(),
                *period,
                *scenario,
                *hour,
                POWER_SCALE,
            ),
            VarKey::ElectrolyzerOutput { node, period, scenario, hour } => (
                "electrolyzer_output",
                node.to_string(),
                String::new(),
                *period,
                *scenario,
                *hour,
                POWER_SCALE,
            ),
            VarKey::ReformerOutput { node, plant, period, scenario, hour } => (
                "reformer_output",
                node.to_string(),
                plant.to_string(),
                *period,
                *scenario,
                *hour,
                POWER_SCALE,
            ),
            VarKey::H2Charge { node, period, scenario, hour } => (
                "hydrogen_charge",
                node.to_string(),
                String::new(),
                *period,
                *scenario,
                *hour,
                POWER_SCALE,
            ),
            VarKey::H2Discharge { node, period, scenario, hour } => (
                "hydrogen_discharge",
                node.to_string(),
                String::new(),
                *period,
                *scenario,
                *hour,
                POWER_SCALE,
            ),
            VarKey::H2Level { node, period, scenario, hour } => (
                "hydrogen_level",
                node.to_string(),
                String::new(),
                *period,
                *scenario,
                *hour,
                POWER_SCALE,
            ),
            VarKey::TerminalImport { terminal, period, scenario, hour } => (
                "terminal_import",
                terminal.to_string(),
                String::new(),
                *period,
                *scenario,
                *hour,
                POWER_SCALE,
            ),
            VarKey::GasExtraction { node, period, scenario, hour } => (
                "gas_extraction",
                node.to_string(),
                String::new(),
                *period,
                *scenario,
                *hour,
                POWER_SCALE,
            ),
            VarKey::Sequestered { node, period, scenario, hour } => (
                "sequestered",
                node.to_string(),
                String::new(),
                *period,
                *scenario,
                *hour,
                EMISSION_SCALE,
            ),
            VarKey::PlantProduction { node, plant, period, scenario, hour } => (
                "plant_production",
                node.to_string(),
                plant.to_string(),
                *period,
                *scenario,
                *hour,
                EMISSION_SCALE,
            ),
            _ => continue,
        };
        writer.serialize(OperationRow {
            variable,
            location,
            entity,
            period,
            scenario,
            hour,
            value: value / scale,
        })?;
    }
    writer.flush()?;
    Ok(())
}

fn write_shed(output_dir: &Path, solution: &Solution) -> Result<()> {
    let mut writer = csv::Writer::from_path(output_dir.join(SHED_FILE_NAME))?;
    for (key, value) in solution.values() {
        let VarKey::Shed { carrier, node, period, scenario, hour } = key else {
            continue;
        };
        let scale = if *carrier == Carrier::Co2 {
            EMISSION_SCALE
        } else {
            POWER_SCALE
        };
        writer.serialize(ShedRow {
            carrier: carrier_name(*carrier),
            node: node.to_string(),
            period: *period,
            scenario: *scenario,
            hour: *hour,
            value: value / scale,
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// The electricity price is the balance dual divided by the expected-value
/// weight of its hour, converted back to EUR/MWh
fn write_prices(output_dir: &Path, model: &Model, solution: &Solution) -> Result<()> {
    let mut writer = csv::Writer::from_path(output_dir.join(PRICES_FILE_NAME))?;
    for node in model.topology.nodes.values().filter(|n| n.is_onshore()) {
        for &period in &model.temporal.periods {
            for &scenario in &model.temporal.scenarios {
                for hour in model.temporal.hours() {
                    let dual = solution.dual(&ConstraintKey::ElectricityBalance {
                        node: node.id.clone(),
                        period,
                        scenario,
                        hour,
                    })?;
                    let weight = operational_weight(model, period, hour)?;
                    writer.serialize(PriceRow {
                        node: node.id.to_string(),
                        period,
                        scenario,
                        hour,
                        price: dual * POWER_SCALE / COST_SCALE / weight,
                    })?;
                }
            }
        }
    }
    writer.flush()?;
    Ok(())
}

/// Solve the nodal emission-intensity fixed point for one (period,
/// scenario): a node's intensity covers its own generation plus the
/// intensity its imports carry.
fn write_emission_intensities(
    output_dir: &Path,
    model: &Model,
    solution: &Solution,
) -> Result<()> {
    let mut writer = csv::Writer::from_path(output_dir.join(EMISSION_INTENSITY_FILE_NAME))?;
    for &period in &model.temporal.periods {
        for &scenario in &model.temporal.scenarios {
            let intensities = emission_intensities(model, solution, period, scenario)?;
            for node in model.topology.nodes.keys() {
                writer.serialize(EmissionIntensityRow {
                    node: node.to_string(),
                    period,
                    scenario,
                    intensity: intensities[&node.to_string()],
                })?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}

fn emission_intensities(
    model: &Model,
    solution: &Solution,
    period: u32,
    scenario: u32,
) -> Result<HashMap<String, f64>> {
    // annual own emissions (kt), own generation and per-neighbour imports
    // (GWh), season-scale weighted
    let mut own_emissions: HashMap<String, f64> = HashMap::new();
    let mut own_generation: HashMap<String, f64> = HashMap::new();
    let mut imports: HashMap<String, Vec<(String, f64)>> = HashMap::new();

    for node in model.topology.nodes.values() {
        let name = node.id.to_string();
        let mut emissions = 0.0;
        let mut generation = 0.0;
        for season in &model.temporal.seasons {
            for hour in season.hours() {
                for gen in model.generators.at_node(&node.id) {
                    let entry = &model.generators.catalog[gen];
                    if entry.carrier != OutputCarrier::Electricity {
                        continue;
                    }
                    let output = solution.value(&VarKey::Generation {
                        node: node.id.clone(),
                        gen: gen.clone(),
                        period,
                        scenario,
                        hour,
                    })?;
                    generation += season.scale * output;
                    let content = model.generators.co2_content.get(gen).copied().unwrap_or(0.0);
                    let captured = model
                        .generators
                        .co2_captured
                        .get(gen)
                        .copied()
                        .unwrap_or(0.0);
                    if content > 0.0 {
                        let efficiency = model.generators.efficiency[&(gen.clone(), period)];
                        emissions +=
                            season.scale * output * (content - captured) / efficiency;
                    }
                }
            }
        }
        own_emissions.insert(name.clone(), emissions);
        own_generation.insert(name.clone(), generation);

        let mut inbound = Vec::new();
        for arc in model.topology.arcs.iter().filter(|a| a.touches(&node.id)) {
            let other = arc.other_end(&node.id).clone();
            let mut energy = 0.0;
            for season in &model.temporal.seasons {
                for hour in season.hours() {
                    energy += season.scale
                        * arc.efficiency
                        * solution.value(&VarKey::Flow {
                            carrier: Carrier::Electricity,
                            from: other.clone(),
                            to: node.id.clone(),
                            period,
                            scenario,
                            hour,
                        })?;
                }
            }
            inbound.push((other.to_string(), energy));
        }
        imports.insert(name, inbound);
    }

    Ok(attribute_intensity(
        &own_emissions,
        &own_generation,
        &imports,
    ))
}

/// Damped fixed point over the nodal intensities; meshed grids make the
/// import terms circular, so iterate up to a cap
fn attribute_intensity(
    own_emissions: &HashMap<String, f64>,
    own_generation: &HashMap<String, f64>,
    imports: &HashMap<String, Vec<(String, f64)>>,
) -> HashMap<String, f64> {
    let mut intensity: HashMap<String, f64> =
        own_emissions.keys().map(|n| (n.clone(), 0.0)).collect();
    for _ in 0..INTENSITY_MAX_ITERATIONS {
        let mut delta: f64 = 0.0;
        let mut next = intensity.clone();
        for (node, value) in &mut next {
            let inbound = &imports[node];
            let imported_energy: f64 = inbound.iter().map(|(_, e)| e).sum();
            let supply = own_generation[node] + imported_energy;
            let updated = if supply > 0.0 {
                let imported_emissions: f64 = inbound
                    .iter()
                    .map(|(source, energy)| energy * intensity[source])
                    .sum();
                (own_emissions[node] + imported_emissions) / supply
            } else {
                0.0
            };
            let damped = INTENSITY_DAMPING * *value + (1.0 - INTENSITY_DAMPING) * updated;
            delta = delta.max((damped - *value).abs());
            *value = damped;
        }
        intensity = next;
        if delta < INTENSITY_TOLERANCE {
            return intensity;
        }
    }
    warn!("Emission intensity attribution stopped after {INTENSITY_MAX_ITERATIONS} iterations");
    intensity
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    fn maps(
        entries: &[(&str, f64, f64, &[(&str, f64)])],
    ) -> (
        HashMap<String, f64>,
        HashMap<String, f64>,
        HashMap<String, Vec<(String, f64)>>,
    ) {
        let mut emissions = HashMap::new();
        let mut generation = HashMap::new();
        let mut imports = HashMap::new();
        for (node, own_emissions, own_generation, inbound) in entries {
            emissions.insert(node.to_string(), *own_emissions);
            generation.insert(node.to_string(), *own_generation);
            imports.insert(
                node.to_string(),
                inbound
                    .iter()
                    .map(|(source, energy)| (source.to_string(), *energy))
                    .collect(),
            );
        }
        (emissions, generation, imports)
    }

    #[test]
    fn test_intensity_converges_on_an_exchange() {
        // A emits 10 kt over 100 GWh and sends 20 GWh to B, which is clean
        let (emissions, generation, imports) = maps(&[
            ("A", 10.0, 100.0, &[]),
            ("B", 0.0, 80.0, &[("A", 20.0)]),
        ]);
        let intensity = attribute_intensity(&emissions, &generation, &imports);
        assert_approx_eq!(f64, intensity["A"], 0.1, epsilon = 1e-5);
        // B: 20 GWh at 0.1 over 100 GWh supplied
        assert_approx_eq!(f64, intensity["B"], 0.02, epsilon = 1e-5);
    }

    #[test]
    fn test_intensity_iteration_cap_terminates() {
        // a two-node loop trading far more energy than either produces
        // contracts too slowly for the tolerance; the cap must still
        // return finite values
        let (emissions, generation, imports) = maps(&[
            ("A", 5.0, 1.0, &[("B", 100.0)]),
            ("B", 5.0, 1.0, &[("A", 100.0)]),
        ]);
        let intensity = attribute_intensity(&emissions, &generation, &imports);
        assert!(intensity.values().all(|value| value.is_finite()));
    }
}
