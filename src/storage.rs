//! The storage catalog and its parameter tables.
//!
//! A storage unit has paired power (MW) and energy (MWh) capacities, each
//! with its own investment lifecycle. "Dependent" storage types carry a
//! fixed power-to-energy ratio linking the two; independent types invest in
//! power and energy separately.
use crate::id::{NodeID, StorageID};
use crate::input::{read_tab_vec, read_tab_vec_optional};
use anyhow::{ensure, Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// The carrier a storage unit shifts in time
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageCarrier {
    /// Electric energy storage (batteries, pumped hydro)
    Electricity,
    /// Thermal storage (heat module only)
    Heat,
    /// Hydrogen storage at production nodes
    Hydrogen,
}

/// One catalog entry
#[derive(Clone, Debug, Deserialize)]
pub struct Storage {
    /// Storage identifier
    #[serde(rename = "Storage")]
    pub id: StorageID,
    /// Carrier tag
    #[serde(rename = "Carrier")]
    pub carrier: StorageCarrier,
}

/// Map of a per-storage scalar parameter
pub type StorParam = HashMap<StorageID, f64>;
/// Map of a per-(storage, period) parameter
pub type StorPeriodParam = HashMap<(StorageID, u32), f64>;
/// Map of a per-(node, storage, period) parameter
pub type NodeStorPeriodParam = HashMap<(NodeID, StorageID, u32), f64>;

/// The storage catalog plus every raw storage parameter table
#[derive(Clone, Debug, Default)]
pub struct Storages {
    /// Catalog entries keyed by ID
    pub catalog: IndexMap<StorageID, Storage>,
    /// Which storages are installable at which node
    pub of_node: IndexMap<NodeID, Vec<StorageID>>,
    /// Hourly self-discharge retention (1 = lossless)
    pub bleed_efficiency: StorParam,
    /// Charging efficiency
    pub charge_efficiency: StorParam,
    /// Discharging efficiency
    pub discharge_efficiency: StorParam,
    /// Fixed power-to-energy ratio for dependent types (absent = independent)
    pub pow_to_energy: StorParam,
    /// Fractional fill that seeds and closes every season cycle
    pub initial_level_fraction: StorParam,
    /// Power capital cost, EUR/MW
    pub power_capital_cost: StorPeriodParam,
    /// Power fixed O&M cost, EUR/MW/yr
    pub power_fixed_om_cost: StorPeriodParam,
    /// Energy capital cost, EUR/MWh
    pub energy_capital_cost: StorPeriodParam,
    /// Energy fixed O&M cost, EUR/MWh/yr
    pub energy_fixed_om_cost: StorPeriodParam,
    /// Pre-existing power capacity, MW
    pub initial_power_capacity: NodeStorPeriodParam,
    /// Pre-existing energy capacity, MWh
    pub initial_energy_capacity: NodeStorPeriodParam,
    /// Per-period build limit on power capacity, MW
    pub power_max_built_capacity: NodeStorPeriodParam,
    /// Per-period build limit on energy capacity, MWh
    pub energy_max_built_capacity: NodeStorPeriodParam,
    /// Upper bound on installed power capacity, MW
    pub power_max_installed_capacity: HashMap<(NodeID, StorageID), f64>,
    /// Upper bound on installed energy capacity, MWh
    pub energy_max_installed_capacity: HashMap<(NodeID, StorageID), f64>,
    /// Physical lifetime, years
    pub lifetime: StorParam,
}

#[derive(Deserialize)]
struct StorRow {
    #[serde(rename = "Storage")]
    storage: StorageID,
    #[serde(rename = "Value")]
    value: f64,
}

#[derive(Deserialize)]
struct StorPeriodRow {
    #[serde(rename = "Storage")]
    storage: StorageID,
    #[serde(rename = "Period")]
    period: u32,
    #[serde(rename = "Value")]
    value: f64,
}

#[derive(Deserialize)]
struct NodeStorRow {
    #[serde(rename = "Node")]
    node: NodeID,
    #[serde(rename = "Storage")]
    storage: StorageID,
    #[serde(rename = "Value")]
    value: f64,
}

#[derive(Deserialize)]
struct NodeStorPeriodRow {
    #[serde(rename = "Node")]
    node: NodeID,
    #[serde(rename = "Storage")]
    storage: StorageID,
    #[serde(rename = "Period")]
    period: u32,
    #[serde(rename = "Value")]
    value: f64,
}

#[derive(Deserialize)]
struct StoragesOfNodeRow {
    #[serde(rename = "Node")]
    node: NodeID,
    #[serde(rename = "Storage")]
    storage: StorageID,
}

fn stor_param(rows: Vec<StorRow>) -> StorParam {
    rows.into_iter().map(|r| (r.storage, r.value)).collect()
}

fn stor_period_param(rows: Vec<StorPeriodRow>) -> StorPeriodParam {
    rows.into_iter()
        .map(|r| ((r.storage, r.period), r.value))
        .collect()
}

fn node_stor_period_param(rows: Vec<NodeStorPeriodRow>) -> NodeStorPeriodParam {
    rows.into_iter()
        .map(|r| ((r.node, r.storage, r.period), r.value))
        .collect()
}

/// Read the storage catalog and parameter tables from `model_dir`
pub fn read_storages(model_dir: &Path) -> Result<Storages> {
    let catalog_rows: Vec<Storage> = read_tab_vec(&model_dir.join("Sets_Storages.tab"))?;
    let mut catalog = IndexMap::new();
    for entry in catalog_rows {
        ensure!(
            catalog.insert(entry.id.clone(), entry.clone()).is_none(),
            "Duplicate storage {} in catalog",
            entry.id
        );
    }

    let of_node_rows: Vec<StoragesOfNodeRow> =
        read_tab_vec(&model_dir.join("Sets_StoragesOfNode.tab"))?;
    let mut of_node: IndexMap<NodeID, Vec<StorageID>> = IndexMap::new();
    for row in of_node_rows {
        ensure!(
            catalog.contains_key(&row.storage),
            "StoragesOfNode names unknown storage {}",
            row.storage
        );
        of_node.entry(row.node).or_default().push(row.storage);
    }

    let read_stor = |name: &str| -> Result<StorParam> {
        Ok(stor_param(read_tab_vec(&model_dir.join(name))?))
    };
    let read_stor_opt = |name: &str| -> Result<StorParam> {
        Ok(stor_param(read_tab_vec_optional(&model_dir.join(name))?))
    };
    let read_stor_period = |name: &str| -> Result<StorPeriodParam> {
        Ok(stor_period_param(read_tab_vec(&model_dir.join(name))?))
    };
    let read_node_stor = |name: &str| -> Result<HashMap<(NodeID, StorageID), f64>> {
        let rows: Vec<NodeStorRow> = read_tab_vec(&model_dir.join(name))?;
        Ok(rows
            .into_iter()
            .map(|r| ((r.node, r.storage), r.value))
            .collect())
    };
    let read_node_stor_period = |name: &str| -> Result<NodeStorPeriodParam> {
        Ok(node_stor_period_param(read_tab_vec_optional(
            &model_dir.join(name),
        )?))
    };

    let storages = Storages {
        bleed_efficiency: read_stor("Storage_StorageBleedEfficiency.tab")?,
        charge_efficiency: read_stor("Storage_StorageChargeEff.tab")?,
        discharge_efficiency: read_stor("Storage_StorageDischargeEff.tab")?,
        pow_to_energy: read_stor_opt("Storage_StoragePowToEnergy.tab")?,
        initial_level_fraction: read_stor("Storage_StorageInitialEnergyLevel.tab")?,
        power_capital_cost: read_stor_period("Storage_PowerCapitalCost.tab")?,
        power_fixed_om_cost: read_stor_period("Storage_PowerFixedOMCost.tab")?,
        energy_capital_cost: read_stor_period("Storage_EnergyCapitalCost.tab")?,
        energy_fixed_om_cost: read_stor_period("Storage_EnergyFixedOMCost.tab")?,
        initial_power_capacity: read_node_stor_period("Storage_InitialPowerCapacity.tab")?,
        initial_energy_capacity: read_node_stor_period("Storage_EnergyInitialCapacity.tab")?,
        power_max_built_capacity: read_node_stor_period("Storage_PowerMaxBuiltCapacity.tab")?,
        energy_max_built_capacity: read_node_stor_period("Storage_EnergyMaxBuiltCapacity.tab")?,
        power_max_installed_capacity: read_node_stor("Storage_PowerMaxInstalledCapacity.tab")?,
        energy_max_installed_capacity: read_node_stor("Storage_EnergyMaxInstalledCapacity.tab")?,
        lifetime: read_stor("Storage_Lifetime.tab")?,
        catalog,
        of_node,
    };
    storages.validate()?;
    Ok(storages)
}

impl Storages {
    /// Cross-check that each catalog entry has the parameters it needs
    pub fn validate(&self) -> Result<()> {
        for id in self.catalog.keys() {
            for (name, table) in [
                ("bleed efficiency", &self.bleed_efficiency),
                ("charge efficiency", &self.charge_efficiency),
                ("discharge efficiency", &self.discharge_efficiency),
                ("initial level fraction", &self.initial_level_fraction),
                ("lifetime", &self.lifetime),
            ] {
                table
                    .get(id)
                    .with_context(|| format!("No {name} given for storage {id}"))?;
            }
            let fraction = self.initial_level_fraction[id];
            ensure!(
                (0.0..=1.0).contains(&fraction),
                "Initial level fraction for {id} must be within [0, 1]"
            );
        }
        Ok(())
    }

    /// Storages installable at `node`
    pub fn at_node(&self, node: &NodeID) -> &[StorageID] {
        self.of_node.get(node).map_or(&[], Vec::as_slice)
    }

    /// Whether energy capacity is tied to power capacity by a fixed ratio
    pub fn is_dependent(&self, id: &StorageID) -> bool {
        self.pow_to_energy.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> Storages {
        let mut storages = Storages::default();
        let id: StorageID = "Battery".into();
        storages.catalog.insert(
            id.clone(),
            Storage {
                id: id.clone(),
                carrier: StorageCarrier::Electricity,
            },
        );
        storages.bleed_efficiency.insert(id.clone(), 1.0);
        storages.charge_efficiency.insert(id.clone(), 0.95);
        storages.discharge_efficiency.insert(id.clone(), 0.95);
        storages.initial_level_fraction.insert(id.clone(), 0.5);
        storages.lifetime.insert(id, 15.0);
        storages
    }

    #[test]
    fn test_validate_minimal() {
        assert!(minimal().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_fill_fraction() {
        let mut storages = minimal();
        storages
            .initial_level_fraction
            .insert("Battery".into(), 1.5);
        assert!(storages.validate().is_err());
    }

    #[test]
    fn test_dependent_flag() {
        let mut storages = minimal();
        assert!(!storages.is_dependent(&"Battery".into()));
        storages.pow_to_energy.insert("Battery".into(), 6.0);
        assert!(storages.is_dependent(&"Battery".into()));
    }
}
