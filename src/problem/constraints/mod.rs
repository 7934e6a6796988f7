//! Constraint rows, grouped by concern.
//!
//! Every row is identified by a [`ConstraintKey`] so duals can be read back
//! by name after the solve. Rows are added in a fixed order: lifecycle
//! equalities first, then carrier balances, then the operational bounds.
use super::BuildContext;
use super::ProblemBuilder;
use crate::id::{ConverterID, GeneratorID, NodeID, PlantID, StorageID};
use crate::industry::Sector;
use anyhow::Result;
use std::rc::Rc;

use super::variables::Carrier;

mod balance;
mod generation;
mod lifecycle;
mod storage;
mod supply_chain;
mod transmission;

/// Identifies one row of the program
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ConstraintKey {
    GenLifecycle { node: NodeID, gen: GeneratorID, period: u32 },
    StorPowerLifecycle { node: NodeID, storage: StorageID, period: u32 },
    StorEnergyLifecycle { node: NodeID, storage: StorageID, period: u32 },
    TransLifecycle { from: NodeID, to: NodeID, period: u32 },
    OffshoreConverterLifecycle { node: NodeID, period: u32 },
    ConverterLifecycle { node: NodeID, converter: ConverterID, period: u32 },
    ElectrolyzerLifecycle { node: NodeID, period: u32 },
    ReformerLifecycle { node: NodeID, plant: PlantID, period: u32 },
    H2StorageLifecycle { node: NodeID, period: u32 },
    PipelineLifecycle { carrier: Carrier, from: NodeID, to: NodeID, period: u32 },
    Co2SiteLifecycle { node: NodeID, period: u32 },
    PlantLifecycle { node: NodeID, plant: PlantID, period: u32 },
    ElectricityBalance { node: NodeID, period: u32, scenario: u32, hour: u32 },
    HeatBalance { node: NodeID, period: u32, scenario: u32, hour: u32 },
    HydrogenBalance { node: NodeID, period: u32, scenario: u32, hour: u32 },
    GasBalance { node: NodeID, period: u32, scenario: u32, hour: u32 },
    Co2Balance { node: NodeID, period: u32, scenario: u32, hour: u32 },
    Availability { node: NodeID, gen: GeneratorID, period: u32, scenario: u32, hour: u32 },
    Ramping { node: NodeID, gen: GeneratorID, period: u32, scenario: u32, hour: u32 },
    HydroSeasonalBudget { node: NodeID, season: Rc<str>, period: u32, scenario: u32 },
    HydroAnnualBudget { node: NodeID, period: u32, scenario: u32 },
    BioBudget { period: u32 },
    EmissionCap { period: u32, scenario: u32 },
    StorageDynamics { node: NodeID, storage: StorageID, period: u32, scenario: u32, hour: u32 },
    StorageCyclic { node: NodeID, storage: StorageID, period: u32, scenario: u32, season: Rc<str> },
    LevelCap { node: NodeID, storage: StorageID, period: u32, scenario: u32, hour: u32 },
    ChargeCap { node: NodeID, storage: StorageID, period: u32, scenario: u32, hour: u32 },
    DischargeCap { node: NodeID, storage: StorageID, period: u32, scenario: u32, hour: u32 },
    PowerEnergyRatio { node: NodeID, storage: StorageID, period: u32 },
    FlowCap { carrier: Carrier, from: NodeID, to: NodeID, period: u32, scenario: u32, hour: u32 },
    OffshoreConverterCap { node: NodeID, period: u32, scenario: u32, hour: u32 },
    ElectrolyzerCap { node: NodeID, period: u32, scenario: u32, hour: u32 },
    ReformerCap { node: NodeID, plant: PlantID, period: u32, scenario: u32, hour: u32 },
    H2StorageDynamics { node: NodeID, period: u32, scenario: u32, hour: u32 },
    H2StorageCyclic { node: NodeID, period: u32, scenario: u32, season: Rc<str> },
    H2LevelCap { node: NodeID, period: u32, scenario: u32, hour: u32 },
    GasReserve { node: NodeID },
    SequestrationRateCap { node: NodeID, period: u32, scenario: u32, hour: u32 },
    SequestrationVolume { node: NodeID },
    PlantCap { node: NodeID, plant: PlantID, period: u32, scenario: u32, hour: u32 },
    IndustryHourlyProduction { sector: Sector, node: NodeID, period: u32, scenario: u32, hour: u32 },
    IndustryYearlyProduction { sector: Sector, node: NodeID, period: u32, scenario: u32 },
}

/// Add every row of the program
pub fn add_all(builder: &mut ProblemBuilder, ctx: &BuildContext) -> Result<()> {
    lifecycle::add_all(builder, ctx)?;
    balance::add_all(builder, ctx)?;
    generation::add_all(builder, ctx)?;
    storage::add_all(builder, ctx)?;
    transmission::add_all(builder, ctx)?;
    if ctx.model.supply_chain.is_some() {
        supply_chain::add_all(builder, ctx)?;
    }
    Ok(())
}
