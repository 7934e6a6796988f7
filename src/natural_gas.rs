//! Natural-gas supply parameters.
//!
//! Gas enters the system through import terminals (LNG or border points)
//! and domestic extraction limited by cumulative reserves, and moves over
//! gas pipelines.
use crate::id::{NodeID, TerminalID};
use crate::input::{read_tab_vec, read_tab_vec_optional};
use anyhow::{ensure, Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// One import terminal
#[derive(Clone, Debug, Deserialize)]
pub struct Terminal {
    /// Terminal identifier
    #[serde(rename = "Terminal")]
    pub id: TerminalID,
    /// The natural-gas node it feeds
    #[serde(rename = "Node")]
    pub node: NodeID,
}

/// Natural-gas module parameter tables
#[derive(Clone, Debug, Default)]
pub struct NaturalGas {
    /// Terminal catalog
    pub terminals: IndexMap<TerminalID, Terminal>,
    /// Hourly import capacity per terminal and period, MWh/h
    pub terminal_capacity: HashMap<(TerminalID, u32), f64>,
    /// Import cost per terminal and period, EUR/MWh
    pub terminal_import_cost: HashMap<(TerminalID, u32), f64>,
    /// Cumulative extractable reserves per node over the whole horizon, MWh
    pub reserves: HashMap<NodeID, f64>,
    /// Pipeline capital cost per km, EUR/MW/km
    pub pipeline_capital_cost: HashMap<u32, f64>,
    /// Compressor electricity per unit flow and distance, MWh el / MWh gas / km
    pub pipeline_power_use: f64,
    /// Pipeline lifetime, years
    pub pipeline_lifetime: f64,
}

#[derive(Deserialize)]
struct TerminalPeriodRow {
    #[serde(rename = "Terminal")]
    terminal: TerminalID,
    #[serde(rename = "Period")]
    period: u32,
    #[serde(rename = "Value")]
    value: f64,
}

#[derive(Deserialize)]
struct NodeRow {
    #[serde(rename = "Node")]
    node: NodeID,
    #[serde(rename = "Value")]
    value: f64,
}

#[derive(Deserialize)]
struct PeriodRow {
    #[serde(rename = "Period")]
    period: u32,
    #[serde(rename = "Value")]
    value: f64,
}

fn terminal_period_param(rows: Vec<TerminalPeriodRow>) -> HashMap<(TerminalID, u32), f64> {
    rows.into_iter()
        .map(|r| ((r.terminal, r.period), r.value))
        .collect()
}

fn node_param(rows: Vec<NodeRow>) -> HashMap<NodeID, f64> {
    rows.into_iter().map(|r| (r.node, r.value)).collect()
}

/// Read the natural-gas module tables from `model_dir`
pub fn read_natural_gas(model_dir: &Path) -> Result<NaturalGas> {
    let terminal_rows: Vec<Terminal> = read_tab_vec(&model_dir.join("Sets_GasTerminals.tab"))?;
    let mut terminals = IndexMap::new();
    for entry in terminal_rows {
        ensure!(
            terminals.insert(entry.id.clone(), entry.clone()).is_none(),
            "Duplicate gas terminal {} in catalog",
            entry.id
        );
    }

    let capital_rows: Vec<PeriodRow> =
        read_tab_vec(&model_dir.join("NaturalGas_PipelineCapitalCost.tab"))?;
    let power_use_rows: Vec<PeriodRow> =
        read_tab_vec(&model_dir.join("NaturalGas_PipelinePowerUse.tab"))?;
    let lifetime_rows: Vec<PeriodRow> =
        read_tab_vec(&model_dir.join("NaturalGas_PipelineLifetime.tab"))?;

    let gas = NaturalGas {
        terminal_capacity: terminal_period_param(read_tab_vec(
            &model_dir.join("NaturalGas_TerminalCapacity.tab"),
        )?),
        terminal_import_cost: terminal_period_param(read_tab_vec(
            &model_dir.join("NaturalGas_TerminalImportCost.tab"),
        )?),
        reserves: node_param(read_tab_vec_optional(
            &model_dir.join("NaturalGas_Reserves.tab"),
        )?),
        pipeline_capital_cost: capital_rows.into_iter().map(|r| (r.period, r.value)).collect(),
        pipeline_power_use: power_use_rows
            .first()
            .context("NaturalGas_PipelinePowerUse.tab must contain one value")?
            .value,
        pipeline_lifetime: lifetime_rows
            .first()
            .context("NaturalGas_PipelineLifetime.tab must contain one value")?
            .value,
        terminals,
    };
    gas.validate()?;
    Ok(gas)
}

impl NaturalGas {
    /// Cross-check that every terminal has a capacity and import cost
    pub fn validate(&self) -> Result<()> {
        for ((terminal, period), _) in &self.terminal_capacity {
            ensure!(
                self.terminals.contains_key(terminal),
                "Terminal capacity given for unknown terminal {terminal}"
            );
            self.terminal_import_cost
                .get(&(terminal.clone(), *period))
                .with_context(|| {
                    format!("No import cost for terminal {terminal} in period {period}")
                })?;
        }
        Ok(())
    }

    /// Terminals feeding `node`
    pub fn terminals_at<'a>(&'a self, node: &'a NodeID) -> impl Iterator<Item = &'a Terminal> {
        self.terminals.values().filter(move |t| t.node == *node)
    }

    /// Pipeline capital cost for a corridor of `length_km`, EUR/MW
    pub fn pipeline_capital_cost(&self, length_km: f64, period: u32) -> Result<f64> {
        let per_km = self
            .pipeline_capital_cost
            .get(&period)
            .with_context(|| format!("No gas pipeline capital cost for period {period}"))?;
        Ok(per_km * length_km)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_terminal() -> NaturalGas {
        let mut gas = NaturalGas::default();
        let id: TerminalID = "LNG_DE".into();
        gas.terminals.insert(
            id.clone(),
            Terminal {
                id: id.clone(),
                node: "DE".into(),
            },
        );
        gas.terminal_capacity.insert((id.clone(), 1), 5000.0);
        gas.terminal_import_cost.insert((id, 1), 30.0);
        gas
    }

    #[test]
    fn test_validate_wants_matching_import_cost() {
        let mut gas = with_terminal();
        assert!(gas.validate().is_ok());
        gas.terminal_capacity.insert(("LNG_DE".into(), 2), 5000.0);
        assert!(gas.validate().is_err());
    }

    #[test]
    fn test_terminals_at_filters_by_node() {
        let gas = with_terminal();
        assert_eq!(gas.terminals_at(&"DE".into()).count(), 1);
        assert_eq!(gas.terminals_at(&"NO2".into()).count(), 0);
    }
}
