//! Heat module parameters.
//!
//! Heat is served by heat-only and CHP generators (carrier-tagged in the
//! generator catalog), thermal storage, and converters that turn
//! electricity into heat at a sampled coefficient of performance.
use crate::id::{ConverterID, NodeID};
use crate::input::{read_tab_vec, read_tab_vec_optional};
use anyhow::{ensure, Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// One converter design (heat pumps, electric boilers)
#[derive(Clone, Debug, Deserialize)]
pub struct Converter {
    /// Converter identifier
    #[serde(rename = "Converter")]
    pub id: ConverterID,
    /// Whether output per MW electric follows the sampled air-source COP
    /// profile instead of a constant coefficient
    #[serde(rename = "TracksCOP")]
    pub tracks_cop: bool,
}

/// Heat module catalog and parameter tables
#[derive(Clone, Debug, Default)]
pub struct Heat {
    /// Converter catalog
    pub converters: IndexMap<ConverterID, Converter>,
    /// Which converters are installable at which node
    pub of_node: IndexMap<NodeID, Vec<ConverterID>>,
    /// Converter capital cost, EUR/MW electric input
    pub converter_capital_cost: HashMap<(ConverterID, u32), f64>,
    /// Converter fixed O&M cost, EUR/MW/yr
    pub converter_fixed_om_cost: HashMap<(ConverterID, u32), f64>,
    /// Constant coefficient of performance for non-tracking designs
    pub converter_cop: HashMap<ConverterID, f64>,
    /// Converter lifetime, years
    pub converter_lifetime: HashMap<ConverterID, f64>,
    /// Pre-existing converter capacity, MW
    pub converter_initial_capacity: HashMap<(NodeID, ConverterID, u32), f64>,
    /// Annual heat demand, MWh/yr
    pub annual_demand: HashMap<(NodeID, u32), f64>,
    /// Share of the sampled electric load profile that is resistive heating
    /// and moves to the heat balance when the module is on
    pub electric_heat_share: HashMap<NodeID, f64>,
}

#[derive(Deserialize)]
struct ConverterRow {
    #[serde(rename = "Converter")]
    converter: ConverterID,
    #[serde(rename = "Value")]
    value: f64,
}

#[derive(Deserialize)]
struct ConverterPeriodRow {
    #[serde(rename = "Converter")]
    converter: ConverterID,
    #[serde(rename = "Period")]
    period: u32,
    #[serde(rename = "Value")]
    value: f64,
}

#[derive(Deserialize)]
struct NodeConverterPeriodRow {
    #[serde(rename = "Node")]
    node: NodeID,
    #[serde(rename = "Converter")]
    converter: ConverterID,
    #[serde(rename = "Period")]
    period: u32,
    #[serde(rename = "Value")]
    value: f64,
}

#[derive(Deserialize)]
struct ConvertersOfNodeRow {
    #[serde(rename = "Node")]
    node: NodeID,
    #[serde(rename = "Converter")]
    converter: ConverterID,
}

#[derive(Deserialize)]
struct NodePeriodRow {
    #[serde(rename = "Node")]
    node: NodeID,
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

/// Read the heat module tables from `model_dir`
pub fn read_heat(model_dir: &Path) -> Result<Heat> {
    let converter_rows: Vec<Converter> = read_tab_vec(&model_dir.join("Sets_Converters.tab"))?;
    let mut converters = IndexMap::new();
    for entry in converter_rows {
        ensure!(
            converters.insert(entry.id.clone(), entry.clone()).is_none(),
            "Duplicate converter {} in catalog",
            entry.id
        );
    }

    let of_node_rows: Vec<ConvertersOfNodeRow> =
        read_tab_vec(&model_dir.join("Sets_ConvertersOfNode.tab"))?;
    let mut of_node: IndexMap<NodeID, Vec<ConverterID>> = IndexMap::new();
    for row in of_node_rows {
        ensure!(
            converters.contains_key(&row.converter),
            "ConvertersOfNode names unknown converter {}",
            row.converter
        );
        of_node.entry(row.node).or_default().push(row.converter);
    }

    let capital_rows: Vec<ConverterPeriodRow> =
        read_tab_vec(&model_dir.join("Heat_ConverterCapitalCost.tab"))?;
    let om_rows: Vec<ConverterPeriodRow> =
        read_tab_vec(&model_dir.join("Heat_ConverterFixedOMCost.tab"))?;
    let cop_rows: Vec<ConverterRow> =
        read_tab_vec_optional(&model_dir.join("Heat_ConverterCOP.tab"))?;
    let lifetime_rows: Vec<ConverterRow> =
        read_tab_vec(&model_dir.join("Heat_ConverterLifetime.tab"))?;
    let initial_rows: Vec<NodeConverterPeriodRow> =
        read_tab_vec_optional(&model_dir.join("Heat_ConverterInitialCapacity.tab"))?;
    let demand_rows: Vec<NodePeriodRow> = read_tab_vec(&model_dir.join("Heat_AnnualDemand.tab"))?;
    let share_rows: Vec<NodeRow> = read_tab_vec(&model_dir.join("Heat_ElectricHeatShare.tab"))?;

    let heat = Heat {
        converter_capital_cost: capital_rows
            .into_iter()
            .map(|r| ((r.converter, r.period), r.value))
            .collect(),
        converter_fixed_om_cost: om_rows
            .into_iter()
            .map(|r| ((r.converter, r.period), r.value))
            .collect(),
        converter_cop: cop_rows.into_iter().map(|r| (r.converter, r.value)).collect(),
        converter_lifetime: lifetime_rows
            .into_iter()
            .map(|r| (r.converter, r.value))
            .collect(),
        converter_initial_capacity: initial_rows
            .into_iter()
            .map(|r| ((r.node, r.converter, r.period), r.value))
            .collect(),
        annual_demand: demand_rows
            .into_iter()
            .map(|r| ((r.node, r.period), r.value))
            .collect(),
        electric_heat_share: share_rows.into_iter().map(|r| (r.node, r.value)).collect(),
        converters,
        of_node,
    };
    heat.validate()?;
    Ok(heat)
}

impl Heat {
    /// Cross-check converter parameters and demand shares
    pub fn validate(&self) -> Result<()> {
        for (id, converter) in &self.converters {
            self.converter_lifetime
                .get(id)
                .with_context(|| format!("No lifetime given for converter {id}"))?;
            if !converter.tracks_cop {
                self.converter_cop.get(id).with_context(|| {
                    format!("Converter {id} has no COP profile and no constant COP")
                })?;
            }
        }
        for (node, share) in &self.electric_heat_share {
            ensure!(
                (0.0..=1.0).contains(share),
                "Electric heat share for node {node} must be within [0, 1]"
            );
        }
        Ok(())
    }

    /// Converters installable at `node`
    pub fn at_node(&self, node: &NodeID) -> &[ConverterID] {
        self.of_node.get(node).map_or(&[], Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_converter(tracks_cop: bool) -> Heat {
        let mut heat = Heat::default();
        let id: ConverterID = "HeatPump".into();
        heat.converters.insert(
            id.clone(),
            Converter {
                id: id.clone(),
                tracks_cop,
            },
        );
        heat.converter_lifetime.insert(id, 20.0);
        heat
    }

    #[test]
    fn test_constant_cop_required_without_profile() {
        let mut heat = with_converter(false);
        assert!(heat.validate().is_err());
        heat.converter_cop.insert("HeatPump".into(), 3.0);
        assert!(heat.validate().is_ok());
    }

    #[test]
    fn test_tracking_converter_needs_no_constant() {
        let heat = with_converter(true);
        assert!(heat.validate().is_ok());
    }

    #[test]
    fn test_share_bounds() {
        let mut heat = with_converter(true);
        heat.electric_heat_share.insert("DE".into(), 1.2);
        assert!(heat.validate().is_err());
    }
}
