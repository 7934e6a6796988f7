//! Transmission expansion parameters.
//!
//! Costs attach to line types and scale with corridor length; capacity
//! limits and pre-existing capacity attach to individual corridors. The
//! offshore converter is a separate asset class sized per offshore hub to
//! carry the power landed there.
use crate::id::{LineTypeID, NodeID};
use crate::input::{read_tab_vec, read_tab_vec_optional};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Map of a per-(line type, period) parameter
pub type LineTypePeriodParam = HashMap<(LineTypeID, u32), f64>;
/// Map of a per-(corridor, period) parameter, corridor keyed by canonical endpoints
pub type ArcPeriodParam = HashMap<(NodeID, NodeID, u32), f64>;

/// Transmission cost and limit tables
#[derive(Clone, Debug, Default)]
pub struct Transmission {
    /// Length-proportional capital cost, EUR/MW/km
    pub type_capital_cost: LineTypePeriodParam,
    /// Length-proportional fixed O&M cost, EUR/MW/km/yr
    pub type_fixed_om_cost: LineTypePeriodParam,
    /// Physical lifetime per line type, years
    pub lifetime: HashMap<LineTypeID, f64>,
    /// Pre-existing corridor capacity, MW
    pub initial_capacity: ArcPeriodParam,
    /// Per-period build limit, MW
    pub max_built_capacity: ArcPeriodParam,
    /// Upper bound on installed corridor capacity, MW
    pub max_installed_capacity: HashMap<(NodeID, NodeID), f64>,
    /// Offshore converter capital cost, EUR/MW
    pub converter_capital_cost: HashMap<u32, f64>,
    /// Offshore converter fixed O&M cost, EUR/MW/yr
    pub converter_fixed_om_cost: HashMap<u32, f64>,
    /// Offshore converter lifetime, years
    pub converter_lifetime: f64,
}

#[derive(Deserialize)]
struct TypePeriodRow {
    #[serde(rename = "LineType")]
    line_type: LineTypeID,
    #[serde(rename = "Period")]
    period: u32,
    #[serde(rename = "Value")]
    value: f64,
}

#[derive(Deserialize)]
struct TypeRow {
    #[serde(rename = "LineType")]
    line_type: LineTypeID,
    #[serde(rename = "Value")]
    value: f64,
}

#[derive(Deserialize)]
struct ArcPeriodRow {
    #[serde(rename = "FromNode")]
    from: NodeID,
    #[serde(rename = "ToNode")]
    to: NodeID,
    #[serde(rename = "Period")]
    period: u32,
    #[serde(rename = "Value")]
    value: f64,
}

#[derive(Deserialize)]
struct ArcRow {
    #[serde(rename = "FromNode")]
    from: NodeID,
    #[serde(rename = "ToNode")]
    to: NodeID,
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

/// Canonical endpoint order for a corridor key
fn ordered(a: NodeID, b: NodeID) -> (NodeID, NodeID) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn type_period_param(rows: Vec<TypePeriodRow>) -> LineTypePeriodParam {
    rows.into_iter()
        .map(|r| ((r.line_type, r.period), r.value))
        .collect()
}

fn arc_period_param(rows: Vec<ArcPeriodRow>) -> ArcPeriodParam {
    rows.into_iter()
        .map(|r| {
            let (from, to) = ordered(r.from, r.to);
            ((from, to, r.period), r.value)
        })
        .collect()
}

fn period_param(rows: Vec<PeriodRow>) -> HashMap<u32, f64> {
    rows.into_iter().map(|r| (r.period, r.value)).collect()
}

/// Read transmission parameter tables from `model_dir`
pub fn read_transmission(model_dir: &Path) -> Result<Transmission> {
    let lifetime_rows: Vec<TypeRow> = read_tab_vec(&model_dir.join("Transmission_Lifetime.tab"))?;
    let lifetime = lifetime_rows
        .into_iter()
        .map(|r| (r.line_type, r.value))
        .collect();

    let max_install_rows: Vec<ArcRow> =
        read_tab_vec(&model_dir.join("Transmission_MaxInstallCapacityRaw.tab"))?;
    let max_installed_capacity = max_install_rows
        .into_iter()
        .map(|r| {
            let key = ordered(r.from, r.to);
            (key, r.value)
        })
        .collect();

    let converter_lifetime_rows: Vec<PeriodRow> =
        read_tab_vec_optional(&model_dir.join("Transmission_OffshoreConverterLifetime.tab"))?;
    let converter_lifetime = converter_lifetime_rows
        .first()
        .map_or(40.0, |row| row.value);

    Ok(Transmission {
        type_capital_cost: type_period_param(read_tab_vec(
            &model_dir.join("Transmission_TypeCapitalCost.tab"),
        )?),
        type_fixed_om_cost: type_period_param(read_tab_vec(
            &model_dir.join("Transmission_TypeFixedOMCost.tab"),
        )?),
        lifetime,
        initial_capacity: arc_period_param(read_tab_vec_optional(
            &model_dir.join("Transmission_InitialCapacity.tab"),
        )?),
        max_built_capacity: arc_period_param(read_tab_vec_optional(
            &model_dir.join("Transmission_MaxBuiltCapacity.tab"),
        )?),
        max_installed_capacity,
        converter_capital_cost: period_param(read_tab_vec_optional(
            &model_dir.join("Transmission_OffshoreConverterCapitalCost.tab"),
        )?),
        converter_fixed_om_cost: period_param(read_tab_vec_optional(
            &model_dir.join("Transmission_OffshoreConverterOMCost.tab"),
        )?),
        converter_lifetime,
    })
}

impl Transmission {
    /// Corridor capital cost for one period, EUR/MW, from the per-km type cost
    pub fn capital_cost(
        &self,
        line_type: &LineTypeID,
        length_km: f64,
        period: u32,
    ) -> Result<f64> {
        let per_km = self
            .type_capital_cost
            .get(&(line_type.clone(), period))
            .with_context(|| {
                format!("No capital cost for line type {line_type} in period {period}")
            })?;
        Ok(per_km * length_km)
    }

    /// Corridor fixed O&M cost for one period, EUR/MW/yr
    pub fn fixed_om_cost(
        &self,
        line_type: &LineTypeID,
        length_km: f64,
        period: u32,
    ) -> Result<f64> {
        let per_km = self
            .type_fixed_om_cost
            .get(&(line_type.clone(), period))
            .with_context(|| {
                format!("No fixed O&M cost for line type {line_type} in period {period}")
            })?;
        Ok(per_km * length_km)
    }

    /// Pre-existing capacity on a corridor, zero when unlisted
    pub fn initial_capacity_between(&self, a: &NodeID, b: &NodeID, period: u32) -> f64 {
        let (from, to) = ordered(a.clone(), b.clone());
        *self.initial_capacity.get(&(from, to, period)).unwrap_or(&0.0)
    }

    /// Per-period corridor build limit, unbounded when unlisted
    pub fn max_built_between(&self, a: &NodeID, b: &NodeID, period: u32) -> Option<f64> {
        let (from, to) = ordered(a.clone(), b.clone());
        self.max_built_capacity.get(&(from, to, period)).copied()
    }

    /// Installed-capacity ceiling on a corridor, unbounded when unlisted
    pub fn max_installed_between(&self, a: &NodeID, b: &NodeID) -> Option<f64> {
        let (from, to) = ordered(a.clone(), b.clone());
        self.max_installed_capacity.get(&(from, to)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_costs_scale_with_length() {
        let mut transmission = Transmission::default();
        transmission
            .type_capital_cost
            .insert(("HVDC".into(), 1), 1000.0);
        let cost = transmission
            .capital_cost(&"HVDC".into(), 250.0, 1)
            .unwrap();
        assert_approx_eq!(f64, cost, 250_000.0);
        assert!(transmission.capital_cost(&"HVAC".into(), 10.0, 1).is_err());
    }

    #[test]
    fn test_corridor_keys_are_direction_free() {
        let mut transmission = Transmission::default();
        let (from, to) = ordered("NO2".into(), "DE".into());
        transmission.initial_capacity.insert((from, to, 1), 1400.0);
        assert_approx_eq!(
            f64,
            transmission.initial_capacity_between(&"NO2".into(), &"DE".into(), 1),
            1400.0
        );
        assert_approx_eq!(
            f64,
            transmission.initial_capacity_between(&"DE".into(), &"NO2".into(), 1),
            1400.0
        );
    }
}
