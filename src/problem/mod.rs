//! Assembly of the linear program: columns, rows and their bookkeeping.
//!
//! The builder keeps its own record of every column and row next to the
//! HiGHS problem. Columns are keyed by [`variables::VarKey`] and rows by
//! [`constraints::ConstraintKey`]; both maps preserve insertion order, which
//! is what makes primal values and duals addressable by name after the
//! solve.
use crate::derive::DerivedParams;
use crate::model::Model;
use crate::sampler::Profiles;
use crate::settings::Penalties;
use anyhow::{ensure, Context, Result};
use highs::RowProblem;
use log::info;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

pub mod constraints;
pub mod objective;
pub mod solve;
pub mod variables;

use constraints::ConstraintKey;
use variables::{VarKey, VariableMap};

/// MW and MWh inputs enter the matrix in GW and GWh
pub const POWER_SCALE: f64 = 1e-3;
/// Tonne quantities enter the matrix in kilotonnes
pub const EMISSION_SCALE: f64 = 1e-3;
/// EUR objective terms enter in MEUR
pub const COST_SCALE: f64 = 1e-6;

/// Everything the assembly steps read
pub struct BuildContext<'a> {
    /// The static model
    pub model: &'a Model,
    /// Derived parameter tables
    pub derived: &'a DerivedParams,
    /// Sampled stochastic profiles
    pub profiles: &'a Profiles,
    /// Slack penalty costs
    pub penalties: &'a Penalties,
    /// Whether industrial production may shift freely within the year
    pub flexible_industry: bool,
}

/// One recorded row: its key, scaled bounds and terms by column ordinal
pub struct RowRecord {
    /// Row key
    pub key: ConstraintKey,
    /// Terms as (column ordinal, coefficient)
    pub terms: Vec<(usize, f64)>,
    /// Lower bound
    pub lower: f64,
    /// Upper bound
    pub upper: f64,
}

/// The problem under construction
pub struct ProblemBuilder {
    problem: RowProblem,
    variables: VariableMap,
    rows: Vec<RowRecord>,
}

impl ProblemBuilder {
    /// Assemble the full program for a loaded model
    pub fn build(ctx: &BuildContext) -> Result<ProblemBuilder> {
        let mut builder = ProblemBuilder {
            problem: RowProblem::default(),
            variables: VariableMap::default(),
            rows: Vec::new(),
        };
        variables::add_all(&mut builder, ctx)?;
        constraints::add_all(&mut builder, ctx)?;
        info!(
            "Assembled {} columns and {} rows",
            builder.variables.len(),
            builder.rows.len()
        );
        Ok(builder)
    }

    /// Add one column with its objective coefficient and an optional upper
    /// bound (all columns are non-negative)
    pub fn add_variable(&mut self, key: VarKey, cost: f64, upper: Option<f64>) -> Result<()> {
        let col = match upper {
            Some(upper) => self.problem.add_column(cost, 0.0..=upper),
            None => self.problem.add_column(cost, 0.0..),
        };
        self.variables
            .insert(key, variables::ColumnRecord { col, cost, upper })
    }

    /// Add one equality row
    pub fn add_eq(&mut self, key: ConstraintKey, rhs: f64, terms: &[(VarKey, f64)]) -> Result<()> {
        self.add_row(key, rhs, rhs, terms)
    }

    /// Add one `<=` row
    pub fn add_le(
        &mut self,
        key: ConstraintKey,
        upper: f64,
        terms: &[(VarKey, f64)],
    ) -> Result<()> {
        self.add_row(key, f64::NEG_INFINITY, upper, terms)
    }

    fn add_row(
        &mut self,
        key: ConstraintKey,
        lower: f64,
        upper: f64,
        terms: &[(VarKey, f64)],
    ) -> Result<()> {
        ensure!(!terms.is_empty(), "Row {key:?} has no terms");
        let mut factors = Vec::with_capacity(terms.len());
        let mut record = Vec::with_capacity(terms.len());
        for (var, coeff) in terms {
            let col = self
                .variables
                .get(var)
                .with_context(|| format!("Row {key:?} references a missing column"))?;
            factors.push((col, *coeff));
            record.push((self.variables.ordinal(var)?, *coeff));
        }
        if lower == upper {
            self.problem.add_row(lower..=upper, factors);
        } else {
            self.problem.add_row(..=upper, factors);
        }
        self.rows.push(RowRecord {
            key,
            terms: record,
            lower,
            upper,
        });
        Ok(())
    }

    /// The column map
    pub fn variables(&self) -> &VariableMap {
        &self.variables
    }

    /// The recorded rows, in the order they were added
    pub fn rows(&self) -> &[RowRecord] {
        &self.rows
    }

    pub(crate) fn into_parts(self) -> (RowProblem, VariableMap, Vec<RowRecord>) {
        (self.problem, self.variables, self.rows)
    }

    /// Dump the assembled program in LP format
    pub fn write_lp(&self, file_path: &Path) -> Result<()> {
        let name = |ordinal: usize| {
            let (key, _) = self.variables.by_ordinal(ordinal);
            sanitise(&format!("{key:?}"))
        };

        let mut out = String::from("Minimize\n obj:");
        for (ordinal, (_, record)) in self.variables.iter().enumerate() {
            if record.cost != 0.0 {
                write!(out, " + {} {}", record.cost, name(ordinal)).unwrap();
            }
        }
        out.push_str("\nSubject To\n");
        for (i, row) in self.rows.iter().enumerate() {
            write!(out, " c{i}_{}:", sanitise(&format!("{:?}", row.key))).unwrap();
            for (ordinal, coeff) in &row.terms {
                write!(out, " + {coeff} {}", name(*ordinal)).unwrap();
            }
            if row.lower == row.upper {
                writeln!(out, " = {}", row.upper).unwrap();
            } else {
                writeln!(out, " <= {}", row.upper).unwrap();
            }
        }
        out.push_str("Bounds\n");
        for (ordinal, (_, record)) in self.variables.iter().enumerate() {
            match record.upper {
                Some(upper) => writeln!(out, " 0 <= {} <= {upper}", name(ordinal)).unwrap(),
                None => writeln!(out, " 0 <= {}", name(ordinal)).unwrap(),
            }
        }
        out.push_str("End\n");
        fs::write(file_path, out).with_context(|| format!("Cannot write {file_path:?}"))?;
        info!("Wrote LP dump to {file_path:?}");
        Ok(())
    }
}

/// LP-format names allow only a restricted character set
fn sanitise(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::solve::{solve, SolverMethod};
    use super::variables::Carrier;
    use super::*;
    use crate::fixture::{toy_model, with_heat, with_supply_chain, TOY_STEEL_PRODUCTION};
    use crate::storage::{Storage, StorageCarrier};
    use float_cmp::assert_approx_eq;

    fn flat_profiles(model: &Model) -> Profiles {
        let mut profiles = Profiles::default();
        for node in model.topology.nodes.keys() {
            for &period in &model.temporal.periods {
                for hour in model.temporal.hours() {
                    profiles
                        .electric_load
                        .insert((node.clone(), period, 1, hour), 50.0);
                    if model.heat.is_some() {
                        profiles
                            .heat_load
                            .insert((node.clone(), period, 1, hour), 30.0);
                    }
                }
            }
        }
        profiles
    }

    fn assemble_with(
        model: &Model,
        profiles: &Profiles,
        flexible_industry: bool,
    ) -> ProblemBuilder {
        let derived = DerivedParams::build(model, profiles).unwrap();
        let penalties = Penalties::default();
        let ctx = BuildContext {
            model,
            derived: &derived,
            profiles,
            penalties: &penalties,
            flexible_industry,
        };
        ProblemBuilder::build(&ctx).unwrap()
    }

    fn assemble(model: &Model, profiles: &Profiles) -> ProblemBuilder {
        assemble_with(model, profiles, false)
    }

    fn with_battery(model: &mut Model) {
        let storages = &mut model.storages;
        let id: crate::id::StorageID = "Battery".into();
        storages.catalog.insert(
            id.clone(),
            Storage {
                id: id.clone(),
                carrier: StorageCarrier::Electricity,
            },
        );
        storages.of_node.insert("NO1".into(), vec![id.clone()]);
        storages.bleed_efficiency.insert(id.clone(), 0.999);
        storages.charge_efficiency.insert(id.clone(), 0.95);
        storages.discharge_efficiency.insert(id.clone(), 0.95);
        storages.initial_level_fraction.insert(id.clone(), 0.5);
        storages.lifetime.insert(id.clone(), 15.0);
        for period in [1, 2] {
            storages.power_capital_cost.insert((id.clone(), period), 5e4);
            storages
                .energy_capital_cost
                .insert((id.clone(), period), 2e4);
        }
    }

    #[test]
    fn test_electricity_balance_covers_every_node_and_hour() {
        let model = toy_model();
        let profiles = flat_profiles(&model);
        let builder = assemble(&model, &profiles);

        let count = builder
            .rows()
            .iter()
            .filter(|row| matches!(row.key, ConstraintKey::ElectricityBalance { .. }))
            .count();
        let expected = model.topology.nodes.len()
            * model.temporal.periods.len()
            * model.temporal.scenarios.len()
            * model.temporal.n_hours as usize;
        assert_eq!(count, expected);
    }

    #[test]
    fn test_gen_lifecycle_rows_are_equalities_without_history() {
        let model = toy_model();
        let profiles = flat_profiles(&model);
        let builder = assemble(&model, &profiles);

        let rows: Vec<_> = builder
            .rows()
            .iter()
            .filter(|row| matches!(row.key, ConstraintKey::GenLifecycle { .. }))
            .collect();
        // one per (node, generator, period)
        assert_eq!(rows.len(), 2 * 2);
        for row in rows {
            assert_eq!(row.lower, row.upper);
            assert_approx_eq!(f64, row.upper, 0.0);
        }
    }

    #[test]
    fn test_storage_cyclic_rows_close_every_season() {
        let mut model = toy_model();
        with_battery(&mut model);
        let profiles = flat_profiles(&model);
        let builder = assemble(&model, &profiles);

        let cyclic: Vec<_> = builder
            .rows()
            .iter()
            .filter(|row| matches!(row.key, ConstraintKey::StorageCyclic { .. }))
            .collect();
        // one per (period, scenario, season) for the single battery
        assert_eq!(
            cyclic.len(),
            model.temporal.periods.len() * model.temporal.seasons.len()
        );
        for row in cyclic {
            assert_eq!(row.lower, row.upper);
            assert_eq!(row.terms.len(), 2);
        }
    }

    #[test]
    fn test_first_hour_dynamics_seed_from_installed_energy() {
        let mut model = toy_model();
        with_battery(&mut model);
        let profiles = flat_profiles(&model);
        let builder = assemble(&model, &profiles);

        let first = builder
            .rows()
            .iter()
            .find(|row| {
                matches!(
                    row.key,
                    ConstraintKey::StorageDynamics { hour: 1, period: 1, .. }
                )
            })
            .unwrap();
        let installed = builder
            .variables()
            .ordinal(&VarKey::StorEnergyInstalled {
                node: "NO1".into(),
                storage: "Battery".into(),
                period: 1,
            })
            .unwrap();
        let coeff = first
            .terms
            .iter()
            .find(|(ordinal, _)| *ordinal == installed)
            .map(|(_, coeff)| *coeff)
            .unwrap();
        assert_approx_eq!(f64, coeff, -0.5);
    }

    #[test]
    fn test_heat_balance_covers_onshore_nodes() {
        let mut model = toy_model();
        with_heat(&mut model);
        let profiles = flat_profiles(&model);
        let builder = assemble(&model, &profiles);

        let count = builder
            .rows()
            .iter()
            .filter(|row| matches!(row.key, ConstraintKey::HeatBalance { .. }))
            .count();
        let expected = model.topology.nodes.len()
            * model.temporal.periods.len()
            * model.temporal.scenarios.len()
            * model.temporal.n_hours as usize;
        assert_eq!(count, expected);

        // the boiler enters the balance at its constant COP
        let first = builder
            .rows()
            .iter()
            .find(|row| {
                matches!(row.key, ConstraintKey::HeatBalance { hour: 1, period: 1, .. })
            })
            .unwrap();
        let boiler = builder
            .variables()
            .ordinal(&VarKey::ConverterUse {
                node: "NO1".into(),
                converter: "ElectricBoiler".into(),
                period: 1,
                scenario: 1,
                hour: 1,
            })
            .unwrap();
        let coeff = first
            .terms
            .iter()
            .find(|(ordinal, _)| *ordinal == boiler)
            .map(|(_, coeff)| *coeff)
            .unwrap();
        assert_approx_eq!(f64, coeff, 0.98);
    }

    #[test]
    fn test_converter_lifecycle_rows_are_equalities() {
        let mut model = toy_model();
        with_heat(&mut model);
        let profiles = flat_profiles(&model);
        let builder = assemble(&model, &profiles);

        let rows: Vec<_> = builder
            .rows()
            .iter()
            .filter(|row| matches!(row.key, ConstraintKey::ConverterLifecycle { .. }))
            .collect();
        // one per (node, converter, period)
        assert_eq!(rows.len(), 2 * 2);
        for row in rows {
            assert_eq!(row.lower, row.upper);
        }
    }

    #[test]
    fn test_coupled_balances_cover_tagged_nodes() {
        let mut model = toy_model();
        with_supply_chain(&mut model);
        let profiles = flat_profiles(&model);
        let builder = assemble(&model, &profiles);

        let per_node = model.temporal.periods.len()
            * model.temporal.scenarios.len()
            * model.temporal.n_hours as usize;
        for (count, expected) in [
            (count_rows(&builder, |k| matches!(k, ConstraintKey::HydrogenBalance { .. })), 2),
            (count_rows(&builder, |k| matches!(k, ConstraintKey::GasBalance { .. })), 2),
            (count_rows(&builder, |k| matches!(k, ConstraintKey::Co2Balance { .. })), 2),
        ] {
            assert_eq!(count, expected * per_node);
        }
    }

    fn count_rows(builder: &ProblemBuilder, pred: fn(&ConstraintKey) -> bool) -> usize {
        builder.rows().iter().filter(|row| pred(&row.key)).count()
    }

    #[test]
    fn test_pipeline_caps_bound_both_directions() {
        let mut model = toy_model();
        with_supply_chain(&mut model);
        let profiles = flat_profiles(&model);
        let builder = assemble(&model, &profiles);

        // one cap per direction of the single corridor, per sampled hour
        let per_hour = model.temporal.periods.len()
            * model.temporal.scenarios.len()
            * model.temporal.n_hours as usize;
        for carrier in [Carrier::Hydrogen, Carrier::NaturalGas, Carrier::Co2] {
            let count = builder
                .rows()
                .iter()
                .filter(
                    |row| matches!(row.key, ConstraintKey::FlowCap { carrier: c, .. } if c == carrier),
                )
                .count();
            assert_eq!(count, 2 * per_hour);
        }
    }

    #[test]
    fn test_h2_storage_closes_every_season_half_full() {
        let mut model = toy_model();
        with_supply_chain(&mut model);
        let profiles = flat_profiles(&model);
        let builder = assemble(&model, &profiles);

        let cyclic: Vec<_> = builder
            .rows()
            .iter()
            .filter(|row| matches!(row.key, ConstraintKey::H2StorageCyclic { .. }))
            .collect();
        // one per (node, period, scenario, season)
        assert_eq!(
            cyclic.len(),
            2 * model.temporal.periods.len() * model.temporal.seasons.len()
        );
        let installed = builder
            .variables()
            .ordinal(&VarKey::H2StorageInstalled {
                node: "NO1".into(),
                period: 1,
            })
            .unwrap();
        let first = cyclic
            .iter()
            .find(|row| {
                matches!(&row.key, ConstraintKey::H2StorageCyclic { node, period: 1, .. } if *node == "NO1".into())
            })
            .unwrap();
        assert_eq!(first.lower, first.upper);
        let coeff = first
            .terms
            .iter()
            .find(|(ordinal, _)| *ordinal == installed)
            .map(|(_, coeff)| *coeff)
            .unwrap();
        assert_approx_eq!(f64, coeff, -0.5);
    }

    #[test]
    fn test_gas_reserve_weights_expected_extraction() {
        let mut model = toy_model();
        with_supply_chain(&mut model);
        let profiles = flat_profiles(&model);
        let builder = assemble(&model, &profiles);

        let reserve = builder
            .rows()
            .iter()
            .find(|row| matches!(row.key, ConstraintKey::GasReserve { .. }))
            .unwrap();
        // every extraction hour of the horizon enters the one row
        assert_eq!(
            reserve.terms.len(),
            model.temporal.periods.len()
                * model.temporal.scenarios.len()
                * model.temporal.n_hours as usize
        );
        // a regular-season hour weighs scale x step years
        let winter = builder
            .variables()
            .ordinal(&VarKey::GasExtraction {
                node: "NO2".into(),
                period: 1,
                scenario: 1,
                hour: 1,
            })
            .unwrap();
        let coeff = reserve
            .terms
            .iter()
            .find(|(ordinal, _)| *ordinal == winter)
            .map(|(_, coeff)| *coeff)
            .unwrap();
        assert_approx_eq!(f64, coeff, 13.0 * 5.0);
    }

    #[test]
    fn test_inflexible_industry_pins_hourly_output() {
        let mut model = toy_model();
        with_supply_chain(&mut model);
        let profiles = flat_profiles(&model);
        let builder = assemble(&model, &profiles);

        let rows: Vec<_> = builder
            .rows()
            .iter()
            .filter(|row| matches!(row.key, ConstraintKey::IndustryHourlyProduction { .. }))
            .collect();
        assert_eq!(
            rows.len(),
            model.temporal.periods.len()
                * model.temporal.scenarios.len()
                * model.temporal.n_hours as usize
        );
        let hourly = TOY_STEEL_PRODUCTION / model.temporal.weighted_hours() * EMISSION_SCALE;
        for row in rows {
            assert_eq!(row.lower, row.upper);
            assert_approx_eq!(f64, row.upper, hourly);
        }
    }

    #[test]
    fn test_flexible_industry_relaxes_to_a_yearly_row() {
        let mut model = toy_model();
        with_supply_chain(&mut model);
        let profiles = flat_profiles(&model);
        let builder = assemble_with(&model, &profiles, true);

        assert_eq!(
            count_rows(&builder, |k| matches!(k, ConstraintKey::IndustryHourlyProduction { .. })),
            0
        );
        let rows: Vec<_> = builder
            .rows()
            .iter()
            .filter(|row| matches!(row.key, ConstraintKey::IndustryYearlyProduction { .. }))
            .collect();
        assert_eq!(
            rows.len(),
            model.temporal.periods.len() * model.temporal.scenarios.len()
        );
        for row in rows {
            assert_eq!(row.lower, row.upper);
            assert_approx_eq!(f64, row.upper, TOY_STEEL_PRODUCTION * EMISSION_SCALE);
            // all production hours of the plant plus the shortfall slack
            assert_eq!(row.terms.len(), model.temporal.n_hours as usize + 1);
        }
    }

    #[test]
    fn test_supply_chain_toy_meets_steel_demand_without_venting() {
        let mut model = toy_model();
        with_supply_chain(&mut model);
        let profiles = flat_profiles(&model);
        let builder = assemble(&model, &profiles);
        let solution = solve(builder, SolverMethod::Simplex, false).unwrap();

        // priced slacks stay at zero in a feasible chain
        let shed: f64 = solution
            .values()
            .filter(|(key, _)| matches!(key, VarKey::Shed { .. }))
            .map(|(_, value)| value)
            .sum();
        assert!(shed < 1e-6, "unexpected shed {shed}");

        for &period in &model.temporal.periods {
            let mut produced = 0.0;
            for season in &model.temporal.seasons {
                for hour in season.hours() {
                    produced += season.scale
                        * solution
                            .value(&VarKey::PlantProduction {
                                node: "NO2".into(),
                                plant: "EafSteel".into(),
                                period,
                                scenario: 1,
                                hour,
                            })
                            .unwrap();
                }
            }
            assert_approx_eq!(
                f64,
                produced,
                TOY_STEEL_PRODUCTION * EMISSION_SCALE,
                epsilon = 1e-4
            );
        }
    }

    #[test]
    fn test_lp_dump_names_are_sanitised() {
        assert_eq!(sanitise("Flow { from: \"NO1\" }"), "Flow___from___NO1___");
    }
}
