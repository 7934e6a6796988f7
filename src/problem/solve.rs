//! Hand the assembled program to HiGHS and read the solution back.
use super::constraints::ConstraintKey;
use super::variables::{VarKey, VariableMap};
use super::{ProblemBuilder, RowRecord};
use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use highs::{HighsModelStatus, Sense};
use log::info;
use std::collections::HashMap;

/// Which HiGHS algorithm solves the program
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SolverMethod {
    /// Dual simplex
    Simplex,
    /// Interior point
    Barrier,
}

/// Primal and dual values addressable by column and row key
pub struct Solution {
    variables: VariableMap,
    rows: Vec<RowRecord>,
    row_index: HashMap<ConstraintKey, usize>,
    primal: Vec<f64>,
    duals: Vec<f64>,
}

impl Solution {
    /// Primal value of one column
    pub fn value(&self, key: &VarKey) -> Result<f64> {
        Ok(self.primal[self.variables.ordinal(key)?])
    }

    /// Dual value (shadow price) of one row
    pub fn dual(&self, key: &ConstraintKey) -> Result<f64> {
        let position = *self
            .row_index
            .get(key)
            .with_context(|| format!("No row {key:?}"))?;
        Ok(self.duals[position])
    }

    /// Objective value, reassembled from the recorded cost coefficients
    pub fn objective(&self) -> f64 {
        self.variables
            .iter()
            .zip(&self.primal)
            .map(|((_, record), value)| record.cost * value)
            .sum()
    }

    /// Iterate columns with their primal values
    pub fn values(&self) -> impl Iterator<Item = (&VarKey, f64)> {
        self.variables
            .iter()
            .zip(&self.primal)
            .map(|((key, _), value)| (key, *value))
    }

    /// The recorded rows, in assembly order
    pub fn rows(&self) -> &[RowRecord] {
        &self.rows
    }
}

/// Solve the assembled program.
///
/// A non-optimal status is an error: the balances all carry priced slacks,
/// so anything except `Optimal` points at broken input or assembly.
pub fn solve(builder: ProblemBuilder, method: SolverMethod, crossover: bool) -> Result<Solution> {
    let (problem, variables, rows) = builder.into_parts();
    let mut model = problem.optimise(Sense::Minimise);
    model.set_option("output_flag", false);
    match method {
        SolverMethod::Simplex => {
            model.set_option("solver", "simplex");
        }
        SolverMethod::Barrier => {
            model.set_option("solver", "ipm");
            model.set_option("run_crossover", if crossover { "on" } else { "off" });
        }
    }

    info!("Solving with {method:?} (crossover: {crossover})");
    let solved = model.solve();
    match solved.status() {
        HighsModelStatus::Optimal => {
            let solution = solved.get_solution();
            let row_index = rows
                .iter()
                .enumerate()
                .map(|(i, row)| (row.key.clone(), i))
                .collect();
            let result = Solution {
                primal: solution.columns().to_vec(),
                duals: solution.dual_rows().to_vec(),
                variables,
                rows,
                row_index,
            };
            info!("Optimal objective: {:.6} MEUR", result.objective());
            Ok(result)
        }
        status => Err(anyhow!("Could not solve: {status:?}")),
    }
}
