//! The temporal index model.
//!
//! A model horizon is a sequence of investment periods (multi-year steps).
//! Operations within each period are represented by a handful of seasons:
//! four regular seasons (one representative week each, repeated
//! `scale` times to stand in for the full year) and two short peak seasons
//! (extreme-load windows, scale 1). Hours carry a single global numbering
//! across all seasons and every hour belongs to exactly one season.
//!
//! Stochasticity is captured by a finite set of equiprobable scenarios; the
//! probability is always `1 / n_scenarios`, computed here rather than read
//! from input.
use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::rc::Rc;

/// Calendar months of each regular season, in the season order used
/// throughout: winter, spring, summer, fall.
pub(crate) const SEASON_MONTHS: [(&str, [u32; 3]); 4] = [
    ("winter", [12, 1, 2]),
    ("spring", [3, 4, 5]),
    ("summer", [6, 7, 8]),
    ("fall", [9, 10, 11]),
];

/// Number of peak seasons (system-wide peak and single-node peak)
pub const N_PEAK_SEASONS: usize = 2;

/// Distinguishes representative weeks from extreme-load windows
#[derive(Clone, Debug, PartialEq)]
pub enum SeasonKind {
    /// A representative week, sampled from the season's calendar months
    Regular {
        /// The three calendar months the season covers
        months: [u32; 3],
    },
    /// A short window centred on a demand peak
    Peak,
}

/// One season of the representative year
#[derive(Clone, Debug)]
pub struct Season {
    /// Season name ("winter", ..., "peak1", "peak2")
    pub name: Rc<str>,
    /// Regular or peak
    pub kind: SeasonKind,
    /// How many times the season repeats to cover the year
    pub scale: f64,
    /// First hour of the season in the global numbering (1-based)
    pub first_hour: u32,
    /// Number of hours in the season
    pub length: u32,
}

impl Season {
    /// The global hour numbers belonging to this season
    pub fn hours(&self) -> RangeInclusive<u32> {
        self.first_hour..=self.first_hour + self.length - 1
    }

    /// Whether this is a regular (representative-week) season
    pub fn is_regular(&self) -> bool {
        matches!(self.kind, SeasonKind::Regular { .. })
    }
}

/// Shape parameters for the temporal structure, set at the CLI boundary
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct TemporalSpec {
    /// Number of investment periods
    pub n_periods: u32,
    /// Years covered by one period step
    pub period_step_years: u32,
    /// Number of stochastic scenarios
    pub n_scenarios: u32,
    /// Hours in one regular season (a representative week is 168)
    pub regular_season_hours: u32,
    /// Hours in one peak season window
    pub peak_season_hours: u32,
}

/// The fully built temporal index sets
#[derive(Clone, Debug)]
pub struct Temporal {
    /// Investment periods, numbered from 1
    pub periods: Vec<u32>,
    /// Years covered by one period step
    pub period_step_years: u32,
    /// All seasons, regular first, then the peak windows
    pub seasons: Vec<Season>,
    /// Scenario numbers, from 1
    pub scenarios: Vec<u32>,
    /// Total number of operational hours per scenario
    pub n_hours: u32,
}

impl Temporal {
    /// Build the temporal index sets.
    ///
    /// `season_scale` gives the annual repetition factor per regular season
    /// (from the `General_seasonScale.tab` input); every regular season must
    /// have an entry. Peak seasons always have scale 1.
    pub fn build(spec: &TemporalSpec, season_scale: &HashMap<Rc<str>, f64>) -> Result<Temporal> {
        ensure!(spec.n_periods > 0, "At least one period is required");
        ensure!(spec.n_scenarios > 0, "At least one scenario is required");
        ensure!(
            spec.regular_season_hours % 24 == 0 && spec.regular_season_hours > 0,
            "Regular season length must be a positive number of whole days"
        );
        ensure!(
            spec.peak_season_hours % 2 == 0 && spec.peak_season_hours > 0,
            "Peak season length must be positive and even (windows are centred)"
        );

        let mut seasons = Vec::with_capacity(SEASON_MONTHS.len() + N_PEAK_SEASONS);
        let mut first_hour = 1;
        for (name, months) in SEASON_MONTHS {
            let scale = *season_scale
                .get(name)
                .with_context(|| format!("No season scale given for {name}"))?;
            ensure!(scale > 0.0, "Season scale for {name} must be positive");
            seasons.push(Season {
                name: Rc::from(name),
                kind: SeasonKind::Regular { months },
                scale,
                first_hour,
                length: spec.regular_season_hours,
            });
            first_hour += spec.regular_season_hours;
        }
        for i in 1..=N_PEAK_SEASONS {
            seasons.push(Season {
                name: Rc::from(format!("peak{i}").as_str()),
                kind: SeasonKind::Peak,
                scale: 1.0,
                first_hour,
                length: spec.peak_season_hours,
            });
            first_hour += spec.peak_season_hours;
        }

        let temporal = Temporal {
            periods: (1..=spec.n_periods).collect(),
            period_step_years: spec.period_step_years,
            seasons,
            scenarios: (1..=spec.n_scenarios).collect(),
            n_hours: first_hour - 1,
        };

        // The hour -> season map must be an exact cover and probabilities
        // must sum to one
        for hour in 1..=temporal.n_hours {
            temporal
                .season_of_hour(hour)
                .with_context(|| format!("Hour {hour} is not covered by exactly one season"))?;
        }
        let prob_sum: f64 = temporal
            .scenarios
            .iter()
            .map(|_| temporal.scenario_probability())
            .sum();
        ensure!(
            (prob_sum - 1.0).abs() <= f64::EPSILON * spec.n_scenarios as f64,
            "Scenario probabilities must sum to 1"
        );

        Ok(temporal)
    }

    /// The probability of each (equiprobable) scenario
    pub fn scenario_probability(&self) -> f64 {
        1.0 / self.scenarios.len() as f64
    }

    /// All operational hours in the global numbering
    pub fn hours(&self) -> RangeInclusive<u32> {
        1..=self.n_hours
    }

    /// The season a given hour belongs to
    pub fn season_of_hour(&self, hour: u32) -> Result<&Season> {
        let mut found = self
            .seasons
            .iter()
            .filter(|season| season.hours().contains(&hour));
        let season = found
            .next()
            .with_context(|| format!("Hour {hour} belongs to no season"))?;
        ensure!(
            found.next().is_none(),
            "Hour {hour} belongs to more than one season"
        );
        Ok(season)
    }

    /// Whether `hour` is the first hour of its season (storage seeding and
    /// ramping constraints treat it specially)
    pub fn is_first_hour_of_season(&self, hour: u32) -> bool {
        self.seasons.iter().any(|season| season.first_hour == hour)
    }

    /// The regular seasons only
    pub fn regular_seasons(&self) -> impl Iterator<Item = &Season> {
        self.seasons.iter().filter(|s| s.is_regular())
    }

    /// The peak seasons only
    pub fn peak_seasons(&self) -> impl Iterator<Item = &Season> {
        self.seasons.iter().filter(|s| !s.is_regular())
    }

    /// Remaining model years from period `p` (inclusive) to the end of the
    /// horizon; bounds the discounting span of investments made in `p`
    pub fn remaining_years(&self, period: u32) -> u32 {
        (self.periods.len() as u32 - period + 1) * self.period_step_years
    }

    /// Season-scale-weighted hour count of one model year; dividing an
    /// annual total by this yields the per-sampled-hour constant
    pub fn weighted_hours(&self) -> f64 {
        self.seasons
            .iter()
            .map(|s| s.scale * f64::from(s.length))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    pub fn spec() -> TemporalSpec {
        TemporalSpec {
            n_periods: 8,
            period_step_years: 5,
            n_scenarios: 4,
            regular_season_hours: 168,
            peak_season_hours: 24,
        }
    }

    fn scales() -> HashMap<Rc<str>, f64> {
        SEASON_MONTHS
            .iter()
            .map(|(name, _)| (Rc::from(*name), 13.0))
            .collect()
    }

    #[rstest]
    fn test_build_layout(spec: TemporalSpec) {
        let temporal = Temporal::build(&spec, &scales()).unwrap();
        assert_eq!(temporal.n_hours, 4 * 168 + 2 * 24);
        assert_eq!(temporal.seasons.len(), 6);
        assert_eq!(temporal.seasons[0].hours(), 1..=168);
        assert_eq!(temporal.seasons[4].hours(), 673..=696);
        assert_eq!(temporal.seasons[5].hours(), 697..=720);
    }

    #[rstest]
    fn test_hour_season_exact_cover(spec: TemporalSpec) {
        let temporal = Temporal::build(&spec, &scales()).unwrap();
        for hour in temporal.hours() {
            let season = temporal.season_of_hour(hour).unwrap();
            assert!(season.hours().contains(&hour));
        }
        assert!(temporal.season_of_hour(0).is_err());
        assert!(temporal.season_of_hour(721).is_err());
    }

    #[rstest]
    fn test_scenario_probabilities_sum_to_one(spec: TemporalSpec) {
        let temporal = Temporal::build(&spec, &scales()).unwrap();
        let sum: f64 = temporal
            .scenarios
            .iter()
            .map(|_| temporal.scenario_probability())
            .sum();
        assert_eq!(sum, 1.0);
    }

    #[rstest]
    fn test_first_hours(spec: TemporalSpec) {
        let temporal = Temporal::build(&spec, &scales()).unwrap();
        for first in [1, 169, 337, 505, 673, 697] {
            assert!(temporal.is_first_hour_of_season(first));
        }
        assert!(!temporal.is_first_hour_of_season(2));
    }

    #[rstest]
    fn test_missing_season_scale_is_fatal(spec: TemporalSpec) {
        let mut scales = scales();
        scales.remove("fall");
        assert!(Temporal::build(&spec, &scales).is_err());
    }

    #[rstest]
    fn test_remaining_years(spec: TemporalSpec) {
        let temporal = Temporal::build(&spec, &scales()).unwrap();
        assert_eq!(temporal.remaining_years(1), 40);
        assert_eq!(temporal.remaining_years(8), 5);
    }
}
