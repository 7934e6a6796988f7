//! Sampling of representative operational periods from historical series.
//!
//! Every stochastic input (capacity factors, loads, inflows, heat-pump COP)
//! is an hourly multi-year CSV with a timestamp column followed by one
//! column per node. For each (period, scenario, regular season) one
//! contiguous window is drawn from a random historical year and one of the
//! season's calendar months; the same window positions slice every series so
//! cross-series weather correlation is preserved. Windows are realigned to
//! start on Monday 00:00. Two further windows per (period, scenario) are
//! centred on the system-wide load peak and on the peak of the single
//! highest-loaded node.
//!
//! The draw is driven by an injected RNG and every selection is recorded in
//! a sampling-key file; rerunning with the same key file reproduces the
//! profiles byte for byte.
use crate::generator::ProfileKind;
use crate::id::NodeID;
use crate::input::input_err_msg;
use crate::time::{Season, SeasonKind, Temporal};
use anyhow::{bail, ensure, Context, Result};
use chrono::{Datelike, NaiveDateTime, Timelike};
use indexmap::IndexMap;
use log::info;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

/// Accepted timestamp layouts in the series files
const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%d/%m/%Y %H:%M"];

/// One hourly multi-year series, one value column per node
#[derive(Clone, Debug, Default)]
pub struct Series {
    /// Row timestamps, strictly increasing
    pub timestamps: Vec<NaiveDateTime>,
    /// Value columns keyed by node
    pub columns: IndexMap<NodeID, Vec<f64>>,
}

impl Series {
    /// Value for `node` at row `row`; nodes without a column read as zero
    pub fn value(&self, node: &NodeID, row: usize) -> f64 {
        self.columns.get(node).map_or(0.0, |col| col[row])
    }

    /// Historical years covered by the series
    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.timestamps.iter().map(Datelike::year).collect();
        years.dedup();
        years
    }

    /// Row indices falling in one calendar month of one year
    pub fn rows_in(&self, year: i32, month: u32) -> Vec<usize> {
        self.timestamps
            .iter()
            .enumerate()
            .filter(|(_, t)| t.year() == year && t.month() == month)
            .map(|(i, _)| i)
            .collect()
    }

    /// Row indices falling in one year
    pub fn rows_in_year(&self, year: i32) -> Vec<usize> {
        self.timestamps
            .iter()
            .enumerate()
            .filter(|(_, t)| t.year() == year)
            .map(|(i, _)| i)
            .collect()
    }
}

/// The full set of loaded series
#[derive(Clone, Debug, Default)]
pub struct SeriesSet {
    /// Capacity-factor series per profile kind
    pub availability: IndexMap<ProfileKind, Series>,
    /// Hourly electric load, MW
    pub electric_load: Series,
    /// Hourly regulated-hydro inflow, MWh
    pub hydro_inflow: Series,
    /// Hourly heat load, MW (heat module)
    pub heat_load: Option<Series>,
    /// Air-source heat-pump COP (heat module)
    pub cop: Option<Series>,
}

/// One recorded sampling decision
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SampleKey {
    /// Investment period
    #[serde(rename = "Period")]
    pub period: u32,
    /// Scenario number
    #[serde(rename = "Scenario")]
    pub scenario: u32,
    /// Season name
    #[serde(rename = "Season")]
    pub season: String,
    /// Historical year drawn
    #[serde(rename = "Year")]
    pub year: i32,
    /// Calendar month drawn (0 for peak windows)
    #[serde(rename = "Month")]
    pub month: u32,
    /// Window offset: start row within the month for regular seasons,
    /// centre row within the year for peak windows
    #[serde(rename = "Hour")]
    pub hour: u32,
}

/// The sampled stochastic parameters, keyed by global hour numbering
#[derive(Clone, Debug, Default)]
pub struct Profiles {
    /// Capacity factors per (node, kind, period, scenario, hour)
    pub availability: HashMap<(NodeID, ProfileKind, u32, u32, u32), f64>,
    /// Electric load, MW
    pub electric_load: HashMap<(NodeID, u32, u32, u32), f64>,
    /// Heat load, MW (empty when the heat module is off)
    pub heat_load: HashMap<(NodeID, u32, u32, u32), f64>,
    /// Heat-pump COP (empty when the heat module is off)
    pub cop: HashMap<(NodeID, u32, u32, u32), f64>,
    /// Regulated-hydro energy budget per (node, season, period, scenario), MWh
    pub seasonal_hydro_budget: HashMap<(NodeID, Rc<str>, u32, u32), f64>,
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    for format in TIMESTAMP_FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(t);
        }
    }
    bail!("Cannot parse timestamp {raw:?}")
}

/// Read one series CSV (comma-delimited, first column is the timestamp)
pub fn read_series(file_path: &Path) -> Result<Series> {
    let mut reader = csv::Reader::from_path(file_path).with_context(|| input_err_msg(file_path))?;
    let headers = reader.headers().with_context(|| input_err_msg(file_path))?;
    let nodes: Vec<NodeID> = headers.iter().skip(1).map(NodeID::from).collect();

    let mut series = Series {
        timestamps: Vec::new(),
        columns: nodes
            .iter()
            .map(|node| (node.clone(), Vec::new()))
            .collect(),
    };
    for record in reader.records() {
        let record = record.with_context(|| input_err_msg(file_path))?;
        let raw = record.get(0).context("Missing timestamp field")?;
        series.timestamps.push(parse_timestamp(raw)?);
        for (node, field) in nodes.iter().zip(record.iter().skip(1)) {
            let value: f64 = field
                .trim()
                .parse()
                .with_context(|| format!("Bad value {field:?} for {node} in {file_path:?}"))?;
            series.columns.get_mut(node).unwrap().push(value);
        }
    }
    ensure!(
        !series.timestamps.is_empty(),
        "Series file {file_path:?} is empty"
    );
    ensure!(
        series.timestamps.windows(2).all(|w| w[0] < w[1]),
        "Timestamps in {file_path:?} must be strictly increasing"
    );
    Ok(series)
}

/// Load the full series set from `model_dir/scenario_data`
pub fn read_series_set(model_dir: &Path, heat_module: bool) -> Result<SeriesSet> {
    let dir = model_dir.join("scenario_data");
    let availability = [
        (ProfileKind::Solar, "solar.csv"),
        (ProfileKind::WindOnshore, "windonshore.csv"),
        (ProfileKind::WindOffshore, "windoffshore.csv"),
        (ProfileKind::HydroRunOfRiver, "hydroror.csv"),
    ]
    .into_iter()
    .map(|(kind, name)| Ok((kind, read_series(&dir.join(name))?)))
    .collect::<Result<_>>()?;

    let set = SeriesSet {
        availability,
        electric_load: read_series(&dir.join("electricload.csv"))?,
        hydro_inflow: read_series(&dir.join("hydroinflow.csv"))?,
        heat_load: heat_module
            .then(|| read_series(&dir.join("heatload.csv")))
            .transpose()?,
        cop: heat_module
            .then(|| read_series(&dir.join("heatpumpcop.csv")))
            .transpose()?,
    };
    set.validate()?;
    Ok(set)
}

impl SeriesSet {
    /// All series must share the electric-load row layout so that one set of
    /// row positions slices every series
    pub fn validate(&self) -> Result<()> {
        let reference = &self.electric_load.timestamps;
        ensure!(!reference.is_empty(), "Electric load series is empty");
        for (name, series) in self.all() {
            ensure!(
                series.timestamps == *reference,
                "Series {name} is not aligned with the electric load series"
            );
        }
        Ok(())
    }

    fn all(&self) -> Vec<(String, &Series)> {
        let mut all: Vec<(String, &Series)> = self
            .availability
            .iter()
            .map(|(kind, series)| (format!("{kind:?}"), series))
            .collect();
        all.push(("hydro inflow".into(), &self.hydro_inflow));
        if let Some(series) = &self.heat_load {
            all.push(("heat load".into(), series));
        }
        if let Some(series) = &self.cop {
            all.push(("COP".into(), series));
        }
        all
    }
}

/// Stable reorder of a window so it begins on Monday 00:00
fn realign_to_monday(timestamps: &[NaiveDateTime], rows: &mut [usize]) {
    rows.sort_by_key(|&i| {
        (
            timestamps[i].weekday().num_days_from_monday(),
            timestamps[i].hour(),
        )
    });
}

/// Stable reorder of a peak window by hour of day
fn sort_by_hour_of_day(timestamps: &[NaiveDateTime], rows: &mut [usize]) {
    rows.sort_by_key(|&i| timestamps[i].hour());
}

/// A window of `length` rows centred on position `centre` of `rows`,
/// clamped to stay inside
fn centred_window(rows: &[usize], centre: usize, length: usize) -> Vec<usize> {
    let start = centre
        .saturating_sub(length / 2)
        .min(rows.len().saturating_sub(length));
    rows[start..start + length].to_vec()
}

/// Draws the operational windows and fills the profile tables
pub struct Sampler<'a> {
    series: &'a SeriesSet,
    temporal: &'a Temporal,
}

impl<'a> Sampler<'a> {
    /// Create a sampler over loaded series
    pub fn new(series: &'a SeriesSet, temporal: &'a Temporal) -> Sampler<'a> {
        Sampler { series, temporal }
    }

    /// Sample every (period, scenario, season) window.
    ///
    /// When `pinned` holds a key for a given (period, scenario, season) that
    /// selection is replayed instead of drawn from `rng`. The returned key
    /// list covers every window and can be written out for later replay.
    pub fn sample<R: Rng>(
        &self,
        rng: &mut R,
        pinned: &[SampleKey],
    ) -> Result<(Profiles, Vec<SampleKey>)> {
        let mut profiles = Profiles::default();
        let mut keys = Vec::new();
        let years = self.series.electric_load.years();

        for &period in &self.temporal.periods {
            for &scenario in &self.temporal.scenarios {
                for season in self.temporal.regular_seasons() {
                    let key = self.regular_key(rng, pinned, period, scenario, season, &years)?;
                    let rows = self.regular_window(&key, season)?;
                    self.fill(&mut profiles, season, &rows, period, scenario);
                    keys.push(key);
                }
                let peak_keys = self.peak_keys(rng, pinned, period, scenario, &years)?;
                for (season, key) in self.temporal.peak_seasons().zip(&peak_keys) {
                    let rows = self.peak_window(key, season)?;
                    self.fill(&mut profiles, season, &rows, period, scenario);
                }
                keys.extend(peak_keys);
            }
        }
        info!("Sampled {} windows", keys.len());
        Ok((profiles, keys))
    }

    fn pinned_for(
        pinned: &[SampleKey],
        period: u32,
        scenario: u32,
        season: &str,
    ) -> Option<SampleKey> {
        pinned
            .iter()
            .find(|k| k.period == period && k.scenario == scenario && k.season == season)
            .cloned()
    }

    fn regular_key<R: Rng>(
        &self,
        rng: &mut R,
        pinned: &[SampleKey],
        period: u32,
        scenario: u32,
        season: &Season,
        years: &[i32],
    ) -> Result<SampleKey> {
        if let Some(key) = Self::pinned_for(pinned, period, scenario, &season.name) {
            return Ok(key);
        }
        let SeasonKind::Regular { months } = season.kind else {
            bail!("Season {} is not regular", season.name);
        };
        let year = years[rng.gen_range(0..years.len())];
        let month = months[rng.gen_range(0..months.len())];
        let rows = self.series.electric_load.rows_in(year, month);
        ensure!(
            rows.len() >= season.length as usize,
            "Month {month}/{year} has too few rows for season {}",
            season.name
        );
        let offset = rng.gen_range(0..=rows.len() - season.length as usize);
        Ok(SampleKey {
            period,
            scenario,
            season: season.name.to_string(),
            year,
            month,
            hour: offset as u32,
        })
    }

    fn regular_window(&self, key: &SampleKey, season: &Season) -> Result<Vec<usize>> {
        let rows = self.series.electric_load.rows_in(key.year, key.month);
        let offset = key.hour as usize;
        ensure!(
            offset + season.length as usize <= rows.len(),
            "Sampling key for {} points outside month {}/{}",
            key.season,
            key.month,
            key.year
        );
        let mut window = rows[offset..offset + season.length as usize].to_vec();
        realign_to_monday(&self.series.electric_load.timestamps, &mut window);
        Ok(window)
    }

    /// One key per peak season: system-wide summed-load peak, then the peak
    /// of the single node with the highest load anywhere in the drawn year
    fn peak_keys<R: Rng>(
        &self,
        rng: &mut R,
        pinned: &[SampleKey],
        period: u32,
        scenario: u32,
        years: &[i32],
    ) -> Result<Vec<SampleKey>> {
        let peak_names: Vec<String> = self
            .temporal
            .peak_seasons()
            .map(|s| s.name.to_string())
            .collect();
        if let Some(first) = Self::pinned_for(pinned, period, scenario, &peak_names[0]) {
            let mut keys = vec![first];
            for name in &peak_names[1..] {
                keys.push(
                    Self::pinned_for(pinned, period, scenario, name).with_context(|| {
                        format!("Sampling key misses {name} for period {period} scenario {scenario}")
                    })?,
                );
            }
            return Ok(keys);
        }

        let year = years[rng.gen_range(0..years.len())];
        let load = &self.series.electric_load;
        let year_rows = load.rows_in_year(year);
        ensure!(!year_rows.is_empty(), "No load rows in year {year}");

        let system_peak = year_rows
            .iter()
            .enumerate()
            .max_by(|(_, &a), (_, &b)| {
                let sum = |row: usize| load.columns.values().map(|c| c[row]).sum::<f64>();
                sum(a).total_cmp(&sum(b))
            })
            .map(|(pos, _)| pos)
            .unwrap();

        let peak_node = load
            .columns
            .iter()
            .max_by(|(_, a), (_, b)| {
                let node_max =
                    |col: &Vec<f64>| year_rows.iter().map(|&r| col[r]).fold(f64::MIN, f64::max);
                node_max(a).total_cmp(&node_max(b))
            })
            .map(|(node, _)| node.clone())
            .context("Electric load series has no node columns")?;
        let node_peak = year_rows
            .iter()
            .enumerate()
            .max_by(|(_, &a), (_, &b)| load.value(&peak_node, a).total_cmp(&load.value(&peak_node, b)))
            .map(|(pos, _)| pos)
            .unwrap();

        // peak1 centres on the peakiest single node, peak2 on the
        // system-wide load maximum
        Ok(peak_names
            .iter()
            .zip([node_peak, system_peak])
            .map(|(name, centre)| SampleKey {
                period,
                scenario,
                season: name.clone(),
                year,
                month: 0,
                hour: centre as u32,
            })
            .collect())
    }

    fn peak_window(&self, key: &SampleKey, season: &Season) -> Result<Vec<usize>> {
        let year_rows = self.series.electric_load.rows_in_year(key.year);
        ensure!(
            (key.hour as usize) < year_rows.len() && year_rows.len() >= season.length as usize,
            "Sampling key for {} points outside year {}",
            key.season,
            key.year
        );
        let mut window = centred_window(&year_rows, key.hour as usize, season.length as usize);
        sort_by_hour_of_day(&self.series.electric_load.timestamps, &mut window);
        Ok(window)
    }

    /// Copy one window into the profile tables under the season's global
    /// hour numbers
    fn fill(
        &self,
        profiles: &mut Profiles,
        season: &Season,
        window: &[usize],
        period: u32,
        scenario: u32,
    ) {
        debug_assert_eq!(window.len(), season.length as usize);
        for (hour, &row) in season.hours().zip(window) {
            for (&kind, series) in &self.series.availability {
                for node in series.columns.keys() {
                    profiles.availability.insert(
                        (node.clone(), kind, period, scenario, hour),
                        series.value(node, row),
                    );
                }
            }
            for node in self.series.electric_load.columns.keys() {
                profiles.electric_load.insert(
                    (node.clone(), period, scenario, hour),
                    self.series.electric_load.value(node, row),
                );
            }
            if let Some(series) = &self.series.heat_load {
                for node in series.columns.keys() {
                    profiles
                        .heat_load
                        .insert((node.clone(), period, scenario, hour), series.value(node, row));
                }
            }
            if let Some(series) = &self.series.cop {
                for node in series.columns.keys() {
                    profiles
                        .cop
                        .insert((node.clone(), period, scenario, hour), series.value(node, row));
                }
            }
        }
        for node in self.series.hydro_inflow.columns.keys() {
            let budget: f64 = window
                .iter()
                .map(|&row| self.series.hydro_inflow.value(node, row))
                .sum();
            profiles.seasonal_hydro_budget.insert(
                (node.clone(), Rc::clone(&season.name), period, scenario),
                budget,
            );
        }
    }
}

/// Read a sampling-key file
pub fn read_sample_keys(file_path: &Path) -> Result<Vec<SampleKey>> {
    let keys: Vec<SampleKey> = csv::Reader::from_path(file_path)
        .with_context(|| input_err_msg(file_path))?
        .deserialize()
        .collect::<Result<_, _>>()
        .with_context(|| input_err_msg(file_path))?;
    ensure!(!keys.is_empty(), "Sampling-key file {file_path:?} is empty");
    Ok(keys)
}

/// Write the sampling-key file for later replay
pub fn write_sample_keys(file_path: &Path, keys: &[SampleKey]) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(file_path).with_context(|| input_err_msg(file_path))?;
    for key in keys {
        writer.serialize(key)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::TemporalSpec;
    use chrono::{Duration, NaiveDate};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rstest::{fixture, rstest};
    use tempfile::tempdir;

    /// One synthetic year (2015) of hourly rows for two nodes, with load
    /// spikes at known rows
    fn synthetic_series() -> SeriesSet {
        let start = NaiveDate::from_ymd_opt(2015, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let n = 8760;
        let timestamps: Vec<NaiveDateTime> =
            (0..n).map(|i| start + Duration::hours(i)).collect();

        let make = |f: &dyn Fn(usize) -> f64| Series {
            timestamps: timestamps.clone(),
            columns: [
                (NodeID::from("A"), (0..n as usize).map(f).collect()),
                (NodeID::from("B"), (0..n as usize).map(|i| f(i) / 2.0).collect()),
            ]
            .into_iter()
            .collect(),
        };

        let mut load = make(&|i| 100.0 + (i % 24) as f64);
        // distinct peaks: summed load peaks at row 5000, node A alone at
        // row 6000
        load.columns.get_mut("A").unwrap()[5000] = 1e4;
        load.columns.get_mut("B").unwrap()[5000] = 1e4;
        load.columns.get_mut("A").unwrap()[6000] = 1.5e4;

        SeriesSet {
            availability: [(ProfileKind::Solar, make(&|i| (i % 24) as f64 / 24.0))]
                .into_iter()
                .collect(),
            electric_load: load,
            hydro_inflow: make(&|_| 1.0),
            heat_load: None,
            cop: None,
        }
    }

    #[fixture]
    fn temporal() -> Temporal {
        let spec = TemporalSpec {
            n_periods: 2,
            period_step_years: 5,
            n_scenarios: 2,
            regular_season_hours: 168,
            peak_season_hours: 24,
        };
        let scales = crate::time::SEASON_MONTHS
            .iter()
            .map(|(name, _)| (Rc::from(*name), 13.0))
            .collect();
        Temporal::build(&spec, &scales).unwrap()
    }

    #[rstest]
    fn test_windows_start_monday_midnight(temporal: Temporal) {
        let series = synthetic_series();
        let sampler = Sampler::new(&series, &temporal);
        let mut rng = StdRng::seed_from_u64(7);
        let (_, keys) = sampler.sample(&mut rng, &[]).unwrap();
        for key in keys.iter().filter(|k| !k.season.starts_with("peak")) {
            let season = temporal
                .seasons
                .iter()
                .find(|s| *s.name == key.season)
                .unwrap();
            let window = sampler.regular_window(key, season).unwrap();
            let first = series.electric_load.timestamps[window[0]];
            assert_eq!(first.weekday().num_days_from_monday(), 0);
            assert_eq!(first.hour(), 0);
        }
    }

    #[rstest]
    fn test_same_seed_same_keys(temporal: Temporal) {
        let series = synthetic_series();
        let sampler = Sampler::new(&series, &temporal);
        let keys1 = {
            let mut rng = StdRng::seed_from_u64(42);
            sampler.sample(&mut rng, &[]).unwrap().1
        };
        let keys2 = {
            let mut rng = StdRng::seed_from_u64(42);
            sampler.sample(&mut rng, &[]).unwrap().1
        };
        assert_eq!(keys1, keys2);
    }

    #[rstest]
    fn test_pinned_keys_replay_profiles(temporal: Temporal) {
        let series = synthetic_series();
        let sampler = Sampler::new(&series, &temporal);
        let mut rng = StdRng::seed_from_u64(1);
        let (profiles, keys) = sampler.sample(&mut rng, &[]).unwrap();

        // a different seed with pinned keys must reproduce the profiles
        let mut other_rng = StdRng::seed_from_u64(999);
        let (replayed, replay_keys) = sampler.sample(&mut other_rng, &keys).unwrap();
        assert_eq!(keys, replay_keys);
        assert_eq!(profiles.electric_load, replayed.electric_load);
        assert_eq!(profiles.availability, replayed.availability);
        assert_eq!(
            profiles.seasonal_hydro_budget,
            replayed.seasonal_hydro_budget
        );
    }

    #[rstest]
    fn test_peak_windows_hit_the_spikes(temporal: Temporal) {
        let series = synthetic_series();
        let sampler = Sampler::new(&series, &temporal);
        let mut rng = StdRng::seed_from_u64(3);
        let (_, keys) = sampler.sample(&mut rng, &[]).unwrap();
        let node = keys.iter().find(|k| k.season == "peak1").unwrap();
        let system = keys.iter().find(|k| k.season == "peak2").unwrap();
        assert_eq!(node.hour, 6000);
        assert_eq!(system.hour, 5000);
    }

    #[rstest]
    fn test_key_file_round_trip(temporal: Temporal) {
        let series = synthetic_series();
        let sampler = Sampler::new(&series, &temporal);
        let mut rng = StdRng::seed_from_u64(5);
        let (_, keys) = sampler.sample(&mut rng, &[]).unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("sampling_key.csv");
        write_sample_keys(&path, &keys).unwrap();
        assert_eq!(read_sample_keys(&path).unwrap(), keys);
    }

    #[test]
    fn test_timestamp_formats() {
        assert!(parse_timestamp("2015-03-01 05:00:00").is_ok());
        assert!(parse_timestamp("01/03/2015 05:00").is_ok());
        assert!(parse_timestamp("March 1st").is_err());
    }
}
