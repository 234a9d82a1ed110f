// src/report.rs
//
// Read-only analytics over a normalized dataset: the numbers a dashboard or
// CLI shows next to the trend line, year comparison and seasonal heatmap.

use chrono::{Months, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::dataset::{Dataset, NormalizedRow};

pub const SPARSE_YEAR_THRESHOLD: usize = 10;
pub const GAP_THRESHOLD_DAYS: i64 = 60;
pub const OUTLIER_SIGMAS: f64 = 3.0;

pub const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub rows: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub latest: NormalizedRow,
}

pub fn summary(ds: &Dataset) -> Option<Summary> {
    let first = ds.first()?;
    let latest = *ds.last()?;
    let (min, max) = ds.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
        (lo.min(r.value), hi.max(r.value))
    });
    Some(Summary {
        rows: ds.len(),
        first_date: first.date,
        last_date: latest.date,
        min,
        max,
        mean: mean(ds.iter().map(|r| r.value))?,
        latest,
    })
}

/// Level change against earlier readings; `None` where no earlier reading exists.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Changes {
    pub daily: Option<f64>,
    pub monthly: Option<f64>,
    pub yearly: Option<f64>,
}

/// Last reading on or before `cutoff`.
fn reading_at_or_before(ds: &Dataset, cutoff: NaiveDate) -> Option<&NormalizedRow> {
    let idx = ds.rows().partition_point(|r| r.date <= cutoff);
    idx.checked_sub(1).and_then(|i| ds.get(i))
}

pub fn changes(ds: &Dataset) -> Option<Changes> {
    let latest = ds.last()?;
    let daily = ds
        .len()
        .checked_sub(2)
        .and_then(|i| ds.get(i))
        .map(|prev| latest.value - prev.value);
    let since = |months: u32| {
        latest
            .date
            .checked_sub_months(Months::new(months))
            .and_then(|cutoff| reading_at_or_before(ds, cutoff))
            .map(|old| latest.value - old.value)
    };
    Some(Changes {
        daily,
        monthly: since(1),
        yearly: since(12),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonthlyAverage {
    pub month: u32,
    pub mean: f64,
}

/// Mean level per calendar month across all years, for months that have data.
pub fn monthly_averages(ds: &Dataset) -> Vec<MonthlyAverage> {
    let mut buckets: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for r in ds {
        buckets.entry(r.month).or_default().push(r.value);
    }
    buckets
        .into_iter()
        .filter_map(|(month, vals)| {
            Some(MonthlyAverage {
                month,
                mean: mean(vals)?,
            })
        })
        .collect()
}

/// The `n` most recent years present in the data, ascending.
pub fn recent_years(ds: &Dataset, n: usize) -> Vec<i32> {
    let years: Vec<i32> = records_per_year(ds).into_keys().collect();
    years[years.len().saturating_sub(n)..].to_vec()
}

/// `(day_of_year, value)` series per requested year; years without data are left out.
pub fn year_comparison(ds: &Dataset, years: &[i32]) -> BTreeMap<i32, Vec<(u32, f64)>> {
    let mut out: BTreeMap<i32, Vec<(u32, f64)>> = BTreeMap::new();
    for r in ds.iter().filter(|r| years.contains(&r.year)) {
        out.entry(r.year).or_default().push((r.day_of_year, r.value));
    }
    out
}

/// Year × month grid of mean levels.
pub fn heatmap(ds: &Dataset) -> BTreeMap<i32, [Option<f64>; 12]> {
    let mut sums: BTreeMap<i32, [(f64, usize); 12]> = BTreeMap::new();
    for r in ds {
        let cell = &mut sums.entry(r.year).or_insert([(0.0, 0); 12])[(r.month - 1) as usize];
        cell.0 += r.value;
        cell.1 += 1;
    }
    sums.into_iter()
        .map(|(year, cells)| {
            let means = cells.map(|(sum, n)| (n > 0).then(|| sum / n as f64));
            (year, means)
        })
        .collect()
}

pub fn records_per_year(ds: &Dataset) -> BTreeMap<i32, usize> {
    let mut counts = BTreeMap::new();
    for r in ds {
        *counts.entry(r.year).or_insert(0) += 1;
    }
    counts
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Gap {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quality {
    pub records_per_year: BTreeMap<i32, usize>,
    pub sparse_years: Vec<i32>,
    pub gaps: Vec<Gap>,
    pub outliers: Vec<NormalizedRow>,
}

/// Coverage and sanity checks: thin years, long gaps between readings, 3σ outliers.
pub fn quality(ds: &Dataset) -> Quality {
    let records_per_year = records_per_year(ds);
    let sparse_years = records_per_year
        .iter()
        .filter(|(_, n)| **n < SPARSE_YEAR_THRESHOLD)
        .map(|(&y, _)| y)
        .collect();

    let gaps = ds
        .rows()
        .windows(2)
        .filter_map(|w| {
            let days = (w[1].date - w[0].date).num_days();
            (days > GAP_THRESHOLD_DAYS).then_some(Gap {
                from: w[0].date,
                to: w[1].date,
                days,
            })
        })
        .collect();

    let outliers = match (mean(ds.iter().map(|r| r.value)), sample_std(ds)) {
        (Some(mu), Some(sd)) if sd > 0.0 => ds
            .iter()
            .filter(|r| (r.value - mu).abs() > OUTLIER_SIGMAS * sd)
            .copied()
            .collect(),
        _ => Vec::new(),
    };

    Quality {
        records_per_year,
        sparse_years,
        gaps,
        outliers,
    }
}

/// 10th and 90th percentile of the level, linearly interpolated.
pub fn percentile_band(ds: &Dataset) -> Option<(f64, f64)> {
    let mut vals: Vec<f64> = ds.iter().map(|r| r.value).collect();
    if vals.is_empty() {
        return None;
    }
    vals.sort_by(f64::total_cmp);
    Some((quantile(&vals, 0.1), quantile(&vals, 0.9)))
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

fn mean<I: IntoIterator<Item = f64>>(vals: I) -> Option<f64> {
    let (sum, n) = vals
        .into_iter()
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

fn sample_std(ds: &Dataset) -> Option<f64> {
    if ds.len() < 2 {
        return None;
    }
    let mu = mean(ds.iter().map(|r| r.value))?;
    let ss: f64 = ds.iter().map(|r| (r.value - mu).powi(2)).sum();
    Some((ss / (ds.len() - 1) as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn ds(rows: &[(NaiveDate, f64)]) -> Dataset {
        Dataset::from_rows(
            rows.iter()
                .map(|&(date, v)| NormalizedRow::new(date, v))
                .collect(),
        )
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn empty_dataset_has_no_summary() {
        assert!(summary(&Dataset::empty()).is_none());
        assert!(changes(&Dataset::empty()).is_none());
        assert!(percentile_band(&Dataset::empty()).is_none());
        assert!(monthly_averages(&Dataset::empty()).is_empty());
    }

    #[test]
    fn summary_stats() {
        let data = ds(&[
            (d(2020, 1, 1), -211.0),
            (d(2020, 6, 1), -209.0),
            (d(2021, 1, 1), -210.0),
        ]);
        let s = summary(&data).unwrap();
        assert_eq!(s.rows, 3);
        assert_eq!(s.first_date, d(2020, 1, 1));
        assert_eq!(s.last_date, d(2021, 1, 1));
        assert_eq!(s.min, -211.0);
        assert_eq!(s.max, -209.0);
        assert!(approx(s.mean, -210.0));
        assert_eq!(s.latest.value, -210.0);
    }

    #[test]
    fn changes_look_back_a_day_month_and_year() {
        let data = ds(&[
            (d(2023, 3, 10), -212.0),
            (d(2024, 2, 1), -211.0),
            (d(2024, 3, 9), -210.5),
            (d(2024, 3, 10), -210.0),
        ]);
        let c = changes(&data).unwrap();
        assert!(approx(c.daily.unwrap(), 0.5));
        assert!(approx(c.monthly.unwrap(), 1.0));
        assert!(approx(c.yearly.unwrap(), 2.0));
    }

    #[test]
    fn changes_without_history_are_none() {
        let c = changes(&ds(&[(d(2024, 3, 10), -210.0)])).unwrap();
        assert_eq!(c.daily, None);
        assert_eq!(c.monthly, None);
        assert_eq!(c.yearly, None);
    }

    #[test]
    fn seasonal_views() {
        let data = ds(&[
            (d(2020, 1, 5), -210.0),
            (d(2021, 1, 5), -212.0),
            (d(2021, 3, 1), -209.0),
        ]);

        let avgs = monthly_averages(&data);
        assert_eq!(avgs.len(), 2);
        assert_eq!(avgs[0].month, 1);
        assert!(approx(avgs[0].mean, -211.0));

        let grid = heatmap(&data);
        assert_eq!(grid[&2021][0], Some(-212.0));
        assert_eq!(grid[&2021][1], None);
        assert_eq!(grid[&2021][2], Some(-209.0));

        let cmp = year_comparison(&data, &[2021, 1999]);
        assert_eq!(cmp.len(), 1);
        assert_eq!(cmp[&2021], vec![(5, -212.0), (60, -209.0)]);

        assert_eq!(recent_years(&data, 5), vec![2020, 2021]);
        assert_eq!(recent_years(&data, 1), vec![2021]);
    }

    #[test]
    fn quality_flags_gaps_sparse_years_and_outliers() {
        let mut rows: Vec<(NaiveDate, f64)> = (1..=28).map(|day| (d(2020, 2, day), -210.0)).collect();
        rows.push((d(2020, 6, 1), -210.0));
        rows.push((d(2021, 1, 1), -150.0));
        let q = quality(&ds(&rows));

        assert_eq!(q.records_per_year[&2020], 29);
        assert_eq!(q.sparse_years, vec![2021]);
        assert_eq!(q.gaps.len(), 2);
        assert_eq!(q.gaps[0].from, d(2020, 2, 28));
        assert_eq!(q.gaps[0].days, 94);
        assert_eq!(q.outliers.len(), 1);
        assert_eq!(q.outliers[0].value, -150.0);
    }

    #[test]
    fn percentile_band_interpolates() {
        let data = ds(&(1..=11)
            .map(|i| (d(2020, 1, i), i as f64))
            .collect::<Vec<_>>());
        let (lo, hi) = percentile_band(&data).unwrap();
        assert!(approx(lo, 2.0));
        assert!(approx(hi, 10.0));
    }
}
