//! Anomaly summaries: counts, baseline comparison, peak day, group
//! classification, and same-day co-occurrence in related KPIs.

use crate::catalog;
use crate::dataset::{
    date_at, f64_at, str_at, KpiStore, RowFilter, ANOMALY_VALUE_COL, DATE_COL, KPI_NAME_COL,
};
use crate::error::{KpiError, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::HashSet;
use tracing::{info, warn};

/// Filters for one anomaly summary. Date bounds default to the dataset's
/// labeled window when unset.
#[derive(Debug, Clone)]
pub struct AnomalyQuery {
    pub kpi_name: String,
    pub site_id: Option<String>,
    pub sector_id: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl AnomalyQuery {
    pub fn new(kpi_name: impl Into<String>) -> Self {
        Self {
            kpi_name: kpi_name.into(),
            site_id: None,
            sector_id: None,
            start_date: None,
            end_date: None,
        }
    }
}

fn default_window() -> (NaiveDate, NaiveDate) {
    (
        NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date"),
        NaiveDate::from_ymd_opt(2024, 2, 29).expect("valid date"),
    )
}

pub struct AnomalyReporter {
    store: KpiStore,
}

impl AnomalyReporter {
    pub fn new(store: KpiStore) -> Self {
        Self { store }
    }

    pub fn summarize(&self, query: &AnomalyQuery) -> Result<String> {
        let kpi = query.kpi_name.as_str();
        let (default_start, default_end) = default_window();
        let start = query.start_date.unwrap_or(default_start);
        let end = query.end_date.unwrap_or(default_end);

        // anomaly rows for this KPI, then entity filters, then the window
        let anomalies = self.store.load_anomalies()?;
        let for_kpi = anomalies
            .lazy()
            .filter(col(KPI_NAME_COL).eq(lit(kpi.to_string())))
            .collect()?;
        let filtered = RowFilter {
            site_id: query.site_id.clone(),
            sector_id: query.sector_id.clone(),
            start_date: Some(start),
            end_date: Some(end),
            ..Default::default()
        }
        .apply(for_kpi)?;

        let peak_note = peak_day_note(&filtered, kpi)?;

        if filtered.height() == 0 {
            info!(kpi, "no anomaly rows after filtering");
            return Ok(format!(
                "No anomaly data found for `{kpi}` with given filters."
            ));
        }

        // baseline mean over the same population of the measurement table
        let measurements = self.store.load_measurements()?;
        let base = RowFilter {
            site_id: query.site_id.clone(),
            sector_id: query.sector_id.clone(),
            start_date: Some(start),
            end_date: Some(end),
            required: vec![kpi.to_string()],
        }
        .apply(measurements)?;
        if base.height() == 0 {
            info!(kpi, "no base rows to compare against");
            return Ok("No base KPI data found to compare anomalies.".to_string());
        }
        let baseline = base
            .column(kpi)?
            .f64()?
            .mean()
            .ok_or_else(|| KpiError::Numerical("baseline mean unavailable".to_string()))?;

        // partition anomaly readings around the baseline
        let values_col = filtered.column(ANOMALY_VALUE_COL)?;
        let mut above = Vec::new();
        let mut below = Vec::new();
        for idx in 0..filtered.height() {
            if let Some(value) = f64_at(values_col, idx) {
                if value > baseline {
                    above.push(value);
                } else {
                    below.push(value);
                }
            }
        }
        let anomaly_count = above.len() + below.len();
        let avg_above = mean_of(&above);
        let avg_below = mean_of(&below);

        let (group_label, members): (&str, &[&str]) = match catalog::group_of(kpi) {
            Some(group) => (group.label(), group.members()),
            None => ("Unknown", &[]),
        };

        // same-day anomalies in the other KPIs of the group; a failure here
        // degrades to an empty section instead of losing the whole report
        let main_dates = anomaly_dates(&filtered);
        let related = match self.co_occurring(kpi, members, query, &main_dates) {
            Ok(counts) => counts,
            Err(e) => {
                warn!(kpi, error = %e, "co-occurrence lookup failed");
                Vec::new()
            }
        };
        let related_summary = if related.is_empty() {
            String::new()
        } else {
            let mut text = format!(
                "On the same days, anomalies also occurred in other KPIs which may relate to anomalies in `{kpi}`:\n"
            );
            for (name, count) in &related {
                text.push_str(&format!("- `{name}`: {count} times\n"));
            }
            text
        };

        info!(kpi, anomaly_count, baseline, "anomaly summary computed");

        Ok(format!(
            "**Anomaly Summary for KPI: `{kpi}`**\n\n\
             **Date Range Analyzed**: {start} to {end}\n\n\
             **Key Statistics**:\n\
             - Total anomalies detected: **{anomaly_count}**\n\
             - Baseline average of `{kpi}`: **{baseline:.2}**\n\
             - Avg anomaly value **above** baseline: **{above}**\n\
             - Avg anomaly value **below** baseline: **{below}**\n\n\
             **KPI Group Classification**:\n\
             - Group: **{group_label}**\n\
             - Related KPIs: {members}\n\n\
             **Peak Anomaly Info**:\n\
             {peak_note}\
             **Co-occurring Anomalies**:\n\
             {related_summary}\n\
             - Use this summary of `{kpi}` trends, anomaly patterns and relationships to answer with details.\n\
             - If asked **why** anomalies occurred, avoid speculative causes; cite the co-occurring KPI counts above as evidence.\n",
            above = fmt_partition_mean(avg_above),
            below = fmt_partition_mean(avg_below),
            members = members.join(", "),
        ))
    }

    /// Count anomalies of the other same-group KPIs on the given dates,
    /// filtered by entity only (not by the query window).
    fn co_occurring(
        &self,
        kpi: &str,
        members: &[&str],
        query: &AnomalyQuery,
        dates: &HashSet<NaiveDate>,
    ) -> Result<Vec<(String, usize)>> {
        if members.is_empty() || dates.is_empty() {
            return Ok(Vec::new());
        }
        let df = self.store.load_anomalies()?;
        let entity_only = RowFilter {
            site_id: query.site_id.clone(),
            sector_id: query.sector_id.clone(),
            ..Default::default()
        }
        .apply(df)?;

        let mut counts: Vec<(String, usize)> = members
            .iter()
            .copied()
            .filter(|member| *member != kpi)
            .map(|member| (member.to_string(), 0usize))
            .collect();
        let kpi_col = entity_only.column(KPI_NAME_COL)?;
        let date_col = entity_only.column(DATE_COL)?;
        for idx in 0..entity_only.height() {
            let name = match str_at(kpi_col, idx) {
                Some(name) => name,
                None => continue,
            };
            let day = match date_at(date_col, idx) {
                Some(day) => day,
                None => continue,
            };
            if !dates.contains(&day) {
                continue;
            }
            if let Some(entry) = counts.iter_mut().find(|(member, _)| *member == name) {
                entry.1 += 1;
            }
        }
        counts.retain(|(_, count)| *count > 0);
        Ok(counts)
    }
}

/// Note naming the day with the most anomaly rows, empty when no dated rows
/// remain. Ties resolve to the first date in row order.
fn peak_day_note(filtered: &DataFrame, kpi: &str) -> Result<String> {
    if filtered.height() == 0 {
        return Ok(String::new());
    }
    let dates = filtered.column(DATE_COL)?;
    let mut daily_counts: Vec<(NaiveDate, usize)> = Vec::new();
    for idx in 0..filtered.height() {
        if let Some(day) = date_at(dates, idx) {
            match daily_counts.iter().position(|(seen, _)| *seen == day) {
                Some(pos) => daily_counts[pos].1 += 1,
                None => daily_counts.push((day, 1)),
            }
        }
    }
    let mut peak: Option<(NaiveDate, usize)> = None;
    for (day, count) in daily_counts {
        let take = match peak {
            None => true,
            Some((_, best)) => count > best,
        };
        if take {
            peak = Some((day, count));
        }
    }
    Ok(match peak {
        Some((day, count)) => format!(
            "Most anomalies for `{kpi}` occurred on **{day}** with **{count} anomalies**.\n\n"
        ),
        None => String::new(),
    })
}

fn anomaly_dates(filtered: &DataFrame) -> HashSet<NaiveDate> {
    let mut dates = HashSet::new();
    if let Ok(series) = filtered.column(DATE_COL) {
        for idx in 0..filtered.height() {
            if let Some(day) = date_at(series, idx) {
                dates.insert(day);
            }
        }
    }
    dates
}

fn mean_of(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Empty partitions surface as "None" in the report, never as zero.
fn fmt_partition_mean(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.2}"),
        None => "None".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_empty_partition_is_absent() {
        assert_eq!(mean_of(&[]), None);
        assert_eq!(mean_of(&[2.0, 4.0]), Some(3.0));
        assert_eq!(fmt_partition_mean(None), "None");
        assert_eq!(fmt_partition_mean(Some(1.256)), "1.26");
    }

    #[test]
    fn default_window_matches_dataset_labels() {
        let (start, end) = default_window();
        assert_eq!(start.to_string(), "2024-01-01");
        assert_eq!(end.to_string(), "2024-02-29");
    }
}
