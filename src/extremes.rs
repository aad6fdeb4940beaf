//! Extreme/peak queries: which site leads (or trails) a KPI over a window,
//! and the day a given site hit its extreme value.

use crate::dataset::{
    date_at, date_col_max, f64_at, str_at, KpiStore, RowFilter, DATE_COL, SITE_COL,
};
use crate::error::{KpiError, Result};
use chrono::{Duration, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::info;

/// Direction of an extreme query. Anything other than "lowest"
/// (case-insensitive) is read as "highest".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExtremeType {
    #[default]
    Highest,
    Lowest,
}

impl ExtremeType {
    pub fn from_loose(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("lowest") {
            ExtremeType::Lowest
        } else {
            ExtremeType::Highest
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ExtremeType::Highest => "highest",
            ExtremeType::Lowest => "lowest",
        }
    }

    fn prefers(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            ExtremeType::Highest => candidate > incumbent,
            ExtremeType::Lowest => candidate < incumbent,
        }
    }
}

impl Serialize for ExtremeType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for ExtremeType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(ExtremeType::from_loose(&raw))
    }
}

pub struct SiteExtremes {
    store: KpiStore,
}

impl SiteExtremes {
    pub fn new(store: KpiStore) -> Self {
        Self { store }
    }

    /// Site with the highest or lowest average value of `kpi` in the window.
    ///
    /// Defaults: `end` = latest date in the dataset, `start` = `end` − 7 days.
    pub fn site_kpi_extreme(
        &self,
        kpi: &str,
        extreme: ExtremeType,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<String> {
        let df = self.store.load_measurements()?;
        let base = RowFilter {
            required: vec![
                DATE_COL.to_string(),
                SITE_COL.to_string(),
                kpi.to_string(),
            ],
            ..Default::default()
        }
        .apply(df)?;

        let end = match end {
            Some(day) => day,
            None => date_col_max(&base)?.ok_or(KpiError::EmptyDataset)?,
        };
        let start = start.unwrap_or_else(|| end - Duration::days(7));

        let windowed = RowFilter {
            start_date: Some(start),
            end_date: Some(end),
            ..Default::default()
        }
        .apply(base)?;
        if windowed.height() == 0 {
            return Err(KpiError::EmptyWindow {
                kpi: kpi.to_string(),
                start,
                end,
            });
        }

        let averages = windowed
            .lazy()
            .group_by_stable([col(SITE_COL)])
            .agg([col(kpi).mean().alias("avg_kpi")])
            .collect()?;

        let sites = averages.column(SITE_COL)?;
        let avgs = averages.column("avg_kpi")?;
        let mut best: Option<(String, f64)> = None;
        for idx in 0..averages.height() {
            let site = match str_at(sites, idx) {
                Some(site) => site,
                None => continue,
            };
            let avg = match f64_at(avgs, idx) {
                Some(avg) => avg,
                None => continue,
            };
            // strict comparison keeps the first-encountered site on ties
            let take = match &best {
                None => true,
                Some((_, incumbent)) => extreme.prefers(avg, *incumbent),
            };
            if take {
                best = Some((site, avg));
            }
        }

        let (site_id, value) = best.ok_or(KpiError::EmptyWindow {
            kpi: kpi.to_string(),
            start,
            end,
        })?;
        info!(kpi, %site_id, value, "site extreme resolved");

        Ok(format!(
            "Between **{start}** and **{end}**, site `{site_id}` had the {direction} average **{kpi}** of **{value:.2}**.",
            direction = extreme.label(),
        ))
    }

    /// Day on which `site_id` recorded its extreme value of `kpi`.
    ///
    /// Defaults: `end` = latest date present for the site, `start` =
    /// `end` − 30 days.
    pub fn peak_kpi_day(
        &self,
        site_id: &str,
        kpi: &str,
        extreme: ExtremeType,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<String> {
        let df = self.store.load_measurements()?;
        let site_rows = RowFilter {
            site_id: Some(site_id.to_string()),
            required: vec![
                DATE_COL.to_string(),
                SITE_COL.to_string(),
                kpi.to_string(),
            ],
            ..Default::default()
        }
        .apply(df)?;
        if site_rows.height() == 0 {
            return Err(KpiError::SiteNotFound {
                site_id: site_id.to_string(),
            });
        }

        let end = match end {
            Some(day) => day,
            None => date_col_max(&site_rows)?.ok_or(KpiError::EmptyDataset)?,
        };
        let start = start.unwrap_or_else(|| end - Duration::days(30));

        let windowed = RowFilter {
            start_date: Some(start),
            end_date: Some(end),
            ..Default::default()
        }
        .apply(site_rows)?;
        if windowed.height() == 0 {
            return Err(KpiError::SiteWindowEmpty {
                site_id: site_id.to_string(),
                start,
                end,
            });
        }

        let dates = windowed.column(DATE_COL)?;
        let values = windowed.column(kpi)?;
        let mut best: Option<(NaiveDate, f64)> = None;
        for idx in 0..windowed.height() {
            let day = match date_at(dates, idx) {
                Some(day) => day,
                None => continue,
            };
            let value = match f64_at(values, idx) {
                Some(value) => value,
                None => continue,
            };
            let take = match &best {
                None => true,
                Some((_, incumbent)) => extreme.prefers(value, *incumbent),
            };
            if take {
                best = Some((day, value));
            }
        }

        let (day, value) = best.ok_or(KpiError::SiteWindowEmpty {
            site_id: site_id.to_string(),
            start,
            end,
        })?;
        info!(site_id, kpi, %day, value, "peak day resolved");

        Ok(format!(
            "On **{day}**, site `{site_id}` had the {label} **{kpi}** of **{value:.2}** between {start} and {end}.",
            label = extreme.label(),
        ))
    }
}
