//! Dataset access layer: CSV-backed measurement and anomaly tables.
//!
//! Both tables are reloaded on every query. The datasets are small and
//! read-only, so repeated parsing keeps each answer consistent with the
//! files on disk without any cache invalidation concerns.

use crate::error::Result;
use chrono::{Duration, NaiveDate};
use lazy_static::lazy_static;
use polars::prelude::*;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DATE_COL: &str = "Date";
pub const SITE_COL: &str = "Site_ID";
pub const SECTOR_COL: &str = "Sector_ID";
pub const KPI_NAME_COL: &str = "KPI";
pub const ANOMALY_VALUE_COL: &str = "Value";

pub const MEASUREMENTS_FILE: &str = "kpi_measurements.csv";
pub const ANOMALIES_FILE: &str = "kpi_anomalies.csv";

/// Environment variable pointing at the directory holding both CSV files.
pub const DATA_DIR_ENV: &str = "NETPULSE_DATA_DIR";

lazy_static! {
    static ref SITE_ID_RE: Regex = Regex::new(r"^SITE_\d{3}$").unwrap();
    static ref SECTOR_ID_RE: Regex = Regex::new(r"^SITE_\d{3}_SECTOR_[A-Z]$").unwrap();
}

/// Site ids are always formatted as `SITE_###`.
pub fn is_valid_site_id(id: &str) -> bool {
    SITE_ID_RE.is_match(id)
}

/// Sector ids are always formatted as `SITE_###_SECTOR_<letter>`.
pub fn is_valid_sector_id(id: &str) -> bool {
    SECTOR_ID_RE.is_match(id)
}

/// Parse a user-supplied date in `YYYY-MM-DD` or two-digit-year `DD.MM.YY`
/// form. Anything else yields `None`, which callers treat as an absent bound.
pub fn parse_flexible_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%d.%m.%y"))
        .ok()
}

fn epoch_day_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1970, 1, 1).map(|epoch| epoch + Duration::days(i64::from(days)))
}

/// Handle to the two file-backed tables.
#[derive(Debug, Clone)]
pub struct KpiStore {
    pub measurements_path: PathBuf,
    pub anomalies_path: PathBuf,
}

impl KpiStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let dir = data_dir.as_ref();
        Self {
            measurements_path: dir.join(MEASUREMENTS_FILE),
            anomalies_path: dir.join(ANOMALIES_FILE),
        }
    }

    /// Store rooted at `NETPULSE_DATA_DIR`, falling back to `./data`.
    pub fn from_env() -> Self {
        let dir = std::env::var(DATA_DIR_ENV).unwrap_or_else(|_| "data".to_string());
        Self::new(dir)
    }

    /// Load the per-day, per-site/sector KPI measurement table.
    ///
    /// The `Date` column is coerced to a calendar-day type (unparsable values
    /// become null) and every KPI column is normalized to `Float64`.
    pub fn load_measurements(&self) -> Result<DataFrame> {
        let df = self.read_csv(&self.measurements_path)?;
        let key_cols = [DATE_COL, SITE_COL, SECTOR_COL];
        self.cast_value_columns(df, &key_cols)
    }

    /// Load the precomputed anomaly-flag table (one row per flagged reading).
    pub fn load_anomalies(&self) -> Result<DataFrame> {
        let df = self.read_csv(&self.anomalies_path)?;
        let key_cols = [DATE_COL, SITE_COL, SECTOR_COL, KPI_NAME_COL];
        self.cast_value_columns(df, &key_cols)
    }

    fn read_csv(&self, path: &Path) -> Result<DataFrame> {
        let df = LazyCsvReader::new(path)
            .with_has_header(true)
            .with_infer_schema_length(Some(1000))
            .finish()?
            .with_columns([col(DATE_COL).str().to_date(StrptimeOptions {
                format: Some("%Y-%m-%d".into()),
                strict: false,
                exact: true,
                cache: true,
            })])
            .collect()?;
        debug!(
            rows = df.height(),
            path = %path.display(),
            "loaded dataset"
        );
        Ok(df)
    }

    fn cast_value_columns(&self, df: DataFrame, key_cols: &[&str]) -> Result<DataFrame> {
        let casts: Vec<Expr> = df
            .get_column_names()
            .iter()
            .copied()
            .filter(|name| !key_cols.contains(name))
            .map(|name| col(name).cast(DataType::Float64))
            .collect();
        if casts.is_empty() {
            return Ok(df);
        }
        Ok(df.lazy().with_columns(casts).collect()?)
    }
}

/// Row-level filter applied in a fixed order: required-column null drops,
/// then site/sector equality, then the inclusive date range. Null dates
/// never satisfy a range bound.
#[derive(Debug, Clone, Default)]
pub struct RowFilter {
    pub site_id: Option<String>,
    pub sector_id: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub required: Vec<String>,
}

impl RowFilter {
    pub fn apply(&self, df: DataFrame) -> Result<DataFrame> {
        let mut lf = df.lazy();
        if !self.required.is_empty() {
            lf = lf.drop_nulls(Some(self.required.iter().map(|c| col(c.as_str())).collect()));
        }
        if let Some(site) = &self.site_id {
            lf = lf.filter(col(SITE_COL).eq(lit(site.clone())));
        }
        if let Some(sector) = &self.sector_id {
            lf = lf.filter(col(SECTOR_COL).eq(lit(sector.clone())));
        }
        if let Some(start) = self.start_date {
            lf = lf.filter(col(DATE_COL).gt_eq(lit(start)));
        }
        if let Some(end) = self.end_date {
            lf = lf.filter(col(DATE_COL).lt_eq(lit(end)));
        }
        Ok(lf.collect()?)
    }
}

/// Earliest non-null date in the frame's `Date` column.
pub fn date_col_min(df: &DataFrame) -> Result<Option<NaiveDate>> {
    let ca = df.column(DATE_COL)?.date()?;
    Ok(ca.min().and_then(epoch_day_to_date))
}

/// Latest non-null date in the frame's `Date` column.
pub fn date_col_max(df: &DataFrame) -> Result<Option<NaiveDate>> {
    let ca = df.column(DATE_COL)?.date()?;
    Ok(ca.max().and_then(epoch_day_to_date))
}

/// Calendar day at `idx`, or `None` for nulls and non-date cells.
pub fn date_at(series: &Series, idx: usize) -> Option<NaiveDate> {
    match series.get(idx) {
        Ok(AnyValue::Date(days)) => epoch_day_to_date(days),
        _ => None,
    }
}

/// Numeric value at `idx`, or `None` for nulls and non-numeric cells.
pub fn f64_at(series: &Series, idx: usize) -> Option<f64> {
    match series.get(idx) {
        Ok(AnyValue::Float64(v)) => Some(v),
        Ok(AnyValue::Float32(v)) => Some(f64::from(v)),
        Ok(AnyValue::Int64(v)) => Some(v as f64),
        Ok(AnyValue::Int32(v)) => Some(f64::from(v)),
        _ => None,
    }
}

/// String value at `idx`, or `None` for nulls and non-string cells.
pub fn str_at(series: &Series, idx: usize) -> Option<String> {
    match series.get(idx) {
        Ok(AnyValue::String(v)) => Some(v.to_string()),
        _ => None,
    }
}
