//! Whole-dataset descriptive statistics for the measurement table.

use crate::dataset::{date_col_max, date_col_min, KpiStore, DATE_COL, SECTOR_COL, SITE_COL};
use crate::error::{KpiError, Result};
use polars::prelude::*;
use tracing::info;

pub struct DatasetSummary {
    store: KpiStore,
}

impl DatasetSummary {
    pub fn new(store: KpiStore) -> Self {
        Self { store }
    }

    /// Date span, entity cardinalities, and per-KPI missingness/mean/min/max.
    pub fn describe(&self) -> Result<String> {
        let df = self.store.load_measurements()?;
        if df.height() == 0 {
            return Err(KpiError::EmptyDataset);
        }

        let first_day = date_col_min(&df)?.ok_or(KpiError::EmptyDataset)?;
        let last_day = date_col_max(&df)?.ok_or(KpiError::EmptyDataset)?;

        let num_sites = df.column(SITE_COL)?.n_unique()?;
        let column_names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        let num_sectors = if column_names.iter().any(|name| name == SECTOR_COL) {
            df.column(SECTOR_COL)?.n_unique()?.to_string()
        } else {
            "N/A".to_string()
        };

        let kpi_columns: Vec<&String> = column_names
            .iter()
            .filter(|name| {
                name.as_str() != DATE_COL
                    && name.as_str() != SITE_COL
                    && name.as_str() != SECTOR_COL
            })
            .collect();
        info!(
            rows = df.height(),
            sites = num_sites,
            kpis = kpi_columns.len(),
            "describing measurement dataset"
        );

        let mut report = format!(
            "**KPI Dataset Overview**\n\
             - Date Range: **{first_day} to {last_day}**\n\
             - Sites: **{num_sites}**\n\
             - Sectors: **{num_sectors}**\n\
             - Available KPIs ({count}): {names}\n\n\
             **Per-KPI Statistics**\n",
            count = kpi_columns.len(),
            names = kpi_columns
                .iter()
                .map(|name| name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        );

        for kpi in kpi_columns {
            let series = df.column(kpi)?;
            let missing = series.null_count();
            let values = series.f64()?;
            report.push_str(&format!(
                "• **{kpi}**\n  - Missing values: {missing}\n  - Mean: {mean}\n  - Min: {min}\n  - Max: {max}\n",
                mean = fmt_stat(values.mean()),
                min = fmt_stat(values.min()),
                max = fmt_stat(values.max()),
            ));
        }

        Ok(report.trim_end().to_string())
    }
}

fn fmt_stat(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.2}"),
        None => "N/A".to_string(),
    }
}
