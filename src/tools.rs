//! The closed set of named operations and the single text boundary.
//!
//! Each operation is a tagged variant with a typed parameter schema. Which
//! operation to invoke is the caller's concern; this module only executes a
//! request and renders the outcome as report text. `ToolRunner::run` is
//! total: it always returns a string, never an error.

use crate::anomalies::{AnomalyQuery, AnomalyReporter};
use crate::catalog;
use crate::dataset::{is_valid_sector_id, is_valid_site_id, parse_flexible_date, KpiStore};
use crate::error::{KpiError, Result};
use crate::extremes::{ExtremeType, SiteExtremes};
use crate::impact::ImpactAnalyzer;
use crate::summary::DatasetSummary;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "tool", content = "params", rename_all = "snake_case")]
pub enum ToolRequest {
    GetSiteKpiExtreme {
        kpi_name: String,
        #[serde(default)]
        extreme_type: ExtremeType,
        #[serde(default)]
        start_date: Option<String>,
        #[serde(default)]
        end_date: Option<String>,
    },
    GetPeakKpiDayForSite {
        site_id: String,
        #[serde(default = "default_peak_kpi")]
        kpi_name: String,
        #[serde(default)]
        extreme_type: ExtremeType,
        #[serde(default)]
        start_date: Option<String>,
        #[serde(default)]
        end_date: Option<String>,
    },
    CompareKpiImpact {
        kpi_x: String,
        kpi_y: String,
        #[serde(default)]
        site_id: Option<String>,
        #[serde(default)]
        start_date: Option<String>,
        #[serde(default)]
        end_date: Option<String>,
    },
    DescribeKpiDataset {
        /// Unused; kept so callers with a fixed one-argument schema can
        /// still address this operation.
        #[serde(default)]
        dummy_input: Option<String>,
    },
    KpiAnomalies {
        kpi_name: String,
        #[serde(default)]
        site_id: Option<String>,
        #[serde(default)]
        sector_id: Option<String>,
        #[serde(default)]
        start_date: Option<String>,
        #[serde(default)]
        end_date: Option<String>,
    },
}

fn default_peak_kpi() -> String {
    "DL_Throughput".to_string()
}

pub struct ToolRunner {
    store: KpiStore,
}

impl ToolRunner {
    pub fn new(store: KpiStore) -> Self {
        Self { store }
    }

    /// Execute one operation and render the outcome as report text.
    pub fn run(&self, request: ToolRequest) -> String {
        match request {
            ToolRequest::GetSiteKpiExtreme {
                kpi_name,
                extreme_type,
                start_date,
                end_date,
            } => render(
                "processing KPI data",
                self.site_kpi_extreme(&kpi_name, extreme_type, start_date, end_date),
            ),
            ToolRequest::GetPeakKpiDayForSite {
                site_id,
                kpi_name,
                extreme_type,
                start_date,
                end_date,
            } => render(
                "processing request",
                self.peak_kpi_day(&site_id, &kpi_name, extreme_type, start_date, end_date),
            ),
            ToolRequest::CompareKpiImpact {
                kpi_x,
                kpi_y,
                site_id,
                start_date,
                end_date,
            } => render(
                "evaluating directional KPI impact",
                self.compare_kpi_impact(&kpi_x, &kpi_y, site_id, start_date, end_date),
            ),
            ToolRequest::DescribeKpiDataset { dummy_input: _ } => render(
                "describing KPI dataset",
                DatasetSummary::new(self.store.clone()).describe(),
            ),
            ToolRequest::KpiAnomalies {
                kpi_name,
                site_id,
                sector_id,
                start_date,
                end_date,
            } => render(
                "analyzing KPI anomalies",
                self.kpi_anomalies(&kpi_name, site_id, sector_id, start_date, end_date),
            ),
        }
    }

    fn site_kpi_extreme(
        &self,
        kpi_name: &str,
        extreme_type: ExtremeType,
        start_date: Option<String>,
        end_date: Option<String>,
    ) -> Result<String> {
        ensure_known_kpi(kpi_name)?;
        SiteExtremes::new(self.store.clone()).site_kpi_extreme(
            kpi_name,
            extreme_type,
            opt_date(start_date),
            opt_date(end_date),
        )
    }

    fn peak_kpi_day(
        &self,
        site_id: &str,
        kpi_name: &str,
        extreme_type: ExtremeType,
        start_date: Option<String>,
        end_date: Option<String>,
    ) -> Result<String> {
        ensure_known_kpi(kpi_name)?;
        check_entity_formats(Some(site_id), None);
        SiteExtremes::new(self.store.clone()).peak_kpi_day(
            site_id,
            kpi_name,
            extreme_type,
            opt_date(start_date),
            opt_date(end_date),
        )
    }

    fn compare_kpi_impact(
        &self,
        kpi_x: &str,
        kpi_y: &str,
        site_id: Option<String>,
        start_date: Option<String>,
        end_date: Option<String>,
    ) -> Result<String> {
        ensure_known_kpi(kpi_x)?;
        ensure_known_kpi(kpi_y)?;
        check_entity_formats(site_id.as_deref(), None);
        ImpactAnalyzer::new(self.store.clone()).compare(
            kpi_x,
            kpi_y,
            site_id.as_deref(),
            opt_date(start_date),
            opt_date(end_date),
        )
    }

    fn kpi_anomalies(
        &self,
        kpi_name: &str,
        site_id: Option<String>,
        sector_id: Option<String>,
        start_date: Option<String>,
        end_date: Option<String>,
    ) -> Result<String> {
        ensure_known_kpi(kpi_name)?;
        check_entity_formats(site_id.as_deref(), sector_id.as_deref());
        let query = AnomalyQuery {
            kpi_name: kpi_name.to_string(),
            site_id,
            sector_id,
            start_date: opt_date(start_date),
            end_date: opt_date(end_date),
        };
        AnomalyReporter::new(self.store.clone()).summarize(&query)
    }
}

fn render(action: &str, outcome: Result<String>) -> String {
    match outcome {
        Ok(report) => report,
        Err(e) if e.is_report() => e.to_string(),
        Err(e) => format!("Error {action}: {e}"),
    }
}

/// Unparsable date inputs are treated as absent, so the operation default
/// applies instead of an always-false filter.
fn opt_date(raw: Option<String>) -> Option<NaiveDate> {
    let raw = raw?;
    let parsed = parse_flexible_date(&raw);
    if parsed.is_none() {
        warn!(input = %raw, "unparsable date input ignored");
    }
    parsed
}

fn ensure_known_kpi(name: &str) -> Result<()> {
    if catalog::is_known_kpi(name) {
        return Ok(());
    }
    Err(KpiError::UnknownKpi {
        name: name.to_string(),
        suggestion: catalog::closest_kpi(name).map(String::from),
    })
}

/// Entity ids outside the documented formats can never match a row; flag
/// them early in the logs, then let the data decide.
fn check_entity_formats(site_id: Option<&str>, sector_id: Option<&str>) {
    if let Some(site) = site_id {
        if !is_valid_site_id(site) {
            warn!(site_id = %site, "site id does not match the SITE_### format");
        }
    }
    if let Some(sector) = sector_id {
        if !is_valid_sector_id(sector) {
            warn!(sector_id = %sector, "sector id does not match the SITE_###_SECTOR_<letter> format");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_with_defaults() {
        let request: ToolRequest = serde_json::from_str(
            r#"{"tool": "get_site_kpi_extreme", "params": {"kpi_name": "SINR"}}"#,
        )
        .unwrap();
        match request {
            ToolRequest::GetSiteKpiExtreme {
                kpi_name,
                extreme_type,
                start_date,
                end_date,
            } => {
                assert_eq!(kpi_name, "SINR");
                assert_eq!(extreme_type, ExtremeType::Highest);
                assert!(start_date.is_none());
                assert!(end_date.is_none());
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn peak_day_defaults_to_dl_throughput() {
        let request: ToolRequest = serde_json::from_str(
            r#"{"tool": "get_peak_kpi_day_for_site", "params": {"site_id": "SITE_001"}}"#,
        )
        .unwrap();
        match request {
            ToolRequest::GetPeakKpiDayForSite { kpi_name, .. } => {
                assert_eq!(kpi_name, "DL_Throughput");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn unknown_kpi_carries_a_suggestion() {
        let err = ensure_known_kpi("DL_Troughput").unwrap_err();
        let text = err.to_string();
        assert!(text.contains("DL_Troughput"));
        assert!(text.contains("DL_Throughput"));
    }

    #[test]
    fn unparsable_dates_are_absent() {
        assert_eq!(opt_date(Some("soon".to_string())), None);
        assert_eq!(
            opt_date(Some("2024-02-01".to_string())),
            NaiveDate::from_ymd_opt(2024, 2, 1)
        );
        assert_eq!(opt_date(None), None);
    }
}
