use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KpiError {
    #[error("No data available for `{kpi}` between {start} and {end}.")]
    EmptyWindow {
        kpi: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("No data found for site `{site_id}`.")]
    SiteNotFound { site_id: String },

    #[error("No data found for `{site_id}` between {start} and {end}.")]
    SiteWindowEmpty {
        site_id: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("No data available for {kpi_x} and {kpi_y}.")]
    PairEmpty { kpi_x: String, kpi_y: String },

    #[error("Dataset appears empty or could not be parsed.")]
    EmptyDataset,

    #[error("the Granger causality test requires at least {required} aligned observations, found {actual}")]
    InsufficientObservations { required: usize, actual: usize },

    #[error("unknown KPI column `{name}`{}", .suggestion.as_ref().map(|s| format!(" (closest match: `{s}`)")).unwrap_or_default())]
    UnknownKpi {
        name: String,
        suggestion: Option<String>,
    },

    #[error("numerical failure: {0}")]
    Numerical(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl KpiError {
    /// Whether this error carries its own user-facing report text.
    ///
    /// Reportable errors render verbatim at the dispatch boundary; everything
    /// else is wrapped in an "Error <doing action>: ..." line there.
    pub fn is_report(&self) -> bool {
        matches!(
            self,
            KpiError::EmptyWindow { .. }
                | KpiError::SiteNotFound { .. }
                | KpiError::SiteWindowEmpty { .. }
                | KpiError::PairEmpty { .. }
                | KpiError::EmptyDataset
        )
    }
}

pub type Result<T> = std::result::Result<T, KpiError>;
