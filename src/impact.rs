//! Cross-KPI impact analysis: a directional co-movement heuristic plus a
//! Granger-causality test over the aligned series.

use crate::dataset::{date_at, f64_at, KpiStore, RowFilter, DATE_COL, SITE_COL};
use crate::error::{KpiError, Result};
use crate::granger::{self, DEFAULT_MAX_LAG};
use chrono::NaiveDate;
use itertools::Itertools;
use tracing::info;

/// Conditional-probability threshold separating "likely" from "weak"
/// directional wording.
const LIKELY_THRESHOLD: f64 = 0.45;

pub struct ImpactAnalyzer {
    store: KpiStore,
}

impl ImpactAnalyzer {
    pub fn new(store: KpiStore) -> Self {
        Self { store }
    }

    /// How often a rise in `kpi_x` co-occurs with a rise in `kpi_y` on the
    /// next sample, and whether `kpi_x` Granger-causes `kpi_y`.
    ///
    /// Unspecified date bounds mean "all available dates"; there is no
    /// default window here.
    pub fn compare(
        &self,
        kpi_x: &str,
        kpi_y: &str,
        site_id: Option<&str>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<String> {
        let df = self.store.load_measurements()?;
        let filtered = RowFilter {
            site_id: site_id.map(String::from),
            start_date: start,
            end_date: end,
            required: vec![
                DATE_COL.to_string(),
                SITE_COL.to_string(),
                kpi_x.to_string(),
                kpi_y.to_string(),
            ],
            ..Default::default()
        }
        .apply(df)?;
        if filtered.height() == 0 {
            return Err(KpiError::PairEmpty {
                kpi_x: kpi_x.to_string(),
                kpi_y: kpi_y.to_string(),
            });
        }

        // Differences are taken over the date-sorted series as a whole; when
        // no site filter is given the sorted order can interleave sites, and
        // the differencing deliberately spans those boundaries. The stable
        // sort keeps that order deterministic.
        let dates = filtered.column(DATE_COL)?;
        let xs_col = filtered.column(kpi_x)?;
        let ys_col = filtered.column(kpi_y)?;
        let mut series: Vec<(NaiveDate, f64, f64)> = Vec::with_capacity(filtered.height());
        for idx in 0..filtered.height() {
            let day = match date_at(dates, idx) {
                Some(day) => day,
                None => continue,
            };
            let x = match f64_at(xs_col, idx) {
                Some(x) => x,
                None => continue,
            };
            let y = match f64_at(ys_col, idx) {
                Some(y) => y,
                None => continue,
            };
            series.push((day, x, y));
        }
        series.sort_by_key(|(day, _, _)| *day);

        let (rising_x, rising_both) = directional_counts(&series);
        let directional_comment = if rising_x == 0 {
            format!("No positive changes in {kpi_x} to evaluate directional effect on {kpi_y}.")
        } else {
            let ratio = rising_both as f64 / rising_x as f64;
            let scope = match site_id {
                Some(site) => format!("for site `{site}`"),
                None => "(all sites)".to_string(),
            };
            let strength = if ratio > LIKELY_THRESHOLD {
                "likely"
            } else {
                "weak"
            };
            format!(
                "When **{kpi_x} increases**, **{kpi_y} increases** {percent:.1}% of the time over the selected period {scope}. This suggests a {strength} directional relationship.",
                percent = ratio * 100.0,
            )
        };

        let ys: Vec<f64> = series.iter().map(|(_, _, y)| *y).collect();
        let xs: Vec<f64> = series.iter().map(|(_, x, _)| *x).collect();
        let outcome = granger::granger_causality(&ys, &xs, DEFAULT_MAX_LAG)?;
        info!(
            kpi_x,
            kpi_y,
            p_value = outcome.best_p_value,
            best_lag = outcome.best_lag,
            "granger causality evaluated"
        );

        let verdict = if outcome.best_p_value < 0.05 {
            format!(
                "Since the p-value is less than 0.05, this suggests that changes in **`{kpi_x}` likely help predict future values of `{kpi_y}`** (i.e., `{kpi_x}` Granger-causes `{kpi_y}`)."
            )
        } else {
            format!(
                "Since the p-value is greater than 0.05, there is **no statistical evidence** that `{kpi_x}` helps predict `{kpi_y}`."
            )
        };
        let granger_comment = format!(
            "**Granger Causality Test**: Examining whether changes in `{kpi_x}` help predict future changes in `{kpi_y}`.\n→ The p-value is **{p:.4}**.\n{verdict}\n",
            p = outcome.best_p_value,
        );

        Ok(format!(
            "{directional_comment}\n\n{granger_comment}Answer the question using the numbers above as supporting evidence."
        ))
    }
}

/// Count samples whose first difference in x is positive, and how many of
/// those also rise in y.
fn directional_counts(series: &[(NaiveDate, f64, f64)]) -> (usize, usize) {
    let mut rising_x = 0usize;
    let mut rising_both = 0usize;
    for ((_, x0, y0), (_, x1, y1)) in series.iter().tuple_windows() {
        let dx = x1 - x0;
        if dx > 0.0 {
            rising_x += 1;
            if y1 - y0 > 0.0 {
                rising_both += 1;
            }
        }
    }
    (rising_x, rising_both)
}
