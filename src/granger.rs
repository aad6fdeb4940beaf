//! Granger-causality F-test over a pair of aligned series.
//!
//! For each lag L, the test compares two OLS regressions of the response:
//! a restricted model on its own L lags, and an unrestricted model that adds
//! the predictor's L lags. The F statistic on the residual-sum-of-squares
//! reduction is mapped to a p-value through the F distribution; the summary
//! statistic is the minimum p-value across the tested lags.

use crate::error::{KpiError, Result};
use statrs::distribution::{ContinuousCDF, FisherSnedecor};
use tracing::debug;

pub const DEFAULT_MAX_LAG: usize = 2;

/// Residual sums below this are treated as an exact fit.
const RSS_FLOOR: f64 = 1e-12;

#[derive(Debug, Clone, Copy)]
pub struct LagTest {
    pub lag: usize,
    pub f_stat: f64,
    pub p_value: f64,
}

#[derive(Debug, Clone)]
pub struct GrangerOutcome {
    pub best_p_value: f64,
    pub best_lag: usize,
    pub tests: Vec<LagTest>,
}

/// Test whether lagged values of `x` help predict `y`, over lags 1..=`max_lag`.
///
/// The series must hold at least 2 * (max_lag + 1) observations, and every
/// lag's unrestricted regression must retain at least one denominator degree
/// of freedom; otherwise `InsufficientObservations` is returned.
pub fn granger_causality(y: &[f64], x: &[f64], max_lag: usize) -> Result<GrangerOutcome> {
    let n = y.len().min(x.len());
    let required = 2 * (max_lag + 1);
    if n < required {
        return Err(KpiError::InsufficientObservations {
            required,
            actual: n,
        });
    }

    let mut tests = Vec::with_capacity(max_lag);
    for lag in 1..=max_lag {
        let test = lag_f_test(&y[..n], &x[..n], lag)?;
        debug!(
            lag,
            f_stat = test.f_stat,
            p_value = test.p_value,
            "granger lag tested"
        );
        tests.push(test);
    }

    let best = tests
        .iter()
        .copied()
        .min_by(|a, b| a.p_value.total_cmp(&b.p_value))
        .ok_or_else(|| KpiError::Numerical("no lags tested".to_string()))?;
    Ok(GrangerOutcome {
        best_p_value: best.p_value,
        best_lag: best.lag,
        tests,
    })
}

fn lag_f_test(y: &[f64], x: &[f64], lag: usize) -> Result<LagTest> {
    let n_obs = y.len() - lag;
    let k_unrestricted = 2 * lag + 1;
    if n_obs <= k_unrestricted {
        return Err(KpiError::InsufficientObservations {
            required: 3 * lag + 2,
            actual: y.len(),
        });
    }

    let mut targets = Vec::with_capacity(n_obs);
    let mut restricted_rows = Vec::with_capacity(n_obs);
    let mut unrestricted_rows = Vec::with_capacity(n_obs);
    for t in lag..y.len() {
        targets.push(y[t]);
        let mut row = Vec::with_capacity(k_unrestricted);
        row.push(1.0);
        for back in 1..=lag {
            row.push(y[t - back]);
        }
        restricted_rows.push(row.clone());
        for back in 1..=lag {
            row.push(x[t - back]);
        }
        unrestricted_rows.push(row);
    }

    let rss_restricted = ols_rss(&targets, &restricted_rows)?;
    let rss_unrestricted = ols_rss(&targets, &unrestricted_rows)?;

    let df_num = lag as f64;
    let df_denom = (n_obs - k_unrestricted) as f64;
    let improvement = (rss_restricted - rss_unrestricted).max(0.0);
    let f_stat = (improvement / df_num) / (rss_unrestricted / df_denom);

    let p_value = if rss_unrestricted < RSS_FLOOR {
        // exact unrestricted fit: decisive when the restricted model is
        // worse, uninformative when both fit exactly
        if improvement < RSS_FLOOR {
            1.0
        } else {
            0.0
        }
    } else {
        let dist = FisherSnedecor::new(df_num, df_denom)
            .map_err(|e| KpiError::Numerical(e.to_string()))?;
        1.0 - dist.cdf(f_stat)
    };

    Ok(LagTest {
        lag,
        f_stat,
        p_value,
    })
}

/// Residual sum of squares of the least-squares fit of `targets` on `rows`,
/// solved via the normal equations.
fn ols_rss(targets: &[f64], rows: &[Vec<f64>]) -> Result<f64> {
    let k = rows[0].len();
    let mut xtx = vec![vec![0.0_f64; k]; k];
    let mut xty = vec![0.0_f64; k];
    for (row, &target) in rows.iter().zip(targets) {
        for i in 0..k {
            xty[i] += row[i] * target;
            for j in 0..k {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }
    let beta = solve_linear_system(xtx, xty)?;
    let rss = rows
        .iter()
        .zip(targets)
        .map(|(row, &target)| {
            let fitted: f64 = row.iter().zip(&beta).map(|(a, b)| a * b).sum();
            (target - fitted).powi(2)
        })
        .sum();
    Ok(rss)
}

/// Gaussian elimination with partial pivoting.
fn solve_linear_system(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    for pivot_col in 0..n {
        let pivot_row = (pivot_col..n)
            .max_by(|&i, &j| a[i][pivot_col].abs().total_cmp(&a[j][pivot_col].abs()))
            .ok_or_else(|| KpiError::Numerical("empty system".to_string()))?;
        if a[pivot_row][pivot_col].abs() < 1e-12 {
            return Err(KpiError::Numerical(
                "singular design matrix in lag regression".to_string(),
            ));
        }
        a.swap(pivot_col, pivot_row);
        b.swap(pivot_col, pivot_row);
        for row in pivot_col + 1..n {
            let factor = a[row][pivot_col] / a[pivot_col][pivot_col];
            if factor == 0.0 {
                continue;
            }
            for col in pivot_col..n {
                a[row][col] -= factor * a[pivot_col][col];
            }
            b[row] -= factor * b[pivot_col];
        }
    }

    let mut solution = vec![0.0_f64; n];
    for i in (0..n).rev() {
        let mut acc = b[i];
        for j in i + 1..n {
            acc -= a[i][j] * solution[j];
        }
        solution[i] = acc / a[i][i];
    }
    Ok(solution)
}
