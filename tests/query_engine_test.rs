use netpulse::dataset::{KpiStore, MEASUREMENTS_FILE};
use netpulse::extremes::ExtremeType;
use netpulse::tools::{ToolRequest, ToolRunner};
use polars::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn write_csv(path: &Path, df: &mut DataFrame) {
    let mut file = std::fs::File::create(path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();
}

/// 26 sites, one measurement per day over 2024-01-01..07, plus a closing row
/// per site on 2024-02-29. SITE_003 carries the lowest weekly SINR average
/// (-5.20); SITE_001's DL_Throughput peaks at 170 on 2024-01-07.
fn extremes_fixture() -> (TempDir, KpiStore) {
    let dir = tempfile::tempdir().unwrap();

    let mut dates: Vec<String> = Vec::new();
    let mut sites: Vec<String> = Vec::new();
    let mut sectors: Vec<String> = Vec::new();
    let mut sinr: Vec<f64> = Vec::new();
    let mut dl: Vec<f64> = Vec::new();

    for i in 1..=26u32 {
        let site = format!("SITE_{i:03}");
        let sector = format!("SITE_{i:03}_SECTOR_A");
        for d in 1..=7u32 {
            dates.push(format!("2024-01-{d:02}"));
            sites.push(site.clone());
            sectors.push(sector.clone());
            sinr.push(if i == 3 { -5.20 } else { 0.5 * f64::from(i) });
            dl.push(if i == 1 {
                100.0 + 10.0 * f64::from(d)
            } else {
                100.0 + f64::from(i)
            });
        }
        dates.push("2024-02-29".to_string());
        sites.push(site.clone());
        sectors.push(sector.clone());
        sinr.push(0.5 * f64::from(i));
        dl.push(50.0);
    }

    let mut df = df![
        "Date" => dates,
        "Site_ID" => sites,
        "Sector_ID" => sectors,
        "SINR" => sinr,
        "DL_Throughput" => dl,
    ]
    .unwrap();
    write_csv(&dir.path().join(MEASUREMENTS_FILE), &mut df);

    let store = KpiStore::new(dir.path());
    (dir, store)
}

#[test]
fn describe_reports_span_and_site_count() {
    let (_dir, store) = extremes_fixture();
    let report = ToolRunner::new(store).run(ToolRequest::DescribeKpiDataset { dummy_input: None });

    assert!(report.contains("**KPI Dataset Overview**"), "{report}");
    assert!(report.contains("Date Range: **2024-01-01 to 2024-02-29**"), "{report}");
    assert!(report.contains("- Sites: **26**"), "{report}");
    assert!(report.contains("- Sectors: **26**"), "{report}");
    assert!(report.contains("Available KPIs (2): SINR, DL_Throughput"), "{report}");
    assert!(report.contains("• **SINR**"), "{report}");
    assert!(report.contains("Missing values: 0"), "{report}");
}

#[test]
fn describe_is_idempotent() {
    let (_dir, store) = extremes_fixture();
    let runner = ToolRunner::new(store);
    let first = runner.run(ToolRequest::DescribeKpiDataset { dummy_input: None });
    let second = runner.run(ToolRequest::DescribeKpiDataset { dummy_input: None });
    assert_eq!(first, second);
}

#[test]
fn lowest_weekly_sinr_average_names_site_003() {
    let (_dir, store) = extremes_fixture();
    let report = ToolRunner::new(store).run(ToolRequest::GetSiteKpiExtreme {
        kpi_name: "SINR".to_string(),
        extreme_type: ExtremeType::Lowest,
        start_date: Some("2024-01-01".to_string()),
        end_date: Some("2024-01-07".to_string()),
    });
    assert_eq!(
        report,
        "Between **2024-01-01** and **2024-01-07**, site `SITE_003` had the lowest average **SINR** of **-5.20**."
    );
}

#[test]
fn highest_and_lowest_disagree_when_averages_differ() {
    let (_dir, store) = extremes_fixture();
    let runner = ToolRunner::new(store);
    let highest = runner.run(ToolRequest::GetSiteKpiExtreme {
        kpi_name: "SINR".to_string(),
        extreme_type: ExtremeType::Highest,
        start_date: Some("2024-01-01".to_string()),
        end_date: Some("2024-01-07".to_string()),
    });
    let lowest = runner.run(ToolRequest::GetSiteKpiExtreme {
        kpi_name: "SINR".to_string(),
        extreme_type: ExtremeType::Lowest,
        start_date: Some("2024-01-01".to_string()),
        end_date: Some("2024-01-07".to_string()),
    });
    assert!(highest.contains("SITE_026"), "{highest}");
    assert!(lowest.contains("SITE_003"), "{lowest}");
    assert_ne!(highest, lowest);
}

#[test]
fn two_digit_year_dates_are_accepted() {
    let (_dir, store) = extremes_fixture();
    let report = ToolRunner::new(store).run(ToolRequest::GetSiteKpiExtreme {
        kpi_name: "SINR".to_string(),
        extreme_type: ExtremeType::Lowest,
        start_date: Some("01.01.24".to_string()),
        end_date: Some("07.01.24".to_string()),
    });
    assert!(report.contains("SITE_003"), "{report}");
    assert!(report.contains("-5.20"), "{report}");
}

#[test]
fn peak_day_reports_the_extreme_row_in_window() {
    let (_dir, store) = extremes_fixture();
    let report = ToolRunner::new(store).run(ToolRequest::GetPeakKpiDayForSite {
        site_id: "SITE_001".to_string(),
        kpi_name: "DL_Throughput".to_string(),
        extreme_type: ExtremeType::Highest,
        start_date: Some("2024-01-01".to_string()),
        end_date: Some("2024-01-31".to_string()),
    });
    assert_eq!(
        report,
        "On **2024-01-07**, site `SITE_001` had the highest **DL_Throughput** of **170.00** between 2024-01-01 and 2024-01-31."
    );
}

#[test]
fn peak_day_defaults_to_thirty_days_before_site_max() {
    let (_dir, store) = extremes_fixture();
    let report = ToolRunner::new(store).run(ToolRequest::GetPeakKpiDayForSite {
        site_id: "SITE_001".to_string(),
        kpi_name: "DL_Throughput".to_string(),
        extreme_type: ExtremeType::Highest,
        start_date: None,
        end_date: None,
    });
    // only the 2024-02-29 row falls inside the default window
    assert_eq!(
        report,
        "On **2024-02-29**, site `SITE_001` had the highest **DL_Throughput** of **50.00** between 2024-01-30 and 2024-02-29."
    );
}

#[test]
fn empty_window_yields_the_no_data_report() {
    let (_dir, store) = extremes_fixture();
    let report = ToolRunner::new(store).run(ToolRequest::GetSiteKpiExtreme {
        kpi_name: "SINR".to_string(),
        extreme_type: ExtremeType::Highest,
        start_date: Some("2025-01-01".to_string()),
        end_date: Some("2025-01-07".to_string()),
    });
    assert_eq!(
        report,
        "No data available for `SINR` between 2025-01-01 and 2025-01-07."
    );
}

#[test]
fn unknown_site_yields_the_not_found_report() {
    let (_dir, store) = extremes_fixture();
    let report = ToolRunner::new(store).run(ToolRequest::GetPeakKpiDayForSite {
        site_id: "SITE_999".to_string(),
        kpi_name: "DL_Throughput".to_string(),
        extreme_type: ExtremeType::Highest,
        start_date: None,
        end_date: None,
    });
    assert_eq!(report, "No data found for site `SITE_999`.");
}

#[test]
fn misspelled_kpi_is_rejected_with_a_suggestion() {
    let (_dir, store) = extremes_fixture();
    let report = ToolRunner::new(store).run(ToolRequest::GetSiteKpiExtreme {
        kpi_name: "DL_Troughput".to_string(),
        extreme_type: ExtremeType::Highest,
        start_date: None,
        end_date: None,
    });
    assert!(report.starts_with("Error processing KPI data:"), "{report}");
    assert!(report.contains("DL_Throughput"), "{report}");
}
