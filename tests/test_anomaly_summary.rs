use netpulse::dataset::{KpiStore, ANOMALIES_FILE, MEASUREMENTS_FILE};
use netpulse::tools::{ToolRequest, ToolRunner};
use polars::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn write_csv(path: &Path, df: &mut DataFrame) {
    let mut file = std::fs::File::create(path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();
}

/// SITE_010 measurements over 2024-01-01..10 with RSRP alternating between
/// -90 and -110 (baseline mean exactly -100). Anomaly rows: three RSRP
/// events (one above, two below baseline, peaking on 2024-01-05), SINR
/// events on the same days plus one outside them, and one DL_Throughput
/// event that belongs to a different group.
fn anomaly_fixture() -> (TempDir, KpiStore) {
    let dir = tempfile::tempdir().unwrap();

    let mut dates: Vec<String> = Vec::new();
    let mut sites: Vec<String> = Vec::new();
    let mut sectors: Vec<String> = Vec::new();
    let mut rsrp: Vec<f64> = Vec::new();
    let mut sinr: Vec<f64> = Vec::new();

    for d in 1..=10u32 {
        dates.push(format!("2024-01-{d:02}"));
        sites.push("SITE_010".to_string());
        sectors.push("SITE_010_SECTOR_A".to_string());
        rsrp.push(if d % 2 == 1 { -90.0 } else { -110.0 });
        sinr.push(5.0 + f64::from(d) * 0.1);
    }

    let mut measurements = df![
        "Date" => dates,
        "Site_ID" => sites,
        "Sector_ID" => sectors,
        "RSRP" => rsrp,
        "SINR" => sinr,
    ]
    .unwrap();
    write_csv(&dir.path().join(MEASUREMENTS_FILE), &mut measurements);

    let mut anomalies = df![
        "Date" => [
            "2024-01-03",
            "2024-01-05",
            "2024-01-05",
            "2024-01-03",
            "2024-01-05",
            "2024-01-20",
            "2024-01-03",
        ],
        "Site_ID" => [
            "SITE_010", "SITE_010", "SITE_010", "SITE_010", "SITE_010", "SITE_010", "SITE_010",
        ],
        "Sector_ID" => [
            "SITE_010_SECTOR_A",
            "SITE_010_SECTOR_A",
            "SITE_010_SECTOR_A",
            "SITE_010_SECTOR_A",
            "SITE_010_SECTOR_A",
            "SITE_010_SECTOR_A",
            "SITE_010_SECTOR_A",
        ],
        "KPI" => [
            "RSRP", "RSRP", "RSRP", "SINR", "SINR", "SINR", "DL_Throughput",
        ],
        "Value" => [-80.0, -120.0, -125.0, 2.0, 1.0, 9.5, 40.0],
    ]
    .unwrap();
    write_csv(&dir.path().join(ANOMALIES_FILE), &mut anomalies);

    let store = KpiStore::new(dir.path());
    (dir, store)
}

#[test]
fn rsrp_summary_reports_counts_baseline_and_partitions() {
    let (_dir, store) = anomaly_fixture();
    let report = ToolRunner::new(store).run(ToolRequest::KpiAnomalies {
        kpi_name: "RSRP".to_string(),
        site_id: None,
        sector_id: None,
        start_date: None,
        end_date: None,
    });

    assert!(report.contains("**Anomaly Summary for KPI: `RSRP`**"), "{report}");
    assert!(report.contains("Total anomalies detected: **3**"), "{report}");
    assert!(report.contains("Baseline average of `RSRP`: **-100.00**"), "{report}");
    assert!(report.contains("Avg anomaly value **above** baseline: **-80.00**"), "{report}");
    assert!(report.contains("Avg anomaly value **below** baseline: **-122.50**"), "{report}");
    assert!(report.contains("- Group: **Signal**"), "{report}");
    assert!(report.contains("- Related KPIs: RSRP, SINR"), "{report}");
    assert!(
        report.contains("Most anomalies for `RSRP` occurred on **2024-01-05** with **2 anomalies**."),
        "{report}"
    );
}

#[test]
fn co_occurrence_counts_same_group_kpis_only() {
    let (_dir, store) = anomaly_fixture();
    let report = ToolRunner::new(store).run(ToolRequest::KpiAnomalies {
        kpi_name: "RSRP".to_string(),
        site_id: None,
        sector_id: None,
        start_date: None,
        end_date: None,
    });

    // SINR anomalies land on both RSRP anomaly days; the 2024-01-20 event
    // and the latency-group DL_Throughput event must not be counted
    assert!(report.contains("- `SINR`: 2 times"), "{report}");
    assert!(!report.contains("`DL_Throughput`:"), "{report}");
}

#[test]
fn zero_anomaly_rows_yield_exactly_the_no_anomaly_report() {
    let (_dir, store) = anomaly_fixture();
    let report = ToolRunner::new(store).run(ToolRequest::KpiAnomalies {
        kpi_name: "Call_Drop_Rate".to_string(),
        site_id: None,
        sector_id: None,
        start_date: None,
        end_date: None,
    });
    assert_eq!(
        report,
        "No anomaly data found for `Call_Drop_Rate` with given filters."
    );
}

#[test]
fn anomalies_without_base_rows_yield_the_no_base_report() {
    let (_dir, store) = anomaly_fixture();
    // the 2024-01-20 SINR anomaly exists, but no measurement rows fall in
    // this window
    let report = ToolRunner::new(store).run(ToolRequest::KpiAnomalies {
        kpi_name: "SINR".to_string(),
        site_id: Some("SITE_010".to_string()),
        sector_id: None,
        start_date: Some("2024-01-20".to_string()),
        end_date: Some("2024-01-25".to_string()),
    });
    assert_eq!(report, "No base KPI data found to compare anomalies.");
}

#[test]
fn entity_filter_excludes_other_sites() {
    let (_dir, store) = anomaly_fixture();
    let report = ToolRunner::new(store).run(ToolRequest::KpiAnomalies {
        kpi_name: "RSRP".to_string(),
        site_id: Some("SITE_099".to_string()),
        sector_id: None,
        start_date: None,
        end_date: None,
    });
    assert_eq!(
        report,
        "No anomaly data found for `RSRP` with given filters."
    );
}

#[test]
fn anomaly_summary_is_idempotent() {
    let (_dir, store) = anomaly_fixture();
    let runner = ToolRunner::new(store);
    let request = || ToolRequest::KpiAnomalies {
        kpi_name: "RSRP".to_string(),
        site_id: Some("SITE_010".to_string()),
        sector_id: Some("SITE_010_SECTOR_A".to_string()),
        start_date: Some("2024-01-01".to_string()),
        end_date: Some("2024-02-29".to_string()),
    };
    assert_eq!(runner.run(request()), runner.run(request()));
}
