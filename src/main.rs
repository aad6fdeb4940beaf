use anyhow::Result;
use clap::{Parser, Subcommand};
use netpulse::dataset::KpiStore;
use netpulse::extremes::ExtremeType;
use netpulse::tools::{ToolRequest, ToolRunner};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "netpulse")]
#[command(about = "Telecom KPI analytics query engine")]
struct Args {
    /// Directory holding the KPI CSV datasets
    #[arg(short, long, env = "NETPULSE_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Site with the highest or lowest average KPI in a date window
    SiteExtreme {
        kpi_name: String,
        #[arg(long, default_value = "highest")]
        extreme_type: String,
        #[arg(long)]
        start_date: Option<String>,
        #[arg(long)]
        end_date: Option<String>,
    },
    /// Day on which a site hit its extreme KPI value
    PeakDay {
        site_id: String,
        #[arg(long, default_value = "DL_Throughput")]
        kpi_name: String,
        #[arg(long, default_value = "highest")]
        extreme_type: String,
        #[arg(long)]
        start_date: Option<String>,
        #[arg(long)]
        end_date: Option<String>,
    },
    /// Directional and Granger-causal relationship between two KPIs
    Impact {
        kpi_x: String,
        kpi_y: String,
        #[arg(long)]
        site_id: Option<String>,
        #[arg(long)]
        start_date: Option<String>,
        #[arg(long)]
        end_date: Option<String>,
    },
    /// Summary statistics for the measurement dataset
    Describe,
    /// Anomaly summary for a KPI
    Anomalies {
        kpi_name: String,
        #[arg(long)]
        site_id: Option<String>,
        #[arg(long)]
        sector_id: Option<String>,
        #[arg(long)]
        start_date: Option<String>,
        #[arg(long)]
        end_date: Option<String>,
    },
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    info!(data_dir = %args.data_dir.display(), "netpulse starting");

    let store = KpiStore::new(&args.data_dir);
    let runner = ToolRunner::new(store);

    let request = match args.command {
        Command::SiteExtreme {
            kpi_name,
            extreme_type,
            start_date,
            end_date,
        } => ToolRequest::GetSiteKpiExtreme {
            kpi_name,
            extreme_type: ExtremeType::from_loose(&extreme_type),
            start_date,
            end_date,
        },
        Command::PeakDay {
            site_id,
            kpi_name,
            extreme_type,
            start_date,
            end_date,
        } => ToolRequest::GetPeakKpiDayForSite {
            site_id,
            kpi_name,
            extreme_type: ExtremeType::from_loose(&extreme_type),
            start_date,
            end_date,
        },
        Command::Impact {
            kpi_x,
            kpi_y,
            site_id,
            start_date,
            end_date,
        } => ToolRequest::CompareKpiImpact {
            kpi_x,
            kpi_y,
            site_id,
            start_date,
            end_date,
        },
        Command::Describe => ToolRequest::DescribeKpiDataset { dummy_input: None },
        Command::Anomalies {
            kpi_name,
            site_id,
            sector_id,
            start_date,
            end_date,
        } => ToolRequest::KpiAnomalies {
            kpi_name,
            site_id,
            sector_id,
            start_date,
            end_date,
        },
    };

    println!("{}", runner.run(request));
    Ok(())
}
