//! Static KPI catalog: the fixed set of measurement channels and their
//! semantic grouping used for related-KPI lookups.

use strsim::jaro_winkler;

/// Every KPI channel carried by the measurement table.
pub const KPI_COLUMNS: [&str; 10] = [
    "RSRP",
    "SINR",
    "DL_Throughput",
    "RTT",
    "UL_Throughput",
    "CPU_Utilization",
    "Call_Drop_Rate",
    "Active_Users",
    "Handover_Success_Rate",
    "Packet_Loss",
];

/// Similarity floor for suggesting a catalog name for an unknown input.
const SUGGESTION_THRESHOLD: f64 = 0.85;

/// Semantic KPI group. Membership partitions the catalog: every KPI belongs
/// to exactly one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KpiGroup {
    Signal,
    Latency,
    Access,
    Stability,
}

impl KpiGroup {
    pub const ALL: [KpiGroup; 4] = [
        KpiGroup::Signal,
        KpiGroup::Latency,
        KpiGroup::Access,
        KpiGroup::Stability,
    ];

    pub fn label(self) -> &'static str {
        match self {
            KpiGroup::Signal => "Signal",
            KpiGroup::Latency => "Latency",
            KpiGroup::Access => "Access",
            KpiGroup::Stability => "Stability",
        }
    }

    pub fn members(self) -> &'static [&'static str] {
        match self {
            KpiGroup::Signal => &["RSRP", "SINR"],
            KpiGroup::Latency => &["DL_Throughput", "UL_Throughput", "RTT"],
            KpiGroup::Access => &["Active_Users", "CPU_Utilization", "Handover_Success_Rate"],
            KpiGroup::Stability => &["Packet_Loss", "Call_Drop_Rate"],
        }
    }
}

/// The group a KPI belongs to, or `None` for names outside the catalog.
pub fn group_of(kpi: &str) -> Option<KpiGroup> {
    KpiGroup::ALL
        .iter()
        .copied()
        .find(|group| group.members().contains(&kpi))
}

pub fn is_known_kpi(name: &str) -> bool {
    KPI_COLUMNS.contains(&name)
}

/// Closest catalog name for a misspelled KPI, if any candidate clears the
/// similarity floor. Matching is case-insensitive Jaro-Winkler.
pub fn closest_kpi(name: &str) -> Option<&'static str> {
    let needle = name.to_lowercase();
    KPI_COLUMNS
        .iter()
        .map(|candidate| (jaro_winkler(&needle, &candidate.to_lowercase()), *candidate))
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
        .map(|(_, candidate)| candidate)
}
