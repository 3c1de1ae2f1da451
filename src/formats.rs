//! Registry of supported vendor export formats.
//!
//! Each format is one static [`FormatDescriptor`] row: the raw→canonical
//! column map, the tokens that mark a fully-deuterated control, the time
//! unit raw exposure numbers are expressed in, and the handful of quirks
//! some exports need. Supporting a new vendor format means adding a row
//! here — the parser itself is format-agnostic.

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Time units
// ---------------------------------------------------------------------------

/// Unit for exposure (deuteration time) values.
///
/// The dataset-wide target unit defaults to seconds and is threaded
/// explicitly through load calls; formats whose exports use a different
/// unit declare it in their descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeUnit {
    #[default]
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Length of one unit in seconds.
    pub fn seconds(self) -> f64 {
        match self {
            TimeUnit::Seconds => 1.0,
            TimeUnit::Minutes => 60.0,
            TimeUnit::Hours => 3600.0,
            TimeUnit::Days => 86400.0,
        }
    }

    /// Parse a unit suffix as found in exposure strings ("0s", "2min", "1h").
    pub fn from_suffix(suffix: &str) -> Option<TimeUnit> {
        match suffix {
            "s" | "sec" | "secs" | "seconds" => Some(TimeUnit::Seconds),
            "m" | "min" | "mins" | "minutes" => Some(TimeUnit::Minutes),
            "h" | "hr" | "hrs" | "hours" => Some(TimeUnit::Hours),
            "d" | "day" | "days" => Some(TimeUnit::Days),
            _ => None,
        }
    }

    /// Factor converting a value in `self` into `target`.
    pub fn factor_to(self, target: TimeUnit) -> f64 {
        self.seconds() / target.seconds()
    }
}

// ---------------------------------------------------------------------------
// Format descriptors
// ---------------------------------------------------------------------------

/// Whether a format's rows are already one-per-(peptide, exposure).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregated {
    /// Vendor export is pre-aggregated; loading passes rows through.
    Yes,
    /// Raw replicate/charge-level rows; loading aggregates them.
    No,
    /// Aggregated exactly when the table has no replicate column.
    IfNoReplicate,
}

/// Static description of one vendor export format.
#[derive(Debug, Clone, Copy)]
pub struct FormatDescriptor {
    /// Registry tag, as referenced from dataset specifications.
    pub name: &'static str,
    /// Full raw header set identifying this format (checked in registry
    /// order, so more specific variants come first).
    pub signature: &'static [&'static str],
    /// Raw column name → canonical column name.
    pub columns: &'static [(&'static str, &'static str)],
    /// Exposure tokens marking a fully-deuterated control row.
    pub fd_sentinels: &'static [&'static str],
    /// Unit of unsuffixed numeric exposure values; `None` defers to the
    /// dataset time unit.
    pub source_time_unit: Option<TimeUnit>,
    /// Banner lines before the header row (some historical exports).
    pub skip_lines: usize,
    /// Retention time is exported as a "low-high" range to be averaged.
    pub rt_is_range: bool,
    /// Centroid mass must be computed as charge × (m/z − proton mass).
    pub mass_from_mz: bool,
    pub aggregated: Aggregated,
}

const DYNAMX_STATE_COLUMNS: &[(&str, &str)] = &[
    ("Protein", "protein"),
    ("Start", "start"),
    ("End", "end"),
    ("Sequence", "sequence"),
    ("State", "state"),
    ("Exposure", "exposure"),
    ("MaxUptake", "max_uptake"),
    ("Center", "centroid_mz"),
    ("Center SD", "centroid_mz_sd"),
    ("Uptake", "uptake"),
    ("Uptake SD", "uptake_sd"),
    ("RT", "rt"),
    ("RT SD", "rt_sd"),
];

const HDEXAMINER_COLUMNS: &[(&str, &str)] = &[
    ("Protein State", "state"),
    ("Deut Time", "exposure"),
    ("Experiment", "replicate"),
    ("Start", "start"),
    ("End", "end"),
    ("Sequence", "sequence"),
    ("Charge", "charge"),
    ("Exp Cent", "centroid_mz"),
    ("Max Inty", "intensity"),
    ("Actual RT", "rt"),
];

const HDEXAMINER_SENTINELS: &[&str] = &["FD", "Full-D", "MAX"];

/// Registry of supported formats. Order matters for identification:
/// `DynamX_vx_state`'s signature is a subset of `DynamX_v3_state`'s, so the
/// v3 row must be checked first.
pub const FORMATS: &[FormatDescriptor] = &[
    FormatDescriptor {
        name: "DynamX_v3_state",
        signature: &[
            "Protein", "Start", "End", "Sequence", "Modification", "Fragment", "MaxUptake", "MHP",
            "State", "Exposure", "Center", "Center SD", "Uptake", "Uptake SD", "RT", "RT SD",
        ],
        columns: DYNAMX_STATE_COLUMNS,
        fd_sentinels: &[],
        source_time_unit: Some(TimeUnit::Minutes),
        skip_lines: 0,
        rt_is_range: false,
        mass_from_mz: false,
        aggregated: Aggregated::Yes,
    },
    // Historical state export without Modification/Fragment columns.
    FormatDescriptor {
        name: "DynamX_vx_state",
        signature: &[
            "Protein", "Start", "End", "Sequence", "MaxUptake", "MHP", "State", "Exposure",
            "Center", "Center SD", "Uptake", "Uptake SD", "RT", "RT SD",
        ],
        columns: DYNAMX_STATE_COLUMNS,
        fd_sentinels: &[],
        source_time_unit: Some(TimeUnit::Minutes),
        skip_lines: 0,
        rt_is_range: false,
        mass_from_mz: false,
        aggregated: Aggregated::Yes,
    },
    FormatDescriptor {
        name: "DynamX_v3_cluster",
        signature: &[
            "Protein", "Start", "End", "Sequence", "Modification", "Fragment", "MaxUptake", "MHP",
            "State", "Exposure", "File", "z", "RT", "Inten", "Center",
        ],
        columns: &[
            ("Protein", "protein"),
            ("Start", "start"),
            ("End", "end"),
            ("Sequence", "sequence"),
            ("State", "state"),
            ("Exposure", "exposure"),
            ("MaxUptake", "max_uptake"),
            ("File", "replicate"),
            ("z", "charge"),
            ("Center", "centroid_mz"),
            ("Inten", "intensity"),
            ("RT", "rt"),
        ],
        fd_sentinels: &[],
        source_time_unit: Some(TimeUnit::Minutes),
        skip_lines: 0,
        rt_is_range: false,
        mass_from_mz: true,
        aggregated: Aggregated::No,
    },
    FormatDescriptor {
        name: "HDExaminer_v3",
        signature: &[
            "Protein State", "Deut Time", "Experiment", "Start", "End", "Sequence", "Charge",
            "Search RT", "Actual RT", "# Spectra", "Peak Width Da", "m/z Shift Da", "Max Inty",
            "Exp Cent", "Theor Cent", "Score", "Cent Diff", "# Deut", "Deut %", "Confidence",
        ],
        columns: HDEXAMINER_COLUMNS,
        fd_sentinels: HDEXAMINER_SENTINELS,
        source_time_unit: None,
        skip_lines: 0,
        rt_is_range: true,
        mass_from_mz: true,
        aggregated: Aggregated::No,
    },
    // Historical summary export: same table behind a one-line banner.
    FormatDescriptor {
        name: "HDExaminer_v2_summary",
        signature: &[
            "Protein State", "Deut Time", "Experiment", "Start", "End", "Sequence", "Charge",
            "Actual RT", "Max Inty", "Exp Cent", "Score", "Confidence",
        ],
        columns: HDEXAMINER_COLUMNS,
        fd_sentinels: HDEXAMINER_SENTINELS,
        source_time_unit: None,
        skip_lines: 1,
        rt_is_range: true,
        mass_from_mz: true,
        aggregated: Aggregated::No,
    },
    FormatDescriptor {
        name: "OpenHDX",
        signature: &["start", "end", "sequence", "exposure"],
        columns: &[
            ("protein", "protein"),
            ("start", "start"),
            ("end", "end"),
            ("sequence", "sequence"),
            ("state", "state"),
            ("replicate", "replicate"),
            ("exposure", "exposure"),
            ("charge", "charge"),
            ("centroid_mz", "centroid_mz"),
            ("centroid_mz_sd", "centroid_mz_sd"),
            ("centroid_mass", "centroid_mass"),
            ("centroid_mass_sd", "centroid_mass_sd"),
            ("rt", "rt"),
            ("rt_sd", "rt_sd"),
            ("intensity", "intensity"),
            ("uptake", "uptake"),
            ("uptake_sd", "uptake_sd"),
            ("max_uptake", "max_uptake"),
        ],
        fd_sentinels: &["FD"],
        source_time_unit: Some(TimeUnit::Seconds),
        skip_lines: 0,
        rt_is_range: false,
        mass_from_mz: false,
        aggregated: Aggregated::IfNoReplicate,
    },
];

/// Look up a format descriptor by its registry tag.
pub fn lookup(tag: &str) -> Result<&'static FormatDescriptor> {
    FORMATS
        .iter()
        .find(|f| f.name == tag)
        .ok_or_else(|| Error::UnknownFormat(tag.to_string()))
}

/// Identify a format from a raw header row: the first registry entry whose
/// full signature is present. Returns `None` for unrecognized tables.
pub fn identify(headers: &[&str]) -> Option<&'static FormatDescriptor> {
    FORMATS
        .iter()
        .find(|f| f.signature.iter().all(|col| headers.contains(col)))
}
