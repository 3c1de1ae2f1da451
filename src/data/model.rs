use std::fmt;
use std::io;

use crate::error::Result;
use crate::measure::Measured;

// ---------------------------------------------------------------------------
// Exposure – deuteration time or the full-deuteration marker
// ---------------------------------------------------------------------------

/// Deuteration exposure of a measurement.
///
/// Vendor exports mark fully-deuterated control rows with sentinel tokens
/// ("FD", "Full-D", "MAX"); canonicalization maps those to
/// [`Exposure::FullDeuteration`] so downstream code never has to know the
/// vendor spelling. Needs `Ord`/`Hash` for use as a grouping key, so both
/// are implemented manually over the float bits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Exposure {
    /// Elapsed deuteration time, in the dataset time unit.
    Time(f64),
    /// Fully-deuterated control marker; orders after any finite time.
    FullDeuteration,
}

impl Eq for Exposure {}

impl PartialOrd for Exposure {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Exposure {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use Exposure::*;
        match (self, other) {
            (Time(a), Time(b)) => a.total_cmp(b),
            (Time(_), FullDeuteration) => std::cmp::Ordering::Less,
            (FullDeuteration, Time(_)) => std::cmp::Ordering::Greater,
            (FullDeuteration, FullDeuteration) => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for Exposure {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        if let Exposure::Time(t) = self {
            t.to_bits().hash(state);
        }
    }
}

impl fmt::Display for Exposure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exposure::Time(t) => write!(f, "{t}"),
            Exposure::FullDeuteration => write!(f, "FD"),
        }
    }
}

impl Exposure {
    /// Approximate equality against a time value, absorbing unit-conversion
    /// rounding. The marker never matches a finite time.
    pub fn matches_time(&self, t: f64) -> bool {
        match self {
            Exposure::Time(v) => approx_eq(*v, t),
            Exposure::FullDeuteration => false,
        }
    }

    pub fn is_fd(&self) -> bool {
        matches!(self, Exposure::FullDeuteration)
    }
}

/// Relative float comparison (1e-9), exact at zero.
pub(crate) fn approx_eq(a: f64, b: f64) -> bool {
    if a == b {
        return true;
    }
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs())
}

// ---------------------------------------------------------------------------
// PeptideRecord – one canonical row per (peptide, exposure, replicate, charge)
// ---------------------------------------------------------------------------

/// A canonical peptide measurement row.
///
/// Invariants enforced at parse time: `start <= end`, the sequence length
/// equals `end - start + 1` when a sequence is present, exposure times are
/// non-negative.
#[derive(Debug, Clone, PartialEq)]
pub struct PeptideRecord {
    /// Inclusive residue bounds.
    pub start: i32,
    pub end: i32,
    pub sequence: String,
    pub protein: Option<String>,
    /// Protein-state label as given in the source table.
    pub state: String,
    /// Replicate label (e.g. the source raw-file name); absent for
    /// pre-aggregated exports.
    pub replicate: Option<String>,
    pub exposure: Exposure,
    pub charge: Option<i32>,
    pub centroid_mz: Option<f64>,
    pub centroid_mz_sd: Option<f64>,
    pub centroid_mass: Option<f64>,
    pub centroid_mass_sd: Option<f64>,
    pub rt: Option<f64>,
    pub rt_sd: Option<f64>,
    pub intensity: Option<f64>,
    /// Deuterium uptake as reported by pre-aggregated exports.
    pub uptake: Option<f64>,
    pub uptake_sd: Option<f64>,
    /// Vendor-reported maximum uptake; recomputed from the sequence when
    /// derived metrics are produced.
    pub max_uptake: Option<f64>,
}

impl PeptideRecord {
    /// Peptide identity × exposure grouping key.
    pub fn group_key(&self) -> (i32, i32, Exposure) {
        (self.start, self.end, self.exposure)
    }
}

/// Sort rows into the canonical order: state, exposure, start, end,
/// replicate, charge.
pub fn sort_canonical(records: &mut [PeptideRecord]) {
    records.sort_by(|a, b| {
        (&a.state, a.exposure, a.start, a.end, &a.replicate, a.charge).cmp(&(
            &b.state,
            b.exposure,
            b.start,
            b.end,
            &b.replicate,
            b.charge,
        ))
    });
}

// ---------------------------------------------------------------------------
// AggregatedRecord – one row per (peptide, exposure)
// ---------------------------------------------------------------------------

/// A peptide × exposure row after replicate/charge aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedRecord {
    pub start: i32,
    pub end: i32,
    pub sequence: String,
    pub state: String,
    pub exposure: Exposure,
    pub centroid_mass: Option<Measured>,
    pub rt: Option<Measured>,
    pub uptake: Option<Measured>,
    /// Distinct replicate labels pooled into this row.
    pub n_replicates: u32,
    /// Distinct charge states pooled into this row (0 when the source
    /// records no charge).
    pub n_charges: u32,
    /// Raw isotopic-cluster rows pooled into this row; at least
    /// `n_replicates` when charges are pooled.
    pub n_clusters: u32,
}

impl AggregatedRecord {
    /// Peptide identity key used to join control tables.
    pub fn identity(&self) -> (i32, i32, &str) {
        (self.start, self.end, &self.sequence)
    }
}

// ---------------------------------------------------------------------------
// Canonical CSV export
// ---------------------------------------------------------------------------

fn opt(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

/// Write canonical rows as OpenHDX CSV.
pub fn write_canonical_csv<W: io::Write>(records: &[PeptideRecord], writer: W) -> Result<()> {
    let mut w = csv::Writer::from_writer(writer);
    w.write_record([
        "start",
        "end",
        "sequence",
        "protein",
        "state",
        "replicate",
        "exposure",
        "charge",
        "centroid_mz",
        "centroid_mz_sd",
        "centroid_mass",
        "centroid_mass_sd",
        "rt",
        "rt_sd",
        "intensity",
        "uptake",
        "uptake_sd",
        "max_uptake",
    ])?;

    for r in records {
        w.write_record([
            r.start.to_string(),
            r.end.to_string(),
            r.sequence.clone(),
            r.protein.clone().unwrap_or_default(),
            r.state.clone(),
            r.replicate.clone().unwrap_or_default(),
            r.exposure.to_string(),
            r.charge.map(|c| c.to_string()).unwrap_or_default(),
            opt(r.centroid_mz),
            opt(r.centroid_mz_sd),
            opt(r.centroid_mass),
            opt(r.centroid_mass_sd),
            opt(r.rt),
            opt(r.rt_sd),
            opt(r.intensity),
            opt(r.uptake),
            opt(r.uptake_sd),
            opt(r.max_uptake),
        ])?;
    }
    w.flush()?;
    Ok(())
}
