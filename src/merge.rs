//! Merging partially-deuterated measurements with their controls.
//!
//! The partially-deuterated (PD) table is the join spine: every PD row
//! appears exactly once in the output, whether or not a control matches.
//! Non-deuterated (ND) and fully-deuterated (FD) tables join on the peptide
//! identity (start, end, sequence). Metrics that cannot be computed — no
//! matching control, zero denominator — stay `None` instead of dropping the
//! row or leaking a NaN.

use std::collections::BTreeMap;
use std::io;

use crate::data::model::AggregatedRecord;
use crate::error::{Error, Result};
use crate::measure::Measured;

// ---------------------------------------------------------------------------
// Merged rows
// ---------------------------------------------------------------------------

/// A PD row joined with its controls and the derived uptake metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRecord {
    /// The partially-deuterated row, carried through unmodified (its
    /// exposure included).
    pub peptide: AggregatedRecord,
    /// Deuterium uptake: the vendor-reported value, or centroid mass minus
    /// the ND control mass.
    pub uptake: Option<Measured>,
    /// Uptake of the fully-deuterated control for this peptide.
    pub fd_uptake: Option<Measured>,
    /// Theoretical maximum uptake: non-proline residues minus the
    /// exchange-fast N-terminal amide. Deterministic, no uncertainty.
    pub max_uptake: Option<u32>,
    /// uptake / fd_uptake.
    pub frac_fd_control: Option<Measured>,
    /// uptake / max_uptake.
    pub frac_max_uptake: Option<Measured>,
}

/// Theoretical maximum number of exchangeable backbone amides for a peptide
/// sequence: prolines carry no amide proton and the N-terminal amide
/// back-exchanges too fast to measure.
pub fn max_uptake(sequence: &str) -> u32 {
    let non_proline = sequence.chars().filter(|&c| c != 'P').count();
    non_proline.saturating_sub(1) as u32
}

// ---------------------------------------------------------------------------
// Merge engine
// ---------------------------------------------------------------------------

/// Left-outer join of a PD table against optional ND/FD control tables.
///
/// A control table with more than one row for a peptide identity is
/// rejected with [`Error::AmbiguousControl`] — picking an arbitrary match
/// would silently bias every derived metric. Callers with multi-exposure
/// control tables must filter them down to one row per peptide first.
pub fn merge_controls(
    pd: &[AggregatedRecord],
    nd: Option<&[AggregatedRecord]>,
    fd: Option<&[AggregatedRecord]>,
) -> Result<Vec<MergedRecord>> {
    let nd_map = nd.map(control_map).transpose()?;
    let fd_map = fd.map(control_map).transpose()?;

    let mut merged = Vec::with_capacity(pd.len());
    for row in pd {
        let nd_row = lookup(&nd_map, row);
        let fd_row = lookup(&fd_map, row);

        let nd_mass = nd_row.and_then(|r| r.centroid_mass);
        let uptake = resolve_uptake(row, nd_mass);
        let fd_uptake = fd_row.and_then(|r| resolve_uptake(r, nd_mass));

        let max = (!row.sequence.is_empty()).then(|| max_uptake(&row.sequence));
        let frac_fd_control = match (uptake, fd_uptake) {
            (Some(u), Some(f)) => u.div(f),
            _ => None,
        };
        let frac_max_uptake = match (uptake, max) {
            (Some(u), Some(m)) => u.div_exact(m as f64),
            _ => None,
        };

        merged.push(MergedRecord {
            peptide: row.clone(),
            uptake,
            fd_uptake,
            max_uptake: max,
            frac_fd_control,
            frac_max_uptake,
        });
    }

    log::debug!(
        "merged {} PD rows ({} with FD uptake)",
        merged.len(),
        merged.iter().filter(|m| m.fd_uptake.is_some()).count()
    );
    Ok(merged)
}

/// A row's uptake: vendor-reported if present, else mass minus the ND
/// reference mass.
fn resolve_uptake(row: &AggregatedRecord, nd_mass: Option<Measured>) -> Option<Measured> {
    if let Some(uptake) = row.uptake {
        return Some(uptake);
    }
    match (row.centroid_mass, nd_mass) {
        (Some(mass), Some(reference)) => Some(mass.sub(reference)),
        _ => None,
    }
}

type ControlMap<'a> = BTreeMap<(i32, i32, &'a str), &'a AggregatedRecord>;

fn control_map(table: &[AggregatedRecord]) -> Result<ControlMap<'_>> {
    let mut map = ControlMap::new();
    for row in table {
        if map.insert(row.identity(), row).is_some() {
            return Err(Error::AmbiguousControl {
                start: row.start,
                end: row.end,
                sequence: row.sequence.clone(),
            });
        }
    }
    Ok(map)
}

fn lookup<'a>(
    map: &Option<ControlMap<'a>>,
    row: &'a AggregatedRecord,
) -> Option<&'a AggregatedRecord> {
    map.as_ref()?.get(&row.identity()).copied()
}

// ---------------------------------------------------------------------------
// CSV export
// ---------------------------------------------------------------------------

fn opt(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

/// Write a merged table as OpenHDX CSV.
pub fn write_merged_csv<W: io::Write>(records: &[MergedRecord], writer: W) -> Result<()> {
    let mut w = csv::Writer::from_writer(writer);
    w.write_record([
        "start",
        "end",
        "sequence",
        "state",
        "exposure",
        "centroid_mass",
        "centroid_mass_sd",
        "rt",
        "rt_sd",
        "n_replicates",
        "n_charges",
        "n_clusters",
        "uptake",
        "uptake_sd",
        "fd_uptake",
        "fd_uptake_sd",
        "max_uptake",
        "frac_fd_control",
        "frac_fd_control_sd",
        "frac_max_uptake",
        "frac_max_uptake_sd",
    ])?;

    for m in records {
        let p = &m.peptide;
        w.write_record([
            p.start.to_string(),
            p.end.to_string(),
            p.sequence.clone(),
            p.state.clone(),
            p.exposure.to_string(),
            opt(p.centroid_mass.map(|v| v.value)),
            opt(p.centroid_mass.and_then(|v| v.sd)),
            opt(p.rt.map(|v| v.value)),
            opt(p.rt.and_then(|v| v.sd)),
            p.n_replicates.to_string(),
            p.n_charges.to_string(),
            p.n_clusters.to_string(),
            opt(m.uptake.map(|v| v.value)),
            opt(m.uptake.and_then(|v| v.sd)),
            opt(m.fd_uptake.map(|v| v.value)),
            opt(m.fd_uptake.and_then(|v| v.sd)),
            m.max_uptake.map(|v| v.to_string()).unwrap_or_default(),
            opt(m.frac_fd_control.map(|v| v.value)),
            opt(m.frac_fd_control.and_then(|v| v.sd)),
            opt(m.frac_max_uptake.map(|v| v.value)),
            opt(m.frac_max_uptake.and_then(|v| v.sd)),
        ])?;
    }
    w.flush()?;
    Ok(())
}
