//! Replicate and charge-state aggregation.
//!
//! Raw cluster-level tables carry one row per (peptide, exposure, replicate,
//! charge). Aggregation pools those into one row per (peptide, exposure)
//! with an unweighted mean, a sample standard deviation, and the counts that
//! describe how much raw evidence went into the row. Pre-aggregated vendor
//! exports skip the pooling and keep their vendor-reported dispersions.

use std::collections::{BTreeMap, BTreeSet};

use crate::data::model::{AggregatedRecord, Exposure, PeptideRecord};
use crate::error::{Error, Result};
use crate::formats::{Aggregated, FormatDescriptor};
use crate::measure::Measured;

/// Aggregate canonical rows into one row per (peptide, exposure).
///
/// Replicates and charge states observed at one exposure are pooled
/// together; `n_replicates` counts distinct replicate labels, `n_charges`
/// distinct charge states, and `n_clusters` every pooled raw row, so
/// `n_clusters >= n_replicates` whenever charges are pooled.
///
/// Rows sharing (start, end) but disagreeing on the sequence are never
/// coalesced — that is an [`Error::AmbiguousPeptideIdentity`].
pub fn aggregate(records: &[PeptideRecord]) -> Result<Vec<AggregatedRecord>> {
    let mut output = Vec::new();
    for ((start, end, exposure), rows) in group(records)? {
        let masses: Vec<f64> = rows.iter().filter_map(|r| r.centroid_mass).collect();
        let uptakes: Vec<f64> = rows.iter().filter_map(|r| r.uptake).collect();
        let rts: Vec<f64> = rows.iter().filter_map(|r| r.rt).collect();

        output.push(AggregatedRecord {
            start,
            end,
            sequence: rows[0].sequence.clone(),
            state: rows[0].state.clone(),
            exposure,
            centroid_mass: Measured::from_samples(&masses),
            rt: Measured::from_samples(&rts),
            uptake: Measured::from_samples(&uptakes),
            n_replicates: distinct(rows.iter().map(|r| r.replicate.as_deref())).max(1) as u32,
            n_charges: rows.iter().filter_map(|r| r.charge).collect::<BTreeSet<_>>().len() as u32,
            n_clusters: rows.len() as u32,
        });
    }
    Ok(output)
}

/// Pass pre-aggregated rows through unchanged, keeping vendor-reported
/// standard deviations instead of recomputing them from a single row.
pub fn passthrough(records: &[PeptideRecord]) -> Result<Vec<AggregatedRecord>> {
    // Grouping is only used to reject ambiguous identities; duplicate rows
    // for one (peptide, exposure) are kept and surface later when they
    // matter (e.g. as an ambiguous control at merge time).
    let _ = group(records)?;

    Ok(records
        .iter()
        .map(|r| AggregatedRecord {
            start: r.start,
            end: r.end,
            sequence: r.sequence.clone(),
            state: r.state.clone(),
            exposure: r.exposure,
            centroid_mass: r.centroid_mass.map(|v| Measured::new(v, r.centroid_mass_sd)),
            rt: r.rt.map(|v| Measured::new(v, r.rt_sd)),
            uptake: r.uptake.map(|v| Measured::new(v, r.uptake_sd)),
            n_replicates: 1,
            n_charges: r.charge.is_some() as u32,
            n_clusters: 1,
        })
        .collect())
}

/// Aggregate or pass through, as the format descriptor dictates.
pub fn aggregate_for(
    format: &FormatDescriptor,
    records: &[PeptideRecord],
) -> Result<Vec<AggregatedRecord>> {
    let pre_aggregated = match format.aggregated {
        Aggregated::Yes => true,
        Aggregated::No => false,
        Aggregated::IfNoReplicate => records.iter().all(|r| r.replicate.is_none()),
    };
    if pre_aggregated {
        log::debug!("{} rows are pre-aggregated, passing through", format.name);
        passthrough(records)
    } else {
        aggregate(records)
    }
}

type Grouped<'a> = BTreeMap<(i32, i32, Exposure), Vec<&'a PeptideRecord>>;

fn group(records: &[PeptideRecord]) -> Result<Grouped<'_>> {
    let mut groups: Grouped = BTreeMap::new();
    for r in records {
        groups.entry(r.group_key()).or_default().push(r);
    }

    for ((start, end, _), rows) in &groups {
        let sequences: BTreeSet<&str> = rows.iter().map(|r| r.sequence.as_str()).collect();
        if sequences.len() > 1 {
            return Err(Error::AmbiguousPeptideIdentity {
                start: *start,
                end: *end,
                sequences: sequences.into_iter().map(str::to_string).collect(),
            });
        }
        let states: BTreeSet<&str> = rows.iter().map(|r| r.state.as_str()).collect();
        if states.len() > 1 {
            log::warn!(
                "pooling rows from {} states for peptide {start}..={end}",
                states.len()
            );
        }
    }
    Ok(groups)
}

fn distinct<'a>(labels: impl Iterator<Item = Option<&'a str>>) -> usize {
    labels.flatten().collect::<BTreeSet<_>>().len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(
        start: i32,
        end: i32,
        seq: &str,
        exposure: f64,
        replicate: &str,
        charge: i32,
        mass: f64,
    ) -> PeptideRecord {
        PeptideRecord {
            start,
            end,
            sequence: seq.into(),
            protein: None,
            state: "apo".into(),
            replicate: Some(replicate.into()),
            exposure: Exposure::Time(exposure),
            charge: Some(charge),
            centroid_mz: None,
            centroid_mz_sd: None,
            centroid_mass: Some(mass),
            centroid_mass_sd: None,
            rt: None,
            rt_sd: None,
            intensity: None,
            uptake: None,
            uptake_sd: None,
            max_uptake: None,
        }
    }

    #[test]
    fn pools_replicates_and_charges() {
        // Two replicates, one of them observed at two charge states.
        let rows = vec![
            row(1, 5, "MSEQN", 60.0, "rep1", 2, 500.0),
            row(1, 5, "MSEQN", 60.0, "rep1", 3, 502.0),
            row(1, 5, "MSEQN", 60.0, "rep2", 2, 501.0),
        ];
        let agg = aggregate(&rows).unwrap();
        assert_eq!(agg.len(), 1);
        let r = &agg[0];
        assert_eq!(r.n_replicates, 2);
        assert_eq!(r.n_charges, 2);
        assert_eq!(r.n_clusters, 3);
        assert!(r.n_clusters >= r.n_replicates);

        let mass = r.centroid_mass.unwrap();
        assert!((mass.value - 501.0).abs() < 1e-12);
        // sample sd of [500, 502, 501] = 1.0
        assert!((mass.sd.unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn size_one_group_has_undefined_sd() {
        let rows = vec![row(1, 5, "MSEQN", 60.0, "rep1", 2, 500.0)];
        let agg = aggregate(&rows).unwrap();
        assert_eq!(agg[0].centroid_mass.unwrap().sd, None);
        assert_eq!(agg[0].n_replicates, 1);
    }

    #[test]
    fn exposures_stay_separate() {
        let rows = vec![
            row(1, 5, "MSEQN", 60.0, "rep1", 2, 500.0),
            row(1, 5, "MSEQN", 600.0, "rep1", 2, 503.0),
        ];
        let agg = aggregate(&rows).unwrap();
        assert_eq!(agg.len(), 2);
    }

    #[test]
    fn conflicting_sequences_are_rejected() {
        let rows = vec![
            row(1, 5, "MSEQN", 60.0, "rep1", 2, 500.0),
            row(1, 5, "MSEQA", 60.0, "rep2", 2, 501.0),
        ];
        let err = aggregate(&rows).unwrap_err();
        assert!(matches!(err, Error::AmbiguousPeptideIdentity { .. }));
    }

    #[test]
    fn passthrough_keeps_vendor_sd() {
        let mut r = row(1, 5, "MSEQN", 60.0, "rep1", 2, 500.0);
        r.replicate = None;
        r.charge = None;
        r.uptake = Some(2.5);
        r.uptake_sd = Some(0.08);
        let agg = passthrough(&[r]).unwrap();
        let u = agg[0].uptake.unwrap();
        assert_eq!(u.value, 2.5);
        assert_eq!(u.sd, Some(0.08));
        assert_eq!(agg[0].n_charges, 0);
    }
}
