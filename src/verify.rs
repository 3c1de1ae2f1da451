//! Cross-checking peptide sequences against the reference protein sequence.
//!
//! Verification is read-only and never fatal: it reports disagreements as
//! data and leaves acting on them to the caller.

use std::collections::BTreeSet;

use crate::dataset::ProteinState;

/// A peptide whose observed sequence disagrees with the reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceMismatch {
    pub start: i32,
    pub end: i32,
    /// Reference residues for this range (empty when the range falls
    /// outside the declared protein bounds).
    pub expected: String,
    pub observed: String,
}

/// Compare observed peptide sequences against
/// `reference[start - n_term ..= end - n_term]`.
///
/// Input is any iterator of (start, end, sequence) rows; tables at every
/// pipeline stage can feed it. The result holds one entry per distinct
/// disagreeing (start, end, observed) triple — a peptide measured at five
/// exposures with one altered residue reports a single mismatch. Rows
/// without a sequence are skipped.
pub fn verify_sequence<'a>(
    peptides: impl IntoIterator<Item = (i32, i32, &'a str)>,
    protein: &ProteinState,
) -> Vec<SequenceMismatch> {
    let reference: Vec<char> = protein.sequence.chars().collect();
    let mut seen = BTreeSet::new();
    let mut mismatches = Vec::new();

    for (start, end, observed) in peptides {
        if observed.is_empty() {
            continue;
        }
        let expected = slice_reference(&reference, protein.n_term, start, end);
        if expected.as_deref() == Some(observed) {
            continue;
        }
        if seen.insert((start, end, observed.to_string())) {
            mismatches.push(SequenceMismatch {
                start,
                end,
                expected: expected.unwrap_or_default(),
                observed: observed.to_string(),
            });
        }
    }
    mismatches
}

fn slice_reference(reference: &[char], n_term: i32, start: i32, end: i32) -> Option<String> {
    let lo = isize::try_from(start - n_term).ok()?;
    let hi = isize::try_from(end - n_term).ok()?;
    if lo < 0 || hi < lo || hi as usize >= reference.len() {
        return None;
    }
    Some(reference[lo as usize..=hi as usize].iter().collect())
}

/// Contiguous coverage regions of a set of (start, end) intervals
/// (inclusive bounds). Adjacent intervals merge; gaps split regions.
pub fn contiguous_regions(intervals: impl IntoIterator<Item = (i32, i32)>) -> Vec<(i32, i32)> {
    let unique: BTreeSet<(i32, i32)> = intervals.into_iter().collect();
    let mut regions: Vec<(i32, i32)> = Vec::new();

    for (start, end) in unique {
        match regions.last_mut() {
            Some((_, current_end)) if start <= *current_end + 1 => {
                *current_end = (*current_end).max(end);
            }
            _ => regions.push((start, end)),
        }
    }
    regions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn protein(sequence: &str, n_term: i32) -> ProteinState {
        ProteinState {
            sequence: sequence.into(),
            n_term,
            c_term: n_term + sequence.chars().count() as i32 - 1,
            oligomeric_state: None,
            mutations: None,
            deletions: None,
            ligand: None,
            structure: None,
        }
    }

    #[test]
    fn agreement_is_silent() {
        let p = protein("MSEQNNTEMT", 1);
        let rows = vec![(1, 5, "MSEQN"), (4, 10, "QNNTEMT")];
        assert!(verify_sequence(rows, &p).is_empty());
    }

    #[test]
    fn one_altered_residue_is_one_mismatch() {
        let p = protein("MSEQNNTEMT", 1);
        // the same corrupted peptide shows up at several exposures
        let rows = vec![(4, 10, "QNNAEMT"), (4, 10, "QNNAEMT"), (1, 5, "MSEQN")];
        let mismatches = verify_sequence(rows, &p);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].start, 4);
        assert_eq!(mismatches[0].end, 10);
        assert_eq!(mismatches[0].expected, "QNNTEMT");
        assert_eq!(mismatches[0].observed, "QNNAEMT");
    }

    #[test]
    fn n_term_offset_is_respected() {
        // Purification-tag numbering: residue numbers start at -2.
        let p = protein("GSHMSEQN", -2);
        assert!(verify_sequence(vec![(-2, 1, "GSHM")], &p).is_empty());
        assert_eq!(verify_sequence(vec![(-2, 1, "GSHA")], &p).len(), 1);
    }

    #[test]
    fn out_of_range_peptide_reports_empty_expected() {
        let p = protein("MSEQN", 1);
        let mismatches = verify_sequence(vec![(4, 8, "QNXXX")], &p);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].expected, "");
    }

    #[test]
    fn coverage_regions() {
        let regions = contiguous_regions(vec![(10, 17), (1, 5), (4, 9), (25, 30)]);
        assert_eq!(regions, vec![(1, 17), (25, 30)]);
    }
}
