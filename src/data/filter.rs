use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::model::{approx_eq, PeptideRecord};
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Filter values: which rows of a canonical table a peptide set selects
// ---------------------------------------------------------------------------

/// A single filter value from a dataset specification: a scalar, or a list
/// of accepted scalars (OR semantics within the list).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<FilterValue>),
}

/// Per-column filter: column name → accepted value(s). Columns combine with
/// AND; a list within one column with OR.
pub type FilterMap = BTreeMap<String, FilterValue>;

/// Apply a filter to a canonical table.
///
/// Yields the matching subset in input order. An empty result is an error —
/// a filter that matches nothing is almost always a mistyped label, and
/// silently passing an empty table downstream would hide that.
pub fn select(records: &[PeptideRecord], filters: &FilterMap) -> Result<Vec<PeptideRecord>> {
    let selected: Vec<PeptideRecord> = records
        .iter()
        .filter(|r| {
            filters
                .iter()
                .all(|(column, value)| matches(r, column, value))
        })
        .cloned()
        .collect();

    if selected.is_empty() {
        return Err(Error::EmptySelection {
            filter: format!("{filters:?}"),
        });
    }
    log::debug!("selected {} of {} rows", selected.len(), records.len());
    Ok(selected)
}

fn matches(record: &PeptideRecord, column: &str, value: &FilterValue) -> bool {
    match value {
        FilterValue::List(values) => values.iter().any(|v| matches(record, column, v)),
        scalar => match column {
            "state" => as_str(scalar) == Some(record.state.as_str()),
            "protein" => as_str(scalar) == record.protein.as_deref(),
            "sequence" => as_str(scalar) == Some(record.sequence.as_str()),
            "replicate" => as_str(scalar) == record.replicate.as_deref(),
            "start" => as_f64(scalar).is_some_and(|v| approx_eq(v, record.start as f64)),
            "end" => as_f64(scalar).is_some_and(|v| approx_eq(v, record.end as f64)),
            "charge" => match record.charge {
                Some(z) => as_f64(scalar).is_some_and(|v| approx_eq(v, z as f64)),
                None => false,
            },
            "exposure" => match scalar {
                // "FD" selects the canonical full-deuteration marker.
                FilterValue::Str(s) => s == "FD" && record.exposure.is_fd(),
                _ => as_f64(scalar).is_some_and(|v| record.exposure.matches_time(v)),
            },
            // Unknown column: matches nothing, which surfaces as
            // EmptySelection with the offending filter attached.
            _ => false,
        },
    }
}

fn as_str(value: &FilterValue) -> Option<&str> {
    match value {
        FilterValue::Str(s) => Some(s),
        _ => None,
    }
}

fn as_f64(value: &FilterValue) -> Option<f64> {
    match value {
        FilterValue::Int(i) => Some(*i as f64),
        FilterValue::Float(f) => Some(*f),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Exposure;

    fn record(state: &str, exposure: Exposure) -> PeptideRecord {
        PeptideRecord {
            start: 1,
            end: 5,
            sequence: "MSEQN".into(),
            protein: None,
            state: state.into(),
            replicate: None,
            exposure,
            charge: None,
            centroid_mz: None,
            centroid_mz_sd: None,
            centroid_mass: None,
            centroid_mass_sd: None,
            rt: None,
            rt_sd: None,
            intensity: None,
            uptake: None,
            uptake_sd: None,
            max_uptake: None,
        }
    }

    fn table() -> Vec<PeptideRecord> {
        vec![
            record("apo", Exposure::Time(0.0)),
            record("apo", Exposure::Time(600.0)),
            record("apo", Exposure::FullDeuteration),
            record("holo", Exposure::Time(600.0)),
        ]
    }

    #[test]
    fn and_across_columns_or_within_list() {
        let rows = table();
        let mut filters = FilterMap::new();
        filters.insert("state".into(), FilterValue::Str("apo".into()));
        filters.insert(
            "exposure".into(),
            FilterValue::List(vec![FilterValue::Float(0.0), FilterValue::Float(600.0)]),
        );
        let selected = select(&rows, &filters).unwrap();
        assert_eq!(selected.len(), 2);
        assert!(selected.iter().all(|r| r.state == "apo"));
    }

    #[test]
    fn fd_marker_selection() {
        let rows = table();
        let mut filters = FilterMap::new();
        filters.insert("exposure".into(), FilterValue::Str("FD".into()));
        let selected = select(&rows, &filters).unwrap();
        assert_eq!(selected.len(), 1);
        assert!(selected[0].exposure.is_fd());
    }

    #[test]
    fn mistyped_label_is_an_error() {
        let rows = table();
        let mut filters = FilterMap::new();
        filters.insert("state".into(), FilterValue::Str("Apo".into()));
        let err = select(&rows, &filters).unwrap_err();
        assert!(matches!(err, Error::EmptySelection { .. }));
    }

    #[test]
    fn empty_filter_selects_everything() {
        let rows = table();
        let selected = select(&rows, &FilterMap::new()).unwrap();
        assert_eq!(selected.len(), rows.len());
    }
}
