//! In-memory representation of a dataset specification.
//!
//! The specification document (JSON here; the YAML syntax layer lives
//! outside this crate) declares the shared data-file registry, the protein
//! states, and per-state peptide sets. This module deserializes it, checks
//! *semantic* completeness — referenced ids exist, formats are registered,
//! protein sequences match their residue ranges — and drives the
//! parse → select → aggregate → merge pipeline.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::aggregate::aggregate_for;
use crate::data::filter::{select, FilterMap};
use crate::data::model::{AggregatedRecord, PeptideRecord};
use crate::data::parser::parse_table;
use crate::error::{Error, Result};
use crate::formats::{lookup, FormatDescriptor, TimeUnit};
use crate::merge::{merge_controls, MergedRecord};

// ---------------------------------------------------------------------------
// Specification model
// ---------------------------------------------------------------------------

/// Experimental deuteration type of a peptide set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeuterationType {
    NonDeuterated,
    FullyDeuterated,
    PartiallyDeuterated,
}

impl fmt::Display for DeuterationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeuterationType::NonDeuterated => "non_deuterated",
            DeuterationType::FullyDeuterated => "fully_deuterated",
            DeuterationType::PartiallyDeuterated => "partially_deuterated",
        };
        f.write_str(s)
    }
}

/// One entry in the shared data-file registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFileSpec {
    pub filename: PathBuf,
    /// Format tag, resolved against the format registry.
    pub format: String,
}

/// Experimental conditions attached to a peptide set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PeptideMetadata {
    /// pH as read, uncorrected.
    #[serde(rename = "pH", default, skip_serializing_if = "Option::is_none")]
    pub ph: Option<f64>,
    /// Temperature in Kelvin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Deuterium percentage of the labelling buffer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d_percentage: Option<f64>,
}

/// A peptide set: one deuteration type's slice of a shared data file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeptideSet {
    /// Id into the dataset's data-file registry.
    pub data_file: String,
    /// Format tag override; defaults to the registry entry's format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub deuteration_type: DeuterationType,
    /// Canonical column → accepted value(s); AND across columns, OR within
    /// a list.
    #[serde(default)]
    pub filters: FilterMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PeptideMetadata>,
}

impl PeptideSet {
    /// Parse and filter raw table content into this set's canonical rows.
    ///
    /// Pure over (content, filter spec): repeated calls on unmodified input
    /// yield identical tables, and nothing is cached.
    pub fn load(
        &self,
        content: &str,
        format: &FormatDescriptor,
        time_unit: TimeUnit,
    ) -> Result<Vec<PeptideRecord>> {
        let records = parse_table(content, format, time_unit)?;
        select(&records, &self.filters)
    }
}

/// An inclusive residue range (e.g. an engineered deletion).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidueRange {
    pub start: i32,
    pub end: i32,
}

impl ResidueRange {
    pub fn len(&self) -> usize {
        (self.end - self.start + 1).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Protein information for one state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProteinState {
    /// Amino acid sequence, deletions excised.
    pub sequence: String,
    /// Residue number of the N-terminal residue; can be negative for
    /// purification tags.
    pub n_term: i32,
    pub c_term: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oligomeric_state: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutations: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletions: Option<Vec<ResidueRange>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ligand: Option<String>,
    /// Opaque reference to a structural model (resolved elsewhere).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<String>,
}

impl ProteinState {
    /// Total residues removed by declared deletions.
    pub fn deleted_residues(&self) -> usize {
        self.deletions
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(ResidueRange::len)
            .sum()
    }

    /// Check the sequence length against the declared residue range.
    pub fn validate(&self) -> Result<()> {
        let len = self.sequence.chars().count();
        let deleted = self.deleted_residues();
        let expected = (self.c_term - self.n_term + 1) as i64 - deleted as i64;
        if len as i64 != expected {
            return Err(Error::SequenceLengthMismatch {
                len,
                n_term: self.n_term,
                c_term: self.c_term,
                deleted,
            });
        }
        Ok(())
    }
}

/// One HDX state: a protein variant/condition with its peptide sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub protein: ProteinState,
    pub peptides: Vec<PeptideSet>,
}

impl State {
    /// The state's peptide set of a given deuteration type, if declared.
    pub fn peptides_of(&self, deuteration_type: DeuterationType) -> Option<&PeptideSet> {
        self.peptides
            .iter()
            .find(|p| p.deuteration_type == deuteration_type)
    }
}

/// A complete dataset specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Shared, read-only data files, referenced by id from peptide sets.
    pub data_files: BTreeMap<String, DataFileSpec>,
    pub states: Vec<State>,
}

impl Dataset {
    /// Deserialize a specification from JSON and validate its semantics.
    pub fn from_json(json: &str) -> Result<Dataset> {
        let dataset: Dataset = serde_json::from_str(json)?;
        dataset.validate()?;
        Ok(dataset)
    }

    /// Semantic validation: every referenced data-file id exists, every
    /// format tag is registered, protein sequences match their residue
    /// ranges, and no state declares two sets of one deuteration type.
    pub fn validate(&self) -> Result<()> {
        for state in &self.states {
            state.protein.validate()?;

            let mut seen = BTreeSet::new();
            for set in &state.peptides {
                if !self.data_files.contains_key(&set.data_file) {
                    return Err(Error::MissingDataFile {
                        id: set.data_file.clone(),
                    });
                }
                self.format_for(set)?;
                if !seen.insert(set.deuteration_type) {
                    return Err(Error::DuplicatePeptideSet {
                        state: state.name.clone(),
                        deuteration_type: set.deuteration_type,
                    });
                }
            }
        }
        Ok(())
    }

    /// State names, in declaration order.
    pub fn state_names(&self) -> Vec<&str> {
        self.states.iter().map(|s| s.name.as_str()).collect()
    }

    /// Look up a state by name.
    pub fn state(&self, name: &str) -> Result<&State> {
        self.states
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| Error::UnknownState(name.to_string()))
    }

    /// Resolve a peptide set's format descriptor (set override first, then
    /// the data-file registry entry).
    pub fn format_for(&self, set: &PeptideSet) -> Result<&'static FormatDescriptor> {
        let tag = match &set.format {
            Some(tag) => tag,
            None => {
                &self
                    .data_files
                    .get(&set.data_file)
                    .ok_or_else(|| Error::MissingDataFile {
                        id: set.data_file.clone(),
                    })?
                    .format
            }
        };
        lookup(tag)
    }

    /// Load one peptide set's canonical rows from disk.
    ///
    /// Reads the referenced file fresh on every call (files are shared and
    /// read-only; nothing is cached) and applies the set's filters.
    pub fn load_peptides(
        &self,
        data_dir: &Path,
        set: &PeptideSet,
        time_unit: TimeUnit,
    ) -> Result<Vec<PeptideRecord>> {
        let file = self
            .data_files
            .get(&set.data_file)
            .ok_or_else(|| Error::MissingDataFile {
                id: set.data_file.clone(),
            })?;
        let format = self.format_for(set)?;

        let path = data_dir.join(&file.filename);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::MissingDataFile {
                    id: set.data_file.clone(),
                }
            } else {
                Error::Io(e)
            }
        })?;

        set.load(&content, format, time_unit)
    }

    /// Load one peptide set and aggregate it (or pass it through when the
    /// format is pre-aggregated).
    pub fn load_aggregated(
        &self,
        data_dir: &Path,
        set: &PeptideSet,
        time_unit: TimeUnit,
    ) -> Result<Vec<AggregatedRecord>> {
        let format = self.format_for(set)?;
        let records = self.load_peptides(data_dir, set, time_unit)?;
        aggregate_for(format, &records)
    }

    /// Load every peptide set of a state, isolating failures: one set's
    /// parse error never aborts its siblings.
    pub fn load_state(
        &self,
        data_dir: &Path,
        state: &State,
        time_unit: TimeUnit,
    ) -> Vec<(DeuterationType, Result<Vec<AggregatedRecord>>)> {
        state
            .peptides
            .iter()
            .map(|set| {
                let loaded = self.load_aggregated(data_dir, set, time_unit);
                if let Err(e) = &loaded {
                    log::warn!(
                        "state {:?}: failed to load {} peptides: {e}",
                        state.name,
                        set.deuteration_type
                    );
                }
                (set.deuteration_type, loaded)
            })
            .collect()
    }

    /// Compute uptake metrics for a state: PD rows merged against whatever
    /// ND/FD controls the state declares.
    ///
    /// The PD set is required; missing controls degrade to undefined
    /// derived values rather than failing.
    pub fn uptake_metrics(
        &self,
        data_dir: &Path,
        state: &State,
        time_unit: TimeUnit,
    ) -> Result<Vec<MergedRecord>> {
        let pd_set = state
            .peptides_of(DeuterationType::PartiallyDeuterated)
            .ok_or(Error::MissingControl(DeuterationType::PartiallyDeuterated))?;
        let pd = self.load_aggregated(data_dir, pd_set, time_unit)?;

        let nd = state
            .peptides_of(DeuterationType::NonDeuterated)
            .map(|set| self.load_aggregated(data_dir, set, time_unit))
            .transpose()?;
        let fd = state
            .peptides_of(DeuterationType::FullyDeuterated)
            .map(|set| self.load_aggregated(data_dir, set, time_unit))
            .transpose()?;

        merge_controls(&pd, nd.as_deref(), fd.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC: &str = r#"{
        "description": "SecB test dataset",
        "data_files": {
            "secb_state": { "filename": "SecB.csv", "format": "DynamX_v3_state" }
        },
        "states": [
            {
                "name": "SecB WT apo",
                "protein": {
                    "sequence": "MSEQNNTEMT",
                    "n_term": 1,
                    "c_term": 10,
                    "oligomeric_state": 4
                },
                "peptides": [
                    {
                        "data_file": "secb_state",
                        "deuteration_type": "partially_deuterated",
                        "filters": { "state": "SecB WT apo" },
                        "metadata": { "pH": 8.0, "temperature": 303.15, "d_percentage": 90.0 }
                    },
                    {
                        "data_file": "secb_state",
                        "deuteration_type": "fully_deuterated",
                        "filters": { "state": "Full deuteration control" }
                    }
                ]
            }
        ]
    }"#;

    #[test]
    fn specification_round_trip() {
        let ds = Dataset::from_json(SPEC).unwrap();
        assert_eq!(ds.state_names(), vec!["SecB WT apo"]);

        let state = ds.state("SecB WT apo").unwrap();
        let pd = state
            .peptides_of(DeuterationType::PartiallyDeuterated)
            .unwrap();
        assert_eq!(pd.data_file, "secb_state");
        assert_eq!(pd.metadata.as_ref().unwrap().ph, Some(8.0));
        assert!(state.peptides_of(DeuterationType::NonDeuterated).is_none());
        assert!(matches!(
            ds.state("SecB WT"),
            Err(Error::UnknownState(_))
        ));
    }

    #[test]
    fn sequence_length_invariant() {
        let mut ds = Dataset::from_json(SPEC).unwrap();
        ds.states[0].protein.c_term = 11;
        assert!(matches!(
            ds.validate(),
            Err(Error::SequenceLengthMismatch { .. })
        ));

        // A declared deletion accounts for the shortfall.
        ds.states[0].protein.deletions = Some(vec![ResidueRange { start: 4, end: 4 }]);
        ds.validate().unwrap();
    }

    #[test]
    fn unknown_format_and_missing_file_are_fatal() {
        let mut ds = Dataset::from_json(SPEC).unwrap();
        ds.data_files.get_mut("secb_state").unwrap().format = "DynamX_v9".into();
        assert!(matches!(ds.validate(), Err(Error::UnknownFormat(_))));

        let mut ds = Dataset::from_json(SPEC).unwrap();
        ds.states[0].peptides[0].data_file = "missing_id".into();
        assert!(matches!(
            ds.validate(),
            Err(Error::MissingDataFile { .. })
        ));
    }

    #[test]
    fn duplicate_deuteration_type_is_rejected() {
        let mut ds = Dataset::from_json(SPEC).unwrap();
        let dup = ds.states[0].peptides[1].clone();
        ds.states[0].peptides.push(dup);
        assert!(matches!(
            ds.validate(),
            Err(Error::DuplicatePeptideSet { .. })
        ));
    }

    #[test]
    fn missing_pd_set_fails_metrics() {
        let mut ds = Dataset::from_json(SPEC).unwrap();
        ds.states[0].peptides.remove(0);
        let state = ds.states[0].clone();
        let err = ds
            .uptake_metrics(Path::new("."), &state, TimeUnit::Seconds)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::MissingControl(DeuterationType::PartiallyDeuterated)
        ));
    }
}
