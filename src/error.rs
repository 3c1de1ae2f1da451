use thiserror::Error;

// ---------------------------------------------------------------------------
// Pipeline error kinds
// ---------------------------------------------------------------------------

/// Errors produced by the normalization and metrics pipeline.
///
/// Structural problems (unknown format, missing file, missing deuteration
/// type) are fatal for the peptide set being loaded; they never abort sibling
/// sets in the same state. Underivable quantities (missing control, division
/// by zero) are *not* errors — they surface as `None` fields in the output
/// tables.
#[derive(Debug, Error)]
pub enum Error {
    /// The format tag is not present in the format registry.
    #[error("unknown data format: {0:?}")]
    UnknownFormat(String),

    /// The raw table is structurally malformed or misses a required column.
    #[error("parse error: {reason} (row {row})")]
    Parse { reason: String, row: usize },

    /// A filter matched zero rows — almost always a mistyped label.
    #[error("selection is empty: filter {filter} matched no rows")]
    EmptySelection { filter: String },

    /// Protein sequence length disagrees with the declared residue range.
    #[error(
        "sequence length mismatch: {len} residues vs n_term {n_term}..=c_term {c_term} \
         ({deleted} deleted)"
    )]
    SequenceLengthMismatch {
        len: usize,
        n_term: i32,
        c_term: i32,
        deleted: usize,
    },

    /// Rows sharing (start, end) carry different sequences; pooling them
    /// would silently mix peptides.
    #[error("ambiguous peptide identity at {start}..={end}: sequences {sequences:?}")]
    AmbiguousPeptideIdentity {
        start: i32,
        end: i32,
        sequences: Vec<String>,
    },

    /// A control table holds more than one row for a single peptide identity.
    #[error("ambiguous control: duplicate entry for peptide {start}..={end} {sequence:?}")]
    AmbiguousControl {
        start: i32,
        end: i32,
        sequence: String,
    },

    /// A peptide set references a data file id absent from the registry, or
    /// the file itself is missing on disk.
    #[error("missing data file {id:?}")]
    MissingDataFile { id: String },

    /// A merge requires a deuteration type the state does not declare.
    #[error("missing peptide set: {0} required")]
    MissingControl(crate::dataset::DeuterationType),

    /// A state declares two peptide sets of one deuteration type, leaving
    /// the merge without an unambiguous source.
    #[error("state {state:?} declares more than one {deuteration_type} peptide set")]
    DuplicatePeptideSet {
        state: String,
        deuteration_type: crate::dataset::DeuterationType,
    },

    /// The dataset specification document does not deserialize.
    #[error("invalid dataset specification: {0}")]
    Spec(#[from] serde_json::Error),

    /// State lookup by name failed.
    #[error("unknown state {0:?}")]
    UnknownState(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for a parse failure at a given data row (0 = header).
    pub(crate) fn parse(reason: impl Into<String>, row: usize) -> Self {
        Error::Parse {
            reason: reason.into(),
            row,
        }
    }
}
