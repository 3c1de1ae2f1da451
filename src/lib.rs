//! HDX-MS peptide table normalization and uptake metrics.
//!
//! This crate turns heterogeneous vendor-exported peptide tables (Waters
//! DynamX state/cluster exports, Sierra HDExaminer exports, canonical
//! OpenHDX tables) into a single canonical schema, aggregates replicate and
//! charge-state measurements with propagated uncertainty, and merges
//! deuteration controls into the time-course data to produce uptake
//! metrics.
//!
//! ```text
//!  dataset specification (JSON)
//!        │
//!        ▼
//!   ┌───────────┐     ┌───────────┐     ┌───────────┐
//!   │  dataset   │ ──▶ │  parser +  │ ──▶ │ aggregate  │
//!   │   model    │     │  selector  │     │            │
//!   └───────────┘     └───────────┘     └───────────┘
//!                                             │
//!                                             ▼
//!                                       ┌───────────┐
//!                                       │   merge    │  PD ⟕ ND/FD
//!                                       └───────────┘
//!                                             │
//!                                             ▼
//!                                  uptake / frac_fd_control /
//!                                  frac_max_uptake (± sd)
//! ```
//!
//! Loading is synchronous and pure: a [`PeptideSet`](dataset::PeptideSet)
//! load re-parses its source every time and shares no mutable state with
//! sibling sets, so callers are free to cache or parallelize across states
//! themselves.

pub mod aggregate;
pub mod data;
pub mod dataset;
pub mod error;
pub mod formats;
pub mod measure;
pub mod merge;
pub mod verify;

pub use data::filter::{select, FilterMap, FilterValue};
pub use data::model::{write_canonical_csv, AggregatedRecord, Exposure, PeptideRecord};
pub use data::parser::parse_table;
pub use dataset::{Dataset, DeuterationType, PeptideSet, ProteinState, State};
pub use error::{Error, Result};
pub use formats::{identify, lookup, FormatDescriptor, TimeUnit, FORMATS};
pub use measure::{Measured, PROTON_MASS};
pub use merge::{max_uptake, merge_controls, write_merged_csv, MergedRecord};
pub use verify::{contiguous_regions, verify_sequence, SequenceMismatch};
