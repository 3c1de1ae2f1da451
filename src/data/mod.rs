//! Data layer: canonical records, format parsing, and selection.
//!
//! ```text
//!  raw vendor CSV + format tag
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  parser   │  descriptor-driven parse → canonical rows
//!   └──────────┘
//!        │
//!        ▼
//!   ┌───────────────┐
//!   │ PeptideRecord │  one row per (peptide, exposure, replicate, charge)
//!   └───────────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  filter   │  declarative per-column selection → peptide set rows
//!   └──────────┘
//! ```

pub mod filter;
pub mod model;
pub mod parser;
