//! Generate a deterministic demo dataset: a synthetic DynamX v3 state
//! export plus the matching dataset specification.
//!
//! The CSV contains a time-course state ("SecB WT apo") and a fully
//! deuterated control state at the conventional 0.167 min quench exposure,
//! so the generated dataset exercises the whole PD-against-FD merge path.

use std::path::Path;

use anyhow::{Context, Result};

use openhdx::dataset::{
    DataFileSpec, Dataset, DeuterationType, PeptideMetadata, PeptideSet, ProteinState, State,
};
use openhdx::{max_uptake, FilterValue};

const SEQUENCE: &str = "MSEQNNTEMTFQIQRIYTKDISFEAPNAPHVFQKDWQPEVKLDLDTASSQLADDVYEVVL";
const TIMECOURSE_STATE: &str = "SecB WT apo";
const FD_STATE: &str = "Full deuteration control";

/// Exposures in minutes, as DynamX exports them.
const EXPOSURES_MIN: &[f64] = &[0.0, 0.167, 1.0, 10.0, 60.0];
const FD_EXPOSURE_MIN: f64 = 0.167;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// A peptide tiling the demo sequence: overlapping windows of 8-12
/// residues, the usual product of a pepsin digest.
fn peptides(rng: &mut SimpleRng) -> Vec<(i32, i32, String)> {
    let residues: Vec<char> = SEQUENCE.chars().collect();
    let mut out = Vec::new();
    let mut start = 0usize;
    while start + 8 <= residues.len() {
        let len = 8 + (rng.next_u64() % 5) as usize;
        let end = (start + len).min(residues.len());
        out.push((
            start as i32 + 1,
            end as i32,
            residues[start..end].iter().collect(),
        ));
        start += 3 + (rng.next_u64() % 4) as usize;
    }
    out
}

/// Exchange plateau and per-peptide rate for the synthetic time course.
fn uptake_at(max_up: u32, rate: f64, minutes: f64, d_fraction: f64) -> f64 {
    max_up as f64 * d_fraction * (1.0 - (-rate * minutes).exp())
}

fn write_csv(path: &Path, rng: &mut SimpleRng) -> Result<usize> {
    let mut w = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    w.write_record([
        "Protein", "Start", "End", "Sequence", "Modification", "Fragment", "MaxUptake", "MHP",
        "State", "Exposure", "Center", "Center SD", "Uptake", "Uptake SD", "RT", "RT SD",
    ])?;

    let mut rows = 0usize;
    for (start, end, sequence) in peptides(rng) {
        let max_up = max_uptake(&sequence);
        let mhp = 750.0 + 108.5 * sequence.len() as f64 + rng.gauss(0.0, 20.0);
        let rt = 2.0 + rng.next_f64() * 10.0;
        let rate = 0.05 + rng.next_f64() * 2.0;
        let fd_uptake = max_up as f64 * 0.92;

        let mut row = |state: &str, exposure: f64, uptake: f64| -> Result<()> {
            let uptake = (uptake + rng.gauss(0.0, 0.02)).max(0.0);
            let uptake_sd = 0.02 + rng.next_f64() * 0.08;
            w.write_record([
                "SecB".to_string(),
                start.to_string(),
                end.to_string(),
                sequence.clone(),
                String::new(),
                String::new(),
                max_up.to_string(),
                format!("{mhp:.4}"),
                state.to_string(),
                exposure.to_string(),
                format!("{:.4}", mhp + uptake),
                format!("{:.4}", uptake_sd / 2.0),
                format!("{uptake:.4}"),
                format!("{uptake_sd:.4}"),
                format!("{rt:.2}"),
                "0.05".to_string(),
            ])?;
            Ok(())
        };

        for &exposure in EXPOSURES_MIN {
            row(TIMECOURSE_STATE, exposure, uptake_at(max_up, rate, exposure, 0.9))?;
            rows += 1;
        }
        row(FD_STATE, FD_EXPOSURE_MIN, fd_uptake)?;
        rows += 1;
    }
    w.flush()?;
    Ok(rows)
}

fn specification() -> Dataset {
    let filters = |state: &str| {
        let mut f = openhdx::FilterMap::new();
        f.insert("state".into(), FilterValue::Str(state.into()));
        f
    };

    Dataset {
        description: Some("Synthetic SecB demo dataset".into()),
        data_files: [(
            "secb_state".to_string(),
            DataFileSpec {
                filename: "SecB.csv".into(),
                format: "DynamX_v3_state".into(),
            },
        )]
        .into(),
        states: vec![State {
            name: TIMECOURSE_STATE.into(),
            description: None,
            protein: ProteinState {
                sequence: SEQUENCE.into(),
                n_term: 1,
                c_term: SEQUENCE.len() as i32,
                oligomeric_state: Some(4),
                mutations: None,
                deletions: None,
                ligand: None,
                structure: None,
            },
            peptides: vec![
                PeptideSet {
                    data_file: "secb_state".into(),
                    format: None,
                    deuteration_type: DeuterationType::PartiallyDeuterated,
                    filters: filters(TIMECOURSE_STATE),
                    metadata: Some(PeptideMetadata {
                        ph: Some(8.0),
                        temperature: Some(303.15),
                        d_percentage: Some(90.0),
                    }),
                },
                PeptideSet {
                    data_file: "secb_state".into(),
                    format: None,
                    deuteration_type: DeuterationType::FullyDeuterated,
                    filters: filters(FD_STATE),
                    metadata: None,
                },
            ],
        }],
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let out_dir = Path::new("sample_data");
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let mut rng = SimpleRng::new(42);
    let csv_path = out_dir.join("SecB.csv");
    let rows = write_csv(&csv_path, &mut rng)?;

    let dataset = specification();
    dataset.validate().context("generated specification is invalid")?;
    let spec_path = out_dir.join("dataset.json");
    std::fs::write(&spec_path, serde_json::to_string_pretty(&dataset)?)
        .with_context(|| format!("writing {}", spec_path.display()))?;

    log::info!(
        "wrote {rows} rows to {} and the specification to {}",
        csv_path.display(),
        spec_path.display()
    );
    println!(
        "Wrote {rows} peptide rows to {} (+ dataset.json)",
        csv_path.display()
    );
    Ok(())
}
