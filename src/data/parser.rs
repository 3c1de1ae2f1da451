use std::collections::HashMap;

use crate::data::model::{sort_canonical, Exposure, PeptideRecord};
use crate::error::{Error, Result};
use crate::formats::{FormatDescriptor, TimeUnit};
use crate::measure::PROTON_MASS;

// ---------------------------------------------------------------------------
// Generic, descriptor-driven parser
// ---------------------------------------------------------------------------

/// Parse raw tabular content into canonical rows.
///
/// One parser serves every registered format: the descriptor supplies the
/// column mapping, the FD sentinel tokens, the source time unit and the
/// quirks. `time_unit` is the unit exposure values are converted *into*.
///
/// Pure transform: no filesystem access, no caching, deterministic output
/// order (canonical row sort).
pub fn parse_table(
    content: &str,
    format: &FormatDescriptor,
    time_unit: TimeUnit,
) -> Result<Vec<PeptideRecord>> {
    // Some historical exports put banner lines above the header, and blank
    // lines can appear around them; both are dropped before CSV parsing.
    let body = content
        .lines()
        .skip(format.skip_lines)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    // Map raw header names to canonical field indices.
    let headers = reader
        .headers()
        .map_err(|e| Error::parse(format!("unreadable header: {e}"), 0))?
        .clone();
    let mut index: HashMap<&'static str, usize> = HashMap::new();
    for (raw, canonical) in format.columns {
        if let Some(pos) = headers.iter().position(|h| h == *raw) {
            index.insert(canonical, pos);
        }
    }
    for required in ["start", "end", "sequence", "exposure"] {
        if !index.contains_key(required) {
            return Err(Error::parse(
                format!("missing required column for {required:?}"),
                0,
            ));
        }
    }

    let mut records = Vec::new();
    for (i, row) in reader.records().enumerate() {
        let row_no = i + 1;
        let row = row.map_err(|e| Error::parse(format!("malformed row: {e}"), row_no))?;
        let field = |name: &str| -> Option<&str> {
            index
                .get(name)
                .and_then(|&pos| row.get(pos))
                .filter(|v| !v.is_empty())
        };

        let start = req_i32(field("start"), "start", row_no)?;
        let end = req_i32(field("end"), "end", row_no)?;
        if start > end {
            return Err(Error::parse(
                format!("start {start} exceeds end {end}"),
                row_no,
            ));
        }

        let sequence = field("sequence").unwrap_or_default().to_string();
        let span = (end - start + 1) as usize;
        if !sequence.is_empty() && sequence.chars().count() != span {
            return Err(Error::parse(
                format!(
                    "sequence {sequence:?} has {} residues, expected {span} for {start}..={end}",
                    sequence.chars().count()
                ),
                row_no,
            ));
        }

        let exposure = parse_exposure(
            field("exposure").unwrap_or_default(),
            format,
            time_unit,
            row_no,
        )?;

        let charge = opt_i32(field("charge"), "charge", row_no)?;
        let centroid_mz = opt_f64(field("centroid_mz"), "centroid_mz", row_no)?;
        let centroid_mz_sd = opt_f64(field("centroid_mz_sd"), "centroid_mz_sd", row_no)?;

        // Cluster-level exports record a per-charge centroid m/z; the
        // neutral centroid mass is z × (m/z − proton).
        let (centroid_mass, centroid_mass_sd) = if format.mass_from_mz {
            match (charge, centroid_mz) {
                (Some(z), Some(mz)) => (
                    Some(z as f64 * (mz - PROTON_MASS)),
                    centroid_mz_sd.map(|sd| z as f64 * sd),
                ),
                _ => (None, None),
            }
        } else {
            (
                opt_f64(field("centroid_mass"), "centroid_mass", row_no)?,
                opt_f64(field("centroid_mass_sd"), "centroid_mass_sd", row_no)?,
            )
        };

        let rt = parse_rt(field("rt"), format.rt_is_range, row_no)?;

        records.push(PeptideRecord {
            start,
            end,
            sequence,
            protein: field("protein").map(str::to_string),
            state: field("state").unwrap_or_default().to_string(),
            replicate: field("replicate").map(str::to_string),
            exposure,
            charge,
            centroid_mz,
            centroid_mz_sd,
            centroid_mass,
            centroid_mass_sd,
            rt,
            rt_sd: opt_f64(field("rt_sd"), "rt_sd", row_no)?,
            intensity: opt_f64(field("intensity"), "intensity", row_no)?,
            uptake: opt_f64(field("uptake"), "uptake", row_no)?,
            uptake_sd: opt_f64(field("uptake_sd"), "uptake_sd", row_no)?,
            max_uptake: opt_f64(field("max_uptake"), "max_uptake", row_no)?,
        });
    }

    sort_canonical(&mut records);
    log::debug!(
        "parsed {} rows from {} table",
        records.len(),
        format.name
    );
    Ok(records)
}

/// Parse an exposure token: an FD sentinel, a bare number in the format's
/// source unit, or a unit-suffixed string like "0s" or "2min".
fn parse_exposure(
    token: &str,
    format: &FormatDescriptor,
    time_unit: TimeUnit,
    row: usize,
) -> Result<Exposure> {
    let token = token.trim();
    if format.fd_sentinels.contains(&token) {
        return Ok(Exposure::FullDeuteration);
    }

    let (value, unit) = if let Ok(v) = token.parse::<f64>() {
        (v, format.source_time_unit.unwrap_or(time_unit))
    } else {
        let split = token
            .char_indices()
            .find(|(_, c)| c.is_ascii_alphabetic())
            .map(|(i, _)| i)
            .unwrap_or(token.len());
        let (number, suffix) = token.split_at(split);
        let value = number.trim().parse::<f64>().map_err(|_| {
            Error::parse(format!("unparseable exposure {token:?}"), row)
        })?;
        let unit = TimeUnit::from_suffix(suffix.trim().to_ascii_lowercase().as_str())
            .ok_or_else(|| {
                Error::parse(format!("unknown time unit in exposure {token:?}"), row)
            })?;
        (value, unit)
    };

    if value < 0.0 {
        return Err(Error::parse(
            format!("negative exposure {token:?}"),
            row,
        ));
    }
    Ok(Exposure::Time(value * unit.factor_to(time_unit)))
}

/// Retention time, optionally exported as a "low-high" range to average.
fn parse_rt(value: Option<&str>, is_range: bool, row: usize) -> Result<Option<f64>> {
    let Some(value) = value else {
        return Ok(None);
    };
    if is_range {
        if let Some((low, high)) = value.split_once('-') {
            let low: f64 = low
                .trim()
                .parse()
                .map_err(|_| Error::parse(format!("bad rt range {value:?}"), row))?;
            let high: f64 = high
                .trim()
                .parse()
                .map_err(|_| Error::parse(format!("bad rt range {value:?}"), row))?;
            return Ok(Some((low + high) / 2.0));
        }
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| Error::parse(format!("bad rt value {value:?}"), row))
}

fn req_i32(value: Option<&str>, name: &str, row: usize) -> Result<i32> {
    value
        .ok_or_else(|| Error::parse(format!("missing {name} value"), row))?
        .parse()
        .map_err(|_| Error::parse(format!("bad {name} value {:?}", value.unwrap_or("")), row))
}

fn opt_i32(value: Option<&str>, name: &str, row: usize) -> Result<Option<i32>> {
    value
        .map(|v| {
            v.parse()
                .map_err(|_| Error::parse(format!("bad {name} value {v:?}"), row))
        })
        .transpose()
}

fn opt_f64(value: Option<&str>, name: &str, row: usize) -> Result<Option<f64>> {
    value
        .map(|v| {
            v.parse()
                .map_err(|_| Error::parse(format!("bad {name} value {v:?}"), row))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::lookup;

    const DYNAMX_STATE: &str = "\
Protein,Start,End,Sequence,Modification,Fragment,MaxUptake,MHP,State,Exposure,Center,Center SD,Uptake,Uptake SD,RT,RT SD
SecB,10,17,WYVLSLIT,,,7,996.58,SecB WT apo,0.0,997.1,0.01,0.0,0.0,5.1,0.02
SecB,10,17,WYVLSLIT,,,7,996.58,SecB WT apo,10.0,999.6,0.05,2.5,0.08,5.1,0.02
SecB,10,17,WYVLSLIT,,,7,996.58,Full deuteration control,0.167,1002.3,0.11,5.2,0.12,5.1,0.03
";

    const HDEXAMINER: &str = "\
Protein State,Deut Time,Experiment,Start,End,Sequence,Charge,Search RT,Actual RT,# Spectra,Peak Width Da,m/z Shift Da,Max Inty,Exp Cent,Theor Cent,Score,Cent Diff,# Deut,Deut %,Confidence
apo,0s,rep1,1,9,MSEQNNTEM,2,7.5,7.44-7.65,4,1.1,0.0,15000,534.25,534.2,95,0.05,0.0,0.0,High
apo,2min,rep1,1,9,MSEQNNTEM,2,7.5,7.40-7.60,4,1.1,0.0,15200,535.75,534.2,95,1.55,3.0,33.0,High
apo,FD,rep1,1,9,MSEQNNTEM,2,7.5,7.41-7.61,4,1.1,0.0,14100,538.95,534.2,95,4.75,9.0,100.0,High
";

    #[test]
    fn dynamx_state_minutes_to_seconds() {
        let format = lookup("DynamX_v3_state").unwrap();
        let rows = parse_table(DYNAMX_STATE, format, TimeUnit::Seconds).unwrap();
        assert_eq!(rows.len(), 3);
        // Rows are sorted by (state, exposure, ...): the control state sorts
        // before "SecB WT apo".
        assert_eq!(rows[0].state, "Full deuteration control");
        assert!(rows[0].exposure.matches_time(0.167 * 60.0));
        assert!(rows[1].exposure.matches_time(0.0));
        assert!(rows[2].exposure.matches_time(600.0));
        assert_eq!(rows[2].uptake, Some(2.5));
        assert_eq!(rows[2].uptake_sd, Some(0.08));
        assert_eq!(rows[2].max_uptake, Some(7.0));
        // State exports carry no per-charge data.
        assert_eq!(rows[2].charge, None);
        assert_eq!(rows[2].centroid_mass, None);
    }

    #[test]
    fn dynamx_state_native_minutes() {
        let format = lookup("DynamX_v3_state").unwrap();
        let rows = parse_table(DYNAMX_STATE, format, TimeUnit::Minutes).unwrap();
        assert!(rows[0].exposure.matches_time(0.167));
        assert!(rows[2].exposure.matches_time(10.0));
    }

    #[test]
    fn hdexaminer_suffixes_sentinels_and_rt_ranges() {
        let format = lookup("HDExaminer_v3").unwrap();
        let rows = parse_table(HDEXAMINER, format, TimeUnit::Seconds).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows[0].exposure.matches_time(0.0));
        assert!(rows[1].exposure.matches_time(120.0));
        assert!(rows[2].exposure.is_fd());
        // "7.44-7.65" averages to 7.545
        assert!((rows[0].rt.unwrap() - 7.545).abs() < 1e-9);
        // centroid mass from charge and m/z
        let expected = 2.0 * (534.25 - PROTON_MASS);
        assert!((rows[0].centroid_mass.unwrap() - expected).abs() < 1e-9);
        assert_eq!(rows[0].replicate.as_deref(), Some("rep1"));
    }

    #[test]
    fn banner_line_is_skipped() {
        let format = lookup("HDExaminer_v2_summary").unwrap();
        let content = format!("HD-Examiner export 2.1 -- all peptides\n\n{HDEXAMINER}");
        let rows = parse_table(&content, format, TimeUnit::Seconds).unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn missing_required_column_fails() {
        let format = lookup("DynamX_v3_state").unwrap();
        let content = "Protein,Start,End,State\nSecB,10,17,apo\n";
        let err = parse_table(content, format, TimeUnit::Seconds).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn malformed_sequence_length_fails() {
        let format = lookup("DynamX_v3_state").unwrap();
        let content = DYNAMX_STATE.replace("WYVLSLIT", "WYVL");
        let err = parse_table(&content, format, TimeUnit::Seconds).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn parse_is_idempotent() {
        let format = lookup("HDExaminer_v3").unwrap();
        let a = parse_table(HDEXAMINER, format, TimeUnit::Seconds).unwrap();
        let b = parse_table(HDEXAMINER, format, TimeUnit::Seconds).unwrap();
        assert_eq!(a, b);
    }
}
