use crate::signal::{Record, TimeSeries};
use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::Path;

const SKIP: u8 = 59;
const NUM: u8 = 60;
const AUX: u8 = 63;
const NORMAL: u8 = 1;
const MAX_DIFF: usize = 0x03FF;

/// MIT codes of the annotations that mark a beat, with their symbols.
pub const BEAT_CODES: [(u8, char); 20] = [
    (1, 'N'),
    (2, 'L'),
    (3, 'R'),
    (25, 'B'),
    (8, 'A'),
    (4, 'a'),
    (7, 'J'),
    (9, 'S'),
    (5, 'V'),
    (41, 'r'),
    (6, 'F'),
    (34, 'e'),
    (11, 'j'),
    (35, 'n'),
    (10, 'E'),
    (12, '/'),
    (38, 'f'),
    (13, 'Q'),
    (30, '?'),
    (16, '|'),
];

/// One entry of an MIT annotation stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WfdbAnnotation {
    pub sample: usize,
    pub code: u8,
}

impl WfdbAnnotation {
    pub fn is_beat(&self) -> bool {
        self.symbol().is_some()
    }

    /// Symbol of a beat annotation.
    pub fn symbol(&self) -> Option<char> {
        BEAT_CODES
            .iter()
            .find(|(code, _)| *code == self.code)
            .map(|&(_, symbol)| symbol)
    }
}

/// Load one lead of a WFDB record in physical units, truncated to `sampto`
/// samples when given.
pub fn load_wfdb_lead(header_path: &Path, lead: usize, sampto: Option<usize>) -> Result<TimeSeries> {
    if !header_path.is_file() {
        anyhow::bail!("WFDB header {} not found", header_path.display());
    }
    let (header, signals) = wfdb_rust::parse_wfdb(header_path);
    if lead >= signals.len() {
        anyhow::bail!(
            "WFDB record {} contains {} signals, but lead {} was requested",
            header_path.display(),
            signals.len(),
            lead
        );
    }
    let spec = &header.signal_specs[lead];
    let raw = &signals[lead];
    let gain = spec.adc_gain.unwrap_or(1.0) as f64;
    let baseline = spec.baseline.or(spec.adc_zero).unwrap_or(0) as f64;
    let fs = header
        .record
        .sampling_frequency
        .map(|f| f as f64)
        .unwrap_or(360.0);
    let end = sampto.map_or(raw.len(), |s| s.min(raw.len()));
    let data = raw[..end]
        .iter()
        .map(|&sample| (sample as f64 - baseline) / gain)
        .collect();
    Ok(TimeSeries { fs, data })
}

/// Parse an MIT annotation byte stream.
pub fn parse_wfdb_annotations(buf: &[u8]) -> Vec<WfdbAnnotation> {
    let mut out = Vec::new();
    let mut idx = 0;
    let mut sample: usize = 0;
    while idx + 2 <= buf.len() {
        let word = u16::from_le_bytes([buf[idx], buf[idx + 1]]);
        idx += 2;
        let code = (word >> 10) as u8;
        let diff = (word as usize) & MAX_DIFF;
        if code == 0 && diff == 0 {
            break;
        }
        match code {
            SKIP => {
                if idx + 4 > buf.len() {
                    break;
                }
                let high = u16::from_le_bytes([buf[idx], buf[idx + 1]]) as u32;
                let low = u16::from_le_bytes([buf[idx + 2], buf[idx + 3]]) as u32;
                idx += 4;
                sample = sample.wrapping_add(((high << 16) | low) as usize);
            }
            NUM..=62 => {
                sample = sample.wrapping_add(diff);
            }
            AUX => {
                idx += diff + diff % 2;
            }
            _ => {
                sample = sample.wrapping_add(diff);
                out.push(WfdbAnnotation { sample, code });
            }
        }
    }
    out
}

/// Beat positions of an annotation list. The first annotation is the record's
/// begin marker and is always discarded.
pub fn trigger_points(annotations: &[WfdbAnnotation]) -> Vec<usize> {
    annotations
        .iter()
        .skip(1)
        .filter(|ann| ann.is_beat())
        .map(|ann| ann.sample)
        .collect()
}

fn read_exact(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Read an annotation file and return its beat positions before `sampto`.
pub fn load_trigger_points(path: &Path, sampto: Option<usize>) -> Result<Vec<usize>> {
    let buf = read_exact(path)?;
    let mut points = trigger_points(&parse_wfdb_annotations(&buf));
    if let Some(limit) = sampto {
        points.retain(|&p| p < limit);
    }
    debug!("{} beats in {}", points.len(), path.display());
    Ok(points)
}

/// Encode beat positions as normal-beat annotations.
///
/// Gaps that do not fit into the 10-bit interval field are bridged with a
/// SKIP entry. A leading begin marker at sample 0 keeps the stream readable
/// by [`trigger_points`].
pub fn encode_wfdb_annotations(points: &[usize]) -> Vec<u8> {
    let mut out = Vec::with_capacity(points.len() * 2 + 4);
    let mut push = |word: u16| out.extend_from_slice(&word.to_le_bytes());
    // rhythm change '+' at sample 0
    push(28u16 << 10);
    let mut previous = 0usize;
    let mut sorted = points.to_vec();
    sorted.sort_unstable();
    for point in sorted {
        let diff = point - previous;
        if diff > MAX_DIFF {
            let skip = diff as u32;
            push((SKIP as u16) << 10);
            push((skip >> 16) as u16);
            push((skip & 0xFFFF) as u16);
            push((NORMAL as u16) << 10);
        } else {
            push(((NORMAL as u16) << 10) | diff as u16);
        }
        previous = point;
    }
    push(0);
    out
}

/// Write beat positions as an MIT annotation file.
pub fn write_wfdb_annotations(path: &Path, points: &[usize]) -> Result<()> {
    fs::write(path, encode_wfdb_annotations(points))
        .with_context(|| format!("failed to write {}", path.display()))
}

/// Load lead 0 of record `name` from `dir` as a [`Record`].
pub fn load_record(dir: &Path, name: &str, sampto: Option<usize>) -> Result<Record> {
    let header = dir.join(format!("{name}.hea"));
    let signal = load_wfdb_lead(&header, 0, sampto)
        .with_context(|| format!("failed to load record {name}"))?;
    Ok(Record::new(name, signal))
}
