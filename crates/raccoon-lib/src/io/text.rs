use anyhow::{Context, Result};
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

fn parse_lines<T>(text: &str, what: &str) -> Result<Vec<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let val: T = trimmed
            .parse()
            .with_context(|| format!("line {} is not {}: {}", idx + 1, what, trimmed))?;
        out.push(val);
    }
    Ok(out)
}

/// Parse a newline-delimited sample series, ignoring blank and comment lines.
pub fn parse_f64_series(text: &str) -> Result<Vec<f64>> {
    let out = parse_lines(text, "a number")?;
    if out.is_empty() {
        anyhow::bail!("no numeric samples found");
    }
    Ok(out)
}

pub fn read_f64_series(path: &Path) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_f64_series(&text)
}

/// Parse newline-delimited sample indices. An empty list is valid: a record
/// may have no detections.
pub fn parse_event_indices(text: &str) -> Result<Vec<usize>> {
    parse_lines(text, "an integer index")
}

pub fn read_event_indices(path: &Path) -> Result<Vec<usize>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_event_indices(&text)
}

/// One value per line.
pub fn format_lines<T: Display>(values: &[T]) -> String {
    let mut out = String::new();
    for value in values {
        out.push_str(&value.to_string());
        out.push('\n');
    }
    out
}
