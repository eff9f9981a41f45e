//! Per-conversion statistics.
//!
//! Counts what happened to every input line during one conversion and
//! breaks the written records down by band, mode and source layout.

use serde::Serialize;
use std::collections::HashMap;

use crate::parser::LogLineFormat;
use crate::qso::QsoRecord;

/// Summary of one conversion request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionSummary {
    /// Records recovered from the pasted log.
    pub parsed: usize,
    /// Lines or blocks of the pasted log that were skipped.
    pub skipped: usize,
    /// Records read from the prior ADIF log.
    pub known: usize,
    /// Records dropped as duplicates.
    pub duplicates: usize,
    /// Records kept without a duplicate check (no usable date/time).
    pub undated: usize,
    /// Records written to the output.
    pub written: usize,
    /// Parsed records per source layout.
    pub by_format: HashMap<LogLineFormat, usize>,
    /// Written records per band.
    pub by_band: HashMap<String, usize>,
    /// Written records per mode.
    pub by_mode: HashMap<String, usize>,
}

impl ConversionSummary {
    /// Note a record recovered from the pasted log.
    pub fn record_parsed(&mut self, format: LogLineFormat) {
        self.parsed += 1;
        *self.by_format.entry(format).or_insert(0) += 1;
    }

    /// Note a skipped line or block.
    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    /// Note a record that will be written.
    pub fn record_written(&mut self, qso: &QsoRecord) {
        self.written += 1;
        let band = qso.band.clone().unwrap_or_else(|| "unknown".to_string());
        *self.by_band.entry(band).or_insert(0) += 1;
        let mode = qso.mode.clone().unwrap_or_else(|| "UNKNOWN".to_string());
        *self.by_mode.entry(mode).or_insert(0) += 1;
    }
}

/// Write `counts` sorted by descending count, then by name.
fn write_counts<K: std::fmt::Display>(
    f: &mut std::fmt::Formatter<'_>,
    title: &str,
    counts: &HashMap<K, usize>,
) -> std::fmt::Result {
    if counts.is_empty() {
        return Ok(());
    }
    writeln!(f, "{}:", title)?;
    let mut entries: Vec<(String, usize)> =
        counts.iter().map(|(k, v)| (k.to_string(), *v)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    for (name, count) in entries {
        writeln!(f, "  {}: {}", name, count)?;
    }
    writeln!(f)
}

impl std::fmt::Display for ConversionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "═══════════════════════════════════════════════════════")?;
        writeln!(f, "                  POTA ADIF CONVERSION")?;
        writeln!(f, "═══════════════════════════════════════════════════════")?;
        writeln!(f)?;
        writeln!(f, "Parsed records: {}", self.parsed)?;
        writeln!(f, "Skipped lines: {}", self.skipped)?;
        writeln!(f, "Prior log records: {}", self.known)?;
        writeln!(f, "Duplicates removed: {}", self.duplicates)?;
        writeln!(f, "Kept without date/time: {}", self.undated)?;
        writeln!(f, "Records written: {}", self.written)?;
        writeln!(f)?;

        write_counts(f, "Records by Layout", &self.by_format)?;
        write_counts(f, "Records by Band", &self.by_band)?;
        write_counts(f, "Records by Mode", &self.by_mode)?;

        Ok(())
    }
}
