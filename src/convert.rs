//! One conversion request: pasted hunter log (plus an optional prior ADIF
//! log) in, ADIF text out.
//!
//! ```text
//! pasted text ──LogParser──▶ candidates ─┐
//!                                        ├─DedupFilter──▶ kept ──AdifWriter──▶ ADIF
//! prior ADIF ──AdifParser──▶ known ──────┘
//! ```
//!
//! All state lives in the call; nothing is shared between requests.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::adif::{AdifError, parse_adif_bytes, write_adif};
use crate::dedup::{DedupConfig, DedupFilter};
use crate::parser::{LogEntry, LogParser, ParseWarning};
use crate::qso::QsoRecord;
use crate::stats::ConversionSummary;

/// Errors that stop a conversion.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("No log text was provided")]
    EmptyInput,

    #[error("Could not read the prior ADIF log: {0}")]
    Adif(#[from] AdifError),
}

/// Options for a conversion.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Duplicate detection settings.
    pub dedup: DedupConfig,
    /// Operator callsign for records that do not carry one.
    pub station_callsign: Option<String>,
    /// Header markers on top of the parser defaults.
    pub extra_header_markers: Vec<String>,
}

/// The result of a conversion.
#[derive(Debug, Clone, Serialize)]
pub struct Conversion {
    /// Records written to `adif`, in input order.
    pub records: Vec<QsoRecord>,
    /// Records dropped as already logged.
    pub duplicates: Vec<QsoRecord>,
    /// Skipped lines from the paste and dropped records from the prior log.
    pub warnings: Vec<ParseWarning>,
    /// The generated ADIF records (no header).
    pub adif: String,
    /// Counts for reporting.
    pub summary: ConversionSummary,
}

/// Convert a pasted hunter log to ADIF.
///
/// When `prior_adif` is given, records already present in it are left out.
/// Without it every parsed record is written.
///
/// # Example
///
/// ```
/// use pota_adif::convert::{ConvertOptions, convert};
///
/// let log = "2024-05-01 14:30 W1AW K5OHY 20m SSB US-IL 1234 Some Park";
/// let prior = b"<call:4>W1AW <qso_date:8>20240501 <time_on:4>1425 <band:3>20m <mode:3>SSB <eor>";
///
/// let fresh = convert(log, None, &ConvertOptions::default()).unwrap();
/// assert_eq!(fresh.records.len(), 1);
///
/// let deduped = convert(log, Some(prior), &ConvertOptions::default()).unwrap();
/// assert!(deduped.records.is_empty());
/// assert!(deduped.adif.is_empty());
/// ```
pub fn convert(
    log_text: &str,
    prior_adif: Option<&[u8]>,
    options: &ConvertOptions,
) -> Result<Conversion, ConvertError> {
    if log_text.trim().is_empty() {
        return Err(ConvertError::EmptyInput);
    }

    let mut summary = ConversionSummary::default();
    let mut warnings = Vec::new();

    let known = match prior_adif {
        Some(bytes) => {
            let parsed = parse_adif_bytes(bytes)?;
            debug!(
                "Prior log: {} records, {} dropped",
                parsed.records.len(),
                parsed.warnings.len()
            );
            warnings.extend(parsed.warnings);
            parsed.records
        }
        None => Vec::new(),
    };
    summary.known = known.len();

    let mut candidates = Vec::new();
    let parser = LogParser::new(log_text).with_extra_markers(&options.extra_header_markers);
    for entry in parser {
        match entry {
            LogEntry::Record { format, qso, .. } => {
                summary.record_parsed(format);
                candidates.push(fill_station_callsign(qso, options));
            }
            LogEntry::Skipped(warning) => {
                summary.record_skipped();
                warnings.push(warning);
            }
        }
    }

    let outcome = DedupFilter::new(&options.dedup).filter(candidates, &known);
    summary.duplicates = outcome.duplicates.len();
    summary.undated = outcome.undated;
    for qso in &outcome.kept {
        summary.record_written(qso);
    }

    info!(
        "Converted {} records ({} skipped lines, {} duplicates)",
        summary.written, summary.skipped, summary.duplicates
    );

    Ok(Conversion {
        adif: write_adif(&outcome.kept),
        records: outcome.kept,
        duplicates: outcome.duplicates,
        warnings,
        summary,
    })
}

fn fill_station_callsign(qso: QsoRecord, options: &ConvertOptions) -> QsoRecord {
    match (&qso.station_callsign, &options.station_callsign) {
        (None, Some(call)) => qso.with_station_callsign(call),
        _ => qso,
    }
}
