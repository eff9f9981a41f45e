//! pota-adif - Convert POTA hunter log pastes into ADIF records.
//!
//! This crate provides:
//! - A tolerant parser for the several layouts the POTA hunter log has used
//! - An ADIF reader and writer
//! - Duplicate detection against a previously exported ADIF log
//!
//! # Example
//!
//! ```rust
//! use pota_adif::{DedupFilter, parse_adif, parse_log, write_adif};
//!
//! let pasted = "2024-05-01 14:30 W1AW K5OHY 20m SSB US-IL 1234 Some Park";
//! let prior = "<call:4>W1AW <qso_date:8>20240501 <time_on:4>1000 <band:3>20m <mode:3>SSB <eor>";
//!
//! let candidates = parse_log(pasted).records;
//! let known = parse_adif(prior).records;
//! let outcome = DedupFilter::default().filter(candidates, &known);
//!
//! println!("{}", write_adif(&outcome.kept));
//! ```

pub mod adif;
pub mod config;
pub mod convert;
pub mod dedup;
pub mod parser;
pub mod qso;
pub mod stats;

pub use adif::{AdifError, AdifField, adif_header, parse_adif, parse_adif_bytes, write_adif};
pub use config::Config;
pub use convert::{Conversion, ConvertError, ConvertOptions, convert};
pub use dedup::{DedupConfig, DedupFilter, DedupOutcome};
pub use parser::{LogEntry, LogLineFormat, LogParser, ParseError, ParseWarning, ParsedLog, parse_log};
pub use qso::QsoRecord;
pub use stats::ConversionSummary;
