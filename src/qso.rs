//! The QSO record shared by the log parser, ADIF reader, dedup filter and writer.
//!
//! Every value is normalized once, when the record is built, so that the
//! rest of the crate can compare fields without caring which input format
//! they came from.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single logged contact.
///
/// Built with [`QsoRecord::new`] and the `with_*` methods, each of which
/// applies the canonical normalization for its field:
///
/// - `qso_date`: `2024-05-01` becomes `20240501`
/// - `time_on` / `time_off`: `14:30` becomes `1430`, `143015` becomes `1430`
/// - `band`: lowercase (`20M` becomes `20m`)
/// - `mode`: uppercase, parentheses removed (`(ssb)` becomes `SSB`)
///
/// Empty values are stored as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QsoRecord {
    /// Callsign of the worked station. Never empty for a parsed record.
    pub call: String,

    /// The logging operator's own callsign.
    pub station_callsign: Option<String>,

    /// Contact date as `YYYYMMDD`.
    pub qso_date: Option<String>,

    /// Start of the contact as `HHMM` (UTC).
    pub time_on: Option<String>,

    /// End of the contact as `HHMM` (UTC).
    pub time_off: Option<String>,

    /// Band designator, e.g. `20m`.
    pub band: Option<String>,

    /// Mode, e.g. `SSB`, `CW`, `FT8`.
    pub mode: Option<String>,

    /// Free text, typically `[POTA US-1234 Some State Park]`.
    pub comment: Option<String>,

    /// Two-letter state code taken from a `US-IL` style location.
    pub my_state: Option<String>,

    /// POTA park reference, e.g. `US-1234`.
    pub sig_info: Option<String>,
}

impl QsoRecord {
    /// Create a record for the given worked callsign.
    pub fn new(call: &str) -> Self {
        Self {
            call: normalize_call(call).unwrap_or_default(),
            ..Default::default()
        }
    }

    pub fn with_station_callsign(mut self, call: &str) -> Self {
        self.station_callsign = normalize_call(call);
        self
    }

    pub fn with_qso_date(mut self, date: &str) -> Self {
        self.qso_date = normalize_date(date);
        self
    }

    pub fn with_time_on(mut self, time: &str) -> Self {
        self.time_on = normalize_time(time);
        self
    }

    pub fn with_time_off(mut self, time: &str) -> Self {
        self.time_off = normalize_time(time);
        self
    }

    pub fn with_band(mut self, band: &str) -> Self {
        self.band = normalize_band(band);
        self
    }

    pub fn with_mode(mut self, mode: &str) -> Self {
        self.mode = normalize_mode(mode);
        self
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = clean(comment);
        self
    }

    pub fn with_my_state(mut self, state: &str) -> Self {
        self.my_state = clean(state).map(|s| s.to_ascii_uppercase());
        self
    }

    pub fn with_sig_info(mut self, reference: &str) -> Self {
        self.sig_info = clean(reference).map(|s| s.to_ascii_uppercase());
        self
    }

    /// Whether the record carries a callsign at all.
    pub fn has_call(&self) -> bool {
        !self.call.is_empty()
    }

    /// The contact start as a minute-resolution timestamp.
    ///
    /// Returns `None` unless `qso_date` is exactly 8 digits, `time_on` is
    /// exactly 4 digits, and together they name a real date and time.
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        let date = self.qso_date.as_deref()?;
        let time = self.time_on.as_deref()?;
        if !is_digits(date, 8) || !is_digits(time, 4) {
            return None;
        }
        let day = NaiveDate::from_ymd_opt(
            date[..4].parse().ok()?,
            date[4..6].parse().ok()?,
            date[6..].parse().ok()?,
        )?;
        let minute = NaiveTime::from_hms_opt(time[..2].parse().ok()?, time[2..].parse().ok()?, 0)?;
        Some(day.and_time(minute))
    }
}

impl fmt::Display for QsoRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dash = |v: &Option<String>| v.as_deref().unwrap_or("-").to_string();
        write!(
            f,
            "{} {} {} {} {}",
            dash(&self.qso_date),
            dash(&self.time_on),
            self.call,
            dash(&self.band),
            dash(&self.mode),
        )?;
        if let Some(ref reference) = self.sig_info {
            write!(f, " {}", reference)?;
        }
        Ok(())
    }
}

fn is_digits(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_digit())
}

/// Trim a raw value and drop ADIF delimiter characters.
///
/// Returns `None` for values that end up empty.
pub fn clean(raw: &str) -> Option<String> {
    let cleaned: String = raw.chars().filter(|c| *c != '<' && *c != '>').collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Uppercase a callsign.
pub fn normalize_call(raw: &str) -> Option<String> {
    clean(raw).map(|s| s.to_ascii_uppercase())
}

/// Strip `-` separators from a date (`2024-05-01` to `20240501`).
pub fn normalize_date(raw: &str) -> Option<String> {
    clean(&raw.replace('-', ""))
}

/// Strip `:` separators from a time and reduce it to `HHMM`.
///
/// `HHMMSS` keeps only hours and minutes; a three-digit `HMM` gets a
/// leading zero.
pub fn normalize_time(raw: &str) -> Option<String> {
    let time = clean(&raw.replace(':', ""))?;
    let all_digits = time.bytes().all(|b| b.is_ascii_digit());
    Some(match time.len() {
        6 if all_digits => time[..4].to_string(),
        3 if all_digits => format!("0{time}"),
        _ => time,
    })
}

/// Lowercase a band designator.
pub fn normalize_band(raw: &str) -> Option<String> {
    clean(raw).map(|s| s.to_ascii_lowercase())
}

/// Uppercase a mode, dropping any parenthesis wrapping and anything after
/// the first word (`(ssb)` and `SSB (USB)` both become `SSB`).
pub fn normalize_mode(raw: &str) -> Option<String> {
    let unwrapped = raw.replace(['(', ')'], " ");
    unwrapped
        .split_whitespace()
        .next()
        .and_then(clean)
        .map(|s| s.to_ascii_uppercase())
}

/// Take the state code out of a `COUNTRY-STATE` location such as `US-IL`.
///
/// Only a two-letter suffix after the last `-` counts as a state.
pub fn state_from_location(location: &str) -> Option<String> {
    let (_, state) = location.trim().rsplit_once('-')?;
    if state.len() == 2 && state.bytes().all(|b| b.is_ascii_alphabetic()) {
        Some(state.to_ascii_uppercase())
    } else {
        None
    }
}
