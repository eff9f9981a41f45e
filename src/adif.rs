//! ADIF (Amateur Data Interchange Format) reading and writing.
//!
//! An ADIF file is a run of `<FIELD:len>value` tags, each record closed by
//! `<eor>`, optionally preceded by a free-text header closed by `<eoh>`:
//!
//! ```text
//! Exported by some logger
//! <adif_ver:5>3.1.4 <eoh>
//! <call:5>K5OHY <qso_date:8>20240501 <time_on:4>1430 <band:3>20m <mode:3>SSB <eor>
//! ```
//!
//! The declared length is not trusted when reading: a value runs from the
//! closing `>` of its tag up to the next `<`, trimmed. Hand-edited logs get
//! the length wrong often enough that honoring it loses data.

use std::fmt::Write;

use nom::{
    IResult, Parser,
    bytes::complete::{take_till, take_until},
    character::complete::char,
    sequence::delimited,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::parser::{ParseWarning, ParsedLog};
use crate::qso::QsoRecord;

/// Errors from reading an ADIF file.
#[derive(Debug, Error)]
pub enum AdifError {
    #[error("ADIF file is not valid UTF-8: {0}")]
    Decode(#[from] std::str::Utf8Error),
}

/// The fields this crate reads and writes, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdifField {
    QsoDate,
    TimeOn,
    TimeOff,
    Call,
    StationCallsign,
    Band,
    Mode,
    MyState,
    SigInfo,
    Comment,
}

impl AdifField {
    /// Every field, in the order records are written.
    pub const ALL: [AdifField; 10] = [
        AdifField::QsoDate,
        AdifField::TimeOn,
        AdifField::TimeOff,
        AdifField::Call,
        AdifField::StationCallsign,
        AdifField::Band,
        AdifField::Mode,
        AdifField::MyState,
        AdifField::SigInfo,
        AdifField::Comment,
    ];

    /// The lowercase tag name.
    pub fn name(self) -> &'static str {
        match self {
            AdifField::QsoDate => "qso_date",
            AdifField::TimeOn => "time_on",
            AdifField::TimeOff => "time_off",
            AdifField::Call => "call",
            AdifField::StationCallsign => "station_callsign",
            AdifField::Band => "band",
            AdifField::Mode => "mode",
            AdifField::MyState => "my_state",
            AdifField::SigInfo => "sig_info",
            AdifField::Comment => "comment",
        }
    }

    /// Look up a tag name, ignoring case. Unmodeled fields return `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Read this field's value from a record.
    pub fn value(self, qso: &QsoRecord) -> Option<&str> {
        match self {
            AdifField::Call => Some(qso.call.as_str()).filter(|c| !c.is_empty()),
            AdifField::QsoDate => qso.qso_date.as_deref(),
            AdifField::TimeOn => qso.time_on.as_deref(),
            AdifField::TimeOff => qso.time_off.as_deref(),
            AdifField::StationCallsign => qso.station_callsign.as_deref(),
            AdifField::Band => qso.band.as_deref(),
            AdifField::Mode => qso.mode.as_deref(),
            AdifField::MyState => qso.my_state.as_deref(),
            AdifField::SigInfo => qso.sig_info.as_deref(),
            AdifField::Comment => qso.comment.as_deref(),
        }
    }

    /// Store a raw value on a record, normalizing it on the way in.
    fn apply(self, qso: QsoRecord, value: &str) -> QsoRecord {
        match self {
            AdifField::Call => QsoRecord {
                call: QsoRecord::new(value).call,
                ..qso
            },
            AdifField::QsoDate => qso.with_qso_date(value),
            AdifField::TimeOn => qso.with_time_on(value),
            AdifField::TimeOff => qso.with_time_off(value),
            AdifField::StationCallsign => qso.with_station_callsign(value),
            AdifField::Band => qso.with_band(value),
            AdifField::Mode => qso.with_mode(value),
            AdifField::MyState => qso.with_my_state(value),
            AdifField::SigInfo => qso.with_sig_info(value),
            AdifField::Comment => qso.with_comment(value),
        }
    }
}

/// A record with enough fields to take part in duplicate checks.
fn is_complete(qso: &QsoRecord) -> bool {
    qso.has_call() && qso.qso_date.is_some() && qso.time_on.is_some()
}

/// Skip anything up to the next `<`.
fn skip_to_tag(input: &str) -> IResult<&str, &str> {
    take_until("<").parse(input)
}

/// Parse one `<name:len:type>` tag, returning the field name.
fn parse_tag(input: &str) -> IResult<&str, &str> {
    let (input, body) = delimited(char('<'), take_until(">"), char('>')).parse(input)?;
    let name = body.split(':').next().unwrap_or(body);
    Ok((input, name.trim()))
}

/// Everything up to the next `<` (or the end of input).
fn parse_value(input: &str) -> IResult<&str, &str> {
    take_till(|c: char| c == '<').parse(input)
}

/// Byte offset just past a case-insensitive `<eoh>`, if the text has a header.
fn body_start(text: &str) -> usize {
    // ASCII lowercasing keeps byte offsets intact.
    text.to_ascii_lowercase()
        .find("<eoh>")
        .map(|i| i + "<eoh>".len())
        .unwrap_or(0)
}

/// 1-based line number of a byte offset, for warnings.
fn line_of(text: &str, offset: usize) -> usize {
    text[..offset].matches('\n').count() + 1
}

/// Parse ADIF text into records.
///
/// Records missing `call`, `qso_date` or `time_on` when their `<eor>` is
/// reached are dropped with a warning. A complete record left open at the
/// end of the text is kept.
///
/// # Example
///
/// ```
/// use pota_adif::adif::parse_adif;
///
/// let parsed = parse_adif("<CALL:5>K5OHY <QSO_DATE:8>20240501 <TIME_ON:4>1430 <EOR>");
/// assert_eq!(parsed.records.len(), 1);
/// assert_eq!(parsed.records[0].call, "K5OHY");
/// ```
pub fn parse_adif(text: &str) -> ParsedLog {
    let mut parsed = ParsedLog::default();
    let start = body_start(text);
    let mut input = &text[start..];
    let mut current = QsoRecord::default();
    let mut record_start = start;

    loop {
        let Ok((after_skip, _)) = skip_to_tag(input) else {
            break;
        };
        let tag_offset = text.len() - after_skip.len();
        let (after_tag, name) = match parse_tag(after_skip) {
            Ok(parsed_tag) => parsed_tag,
            Err(_) => {
                debug!("Unterminated ADIF tag at byte {}", tag_offset);
                break;
            }
        };
        let (rest, value) = match parse_value(after_tag) {
            Ok(v) => v,
            Err(_) => (after_tag, ""),
        };
        input = rest;

        if name.eq_ignore_ascii_case("eor") {
            let record = std::mem::take(&mut current);
            if is_complete(&record) {
                parsed.records.push(record);
            } else {
                let line = line_of(text, record_start);
                warn!("Dropping incomplete ADIF record at line {}", line);
                parsed.warnings.push(ParseWarning::new(
                    line,
                    text[record_start..tag_offset].trim(),
                    "record is missing call, qso_date or time_on",
                ));
            }
            record_start = text.len() - input.len();
            continue;
        }

        match AdifField::from_name(name) {
            Some(field) => current = field.apply(current, value),
            None => debug!("Ignoring ADIF field {}", name),
        }
    }

    if is_complete(&current) {
        debug!("Keeping unterminated final ADIF record for {}", current.call);
        parsed.records.push(current);
    } else if current != QsoRecord::default() {
        let line = line_of(text, record_start);
        parsed.warnings.push(ParseWarning::new(
            line,
            text[record_start..].trim(),
            "record is missing call, qso_date or time_on",
        ));
    }

    parsed
}

/// Parse raw ADIF file bytes, which must be UTF-8 (a leading BOM is ignored).
pub fn parse_adif_bytes(bytes: &[u8]) -> Result<ParsedLog, AdifError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let text = std::str::from_utf8(bytes)?;
    Ok(parse_adif(text))
}

/// Append one `<name:len>value` tag. The length is the character count of
/// the value as written.
fn push_field(out: &mut String, name: &str, value: &str) {
    // Writing into a String cannot fail.
    let _ = write!(out, "<{}:{}>{} ", name, value.chars().count(), value);
}

/// Serialize one record, terminated by `<eor>` and a newline.
pub fn write_record(out: &mut String, qso: &QsoRecord) {
    for field in AdifField::ALL {
        if let Some(value) = field.value(qso) {
            push_field(out, field.name(), value);
        }
    }
    out.push_str("<eor>\n");
}

/// Serialize records to ADIF text, in order.
///
/// # Example
///
/// ```
/// use pota_adif::{adif::write_adif, qso::QsoRecord};
///
/// let qso = QsoRecord::new("K5OHY").with_band("20m");
/// assert_eq!(write_adif(&[qso]), "<call:5>K5OHY <band:3>20m <eor>\n");
/// ```
pub fn write_adif(records: &[QsoRecord]) -> String {
    let mut out = String::with_capacity(records.len() * 160);
    for qso in records {
        write_record(&mut out, qso);
    }
    out
}

/// An ADIF file header naming the producing program.
pub fn adif_header(program_id: &str, program_version: &str) -> String {
    let mut out = format!("Generated by {} {}\n", program_id, program_version);
    push_field(&mut out, "adif_ver", "3.1.4");
    push_field(&mut out, "programid", program_id);
    push_field(&mut out, "programversion", program_version);
    out.push_str("<eoh>\n\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_qso() -> QsoRecord {
        QsoRecord::new("K5OHY")
            .with_station_callsign("W1AW")
            .with_qso_date("20240501")
            .with_time_on("1430")
            .with_band("20m")
            .with_mode("SSB")
            .with_my_state("IL")
            .with_sig_info("US-1234")
            .with_comment("[POTA US-1234 Some State Park]")
    }

    #[test]
    fn test_write_record_lengths_and_order() {
        let out = write_adif(&[sample_qso()]);
        assert_eq!(
            out,
            "<qso_date:8>20240501 <time_on:4>1430 <call:5>K5OHY <station_callsign:4>W1AW \
             <band:3>20m <mode:3>SSB <my_state:2>IL <sig_info:7>US-1234 \
             <comment:30>[POTA US-1234 Some State Park] <eor>\n"
        );
    }

    #[test]
    fn test_write_omits_empty_fields() {
        let out = write_adif(&[QsoRecord::new("W1AW")]);
        assert_eq!(out, "<call:4>W1AW <eor>\n");
        assert!(!out.contains(":0>"));
    }

    #[test]
    fn test_write_length_counts_characters() {
        let qso = QsoRecord::new("W1AW").with_comment("Parc Régional");
        assert!(write_adif(&[qso]).contains("<comment:13>Parc Régional "));
    }

    #[test]
    fn test_write_record_appends_to_buffer() {
        let mut out = adif_header("pota-adif", "0.1.0");
        let header_len = out.len();
        write_record(&mut out, &QsoRecord::new("W1AW").with_band("40m"));
        write_record(&mut out, &QsoRecord::new("N0AX"));

        assert!(out.starts_with("Generated by pota-adif 0.1.0\n<adif_ver:5>3.1.4 "));
        assert_eq!(
            &out[header_len..],
            "<call:4>W1AW <band:3>40m <eor>\n<call:4>N0AX <eor>\n"
        );
    }

    #[test]
    fn test_parse_case_insensitive_tags() {
        let text = "<Call:4>W1AW <qso_date:8>20240501 <TIME_ON:6>143015 <BAND:3>20M <Mode:2>cw <eor>";
        let parsed = parse_adif(text);

        assert_eq!(parsed.records.len(), 1);
        let qso = &parsed.records[0];
        assert_eq!(qso.call, "W1AW");
        assert_eq!(qso.time_on.as_deref(), Some("1430"));
        assert_eq!(qso.band.as_deref(), Some("20m"));
        assert_eq!(qso.mode.as_deref(), Some("CW"));
    }

    #[test]
    fn test_parse_ignores_declared_length() {
        let parsed = parse_adif("<call:2>K5OHY <qso_date:8>20240501 <time_on:9>1430<eor>");
        assert_eq!(parsed.records[0].call, "K5OHY");
        assert_eq!(parsed.records[0].time_on.as_deref(), Some("1430"));
    }

    #[test]
    fn test_parse_skips_header() {
        let text = "Exported <by> logger\n<adif_ver:5>3.1.4\n<call:4>XXXX <EOH>\n\
                    <call:5>K5OHY <qso_date:8>20240501 <time_on:4>1430 <eor>\n";
        let parsed = parse_adif(text);

        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].call, "K5OHY");
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn test_parse_type_indicator_in_tag() {
        let parsed = parse_adif("<call:4:S>W1AW <qso_date:8:D>20240501 <time_on:4:T>1430 <eor>");
        assert_eq!(parsed.records.len(), 1);
    }

    #[test]
    fn test_missing_call_drops_record() {
        let text = "<qso_date:8>20240501 <time_on:4>1430 <band:3>20m <eor>\n\
                    <call:4>W1AW <qso_date:8>20240501 <time_on:4>1500 <eor>\n";
        let parsed = parse_adif(text);

        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.records[0].call, "W1AW");
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].line, 1);
    }

    #[test]
    fn test_flush_on_eof() {
        let parsed = parse_adif("<call:4>W1AW <qso_date:8>20240501 <time_on:4>1430");
        assert_eq!(parsed.records.len(), 1);
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn test_incomplete_trailing_record_is_reported() {
        let parsed = parse_adif("<call:4>W1AW <eor>\n<call:4>N0AX");
        assert!(parsed.records.is_empty());
        assert_eq!(parsed.warnings.len(), 2);
        assert_eq!(parsed.warnings[1].line, 2);
    }

    #[test]
    fn test_unmodeled_fields_are_ignored() {
        let text = "<call:4>W1AW <qso_date:8>20240501 <time_on:4>1430 <rst_sent:2>59 <eor>";
        let parsed = parse_adif(text);
        let expected = QsoRecord::new("W1AW")
            .with_qso_date("20240501")
            .with_time_on("1430");
        assert_eq!(parsed.records, vec![expected]);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse_adif(""), ParsedLog::default());
        assert_eq!(parse_adif("just some text"), ParsedLog::default());
    }

    #[test]
    fn test_parse_bytes_rejects_invalid_utf8() {
        let err = parse_adif_bytes(b"<call:4>W1\xFF\xFE <eor>").unwrap_err();
        assert!(matches!(err, AdifError::Decode(_)));
    }

    #[test]
    fn test_parse_bytes_strips_bom() {
        let parsed =
            parse_adif_bytes(b"\xEF\xBB\xBF<call:4>W1AW <qso_date:8>20240501 <time_on:4>1430 <eor>")
                .unwrap();
        assert_eq!(parsed.records.len(), 1);
    }

    #[test]
    fn test_header_round_trip() {
        let mut text = adif_header("pota-adif", "0.1.0");
        text.push_str(&write_adif(&[sample_qso()]));
        let parsed = parse_adif(&text);
        assert_eq!(parsed.records, vec![sample_qso()]);
    }

    fn token(pattern: &'static str) -> impl Strategy<Value = String> {
        proptest::string::string_regex(pattern).unwrap()
    }

    proptest! {
        #[test]
        fn written_records_parse_back(
            call in token("[A-Z]{1,2}[0-9][A-Z]{1,3}"),
            date in token("20[0-9]{2}(0[1-9]|1[0-2])(0[1-9]|1[0-9]|2[0-8])"),
            time in token("([01][0-9]|2[0-3])[0-5][0-9]"),
            band in token("[0-9]{1,3}c?m"),
            mode in token("[A-Z][A-Z0-9]{1,4}"),
        ) {
            let qso = QsoRecord::new(&call)
                .with_qso_date(&date)
                .with_time_on(&time)
                .with_band(&band)
                .with_mode(&mode);
            let parsed = parse_adif(&write_adif(std::slice::from_ref(&qso)));

            prop_assert_eq!(parsed.records.len(), 1);
            let back = &parsed.records[0];
            prop_assert_eq!(&back.call, &qso.call);
            prop_assert_eq!(&back.qso_date, &qso.qso_date);
            prop_assert_eq!(&back.time_on, &qso.time_on);
            prop_assert_eq!(&back.band, &qso.band);
            prop_assert_eq!(&back.mode, &qso.mode);
        }
    }
}
