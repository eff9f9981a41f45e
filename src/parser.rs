//! Parser for pasted POTA hunter logs.
//!
//! The hunter log page has changed its column layout and delimiters more
//! than once, so the parser recognizes three layouts and tries them in a
//! fixed order for every line:
//!
//! 1. [`LogLineFormat::MultiLineBlock`], four lines per contact:
//!    ```text
//!    2024-05-01 14:30
//!    K5OHY
//!    K5OHY
//!    W1AW 20m (SSB) US-IL US-1234 Some State Park
//!    ```
//! 2. [`LogLineFormat::Tagged`], a fixed-arity single line parsed with `nom`:
//!    ```text
//!    2024-05-01 14:30 W1AW K5OHY 20m SSB US-IL 1234 Some State Park
//!    ```
//! 3. [`LogLineFormat::SingleLine`], at least eight whitespace or tab
//!    separated columns, anything past the location joined as park name:
//!    ```text
//!    2024-05-01 14:30 K5OHY W1AW K5OHY 20m SSB US-1234 Some State Park
//!    ```
//!
//! Lines that match none of them are skipped and reported as a
//! [`ParseWarning`]; one bad line never stops the rest of the paste.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag_no_case, take_while_m_n, take_while1},
    character::complete::{char, digit1, space1},
    combinator::{opt, recognize, rest, verify},
    sequence::{delimited, preceded},
};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::iter::Enumerate;
use std::str::Lines;
use thiserror::Error;
use tracing::debug;

use crate::qso::{QsoRecord, state_from_location};

/// Minimum column count for the single-line layout.
pub const SINGLE_LINE_MIN_FIELDS: usize = 8;

/// Minimum token count on the detail line of a multi-line block.
pub const BLOCK_DETAIL_MIN_FIELDS: usize = 5;

/// Substrings that mark table headers and pagination rows.
pub const DEFAULT_HEADER_MARKERS: &[&str] = &["Hunter", "Rows per page"];

/// Errors that can occur while interpreting a line or block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Invalid line format: {0}")]
    InvalidFormat(String),

    #[error("Expected at least {expected} fields, found {found}")]
    TooFewFields { expected: usize, found: usize },

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid band: {0}")]
    InvalidBand(String),

    #[error("Incomplete multi-line block")]
    IncompleteBlock,
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// The layouts a hunter log line can come in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLineFormat {
    /// One contact per line, split on whitespace or tabs.
    SingleLine,
    /// One contact spread over four lines.
    MultiLineBlock,
    /// One contact per line matching the fixed tagged grammar.
    Tagged,
}

impl fmt::Display for LogLineFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLineFormat::SingleLine => write!(f, "single-line"),
            LogLineFormat::MultiLineBlock => write!(f, "multi-line block"),
            LogLineFormat::Tagged => write!(f, "tagged"),
        }
    }
}

/// A line (or block) that was skipped, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    /// 1-based line number in the input (first line of a block).
    pub line: usize,
    /// The raw text that could not be used.
    pub raw: String,
    /// Human-readable reason.
    pub reason: String,
}

impl ParseWarning {
    pub fn new(line: usize, raw: &str, reason: impl fmt::Display) -> Self {
        Self {
            line,
            raw: raw.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {} ({})", self.line, self.reason, self.raw)
    }
}

/// Records recovered from an input, plus everything that was skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedLog {
    pub records: Vec<QsoRecord>,
    pub warnings: Vec<ParseWarning>,
}

/// One step of [`LogParser`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    /// A contact was recovered.
    Record {
        line: usize,
        format: LogLineFormat,
        qso: QsoRecord,
    },
    /// A line or block could not be interpreted.
    Skipped(ParseWarning),
}

/// Lazy iterator over the contacts in a pasted hunter log.
///
/// Blank lines are dropped, and so are header/pagination rows wherever a
/// record could start. Each call to `next` consumes one line, or four for a
/// block.
pub struct LogParser<'a> {
    source: Enumerate<Lines<'a>>,
    pending: VecDeque<(usize, &'a str)>,
    header_markers: Vec<String>,
}

impl<'a> LogParser<'a> {
    /// Create a parser with the default header markers.
    pub fn new(text: &'a str) -> Self {
        Self {
            source: text.lines().enumerate(),
            pending: VecDeque::new(),
            header_markers: DEFAULT_HEADER_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }

    /// Add header markers on top of the defaults.
    pub fn with_extra_markers(mut self, markers: &[String]) -> Self {
        self.header_markers.extend(
            markers
                .iter()
                .filter(|m| !m.trim().is_empty())
                .cloned(),
        );
        self
    }

    /// Pull lines from the source until `n` non-blank ones are buffered.
    fn fill(&mut self, n: usize) {
        while self.pending.len() < n {
            let Some((idx, line)) = self.source.next() else {
                return;
            };
            let line = line.trim();
            if !line.is_empty() {
                self.pending.push_back((idx + 1, line));
            }
        }
    }

    /// Next buffered line that is not a header or pagination row.
    ///
    /// Only lines that would start a record are checked; the lines a block
    /// consumes are taken as they are.
    fn next_record_line(&mut self) -> Option<(usize, &'a str)> {
        loop {
            self.fill(1);
            let (line_no, line) = self.pending.pop_front()?;
            if is_header_line(line, self.header_markers.as_slice()) {
                debug!("Skipping header line {}: {}", line_no, line);
                continue;
            }
            return Some((line_no, line));
        }
    }

    /// Collect every entry into records and warnings.
    pub fn collect_log(self) -> ParsedLog {
        let mut parsed = ParsedLog::default();
        for entry in self {
            match entry {
                LogEntry::Record { qso, .. } => parsed.records.push(qso),
                LogEntry::Skipped(warning) => parsed.warnings.push(warning),
            }
        }
        parsed
    }
}

impl Iterator for LogParser<'_> {
    type Item = LogEntry;

    fn next(&mut self) -> Option<LogEntry> {
        let (line_no, line) = self.next_record_line()?;

        if is_block_start(line) {
            self.fill(3);
            if self.pending.len() < 3 {
                debug!("Incomplete block at line {}: {}", line_no, line);
                return Some(LogEntry::Skipped(ParseWarning::new(
                    line_no,
                    line,
                    ParseError::IncompleteBlock,
                )));
            }
            let block = [
                line,
                self.pending[0].1,
                self.pending[1].1,
                self.pending[2].1,
            ];
            return Some(match parse_block(&block) {
                Ok(qso) => {
                    self.pending.drain(..3);
                    LogEntry::Record {
                        line: line_no,
                        format: LogLineFormat::MultiLineBlock,
                        qso,
                    }
                }
                Err(e) => {
                    // Only the block header is dropped; the next lines get
                    // their own chance to parse.
                    debug!("Block parse error at line {}: {}", line_no, e);
                    LogEntry::Skipped(ParseWarning::new(line_no, line, e))
                }
            });
        }

        Some(match parse_line(line) {
            Ok((format, qso)) => LogEntry::Record {
                line: line_no,
                format,
                qso,
            },
            Err(e) => {
                debug!("Parse error for line {} '{}': {}", line_no, line, e);
                LogEntry::Skipped(ParseWarning::new(line_no, line, e))
            }
        })
    }
}

/// Parse a whole pasted log with the default header markers.
///
/// # Example
///
/// ```
/// use pota_adif::parser::parse_log;
///
/// let parsed = parse_log("2024-05-01 14:30 W1AW K5OHY 20m SSB US-IL 1234 Some Park\nnot a log line");
/// assert_eq!(parsed.records.len(), 1);
/// assert_eq!(parsed.records[0].qso_date.as_deref(), Some("20240501"));
/// assert_eq!(parsed.warnings.len(), 1);
/// ```
pub fn parse_log(text: &str) -> ParsedLog {
    LogParser::new(text).collect_log()
}

/// Parse one line with the single-line layouts, strictest first.
pub fn parse_line(line: &str) -> ParseResult<(LogLineFormat, QsoRecord)> {
    if let Ok(qso) = parse_tagged_line(line) {
        return Ok((LogLineFormat::Tagged, qso));
    }
    parse_single_line(line).map(|qso| (LogLineFormat::SingleLine, qso))
}

/// Whether a line is a table header or pagination row.
///
/// A line that starts with a date is never a header, so park names that
/// happen to contain a marker word survive.
pub fn is_header_line<S: AsRef<str>>(line: &str, markers: &[S]) -> bool {
    let starts_with_date = line
        .split_whitespace()
        .next()
        .is_some_and(looks_like_date);
    !starts_with_date && markers.iter().any(|m| line.contains(m.as_ref()))
}

/// Whether a line opens a multi-line block: exactly two tokens, one with a
/// `-` (the date) and the other with a `:` (the time).
#[inline]
pub fn is_block_start(line: &str) -> bool {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.as_slice() {
        [a, b] => (a.contains('-') && b.contains(':')) || (a.contains(':') && b.contains('-')),
        _ => false,
    }
}

fn looks_like_date(token: &str) -> bool {
    token.contains('-') && token.starts_with(|c: char| c.is_ascii_digit())
}

/// Check if a character is valid in a callsign.
///
/// Alphanumerics plus `/` for portable designators like `W1AW/P`.
fn is_callsign_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '/'
}

fn is_not_space(c: char) -> bool {
    !c.is_whitespace()
}

/// Between `min` and `max` ASCII digits.
fn digits<'a>(
    min: usize,
    max: usize,
) -> impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>> {
    take_while_m_n(min, max, |c: char| c.is_ascii_digit())
}

/// One or more ASCII alphanumerics.
fn word<'a>() -> impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>> {
    take_while1(|c: char| c.is_ascii_alphanumeric())
}

/// Parse an ISO date like `2024-05-01`.
fn parse_date(input: &str) -> IResult<&str, &str> {
    recognize((digits(4, 4), char('-'), digits(2, 2), char('-'), digits(2, 2))).parse(input)
}

/// Parse a clock time like `14:30` or `9:05:12`.
fn parse_time(input: &str) -> IResult<&str, &str> {
    recognize((
        digits(1, 2),
        char(':'),
        digits(2, 2),
        opt((char(':'), digits(2, 2))),
    ))
    .parse(input)
}

/// Parse a callsign; it must contain both a letter and a digit.
fn parse_callsign(input: &str) -> IResult<&str, &str> {
    verify(take_while1(is_callsign_char), |s: &str| {
        s.bytes().any(|b| b.is_ascii_digit()) && s.bytes().any(|b| b.is_ascii_alphabetic())
    })
    .parse(input)
}

/// Parse a band designator such as `20m`, `70cm` or `1.25m`.
fn parse_band(input: &str) -> IResult<&str, &str> {
    recognize((
        digit1,
        opt((char('.'), digit1)),
        opt(tag_no_case("c")),
        tag_no_case("m"),
    ))
    .parse(input)
}

/// Parse a mode, bare (`SSB`) or parenthesized (`(SSB)`).
fn parse_mode(input: &str) -> IResult<&str, &str> {
    alt((delimited(char('('), word(), char(')')), word())).parse(input)
}

/// Whether a whole token is a band designator.
fn is_band(token: &str) -> bool {
    parse_band(token).is_ok_and(|(remaining, _)| remaining.is_empty())
}

/// Whether a token is a park reference such as `US-1234` or `VE-0123`.
fn is_park_reference(token: &str) -> bool {
    match token.split_once('-') {
        Some((prefix, number)) => {
            !prefix.is_empty()
                && prefix.len() <= 4
                && prefix.bytes().all(|b| b.is_ascii_alphanumeric())
                && !number.is_empty()
                && number.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

/// Fields of a tagged line, borrowed from the input.
struct TaggedLine<'a> {
    date: &'a str,
    time: &'a str,
    call: &'a str,
    station: &'a str,
    band: &'a str,
    mode: &'a str,
    location: &'a str,
    reference: &'a str,
    park: &'a str,
}

fn tagged_line(input: &str) -> IResult<&str, TaggedLine<'_>> {
    let (input, date) = parse_date(input)?;
    let (input, _) = space1(input)?;
    let (input, time) = parse_time(input)?;
    let (input, _) = space1(input)?;
    let (input, call) = parse_callsign(input)?;
    let (input, _) = space1(input)?;
    let (input, station) = parse_callsign(input)?;
    let (input, _) = space1(input)?;
    let (input, band) = parse_band(input)?;
    let (input, _) = space1(input)?;
    let (input, mode) = parse_mode(input)?;
    let (input, _) = space1(input)?;
    let (input, location) = take_while1(is_not_space).parse(input)?;
    let (input, _) = space1(input)?;
    let (input, reference) = take_while1(is_not_space).parse(input)?;
    let (input, park) = opt(preceded(space1, rest)).parse(input)?;

    Ok((
        input,
        TaggedLine {
            date,
            time,
            call,
            station,
            band,
            mode,
            location,
            reference,
            park: park.unwrap_or("").trim(),
        },
    ))
}

/// Parse a line in the tagged layout:
/// `DATE TIME CALL STATION BAND MODE LOCATION REF [PARK NAME...]`.
///
/// # Example
///
/// ```
/// use pota_adif::parser::parse_tagged_line;
///
/// let qso = parse_tagged_line("2024-05-01 14:30 W1AW K5OHY 20m SSB US-IL 1234 Some Park").unwrap();
/// assert_eq!(qso.call, "W1AW");
/// assert_eq!(qso.sig_info.as_deref(), Some("US-1234"));
/// ```
pub fn parse_tagged_line(line: &str) -> ParseResult<QsoRecord> {
    let (_, t) =
        tagged_line(line.trim()).map_err(|e| ParseError::InvalidFormat(format!("{:?}", e)))?;

    let mut details: Vec<&str> = vec![t.reference];
    details.extend(t.park.split_whitespace());
    let park = ParkDetails::from_tokens(t.location, &details);

    let qso = QsoRecord::new(t.call)
        .with_station_callsign(t.station)
        .with_qso_date(t.date)
        .with_time_on(t.time)
        .with_band(t.band)
        .with_mode(t.mode);
    Ok(park.apply(qso))
}

/// Split a line into columns: on tabs if there are any, else on whitespace.
fn split_fields(line: &str) -> Vec<&str> {
    if line.contains('\t') {
        line.split('\t')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .collect()
    } else {
        line.split_whitespace().collect()
    }
}

/// Parse a line in the single-line layout:
/// `DATE TIME STATION OPERATOR WORKED BAND MODE LOCATION [PARK...]`.
pub fn parse_single_line(line: &str) -> ParseResult<QsoRecord> {
    let fields = split_fields(line);
    if fields.len() < SINGLE_LINE_MIN_FIELDS {
        return Err(ParseError::TooFewFields {
            expected: SINGLE_LINE_MIN_FIELDS,
            found: fields.len(),
        });
    }

    let (date, time) = (fields[0], fields[1]);
    if !date.contains('-') || !time.contains(':') {
        return Err(ParseError::InvalidFormat(format!(
            "expected date and time, found '{} {}'",
            date, time
        )));
    }
    if !is_band(fields[5]) {
        return Err(ParseError::InvalidBand(fields[5].to_string()));
    }

    let qso = QsoRecord::new(fields[4]);
    if !qso.has_call() {
        return Err(ParseError::MissingField("call"));
    }

    let park_tokens: Vec<&str> = fields[8..]
        .iter()
        .flat_map(|f| f.split_whitespace())
        .collect();
    let park = ParkDetails::from_tokens(fields[7], &park_tokens);

    let qso = qso
        .with_station_callsign(fields[3])
        .with_qso_date(date)
        .with_time_on(time)
        .with_band(fields[5])
        .with_mode(fields[6]);
    Ok(park.apply(qso))
}

/// Parse a four-line block. The third line repeats the callsign (or names
/// the operator) and is ignored.
pub fn parse_block(lines: &[&str; 4]) -> ParseResult<QsoRecord> {
    let stamp: Vec<&str> = lines[0].split_whitespace().collect();
    let (date, time) = match stamp.as_slice() {
        [a, b] if a.contains('-') && b.contains(':') => (*a, *b),
        [a, b] if a.contains(':') && b.contains('-') => (*b, *a),
        _ => {
            return Err(ParseError::InvalidFormat(format!(
                "expected 'date time', found '{}'",
                lines[0]
            )));
        }
    };

    let call = lines[1]
        .split_whitespace()
        .next()
        .ok_or(ParseError::MissingField("call"))?;

    let detail = split_fields(lines[3]);
    let detail: Vec<&str> = detail.iter().flat_map(|f| f.split_whitespace()).collect();
    if detail.len() < BLOCK_DETAIL_MIN_FIELDS {
        return Err(ParseError::TooFewFields {
            expected: BLOCK_DETAIL_MIN_FIELDS,
            found: detail.len(),
        });
    }
    if !is_band(detail[1]) {
        return Err(ParseError::InvalidBand(detail[1].to_string()));
    }

    let qso = QsoRecord::new(call);
    if !qso.has_call() {
        return Err(ParseError::MissingField("call"));
    }

    let park = ParkDetails::from_tokens(detail[3], &detail[4..]);
    let qso = qso
        .with_station_callsign(detail[0])
        .with_qso_date(date)
        .with_time_on(time)
        .with_band(detail[1])
        .with_mode(detail[2]);
    Ok(park.apply(qso))
}

/// Park location, reference and name pulled from the trailing columns.
#[derive(Debug, Default, PartialEq, Eq)]
struct ParkDetails {
    location: String,
    state: Option<String>,
    reference: Option<String>,
    name: String,
}

impl ParkDetails {
    /// Interpret `location` followed by the remaining tokens.
    ///
    /// The location is either the park reference itself (`US-1234`) or a
    /// `COUNTRY-STATE` code, in which case the next token may be the
    /// reference. A bare number borrows the location's country prefix.
    fn from_tokens(location: &str, rest: &[&str]) -> Self {
        let location = location.trim().to_string();

        if is_park_reference(&location) {
            return Self {
                reference: Some(location.to_ascii_uppercase()),
                name: rest.join(" "),
                location,
                state: None,
            };
        }

        let state = state_from_location(&location);
        let (reference, name_tokens) = match rest.split_first() {
            Some((first, tail)) if is_park_reference(first) => {
                (Some(first.to_ascii_uppercase()), tail)
            }
            Some((first, tail))
                if first.bytes().all(|b| b.is_ascii_digit()) && location.contains('-') =>
            {
                let country = location.split('-').next().unwrap_or_default();
                (
                    Some(format!("{}-{}", country.to_ascii_uppercase(), first)),
                    tail,
                )
            }
            _ => (None, rest),
        };

        Self {
            location,
            state,
            reference,
            name: name_tokens.join(" "),
        }
    }

    /// The POTA comment, e.g. `[POTA US-1234 Some State Park]`.
    fn comment(&self) -> String {
        let head = self.reference.as_deref().unwrap_or(&self.location);
        if self.name.is_empty() {
            format!("[POTA {}]", head)
        } else {
            format!("[POTA {} {}]", head, self.name)
        }
    }

    fn apply(&self, qso: QsoRecord) -> QsoRecord {
        let mut qso = qso.with_comment(&self.comment());
        if let Some(ref state) = self.state {
            qso = qso.with_my_state(state);
        }
        if let Some(ref reference) = self.reference {
            qso = qso.with_sig_info(reference);
        }
        qso
    }
}
