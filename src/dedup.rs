//! Duplicate detection against a previously logged set of contacts.
//!
//! Two records are the same contact when call, band and mode match
//! (ignoring case) and their start times are within a tolerance window.
//! Records without a usable date and time are never treated as duplicates.

use chrono::NaiveDateTime;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::qso::QsoRecord;

/// Default tolerance window in minutes.
pub const DEFAULT_TOLERANCE_MINUTES: u32 = 10;

/// Largest tolerance accepted from configuration (one day).
pub const MAX_TOLERANCE_MINUTES: u32 = 24 * 60;

/// Settings for duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Maximum start-time difference, in minutes, for two otherwise
    /// matching records to count as the same contact.
    pub tolerance_minutes: u32,

    /// Also drop records that repeat an earlier record of the same paste.
    pub within_batch: bool,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            tolerance_minutes: DEFAULT_TOLERANCE_MINUTES,
            within_batch: false,
        }
    }
}

impl DedupConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.tolerance_minutes > MAX_TOLERANCE_MINUTES {
            return Err(format!(
                "tolerance_minutes {} exceeds the maximum of {}",
                self.tolerance_minutes, MAX_TOLERANCE_MINUTES
            ));
        }
        Ok(())
    }
}

/// Fields that must match exactly (after case folding) for two records to
/// be compared by time at all.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MatchKey {
    call: String,
    band: Option<String>,
    mode: Option<String>,
}

impl MatchKey {
    fn of(qso: &QsoRecord) -> Self {
        Self {
            call: qso.call.to_ascii_uppercase(),
            band: qso.band.as_deref().map(str::to_ascii_lowercase),
            mode: qso.mode.as_deref().map(str::to_ascii_uppercase),
        }
    }
}

/// Known contacts bucketed by [`MatchKey`].
#[derive(Debug, Default)]
struct KnownIndex {
    buckets: HashMap<MatchKey, Vec<NaiveDateTime>>,
}

impl KnownIndex {
    fn insert(&mut self, key: MatchKey, at: NaiveDateTime) {
        self.buckets.entry(key).or_default().push(at);
    }

    fn times(&self, key: &MatchKey) -> &[NaiveDateTime] {
        self.buckets.get(key).map(Vec::as_slice).unwrap_or_default()
    }
}

/// The result of filtering a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupOutcome {
    /// Records judged new, in input order.
    pub kept: Vec<QsoRecord>,
    /// Records judged duplicates, in input order.
    pub duplicates: Vec<QsoRecord>,
    /// How many kept records had no usable timestamp.
    pub undated: usize,
}

/// Filters new records against previously logged ones.
#[derive(Debug, Clone)]
pub struct DedupFilter {
    tolerance_minutes: i64,
    within_batch: bool,
}

impl Default for DedupFilter {
    fn default() -> Self {
        Self::new(&DedupConfig::default())
    }
}

impl DedupFilter {
    /// Create a filter from configuration.
    pub fn new(config: &DedupConfig) -> Self {
        Self {
            tolerance_minutes: i64::from(config.tolerance_minutes),
            within_batch: config.within_batch,
        }
    }

    /// Whether two start times fall inside the window. The boundary is
    /// inclusive.
    fn within_tolerance(&self, a: NaiveDateTime, b: NaiveDateTime) -> bool {
        (a - b).num_minutes().abs() <= self.tolerance_minutes
    }

    /// Split `candidates` into new records and duplicates of `known`.
    ///
    /// Input order is preserved in both outputs. With `within_batch` set, a
    /// candidate is also checked against the candidates kept before it.
    pub fn filter(&self, candidates: Vec<QsoRecord>, known: &[QsoRecord]) -> DedupOutcome {
        let mut index = KnownIndex::default();
        for qso in known {
            if let Some(at) = qso.timestamp() {
                index.insert(MatchKey::of(qso), at);
            }
        }

        let mut outcome = DedupOutcome::default();
        for candidate in candidates {
            let Some(at) = candidate.timestamp() else {
                warn!(
                    "No usable date/time for {}, keeping it without a duplicate check",
                    candidate
                );
                outcome.undated += 1;
                outcome.kept.push(candidate);
                continue;
            };

            let key = MatchKey::of(&candidate);
            if index
                .times(&key)
                .iter()
                .any(|known_at| self.within_tolerance(at, *known_at))
            {
                debug!("Duplicate: {}", candidate);
                outcome.duplicates.push(candidate);
                continue;
            }

            if self.within_batch {
                index.insert(key, at);
            }
            outcome.kept.push(candidate);
        }

        if !outcome.duplicates.is_empty() {
            info!(
                "Deduplication: removed {} duplicate records (tolerance: {} min)",
                outcome.duplicates.len(),
                self.tolerance_minutes
            );
        }

        outcome
    }
}
