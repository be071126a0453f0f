//! The analysis pass: filter, decode, classify, and tally every root.

use crate::classify::{self, KeyAlgorithm, KeyClass};
use crate::store::{RootEntry, RootStore};
use crate::RootPropsError;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Why a server-auth trusted root was left out of the distributions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// `CKA_VALUE` is not valid base64.
    BadBase64(String),
    /// The decoded bytes are not a DER X.509 certificate.
    BadDer(String),
}

/// A trusted root that could not be analyzed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub label: String,
    pub reason: SkipReason,
}

impl fmt::Display for SkippedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            SkipReason::BadBase64(detail) => write!(
                f,
                "Error decoding base64 for label [{}]: {}",
                self.label, detail
            ),
            SkipReason::BadDer(detail) => write!(
                f,
                "Error parsing certificate for label [{}]: {}",
                self.label, detail
            ),
        }
    }
}

/// Counters and distributions gathered over a root store.
///
/// `processed` always equals `good` plus the three skip counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootStats {
    pub processed: usize,
    pub skipped_non_server_auth: usize,
    pub skipped_bad_base64: usize,
    pub skipped_bad_der: usize,
    pub good: usize,
    /// Count per public-key algorithm (ECDSA and RSA only).
    pub algorithms: BTreeMap<KeyAlgorithm, usize>,
    /// Count per ECDSA curve name, including the "invalid" sentinel.
    pub curves: BTreeMap<String, usize>,
    /// Count per RSA modulus bit length; 0 marks a malformed key.
    pub rsa_key_sizes: BTreeMap<u32, usize>,
    /// Trusted roots skipped for bad base64 or DER, in processing order.
    pub skipped: Vec<SkippedEntry>,
}

/// Strip the variant prefix so diagnostics read "<stage> for label [..]: <cause>".
fn detail(err: RootPropsError) -> String {
    match err {
        RootPropsError::Base64(d) | RootPropsError::Der(d) | RootPropsError::Certdata(d) => d,
        other => other.to_string(),
    }
}

/// Run the analysis pass over every entry of `store`.
///
/// Per-entry failures are counted and recorded in [`RootStats::skipped`];
/// the pass itself never fails.
pub fn analyze(store: &RootStore) -> RootStats {
    let mut stats = RootStats::default();
    for (label, entry) in store.iter() {
        stats.record(label, entry);
    }
    stats
}

impl RootStats {
    /// Process one root store entry.
    pub fn record(&mut self, label: &str, entry: &RootEntry) {
        self.processed += 1;

        if !entry.is_trusted_for_server_auth() {
            debug!(label, trust = %entry.trust.server_auth, "not trusted for server auth");
            self.skipped_non_server_auth += 1;
            return;
        }

        let der = match classify::decode_certificate(&entry.certificate) {
            Ok(der) => der,
            Err(e) => {
                self.skipped_bad_base64 += 1;
                self.skip(label, SkipReason::BadBase64(detail(e)));
                return;
            }
        };

        let class = match classify::classify_der(&der) {
            Ok(class) => class,
            Err(e) => {
                self.skipped_bad_der += 1;
                self.skip(label, SkipReason::BadDer(detail(e)));
                return;
            }
        };

        debug!(label, key = %class, "classified");
        self.good += 1;
        self.tally(&class);
    }

    fn skip(&mut self, label: &str, reason: SkipReason) {
        debug!(label, ?reason, "skipped");
        self.skipped.push(SkippedEntry {
            label: label.to_string(),
            reason,
        });
    }

    fn tally(&mut self, class: &KeyClass) {
        if let Some(algorithm) = class.algorithm() {
            *self.algorithms.entry(algorithm).or_default() += 1;
        }
        match class {
            KeyClass::Ecdsa { curve } => {
                *self.curves.entry(curve.name().to_string()).or_default() += 1;
            }
            KeyClass::Rsa { bits } => {
                *self.rsa_key_sizes.entry(*bits).or_default() += 1;
            }
            KeyClass::Other { .. } => {}
        }
    }

    /// Number of ECDSA or RSA roots tallied in the algorithm table.
    pub fn algorithm_total(&self) -> usize {
        self.algorithms.values().sum()
    }

    /// Check the counter and table-sum invariants.
    pub fn is_consistent(&self) -> bool {
        let algorithm_count =
            |alg: KeyAlgorithm| self.algorithms.get(&alg).copied().unwrap_or(0);

        self.processed
            == self.good
                + self.skipped_non_server_auth
                + self.skipped_bad_base64
                + self.skipped_bad_der
            && self.skipped.len() == self.skipped_bad_base64 + self.skipped_bad_der
            && self.algorithm_total() <= self.good
            && self.curves.values().sum::<usize>() == algorithm_count(KeyAlgorithm::Ecdsa)
            && self.rsa_key_sizes.values().sum::<usize>() == algorithm_count(KeyAlgorithm::Rsa)
    }
}
