//! Root store loading and server-auth trust filtering.

use crate::RootPropsError;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Trust value marking a root as a trusted delegator (a trust anchor) for a purpose.
pub const TRUSTED_DELEGATOR: &str = "CKT_NSS_TRUSTED_DELEGATOR";

/// Root store mapping each trust-anchor label to its entry.
///
/// Entries are kept sorted by label so a pass over the store is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct RootStore {
    entries: BTreeMap<String, RootEntry>,
}

/// A single root: its certificate and trust flags.
///
/// Only the attributes the analysis needs are extracted; every other
/// attribute in the JSON object is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RootEntry {
    /// Base64-encoded DER certificate.
    #[serde(rename = "CKA_VALUE", default)]
    pub certificate: String,
    /// Per-purpose trust flags.
    #[serde(rename = "trust", default)]
    pub trust: RootTrust,
}

/// Per-purpose trust flags of a root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RootTrust {
    /// Trust for TLS server authentication, e.g. `CKT_NSS_TRUSTED_DELEGATOR`.
    #[serde(rename = "CKA_TRUST_SERVER_AUTH", default)]
    pub server_auth: String,
}

impl RootStore {
    /// Parse a root store from `certdata.json` contents.
    ///
    /// Missing attributes read as empty strings. A document that is not an
    /// object of objects, or that carries a non-string value for one of the
    /// extracted attributes, is rejected.
    pub fn from_json(input: &[u8]) -> Result<Self, RootPropsError> {
        Ok(serde_json::from_slice(input)?)
    }

    /// Number of entries in the store.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by label.
    pub fn get(&self, label: &str) -> Option<&RootEntry> {
        self.entries.get(label)
    }

    /// Iterate over `(label, entry)` pairs in label order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RootEntry)> {
        self.entries.iter().map(|(label, entry)| (label.as_str(), entry))
    }
}

impl FromIterator<(String, RootEntry)> for RootStore {
    fn from_iter<I: IntoIterator<Item = (String, RootEntry)>>(iter: I) -> Self {
        RootStore {
            entries: iter.into_iter().collect(),
        }
    }
}

impl RootEntry {
    /// Build an entry from a base64 certificate and a server-auth trust value.
    pub fn new(certificate: impl Into<String>, server_auth: impl Into<String>) -> Self {
        RootEntry {
            certificate: certificate.into(),
            trust: RootTrust {
                server_auth: server_auth.into(),
            },
        }
    }

    /// Whether this root is a trusted delegator for TLS server authentication.
    ///
    /// The comparison is exact: partial-trust values, other casings, and an
    /// absent flag all count as untrusted.
    pub fn is_trusted_for_server_auth(&self) -> bool {
        self.trust.server_auth == TRUSTED_DELEGATOR
    }
}
