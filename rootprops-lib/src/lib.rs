//! rootprops-lib: Library for analyzing the public keys in a root certificate store.
//!
//! Loads an NSS-style `certdata.json` trust store, keeps the roots trusted to
//! delegate for TLS server authentication, classifies each root's public key,
//! and tallies algorithm, curve, and RSA key-size distributions. Also converts
//! Mozilla's `certdata.txt` into the JSON form the analysis consumes.

mod certdata;
mod classify;
mod oid;
mod report;
mod stats;
mod store;
mod util;

pub use certdata::{parse_certdata, ConvertedRoot, ConvertedStore};
pub use classify::{
    classify_der, classify_spki, decode_certificate, EcCurve, KeyAlgorithm, KeyClass,
};
pub use report::display_report;
pub use stats::{analyze, RootStats, SkipReason, SkippedEntry};
pub use store::{RootEntry, RootStore, RootTrust, TRUSTED_DELEGATOR};
pub use util::modulus_bits;

/// Errors returned by rootprops-lib.
#[derive(Debug, thiserror::Error)]
pub enum RootPropsError {
    #[error("Invalid root store JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid base64: {0}")]
    Base64(String),

    #[error("Invalid DER certificate: {0}")]
    Der(String),

    #[error("Invalid certdata: {0}")]
    Certdata(String),
}
