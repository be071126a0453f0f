//! Certificate decoding and public-key classification.

use crate::oid;
use crate::util;
use crate::RootPropsError;
use std::fmt;
use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey;

/// Public-key algorithms that have their own distribution table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyAlgorithm {
    Ecdsa,
    Rsa,
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAlgorithm::Ecdsa => f.pad("ECDSA"),
            KeyAlgorithm::Rsa => f.pad("RSA"),
        }
    }
}

/// Elliptic curve of an ECDSA public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcCurve {
    /// A curve with a well-known short name (e.g. "P-256").
    Named(&'static str),
    /// A named-curve OID without a short name, kept in dotted form.
    Unrecognized(String),
    /// Curve parameters missing or not a named curve, or a malformed point.
    Invalid,
}

impl EcCurve {
    /// Sentinel table key for keys whose curve could not be determined.
    pub const INVALID: &'static str = "invalid";

    /// Key under which this curve is tallied.
    pub fn name(&self) -> &str {
        match self {
            EcCurve::Named(name) => name,
            EcCurve::Unrecognized(oid) => oid,
            EcCurve::Invalid => Self::INVALID,
        }
    }
}

impl fmt::Display for EcCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Classification of a certificate's subject public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyClass {
    Ecdsa { curve: EcCurve },
    /// RSA key; `bits` is 0 when the RSAPublicKey structure is malformed.
    Rsa { bits: u32 },
    /// Any other algorithm, by short name or dotted OID.
    Other { algorithm: String },
}

impl KeyClass {
    /// The distribution-table algorithm, if this key type has one.
    pub fn algorithm(&self) -> Option<KeyAlgorithm> {
        match self {
            KeyClass::Ecdsa { .. } => Some(KeyAlgorithm::Ecdsa),
            KeyClass::Rsa { .. } => Some(KeyAlgorithm::Rsa),
            KeyClass::Other { .. } => None,
        }
    }
}

impl fmt::Display for KeyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyClass::Ecdsa { curve } => write!(f, "ECDSA ({})", curve),
            KeyClass::Rsa { bits } => write!(f, "RSA ({} bit)", bits),
            KeyClass::Other { algorithm } => write!(f, "{}", algorithm),
        }
    }
}

/// Decode the base64 `CKA_VALUE` of a root into DER bytes.
pub fn decode_certificate(value: &str) -> Result<Vec<u8>, RootPropsError> {
    util::decode_base64(value).map_err(|e| RootPropsError::Base64(e.to_string()))
}

/// Parse a DER certificate and classify its subject public key.
///
/// The input must hold exactly one certificate; trailing bytes are rejected.
pub fn classify_der(input: &[u8]) -> Result<KeyClass, RootPropsError> {
    let (remaining, x509) =
        X509Certificate::from_der(input).map_err(|e| RootPropsError::Der(e.to_string()))?;
    if !remaining.is_empty() {
        return Err(RootPropsError::Der(format!(
            "{} trailing bytes after certificate",
            remaining.len()
        )));
    }
    Ok(classify_spki(x509.public_key()))
}

/// Classify a SubjectPublicKeyInfo.
///
/// Never fails: a malformed key of a known algorithm is reported with the
/// sentinel curve or bit length rather than an error.
pub fn classify_spki(spki: &SubjectPublicKeyInfo) -> KeyClass {
    let oid_str = spki.algorithm.algorithm.to_id_string();

    match oid_str.as_str() {
        oid::EC_PUBLIC_KEY => KeyClass::Ecdsa {
            curve: extract_ec_curve(&spki.algorithm, &spki.subject_public_key.data),
        },
        oid::RSA_ENCRYPTION => {
            let bits = match spki.parsed() {
                Ok(PublicKey::RSA(rsa)) => util::modulus_bits(rsa.modulus),
                _ => 0,
            };
            KeyClass::Rsa { bits }
        }
        other => KeyClass::Other {
            algorithm: algorithm_name(other),
        },
    }
}

fn algorithm_name(oid_str: &str) -> String {
    match oid_str {
        oid::RSASSA_PSS => "RSASSA-PSS".into(),
        oid::DSA => "DSA".into(),
        oid::ED25519 => "Ed25519".into(),
        oid::ED448 => "Ed448".into(),
        other => other.to_string(),
    }
}

/// Short name and field-element size in bytes for each known curve.
fn known_curve(oid_str: &str) -> Option<(&'static str, usize)> {
    match oid_str {
        oid::CURVE_P224 => Some(("P-224", 28)),
        oid::CURVE_P256 => Some(("P-256", 32)),
        oid::CURVE_P384 => Some(("P-384", 48)),
        oid::CURVE_P521 => Some(("P-521", 66)),
        oid::CURVE_SECP256K1 => Some(("secp256k1", 32)),
        _ => None,
    }
}

fn extract_ec_curve(algo: &AlgorithmIdentifier, point: &[u8]) -> EcCurve {
    let Some(curve_oid) = algo
        .parameters
        .as_ref()
        .and_then(|params| params.as_oid().ok())
    else {
        return EcCurve::Invalid;
    };
    let curve_oid = curve_oid.to_id_string();

    match known_curve(&curve_oid) {
        Some((name, field_len)) if is_valid_point(point, Some(field_len)) => EcCurve::Named(name),
        Some(_) => EcCurve::Invalid,
        None if is_valid_point(point, None) => EcCurve::Unrecognized(curve_oid),
        None => EcCurve::Invalid,
    }
}

/// Check the SEC 1 encoding of an EC point.
///
/// With a known field size the exact compressed or uncompressed length is
/// required; otherwise only the leading format byte is checked.
fn is_valid_point(point: &[u8], field_len: Option<usize>) -> bool {
    match (point.first().copied(), field_len) {
        (Some(0x04), Some(n)) => point.len() == 1 + 2 * n,
        (Some(0x02 | 0x03), Some(n)) => point.len() == 1 + n,
        (Some(0x04), None) => point.len() >= 3 && point.len() % 2 == 1,
        (Some(0x02 | 0x03), None) => point.len() >= 2,
        _ => false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // SEQUENCE { SEQUENCE { rsaEncryption, NULL }, BIT STRING { de ad be } }
    const SPKI_RSA_GARBAGE: &[u8] = &[
        0x30, 0x15, 0x30, 0x0d, 0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01, 0x01,
        0x05, 0x00, 0x03, 0x04, 0x00, 0xde, 0xad, 0xbe,
    ];

    // SEQUENCE { SEQUENCE { id-ecPublicKey }, BIT STRING { 01 02 03 } }
    const SPKI_EC_NO_PARAMS: &[u8] = &[
        0x30, 0x11, 0x30, 0x09, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x03, 0x04,
        0x00, 0x01, 0x02, 0x03,
    ];

    // SEQUENCE { SEQUENCE { id-ecPublicKey, prime256v1 }, BIT STRING { 05 06 07 } }
    const SPKI_P256_BAD_POINT: &[u8] = &[
        0x30, 0x1b, 0x30, 0x13, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x08,
        0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07, 0x03, 0x04, 0x00, 0x05, 0x06, 0x07,
    ];

    fn classify_spki_der(der: &[u8]) -> KeyClass {
        let (_, spki) = SubjectPublicKeyInfo::from_der(der).unwrap();
        classify_spki(&spki)
    }

    #[test]
    fn malformed_rsa_key_reports_zero_bits() {
        assert_eq!(
            classify_spki_der(SPKI_RSA_GARBAGE),
            KeyClass::Rsa { bits: 0 }
        );
    }

    #[test]
    fn ec_key_without_curve_is_invalid() {
        assert_eq!(
            classify_spki_der(SPKI_EC_NO_PARAMS),
            KeyClass::Ecdsa {
                curve: EcCurve::Invalid
            }
        );
    }

    #[test]
    fn ec_key_with_malformed_point_is_invalid() {
        assert_eq!(
            classify_spki_der(SPKI_P256_BAD_POINT),
            KeyClass::Ecdsa {
                curve: EcCurve::Invalid
            }
        );
    }

    #[test]
    fn point_encoding_checks() {
        let mut uncompressed = vec![0x04];
        uncompressed.extend_from_slice(&[0xAA; 64]);
        assert!(is_valid_point(&uncompressed, Some(32)));
        assert!(!is_valid_point(&uncompressed, Some(48)));

        let mut compressed = vec![0x03];
        compressed.extend_from_slice(&[0xAA; 48]);
        assert!(is_valid_point(&compressed, Some(48)));
        assert!(is_valid_point(&compressed, None));

        assert!(!is_valid_point(&[], None));
        assert!(!is_valid_point(&[0x00], None));
        assert!(!is_valid_point(&[0x04, 0x01], None));
    }

    #[test]
    fn curve_names() {
        assert_eq!(EcCurve::Named("P-384").to_string(), "P-384");
        assert_eq!(
            EcCurve::Unrecognized("1.3.36.3.3.2.8.1.1.7".into()).to_string(),
            "1.3.36.3.3.2.8.1.1.7"
        );
        assert_eq!(EcCurve::Invalid.to_string(), "invalid");
        assert_eq!(format!("{:<7}|", EcCurve::Invalid), "invalid|");
        assert_eq!(format!("{:<7}|", EcCurve::Named("P-256")), "P-256  |");
    }

    #[test]
    fn algorithm_of_each_class() {
        assert_eq!(
            KeyClass::Rsa { bits: 2048 }.algorithm(),
            Some(KeyAlgorithm::Rsa)
        );
        assert_eq!(
            KeyClass::Ecdsa {
                curve: EcCurve::Invalid
            }
            .algorithm(),
            Some(KeyAlgorithm::Ecdsa)
        );
        assert_eq!(
            KeyClass::Other {
                algorithm: "Ed25519".into()
            }
            .algorithm(),
            None
        );
        assert_eq!(format!("{:<7}|", KeyAlgorithm::Rsa), "RSA    |");
    }

    #[test]
    fn other_algorithms_use_short_names() {
        assert_eq!(algorithm_name(oid::ED25519), "Ed25519");
        assert_eq!(algorithm_name(oid::DSA), "DSA");
        assert_eq!(algorithm_name("1.2.3.4"), "1.2.3.4");
    }

    #[test]
    fn decode_rejects_invalid_base64() {
        assert!(matches!(
            decode_certificate("MIIB!!"),
            Err(RootPropsError::Base64(_))
        ));
    }

    #[test]
    fn classify_rejects_non_certificate_bytes() {
        assert!(matches!(
            classify_der(&[0x30, 0x03, 0x02, 0x01, 0x01]),
            Err(RootPropsError::Der(_))
        ));
        assert!(matches!(classify_der(&[]), Err(RootPropsError::Der(_))));
        assert!(classify_der(b"hello").is_err());
    }
}
