//! Conversion of Mozilla NSS `certdata.txt` into the `certdata.json` root store.
//!
//! `certdata.txt` is a flat list of PKCS#11 attribute lines grouped into
//! objects, each object starting at its `CKA_CLASS` line:
//!
//! ```text
//! CKA_CLASS CK_OBJECT_CLASS CKO_CERTIFICATE
//! CKA_LABEL UTF8 "Example Root"
//! CKA_VALUE MULTILINE_OCTAL
//! \060\202\003\101...
//! END
//! ```
//!
//! Certificate objects (`CKO_CERTIFICATE`) are keyed by label, and the
//! `CKA_TRUST_*` attributes of the trust object (`CKO_NSS_TRUST`) with the
//! same label are attached under `trust`. Binary values are emitted as base64.

use crate::store::TRUSTED_DELEGATOR;
use crate::util;
use crate::RootPropsError;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

const CLASS_CERTIFICATE: &str = "CKO_CERTIFICATE";
const CLASS_TRUST: &str = "CKO_NSS_TRUST";
const TRUST_PREFIX: &str = "CKA_TRUST_";

/// Attribute name to value for one certdata object.
type Object = BTreeMap<String, String>;

/// A root certificate with its trust attributes merged in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConvertedRoot {
    /// Every attribute of the certificate object (`CKA_CLASS`, `CKA_LABEL`, `CKA_VALUE`, ...).
    #[serde(flatten)]
    pub attributes: BTreeMap<String, String>,
    /// The `CKA_TRUST_*` attributes of the matching trust object.
    pub trust: BTreeMap<String, String>,
}

/// Roots converted from `certdata.txt`, keyed by label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ConvertedStore {
    roots: BTreeMap<String, ConvertedRoot>,
}

impl ConvertedStore {
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn get(&self, label: &str) -> Option<&ConvertedRoot> {
        self.roots.get(label)
    }

    /// Number of roots that are trusted delegators for TLS server authentication.
    pub fn server_auth_count(&self) -> usize {
        self.roots
            .values()
            .filter(|root| {
                root.trust.get("CKA_TRUST_SERVER_AUTH").map(String::as_str)
                    == Some(TRUSTED_DELEGATOR)
            })
            .count()
    }

    /// Serialize as indented `certdata.json`.
    pub fn to_json_pretty(&self) -> Result<String, RootPropsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Parse `certdata.txt` contents into a root store.
///
/// Fails if a multi-line value is malformed or unterminated, a certificate
/// has no label, or any certificate has no matching trust object.
pub fn parse_certdata(input: &str) -> Result<ConvertedStore, RootPropsError> {
    let objects = parse_objects(input)?;

    let mut pending: BTreeMap<String, (Object, Option<Object>)> = BTreeMap::new();
    let mut trust_objects = Vec::new();
    for object in objects {
        let Some(class) = object.get("CKA_CLASS").cloned() else {
            warn!("ignoring certdata object without CKA_CLASS");
            continue;
        };
        match class.as_str() {
            CLASS_CERTIFICATE => {
                let label = object_label(&object, &class)?;
                pending.insert(label, (object, None));
            }
            CLASS_TRUST => trust_objects.push(object),
            _ => {}
        }
    }

    for object in trust_objects {
        let label = object_label(&object, CLASS_TRUST)?;
        if let Some((_, trust)) = pending.get_mut(&label) {
            let fields = object
                .into_iter()
                .filter(|(name, _)| name.starts_with(TRUST_PREFIX))
                .collect();
            *trust = Some(fields);
        }
    }

    let untrusted: Vec<&str> = pending
        .iter()
        .filter(|(_, (_, trust))| trust.is_none())
        .map(|(label, _)| label.as_str())
        .collect();
    if !untrusted.is_empty() {
        return Err(RootPropsError::Certdata(format!(
            "some certificates have no trust information: {:?}",
            untrusted
        )));
    }

    let roots = pending
        .into_iter()
        .map(|(label, (attributes, trust))| {
            let trust = trust.unwrap_or_default();
            (label, ConvertedRoot { attributes, trust })
        })
        .collect();
    let store = ConvertedStore { roots };

    info!("Found {} roots overall", store.len());
    info!(
        "Found {} roots trusted for server auth",
        store.server_auth_count()
    );
    Ok(store)
}

fn object_label(object: &Object, class: &str) -> Result<String, RootPropsError> {
    object
        .get("CKA_LABEL")
        .cloned()
        .ok_or_else(|| RootPropsError::Certdata(format!("{} object without CKA_LABEL", class)))
}

/// Split certdata lines into attribute maps, one per `CKA_CLASS`.
fn parse_objects(input: &str) -> Result<Vec<Object>, RootPropsError> {
    let mut objects = Vec::new();
    let mut current = Object::new();
    // (attribute name, accumulated octal text, starting line number)
    let mut multiline: Option<(String, String, usize)> = None;

    for (idx, raw) in input.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim_end();
        if is_ignored(line) {
            continue;
        }
        if !is_valid_content(line) {
            warn!(line = line_no, "bad content: {}", line);
        }

        let (token, _) = pop_token(line);
        if token == "END" {
            let Some((name, octal, _)) = multiline.take() else {
                return Err(RootPropsError::Certdata(format!(
                    "END outside a multi-line value at line {}",
                    line_no
                )));
            };
            let bytes = decode_octal(&octal).map_err(|e| {
                RootPropsError::Certdata(format!("{} (line {}): {}", name, line_no, e))
            })?;
            current.insert(name, util::encode_base64(&bytes));
            continue;
        }
        if let Some((_, octal, _)) = multiline.as_mut() {
            octal.push_str(line);
            continue;
        }

        if token == "CKA_CLASS" && !current.is_empty() {
            objects.push(std::mem::take(&mut current));
        }

        let (field, rest) = pop_token(line);
        let (type_name, rest) = pop_token(rest);
        match type_name {
            "MULTILINE_OCTAL" => multiline = Some((field.to_string(), String::new(), line_no)),
            "UTF8" => {
                let value = rest.strip_prefix('"').unwrap_or(rest);
                let value = value.strip_suffix('"').unwrap_or(value);
                current.insert(field.to_string(), value.to_string());
            }
            _ => {
                current.insert(field.to_string(), rest.to_string());
            }
        }
    }

    if let Some((name, _, start)) = multiline {
        return Err(RootPropsError::Certdata(format!(
            "unterminated multi-line value {} starting at line {}",
            name, start
        )));
    }
    if !current.is_empty() {
        objects.push(current);
    }
    Ok(objects)
}

fn is_ignored(line: &str) -> bool {
    line.is_empty() || line.starts_with('#') || line == "BEGINDATA"
}

fn is_valid_content(line: &str) -> bool {
    let tokens: Vec<&str> = line.split(' ').filter(|t| !t.is_empty()).collect();
    match tokens.as_slice() {
        [_, _, _, ..] => true,
        [_, kind] => *kind == "MULTILINE_OCTAL",
        [single] => {
            matches!(*single, "END" | "BEGINDATA")
                || single.bytes().all(|b| matches!(b, b'0'..=b'7' | b'\\'))
        }
        [] => false,
    }
}

/// Split off the first space-delimited token, returning it and the remainder.
fn pop_token(s: &str) -> (&str, &str) {
    match s.split_once(' ') {
        Some((token, rest)) => (token, rest.trim_start_matches(' ')),
        None => (s, ""),
    }
}

/// Decode `\ooo` octal escapes; other characters stand for themselves.
fn decode_octal(text: &str) -> Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(text.len() / 4);
    let mut bytes = text.bytes().peekable();
    while let Some(b) = bytes.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }
        let mut value: u32 = 0;
        let mut digits = 0;
        while digits < 3 {
            match bytes.peek() {
                Some(&d @ b'0'..=b'7') => {
                    value = value * 8 + u32::from(d - b'0');
                    digits += 1;
                    bytes.next();
                }
                _ => break,
            }
        }
        if digits == 0 {
            return Err("backslash not followed by an octal digit".into());
        }
        let byte = u8::try_from(value)
            .map_err(|_| format!("octal escape \\{:o} out of range", value))?;
        out.push(byte);
    }
    Ok(out)
}
