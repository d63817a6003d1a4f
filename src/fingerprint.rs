use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::corpus::Corpus;

/// Length of a fingerprint in bytes (SHA-256).
pub const FINGERPRINT_LEN: usize = 32;

/// A content digest identifying one exact corpus, order included.
///
/// Serializes as 64 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

impl Fingerprint {
    pub fn from_bytes(bytes: [u8; FINGERPRINT_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Parse 64 hex characters. Returns `None` on any other input.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim();
        if hex.len() != FINGERPRINT_LEN * 2 || !hex.is_ascii() {
            return None;
        }
        let mut bytes = [0u8; FINGERPRINT_LEN];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self(bytes))
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.to_hex()
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
            .ok_or_else(|| format!("invalid fingerprint: {value:?}"))
    }
}

/// Compute the fingerprint of a corpus.
///
/// Each exemplar is rendered as a JSON object with its keys sorted, the
/// objects are joined as a JSON array in corpus order, and the bytes are
/// hashed with SHA-256. Struct field order therefore never leaks into the
/// digest, while exemplar order does.
///
/// # Examples
///
/// ```
/// use fewshot::{Corpus, fingerprint::fingerprint};
///
/// let a = fingerprint(&Corpus::builtin());
/// let b = fingerprint(&Corpus::builtin());
/// assert_eq!(a, b);
/// assert_eq!(a.to_hex().len(), 64);
/// ```
pub fn fingerprint(corpus: &Corpus) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(corpus));
    let digest = hasher.finalize();

    let mut bytes = [0u8; FINGERPRINT_LEN];
    bytes.copy_from_slice(digest.as_slice());
    Fingerprint(bytes)
}

/// Compact JSON with keys in sorted order.
fn canonical_json(corpus: &Corpus) -> String {
    let mut out = String::from("[");
    for (i, e) in corpus.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let fields = [
            ("answer", &e.answer),
            ("intent", &e.intent),
            ("question", &e.question),
        ];
        out.push('{');
        for (j, (key, value)) in fields.into_iter().enumerate() {
            if j > 0 {
                out.push(',');
            }
            out.push_str(&format!("\"{key}\":{}", Value::from(value.as_str())));
        }
        out.push('}');
    }
    out.push(']');
    out
}
