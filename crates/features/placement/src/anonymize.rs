//! Stable pseudonyms for public listings.

use apex_domain::ids::CandidateId;
use sha2::{Digest, Sha256};
use std::sync::Arc;

const PREFIX: &str = "cand-";
const HEX_CHARS: usize = 12;

/// Maps candidate ids to `cand-<12 hex>` using a salted SHA-256. The same salt always
/// yields the same pseudonym, so recruiters can follow a candidate across listings
/// without learning who they are.
#[derive(Debug, Clone)]
pub struct Anonymizer {
    salt: Arc<str>,
}

impl Anonymizer {
    pub fn new(salt: impl Into<Arc<str>>) -> Self {
        Self { salt: salt.into() }
    }

    #[must_use]
    pub fn anonymize(&self, id: &CandidateId) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.salt.as_bytes());
        hasher.update(id.as_str().as_bytes());
        let digest = hex::encode(hasher.finalize());
        format!("{PREFIX}{}", &digest[..HEX_CHARS])
    }
}
