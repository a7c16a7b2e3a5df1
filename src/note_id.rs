use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::convert::Infallible;
use std::str::FromStr;
use std::{fmt::Display, ops::Deref};

/// Number of hex characters kept from the content digest.
const ID_LEN: usize = 16;

/// Opaque identifier of a note, derived from its path and content.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
pub struct NoteId(String);

impl Display for NoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NoteId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(NoteId(s.to_string()))
    }
}

impl Deref for NoteId {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<&str> for NoteId {
    fn from(fr: &str) -> Self {
        NoteId(fr.to_string())
    }
}

impl From<String> for NoteId {
    fn from(fr: String) -> Self {
        NoteId(fr)
    }
}

impl From<NoteId> for String {
    fn from(fr: NoteId) -> Self {
        fr.0
    }
}

impl NoteId {
    /// Derive an id from a vault-relative path and the note content.
    ///
    /// Editing a note changes its id, which invalidates any stored embedding.
    pub fn derive(rel_path: &str, content: &str) -> NoteId {
        let mut hasher = Sha256::new();
        hasher.update(rel_path.as_bytes());
        hasher.update([0u8]);
        hasher.update(content.as_bytes());
        let digest = hasher.finalize();

        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        NoteId(hex[..ID_LEN].to_string())
    }

    /// Unordered pair key, used to dedupe A->B against B->A.
    pub fn pair_key(a: &NoteId, b: &NoteId) -> (NoteId, NoteId) {
        if a <= b {
            (a.clone(), b.clone())
        } else {
            (b.clone(), a.clone())
        }
    }
}
