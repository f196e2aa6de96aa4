//! Newtype domain identifiers.
//!
//! Every domain concept that has an identity is represented as a distinct newtype
//! wrapping a primitive. This prevents accidentally interchanging (for example)
//! a [`SourceId`] with a [`ClaimId`] even though both are hex strings under the
//! hood.
//!
//! Content-addressed identifiers ([`SourceId`], [`ClaimId`], [`ChunkId`]) are
//! derived from a SHA-256 digest so that the same input always yields the same
//! identity, across runs and across processes.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

/// Returns the first `len` lowercase hex characters of SHA-256(`input`).
pub fn digest_prefix(input: &str, len: usize) -> String {
    let mut hex = sha256_hex(input);
    hex.truncate(len);
    hex
}

/// Returns the full lowercase hex SHA-256 digest of `input`.
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single pipeline run (one topic turned into one article).
///
/// Generated fresh for every run; propagated through spans, log entries and
/// vector-store metadata so all activity from a single run can be correlated
/// and isolated from concurrent runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Generates a new random run identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a [`RunId`] from an existing UUID (e.g. deserialised from a snapshot).
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers: content-addressed
// ---------------------------------------------------------------------------

string_id! {
    /// Identifies a fetched source document.
    ///
    /// Derived from the canonical URL, so the same page fetched twice (or
    /// reached through two redirecting URLs) collapses to one identity.
    SourceId
}

impl SourceId {
    /// Derives the identifier for a canonical URL (16 hex chars of SHA-256).
    pub fn from_canonical_url(canonical_url: &str) -> Self {
        Self(digest_prefix(canonical_url, 16))
    }
}

string_id! {
    /// Identifies an atomic claim extracted from drafted text.
    ClaimId
}

impl ClaimId {
    /// Derives the identifier for a claim's text (16 hex chars of SHA-256).
    pub fn from_text(text: &str) -> Self {
        Self(digest_prefix(text, 16))
    }
}

string_id! {
    /// Identifies a chunk of a source document stored in the vector store.
    ChunkId
}

impl ChunkId {
    /// Derives the identifier for the `[start, end)` span of a source.
    pub fn for_span(source: &SourceId, start: usize, end: usize) -> Self {
        Self(digest_prefix(&format!("{source}:{start}:{end}"), 24))
    }
}

string_id! {
    /// Names a model served by the inference backend (e.g. `"llama-3.1-8b-instant"`).
    ModelName
}

// ---------------------------------------------------------------------------
// Identifiers: integer-backed
// ---------------------------------------------------------------------------

/// A 1-based bibliography position referenced by inline `[n]` markers.
///
/// Citation ids are assigned sequentially in source-list order; id `n` always
/// refers to the `n`-th source handed to the citation mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CitationId(u32);

impl CitationId {
    /// Creates a citation identifier from a raw marker value.
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the underlying integer value.
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for CitationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
