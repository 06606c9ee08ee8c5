//! Core domain types: raw documents, requirement records and the per-run
//! requirement index.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RawDocument
// ---------------------------------------------------------------------------

/// Unparsed page markup (Confluence storage format or exported HTML).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDocument {
    pub markup: String,
    /// Where the markup came from (URL or file path), for diagnostics.
    pub origin: Option<String>,
}

impl RawDocument {
    pub fn new(markup: impl Into<String>) -> Self {
        Self {
            markup: markup.into(),
            origin: None,
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// The degraded document returned when a source cannot be loaded.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_blank(&self) -> bool {
        self.markup.trim().is_empty()
    }
}

// ---------------------------------------------------------------------------
// RequirementStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a requirement as reported by the requirements index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RequirementStatus {
    #[default]
    Active,
    Deprecated,
    /// Any status the index reports that we have no special handling for.
    Other(String),
}

impl RequirementStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => "ACTIVE",
            Self::Deprecated => "DEPRECATED",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for RequirementStatus {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "" | "ACTIVE" => Self::Active,
            "DEPRECATED" => Self::Deprecated,
            _ => Self::Other(s.trim().to_string()),
        }
    }
}

impl From<RequirementStatus> for String {
    fn from(status: RequirementStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for RequirementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RequirementRecord
// ---------------------------------------------------------------------------

/// A single requirement definition from the requirements index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementRecord {
    /// Unique requirement key (e.g. `BR-404`, `ACT-006`, `MSG-665`).
    pub key: String,
    /// Plain-text definition shown next to the marker.
    pub excerpt: String,
    /// Title of the page where the requirement is defined.
    pub origin_title: String,
    /// Link to the requirement definition.
    pub destination_url: String,
    pub status: RequirementStatus,
    /// Space the requirement belongs to.
    pub space_key: String,
    /// Tag-stripped property values (e.g. `@ActorNameEn`, `@Description`).
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl RequirementRecord {
    /// Create a record with only a key; all other fields empty.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            excerpt: String::new(),
            origin_title: String::new(),
            destination_url: String::new(),
            status: RequirementStatus::Active,
            space_key: String::new(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_origin(mut self, title: impl Into<String>) -> Self {
        self.origin_title = title.into();
        self
    }

    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.excerpt = excerpt.into();
        self
    }
}

// ---------------------------------------------------------------------------
// RequirementIndex
// ---------------------------------------------------------------------------

/// Key → record mapping built fresh for each pipeline run.
///
/// Keys are unique; the first record inserted for a key wins and later
/// duplicates are rejected. Iteration follows insertion order.
#[derive(Debug, Clone, Default)]
pub struct RequirementIndex {
    records: Vec<RequirementRecord>,
    by_key: HashMap<String, usize>,
}

impl RequirementIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record. Returns `false` (and keeps the existing record) if the
    /// key is already present or empty.
    pub fn insert(&mut self, record: RequirementRecord) -> bool {
        if record.key.is_empty() || self.by_key.contains_key(&record.key) {
            return false;
        }
        self.by_key.insert(record.key.clone(), self.records.len());
        self.records.push(record);
        true
    }

    pub fn get(&self, key: &str) -> Option<&RequirementRecord> {
        self.by_key.get(key).map(|&i| &self.records[i])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &RequirementRecord> {
        self.records.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.key.as_str())
    }
}

impl FromIterator<RequirementRecord> for RequirementIndex {
    fn from_iter<I: IntoIterator<Item = RequirementRecord>>(iter: I) -> Self {
        let mut index = Self::new();
        for record in iter {
            index.insert(record);
        }
        index
    }
}
