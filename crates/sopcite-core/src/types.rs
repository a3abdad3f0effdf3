//! Data types for source documents and retrievable chunks.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse semantic category of a document region.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Section {
    Purpose,
    Scope,
    Safety,
    Materials,
    Preparation,
    Procedure,
    #[serde(rename = "Critical Points")]
    CriticalPoints,
    #[serde(rename = "QC")]
    Qc,
    References,
    Troubleshooting,
    #[default]
    Other,
}

impl Section {
    /// All labels, in classification order with `Other` last.
    pub const ALL: [Section; 11] = [
        Self::Purpose,
        Self::Scope,
        Self::Safety,
        Self::Materials,
        Self::Preparation,
        Self::Procedure,
        Self::CriticalPoints,
        Self::Qc,
        Self::References,
        Self::Troubleshooting,
        Self::Other,
    ];

    /// The label as it appears in records and citations.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Purpose => "Purpose",
            Self::Scope => "Scope",
            Self::Safety => "Safety",
            Self::Materials => "Materials",
            Self::Preparation => "Preparation",
            Self::Procedure => "Procedure",
            Self::CriticalPoints => "Critical Points",
            Self::Qc => "QC",
            Self::References => "References",
            Self::Troubleshooting => "Troubleshooting",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed source document, one per markdown file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: String,
    pub title: String,
    pub source_path: String,
    #[serde(default)]
    pub version: Option<String>,
    /// Raw markdown lines, 0-indexed.
    pub lines: Vec<String>,
}

/// A retrievable passage with provenance metadata.
///
/// Optional fields serialize as `null` rather than being omitted, so every
/// record in `chunks.jsonl` carries the full field set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub doc_id: String,
    pub doc_title: String,
    pub source_path: String,
    #[serde(default)]
    pub version: Option<String>,

    pub section: Section,
    #[serde(default)]
    pub subsection: Option<String>,

    /// 1-based inclusive.
    pub line_start: usize,
    /// 1-based inclusive.
    pub line_end: usize,

    #[serde(default)]
    pub step_start: Option<u64>,
    #[serde(default)]
    pub step_end: Option<u64>,

    pub text: String,
    #[serde(default)]
    pub tags: BTreeMap<String, serde_json::Value>,
}

impl Chunk {
    /// Inclusive step range, when both ends are known.
    pub fn step_range(&self) -> Option<(u64, u64)> {
        self.step_start.zip(self.step_end)
    }
}
