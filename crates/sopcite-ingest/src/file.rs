//! Markdown SOP discovery and loading.

use std::path::Path;
use std::process::Command;

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use sopcite_core::{Document, Error, Result};

/// `sop-tc-007-counting.md` → `sop-tc-007`; anything else → the file stem.
///
/// Only a `sop-<letters>-<digits>` prefix is shortened, so descriptive stems
/// such as `sop-bio-safety-cabinet` keep their full, distinct name.
pub fn infer_doc_id(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);

    let parts: Vec<&str> = stem.split('-').collect();
    if let ["sop", family, number, ..] = parts.as_slice() {
        let is_family = !family.is_empty() && family.chars().all(|c| c.is_ascii_alphabetic());
        let is_number = !number.is_empty() && number.chars().all(|c| c.is_ascii_digit());
        if is_family && is_number {
            return format!("sop-{}-{}", family, number);
        }
    }
    stem.to_string()
}

/// First level-1 header text, or `fallback`.
pub fn infer_title(lines: &[String], fallback: &str) -> String {
    lines
        .iter()
        .map(|l| l.trim())
        .find_map(|l| l.strip_prefix("# "))
        .map(|t| t.trim().to_string())
        .unwrap_or_else(|| fallback.to_string())
}

/// SHA-256 hex digest of the text.
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Current git revision of the repository containing `dir`, if any.
pub fn revision_fingerprint(dir: &Path) -> Option<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let sha = String::from_utf8(output.stdout).ok()?.trim().to_string();
    (!sha.is_empty()).then_some(sha)
}

/// Load one markdown file. Without a repository `version`, the file's
/// content hash (first 12 hex chars) stands in.
pub fn load_document(path: &Path, version: Option<&str>) -> Result<Document> {
    let text = std::fs::read_to_string(path)?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::Ingest(format!("unreadable file name: {}", path.display())))?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);

    let lines: Vec<String> = text.lines().map(str::to_string).collect();
    let version = match version {
        Some(v) => v.to_string(),
        None => content_hash(&text)[..12].to_string(),
    };

    Ok(Document {
        doc_id: infer_doc_id(filename),
        title: infer_title(&lines, stem),
        source_path: path.display().to_string(),
        version: Some(version),
        lines,
    })
}

/// Load every `*.md` file in `dir`, sorted by path.
pub fn load_documents(dir: &Path) -> Result<Vec<Document>> {
    if !dir.is_dir() {
        return Err(Error::NotFound(format!("SOP directory {}", dir.display())));
    }

    let mut paths: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("md"))
        .collect();
    paths.sort();

    let revision = revision_fingerprint(dir);
    match &revision {
        Some(sha) => debug!("Corpus revision {}", sha),
        None => debug!("{} is not in a git checkout, versioning by content hash", dir.display()),
    }

    let docs = paths
        .iter()
        .map(|p| load_document(p, revision.as_deref()))
        .collect::<Result<Vec<_>>>()?;

    info!("Loaded {} documents from {}", docs.len(), dir.display());
    Ok(docs)
}
