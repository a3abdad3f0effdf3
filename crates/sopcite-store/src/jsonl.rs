//! Line-delimited JSON record files (`docs.jsonl`, `chunks.jsonl`, `meta.jsonl`).

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use sopcite_core::{Error, Result};

/// Read every record from a JSONL file. Blank lines are skipped.
///
/// A line that fails to parse aborts the read with its 1-based line number;
/// a malformed corpus is not something to recover from.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
        _ => Error::Io(e),
    })?;

    let mut records = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|source| Error::Record {
            path: path.to_path_buf(),
            line: idx + 1,
            source,
        })?;
        records.push(record);
    }

    debug!("Read {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Write records as one compact JSON object per line, replacing the file.
/// Returns the number of records written.
pub fn write_jsonl<'a, T, I>(path: &Path, records: I) -> Result<usize>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(path)?);
    let mut count = 0;
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
        count += 1;
    }
    writer.flush()?;

    debug!("Wrote {} records to {}", count, path.display());
    Ok(count)
}
