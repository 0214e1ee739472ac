use super::schema::Record;
use crate::error::{CaveError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::Builder;

/// Load a JSON array of caves.
pub fn load_records(path: &Path) -> Result<Vec<Record>> {
    let records: Vec<Record> = load_document(path)?;
    tracing::debug!(path = %path.display(), count = records.len(), "loaded records");
    Ok(records)
}

/// Read and parse a whole JSON document. A missing file is `MissingPath`;
/// anything that does not parse into `T` is `MalformedDocument`.
pub fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.is_file() {
        return Err(CaveError::MissingPath(path.to_path_buf()));
    }
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| CaveError::malformed(path, e.to_string()))
}

/// Pretty-print `value` to `path` with `indent` spaces per level.
///
/// The document goes to a temp file next to `path` first and is renamed
/// over it, so readers never see a half-written file. A replaced file
/// keeps its permissions. Non-ASCII text is written as-is.
pub fn write_document<T: Serialize>(path: &Path, value: &T, indent: usize) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut builder = Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        // Masked by the umask, like a plain create.
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    let tmp = builder.tempfile_in(dir)?;
    {
        let indent = vec![b' '; indent];
        let mut writer = BufWriter::new(tmp.as_file());
        let mut ser =
            serde_json::Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(&indent));
        value.serialize(&mut ser)?;
        writer.flush()?;
    }
    if let Ok(existing) = fs::metadata(path) {
        tmp.as_file().set_permissions(existing.permissions())?;
    }
    tmp.persist(path).map_err(|e| CaveError::Io(e.error))?;
    tracing::debug!(path = %path.display(), "wrote document");
    Ok(())
}
