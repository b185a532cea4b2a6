//! Artifact files shared by the trainer and the server
//!
//! Writes go through a temporary file in the destination directory followed
//! by a rename, so a reader sees either the old document or the new one.

use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Errors reading or writing an artifact
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("{} not found", .0.display())]
    NotFound(PathBuf),
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{} does not hold a JSON array", .0.display())]
    NotAnArray(PathBuf),
}

impl ArtifactError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            ArtifactError::NotFound(path.to_path_buf())
        } else {
            ArtifactError::Io { path: path.to_path_buf(), source }
        }
    }

    fn parse(path: &Path, source: serde_json::Error) -> Self {
        ArtifactError::Parse { path: path.to_path_buf(), source }
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Replace `path` with `bytes`, creating the parent directory if needed
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ArtifactError> {
    let dir = parent_dir(path);
    std::fs::create_dir_all(dir).map_err(|e| ArtifactError::io(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ArtifactError::io(dir, e))?;
    tmp.write_all(bytes).map_err(|e| ArtifactError::io(path, e))?;
    tmp.as_file().sync_all().map_err(|e| ArtifactError::io(path, e))?;
    tmp.persist(path).map_err(|e| ArtifactError::io(path, e.error))?;
    Ok(())
}

/// Serialize with 4-space indentation, the layout existing documents use
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    Ok(buf)
}

/// Atomically write `value` as pretty JSON
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    let bytes = to_pretty_json(value).map_err(|e| ArtifactError::parse(path, e))?;
    write_atomic(path, &bytes)
}

/// Read and parse a JSON document without interpreting it
pub async fn read_document(path: &Path) -> Result<Value, ArtifactError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ArtifactError::io(path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| ArtifactError::parse(path, e))
}

/// Read a JSON document that must be an array
pub async fn read_array_document(path: &Path) -> Result<Vec<Value>, ArtifactError> {
    match read_document(path).await? {
        Value::Array(items) => Ok(items),
        _ => Err(ArtifactError::NotAnArray(path.to_path_buf())),
    }
}

/// Load the training history as raw entries. An absent file is an empty
/// history; a file that does not parse, or is not an array, is an error.
/// Entries are not interpreted, so rewriting the file keeps them intact.
pub fn load_history(path: &Path) -> Result<Vec<Value>, ArtifactError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ArtifactError::io(path, e)),
    };
    match serde_json::from_slice(&bytes).map_err(|e| ArtifactError::parse(path, e))? {
        Value::Array(entries) => Ok(entries),
        _ => Err(ArtifactError::NotAnArray(path.to_path_buf())),
    }
}
