use crate::extractor::{extract_page_texts, DocumentFormat};
use crate::{Document, DocumentFingerprint, IngestError};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Recursively lists every supported document under `folder`, sorted by path.
pub fn discover_documents(folder: &Path) -> Result<Vec<PathBuf>, IngestError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        if DocumentFormat::from_path(entry.path()).is_some() {
            files.push(entry.path().to_path_buf());
        }
    }

    if files.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "no supported documents found in {}",
            folder.display()
        )));
    }

    files.sort_unstable();
    Ok(files)
}

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn load_document(path: &Path) -> Result<Document, IngestError> {
    if !path.is_file() {
        return Err(IngestError::MissingFile(path.display().to_string()));
    }

    let fingerprint = build_document_fingerprint(path)?;
    let pages = extract_page_texts(path)?;
    debug!(path = %path.display(), pages = pages.len(), "document loaded");

    Ok(Document { fingerprint, pages })
}

/// Loads every path in order. Any missing or unreadable file fails the whole load.
pub fn load_documents<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Document>, IngestError> {
    if paths.is_empty() {
        return Err(IngestError::InvalidArgument(
            "at least one document path is required".to_string(),
        ));
    }

    paths
        .iter()
        .map(|path| load_document(path.as_ref()))
        .collect()
}

fn build_document_fingerprint(path: &Path) -> Result<DocumentFingerprint, IngestError> {
    let checksum = digest_file(path)?;
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            IngestError::MissingFileName(format!("path missing filename: {}", path.display()))
        })?;

    Ok(DocumentFingerprint {
        document_id: generate_document_id(path),
        document_title: name.to_string(),
        source_path: path.to_string_lossy().to_string(),
        checksum,
        loaded_at: Utc::now(),
    })
}

fn generate_document_id(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    format!("{:x}", hasher.finalize())
}
